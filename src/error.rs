
use std::io;
use std::time::Duration;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Everything that can go wrong talking to the bench.
///
/// Transport and parse failures are fatal to the operation that hit them; nothing in this
/// crate retries on its own except the deliberate poll loops in `measure_sync`, and those
/// surface exhaustion as [`Error::Timeout`].
#[derive(Debug, Error)]
pub enum Error {
    /// The underlying transport failed to open, read, or write
    #[error("connection error: {0}")]
    Connection(#[from] io::Error),

    /// The session was already closed when a write or query was attempted
    #[error("session is closed")]
    SessionClosed,

    /// The device answered, but not with anything we can interpret
    #[error("protocol error: {reason} (response was {response:?})")]
    Protocol { response: String, reason: &'static str },

    /// A measurement poll loop gave up waiting for the device to report ready
    #[error("timed out after {attempts} status polls over {elapsed:?}")]
    Timeout { attempts: u32, elapsed: Duration },

    /// The run log could not be written
    #[error("log file error: {0}")]
    Log(#[from] csv::Error),

    /// Serial resource enumeration failed
    #[error("resource discovery error: {0}")]
    Discovery(#[from] serialport::Error),
}

impl Error {
    pub fn protocol(response: &str, reason: &'static str) -> Self {
        Error::Protocol { response: response.to_owned(), reason }
    }
}
