
// Every driver here follows the same shape: it exclusively owns a Session, identifies the
// device at construction time, pushes a default configuration sequence, and then exposes
// the handful of operations the bench scripts need. Drivers are generic over the Session
// implementation so they can be exercised against a scripted mock.

use std::thread;
use std::time::{Duration, Instant};

use crate::error::{Error, Result};

// Tektronix DMM4050 6.5-digit multimeter
pub mod dmm4050;

// Tektronix PA1000 single-phase power analyzer
pub mod pa1000;

// Keithley 2380-500-15 programmable electronic load
pub mod keithley2380;

/// Pacing for a "poll until the device reports ready" loop.
///
/// The two `measure_sync` implementations differ only in what one poll does; how often to
/// poll and when to give up lives here. Exhausting `max_polls` yields [`Error::Timeout`]
/// instead of blocking forever.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub backoff: Duration,
    pub max_polls: u32,
}

impl PollPolicy {
    pub const fn new(backoff: Duration, max_polls: u32) -> Self {
        Self { backoff, max_polls }
    }

    /// Run `poll` until it produces a value, sleeping `backoff` between unready polls
    pub fn run<T, F>(&self, mut poll: F) -> Result<T>
    where
        F: FnMut() -> Result<Option<T>>,
    {
        let started = Instant::now();

        for attempt in 1..=self.max_polls {
            if let Some(value) = poll()? {
                return Ok(value);
            }
            if attempt < self.max_polls && !self.backoff.is_zero() {
                thread::sleep(self.backoff);
            }
        }

        Err(Error::Timeout { attempts: self.max_polls, elapsed: started.elapsed() })
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::PollPolicy;
    use crate::error::Error;

    #[test]
    fn returns_first_ready_value() {
        let policy = PollPolicy::new(Duration::from_millis(0), 10);
        let mut polls = 0;

        let value = policy
            .run(|| {
                polls += 1;
                Ok(if polls == 3 { Some(42) } else { None })
            })
            .unwrap();

        assert_eq!(value, 42);
        assert_eq!(polls, 3);
    }

    #[test]
    fn exhaustion_is_a_timeout() {
        let policy = PollPolicy::new(Duration::from_millis(0), 5);

        match policy.run::<u8, _>(|| Ok(None)) {
            Err(Error::Timeout { attempts, .. }) => assert_eq!(attempts, 5),
            other => panic!("expected timeout, got {:?}", other),
        }
    }

    #[test]
    fn poll_errors_propagate_immediately() {
        let policy = PollPolicy::new(Duration::from_millis(0), 5);
        let mut polls = 0;

        let res: crate::error::Result<u8> = policy.run(|| {
            polls += 1;
            Err(Error::SessionClosed)
        });

        assert!(matches!(res, Err(Error::SessionClosed)));
        assert_eq!(polls, 1);
    }
}
