
#[macro_use]
extern crate lazy_static;

// Error taxonomy shared by the whole crate
pub mod error;

// A line-terminated command channel to a single instrument
pub mod session;

// Module for drivers of the instruments on the bench
pub mod devices;

// Parser for the text telemetry lines the microcontroller prints on its serial port
pub mod telemetry;

// CSV run log, one file per characterization run
pub mod logfile;

// Enumeration of addressable instrument resources
pub mod resources;

pub use error::{Error, Result};
