
use std::thread;
use std::time::Duration;

use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::devices::PollPolicy;
use crate::error::{Error, Result};
use crate::session::{Session, TcpSession};

/// Standard SCPI raw-socket port on the analyzer
pub const SOCKET_PORT: u16 = 5025;

/// This instrument is slow to apply settings; every configuration command gets 2 s
pub const DEFAULT_SETTLE: Duration = Duration::from_secs(2);

/// Data-ready polling pace. The analyzer produces a reading roughly twice a second,
/// so 50 ms polls bounded at 500 attempts cover the session timeout.
pub const DEFAULT_POLL: PollPolicy = PollPolicy::new(Duration::from_millis(50), 500);

// The device acknowledges this status value on :DSR? when a fresh reading is available
const STATUS_DATA_READY: &str = "2";

const INIT_CONFIG: &[&str] = &[
    "*RST",             // power-on defaults
    ":SEL:CLR",         // clear the measurement selection
    ":INP:FILT:LPAS 1", // low pass filter for voltage measurements
    ":BLK:DIS",         // disable blanking
    ":AVG 1",           // enable averaging
    ":SYST:ZERO 0",     // disable auto zero
    ":DSE 2",           // raise the data-ready bit in the status register
];

/// A measurement the analyzer can report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Metric {
    Undefined,
    VoltageDc,
    CurrentDc,
}

/// Ranging policy for one selected metric
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Ranging {
    Auto,
    /// Fixed range index; clamped to the hardware's [1, 10] and rounded to an integer
    Fixed(f64),
}

/// One entry of a [`Pa1000::select_metrics`] call
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MetricSelection {
    pub metric: Metric,
    pub ranging: Ranging,
}

impl MetricSelection {
    pub fn auto(metric: Metric) -> Self {
        Self { metric, ranging: Ranging::Auto }
    }

    pub fn fixed(metric: Metric, range: f64) -> Self {
        Self { metric, ranging: Ranging::Fixed(range) }
    }
}

/// Current-sensing shunt selection; exactly one is active at a time, last write wins
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Shunt {
    Undefined,
    Internal20A,
    Internal1A,
    External,
}

/// A connected PA1000 power analyzer
pub struct Pa1000<S: Session> {
    session: S,
    settle: Duration,
    poll: PollPolicy,
}

impl Pa1000<TcpSession> {
    pub fn connect(host: &str) -> Result<Self> {
        Self::with_session(TcpSession::connect(host, SOCKET_PORT)?)
    }
}

impl<S: Session> Pa1000<S> {
    /// Take exclusive ownership of a session, identify the device, and push the
    /// default configuration. Atomic: any failure closes the session.
    pub fn with_session(session: S) -> Result<Self> {
        Self::with_session_tuned(session, DEFAULT_SETTLE, DEFAULT_POLL)
    }

    /// Same as [`with_session`](Self::with_session) with explicit pacing
    pub fn with_session_tuned(session: S, settle: Duration, poll: PollPolicy) -> Result<Self> {
        let mut analyzer = Self { session, settle, poll };

        info!("session open with device: {}", analyzer.identity()?.trim());
        analyzer.configure(INIT_CONFIG)?;

        Ok(analyzer)
    }

    pub fn identity(&mut self) -> Result<String> {
        self.session.query("*IDN?")
    }

    /// Issue each command in order with the settle delay after every one.
    ///
    /// Unlike the other bench instruments this device acknowledges every configuration
    /// command, so each one is sent as a query and the acknowledgement is consumed.
    pub fn configure(&mut self, commands: &[&str]) -> Result<()> {
        for cmd in commands {
            self.write_config(cmd)?;
        }
        Ok(())
    }

    fn write_config(&mut self, cmd: &str) -> Result<()> {
        debug!("pa1000 <- {}", cmd);
        self.session.query(cmd)?;
        thread::sleep(self.settle);
        Ok(())
    }

    /// One non-blocking data poll.
    ///
    /// Returns `Ok(None)` when the device has no fresh reading yet; the caller is
    /// expected to poll on its own schedule. The sample layout follows the currently
    /// selected metrics (see [`select_metrics`](Self::select_metrics)).
    pub fn measure_or_none(&mut self) -> Result<Option<Vec<f64>>> {
        let status = self.session.query(":DSR?")?;
        if status.trim() != STATUS_DATA_READY {
            return Ok(None);
        }

        let raw = self.session.query(":FRD?")?;
        parse_record(&raw).map(Some)
    }

    /// Block until a fresh reading is available and return it.
    ///
    /// Identical fetch and parse path as [`measure_or_none`](Self::measure_or_none),
    /// looped under the driver's [`PollPolicy`]; exhaustion yields [`Error::Timeout`].
    pub fn measure_sync(&mut self) -> Result<Vec<f64>> {
        let poll = self.poll;
        poll.run(|| self.measure_or_none())
    }

    /// Select which metrics the analyzer reports, in order, with per-metric ranging.
    ///
    /// Auto-ranged entries never emit a fixed-range command and vice versa. Entries
    /// with an `Undefined` metric are skipped silently.
    pub fn select_metrics(&mut self, selections: &[MetricSelection]) -> Result<()> {
        for sel in selections {
            let (sel_command, range_command) = match sel.metric {
                Metric::VoltageDc => (":SEL:VDC", ":RNG:VTL"),
                Metric::CurrentDc => (":SEL:ADC", ":RNG:AMP"),
                Metric::Undefined => continue,
            };

            self.write_config(sel_command)?;

            match sel.ranging {
                Ranging::Auto => self.write_config(&format!("{}:AUT", range_command))?,
                Ranging::Fixed(range) => {
                    let fixed = range.max(1.0).min(10.0).round() as u32;
                    self.write_config(&format!("{}:FIX {}", range_command, fixed))?;
                }
            }
        }
        Ok(())
    }

    /// Route current sensing through the given shunt. `Undefined` is a no-op.
    pub fn select_shunt(&mut self, shunt: Shunt) -> Result<()> {
        let command = match shunt {
            Shunt::Internal20A => ":SHU:INT",
            Shunt::Internal1A => ":SHU:INT1A",
            Shunt::External => ":SHU:EXT",
            Shunt::Undefined => return Ok(()),
        };
        self.write_config(command)
    }

    /// Read back which metrics the analyzer currently reports, in record order.
    ///
    /// The first two tokens of the format string are header fields and are dropped;
    /// unrecognized metric names map to `Undefined`.
    pub fn get_metrics(&mut self) -> Result<Vec<Metric>> {
        let raw = self.session.query(":FRF?")?;

        Ok(raw
            .trim()
            .split(',')
            .skip(2)
            .map(|token| {
                let token = token.trim();
                if token.eq_ignore_ascii_case("adc") {
                    Metric::CurrentDc
                } else if token.eq_ignore_ascii_case("vdc") {
                    Metric::VoltageDc
                } else {
                    Metric::Undefined
                }
            })
            .collect())
    }

    pub fn low_pass_filter_on(&mut self) -> Result<()> {
        self.write_config(":INP:FILT:LPAS 1")
    }

    pub fn low_pass_filter_off(&mut self) -> Result<()> {
        self.write_config(":INP:FILT:LPAS 0")
    }

    pub fn average_on(&mut self) -> Result<()> {
        self.write_config(":AVG 1")
    }

    pub fn average_off(&mut self) -> Result<()> {
        self.write_config(":AVG 0")
    }

    pub fn set_settle(&mut self, settle: Duration) {
        self.settle = settle;
    }

    pub fn set_poll_policy(&mut self, poll: PollPolicy) {
        self.poll = poll;
    }
}

impl<S: Session> Drop for Pa1000<S> {
    fn drop(&mut self) {
        info!("closing pa1000 session");
        let _ = self.session.close();
    }
}

/// Parse one comma-delimited numeric record, shared by both measurement paths
fn parse_record(raw: &str) -> Result<Vec<f64>> {
    let clean = raw.replace(' ', "");

    clean
        .trim()
        .split(',')
        .map(|token| {
            token
                .parse::<f64>()
                .map_err(|_| Error::protocol(raw, "record field is not a number"))
        })
        .collect()
}
