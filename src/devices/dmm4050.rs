
use std::thread;
use std::time::Duration;

use log::{debug, info};

use crate::devices::PollPolicy;
use crate::error::{Error, Result};
use crate::session::{Session, TcpSession};

/// Port of the raw-socket interface on the meter's Ethernet option
pub const SOCKET_PORT: u16 = 3490;

/// The meter needs this long to apply a configuration command
pub const DEFAULT_SETTLE: Duration = Duration::from_millis(300);

/// Acquisition-complete polling: 100 ms pacing, bounded at roughly the session timeout
pub const DEFAULT_POLL: PollPolicy = PollPolicy::new(Duration::from_millis(100), 250);

// Dual-channel DC setup: channel 1 measures current, channel 2 voltage, both
// auto-ranged and analog-filtered, immediate single-sample trigger, display off,
// armed for the first acquisition.
const INIT_CONFIG: &[&str] = &[
    "*CLS",
    "SYST:REM",
    "Ethernet",
    "SENSE:FUNC1 \"CURR:DC\"",
    "SENSE:FUNC2 \"VOLT:DC\"",
    "SENSE:VOLT:RANG:AUTO ON",
    "SENSE:CURR:RANG:AUTO ON",
    "SENS:DET:BAND MIN",
    "SENS:CURR:DC:FILT:STAT ON",
    "SENS:VOLT:DC:FILT:STAT ON",
    "SENS:ZERO:AUTO 1",
    "TRIG:SOUR IMM",
    "TRIG:DEL 0",
    "TRIG:COUN 1",
    "SAMP:COUN 1",
    "DISP OFF",
    ":INIT",
];

/// A connected DMM4050 multimeter measuring current and voltage simultaneously
pub struct Dmm4050<S: Session> {
    session: S,
    settle: Duration,
    poll: PollPolicy,
}

impl Dmm4050<TcpSession> {
    pub fn connect(host: &str) -> Result<Self> {
        Self::with_session(TcpSession::connect(host, SOCKET_PORT)?)
    }
}

impl<S: Session> Dmm4050<S> {
    /// Take exclusive ownership of a session, identify the device, and push the
    /// default configuration.
    ///
    /// Construction is atomic: if any configuration command fails the session is
    /// dropped (and therefore closed) and no driver handle is returned.
    pub fn with_session(session: S) -> Result<Self> {
        Self::with_session_tuned(session, DEFAULT_SETTLE, DEFAULT_POLL)
    }

    /// Same as [`with_session`](Self::with_session) with explicit pacing
    pub fn with_session_tuned(session: S, settle: Duration, poll: PollPolicy) -> Result<Self> {
        let mut meter = Self { session, settle, poll };

        info!("session open with device: {}", meter.identity()?.trim());
        meter.configure(INIT_CONFIG)?;

        Ok(meter)
    }

    pub fn identity(&mut self) -> Result<String> {
        self.session.query("*IDN?")
    }

    /// Issue each command in order, waiting out the settle delay after every one.
    ///
    /// There is no rollback: a failure part way through leaves the instrument with the
    /// commands applied so far and propagates to the caller.
    pub fn configure(&mut self, commands: &[&str]) -> Result<()> {
        for cmd in commands {
            self.write_config(cmd)?;
        }
        Ok(())
    }

    fn write_config(&mut self, cmd: &str) -> Result<()> {
        debug!("dmm4050 <- {}", cmd);
        self.session.write(cmd)?;
        thread::sleep(self.settle);
        Ok(())
    }

    /// Block until the armed acquisition completes, then fetch both channels and re-arm.
    ///
    /// Returns `[current, voltage]`. Polls `*OPC?` under the driver's [`PollPolicy`];
    /// if the device never reports complete this returns [`Error::Timeout`] rather than
    /// blocking forever.
    pub fn measure_sync(&mut self) -> Result<[f64; 2]> {
        let poll = self.poll;
        poll.run(|| {
            let status = self.session.query("*OPC?")?;
            match status.trim().parse::<i32>() {
                Ok(1) => Ok(Some(())),
                Ok(_) => Ok(None),
                Err(_) => Err(Error::protocol(&status, "operation-complete status is not an integer")),
            }
        })?;

        let current = self.fetch_channel(1)?;
        let voltage = self.fetch_channel(2)?;

        // Re-arm for the next cycle
        self.write_config(":INIT")?;

        Ok([current, voltage])
    }

    fn fetch_channel(&mut self, channel: u8) -> Result<f64> {
        let raw = self.session.query(&format!(":FETC{}?", channel))?;
        let clean = raw.replace('\r', "");
        clean
            .trim()
            .parse::<f64>()
            .map_err(|_| Error::protocol(&raw, "fetch result is not a number"))
    }

    /// Fire the trigger without waiting for the settle delay.
    ///
    /// Used by orchestration loops that trigger several meters back to back and only
    /// then collect the results.
    pub fn trigger(&mut self) -> Result<()> {
        self.session.write(":INIT")
    }

    pub fn filter_analog_on(&mut self) -> Result<()> {
        self.configure(&[
            "SENS:DET:BAND MIN",
            "SENS:CURR:DC:FILT:STAT ON",
            "SENS:VOLT:DC:FILT:STAT ON",
        ])
    }

    pub fn filter_analog_off(&mut self) -> Result<()> {
        self.configure(&["SENS:CURR:DC:FILT:STAT OFF", "SENS:VOLT:DC:FILT:STAT OFF"])
    }

    pub fn filter_digital_on(&mut self) -> Result<()> {
        self.configure(&["SENS:CURR:DC:FILT:DIG ON", "SENS:VOLT:DC:FILT:DIG ON"])
    }

    pub fn filter_digital_off(&mut self) -> Result<()> {
        self.configure(&["SENS:CURR:DC:FILT:DIG OFF", "SENS:VOLT:DC:FILT:DIG OFF"])
    }

    /// Set the per-trigger sample count, clamped to the hardware's [1, 5000]
    pub fn set_sample_count(&mut self, samples: u32) -> Result<()> {
        let samples = samples.max(1).min(5000);
        self.write_config(&format!("SAMP:COUN {}", samples))
    }

    pub fn set_settle(&mut self, settle: Duration) {
        self.settle = settle;
    }

    pub fn set_poll_policy(&mut self, poll: PollPolicy) {
        self.poll = poll;
    }
}

impl<S: Session> Drop for Dmm4050<S> {
    fn drop(&mut self) {
        info!("closing dmm4050 session");
        let _ = self.session.close();
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::{Dmm4050, INIT_CONFIG};
    use crate::devices::PollPolicy;
    use crate::error::Error;
    use crate::session::mock::MockSession;

    const IDN: &str = "FLUKE,DMM4050,1234567,08.01";

    fn meter(mock: MockSession) -> Dmm4050<MockSession> {
        Dmm4050::with_session_tuned(
            mock.on_every("*IDN?", IDN),
            Duration::ZERO,
            PollPolicy::new(Duration::ZERO, 8),
        )
        .unwrap()
    }

    #[test]
    fn construction_identifies_then_configures_in_order() {
        let meter = meter(MockSession::new());

        assert_eq!(meter.session.sent[0], "*IDN?");
        assert_eq!(&meter.session.sent[1..], INIT_CONFIG);
    }

    #[test]
    fn measure_sync_polls_fetches_and_rearms() {
        let mut meter = meter(
            MockSession::new()
                .on("*OPC?", "0")
                .on("*OPC?", "0")
                .on("*OPC?", "1")
                .on(":FETC1?", "+1.2345E-02\r")
                .on(":FETC2?", "3.300\r"),
        );

        let sample = meter.measure_sync().unwrap();
        assert_eq!(sample, [1.2345e-2, 3.3]);

        let polls = meter.session.sent.iter().filter(|c| c.as_str() == "*OPC?").count();
        assert_eq!(polls, 3);
        assert_eq!(meter.session.sent.last().unwrap(), ":INIT");
    }

    #[test]
    fn measure_sync_gives_up_when_never_ready() {
        let mut meter = meter(MockSession::new().on_every("*OPC?", "0"));

        match meter.measure_sync() {
            Err(Error::Timeout { attempts, .. }) => assert_eq!(attempts, 8),
            other => panic!("expected timeout, got {:?}", other),
        }
    }

    #[test]
    fn non_numeric_fetch_is_a_protocol_error() {
        let mut meter = meter(
            MockSession::new()
                .on("*OPC?", "1")
                .on(":FETC1?", "garbage"),
        );

        assert!(matches!(meter.measure_sync(), Err(Error::Protocol { .. })));
    }

    #[test]
    fn sample_count_is_clamped_to_hardware_limits() {
        let mut meter = meter(MockSession::new());

        meter.set_sample_count(0).unwrap();
        meter.set_sample_count(250).unwrap();
        meter.set_sample_count(9000).unwrap();

        let n = meter.session.sent.len();
        assert_eq!(
            &meter.session.sent[n - 3..],
            &["SAMP:COUN 1", "SAMP:COUN 250", "SAMP:COUN 5000"]
        );
    }

    #[test]
    fn filter_toggles_emit_the_documented_commands() {
        let mut meter = meter(MockSession::new());
        let base = meter.session.sent.len();

        meter.filter_digital_on().unwrap();
        meter.filter_analog_off().unwrap();

        assert_eq!(
            &meter.session.sent[base..],
            &[
                "SENS:CURR:DC:FILT:DIG ON",
                "SENS:VOLT:DC:FILT:DIG ON",
                "SENS:CURR:DC:FILT:STAT OFF",
                "SENS:VOLT:DC:FILT:STAT OFF",
            ]
        );
    }
}
