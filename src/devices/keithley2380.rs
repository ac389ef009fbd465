
use std::thread;
use std::time::Duration;

use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::session::{Session, TcpSession};

/// The load needs this long to apply a configuration command
pub const DEFAULT_SETTLE: Duration = Duration::from_millis(700);

const INIT_CONFIG: &[&str] = &[
    "*RST",
    ":SEL:CLR",
    ":SYST:REM", // remote configuration from here on
];

/// The load's operating function.
///
/// Mutated only through [`Keithley2380::set_mode`]; read back with
/// [`Keithley2380::current_mode`], which maps unrecognized device text to `Undefined`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OperatingMode {
    Undefined,
    ConstantCurrent,
    ConstantVoltage,
    ConstantResistance,
    ConstantPower,
}

impl OperatingMode {
    /// Map the free-text `:FUNC?` response to a mode
    pub fn from_function_name(name: &str) -> Self {
        match name.trim() {
            "CURRENT" => OperatingMode::ConstantCurrent,
            "VOLTAGE" => OperatingMode::ConstantVoltage,
            "RESISTANCE" => OperatingMode::ConstantResistance,
            "POWER" => OperatingMode::ConstantPower,
            _ => OperatingMode::Undefined,
        }
    }

    /// The keyword the `FUNC` command expects, `None` for `Undefined`
    pub fn function_keyword(self) -> Option<&'static str> {
        match self {
            OperatingMode::ConstantCurrent => Some("CURR"),
            OperatingMode::ConstantVoltage => Some("VOLT"),
            OperatingMode::ConstantResistance => Some("RES"),
            OperatingMode::ConstantPower => Some("POW"),
            OperatingMode::Undefined => None,
        }
    }
}

/// Format the level command for a mode, clamping to the mode's hardware interval and
/// rounding to 4 decimal places. `None` for `Undefined`.
///
/// Valid intervals: constant current [0.0, 15.0] A, constant voltage [0.1, 400.0] V,
/// constant resistance [0.3, 7500.0] Ω, constant power [0.0, 200.0] W.
pub fn level_command(mode: OperatingMode, level: f64) -> Option<String> {
    let (subsystem, min, max) = match mode {
        OperatingMode::ConstantCurrent => (":CURR:LEV", 0.0, 15.0),
        OperatingMode::ConstantVoltage => (":VOLT:LEV", 0.1, 400.0),
        OperatingMode::ConstantResistance => (":RES:LEV", 0.3, 7500.0),
        OperatingMode::ConstantPower => (":POW:LEV", 0.0, 200.0),
        OperatingMode::Undefined => return None,
    };

    let level = level.max(min).min(max);
    let level = (level * 1.0e4).round() / 1.0e4;

    Some(format!("{} {}", subsystem, level))
}

/// A connected Keithley 2380-500-15 programmable electronic load
pub struct Keithley2380<S: Session> {
    session: S,
    settle: Duration,
}

impl Keithley2380<TcpSession> {
    /// Connect to the load's socket interface.
    ///
    /// Instruments reachable over other transports can be handed in through
    /// [`with_session`](Self::with_session) instead.
    pub fn connect(host: &str, port: u16) -> Result<Self> {
        Self::with_session(TcpSession::connect(host, port)?)
    }
}

impl<S: Session> Keithley2380<S> {
    /// Take exclusive ownership of a session, identify the device, and enable remote
    /// configuration. Atomic: any failure closes the session.
    pub fn with_session(session: S) -> Result<Self> {
        Self::with_session_tuned(session, DEFAULT_SETTLE)
    }

    /// Same as [`with_session`](Self::with_session) with an explicit settle delay
    pub fn with_session_tuned(session: S, settle: Duration) -> Result<Self> {
        let mut load = Self { session, settle };

        info!("session open with device: {}", load.identity()?.trim());
        load.configure(INIT_CONFIG)?;

        Ok(load)
    }

    pub fn identity(&mut self) -> Result<String> {
        self.session.query("*IDN?")
    }

    /// Issue each command in order with the settle delay after every one
    pub fn configure(&mut self, commands: &[&str]) -> Result<()> {
        for cmd in commands {
            self.write_config(cmd)?;
        }
        Ok(())
    }

    fn write_config(&mut self, cmd: &str) -> Result<()> {
        debug!("keithley2380 <- {}", cmd);
        self.session.write(cmd)?;
        thread::sleep(self.settle);
        Ok(())
    }

    /// Ask the device which function is active right now
    pub fn current_mode(&mut self) -> Result<OperatingMode> {
        let name = self.session.query(":FUNC?")?;
        Ok(OperatingMode::from_function_name(&name))
    }

    /// Switch the operating function. `Undefined` is a silent no-op.
    pub fn set_mode(&mut self, mode: OperatingMode) -> Result<()> {
        match mode.function_keyword() {
            Some(keyword) => self.write_config(&format!("FUNC {}", keyword)),
            None => Ok(()),
        }
    }

    /// Set the output level in the units of the *currently active* mode.
    ///
    /// The active mode is re-queried on every call so the clamp interval always matches
    /// what the instrument is actually doing, at the cost of one extra query. Values
    /// outside the mode's interval are clamped to the nearest bound. A no-op when the
    /// device reports an unrecognized function.
    pub fn set_level(&mut self, level: f64) -> Result<()> {
        let mode = self.current_mode()?;
        match level_command(mode, level) {
            Some(cmd) => self.write_config(&cmd),
            None => Ok(()),
        }
    }

    /// Close the input relay (start sinking)
    pub fn input_on(&mut self) -> Result<()> {
        self.write_config(":INP 1")
    }

    /// Open the input relay
    pub fn input_off(&mut self) -> Result<()> {
        self.write_config(":INP 0")
    }

    pub fn set_settle(&mut self, settle: Duration) {
        self.settle = settle;
    }
}

impl<S: Session> Drop for Keithley2380<S> {
    fn drop(&mut self) {
        info!("closing keithley2380 session");
        let _ = self.session.close();
    }
}
