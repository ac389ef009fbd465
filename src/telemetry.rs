
use regex::Regex;
use serde::{Deserialize, Serialize};

lazy_static! {
    // The converter board labels its duty-cycle field "batata" on the wire
    static ref LINE_RE: Regex = Regex::new(
        r"millis: ([0-9]+), batata: ([+-]?[0-9]+\.[0-9]+), freq: ([+-]?[0-9]+\.[0-9]+), v_pa: ([+-]?[0-9]+\.[0-9]+), i_pa: ([+-]?[0-9]+\.[0-9]+), v_ba: ([+-]?[0-9]+\.[0-9]+), i_ba: ([+-]?[0-9]+\.[0-9]+)"
    ).unwrap();
}

/// One telemetry line from the microcontroller: board uptime plus the converter's own
/// voltage/current readings on both sides (power-analyzer side and battery side).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TelemetryFrame {
    pub millis: u64,
    pub duty: f64,
    pub freq: f64,
    pub v_pa: f64,
    pub i_pa: f64,
    pub v_ba: f64,
    pub i_ba: f64,
}

/// Parse one serial line. Lines that do not match the telemetry format (boot banners,
/// partial reads) yield `None`; the caller just keeps reading.
pub fn parse_line(line: &str) -> Option<TelemetryFrame> {
    let caps = LINE_RE.captures(line)?;

    let float = |i: usize| caps.get(i).unwrap().as_str().parse::<f64>().ok();

    Some(TelemetryFrame {
        millis: caps.get(1).unwrap().as_str().parse::<u64>().ok()?,
        duty: float(2)?,
        freq: float(3)?,
        v_pa: float(4)?,
        i_pa: float(5)?,
        v_ba: float(6)?,
        i_ba: float(7)?,
    })
}

#[cfg(test)]
mod tests {
    use super::parse_line;

    #[test]
    fn parses_a_well_formed_line() {
        let line = "millis: 123456, batata: 0.42, freq: 100000.0, v_pa: 48.01, i_pa: 1.25, v_ba: 12.60, i_ba: -4.73";
        let frame = parse_line(line).unwrap();

        assert_eq!(frame.millis, 123_456);
        assert_eq!(frame.duty, 0.42);
        assert_eq!(frame.freq, 100_000.0);
        assert_eq!(frame.v_pa, 48.01);
        assert_eq!(frame.i_pa, 1.25);
        assert_eq!(frame.v_ba, 12.60);
        assert_eq!(frame.i_ba, -4.73);
    }

    #[test]
    fn matches_inside_a_noisy_line() {
        // Partial boot output can end up glued to the front of a valid frame
        let line = "boot ok\rmillis: 1, batata: 0.10, freq: 1.0, v_pa: 1.0, i_pa: 1.0, v_ba: 1.0, i_ba: 1.0";
        assert!(parse_line(line).is_some());
    }

    #[test]
    fn rejects_non_telemetry_lines() {
        assert!(parse_line("READY").is_none());
        assert!(parse_line("millis: 12, batata: nope").is_none());
        // Integer-formatted floats are not part of the wire format
        assert!(parse_line("millis: 1, batata: 1, freq: 1, v_pa: 1, i_pa: 1, v_ba: 1, i_ba: 1").is_none());
    }
}
