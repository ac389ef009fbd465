
// Efficiency characterization run: reads the converter board's telemetry stream and, for
// every frame, triggers both multimeters and logs the board's own readings next to the
// bench readings. Addresses and wiring are fixed properties of this bench.

use std::io::BufRead;
use std::path::Path;
use std::thread;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use powerbench::devices::dmm4050::Dmm4050;
use powerbench::logfile::RunLog;
use powerbench::telemetry::{self, TelemetryFrame};

const TELEMETRY_PORT: &str = "/dev/ttyACM0";
const TELEMETRY_BAUD: u32 = 115_200;

// Meter on the power-analyzer side of the converter and meter on the battery side
const METER_PA_HOST: &str = "192.168.0.174";
const METER_BA_HOST: &str = "192.168.0.185";

const LOG_DIR: &str = "./output";
const LOG_HEADER: &[&str] = &[
    "time", "millis", "duty", "freq", "v_pa", "i_pa", "v_ba", "i_ba",
    "meter_v_pa", "meter_i_pa", "meter_v_ba", "meter_i_ba",
];

fn main() -> powerbench::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let serial = serialport::new(TELEMETRY_PORT, TELEMETRY_BAUD)
        .parity(serialport::Parity::None)
        .stop_bits(serialport::StopBits::One)
        .data_bits(serialport::DataBits::Eight)
        .timeout(Duration::from_secs(1))
        .open()?;
    let mut serial = std::io::BufReader::new(serial);

    let mut meter_pa = Dmm4050::connect(METER_PA_HOST)?;
    let mut meter_ba = Dmm4050::connect(METER_BA_HOST)?;

    std::fs::create_dir_all(LOG_DIR)?;
    let mut log = RunLog::create(Path::new(LOG_DIR), LOG_HEADER)?;
    println!("logging to {}", log.path().display());

    // The board counts millis from boot, so the run starts from a known zero
    println!("reset the device, then press enter");
    let _ = std::io::stdin().read_line(&mut String::new());

    loop {
        let frame = next_frame(&mut serial)?;

        // Trigger both meters back to back so they sample the same operating point
        meter_pa.trigger()?;
        meter_ba.trigger()?;
        thread::sleep(Duration::from_millis(300));

        let [meter_i_pa, meter_v_pa] = meter_pa.measure_sync()?;
        let [meter_i_ba, meter_v_ba] = meter_ba.measure_sync()?;

        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs_f64();

        log.append(&[
            now,
            frame.millis as f64,
            frame.duty,
            frame.freq,
            frame.v_pa,
            frame.i_pa,
            frame.v_ba,
            frame.i_ba,
            meter_v_pa,
            meter_i_pa,
            meter_v_ba,
            meter_i_ba,
        ])?;
    }
}

/// Keep reading serial lines until one parses as telemetry. Read timeouts just mean the
/// board is quiet; keep waiting.
fn next_frame<R: BufRead>(serial: &mut R) -> powerbench::Result<TelemetryFrame> {
    loop {
        let mut line = String::new();
        match serial.read_line(&mut line) {
            Ok(_) => {}
            Err(ref e)
                if e.kind() == std::io::ErrorKind::TimedOut
                    || e.kind() == std::io::ErrorKind::WouldBlock =>
            {
                continue;
            }
            Err(e) => return Err(e.into()),
        }

        if let Some(frame) = telemetry::parse_line(&line) {
            return Ok(frame);
        }
    }
}
