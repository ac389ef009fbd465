
// Smoke test for the multimeter driver: connect, identify, take a few synchronous
// measurements.

use powerbench::devices::dmm4050::Dmm4050;

fn main() -> powerbench::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let mut meter = Dmm4050::connect("192.168.0.185")?;

    println!("{}", meter.identity()?);

    meter.set_sample_count(1)?;

    for _ in 0..10 {
        let [current, voltage] = meter.measure_sync()?;
        println!("{:.6} A  {:.6} V", current, voltage);
    }

    Ok(())
}
