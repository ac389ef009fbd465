
// Power analyzer smoke test: select DC voltage and current with auto ranging on the 20 A
// shunt, poll opportunistically for a while, then take a few synchronous samples and dump
// them to a JSON file.

use powerbench::devices::pa1000::{Metric, MetricSelection, Pa1000, Shunt};

fn main() -> powerbench::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let mut analyzer = Pa1000::connect("192.168.0.108")?;

    analyzer.select_metrics(&[
        MetricSelection::auto(Metric::VoltageDc),
        MetricSelection::auto(Metric::CurrentDc),
    ])?;
    analyzer.select_shunt(Shunt::Internal20A)?;

    println!("reporting metrics: {:?}", analyzer.get_metrics()?);

    for _ in 0..1000 {
        println!("{:?}", analyzer.measure_or_none()?);
    }

    let mut samples: Vec<Vec<f64>> = vec![];
    for _ in 0..10 {
        let sample = analyzer.measure_sync()?;
        println!("{:?}", sample);
        samples.push(sample);
    }

    std::fs::write(
        "./pa1000_samples.json",
        serde_json::to_string_pretty(&samples).unwrap().as_bytes(),
    )?;

    Ok(())
}
