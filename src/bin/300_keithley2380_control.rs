
// Electronic load smoke test: sink 10 A in constant-current mode for ten seconds.
// Use `powerbench::resources::list_resources()` to find serial-attached instruments;
// this bench's load sits behind a socket bridge.

use std::thread;
use std::time::Duration;

use powerbench::devices::keithley2380::{Keithley2380, OperatingMode};
use powerbench::resources;

fn main() -> powerbench::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    for resource in resources::list_resources()? {
        println!("found resource: {}", resource);
    }

    let mut load = Keithley2380::connect("192.168.0.120", 5025)?;

    println!("{}", load.identity()?);
    println!("active mode: {:?}", load.current_mode()?);

    load.set_mode(OperatingMode::ConstantCurrent)?;
    load.set_level(10.0)?;

    load.input_on()?;
    thread::sleep(Duration::from_secs(10));
    load.input_off()?;

    Ok(())
}
