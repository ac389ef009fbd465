
use log::info;

use crate::error::Result;

/// Enumerate addressable instrument resources on this machine.
///
/// Serial/USB-attached instruments show up as VISA-style `ASRL<port>::INSTR` strings;
/// socket-attached instruments are addressed directly by host and are not enumerable.
/// The listing is ordered and has no side effects beyond the query itself.
pub fn list_resources() -> Result<Vec<String>> {
    info!("listing resources...");

    let mut resources: Vec<String> = serialport::available_ports()?
        .into_iter()
        .map(|port| format!("ASRL{}::INSTR", port.port_name))
        .collect();
    resources.sort();

    Ok(resources)
}
