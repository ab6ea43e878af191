use serialgate_transport::{PortProvider, SystemPorts};

use crate::cmd::PortsArgs;
use crate::exit::{transport_error, CliResult, SUCCESS};
use crate::output::{print_ports, OutputFormat};

pub fn run(args: PortsArgs, format: OutputFormat) -> CliResult<i32> {
    let mut ports = SystemPorts::default()
        .list_ports()
        .map_err(|err| transport_error("port enumeration failed", err))?;

    if let Some(filter) = &args.filter {
        ports.retain(|port| port.name.contains(filter.as_str()));
    }

    print_ports(&ports, format);
    Ok(SUCCESS)
}
