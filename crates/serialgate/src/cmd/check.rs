use serde::Serialize;
use serialgate_route::Router;

use crate::cmd::CheckArgs;
use crate::config::Settings;
use crate::exit::{frame_error, link_error, CliError, CliResult, DATA_INVALID, SUCCESS};
use crate::output::{print_json, OutputFormat};

#[derive(Debug, Serialize)]
struct CheckReport {
    config: String,
    fields: usize,
    topics: Vec<String>,
    active_topics: Option<Vec<String>>,
    multiplexed: bool,
    port: String,
}

pub fn run(args: CheckArgs, format: OutputFormat) -> CliResult<i32> {
    let settings = Settings::from_file(&args.config)?;
    let registry = settings.registry()?;
    let gateway = settings.gateway_config();

    gateway
        .frame
        .validate()
        .map_err(|err| frame_error("framing rejected", err))?;
    gateway
        .heartbeat
        .validate()
        .map_err(|err| link_error("heartbeat rejected", err))?;
    Router::new(gateway.router.clone())
        .map_err(|err| CliError::new(DATA_INVALID, format!("routing rejected: {err}")))?;
    if !gateway.supervisor.autofind && gateway.supervisor.port.is_none() {
        return Err(CliError::new(
            DATA_INVALID,
            "ports.autofind is off but ports.port is not set",
        ));
    }

    let report = CheckReport {
        config: args.config.display().to_string(),
        fields: registry.len(),
        topics: registry.topics(),
        active_topics: settings.topics.clone(),
        multiplexed: gateway.frame.multiplexed,
        port: match &gateway.supervisor.port {
            Some(port) if !gateway.supervisor.autofind => port.clone(),
            _ => "autofind".to_string(),
        },
    };

    match format {
        OutputFormat::Json => print_json(&report),
        OutputFormat::Table | OutputFormat::Pretty => {
            println!("config ok: {}", report.config);
            println!("  fields: {}", report.fields);
            println!("  topics: {}", report.topics.join(", "));
            if let Some(active) = &report.active_topics {
                println!("  active: {}", active.join(", "));
            }
            println!("  multiplexed: {}", report.multiplexed);
            println!("  port: {}", report.port);
        }
    }

    Ok(SUCCESS)
}
