use std::sync::Arc;

use serialgate_link::Gateway;
use serialgate_route::{Dispatcher, JsonLinesSink};
use serialgate_transport::PortProvider;
use tracing::info;

use crate::cmd::RunArgs;
use crate::config::Settings;
use crate::exit::{io_error, link_error, CliResult, SUCCESS};

/// Run the gateway until Ctrl-C or until no port is left to try.
pub fn run(args: RunArgs) -> CliResult<i32> {
    let settings = Settings::from_file(&args.config)?;
    let registry = settings.registry()?;

    let mut config = settings.gateway_config();
    if let Some(port) = args.port {
        config.supervisor.autofind = false;
        config.supervisor.port = Some(port);
    }
    config.debug_mode |= args.debug_frames;

    let dispatcher = Dispatcher::new(settings.dispatch_config())
        .with_sink(JsonLinesSink::new(std::io::stdout()));
    let provider: Arc<dyn PortProvider> = Arc::new(settings.port_provider());
    let gateway = Gateway::new(config, registry, dispatcher, provider)
        .map_err(|err| link_error("gateway setup failed", err))?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|err| io_error("runtime start failed", err))?;

    runtime.block_on(async move {
        let handle = gateway.handle();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("interrupt received, shutting down");
                handle.shutdown();
            }
        });
        gateway.run().await
    })
    .map_err(|err| link_error("gateway stopped", err))?;

    Ok(SUCCESS)
}
