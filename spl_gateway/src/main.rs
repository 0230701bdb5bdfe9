use anyhow::Context;
use log::{info, LevelFilter};
use spl_gateway::config;
use spl_gateway::proxy_server::GatewayService;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::new()
        .filter_level(LevelFilter::Info)
        .parse_default_env()
        .format_timestamp_millis()
        .init();
    info!("[Main] Logger initialised (default level: Info, RUST_LOG overrides)");

    config::init_config();
    let app_config = config::get_config().context("settings not loaded")?;
    info!(
        "[Main] Settings loaded from {:?}",
        config::get_config_file_path()
    );

    let service = GatewayService::start(app_config)
        .await
        .context("failed to start the gateway")?;
    let addrs = service.addrs();
    info!(
        "[Main] Gateway running. TCP {}, WebSocket {}{}, shadow {}",
        addrs.tcp,
        addrs.websocket,
        app_config.websocket.path,
        addrs
            .shadow
            .map(|a| a.to_string())
            .unwrap_or_else(|| "disabled".to_string())
    );

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for the shutdown signal")?;
    info!("[Main] Shutdown signal received");

    service.stop().await;
    info!("[Main] Gateway stopped");
    Ok(())
}
