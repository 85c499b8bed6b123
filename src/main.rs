use game_relay::config::RelayConfig;
use game_relay::engine::ChessEngine;
use game_relay::error::Result;
use game_relay::server::RelayServer;
use game_relay::utils::logging::init_logging;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    let mut config = match std::env::args().nth(1) {
        Some(path) => RelayConfig::from_file(path)?,
        None => RelayConfig::default(),
    };
    config.apply_env()?;

    config.validate_strict()?;
    init_logging(&config.logging)?;

    let server = RelayServer::bind(&config, ChessEngine::new()).await?;
    info!(
        tcp = ?server.tcp_addr(),
        udp = ?server.udp_addr(),
        "relay listening"
    );

    let shutdown = server.shutdown_token();
    tokio::spawn(async move {
        if let Ok(()) = tokio::signal::ctrl_c().await {
            info!("Received CTRL+C signal, shutting down");
            shutdown.cancel();
        }
    });

    server.run().await
}
