use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use airhockey_server::config::ServerConfig;
use airhockey_server::game::engine::FrameSink;
use airhockey_server::lobby::manager::{run_event_pump, LobbyManager};
use airhockey_server::net::session::SessionRegistry;
use airhockey_server::net::transport::TcpTransport;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    info!("Air Hockey Server v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config = ServerConfig::load_or_default();
    config.validate().map_err(anyhow::Error::msg)?;
    info!(
        "Configuration loaded: {}:{}, max_matches={}, tick_rate={}, match={}s, practice={}",
        config.bind_address,
        config.port,
        config.max_matches,
        config.tick_rate,
        config.match_duration_secs,
        config.ai_opponent
    );

    // Shared state
    let sessions = Arc::new(SessionRegistry::default());
    let (events_tx, events_rx) = mpsc::unbounded_channel();
    let sink: Arc<dyn FrameSink> = sessions.clone();
    let lobby_manager = Arc::new(RwLock::new(
        LobbyManager::new(config.max_matches, config.game_loop_config(), events_tx, sink)
            .with_practice(config.ai_opponent),
    ));

    let pump = tokio::spawn(run_event_pump(lobby_manager.clone(), events_rx));

    let server = TcpTransport::bind(&config, lobby_manager.clone(), sessions).await?;
    info!("Server ready on {}", server.local_addr()?);

    // Shutdown signal handler
    let shutdown = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
        info!("Shutdown signal received");
    };

    // Run server with graceful shutdown
    tokio::select! {
        result = server.run() => {
            if let Err(e) = result {
                error!("Server error: {}", e);
            }
        }
        _ = shutdown => {
            info!("Shutting down...");
        }
    }

    // Cleanup
    lobby_manager.write().await.shutdown_all_rooms().await;
    pump.abort();
    info!("Server stopped");

    Ok(())
}
