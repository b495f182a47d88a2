//! neurofunk - hosts a Beetroot player session on the relay

use std::sync::Arc;

use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use neurofunk::{config::Args, fixtures, RelayClient};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file if present
    let _ = dotenvy::dotenv();

    let args = Args::parse();

    let log_level = args.log_level.clone();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("neurofunk={},info", log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if let Err(e) = args.validate() {
        error!("Configuration error: {}", e);
        std::process::exit(1);
    }

    info!("Relay: {}", args.relay);
    info!("Host name: {}", args.host_name);
    info!("User agent: {}", args.user_agent);

    let data = Arc::new(fixtures::load(&args.fixtures)?);
    info!(
        "Loaded {} fixture tracks from {}",
        data.tracks.len(),
        args.fixtures.display()
    );

    let library_data = data.clone();
    let queue_data = data.clone();
    let relay = RelayClient::new(
        args.relay_config()
            .on_library_request(move || {
                info!(tracks = library_data.tracks.len(), "Relay requested library");
            })
            .on_queue_request(move || {
                info!(tracks = queue_data.tracks.len(), "Relay requested queue");
            }),
    )
    .await?;

    let token = relay.get_active_session_token().await?;
    let client_url = relay
        .active_session()
        .await
        .and_then(|s| s.client_url)
        .unwrap_or_default();

    println!("Got session token: {}", token);
    println!("Got client URL:    {}", client_url);

    if !args.connect {
        return Ok(());
    }

    let mut conn = relay.connect().await?;
    info!("Holding player socket, press Ctrl-C to leave");

    tokio::signal::ctrl_c().await?;
    info!("Shutting down");

    if let Err(e) = conn.disconnect().await {
        warn!("Disconnect failed: {}", e);
    }
    relay.delete_session().await?;

    Ok(())
}
