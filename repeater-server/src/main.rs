use anyhow::{Context, Result};
use axum::routing::get;
use axum::Router;
use clap::Parser;
use repeater_server::{ws_handler, Coordinator, TransportConfig};
use tracing::{info, Level};

/// Selective forwarding unit: WebSocket signaling in, RTP fan-out.
#[derive(Parser)]
#[command(name = "repeater-server", version)]
struct Args {
    /// Listen address for the WebSocket control channel.
    #[arg(long, default_value = "0.0.0.0:8080")]
    addr: String,

    /// STUN/TURN URL handed to every peer transport (repeatable).
    #[arg(long = "ice-server")]
    ice_servers: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt().with_max_level(Level::INFO).init();

    let coordinator = Coordinator::new(TransportConfig::from_urls(args.ice_servers));

    let app = Router::new()
        .route("/", get(ws_handler))
        .with_state(coordinator);

    let listener = tokio::net::TcpListener::bind(&args.addr)
        .await
        .with_context(|| format!("failed to bind {}", args.addr))?;
    info!("Listening on {}", args.addr);

    axum::serve(listener, app).await.context("server terminated")?;

    Ok(())
}
