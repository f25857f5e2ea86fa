//! textai-server: serves `POST /api/generate` for proxied-mode clients.

use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use textai_client::config::{self, ProviderSettings, DEFAULT_HOST, DEFAULT_PORT};
use textai_server::{serve, AppState};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "textai-server", version, about = "Relay prompts to the model provider")]
struct Args {
    /// Config file (default: $TEXTAI_CONFIG, then ~/.textai/config.yaml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Address to bind (overrides server.host)
    #[arg(long)]
    host: Option<String>,

    /// Port to bind (overrides server.port)
    #[arg(short, long)]
    port: Option<u16>,
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    info!("shutting down");
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables from `.env` file into std::env (optional)
    dotenv::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "textai_server=info,textai_client=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    let args = Args::parse();
    let cfg = config::load_or_default(args.config.as_deref())?;

    // Credential is read once here and never again.
    let settings = ProviderSettings::from_env(&cfg);
    if !settings.has_credential() {
        warn!("API_KEY not set; every request will fail with 500");
    }
    let state = Arc::new(AppState::new(&settings)?);

    let host = args
        .host
        .or(cfg.server.host)
        .unwrap_or_else(|| DEFAULT_HOST.to_string());
    let port = args.port.or(cfg.server.port).unwrap_or(DEFAULT_PORT);
    let listener = tokio::net::TcpListener::bind((host.as_str(), port)).await?;
    info!(addr = %listener.local_addr()?, model = %settings.model, "listening");

    serve(listener, state, shutdown_signal()).await?;
    Ok(())
}
