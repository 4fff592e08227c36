use anyhow::Result;
use clap::Parser;
use loqa_speech::{server, Config, SessionConfig, SessionRegistry};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "loqa-speech", version, about = "Per-session streaming speech-to-text service")]
struct Args {
    /// Config file (extension optional); missing file falls back to defaults
    #[arg(short, long, default_value = "config/loqa-speech")]
    config: String,

    /// Override service.http.bind
    #[arg(long)]
    bind: Option<String>,

    /// Override service.http.port
    #[arg(long)]
    port: Option<u16>,

    /// Log filter used when RUST_LOG is not set
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level)),
        )
        .init();

    let mut cfg = Config::load(&args.config)?;
    if let Some(bind) = args.bind {
        cfg.service.http.bind = bind;
    }
    if let Some(port) = args.port {
        cfg.service.http.port = port;
    }

    info!("Loqa Speech v{}", env!("CARGO_PKG_VERSION"));
    info!(
        "STT model: {} (backend={:?}, language={})",
        cfg.stt.model,
        cfg.stt.backend,
        cfg.stt.language.as_deref().unwrap_or("auto")
    );
    info!(
        "Audio format: {}Hz, {} channel(s), {}-bit",
        cfg.audio.sample_rate, cfg.audio.channels, cfg.audio.bits_per_sample
    );

    let registry = Arc::new(SessionRegistry::with_configured_engines(SessionConfig::from(&cfg)));

    server::run(cfg, registry).await
}
