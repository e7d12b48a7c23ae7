use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use lingua_practice::providers::ProviderFactory;
use lingua_practice::{create_router, AppState, Config, MemoryStore, TimedPlayback};
use tracing::info;

#[derive(Parser)]
#[command(name = "lingua-practice", about = "Voice conversation practice service")]
struct Cli {
    /// Config file (without extension), e.g. config/lingua-practice
    #[arg(long, default_value = "config/lingua-practice")]
    config: String,

    /// Override the configured bind address
    #[arg(long)]
    bind: Option<String>,

    /// Override the configured port
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    let mut cfg = Config::load(&cli.config)?;
    if let Some(bind) = cli.bind {
        cfg.service.http.bind = bind;
    }
    if let Some(port) = cli.port {
        cfg.service.http.port = port;
    }

    info!("{} v{}", cfg.service.name, env!("CARGO_PKG_VERSION"));

    let providers = ProviderFactory::build(
        &cfg.providers.transcription,
        &cfg.providers.generation,
        &cfg.providers.synthesis,
    )?;

    info!(
        "providers: stt={}, llm={}, tts={} (fallback: {})",
        providers.transcriber.name(),
        providers.generator.name(),
        providers.synthesizer.name(),
        providers.fallback_synthesizer.name(),
    );

    let addr = format!("{}:{}", cfg.service.http.bind, cfg.service.http.port);

    let state = AppState::new(
        Arc::new(cfg),
        Arc::new(MemoryStore::new()),
        providers,
        Arc::new(TimedPlayback),
    );
    let router = create_router(state);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;

    info!("listening on {}", addr);

    axum::serve(listener, router).await?;

    Ok(())
}
