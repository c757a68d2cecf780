use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use echoscript::models::ModelContext;
use echoscript::pipeline::{PipelineOptions, TranscriptionPipeline};
use echoscript::{create_router, AppState, Config};
use tracing::{error, info};

#[derive(Debug, Parser)]
#[command(name = "echoscript", about = "Speech transcription service")]
struct Args {
    /// Configuration file (basename, resolved by the config loader).
    #[arg(long)]
    config: Option<String>,

    /// Override the HTTP bind address.
    #[arg(long)]
    bind: Option<String>,

    /// Override the HTTP port.
    #[arg(long)]
    port: Option<u16>,

    /// Override the inference device (auto/cpu/cuda).
    #[arg(long)]
    device: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let args = Args::parse();

    let mut cfg = match &args.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    if let Some(bind) = args.bind {
        cfg.service.http.bind = bind;
    }
    if let Some(port) = args.port {
        cfg.service.http.port = port;
    }
    if let Some(device) = args.device {
        cfg.models.device = device;
    }

    info!("{} v{}", cfg.service.name, env!("CARGO_PKG_VERSION"));
    info!(
        "Models: asr={} vad={} punc={} spk={:?} (enable_spk={})",
        cfg.models.asr_model,
        cfg.models.vad_model,
        cfg.models.punc_model,
        cfg.models.spk_model,
        cfg.models.enable_spk
    );

    let cfg = Arc::new(cfg);
    let state = AppState::new(Arc::clone(&cfg));

    // Load models in the background so /health can report "loading" while
    // the runtime warms up.
    {
        let state = state.clone();
        let cfg = Arc::clone(&cfg);
        tokio::spawn(async move {
            match ModelContext::from_config(&cfg.models).await {
                Ok(ctx) => {
                    let options = PipelineOptions::from_config(&cfg);
                    match TranscriptionPipeline::new(Arc::new(ctx), options) {
                        Ok(pipeline) => {
                            state.set_ready(Arc::new(pipeline)).await;
                            info!("Models loaded, service ready");
                        }
                        Err(e) => {
                            error!("Failed to build pipeline: {e:#}");
                            state.set_error().await;
                        }
                    }
                }
                Err(e) => {
                    error!("Failed to load models: {e:#}");
                    state.set_error().await;
                }
            }
        });
    }

    let addr = format!("{}:{}", cfg.service.http.bind, cfg.service.http.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;

    info!("HTTP server listening on {}", addr);

    axum::serve(listener, create_router(state))
        .await
        .context("HTTP server failed")?;

    Ok(())
}
