// somnia - synthetic sleep data and servo prediction service
// Main entry point

use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use somnia::config::Settings;
use somnia::models::{LoaderOptions, ModelRegistry};
use somnia::pipeline::InferencePipeline;
use somnia::server;

#[derive(Debug, Parser)]
#[command(name = "somnia", about = "Synthetic sleep data and servo prediction service")]
struct Cli {
    /// Bind address, e.g. 127.0.0.1:8001
    #[arg(long)]
    bind: Option<String>,

    /// Model candidate to try, in order; repeatable. Overrides the
    /// configured candidate list.
    #[arg(long = "model")]
    models: Vec<String>,

    /// Skip model loading and serve from the rule-based generators.
    #[arg(long = "no-model")]
    no_model: bool,

    /// Run inference on the CPU even when an accelerator is available.
    #[arg(long)]
    cpu: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let cli = Cli::parse();
    let mut settings = Settings::load()?;
    if let Some(bind) = cli.bind {
        settings.bind_address = bind;
    }
    if !cli.models.is_empty() {
        settings.model_candidates = cli.models;
    }
    settings.fallback_only |= cli.no_model;
    settings.force_cpu |= cli.cpu;

    let registry = if settings.fallback_only {
        tracing::info!("Model loading disabled, serving rule-based data only");
        ModelRegistry::unavailable()
    } else {
        let candidates = settings.model_candidates.clone();
        let options = LoaderOptions {
            force_cpu: settings.force_cpu,
        };
        // Loading downloads weights and builds the graph; keep it off the
        // async runtime.
        tokio::task::spawn_blocking(move || ModelRegistry::load(&candidates, &options)).await?
    };

    match registry.active_model() {
        Some(name) => tracing::info!("Service ready with model {}", name),
        None if !settings.fallback_only => {
            tracing::warn!("LLM not available - will use fallback methods")
        }
        None => {}
    }

    let pipeline = Arc::new(InferencePipeline::new(Arc::new(registry)));
    server::serve(&settings.bind_address, pipeline).await
}
