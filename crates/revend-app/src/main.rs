//! Revend application binary - composition root.
//!
//! 1. Load configuration from TOML, then env vars, then CLI flags
//! 2. Load the entity extractor (model tiers or heuristics)
//! 3. Open the session store
//! 4. Start the axum REST API server

mod cli;

use std::sync::Arc;

use clap::Parser;
use revend_api::state::AppState;
use revend_chat::{ResolutionOrchestrator, SessionService};
use revend_core::RevendConfig;
use revend_nlp::ModelBackedExtractor;
use revend_storage::{open_store, SessionRepository};

use crate::cli::CliArgs;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse();

    // Config.
    let config_file = args.resolve_config_path();
    let mut config = RevendConfig::load_or_default(&config_file);
    config.apply_env_overrides();
    config.api.host = args.resolve_host(&config.api.host);
    config.api.port = args.resolve_port(config.api.port);
    config.storage.storage_type = args.resolve_storage(&config.storage.storage_type);
    config.general.log_level = args.resolve_log_level(&config.general.log_level);

    // Tracing. RUST_LOG wins over the configured level.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.general.log_level)),
        )
        .init();

    tracing::info!("Starting Revend v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!(path = %config_file.display(), "Configuration loaded");

    // Extraction. Model loading reads files and builds ONNX sessions.
    let nlp_config = config.nlp.clone();
    let extractor =
        tokio::task::spawn_blocking(move || ModelBackedExtractor::load(&nlp_config)).await?;
    let extractor_mode = extractor.mode().as_str();
    let tiers = extractor.tier_names().join(" -> ");
    if extractor.is_fallback() {
        tracing::warn!(mode = extractor_mode, tiers = %tiers, "Primary model unavailable, running in fallback mode");
    } else {
        tracing::info!(mode = extractor_mode, tiers = %tiers, "Entity extractor ready");
    }

    // Sessions.
    let store = open_store(&config.storage)?;
    let sessions = SessionService::new(SessionRepository::new(store));

    let orchestrator = ResolutionOrchestrator::new(Arc::new(extractor), sessions)
        .with_max_query_length(config.api.max_query_length);

    // API server.
    let state = AppState::new(config.clone(), orchestrator, extractor_mode);
    if let Err(e) = revend_api::start_server(&config, state).await {
        tracing::error!(error = %e, "API server stopped");
        return Err(e.into());
    }

    Ok(())
}
