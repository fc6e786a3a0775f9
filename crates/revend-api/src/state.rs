//! Application state shared across all route handlers.

use std::sync::Arc;
use std::time::Instant;

use revend_chat::ResolutionOrchestrator;
use revend_core::RevendConfig;

use crate::auth::TokenRegistry;

/// Shared application state.
///
/// All fields use `Arc` for cheap cloning across handler tasks.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration, fixed at startup.
    pub config: Arc<RevendConfig>,
    /// Turn processing and session access.
    pub orchestrator: Arc<ResolutionOrchestrator>,
    /// Issued session tokens.
    pub tokens: Arc<TokenRegistry>,
    /// Which extraction tier the model loader settled on.
    pub extractor_mode: &'static str,
    /// Server start time for uptime calculation.
    pub start_time: Instant,
}

impl AppState {
    pub fn new(
        config: RevendConfig,
        orchestrator: ResolutionOrchestrator,
        extractor_mode: &'static str,
    ) -> Self {
        let tokens = TokenRegistry::from_config(&config.auth);
        Self {
            config: Arc::new(config),
            orchestrator: Arc::new(orchestrator),
            tokens: Arc::new(tokens),
            extractor_mode,
            start_time: Instant::now(),
        }
    }
}
