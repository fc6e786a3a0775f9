//! Dialogue resolution for Revend.
//!
//! Carries known facts across turns, decides whether a turn can be answered,
//! and composes the reply. [`ResolutionOrchestrator`] runs one turn end to end
//! against the session store.

pub mod context;
pub mod error;
pub mod orchestrator;
pub mod response;
pub mod session;
pub mod validator;

pub use context::merge_context;
pub use error::ChatError;
pub use orchestrator::{ResolutionOrchestrator, TurnResult};
pub use session::SessionService;
pub use validator::{evaluate, TurnOutcome};
