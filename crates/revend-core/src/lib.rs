pub mod config;
pub mod error;
pub mod types;

pub use config::RevendConfig;
pub use error::{Result, RevendError};
pub use types::*;
