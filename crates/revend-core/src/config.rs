use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::Result;

/// Prefix shared by every environment override.
pub const ENV_PREFIX: &str = "REVEND_";

/// Top-level configuration for the Revend service.
///
/// Loaded from `config.toml` by default. Each section corresponds to one
/// crate of the workspace; every field has a default so partial files work.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RevendConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub nlp: NlpConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub auth: AuthConfig,
}

impl RevendConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: RevendConfig = toml::from_str(&content)?;
        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Load configuration from a TOML file, falling back to defaults if the
    /// file does not exist or cannot be parsed.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(
                    "Failed to load config from {}: {}. Using defaults.",
                    path.display(),
                    e
                );
                Self::default()
            }
        }
    }

    /// Save the current configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        info!("Configuration saved to {}", path.display());
        Ok(())
    }

    /// Apply `REVEND_*` environment variables on top of the loaded values.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|name| std::env::var(name).ok());
    }

    /// Apply overrides from an arbitrary lookup (env-like, unprefixed names).
    ///
    /// Unparseable numeric values are ignored with a warning.
    pub fn apply_overrides_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(&format!("{}{}", ENV_PREFIX, name));

        if let Some(v) = get("NER_MODEL") {
            self.nlp.model_dir = v;
        }
        if let Some(v) = get("FALLBACK_NER_MODEL") {
            self.nlp.fallback_model_dir = Some(v);
        }
        if let Some(v) = get("API_HOST") {
            self.api.host = v;
        }
        if let Some(v) = get("API_PORT") {
            match v.parse::<u16>() {
                Ok(port) => self.api.port = port,
                Err(_) => warn!(value = %v, "Ignoring invalid {}API_PORT", ENV_PREFIX),
            }
        }
        if let Some(v) = get("CORS_ORIGINS") {
            self.api.cors_origins = v
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }
        if let Some(v) = get("STORAGE_TYPE") {
            self.storage.storage_type = v;
        }
        if let Some(v) = get("SQLITE_DB_PATH") {
            self.storage.sqlite_db_path = v;
        }
        if let Some(v) = get("REDIS_URL") {
            self.storage.redis_url = v;
        }
        if let Some(v) = get("LOG_LEVEL") {
            self.general.log_level = v;
        }
        if let Some(v) = get("SECRET_KEY") {
            self.auth.secret_key = v;
        }
        if let Some(v) = get("ACCESS_TOKEN_EXPIRE_MINUTES") {
            match v.parse::<u32>() {
                Ok(minutes) => self.auth.token_ttl_minutes = minutes,
                Err(_) => warn!(
                    value = %v,
                    "Ignoring invalid {}ACCESS_TOKEN_EXPIRE_MINUTES",
                    ENV_PREFIX
                ),
            }
        }
    }
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level: trace, debug, info, warn, error.
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

/// HTTP server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,
    /// Allowed CORS origins. `"*"` allows any origin.
    pub cors_origins: Vec<String>,
    /// Maximum accepted query length in characters.
    pub max_query_length: usize,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            cors_origins: vec!["*".to_string()],
            max_query_length: 2000,
        }
    }
}

/// Entity-extraction model configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NlpConfig {
    /// Directory of the task-specific token-classification model.
    pub model_dir: String,
    /// Directory of the generic NER model tried when the primary fails to load.
    pub fallback_model_dir: Option<String>,
}

impl Default for NlpConfig {
    fn default() -> Self {
        Self {
            model_dir: "models/ner-bert-base-portuguese-cased".to_string(),
            fallback_model_dir: Some("models/xlm-roberta-base".to_string()),
        }
    }
}

/// Session storage configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Backend: "memory", "sqlite" or "redis".
    pub storage_type: String,
    /// Database file used by the sqlite backend.
    pub sqlite_db_path: String,
    /// Server URL used by the redis backend.
    pub redis_url: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            storage_type: "memory".to_string(),
            sqlite_db_path: "./storage.db".to_string(),
            redis_url: "redis://localhost:6379/0".to_string(),
        }
    }
}

/// Session token configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Mixed into token hashes so tokens do not outlive a key rotation.
    pub secret_key: String,
    /// Lifetime of an issued session token.
    pub token_ttl_minutes: u32,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            secret_key: "local-development-secret".to_string(),
            token_ttl_minutes: 30,
        }
    }
}
