//! CLI argument definitions for the Revend server.
//!
//! Priority resolution: CLI args > env vars > config file > defaults. Env
//! vars are applied to the loaded config first, so each `resolve_*` only
//! has to decide between the flag and the already-merged config value.

use clap::Parser;
use std::path::PathBuf;

/// Revend - order and invoice status assistant for distributor queries.
#[derive(Parser, Debug)]
#[command(name = "revend", version, about)]
pub struct CliArgs {
    /// Path to the configuration file.
    #[arg(short = 'c', long = "config")]
    pub config: Option<PathBuf>,

    /// Address the API server binds to.
    #[arg(long = "host")]
    pub host: Option<String>,

    /// API server port.
    #[arg(short = 'p', long = "port")]
    pub port: Option<u16>,

    /// Session storage backend (memory, sqlite, redis).
    #[arg(long = "storage")]
    pub storage: Option<String>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short = 'l', long = "log-level")]
    pub log_level: Option<String>,
}

impl CliArgs {
    /// Resolve the configuration file path.
    ///
    /// Priority: --config flag > REVEND_CONFIG env var > ./revend.toml.
    pub fn resolve_config_path(&self) -> PathBuf {
        self.resolve_config_path_from(std::env::var("REVEND_CONFIG").ok())
    }

    fn resolve_config_path_from(&self, env_value: Option<String>) -> PathBuf {
        if let Some(ref p) = self.config {
            return p.clone();
        }
        if let Some(p) = env_value.filter(|p| !p.is_empty()) {
            return PathBuf::from(p);
        }
        PathBuf::from("revend.toml")
    }

    pub fn resolve_host(&self, config_host: &str) -> String {
        self.host.clone().unwrap_or_else(|| config_host.to_string())
    }

    /// Port 0 in the config means "unset" and falls back to 8000.
    pub fn resolve_port(&self, config_port: u16) -> u16 {
        if let Some(p) = self.port {
            return p;
        }
        if config_port != 0 {
            return config_port;
        }
        8000
    }

    pub fn resolve_storage(&self, config_storage: &str) -> String {
        self.storage
            .clone()
            .unwrap_or_else(|| config_storage.to_string())
    }

    pub fn resolve_log_level(&self, config_level: &str) -> String {
        self.log_level
            .clone()
            .unwrap_or_else(|| config_level.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> CliArgs {
        CliArgs::try_parse_from(std::iter::once("revend").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_parse_all_flags() {
        let args = parse(&[
            "-c", "/etc/revend.toml", "--host", "127.0.0.1", "-p", "9000", "--storage", "sqlite",
            "-l", "debug",
        ]);
        assert_eq!(args.config, Some(PathBuf::from("/etc/revend.toml")));
        assert_eq!(args.resolve_host("0.0.0.0"), "127.0.0.1");
        assert_eq!(args.resolve_port(8000), 9000);
        assert_eq!(args.resolve_storage("memory"), "sqlite");
        assert_eq!(args.resolve_log_level("info"), "debug");
    }

    #[test]
    fn test_config_values_used_without_flags() {
        let args = parse(&[]);
        assert_eq!(args.resolve_host("0.0.0.0"), "0.0.0.0");
        assert_eq!(args.resolve_port(8123), 8123);
        assert_eq!(args.resolve_port(0), 8000);
        assert_eq!(args.resolve_storage("memory"), "memory");
        assert_eq!(args.resolve_log_level("warn"), "warn");
    }

    #[test]
    fn test_config_path_priority() {
        let args = parse(&[]);
        assert_eq!(args.resolve_config_path_from(None), PathBuf::from("revend.toml"));
        assert_eq!(
            args.resolve_config_path_from(Some("/tmp/env.toml".to_string())),
            PathBuf::from("/tmp/env.toml")
        );
        assert_eq!(
            args.resolve_config_path_from(Some(String::new())),
            PathBuf::from("revend.toml")
        );

        let args = parse(&["--config", "cli.toml"]);
        assert_eq!(
            args.resolve_config_path_from(Some("/tmp/env.toml".to_string())),
            PathBuf::from("cli.toml")
        );
    }

    #[test]
    fn test_invalid_port_rejected() {
        assert!(CliArgs::try_parse_from(["revend", "--port", "not-a-port"]).is_err());
    }
}
