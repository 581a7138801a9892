//! Configuration management for the execution engine
//!
//! Loads configuration from TOML files with environment variable substitution.

use crate::client::RpcConfig;
use crate::types::ExecutionConfig;

use anyhow::{Context, Result};
use lazy_static::lazy_static;
use regex::Regex;
use serde::Deserialize;
use std::env;
use std::path::{Path, PathBuf};

/// Environment variable naming the config file
pub const CONFIG_ENV: &str = "EXECUTION_ENGINE_CONFIG";

const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

lazy_static! {
    static ref ENV_VAR_PATTERN: Regex =
        Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}").expect("static pattern is valid");
}

/// Root configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Default endpoint used when none is given on the command line
    pub endpoint: Option<String>,
    pub execution: ExecutionConfig,
    pub rpc: RpcConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter used when `RUST_LOG` is unset
    pub filter: String,
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "info,tx_execution_engine=debug,hyper=warn,reqwest=warn".to_string(),
            json: false,
        }
    }
}

impl Settings {
    /// Load settings from the file named by `EXECUTION_ENGINE_CONFIG`.
    ///
    /// Falls back to defaults when the variable is unset and the default
    /// path does not exist.
    pub fn load() -> Result<Self> {
        match env::var(CONFIG_ENV) {
            Ok(path) => Self::load_from(path),
            Err(_) => {
                let path = PathBuf::from(DEFAULT_CONFIG_PATH);
                if path.exists() {
                    Self::load_from(path)
                } else {
                    tracing::debug!("No config file found, using defaults");
                    Ok(Self::default())
                }
            }
        }
    }

    /// Load settings from a specific file
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let config_str = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        Self::parse(&config_str)
    }

    /// Parse settings from TOML text
    pub fn parse(config_str: &str) -> Result<Self> {
        // Substitute environment variables
        let config_str = substitute_env_vars(config_str);

        let mut settings: Settings =
            toml::from_str(&config_str).with_context(|| "Failed to parse configuration")?;

        // An unset ${VAR} leaves an empty endpoint behind
        if settings
            .endpoint
            .as_deref()
            .is_some_and(|e| e.trim().is_empty())
        {
            settings.endpoint = None;
        }

        settings.validate()?;

        Ok(settings)
    }

    /// Validate configuration
    fn validate(&self) -> Result<()> {
        self.execution
            .validate()
            .context("Invalid [execution] section")?;

        if self.rpc.request_timeout_secs == 0 {
            anyhow::bail!("rpc.request_timeout_secs must be positive");
        }

        Ok(())
    }
}

/// Substitute environment variables in the format ${VAR_NAME}
fn substitute_env_vars(input: &str) -> String {
    ENV_VAR_PATTERN
        .replace_all(input, |caps: &regex::Captures| {
            env::var(&caps[1]).unwrap_or_default()
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_env_var_substitution() {
        env::set_var("EXECUTION_ENGINE_TEST_VAR", "test_value");
        let input = "url = \"https://api.example.com/${EXECUTION_ENGINE_TEST_VAR}/endpoint\"";
        let result = substitute_env_vars(input);
        assert_eq!(result, "url = \"https://api.example.com/test_value/endpoint\"");
    }

    #[test]
    fn test_missing_env_var_becomes_empty() {
        let result = substitute_env_vars("key = \"${EXECUTION_ENGINE_SURELY_UNSET}\"");
        assert_eq!(result, "key = \"\"");
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
endpoint = "https://api.devnet.example.com"

[execution]
max_retries = 3
max_timeout_secs = 90
target_confirmations = 10
require_finalized = false

[rpc]
request_timeout_secs = 15
"#
        )
        .unwrap();

        let settings = Settings::load_from(file.path()).unwrap();
        assert_eq!(
            settings.endpoint.as_deref(),
            Some("https://api.devnet.example.com")
        );
        assert_eq!(settings.execution.max_retries, 3);
        assert_eq!(settings.execution.max_timeout_secs, 90);
        assert!(!settings.execution.require_finalized);
        assert_eq!(settings.execution.poll_interval_ms, 1000);
        assert_eq!(settings.rpc.request_timeout_secs, 15);
        assert_eq!(settings.rpc.preflight_commitment, "finalized");
    }

    #[test]
    fn test_rejects_zero_retries() {
        let err = Settings::parse("[execution]\nmax_retries = 0").unwrap_err();
        assert!(format!("{:#}", err).contains("max_retries"));
    }

    #[test]
    fn test_empty_file_uses_defaults() {
        let settings = Settings::parse("").unwrap();
        assert!(settings.endpoint.is_none());
        assert_eq!(settings.execution, ExecutionConfig::default());
    }

    #[test]
    fn test_unset_endpoint_variable_means_no_endpoint() {
        let settings =
            Settings::parse("endpoint = \"${EXECUTION_ENGINE_UNSET_ENDPOINT}\"").unwrap();
        assert!(settings.endpoint.is_none());
    }

    #[test]
    fn test_default_config_file_parses() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join(DEFAULT_CONFIG_PATH);
        let settings = Settings::load_from(path).unwrap();
        assert_eq!(settings.execution.max_retries, 3);
        assert!(settings.execution.require_finalized);
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(Settings::load_from(dir.path().join("absent.toml")).is_err());
    }
}
