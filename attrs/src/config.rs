//! Engine configuration loading
//!
//! Loads configuration from `~/.config/lotto-attrs/attrs.toml` (or the
//! `LOTTO_ATTRS_CONFIG` env var). Every field has a default, so a missing
//! file is not an error.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::errors::{AttrsError, Result};

/// Root configuration for the attribute engine
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct AttrsConfig {
    /// Attribute table endpoint (queried with `year` and `number_type`)
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Per-request timeout in milliseconds
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,

    /// Years loaded by `Engine::initialize`
    #[serde(default)]
    pub preload_years: Vec<i32>,
}

fn default_endpoint() -> String {
    "http://127.0.0.1:8080/api/attribute".to_string()
}

fn default_request_timeout_ms() -> u64 {
    10_000
}

impl Default for AttrsConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            request_timeout_ms: default_request_timeout_ms(),
            preload_years: Vec::new(),
        }
    }
}

impl AttrsConfig {
    /// Overrides the config file location
    pub const ENV_CONFIG_PATH: &'static str = "LOTTO_ATTRS_CONFIG";

    pub const DEFAULT_CONFIG_FILENAME: &'static str = "attrs.toml";

    /// Load the engine configuration.
    ///
    /// `LOTTO_ATTRS_CONFIG` names the file when set and non-empty; otherwise
    /// `~/.config/lotto-attrs/attrs.toml` is used. A missing file (or no home
    /// directory at all) yields the defaults.
    pub fn load() -> Result<Self> {
        match Self::config_path() {
            Some(path) if path.is_file() => Self::load_from_path(&path),
            Some(path) => {
                tracing::info!(path = %path.display(), "no attrs config file, using defaults");
                Ok(Self::default())
            }
            None => {
                tracing::info!("no home directory for attrs config, using defaults");
                Ok(Self::default())
            }
        }
    }

    /// Read and validate the TOML file at `path`; errors name the path.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let origin = path.display().to_string();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            AttrsError::config_with_source(format!("cannot read attrs config {origin}"), e)
        })?;
        Self::from_toml(&contents, &origin)
    }

    /// Parse and validate an in-memory TOML document.
    pub fn parse(contents: &str) -> Result<Self> {
        Self::from_toml(contents, "<inline>")
    }

    fn from_toml(contents: &str, origin: &str) -> Result<Self> {
        let cfg = toml::from_str::<Self>(contents).map_err(|e| {
            AttrsError::config_with_source(format!("malformed attrs config {origin}"), e)
        })?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    fn config_path() -> Option<PathBuf> {
        match std::env::var_os(Self::ENV_CONFIG_PATH) {
            Some(path) if !path.is_empty() => Some(PathBuf::from(path)),
            _ => dirs::home_dir().map(|home| {
                [".config", "lotto-attrs", Self::DEFAULT_CONFIG_FILENAME]
                    .iter()
                    .fold(home, |dir, part| dir.join(part))
            }),
        }
    }

    fn validate(&self) -> Result<()> {
        if self.endpoint.trim().is_empty() {
            return Err(AttrsError::config("endpoint must not be empty"));
        }

        if self.request_timeout_ms == 0 {
            return Err(AttrsError::config("request_timeout_ms must be positive"));
        }

        for year in &self.preload_years {
            if !(1900..=2999).contains(year) {
                tracing::warn!(year, "preload year looks out of range");
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let cfg = AttrsConfig::default();
        assert_eq!(cfg.request_timeout(), Duration::from_secs(10));
        assert!(cfg.preload_years.is_empty());
    }

    #[test]
    fn test_parse_full_config() {
        let toml = r#"
            endpoint = "https://example.test/api/attr"
            request_timeout_ms = 2500
            preload_years = [2024, 2025]
        "#;

        let cfg = AttrsConfig::parse(toml).expect("should parse");
        assert_eq!(cfg.endpoint, "https://example.test/api/attr");
        assert_eq!(cfg.request_timeout_ms, 2500);
        assert_eq!(cfg.preload_years, vec![2024, 2025]);
    }

    #[test]
    fn test_parse_applies_defaults() {
        let cfg = AttrsConfig::parse("preload_years = [2023]").expect("should parse");
        assert_eq!(cfg.endpoint, default_endpoint());
        assert_eq!(cfg.request_timeout_ms, 10_000);
    }

    #[test]
    fn test_invalid_config_rejected() {
        assert!(AttrsConfig::parse(r#"endpoint = """#).is_err());
        assert!(AttrsConfig::parse("request_timeout_ms = 0").is_err());
        assert!(AttrsConfig::parse("preload_years = \"2024\"").is_err());
    }

    #[test]
    fn test_load_from_path() {
        let mut file = tempfile::NamedTempFile::new().expect("tempfile");
        writeln!(file, "request_timeout_ms = 500").expect("write");

        let cfg = AttrsConfig::load_from_path(file.path()).expect("should load");
        assert_eq!(cfg.request_timeout(), Duration::from_millis(500));
    }

    #[test]
    fn test_load_errors_name_the_file() {
        let mut file = tempfile::NamedTempFile::new().expect("tempfile");
        writeln!(file, "request_timeout_ms = \"soon\"").expect("write");

        let err = AttrsConfig::load_from_path(file.path()).unwrap_err();
        assert!(err.to_string().contains(&file.path().display().to_string()));

        let dir = tempfile::tempdir().expect("tempdir");
        let missing = dir.path().join("absent.toml");
        let err = AttrsConfig::load_from_path(&missing).unwrap_err();
        assert_eq!(err.category(), crate::errors::ErrorCategory::ConfigError);
    }
}
