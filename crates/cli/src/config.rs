//! `VerifyConfig`: optional TOML settings for a verification run.
//!
//! ```toml
//! [lookup]
//! timeout_ms = 1000
//! timeout_multiplier = 2
//!
//! [policy]
//! passthrough_hals = ["android.hardware.graphics.mapper"]
//! legacy_api_level = 27
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use vintf_analyze::Policy;
use vintf_registry::DEFAULT_LOOKUP_TIMEOUT;

#[derive(Debug, thiserror::Error)]
pub(crate) enum ConfigError {
    #[error("cannot read config {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("lookup timeout_multiplier must be greater than zero")]
    ZeroMultiplier,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub(crate) struct VerifyConfig {
    #[serde(default)]
    pub lookup: LookupSettings,
    #[serde(default)]
    pub policy: Policy,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub(crate) struct LookupSettings {
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Overrides the device's `ro.hw_timeout_multiplier`.
    #[serde(default)]
    pub timeout_multiplier: Option<u32>,
}

fn default_timeout_ms() -> u64 {
    DEFAULT_LOOKUP_TIMEOUT.as_millis() as u64
}

impl Default for LookupSettings {
    fn default() -> Self {
        LookupSettings {
            timeout_ms: default_timeout_ms(),
            timeout_multiplier: None,
        }
    }
}

impl LookupSettings {
    pub fn base(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl VerifyConfig {
    pub fn from_toml_str(source: &str, path: &Path) -> Result<Self, ConfigError> {
        let config: VerifyConfig = toml::from_str(source).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        if config.lookup.timeout_multiplier == Some(0) {
            return Err(ConfigError::ZeroMultiplier);
        }
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let source = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        VerifyConfig::from_toml_str(&source, path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(source: &str) -> Result<VerifyConfig, ConfigError> {
        VerifyConfig::from_toml_str(source, Path::new("test.toml"))
    }

    #[test]
    fn empty_file_uses_defaults() {
        let config = parse("").unwrap();
        assert_eq!(config, VerifyConfig::default());
        assert_eq!(config.lookup.base(), Duration::from_millis(1000));
        assert_eq!(config.policy.legacy_aidl_fcm_level, 5);
    }

    #[test]
    fn partial_tables_keep_other_defaults() {
        let config = parse(
            r#"
            [lookup]
            timeout_multiplier = 3

            [policy]
            passthrough_hals = ["android.hidl.memory"]
            "#,
        )
        .unwrap();
        assert_eq!(config.lookup.timeout_ms, 1000);
        assert_eq!(config.lookup.timeout_multiplier, Some(3));
        assert_eq!(config.policy.passthrough_hals, vec!["android.hidl.memory"]);
        assert_eq!(config.policy.legacy_api_level, 27);
    }

    #[test]
    fn rejects_bad_values() {
        assert!(matches!(parse("[lookup]\ntimeout_ms = \"soon\""), Err(ConfigError::Parse { .. })));
        assert!(matches!(parse("[lookup]\ntimeout_multiplier = 0"), Err(ConfigError::ZeroMultiplier)));
    }
}
