//! Configuration management for the keychain workspace.

use crate::types::Amount;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub limits: LimitsConfig,
    pub deposits: DepositConfig,
}

/// Validation limits applied to names and membership size.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitsConfig {
    /// Maximum number of keys a keychain may hold.
    pub max_keys: usize,
    pub min_name_len: usize,
    pub max_name_len: usize,
}

/// Flat escrow amount backing each record kind, refunded at destruction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DepositConfig {
    pub domain: Amount,
    pub keychain: Amount,
    /// Backs one membership-index entry.
    pub key: Amount,
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn default_config() -> Self {
        Self {
            limits: LimitsConfig {
                max_keys: 5,
                min_name_len: 2,
                max_name_len: 32,
            },
            deposits: DepositConfig {
                domain: 2_000_000,
                keychain: 3_000_000,
                key: 1_500_000,
            },
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::default_config()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_limits() {
        let config = Config::default_config();
        assert_eq!(config.limits.max_keys, 5);
        assert_eq!(config.limits.min_name_len, 2);
        assert_eq!(config.limits.max_name_len, 32);
    }

    #[test]
    fn test_config_toml_round_trip() {
        let config = Config::default_config();
        let text = toml::to_string(&config).unwrap();
        let parsed: Config = toml::from_str(&text).unwrap();
        assert_eq!(parsed.deposits.key, config.deposits.key);
        assert_eq!(parsed.limits.max_keys, config.limits.max_keys);
    }
}
