//! Small validation helpers shared by the engine.

use crate::error::{KeychainError, Result};
use keychain_core::LimitsConfig;

/// Validate a domain or keychain name against the configured limits.
///
/// Names are lowercase ASCII letters and digits only, so the same
/// string always derives the same record id without normalization.
pub(crate) fn validate_name(name: &str, limits: &LimitsConfig) -> Result<()> {
    if name.len() < limits.min_name_len {
        return Err(KeychainError::InvalidName(format!(
            "{name}: shorter than {} characters",
            limits.min_name_len
        )));
    }
    if name.len() > limits.max_name_len {
        return Err(KeychainError::InvalidName(format!(
            "{name}: longer than {} characters",
            limits.max_name_len
        )));
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
    {
        return Err(KeychainError::InvalidName(format!(
            "{name}: only lowercase letters and digits are allowed"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use keychain_core::Config;

    fn limits() -> LimitsConfig {
        Config::default_config().limits
    }

    #[test]
    fn test_valid_names() {
        for name in ["player1", "ab", "42"] {
            assert!(validate_name(name, &limits()).is_ok(), "{name}");
        }
        assert!(validate_name(&"x".repeat(32), &limits()).is_ok());
    }

    #[test]
    fn test_rejects_short_and_long_names() {
        assert!(validate_name("a", &limits()).is_err());
        assert!(validate_name(&"x".repeat(33), &limits()).is_err());
    }

    #[test]
    fn test_rejects_uppercase_spaces_and_symbols() {
        for name in ["Player1", "player 1", "player-1", "player_1"] {
            assert!(validate_name(name, &limits()).is_err(), "{name}");
        }
    }
}
