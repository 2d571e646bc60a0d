//! Configuration Module
//!
//! Handles loading cache settings from environment variables.

use std::env;
use std::path::PathBuf;

/// Cache configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Whether hit/miss counting and operation logging start enabled
    pub debug: bool,
    /// Snapshot file loaded by the binary
    pub snapshot_path: Option<PathBuf>,
    /// Keep existing entries when importing a snapshot
    pub skip_duplicates: bool,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `CACHE_DEBUG` - Enable debug mode (default: false)
    /// - `CACHE_SNAPSHOT` - Snapshot path (default: unset)
    /// - `CACHE_SKIP_DUPLICATES` - Skip keys already cached on import (default: false)
    pub fn from_env() -> Self {
        Self {
            debug: env::var("CACHE_DEBUG")
                .ok()
                .and_then(|v| parse_bool(&v))
                .unwrap_or(false),
            snapshot_path: env::var("CACHE_SNAPSHOT")
                .ok()
                .filter(|v| !v.is_empty())
                .map(PathBuf::from),
            skip_duplicates: env::var("CACHE_SKIP_DUPLICATES")
                .ok()
                .and_then(|v| parse_bool(&v))
                .unwrap_or(false),
        }
    }
}

/// Accepts the usual spellings of a boolean flag.
fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert!(!config.debug);
        assert!(config.snapshot_path.is_none());
        assert!(!config.skip_duplicates);
    }

    #[test]
    fn test_config_from_env_defaults() {
        // Clear any existing env vars to test defaults
        env::remove_var("CACHE_DEBUG");
        env::remove_var("CACHE_SNAPSHOT");
        env::remove_var("CACHE_SKIP_DUPLICATES");

        let config = Config::from_env();
        assert!(!config.debug);
        assert!(config.snapshot_path.is_none());
        assert!(!config.skip_duplicates);
    }

    #[test]
    fn test_parse_bool() {
        assert_eq!(parse_bool("TRUE"), Some(true));
        assert_eq!(parse_bool(" 1 "), Some(true));
        assert_eq!(parse_bool("off"), Some(false));
        assert_eq!(parse_bool("maybe"), None);
    }
}
