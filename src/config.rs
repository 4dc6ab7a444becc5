//! Configuration management for the filtering engine
//!
//! This module provides configuration file support with TOML format,
//! environment variable overrides, and sensible defaults.
//!
//! ```toml
//! [strategy]
//! direct_max = 20000
//! parallel_max = 200000
//!
//! [parallel]
//! num_workers = 8
//!
//! [cache]
//! capacity = 1024
//!
//! [logging]
//! level = "info"
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::query::cache::CacheConfig;
use crate::query::operators::ParallelConfig;
use crate::query::strategy::StrategyConfig;

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct EngineConfig {
    /// Tier selection thresholds
    #[serde(default)]
    pub strategy: StrategyConfig,

    /// Chunked tier worker pool
    #[serde(default)]
    pub parallel: ParallelConfig,

    /// Result cache
    #[serde(default)]
    pub cache: CacheConfig,

    /// Logging
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Log level filter (error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl EngineConfig {
    /// Set tier thresholds
    pub fn with_strategy(mut self, strategy: StrategyConfig) -> Self {
        self.strategy = strategy;
        self
    }

    /// Set worker pool config
    pub fn with_parallel(mut self, parallel: ParallelConfig) -> Self {
        self.parallel = parallel;
        self
    }

    /// Set cache config
    pub fn with_cache(mut self, cache: CacheConfig) -> Self {
        self.cache = cache;
        self
    }

    /// Load configuration from a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)?;
        toml::from_str(&contents).map_err(|e| {
            Error::Configuration(format!("Failed to parse {}: {}", path.display(), e))
        })
    }

    /// Load configuration with environment variable overrides
    pub fn from_file_with_env(path: impl AsRef<Path>) -> Result<Self> {
        let mut config = Self::from_file(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load from environment variables only
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env_overrides();
        config
    }

    /// Apply environment variable overrides
    ///
    /// Unparseable values are ignored and the previous value is kept.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let parsed = |key: &str| lookup(key).and_then(|v| v.trim().parse::<usize>().ok());

        // Strategy
        if let Some(n) = parsed("CARDSIFT_DIRECT_MAX") {
            self.strategy.direct_max = n;
        }
        if let Some(n) = parsed("CARDSIFT_PARALLEL_MAX") {
            self.strategy.parallel_max = n;
        }

        // Parallel
        if let Some(n) = parsed("CARDSIFT_WORKERS") {
            self.parallel.num_workers = n;
        }

        // Cache
        if let Some(n) = parsed("CARDSIFT_CACHE_CAPACITY") {
            self.cache.capacity = n;
        }
        if let Some(enabled) = lookup("CARDSIFT_CACHE_ENABLED").and_then(|v| parse_bool(&v)) {
            self.cache.enabled = enabled;
        }

        // Logging
        if let Some(level) = lookup("RUST_LOG") {
            self.logging.level = level;
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.strategy.direct_max > self.strategy.parallel_max {
            return Err(Error::Configuration(format!(
                "direct_max ({}) cannot exceed parallel_max ({})",
                self.strategy.direct_max, self.strategy.parallel_max
            )));
        }

        if self.strategy.min_chunk_size == 0 {
            return Err(Error::Configuration(
                "min_chunk_size must be > 0".to_string(),
            ));
        }

        if self.parallel.num_workers == 0 {
            return Err(Error::Configuration("num_workers must be > 0".to_string()));
        }

        Ok(())
    }

    /// Save configuration to a TOML file
    pub fn save_to_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let contents = toml::to_string_pretty(self)
            .map_err(|e| Error::Serialization(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, contents)?;
        Ok(())
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    use crate::query::strategy::Tier;

    #[test]
    fn test_default_config() {
        let config = EngineConfig::default();
        assert_eq!(config.strategy.direct_max, 20_000);
        assert_eq!(config.strategy.parallel_max, 200_000);
        assert!(config.cache.enabled);
        assert_eq!(config.logging.level, "info");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_thresholds() {
        let mut config = EngineConfig::default();
        config.strategy.direct_max = 500_000;
        assert!(matches!(config.validate(), Err(Error::Configuration(_))));

        let mut config = EngineConfig::default();
        config.parallel.num_workers = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_toml() {
        let config: EngineConfig = toml::from_str(
            r#"
            [strategy]
            direct_max = 10
            force_tier = "bitmap"

            [cache]
            enabled = false
            "#,
        )
        .unwrap();

        assert_eq!(config.strategy.direct_max, 10);
        assert_eq!(config.strategy.parallel_max, 200_000);
        assert_eq!(config.strategy.force_tier, Some(Tier::Bitmap));
        assert!(!config.cache.enabled);
        assert_eq!(config.cache.capacity, 1_024);
    }

    #[test]
    fn test_overrides() {
        let env: HashMap<&str, &str> = [
            ("CARDSIFT_DIRECT_MAX", "7"),
            ("CARDSIFT_WORKERS", "3"),
            ("CARDSIFT_CACHE_ENABLED", "off"),
            ("CARDSIFT_PARALLEL_MAX", "not-a-number"),
        ]
        .into_iter()
        .collect();

        let mut config = EngineConfig::default();
        config.apply_overrides(|k| env.get(k).map(|v| v.to_string()));

        assert_eq!(config.strategy.direct_max, 7);
        assert_eq!(config.strategy.parallel_max, 200_000);
        assert_eq!(config.parallel.num_workers, 3);
        assert!(!config.cache.enabled);
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cardsift.toml");

        let config = EngineConfig::default().with_cache(CacheConfig::default().with_capacity(9));
        config.save_to_file(&path).unwrap();

        let loaded = EngineConfig::from_file(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            EngineConfig::from_file("/nonexistent/cardsift.toml"),
            Err(Error::Io(_))
        ));
    }
}
