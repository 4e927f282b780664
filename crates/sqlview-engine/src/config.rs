//! Facade configuration
//!
//! Connection pragmas and facade defaults. Can be built in code with the
//! `with_*` methods or parsed from a TOML table:
//!
//! ```toml
//! foreign_keys = false
//! busy_timeout_ms = 5000
//! default_page_limit = 250
//! ```

use crate::error::{EngineError, EngineResult};
use serde::{Deserialize, Serialize};

/// First SQLite release with serialize/deserialize compiled in by default
pub const MIN_ENGINE_VERSION: i32 = 3_036_000;

/// Rows returned by `read_table` when the caller does not choose a limit
pub const DEFAULT_PAGE_LIMIT: u64 = 100;

/// Engine facade configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Enforce foreign key constraints on every handle (off by default)
    pub foreign_keys: bool,

    /// Busy timeout in milliseconds
    pub busy_timeout_ms: u32,

    /// Page cache size (negative = KiB, positive = pages)
    pub cache_size: i32,

    /// Run `VACUUM` after creating an empty database
    pub vacuum_on_create: bool,

    /// Limit used by `EngineFacade::default_page`
    pub default_page_limit: u64,

    /// Minimum linked SQLite version, as `sqlite3_libversion_number()`
    pub min_engine_version: i32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            foreign_keys: false,
            busy_timeout_ms: 5000,
            cache_size: -2000,
            vacuum_on_create: true,
            default_page_limit: DEFAULT_PAGE_LIMIT,
            min_engine_version: MIN_ENGINE_VERSION,
        }
    }
}

impl EngineConfig {
    /// Create a configuration with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a configuration from TOML. Missing keys take their defaults.
    pub fn from_toml_str(input: &str) -> EngineResult<Self> {
        toml::from_str(input).map_err(|e| EngineError::Config(e.to_string()))
    }

    /// Enable or disable foreign key enforcement
    pub fn with_foreign_keys(mut self, enabled: bool) -> Self {
        self.foreign_keys = enabled;
        self
    }

    /// Set busy timeout
    pub fn with_busy_timeout(mut self, ms: u32) -> Self {
        self.busy_timeout_ms = ms;
        self
    }

    /// Set cache size
    pub fn with_cache_size(mut self, size: i32) -> Self {
        self.cache_size = size;
        self
    }

    /// Toggle the compaction pass on `create_database`
    pub fn with_vacuum_on_create(mut self, enabled: bool) -> Self {
        self.vacuum_on_create = enabled;
        self
    }

    /// Set the default page limit
    pub fn with_default_page_limit(mut self, limit: u64) -> Self {
        self.default_page_limit = limit;
        self
    }

    /// Require a minimum linked engine version
    pub fn with_min_engine_version(mut self, version: i32) -> Self {
        self.min_engine_version = version;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert!(!config.foreign_keys);
        assert!(config.vacuum_on_create);
        assert_eq!(config.default_page_limit, 100);
        assert_eq!(config.min_engine_version, MIN_ENGINE_VERSION);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = EngineConfig::from_toml_str(
            r#"
            default_page_limit = 25
            foreign_keys = true
            "#,
        )
        .unwrap();

        assert_eq!(config.default_page_limit, 25);
        assert!(config.foreign_keys);
        assert_eq!(config.busy_timeout_ms, 5000);
    }

    #[test]
    fn test_bad_toml_is_config_error() {
        let err = EngineConfig::from_toml_str("default_page_limit = \"lots\"").unwrap_err();
        assert!(matches!(err, EngineError::Config(_)));
    }

    #[test]
    fn test_builder() {
        let config = EngineConfig::new()
            .with_busy_timeout(100)
            .with_cache_size(64)
            .with_vacuum_on_create(false);
        assert_eq!(config.busy_timeout_ms, 100);
        assert_eq!(config.cache_size, 64);
        assert!(!config.vacuum_on_create);
    }
}
