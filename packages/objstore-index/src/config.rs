//! Indexer configuration
//!
//! ```yaml
//! provider: sqlite
//! connection: ":memory:"
//! cache:
//!   enabled: true
//!   read_timeout_ms: 2000
//!   write_timeout_ms: 4000
//!   max_queries: 100000
//!   max_objects: 10000000
//!   reduction_factor: 2
//! limits:
//!   max_id_constraint: 500
//!   iterate_page_size: 256
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::{IndexError, Result};

/// Trait for validatable configuration sections
pub trait Validatable {
    fn validate(&self) -> Result<()>;
}

// ═══════════════════════════════════════════════════════════════════════════
// Cache Settings
// ═══════════════════════════════════════════════════════════════════════════

/// Query result cache settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    pub enabled: bool,
    /// Shared-lock timeout; a timed out read is a miss
    pub read_timeout_ms: u64,
    /// Exclusive-lock timeout; a timed out write falls back to a reset
    pub write_timeout_ms: u64,
    /// Eviction threshold on cached queries
    pub max_queries: usize,
    /// Eviction threshold on cached object ids
    pub max_objects: usize,
    /// Fraction of queries removed per eviction pass is `1 / reduction_factor`
    pub reduction_factor: usize,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            read_timeout_ms: 2000,
            write_timeout_ms: 4000,
            max_queries: 100_000,
            max_objects: 10_000_000,
            reduction_factor: 2,
        }
    }
}

impl CacheSettings {
    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    pub fn write_timeout(&self) -> Duration {
        Duration::from_millis(self.write_timeout_ms)
    }
}

impl Validatable for CacheSettings {
    fn validate(&self) -> Result<()> {
        if self.read_timeout_ms == 0 || self.write_timeout_ms == 0 {
            return Err(IndexError::configuration(
                "cache lock timeouts must be greater than zero",
            ));
        }
        if self.write_timeout_ms < self.read_timeout_ms {
            return Err(IndexError::configuration(format!(
                "cache write timeout ({}ms) is shorter than read timeout ({}ms)",
                self.write_timeout_ms, self.read_timeout_ms
            )));
        }
        if self.max_queries == 0 || self.max_objects == 0 {
            return Err(IndexError::configuration(
                "cache eviction thresholds must be greater than zero",
            ));
        }
        Ok(())
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Provider Settings
// ═══════════════════════════════════════════════════════════════════════════

/// Backing-store limits
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderLimits {
    /// Max ids per `DELETE ... IN (...)` statement
    pub max_id_constraint: usize,
    /// Rows fetched per lazy `iterate` page
    pub iterate_page_size: usize,
}

impl Default for ProviderLimits {
    fn default() -> Self {
        Self {
            max_id_constraint: 500,
            iterate_page_size: 256,
        }
    }
}

impl Validatable for ProviderLimits {
    fn validate(&self) -> Result<()> {
        if self.max_id_constraint == 0 {
            return Err(IndexError::configuration("max_id_constraint must be greater than zero"));
        }
        if self.iterate_page_size == 0 {
            return Err(IndexError::configuration("iterate_page_size must be greater than zero"));
        }
        Ok(())
    }
}

/// What a provider constructor receives
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ProviderSettings {
    pub connection: String,
    pub limits: ProviderLimits,
}

impl ProviderSettings {
    pub fn new(connection: impl Into<String>) -> Self {
        Self {
            connection: connection.into(),
            limits: ProviderLimits::default(),
        }
    }

    pub fn with_limits(mut self, limits: ProviderLimits) -> Self {
        self.limits = limits;
        self
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Indexer Config
// ═══════════════════════════════════════════════════════════════════════════

/// Top-level indexer configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexerConfig {
    /// Provider identifier resolved through the registry
    pub provider: String,
    /// Provider connection string
    pub connection: String,
    pub cache: CacheSettings,
    pub limits: ProviderLimits,
}

impl Default for IndexerConfig {
    fn default() -> Self {
        Self {
            provider: "sqlite".to_string(),
            connection: ":memory:".to_string(),
            cache: CacheSettings::default(),
            limits: ProviderLimits::default(),
        }
    }
}

impl IndexerConfig {
    pub fn new(provider: impl Into<String>, connection: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            connection: connection.into(),
            ..Self::default()
        }
    }

    /// Parse and validate YAML
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a YAML file
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_yaml_str(&content)
    }

    /// Parse and validate JSON
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| IndexError::configuration(format!("JSON config error: {}", e)).with_source(e))?;
        config.validate()?;
        Ok(config)
    }

    pub fn provider_settings(&self) -> ProviderSettings {
        ProviderSettings {
            connection: self.connection.clone(),
            limits: self.limits.clone(),
        }
    }
}

impl Validatable for IndexerConfig {
    fn validate(&self) -> Result<()> {
        if self.provider.trim().is_empty() {
            return Err(IndexError::configuration("provider identifier is empty"));
        }
        self.cache.validate()?;
        self.limits.validate()
    }
}
