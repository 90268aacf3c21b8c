//! TOML configuration.
//!
//! ```toml
//! [executor]
//! backend_timeout_secs = 15
//! downgrade_policy = "block"
//!
//! # Optional. Without [[tiers]] the reference catalog is used.
//! [[tiers]]
//! tier = "personal"
//! display_name = "Personal"
//! monthly_price = "9.99"
//! # ...
//! ```

use std::{path::Path, time::Duration};

use serde::{Deserialize, Serialize};

use crate::{
    catalog::{TierCatalog, TierConfiguration},
    error::{GateError, Result},
    transition::DowngradePolicy,
};

/// Default bound on a single backend call.
pub const DEFAULT_BACKEND_TIMEOUT_SECS: u64 = 15;

const MAX_BACKEND_TIMEOUT_SECS: u64 = 120;

/// Settings for gates and the transition executor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExecutorSettings {
    /// Seconds before a backend call is abandoned.
    pub backend_timeout_secs: u64,
    /// Handling of downgrades that leave usage over the new limits.
    pub downgrade_policy: DowngradePolicy,
}

impl Default for ExecutorSettings {
    fn default() -> Self {
        Self {
            backend_timeout_secs: DEFAULT_BACKEND_TIMEOUT_SECS,
            downgrade_policy: DowngradePolicy::default(),
        }
    }
}

impl ExecutorSettings {
    /// Backend timeout as a [`Duration`].
    #[must_use]
    pub const fn backend_timeout(&self) -> Duration {
        Duration::from_secs(self.backend_timeout_secs)
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GateConfig {
    /// Executor settings.
    pub executor: ExecutorSettings,
    /// Tier catalog override.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tiers: Vec<TierConfiguration>,
}

impl GateConfig {
    /// Parses and validates a TOML document.
    ///
    /// # Errors
    ///
    /// Returns [`GateError::Config`] if parsing fails, or the validation
    /// error from [`validate`](Self::validate).
    ///
    /// # Examples
    ///
    /// ```
    /// use tier_gate::{config::GateConfig, transition::DowngradePolicy};
    ///
    /// let config = GateConfig::from_toml(
    ///     r#"
    ///     [executor]
    ///     downgrade_policy = "allow_over_limit"
    ///     "#,
    /// )
    /// .unwrap();
    ///
    /// assert_eq!(config.executor.downgrade_policy, DowngradePolicy::AllowOverLimit);
    /// assert_eq!(config.executor.backend_timeout_secs, 15);
    /// ```
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        let config: Self = toml::from_str(toml_str)
            .map_err(|e| GateError::Config(format!("invalid TOML config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses, and validates a TOML file.
    ///
    /// # Errors
    ///
    /// Returns [`GateError::Config`] if the file cannot be read, or any
    /// error from [`from_toml`](Self::from_toml).
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| GateError::Config(format!("cannot read config file: {e}")))?;
        Self::from_toml(&content)
    }

    /// Checks the timeout range and, when tiers are given, the catalog.
    ///
    /// # Errors
    ///
    /// Returns [`GateError::Config`] for an out-of-range timeout, or
    /// [`GateError::Catalog`] for an inconsistent tier list.
    pub fn validate(&self) -> Result<()> {
        let timeout = self.executor.backend_timeout_secs;
        if !(1..=MAX_BACKEND_TIMEOUT_SECS).contains(&timeout) {
            return Err(GateError::Config(format!(
                "backend_timeout_secs must be between 1 and {MAX_BACKEND_TIMEOUT_SECS}, got \
                 {timeout}"
            )));
        }
        self.catalog().map(|_| ())
    }

    /// Builds the catalog: the configured tiers, or the reference catalog
    /// when none are configured.
    ///
    /// # Errors
    ///
    /// Returns [`GateError::Catalog`] if the configured tiers are inconsistent.
    pub fn catalog(&self) -> Result<TierCatalog> {
        if self.tiers.is_empty() {
            return Ok(TierCatalog::reference());
        }
        TierCatalog::from_configurations(self.tiers.clone())
    }
}
