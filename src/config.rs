// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Configuration for the prioritization engine.
//!
//! # Example
//!
//! ```
//! use query_priority_cache::{EngineConfig, EvictionStrategy};
//!
//! // Defaults: 50 MB budget, soft 80%, critical 95%, hybrid eviction
//! let config = EngineConfig::default();
//! assert_eq!(config.max_cache_bytes, 50 * 1024 * 1024);
//! assert_eq!(config.eviction_strategy, EvictionStrategy::Hybrid);
//!
//! // Overrides
//! let config = EngineConfig {
//!     max_cache_bytes: 8 * 1024 * 1024,
//!     pressure_check_interval_ms: 5_000,
//!     auto_register_exclude: vec!["auth/otp".into()],
//!     ..Default::default()
//! };
//! assert!(config.validate().is_ok());
//! ```

use std::time::Duration;

use serde::Deserialize;

use crate::classifier::PatternThresholds;
use crate::error::EngineError;
use crate::eviction::EvictionStrategy;
use crate::metadata::Priority;

/// Engine configuration.
///
/// Every field has a default, so a partial JSON/TOML document deserializes.
#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    /// Memory budget for tracked entries, in bytes (default: 50 MB)
    #[serde(default = "default_max_cache_bytes")]
    pub max_cache_bytes: usize,

    /// Pressure thresholds as fractions of `max_cache_bytes`
    #[serde(default = "default_soft_pressure_threshold")]
    pub soft_pressure_threshold: f64,
    #[serde(default = "default_critical_pressure_threshold")]
    pub critical_pressure_threshold: f64,

    /// Fraction of eviction candidates removed by gentle cleanup
    #[serde(default = "default_gentle_eviction_fraction")]
    pub gentle_eviction_fraction: f64,
    /// Fraction of eviction candidates removed by aggressive cleanup
    #[serde(default = "default_aggressive_eviction_fraction")]
    pub aggressive_eviction_fraction: f64,
    /// Fraction of Medium entries demoted to Low before aggressive eviction
    #[serde(default = "default_medium_demotion_fraction")]
    pub medium_demotion_fraction: f64,

    #[serde(default)]
    pub eviction_strategy: EvictionStrategy,

    /// Timer intervals
    #[serde(default = "default_pressure_check_interval_ms")]
    pub pressure_check_interval_ms: u64,
    #[serde(default = "default_ttl_sweep_interval_ms")]
    pub ttl_sweep_interval_ms: u64,

    #[serde(default)]
    pub pattern_thresholds: PatternThresholds,

    /// TTL applied when a registration does not carry its own
    #[serde(default)]
    pub tier_ttls: TierTtls,

    /// Size assumed for payloads that cannot be serialized
    #[serde(default = "default_entry_size_bytes")]
    pub default_entry_size_bytes: usize,

    /// Relative size change that counts as material on `Updated` events
    #[serde(default = "default_size_change_ratio")]
    pub size_change_ratio: f64,

    /// Key prefixes eligible for auto-registration (empty = all keys)
    #[serde(default)]
    pub auto_register_include: Vec<String>,
    /// Key prefixes never auto-registered
    #[serde(default)]
    pub auto_register_exclude: Vec<String>,

    /// Bounded length of the in-memory action log
    #[serde(default = "default_action_log_capacity")]
    pub action_log_capacity: usize,
}

fn default_max_cache_bytes() -> usize { 50 * 1024 * 1024 } // 50 MB
fn default_soft_pressure_threshold() -> f64 { 0.80 }
fn default_critical_pressure_threshold() -> f64 { 0.95 }
fn default_gentle_eviction_fraction() -> f64 { 0.30 }
fn default_aggressive_eviction_fraction() -> f64 { 0.50 }
fn default_medium_demotion_fraction() -> f64 { 0.50 }
fn default_pressure_check_interval_ms() -> u64 { 30_000 }
fn default_ttl_sweep_interval_ms() -> u64 { 60_000 }
fn default_entry_size_bytes() -> usize { 1024 }
fn default_size_change_ratio() -> f64 { 0.10 }
fn default_action_log_capacity() -> usize { 1000 }

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_cache_bytes: default_max_cache_bytes(),
            soft_pressure_threshold: default_soft_pressure_threshold(),
            critical_pressure_threshold: default_critical_pressure_threshold(),
            gentle_eviction_fraction: default_gentle_eviction_fraction(),
            aggressive_eviction_fraction: default_aggressive_eviction_fraction(),
            medium_demotion_fraction: default_medium_demotion_fraction(),
            eviction_strategy: EvictionStrategy::default(),
            pressure_check_interval_ms: default_pressure_check_interval_ms(),
            ttl_sweep_interval_ms: default_ttl_sweep_interval_ms(),
            pattern_thresholds: PatternThresholds::default(),
            tier_ttls: TierTtls::default(),
            default_entry_size_bytes: default_entry_size_bytes(),
            size_change_ratio: default_size_change_ratio(),
            auto_register_include: Vec::new(),
            auto_register_exclude: Vec::new(),
            action_log_capacity: default_action_log_capacity(),
        }
    }
}

impl EngineConfig {
    #[must_use]
    pub fn pressure_check_interval(&self) -> Duration {
        Duration::from_millis(self.pressure_check_interval_ms)
    }

    #[must_use]
    pub fn ttl_sweep_interval(&self) -> Duration {
        Duration::from_millis(self.ttl_sweep_interval_ms)
    }

    /// Reject configurations the engine cannot honor.
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.max_cache_bytes == 0 {
            return Err(EngineError::InvalidConfig("max_cache_bytes must be > 0".into()));
        }
        if !(self.soft_pressure_threshold > 0.0
            && self.soft_pressure_threshold <= self.critical_pressure_threshold)
        {
            return Err(EngineError::InvalidConfig(format!(
                "pressure thresholds must satisfy 0 < soft ({}) <= critical ({})",
                self.soft_pressure_threshold, self.critical_pressure_threshold
            )));
        }
        for (name, value) in [
            ("gentle_eviction_fraction", self.gentle_eviction_fraction),
            ("aggressive_eviction_fraction", self.aggressive_eviction_fraction),
            ("medium_demotion_fraction", self.medium_demotion_fraction),
        ] {
            if !(value > 0.0 && value <= 1.0) {
                return Err(EngineError::InvalidConfig(format!(
                    "{name} must be in (0, 1], got {value}"
                )));
            }
        }
        if self.pressure_check_interval_ms == 0 || self.ttl_sweep_interval_ms == 0 {
            return Err(EngineError::InvalidConfig("timer intervals must be > 0".into()));
        }
        if Priority::ALL.iter().any(|p| self.tier_ttls.for_priority(*p).is_zero()) {
            return Err(EngineError::InvalidConfig("tier TTLs must be > 0".into()));
        }
        if self.size_change_ratio < 0.0 {
            return Err(EngineError::InvalidConfig("size_change_ratio must be >= 0".into()));
        }
        Ok(())
    }
}

/// Default TTL per priority tier, in milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TierTtls {
    #[serde(default = "default_critical_ttl_ms")]
    pub critical_ms: u64,
    #[serde(default = "default_high_ttl_ms")]
    pub high_ms: u64,
    #[serde(default = "default_medium_ttl_ms")]
    pub medium_ms: u64,
    #[serde(default = "default_low_ttl_ms")]
    pub low_ms: u64,
    #[serde(default = "default_background_ttl_ms")]
    pub background_ms: u64,
}

fn default_critical_ttl_ms() -> u64 { 30 * 60_000 }
fn default_high_ttl_ms() -> u64 { 15 * 60_000 }
fn default_medium_ttl_ms() -> u64 { 10 * 60_000 }
fn default_low_ttl_ms() -> u64 { 5 * 60_000 }
fn default_background_ttl_ms() -> u64 { 2 * 60_000 }

impl Default for TierTtls {
    fn default() -> Self {
        Self {
            critical_ms: default_critical_ttl_ms(),
            high_ms: default_high_ttl_ms(),
            medium_ms: default_medium_ttl_ms(),
            low_ms: default_low_ttl_ms(),
            background_ms: default_background_ttl_ms(),
        }
    }
}

impl TierTtls {
    #[must_use]
    pub fn for_priority(&self, priority: Priority) -> Duration {
        let ms = match priority {
            Priority::Critical => self.critical_ms,
            Priority::High => self.high_ms,
            Priority::Medium => self.medium_ms,
            Priority::Low => self.low_ms,
            Priority::Background => self.background_ms,
        };
        Duration::from_millis(ms)
    }
}
