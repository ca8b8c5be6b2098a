// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Prioritization engine coordinator.
//!
//! The [`CacheCoordinator`] is the explicit context object that ties the
//! components together:
//! - metadata store with embedded tag index
//! - cache adapter (event intake and removal seam)
//! - eviction policy, pressure monitor and TTL sweeper
//! - bounded action log
//!
//! It implements [`CacheObserver`], so it can be subscribed directly to an
//! external cache. Periodic passes are driven by
//! [`MaintenanceHandle`](crate::maintenance::MaintenanceHandle).
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use query_priority_cache::{CacheCoordinator, EngineConfig, InMemoryQueryCache, CachePayload, QueryKey, Priority};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let cache = Arc::new(InMemoryQueryCache::new());
//! let coordinator = Arc::new(CacheCoordinator::new(EngineConfig::default(), cache.clone()).unwrap());
//! cache.subscribe(&coordinator);
//!
//! cache.insert(QueryKey::from("profile/me"), CachePayload::Opaque);
//! let meta = coordinator.get_metadata(&QueryKey::from("profile/me")).unwrap();
//! assert_eq!(meta.priority, Priority::High);
//! # }
//! ```

mod api;
mod cleanup;
mod stats;
mod types;

pub use types::{CacheStats, EntryAge, MemoryStats, PressureOutcome};

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, info};

use crate::action_log::{ActionLog, ActionRecord, CacheAction};
use crate::adapter::{AdapterOutcome, CacheAdapter, CacheEvent, CacheObserver, QueryCache};
use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::store::{MetadataStore, RegisterOutcome};
use crate::metadata::QueryKey;

/// Main prioritization engine.
///
/// # Thread Safety
///
/// `Send + Sync`. Store mutations are single critical sections; no lock is
/// held across an `.await`.
pub struct CacheCoordinator {
    /// Runtime-replaceable configuration
    pub(super) config: RwLock<EngineConfig>,

    pub(super) store: MetadataStore,

    pub(super) adapter: CacheAdapter,

    pub(super) actions: ActionLog,

    /// Set while a pressure pass (or forced cleanup) runs
    pub(super) pressure_pass: AtomicBool,

    /// Set while a TTL sweep runs
    pub(super) sweep_pass: AtomicBool,
}

impl CacheCoordinator {
    /// Create a coordinator over `cache`. Fails when `config` is invalid.
    pub fn new(config: EngineConfig, cache: Arc<dyn QueryCache>) -> Result<Self, EngineError> {
        config.validate()?;
        info!(
            max_cache_bytes = config.max_cache_bytes,
            strategy = %config.eviction_strategy,
            "Cache coordinator created"
        );
        Ok(Self {
            store: MetadataStore::new(config.pattern_thresholds, config.tier_ttls.clone()),
            actions: ActionLog::new(config.action_log_capacity),
            config: RwLock::new(config),
            adapter: CacheAdapter::new(cache),
            pressure_pass: AtomicBool::new(false),
            sweep_pass: AtomicBool::new(false),
        })
    }

    /// Current configuration (cloned).
    #[must_use]
    pub fn config(&self) -> EngineConfig {
        self.config.read().clone()
    }

    /// Replace the configuration at runtime.
    ///
    /// Thresholds, fractions and strategy apply from the next pass. The action
    /// log is resized immediately. Timer intervals apply to maintenance started
    /// afterwards. Existing entries keep their TTLs.
    pub fn update_config(&self, config: EngineConfig) -> Result<(), EngineError> {
        config.validate()?;
        self.store.reconfigure(config.pattern_thresholds, config.tier_ttls.clone());
        self.actions.set_capacity(config.action_log_capacity);
        info!(
            max_cache_bytes = config.max_cache_bytes,
            strategy = %config.eviction_strategy,
            "Configuration updated"
        );
        *self.config.write() = config;
        Ok(())
    }

    /// The underlying metadata store.
    #[must_use]
    pub fn store(&self) -> &MetadataStore {
        &self.store
    }

    /// Up to `n` most recent actions, oldest first.
    #[must_use]
    pub fn recent_actions(&self, n: usize) -> Vec<ActionRecord> {
        self.actions.recent(n)
    }

    pub(super) fn publish_gauges(&self) {
        crate::metrics::set_tracked_bytes(self.store.total_size());
        crate::metrics::set_tracked_entries(self.store.len());
    }

    pub(super) fn log_registration(&self, key: &QueryKey, outcome: RegisterOutcome) {
        match outcome {
            RegisterOutcome::Created => {
                if let Some(meta) = self.store.get(key) {
                    crate::metrics::record_registration(meta.priority);
                }
                self.actions.record(key, CacheAction::Register);
            }
            RegisterOutcome::Updated { priority_change: Some((from, to)) } => {
                crate::metrics::record_priority_change(from, to);
                self.actions.record(key, CacheAction::PriorityChange { from, to });
            }
            RegisterOutcome::Updated { priority_change: None } => {}
        }
    }
}

impl CacheObserver for CacheCoordinator {
    fn on_event(&self, event: CacheEvent) {
        let key = event.key().clone();
        let kind = event.kind();
        let config = self.config();
        let outcome = self.adapter.handle_event(&self.store, &config, event);
        debug!(key = %key, event = kind, outcome = ?outcome, "Cache event handled");

        match outcome {
            AdapterOutcome::Registered(registered) => {
                self.log_registration(&key, registered);
                self.publish_gauges();
            }
            AdapterOutcome::Resized { .. } | AdapterOutcome::Dropped => self.publish_gauges(),
            AdapterOutcome::Accessed | AdapterOutcome::Ignored => {}
        }
    }
}

/// Exclusive claim on one maintenance concern, released on drop (including unwind).
pub(super) struct PassGuard<'a>(&'a AtomicBool);

impl<'a> PassGuard<'a> {
    pub(super) fn try_acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for PassGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}
