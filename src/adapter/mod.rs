// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Bridge to the external reactive query cache.
//!
//! The adapter is the only component that touches the external cache:
//!
//! ```text
//!   external cache ──CacheEvent──▶ CacheAdapter::handle_event ──▶ MetadataStore
//!                                                                     │
//!   external cache ◀──QueryCache::remove── CacheAdapter::remove ◀── eviction
//! ```
//!
//! - `Added`: auto-registrable keys are classified, sized and registered
//! - `Updated`: counted as an access; size refreshed when it moved materially
//! - `Removed`: orphaned metadata dropped
//!
//! Size estimation never fails: payloads that cannot be serialized get the
//! configured default size.

pub mod events;
pub mod memory;

pub use events::{CacheEvent, CacheObserver, CachePayload};
pub use memory::InMemoryQueryCache;

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use tracing::debug;

use crate::classifier::classify_key;
use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::metadata::{QueryKey, Registration};
use crate::store::{MetadataStore, RegisterOutcome};

/// Removal capability of the external cache.
#[async_trait]
pub trait QueryCache: Send + Sync {
    /// Remove a key. `Ok(false)` when the cache did not hold it.
    async fn remove(&self, key: &QueryKey) -> Result<bool, EngineError>;

    /// Number of queries the cache currently holds.
    fn query_count(&self) -> usize;
}

/// What the adapter did with an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdapterOutcome {
    Registered(RegisterOutcome),
    Accessed,
    Resized { from: usize, to: usize },
    Dropped,
    /// Not auto-registrable, or nothing to do
    Ignored,
}

/// Serialized byte length of `value`, or `fallback` when it cannot be serialized.
pub fn estimate_size<T: Serialize + ?Sized>(value: &T, fallback: usize) -> usize {
    match serde_json::to_vec(value) {
        Ok(bytes) => bytes.len(),
        Err(e) => {
            debug!(error = %e, fallback, "Payload not serializable, using default size");
            fallback
        }
    }
}

pub fn payload_size(payload: &CachePayload, fallback: usize) -> usize {
    match payload {
        CachePayload::Json(value) => estimate_size(value, fallback),
        CachePayload::Bytes(bytes) => bytes.len(),
        CachePayload::Opaque => fallback,
    }
}

/// Whether a change from `old` to `new` bytes exceeds `ratio` of `old`.
#[must_use]
pub fn is_material_change(old: usize, new: usize, ratio: f64) -> bool {
    if old == new {
        return false;
    }
    if old == 0 {
        return true;
    }
    old.abs_diff(new) as f64 > old as f64 * ratio
}

/// Include/exclude prefix rules for auto-registration.
#[must_use]
pub fn is_auto_registrable(key: &QueryKey, config: &EngineConfig) -> bool {
    let included = config.auto_register_include.is_empty()
        || config.auto_register_include.iter().any(|p| key.matches_prefix(p));
    let excluded = config.auto_register_exclude.iter().any(|p| key.matches_prefix(p));
    included && !excluded
}

pub struct CacheAdapter {
    cache: Arc<dyn QueryCache>,
}

impl CacheAdapter {
    pub fn new(cache: Arc<dyn QueryCache>) -> Self {
        Self { cache }
    }

    /// Translate one cache event into store operations.
    pub fn handle_event(&self, store: &MetadataStore, config: &EngineConfig, event: CacheEvent) -> AdapterOutcome {
        match event {
            CacheEvent::Added { key, payload } => self.register_if_allowed(store, config, key, &payload),
            CacheEvent::Updated { key, payload } => {
                if !store.record_access(&key) {
                    return self.register_if_allowed(store, config, key, &payload);
                }
                let new_size = payload_size(&payload, config.default_entry_size_bytes);
                let old_size = store.get(&key).map_or(new_size, |m| m.size);
                if is_material_change(old_size, new_size, config.size_change_ratio) {
                    store.update_size(&key, new_size);
                    debug!(key = %key, from = old_size, to = new_size, "Size estimate refreshed");
                    AdapterOutcome::Resized { from: old_size, to: new_size }
                } else {
                    AdapterOutcome::Accessed
                }
            }
            CacheEvent::Removed { key } => match store.remove(&key) {
                Some(_) => {
                    debug!(key = %key, "External cache dropped entry, metadata removed");
                    AdapterOutcome::Dropped
                }
                None => AdapterOutcome::Ignored,
            },
        }
    }

    fn register_if_allowed(
        &self,
        store: &MetadataStore,
        config: &EngineConfig,
        key: QueryKey,
        payload: &CachePayload,
    ) -> AdapterOutcome {
        if !is_auto_registrable(&key, config) {
            return AdapterOutcome::Ignored;
        }
        let class = classify_key(&key, &config.tier_ttls);
        let registration = Registration::new(class.priority)
            .with_size(payload_size(payload, config.default_entry_size_bytes))
            .with_ttl(class.ttl)
            .with_tags(class.tags);
        AdapterOutcome::Registered(store.register(key, registration))
    }

    /// Remove a key from the external cache.
    pub async fn remove(&self, key: &QueryKey) -> Result<bool, EngineError> {
        self.cache.remove(key).await
    }

    pub fn query_count(&self) -> usize {
        self.cache.query_count()
    }
}
