// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! In-memory query cache with lifecycle notifications.
//!
//! A minimal stand-in for a reactive query cache: it holds payloads by key and
//! reports `Added`/`Updated`/`Removed` to a subscribed [`CacheObserver`].
//! Observers are notified after the map lock is released, so they may call
//! back into the cache.

use std::sync::{Arc, Weak};

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::RwLock;

use super::events::{CacheEvent, CacheObserver, CachePayload};
use super::QueryCache;
use crate::error::EngineError;
use crate::metadata::QueryKey;

pub struct InMemoryQueryCache {
    data: DashMap<QueryKey, CachePayload>,
    observer: RwLock<Option<Weak<dyn CacheObserver>>>,
}

impl InMemoryQueryCache {
    #[must_use]
    pub fn new() -> Self {
        Self {
            data: DashMap::new(),
            observer: RwLock::new(None),
        }
    }

    /// Subscribe an observer. Held weakly, so the observer may own this cache.
    pub fn subscribe<O: CacheObserver + 'static>(&self, observer: &Arc<O>) {
        let weak: Weak<dyn CacheObserver> = Arc::downgrade(observer) as Weak<dyn CacheObserver>;
        *self.observer.write() = Some(weak);
    }

    /// Store a payload, emitting `Added` or `Updated`.
    pub fn insert(&self, key: QueryKey, payload: CachePayload) {
        let previous = self.data.insert(key.clone(), payload.clone());
        let event = match previous {
            Some(_) => CacheEvent::Updated { key, payload },
            None => CacheEvent::Added { key, payload },
        };
        self.notify(event);
    }

    #[must_use]
    pub fn get(&self, key: &QueryKey) -> Option<CachePayload> {
        self.data.get(key).map(|r| r.value().clone())
    }

    #[must_use]
    pub fn contains(&self, key: &QueryKey) -> bool {
        self.data.contains_key(key)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Drop every entry, emitting `Removed` for each.
    pub fn clear(&self) {
        let keys: Vec<QueryKey> = self.data.iter().map(|r| r.key().clone()).collect();
        for key in keys {
            if self.data.remove(&key).is_some() {
                self.notify(CacheEvent::Removed { key });
            }
        }
    }

    fn notify(&self, event: CacheEvent) {
        let observer = self.observer.read().as_ref().and_then(Weak::upgrade);
        if let Some(observer) = observer {
            observer.on_event(event);
        }
    }
}

impl Default for InMemoryQueryCache {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl QueryCache for InMemoryQueryCache {
    async fn remove(&self, key: &QueryKey) -> Result<bool, EngineError> {
        let removed = self.data.remove(key).is_some();
        if removed {
            self.notify(CacheEvent::Removed { key: key.clone() });
        }
        Ok(removed)
    }

    fn query_count(&self) -> usize {
        self.data.len()
    }
}
