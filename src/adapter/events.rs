// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Typed lifecycle events from the external query cache.

use serde_json::Value;

use crate::metadata::QueryKey;

/// Payload carried by `Added`/`Updated` events. Only used for size estimation.
#[derive(Debug, Clone, PartialEq)]
pub enum CachePayload {
    Json(Value),
    Bytes(Vec<u8>),
    /// Data with no serialized form (streams, handles, class instances)
    Opaque,
}

/// Closed set of cache lifecycle events.
#[derive(Debug, Clone, PartialEq)]
pub enum CacheEvent {
    /// A fetch completed for a key the cache did not hold
    Added { key: QueryKey, payload: CachePayload },
    /// A held key was re-fetched or read
    Updated { key: QueryKey, payload: CachePayload },
    /// The cache dropped a key on its own (GC, manual removal)
    Removed { key: QueryKey },
}

impl CacheEvent {
    #[must_use]
    pub fn key(&self) -> &QueryKey {
        match self {
            Self::Added { key, .. } | Self::Updated { key, .. } | Self::Removed { key } => key,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Added { .. } => "added",
            Self::Updated { .. } => "updated",
            Self::Removed { .. } => "removed",
        }
    }
}

/// Receiver of cache lifecycle events.
///
/// Called synchronously from the cache's notification path; implementations
/// must not block.
pub trait CacheObserver: Send + Sync {
    fn on_event(&self, event: CacheEvent);
}
