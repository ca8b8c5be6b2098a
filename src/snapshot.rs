// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Versioned metadata snapshots for warm-starting a new session.
//!
//! Monotonic instants cannot cross a process boundary, so entries record
//! ages relative to the export time and are re-anchored on import. A snapshot
//! whose `version` differs from [`SNAPSHOT_FORMAT_VERSION`] is rejected as a
//! whole; entries already past their TTL are skipped.
//!
//! ```
//! use query_priority_cache::snapshot::{Snapshot, SNAPSHOT_FORMAT_VERSION};
//!
//! let json = format!(r#"{{"version":"{SNAPSHOT_FORMAT_VERSION}","entries":[]}}"#);
//! let snapshot = Snapshot::from_json(&json).unwrap();
//! assert!(snapshot.entries.is_empty());
//! ```

use std::collections::BTreeSet;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use crate::classifier::{classify_pattern, PatternThresholds};
use crate::error::EngineError;
use crate::metadata::{CacheEntryMetadata, Priority, QueryKey};

pub const SNAPSHOT_FORMAT_VERSION: &str = "query-priority-cache/1";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotEntry {
    pub key: QueryKey,
    pub priority: Priority,
    pub size: usize,
    pub ttl_ms: u64,
    /// Time since creation at export
    pub age_ms: u64,
    /// Time since last access at export
    pub idle_ms: u64,
    pub access_count: u64,
    #[serde(default)]
    pub tags: BTreeSet<String>,
    #[serde(default)]
    pub is_stale: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub version: String,
    pub entries: Vec<SnapshotEntry>,
}

impl Snapshot {
    /// Capture `entries` as of `now`.
    pub fn capture(entries: &[CacheEntryMetadata], now: Instant) -> Self {
        Self {
            version: SNAPSHOT_FORMAT_VERSION.to_string(),
            entries: entries
                .iter()
                .map(|m| SnapshotEntry {
                    key: m.key.clone(),
                    priority: m.priority,
                    size: m.size,
                    ttl_ms: saturating_millis(m.ttl),
                    age_ms: saturating_millis(m.age(now)),
                    idle_ms: saturating_millis(m.idle(now)),
                    access_count: m.access_count,
                    tags: m.tags.clone(),
                    is_stale: m.is_stale,
                })
                .collect(),
        }
    }

    pub fn to_json(&self) -> Result<String, EngineError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self, EngineError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Rebuild metadata anchored at `now`, skipping expired and zero-TTL entries.
    pub fn into_metadata(
        self,
        now: Instant,
        thresholds: &PatternThresholds,
    ) -> Result<Vec<CacheEntryMetadata>, EngineError> {
        if self.version != SNAPSHOT_FORMAT_VERSION {
            return Err(EngineError::SnapshotVersion {
                expected: SNAPSHOT_FORMAT_VERSION.to_string(),
                found: self.version,
            });
        }

        Ok(self
            .entries
            .into_iter()
            .filter(|e| e.ttl_ms > 0 && e.age_ms <= e.ttl_ms)
            .map(|e| {
                let age = Duration::from_millis(e.age_ms);
                let idle = Duration::from_millis(e.idle_ms.min(e.age_ms));
                CacheEntryMetadata {
                    pattern: classify_pattern(e.access_count, age, thresholds),
                    key: e.key,
                    priority: e.priority,
                    size: e.size,
                    ttl: Duration::from_millis(e.ttl_ms),
                    created_at: now.checked_sub(age).unwrap_or(now),
                    last_accessed: now.checked_sub(idle).unwrap_or(now),
                    access_count: e.access_count,
                    tags: e.tags,
                    is_stale: e.is_stale,
                }
            })
            .collect())
    }
}

fn saturating_millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}
