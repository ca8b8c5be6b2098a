// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Diagnostics and snapshot import/export.

use std::collections::BTreeMap;

use tokio::time::Instant;
use tracing::info;

use crate::error::EngineError;
use crate::metadata::{AccessPattern, Priority};
use crate::pressure::{usage_ratio, PressureLevel};
use crate::snapshot::Snapshot;

use super::{CacheCoordinator, CacheStats, EntryAge, MemoryStats};

impl CacheCoordinator {
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        let now = Instant::now();
        let entries = self.store.entries();

        let mut by_priority: BTreeMap<Priority, usize> = Priority::ALL.iter().map(|p| (*p, 0)).collect();
        let mut by_pattern: BTreeMap<AccessPattern, usize> =
            AccessPattern::ALL.iter().map(|p| (*p, 0)).collect();
        let mut total_size = 0usize;
        let mut total_access = 0u64;
        let mut stale_entries = 0usize;

        for meta in &entries {
            *by_priority.entry(meta.priority).or_default() += 1;
            *by_pattern.entry(meta.pattern).or_default() += 1;
            total_size += meta.size;
            total_access = total_access.saturating_add(meta.access_count);
            if meta.is_stale {
                stale_entries += 1;
            }
        }

        // entries() is in registration order, so ties resolve to the earliest registered
        let oldest_entry = entries
            .iter()
            .min_by_key(|m| m.created_at)
            .map(|m| EntryAge { key: m.key.clone(), age: m.age(now) });
        let newest_entry = entries
            .iter()
            .rev()
            .max_by_key(|m| m.created_at)
            .map(|m| EntryAge { key: m.key.clone(), age: m.age(now) });

        let average_access_count = if entries.is_empty() {
            0.0
        } else {
            total_access as f64 / entries.len() as f64
        };

        CacheStats {
            total_entries: entries.len(),
            by_priority,
            by_pattern,
            total_size,
            average_access_count,
            oldest_entry,
            newest_entry,
            stale_entries,
        }
    }

    #[must_use]
    pub fn memory_stats(&self) -> MemoryStats {
        let (total, soft, critical) = {
            let config = self.config.read();
            (
                config.max_cache_bytes,
                config.soft_pressure_threshold,
                config.critical_pressure_threshold,
            )
        };
        let used = self.store.total_size();
        let usage = usage_ratio(used, total);
        MemoryStats {
            used,
            total,
            percentage: usage * 100.0,
            is_under_pressure: PressureLevel::from_usage(usage, soft, critical).is_under_pressure(),
            query_count: self.adapter.query_count(),
        }
    }

    /// Capture all tracked metadata.
    #[must_use]
    pub fn export_snapshot(&self) -> Snapshot {
        Snapshot::capture(&self.store.entries(), Instant::now())
    }

    /// Restore metadata from a snapshot. Returns the number of entries imported.
    ///
    /// A version mismatch imports nothing. Expired entries are skipped.
    pub fn import_snapshot(&self, snapshot: Snapshot) -> Result<usize, EngineError> {
        let thresholds = self.config.read().pattern_thresholds;
        let restored = snapshot.into_metadata(Instant::now(), &thresholds)?;
        let count = restored.len();
        for meta in restored {
            self.store.restore(meta);
        }
        self.publish_gauges();
        info!(count, "Snapshot imported");
        Ok(count)
    }
}
