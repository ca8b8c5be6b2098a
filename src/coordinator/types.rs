// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Public types returned by the coordinator.

use std::collections::BTreeMap;
use std::time::Duration;

use crate::eviction::EvictionReport;
use crate::metadata::{AccessPattern, Priority, QueryKey};
use crate::pressure::PressureLevel;

/// An entry identified together with its age at the time of the call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryAge {
    pub key: QueryKey,
    pub age: Duration,
}

/// Aggregate view of the tracked entries.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheStats {
    pub total_entries: usize,
    /// Count per tier (every tier present, zero when empty)
    pub by_priority: BTreeMap<Priority, usize>,
    /// Count per access pattern (every pattern present, zero when empty)
    pub by_pattern: BTreeMap<AccessPattern, usize>,
    /// Sum of size estimates, in bytes
    pub total_size: usize,
    /// 0.0 when no entries are tracked
    pub average_access_count: f64,
    pub oldest_entry: Option<EntryAge>,
    pub newest_entry: Option<EntryAge>,
    pub stale_entries: usize,
}

/// Memory budget usage.
#[derive(Debug, Clone, PartialEq)]
pub struct MemoryStats {
    /// Tracked bytes
    pub used: usize,
    /// Configured budget
    pub total: usize,
    /// `used / total × 100`
    pub percentage: f64,
    /// True at Soft or Critical pressure
    pub is_under_pressure: bool,
    /// Queries held by the external cache
    pub query_count: usize,
}

/// What one pressure pass did.
#[derive(Debug, Clone, PartialEq)]
pub struct PressureOutcome {
    pub level: PressureLevel,
    /// Usage ratio observed at the start of the pass
    pub usage: f64,
    /// Medium entries moved to Low
    pub demoted: Vec<QueryKey>,
    pub evicted: EvictionReport,
    pub expired: EvictionReport,
}

impl PressureOutcome {
    pub(crate) fn idle(level: PressureLevel, usage: f64) -> Self {
        Self {
            level,
            usage,
            demoted: Vec::new(),
            evicted: EvictionReport::default(),
            expired: EvictionReport::default(),
        }
    }

    /// Removals the external cache refused during this pass.
    #[must_use]
    pub fn failed_count(&self) -> usize {
        self.evicted.failed.len() + self.expired.failed.len()
    }
}
