// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Bounded in-memory log of engine actions.
//!
//! Every registration, tier change, eviction and TTL cleanup is appended
//! here for diagnostics. The log keeps the most recent `capacity` records and
//! drops the oldest first.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::Mutex;
use tokio::time::Instant;

use crate::metadata::{Priority, QueryKey};

/// Why an entry was evicted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvictionReason {
    /// Selected by the pressure monitor or `force_cleanup`
    Pressure,
    /// Matched an `evict_by_tags` call
    Tags,
    /// Named directly by `evict_key`
    Explicit,
}

impl EvictionReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pressure => "pressure",
            Self::Tags => "tags",
            Self::Explicit => "explicit",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheAction {
    Register,
    PriorityChange { from: Priority, to: Priority },
    Evict(EvictionReason),
    /// Removed by the TTL sweeper
    Cleanup,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionRecord {
    pub key: QueryKey,
    pub action: CacheAction,
    pub at: Instant,
}

#[derive(Debug)]
pub struct ActionLog {
    records: Mutex<VecDeque<ActionRecord>>,
    capacity: AtomicUsize,
}

impl ActionLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            records: Mutex::new(VecDeque::with_capacity(capacity.min(1024))),
            capacity: AtomicUsize::new(capacity),
        }
    }

    /// Change the bound, dropping the oldest records that no longer fit.
    pub fn set_capacity(&self, capacity: usize) {
        let mut records = self.records.lock();
        self.capacity.store(capacity, Ordering::Relaxed);
        while records.len() > capacity {
            records.pop_front();
        }
    }

    pub fn record(&self, key: &QueryKey, action: CacheAction) {
        let mut records = self.records.lock();
        let capacity = self.capacity.load(Ordering::Relaxed);
        if capacity == 0 {
            return;
        }
        while records.len() >= capacity {
            records.pop_front();
        }
        records.push_back(ActionRecord {
            key: key.clone(),
            action,
            at: Instant::now(),
        });
    }

    /// Up to `n` most recent records, oldest first.
    pub fn recent(&self, n: usize) -> Vec<ActionRecord> {
        let records = self.records.lock();
        let skip = records.len().saturating_sub(n);
        records.iter().skip(skip).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_log_is_bounded() {
        let log = ActionLog::new(3);
        for i in 0..5 {
            log.record(&QueryKey::from(format!("k{i}").as_str()), CacheAction::Register);
        }
        assert_eq!(log.len(), 3);

        let keys: Vec<_> = log.recent(10).into_iter().map(|r| r.key.to_string()).collect();
        assert_eq!(keys, vec!["k2", "k3", "k4"]);
    }

    #[tokio::test]
    async fn test_recent_returns_tail() {
        let log = ActionLog::new(10);
        log.record(&QueryKey::from("a"), CacheAction::Register);
        log.record(&QueryKey::from("a"), CacheAction::Evict(EvictionReason::Tags));
        let recent = log.recent(1);
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].action, CacheAction::Evict(EvictionReason::Tags));
    }

    #[tokio::test]
    async fn test_zero_capacity_keeps_nothing() {
        let log = ActionLog::new(0);
        log.record(&QueryKey::from("a"), CacheAction::Cleanup);
        assert!(log.is_empty());
    }

    #[tokio::test]
    async fn test_shrinking_capacity_drops_oldest() {
        let log = ActionLog::new(5);
        for i in 0..5 {
            log.record(&QueryKey::from(format!("k{i}").as_str()), CacheAction::Register);
        }
        log.set_capacity(2);
        let keys: Vec<_> = log.recent(10).into_iter().map(|r| r.key.to_string()).collect();
        assert_eq!(keys, vec!["k3", "k4"]);

        log.record(&QueryKey::from("k5"), CacheAction::Cleanup);
        assert_eq!(log.len(), 2);
    }
}
