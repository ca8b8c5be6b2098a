// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

use std::str::FromStr;

use serde::Deserialize;

use crate::metadata::{CacheEntryMetadata, Priority, QueryKey};

/// Ordering used to pick eviction victims.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EvictionStrategy {
    /// Least recently accessed first
    Lru,
    /// Lowest tier first
    Priority,
    /// Lowest tier first, least recently accessed within a tier
    #[default]
    Hybrid,
}

impl FromStr for EvictionStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "lru" => Ok(Self::Lru),
            "priority" => Ok(Self::Priority),
            "hybrid" => Ok(Self::Hybrid),
            other => Err(format!("unknown eviction strategy: {other}")),
        }
    }
}

impl std::fmt::Display for EvictionStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Lru => write!(f, "lru"),
            Self::Priority => write!(f, "priority"),
            Self::Hybrid => write!(f, "hybrid"),
        }
    }
}

/// Order entries least-desirable-to-keep first, dropping Critical entries.
///
/// `entries` must arrive in registration order. All sorts are stable, so
/// entries with equal sort keys keep that order.
#[must_use]
pub fn eviction_candidates(
    entries: Vec<CacheEntryMetadata>,
    strategy: EvictionStrategy,
) -> Vec<CacheEntryMetadata> {
    let mut candidates: Vec<_> = entries
        .into_iter()
        .filter(|e| e.priority.is_evictable())
        .collect();

    match strategy {
        EvictionStrategy::Lru => candidates.sort_by(|a, b| a.last_accessed.cmp(&b.last_accessed)),
        EvictionStrategy::Priority => candidates.sort_by(|a, b| a.priority.cmp(&b.priority)),
        EvictionStrategy::Hybrid => candidates.sort_by(|a, b| {
            a.priority
                .cmp(&b.priority)
                .then_with(|| a.last_accessed.cmp(&b.last_accessed))
        }),
    }
    candidates
}

/// Number of candidates one batch may remove: `ceil(len × fraction)`.
/// The fraction is clamped to `[0, 1]`.
#[must_use]
pub fn batch_len(candidate_count: usize, fraction: f64) -> usize {
    if candidate_count == 0 || fraction.is_nan() || fraction <= 0.0 {
        return 0;
    }
    let fraction = fraction.min(1.0);
    ((candidate_count as f64 * fraction).ceil() as usize).min(candidate_count)
}

/// Pick the Medium entries to demote to Low, least recently accessed first.
#[must_use]
pub fn select_demotions(entries: &[CacheEntryMetadata], fraction: f64) -> Vec<QueryKey> {
    let mut medium: Vec<_> = entries
        .iter()
        .filter(|e| e.priority == Priority::Medium)
        .collect();
    medium.sort_by(|a, b| a.last_accessed.cmp(&b.last_accessed));

    let count = batch_len(medium.len(), fraction);
    medium.into_iter().take(count).map(|e| e.key.clone()).collect()
}

/// Outcome of one eviction pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EvictionReport {
    /// Keys removed from both the external cache and the store, in order
    pub evicted: Vec<QueryKey>,
    /// Sum of the evicted entries' sizes
    pub freed_bytes: usize,
    /// Keys the external cache refused to remove (metadata retained)
    pub failed: Vec<QueryKey>,
}

impl EvictionReport {
    #[must_use]
    pub fn len(&self) -> usize {
        self.evicted.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.evicted.is_empty()
    }
}
