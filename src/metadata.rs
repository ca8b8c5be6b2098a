// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Cache entry metadata.
//!
//! The engine never holds cached payloads. For every tracked query it keeps a
//! [`CacheEntryMetadata`] record describing how important the data is, how
//! large it is, how long it may live and how it has been used.

use std::collections::BTreeSet;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::Instant;

/// Identifier of a cached data series.
///
/// Mirrors the array-shaped keys used by reactive query caches, e.g.
/// `["messages", "thread", "42"]`. Displayed as the segments joined by `/`.
///
/// ```
/// use query_priority_cache::QueryKey;
///
/// let key = QueryKey::new(["messages", "thread", "42"]);
/// assert_eq!(key.to_string(), "messages/thread/42");
/// assert!(key.matches_prefix("messages/thread"));
/// assert!(!key.matches_prefix("messages/inbox"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QueryKey(Vec<String>);

impl QueryKey {
    pub fn new<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(segments.into_iter().map(Into::into).collect())
    }

    #[must_use]
    pub fn segments(&self) -> &[String] {
        &self.0
    }

    /// Segment-wise prefix match against a `/`-separated pattern.
    /// An empty pattern matches nothing.
    #[must_use]
    pub fn matches_prefix(&self, pattern: &str) -> bool {
        let parts: Vec<&str> = pattern.split('/').filter(|p| !p.is_empty()).collect();
        if parts.is_empty() || parts.len() > self.0.len() {
            return false;
        }
        parts.iter().zip(&self.0).all(|(p, s)| *p == s)
    }
}

impl std::fmt::Display for QueryKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.join("/"))
    }
}

impl From<&str> for QueryKey {
    fn from(path: &str) -> Self {
        Self::new(path.split('/').filter(|s| !s.is_empty()))
    }
}

/// Importance tier. Ordering is total: `Critical > High > Medium > Low > Background`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Background = 0,
    Low = 1,
    Medium = 2,
    High = 3,
    Critical = 4,
}

impl Priority {
    /// All tiers, most important first.
    pub const ALL: [Priority; 5] = [
        Priority::Critical,
        Priority::High,
        Priority::Medium,
        Priority::Low,
        Priority::Background,
    ];

    /// Whether pressure- and ratio-based eviction may select this tier.
    #[must_use]
    pub fn is_evictable(&self) -> bool {
        !matches!(self, Self::Critical)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Critical => "critical",
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
            Self::Background => "background",
        }
    }
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Usage-derived temperature of an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessPattern {
    Hot,
    Warm,
    Cool,
    Cold,
}

impl AccessPattern {
    pub const ALL: [AccessPattern; 4] = [
        AccessPattern::Hot,
        AccessPattern::Warm,
        AccessPattern::Cool,
        AccessPattern::Cold,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Hot => "hot",
            Self::Warm => "warm",
            Self::Cool => "cool",
            Self::Cold => "cold",
        }
    }
}

impl std::fmt::Display for AccessPattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Metadata tracked for one cached query.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntryMetadata {
    pub key: QueryKey,
    pub priority: Priority,
    /// Estimated payload size in bytes
    pub size: usize,
    /// Absolute lifetime measured from `created_at`
    pub ttl: Duration,
    pub created_at: Instant,
    pub last_accessed: Instant,
    pub access_count: u64,
    pub pattern: AccessPattern,
    pub tags: BTreeSet<String>,
    /// Set externally when the source data is known to be outdated
    pub is_stale: bool,
}

impl CacheEntryMetadata {
    #[must_use]
    pub fn age(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.created_at)
    }

    #[must_use]
    pub fn idle(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.last_accessed)
    }

    /// Strictly past its TTL.
    #[must_use]
    pub fn is_expired(&self, now: Instant) -> bool {
        self.age(now) > self.ttl
    }

    pub fn has_any_tag<'a, I>(&self, tags: I) -> bool
    where
        I: IntoIterator<Item = &'a String>,
    {
        tags.into_iter().any(|t| self.tags.contains(t))
    }
}

/// Caller-supplied description of a query being registered.
///
/// `ttl: None` means "use the tier default from config".
///
/// ```
/// use query_priority_cache::{Priority, Registration};
/// use std::time::Duration;
///
/// let reg = Registration::new(Priority::High)
///     .with_size(2048)
///     .with_ttl(Duration::from_secs(60))
///     .with_tags(["profile", "detail"]);
/// assert_eq!(reg.tags.len(), 2);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Registration {
    pub priority: Priority,
    pub size: usize,
    pub ttl: Option<Duration>,
    pub tags: BTreeSet<String>,
}

impl Registration {
    pub fn new(priority: Priority) -> Self {
        Self {
            priority,
            size: 0,
            ttl: None,
            tags: BTreeSet::new(),
        }
    }

    #[must_use]
    pub fn with_size(mut self, size: usize) -> Self {
        self.size = size;
        self
    }

    #[must_use]
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    #[must_use]
    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags.extend(tags.into_iter().map(Into::into));
        self
    }
}
