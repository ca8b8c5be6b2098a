// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Priority and access-pattern classification.
//!
//! Two independent classifications live here:
//!
//! - **Access pattern** is derived from `(access_count, age)` against
//!   configurable [`PatternThresholds`]. It is recomputed on every access and
//!   never treated as ground truth.
//! - **Priority** is assigned at registration. For auto-registered queries it
//!   comes from a [`KeyDescriptor`]: the key's first segment names a
//!   [`DataDomain`], and every domain maps to exactly one tier through an
//!   exhaustive `match`.
//!
//! ```
//! use query_priority_cache::{classifier::KeyDescriptor, Priority, QueryKey};
//!
//! let desc = KeyDescriptor::from_key(&QueryKey::new(["session", "current"]));
//! assert_eq!(desc.priority(), Priority::Critical);
//!
//! let desc = KeyDescriptor::from_key(&QueryKey::new(["analytics", "pageviews"]));
//! assert_eq!(desc.priority(), Priority::Background);
//! ```

use std::collections::BTreeSet;
use std::time::Duration;

use serde::Deserialize;

use crate::config::TierTtls;
use crate::metadata::{AccessPattern, Priority, QueryKey};

/// Minimum access count and maximum age for one pattern tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct PatternRule {
    pub min_access: u64,
    pub max_age_ms: u64,
}

impl PatternRule {
    #[must_use]
    pub const fn new(min_access: u64, max_age: Duration) -> Self {
        let millis = max_age.as_millis();
        Self {
            min_access,
            max_age_ms: if millis > u64::MAX as u128 { u64::MAX } else { millis as u64 },
        }
    }

    #[must_use]
    pub fn max_age(&self) -> Duration {
        Duration::from_millis(self.max_age_ms)
    }

    fn admits(&self, access_count: u64, age: Duration) -> bool {
        access_count >= self.min_access && age <= self.max_age()
    }
}

/// Hot/Warm/Cool thresholds. Anything else is Cold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct PatternThresholds {
    #[serde(default = "default_hot")]
    pub hot: PatternRule,
    #[serde(default = "default_warm")]
    pub warm: PatternRule,
    #[serde(default = "default_cool")]
    pub cool: PatternRule,
}

fn default_hot() -> PatternRule { PatternRule::new(10, Duration::from_secs(5 * 60)) }
fn default_warm() -> PatternRule { PatternRule::new(5, Duration::from_secs(30 * 60)) }
fn default_cool() -> PatternRule { PatternRule::new(2, Duration::from_secs(60 * 60)) }

impl Default for PatternThresholds {
    fn default() -> Self {
        Self {
            hot: default_hot(),
            warm: default_warm(),
            cool: default_cool(),
        }
    }
}

/// Derive the access pattern. Rules are checked Hot, Warm, Cool in order.
#[must_use]
pub fn classify_pattern(access_count: u64, age: Duration, thresholds: &PatternThresholds) -> AccessPattern {
    if thresholds.hot.admits(access_count, age) {
        AccessPattern::Hot
    } else if thresholds.warm.admits(access_count, age) {
        AccessPattern::Warm
    } else if thresholds.cool.admits(access_count, age) {
        AccessPattern::Cool
    } else {
        AccessPattern::Cold
    }
}

/// Business domain a query belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataDomain {
    Session,
    Auth,
    Profile,
    Messages,
    Notifications,
    Business,
    Services,
    Locations,
    Reviews,
    Marketplace,
    Community,
    Analytics,
    Diagnostics,
    Unknown,
}

impl DataDomain {
    /// Parse a key segment. Plural/singular spellings are accepted;
    /// anything unrecognized is `Unknown`.
    #[must_use]
    pub fn from_segment(segment: &str) -> Self {
        match segment.to_ascii_lowercase().as_str() {
            "session" | "sessions" => Self::Session,
            "auth" | "user" | "current-user" => Self::Auth,
            "profile" | "profiles" => Self::Profile,
            "message" | "messages" | "conversations" => Self::Messages,
            "notification" | "notifications" => Self::Notifications,
            "business" | "businesses" => Self::Business,
            "service" | "services" => Self::Services,
            "location" | "locations" => Self::Locations,
            "review" | "reviews" => Self::Reviews,
            "marketplace" | "listings" => Self::Marketplace,
            "community" | "posts" => Self::Community,
            "analytics" | "metrics" => Self::Analytics,
            "diagnostics" | "debug" | "logs" => Self::Diagnostics,
            _ => Self::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Session => "session",
            Self::Auth => "auth",
            Self::Profile => "profile",
            Self::Messages => "messages",
            Self::Notifications => "notifications",
            Self::Business => "business",
            Self::Services => "services",
            Self::Locations => "locations",
            Self::Reviews => "reviews",
            Self::Marketplace => "marketplace",
            Self::Community => "community",
            Self::Analytics => "analytics",
            Self::Diagnostics => "diagnostics",
            Self::Unknown => "unknown",
        }
    }
}

/// What a query does with its domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryIntent {
    Detail,
    List,
    Search,
    Aggregate,
}

impl QueryIntent {
    #[must_use]
    pub fn from_segment(segment: Option<&str>) -> Self {
        match segment.map(str::to_ascii_lowercase).as_deref() {
            Some("list" | "all" | "infinite" | "page") => Self::List,
            Some("search" | "filter") => Self::Search,
            Some("stats" | "count" | "summary" | "aggregate") => Self::Aggregate,
            _ => Self::Detail,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Detail => "detail",
            Self::List => "list",
            Self::Search => "search",
            Self::Aggregate => "aggregate",
        }
    }
}

/// Structured view of a query key used for classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyDescriptor {
    pub domain: DataDomain,
    pub intent: QueryIntent,
}

impl KeyDescriptor {
    #[must_use]
    pub fn from_key(key: &QueryKey) -> Self {
        let segments = key.segments();
        Self {
            domain: segments
                .first()
                .map_or(DataDomain::Unknown, |s| DataDomain::from_segment(s)),
            intent: QueryIntent::from_segment(segments.get(1).map(String::as_str)),
        }
    }

    #[must_use]
    pub fn priority(&self) -> Priority {
        priority_for(self.domain)
    }
}

/// Tier for a domain.
#[must_use]
pub fn priority_for(domain: DataDomain) -> Priority {
    match domain {
        DataDomain::Session | DataDomain::Auth => Priority::Critical,
        DataDomain::Profile | DataDomain::Messages | DataDomain::Notifications => Priority::High,
        DataDomain::Business
        | DataDomain::Services
        | DataDomain::Locations
        | DataDomain::Reviews
        | DataDomain::Unknown => Priority::Medium,
        DataDomain::Marketplace | DataDomain::Community => Priority::Low,
        DataDomain::Analytics | DataDomain::Diagnostics => Priority::Background,
    }
}

/// Result of classifying a key for auto-registration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub priority: Priority,
    pub ttl: Duration,
    pub tags: BTreeSet<String>,
}

/// Classify a key: tier from its domain, TTL from the tier default,
/// tags naming domain and intent.
#[must_use]
pub fn classify_key(key: &QueryKey, ttls: &TierTtls) -> Classification {
    let desc = KeyDescriptor::from_key(key);
    let priority = desc.priority();
    Classification {
        priority,
        ttl: ttls.for_priority(priority),
        tags: [desc.domain.as_str(), desc.intent.as_str()]
            .into_iter()
            .map(String::from)
            .collect(),
    }
}
