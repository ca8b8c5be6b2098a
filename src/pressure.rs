// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Memory pressure levels.
//!
//! The monitor compares tracked bytes against the configured budget and maps
//! the ratio to one of three levels, each with its own cleanup response.
//!
//! # Example
//!
//! ```
//! use query_priority_cache::PressureLevel;
//!
//! // Below the soft threshold: nothing to do
//! let level = PressureLevel::from_usage(0.5, 0.80, 0.95);
//! assert_eq!(level, PressureLevel::Normal);
//! assert!(!level.is_under_pressure());
//!
//! // Soft: gentle cleanup
//! let level = PressureLevel::from_usage(0.85, 0.80, 0.95);
//! assert_eq!(level, PressureLevel::Soft);
//!
//! // Critical: aggressive cleanup
//! let level = PressureLevel::from_usage(0.97, 0.80, 0.95);
//! assert_eq!(level, PressureLevel::Critical);
//! ```

/// Pressure level derived from `used / max_cache_bytes`.
///
/// - **Normal** (< soft): no action
/// - **Soft** (soft ..< critical): gentle cleanup, evict a small batch and sweep TTLs
/// - **Critical** (>= critical): aggressive cleanup, demote Medium then evict a larger batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum PressureLevel {
    Normal = 0,
    Soft = 1,
    Critical = 2,
}

impl PressureLevel {
    /// Classify a usage ratio (0.0 → 1.0+) against the two thresholds.
    #[must_use]
    pub fn from_usage(usage: f64, soft: f64, critical: f64) -> Self {
        match usage {
            u if u >= critical => Self::Critical,
            u if u >= soft => Self::Soft,
            _ => Self::Normal,
        }
    }

    #[must_use]
    pub fn is_under_pressure(&self) -> bool {
        !matches!(self, Self::Normal)
    }
}

impl std::fmt::Display for PressureLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Usage ratio, 0.0 when the budget is zero.
#[must_use]
pub fn usage_ratio(used: usize, max: usize) -> f64 {
    if max == 0 {
        0.0
    } else {
        used as f64 / max as f64
    }
}
