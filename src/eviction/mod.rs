//! Eviction policies for the tracked query cache.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                    Eviction Module                           │
//! ├──────────────────────────────────────────────────────────────┤
//! │  policy.rs   - Candidate ordering                            │
//! │  └─ EvictionStrategy: LRU, Priority, Hybrid (default)        │
//! │  └─ eviction_candidates: Critical-free, stable ordering      │
//! │  └─ batch_len: ceil(candidates × fraction)                   │
//! │  └─ select_demotions: Medium → Low under critical pressure   │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! Critical-tier protection lives here and only here: every pressure or
//! ratio based eviction path goes through [`eviction_candidates`]. Tag and
//! key eviction in the coordinator do not.

pub mod policy;

pub use policy::{
    batch_len, eviction_candidates, select_demotions, EvictionReport, EvictionStrategy,
};
