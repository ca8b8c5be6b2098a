// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! # Query Priority Cache
//!
//! Adaptive prioritization for a reactive client-side query cache.
//!
//! The engine tracks metadata for every cached query (tier, size, TTL, access
//! history, tags) and uses it to decide what to drop when memory runs short
//! and what to expire when it goes stale.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    External Query Cache                     │
//! │  • Emits Added / Updated / Removed                          │
//! │  • Removes keys on request (QueryCache)                     │
//! └─────────────────────────────────────────────────────────────┘
//!                    │ events              ▲ remove
//!                    ▼                     │
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      CacheCoordinator                       │
//! │  • Adapter: classify, size and register queries             │
//! │  • Metadata store + tag index (one lock)                    │
//! │  • Eviction policy: LRU / Priority / Hybrid                 │
//! │  • Pressure monitor and TTL sweeper                         │
//! │  • Action log, stats, snapshots                             │
//! └─────────────────────────────────────────────────────────────┘
//!                              ▲
//!                              │ ticks
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     MaintenanceHandle                       │
//! │  • Pressure check every 30s, TTL sweep every 60s            │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use query_priority_cache::{
//!     CacheCoordinator, CachePayload, EngineConfig, InMemoryQueryCache, MaintenanceHandle,
//!     Priority, QueryKey, Registration,
//! };
//!
//! #[tokio::main]
//! async fn main() {
//!     let cache = Arc::new(InMemoryQueryCache::new());
//!     let coordinator = Arc::new(
//!         CacheCoordinator::new(EngineConfig::default(), cache.clone()).expect("valid config"),
//!     );
//!     cache.subscribe(&coordinator);
//!     let maintenance = MaintenanceHandle::start(Arc::clone(&coordinator));
//!
//!     // Queries landing in the cache are classified automatically
//!     cache.insert(QueryKey::from("messages/list"), CachePayload::Opaque);
//!
//!     // Collaborators can register explicitly, too
//!     coordinator.register(
//!         QueryKey::from("auth/session"),
//!         Registration::new(Priority::Critical).with_tags(["session"]),
//!     );
//!
//!     // Logout: drop everything tagged with the session
//!     coordinator.evict_by_tags(&["session".to_string()]).await;
//!
//!     println!("{:?}", coordinator.memory_stats());
//!     maintenance.stop().await;
//! }
//! ```
//!
//! ## Modules
//!
//! - [`coordinator`]: The [`CacheCoordinator`] context object
//! - [`store`]: Metadata store and tag index
//! - [`classifier`]: Access patterns and key-based tier heuristics
//! - [`eviction`]: Candidate ordering and batch sizing
//! - [`pressure`]: Memory pressure levels
//! - [`maintenance`]: Pressure and TTL timers
//! - [`adapter`]: External cache bridge and events
//! - [`snapshot`]: Versioned metadata export/import

pub mod action_log;
pub mod adapter;
pub mod classifier;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod eviction;
pub mod maintenance;
pub mod metadata;
pub mod metrics;
pub mod pressure;
pub mod snapshot;
pub mod store;

pub use action_log::{ActionRecord, CacheAction, EvictionReason};
pub use adapter::{CacheAdapter, CacheEvent, CacheObserver, CachePayload, InMemoryQueryCache, QueryCache};
pub use classifier::{classify_key, classify_pattern, PatternThresholds};
pub use config::{EngineConfig, TierTtls};
pub use coordinator::{CacheCoordinator, CacheStats, EntryAge, MemoryStats, PressureOutcome};
pub use error::EngineError;
pub use eviction::{EvictionReport, EvictionStrategy};
pub use maintenance::MaintenanceHandle;
pub use metadata::{AccessPattern, CacheEntryMetadata, Priority, QueryKey, Registration};
pub use pressure::PressureLevel;
pub use snapshot::{Snapshot, SNAPSHOT_FORMAT_VERSION};
pub use store::{MetadataStore, RegisterOutcome};
