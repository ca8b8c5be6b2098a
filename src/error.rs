// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

use thiserror::Error;

/// Errors surfaced by the prioritization engine.
///
/// Most engine operations are infallible by construction (missing keys are
/// no-ops, size estimation falls back to a default). Errors only come from the
/// external cache seam, configuration and snapshot handling.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("External cache error: {0}")]
    Cache(String),
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("Snapshot serialization failed: {0}")]
    Snapshot(#[from] serde_json::Error),
    #[error("Snapshot format mismatch: expected version {expected}, found {found}")]
    SnapshotVersion { expected: String, found: String },
}
