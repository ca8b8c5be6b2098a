// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Periodic maintenance: pressure checks and TTL sweeps.
//!
//! [`MaintenanceHandle::start`] spawns one interval task per concern. Every
//! tick runs in its own spawned task, so a failing or panicking tick is logged
//! and the interval keeps going. The first tick fires one full period after
//! start.
//!
//! ```rust
//! use std::sync::Arc;
//! use query_priority_cache::{CacheCoordinator, EngineConfig, InMemoryQueryCache, MaintenanceHandle};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let cache = Arc::new(InMemoryQueryCache::new());
//! let coordinator = Arc::new(CacheCoordinator::new(EngineConfig::default(), cache.clone()).unwrap());
//! let maintenance = MaintenanceHandle::start(Arc::clone(&coordinator));
//! assert!(maintenance.is_running());
//!
//! maintenance.stop().await;
//! maintenance.stop().await; // no-op
//! assert!(!maintenance.is_running());
//! # }
//! ```

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::coordinator::CacheCoordinator;
use crate::error::EngineError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Pass {
    Pressure,
    Sweep,
}

impl Pass {
    fn as_str(&self) -> &'static str {
        match self {
            Self::Pressure => "pressure",
            Self::Sweep => "sweep",
        }
    }

    async fn run(self, coordinator: Arc<CacheCoordinator>) -> Result<(), EngineError> {
        let failed = match self {
            Self::Pressure => coordinator.check_pressure().await.map(|o| o.failed_count()),
            Self::Sweep => coordinator.sweep_expired().await.map(|r| r.failed.len()),
        };
        match failed {
            Some(n) if n > 0 => Err(EngineError::Cache(format!("{n} removals refused during {} pass", self.as_str()))),
            _ => Ok(()),
        }
    }
}

/// Running maintenance timers. Dropping the handle aborts them.
pub struct MaintenanceHandle {
    shutdown: watch::Sender<bool>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl MaintenanceHandle {
    /// Spawn the pressure and sweep timers. Must be called within a tokio runtime.
    pub fn start(coordinator: Arc<CacheCoordinator>) -> Self {
        let config = coordinator.config();
        let (shutdown, rx) = watch::channel(false);

        let tasks = vec![
            tokio::spawn(run_timer(
                Pass::Pressure,
                config.pressure_check_interval(),
                Arc::clone(&coordinator),
                rx.clone(),
            )),
            tokio::spawn(run_timer(Pass::Sweep, config.ttl_sweep_interval(), coordinator, rx)),
        ];
        info!(
            pressure_ms = config.pressure_check_interval_ms,
            sweep_ms = config.ttl_sweep_interval_ms,
            "Maintenance started"
        );

        Self {
            shutdown,
            tasks: Mutex::new(tasks),
        }
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.tasks.lock().iter().any(|t| !t.is_finished())
    }

    /// Signal shutdown and wait for both timers. Calling again is a no-op.
    pub async fn stop(&self) {
        let tasks = std::mem::take(&mut *self.tasks.lock());
        if tasks.is_empty() {
            return;
        }
        let _ = self.shutdown.send(true);
        for task in tasks {
            if let Err(e) = task.await {
                if e.is_panic() {
                    error!(error = %e, "Maintenance timer panicked");
                }
            }
        }
        info!("Maintenance stopped");
    }
}

impl Drop for MaintenanceHandle {
    fn drop(&mut self) {
        for task in self.tasks.get_mut().drain(..) {
            task.abort();
        }
    }
}

async fn run_timer(
    pass: Pass,
    period: Duration,
    coordinator: Arc<CacheCoordinator>,
    mut shutdown: watch::Receiver<bool>,
) {
    let period = period.max(Duration::from_millis(1));
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    debug!(pass = pass.as_str(), "Maintenance timer exiting");
                    break;
                }
            }

            _ = ticker.tick() => {
                let tick = tokio::spawn(pass.run(Arc::clone(&coordinator)));
                match tick.await {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => {
                        warn!(pass = pass.as_str(), error = %e, "Maintenance tick failed");
                        crate::metrics::record_tick_failure(pass.as_str());
                    }
                    Err(e) if e.is_panic() => {
                        error!(pass = pass.as_str(), error = %e, "Maintenance tick panicked");
                        crate::metrics::record_tick_failure(pass.as_str());
                    }
                    Err(e) => debug!(pass = pass.as_str(), error = %e, "Maintenance tick cancelled"),
                }
            }
        }
    }
}
