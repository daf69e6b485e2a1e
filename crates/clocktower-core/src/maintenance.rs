//! Batched, resumable maintenance sweep over every persisted town.
//!
//! A sweep loads every town key, then works through them a batch at a time.
//! Between batches the rest of the sweep waits on the short batch timer;
//! once the sweep is exhausted (or shutdown was requested) the long sweep
//! timer is armed for the next full pass. After a batch exactly one of the
//! two timers is armed.

#[path = "maintenance_tests.rs"]
mod maintenance_tests;

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use clocktower_types::TownKey;
use futures::FutureExt;
use futures::future::BoxFuture;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::callbacks::SingleCallbackScheduler;
use crate::config::MaintenanceConfig;
use crate::error::Result;
use crate::shutdown::{Shutdown, ShutdownPreventer};
use crate::traits::TownDatabase;

type MaintenanceTask = Arc<dyn Fn(TownKey) -> BoxFuture<'static, Result<()>> + Send + Sync>;

/// Runs the registered maintenance tasks over every town, a batch at a time.
/// Clones share the same sweep.
pub struct TownMaintenance<D> {
    inner: Arc<MaintenanceInner<D>>,
}

impl<D> Clone for TownMaintenance<D> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct MaintenanceInner<D> {
    db: D,
    shutdown: Shutdown,
    preventer: ShutdownPreventer,
    batch_size: usize,
    batch_interval: Duration,
    sweep_interval: Duration,
    tasks: Mutex<Vec<MaintenanceTask>>,
    state: Mutex<SweepState>,
    batch_timer: SingleCallbackScheduler,
    sweep_timer: SingleCallbackScheduler,
}

#[derive(Default)]
struct SweepState {
    processing: bool,
    /// Towns left for the next batch of the current sweep.
    remaining: VecDeque<TownKey>,
}

impl<D: TownDatabase> TownMaintenance<D> {
    pub fn new(db: D, shutdown: &Shutdown, config: &MaintenanceConfig) -> Self {
        let inner = Arc::new_cyclic(|weak: &Weak<MaintenanceInner<D>>| {
            let on_batch = weak.clone();
            let on_sweep = weak.clone();
            MaintenanceInner {
                db,
                shutdown: shutdown.clone(),
                preventer: shutdown.register_preventer(),
                batch_size: config.batch_size(),
                batch_interval: config.batch_interval(),
                sweep_interval: config.sweep_interval(),
                tasks: Mutex::new(Vec::new()),
                state: Mutex::new(SweepState::default()),
                batch_timer: SingleCallbackScheduler::new(move || {
                    let weak = on_batch.clone();
                    async move {
                        if let Some(inner) = weak.upgrade() {
                            inner.continue_sweep().await;
                        }
                    }
                }),
                sweep_timer: SingleCallbackScheduler::new(move || {
                    let weak = on_sweep.clone();
                    async move {
                        if let Some(inner) = weak.upgrade() {
                            inner.run_full_sweep().await;
                        }
                    }
                }),
            }
        });
        let weak = Arc::downgrade(&inner);
        shutdown.on_request(move || on_shutdown(weak));
        Self { inner }
    }

    /// Register a task to run for every town on every sweep. Tasks run in
    /// registration order and are never removed.
    pub fn add_maintenance_task<F, Fut>(&self, task: F)
    where
        F: Fn(TownKey) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        let task: MaintenanceTask = Arc::new(move |key| task(key).boxed());
        self.inner.tasks.lock().unwrap().push(task);
    }

    /// Start a sweep when the connection to the platform is established.
    pub async fn on_connected(&self) {
        debug!("Connected, starting town maintenance");
        self.inner.run_full_sweep().await;
    }

    /// Load every town and process the first batch.
    pub async fn run_full_sweep(&self) {
        self.inner.run_full_sweep().await;
    }

    /// Process up to one batch of `towns`, then arm the timer for whatever
    /// comes next. Returns immediately if a batch is already in flight.
    pub async fn process_batch(&self, towns: VecDeque<TownKey>) {
        self.inner.process_batch(towns).await;
    }

    pub fn is_processing(&self) -> bool {
        self.inner.state.lock().unwrap().processing
    }

    pub fn task_count(&self) -> usize {
        self.inner.tasks.lock().unwrap().len()
    }

    /// Towns waiting for the next batch of the current sweep.
    pub fn remaining_count(&self) -> usize {
        self.inner.state.lock().unwrap().remaining.len()
    }

    pub fn is_batch_scheduled(&self) -> bool {
        self.inner.batch_timer.is_scheduled()
    }

    pub fn next_batch_at(&self) -> Option<Instant> {
        self.inner.batch_timer.scheduled_at()
    }

    pub fn next_sweep_at(&self) -> Option<Instant> {
        self.inner.sweep_timer.scheduled_at()
    }
}

impl<D: TownDatabase> MaintenanceInner<D> {
    async fn run_full_sweep(&self) {
        match self.db.get_all_towns().await {
            Ok(towns) => {
                info!(towns = towns.len(), "Starting town maintenance sweep");
                self.process_batch(towns.into()).await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to load towns for maintenance");
                self.sweep_timer
                    .schedule_callback(Instant::now() + self.sweep_interval);
            }
        }
    }

    async fn continue_sweep(&self) {
        if let Some(towns) = self.begin_batch(None) {
            self.run_batch(towns).await;
        }
    }

    async fn process_batch(&self, towns: VecDeque<TownKey>) {
        if let Some(towns) = self.begin_batch(Some(towns)) {
            self.run_batch(towns).await;
        }
    }

    /// Claim the in-flight slot. `None` takes the rest of the current sweep
    /// under the same lock. Returns `None` when no batch should run.
    fn begin_batch(&self, towns: Option<VecDeque<TownKey>>) -> Option<VecDeque<TownKey>> {
        let mut state = self.state.lock().unwrap();
        if state.processing {
            debug!(
                remaining = state.remaining.len(),
                "Maintenance batch already in flight"
            );
            return None;
        }
        if self.shutdown.is_requested() {
            info!("Shutdown requested, not starting maintenance batch");
            self.finish_sweep(&mut state);
            self.preventer.resolve();
            return None;
        }
        state.processing = true;
        Some(towns.unwrap_or_else(|| std::mem::take(&mut state.remaining)))
    }

    async fn run_batch(&self, mut towns: VecDeque<TownKey>) {
        info!(remaining = towns.len(), "Town maintenance: towns remain");

        let tasks = self.tasks.lock().unwrap().clone();
        for _ in 0..self.batch_size {
            let Some(key) = towns.pop_front() else {
                break;
            };
            debug!(town = %key, "Processing town");
            for (index, task) in tasks.iter().enumerate() {
                if let Err(e) = task(key).await {
                    warn!(town = %key, task = index, error = %e, "Maintenance task failed");
                }
            }
        }

        let mut state = self.state.lock().unwrap();
        let shutdown_requested = self.shutdown.is_requested();
        if !towns.is_empty() && !shutdown_requested {
            info!(remaining = towns.len(), "Town maintenance: scheduling next batch");
            state.remaining = towns;
            self.sweep_timer.cancel_callback();
            self.batch_timer
                .schedule_callback(Instant::now() + self.batch_interval);
        } else {
            self.finish_sweep(&mut state);
        }
        state.processing = false;
        if shutdown_requested {
            self.preventer.resolve();
        }
    }

    /// Drop the rest of the sweep and arm the timer for the next one.
    fn finish_sweep(&self, state: &mut SweepState) {
        info!(
            next_in_secs = self.sweep_interval.as_secs(),
            skipped = state.remaining.len(),
            "Town maintenance complete"
        );
        state.remaining.clear();
        self.batch_timer.cancel_callback();
        self.sweep_timer
            .schedule_callback(Instant::now() + self.sweep_interval);
    }
}

/// Runs inside `Shutdown::request`. A pending batch never starts; a batch in
/// flight finishes and resolves the preventer itself.
fn on_shutdown<D: TownDatabase>(weak: Weak<MaintenanceInner<D>>) {
    let Some(inner) = weak.upgrade() else {
        return;
    };
    let mut state = inner.state.lock().unwrap();
    if state.processing {
        info!("Shutdown requested, finishing current maintenance batch");
        return;
    }
    if inner.batch_timer.is_scheduled() {
        inner.finish_sweep(&mut state);
    }
    inner.preventer.resolve();
}

impl<D> Drop for MaintenanceInner<D> {
    fn drop(&mut self) {
        self.preventer.resolve();
    }
}
