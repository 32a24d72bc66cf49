//! Cooperative tick scheduler
//!
//! This module provides the [`Scheduler`], which owns a population of
//! resumable [`Task`]s and advances each of them once per simulation tick.
//!
//! # Tick discipline
//!
//! - Tasks are advanced in insertion order.
//! - New submissions, including ones made by a running computation through a
//!   [`Spawner`], wait in a pending queue and join the active set only when
//!   the current `advance_all` finishes.
//! - Tasks found done after their advance are dropped at the end of the pass.
//!
//! Everything runs on the caller's thread. The pending queue sits behind a
//! lock only so that spawners can be cloned into computations while the
//! scheduler itself is mutably borrowed by `advance_all`.

pub mod computation;
pub mod error;
pub mod signal;
pub mod task;

pub use error::{Result, SchedulerError};
pub use signal::{Computation, Signal};
pub use task::{SubmitOptions, Task, TaskHandle, TaskId, TaskIdGenerator, TaskState};

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Scheduler configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Capacity reserved up front for the active, pending and scratch
    /// buffers.
    pub initial_capacity: usize,
    /// Upper bound on the elapsed seconds of a single advance. A long frame
    /// hitch is then seen by tasks as this much time at most.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_elapsed: Option<f64>,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            initial_capacity: 64,
            max_elapsed: None,
        }
    }
}

impl SchedulerConfig {
    /// Apply `max_elapsed` to a caller-supplied elapsed value.
    #[inline]
    pub fn clamp_elapsed(
        &self,
        elapsed: f64,
    ) -> f64 {
        match self.max_elapsed {
            Some(max) if elapsed > max => max,
            _ => elapsed,
        }
    }
}

/// Scheduler statistics.
#[derive(Debug, Default)]
pub struct SchedulerStats {
    /// Total tasks submitted.
    pub tasks_submitted: AtomicU64,
    /// Tasks dropped after being observed done.
    pub tasks_retired: AtomicU64,
    /// Tasks aborted by an invalid control signal.
    pub tasks_failed: AtomicU64,
    /// Tasks marked done by `cancel_all`.
    pub tasks_cancelled: AtomicU64,
    /// Completed `advance_all` calls.
    pub ticks: AtomicU64,
}

impl SchedulerStats {
    /// Record a submitted task.
    #[inline]
    pub fn record_submitted(&self) {
        self.tasks_submitted.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a retired task.
    #[inline]
    pub fn record_retired(&self) {
        self.tasks_retired.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a task aborted by an error.
    #[inline]
    pub fn record_failed(&self) {
        self.tasks_failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Record tasks cancelled in bulk.
    #[inline]
    pub fn record_cancelled(
        &self,
        count: usize,
    ) {
        self.tasks_cancelled.fetch_add(count as u64, Ordering::Relaxed);
    }

    /// Record a finished tick.
    #[inline]
    pub fn record_tick(&self) {
        self.ticks.fetch_add(1, Ordering::Relaxed);
    }

    /// Number of finished ticks.
    #[inline]
    pub fn tick_count(&self) -> u64 {
        self.ticks.load(Ordering::Relaxed)
    }
}

/// State shared between a scheduler and its spawners.
#[derive(Debug)]
struct Shared {
    pending: Mutex<Vec<Task>>,
    disposed: AtomicBool,
    ids: Arc<TaskIdGenerator>,
    stats: SchedulerStats,
}

impl Shared {
    #[inline]
    fn ensure_live(&self) -> Result<()> {
        if self.disposed.load(Ordering::Acquire) {
            return Err(SchedulerError::ObjectDisposed);
        }
        Ok(())
    }

    fn submit(
        &self,
        computation: Box<dyn Computation>,
        options: SubmitOptions,
        config: &SchedulerConfig,
    ) -> Result<TaskHandle> {
        self.ensure_live()?;

        let mut task = Task::new(computation, options.name, Arc::clone(&self.ids));
        let handle = task.handle();
        self.stats.record_submitted();

        if !options.defer_to_next_tick {
            let elapsed = config.clamp_elapsed(options.initial_elapsed);
            if let Err(err) = task.advance(elapsed, true) {
                task.cancel();
                self.stats.record_failed();
                return Err(err);
            }
            if task.is_done() {
                debug!(task = %handle.id(), name = ?handle.name(), "finished on submission");
                self.stats.record_retired();
                return Ok(handle);
            }
        }

        debug!(
            task = %handle.id(),
            name = ?handle.name(),
            deferred = options.defer_to_next_tick,
            "task submitted"
        );
        self.pending.lock().push(task);
        Ok(handle)
    }
}

/// Cloneable submission endpoint for a [`Scheduler`].
///
/// A computation that needs to start other tasks captures a spawner. Tasks
/// submitted through it behave exactly like ones submitted through the
/// scheduler: they join the active set at the end of the current tick.
#[derive(Debug, Clone)]
pub struct Spawner {
    shared: Arc<Shared>,
    config: Arc<SchedulerConfig>,
}

impl Spawner {
    /// Submit a computation, deferred to the next tick.
    pub fn submit<C>(
        &self,
        computation: C,
    ) -> Result<TaskHandle>
    where
        C: Computation + 'static,
    {
        self.submit_with(computation, SubmitOptions::default())
    }

    /// Submit a computation with explicit options.
    pub fn submit_with<C>(
        &self,
        computation: C,
        options: SubmitOptions,
    ) -> Result<TaskHandle>
    where
        C: Computation + 'static,
    {
        self.shared
            .submit(Box::new(computation), options, &self.config)
    }

    /// Check if the owning scheduler has been disposed.
    #[inline]
    pub fn is_disposed(&self) -> bool {
        self.shared.disposed.load(Ordering::Acquire)
    }
}

/// Owns a population of tasks and advances them once per tick.
#[derive(Debug)]
pub struct Scheduler {
    /// Configuration, shared with spawners.
    config: Arc<SchedulerConfig>,
    /// Tasks eligible for advancing, in insertion order.
    active: Vec<Task>,
    /// Snapshot of `active` taken at the start of each tick.
    scratch: Vec<Task>,
    shared: Arc<Shared>,
}

impl Scheduler {
    /// Create a new scheduler with default config.
    #[inline]
    pub fn new() -> Self {
        Self::with_config(SchedulerConfig::default())
    }

    /// Create a scheduler with custom configuration.
    pub fn with_config(config: SchedulerConfig) -> Self {
        let capacity = config.initial_capacity;
        Self {
            config: Arc::new(config),
            active: Vec::with_capacity(capacity),
            scratch: Vec::with_capacity(capacity),
            shared: Arc::new(Shared {
                pending: Mutex::new(Vec::with_capacity(capacity)),
                disposed: AtomicBool::new(false),
                ids: Arc::new(TaskIdGenerator::new()),
                stats: SchedulerStats::default(),
            }),
        }
    }

    /// Submit a computation, deferred to the next tick.
    pub fn submit<C>(
        &self,
        computation: C,
    ) -> Result<TaskHandle>
    where
        C: Computation + 'static,
    {
        self.submit_with(computation, SubmitOptions::default())
    }

    /// Submit a computation with explicit options.
    ///
    /// A non-deferred submission is advanced once right away. If that single
    /// advance finishes it, the task never enters the scheduler; otherwise it
    /// still waits for the next tick boundary before joining the active set.
    pub fn submit_with<C>(
        &self,
        computation: C,
        options: SubmitOptions,
    ) -> Result<TaskHandle>
    where
        C: Computation + 'static,
    {
        self.shared
            .submit(Box::new(computation), options, &self.config)
    }

    /// Get a spawner that submits into this scheduler.
    #[inline]
    pub fn spawner(&self) -> Spawner {
        Spawner {
            shared: Arc::clone(&self.shared),
            config: Arc::clone(&self.config),
        }
    }

    /// Advance every active task once.
    ///
    /// Tasks are advanced in the order they were in at the start of the call.
    /// Submissions made during the pass are not advanced until the next call.
    ///
    /// An invalid control signal aborts the faulting task and ends the pass:
    /// tasks not yet advanced keep their place and wait for the next tick.
    /// Pending tasks are promoted either way.
    pub fn advance_all(
        &mut self,
        elapsed: f64,
    ) -> Result<()> {
        self.shared.ensure_live()?;
        let elapsed = self.config.clamp_elapsed(elapsed);

        std::mem::swap(&mut self.active, &mut self.scratch);
        let mut outcome = Ok(());
        let mut snapshot = self.scratch.drain(..);
        for mut task in snapshot.by_ref() {
            match task.advance(elapsed, true) {
                Ok(()) if task.is_done() => {
                    debug!(task = %task.id(), updates = task.handle().update_count(), "task retired");
                    self.shared.stats.record_retired();
                }
                Ok(()) => self.active.push(task),
                Err(err) => {
                    task.cancel();
                    self.shared.stats.record_failed();
                    outcome = Err(err);
                    break;
                }
            }
        }
        self.active.extend(snapshot);

        self.active.append(&mut self.shared.pending.lock());
        self.shared.stats.record_tick();
        outcome
    }

    /// Cancel every task, active or pending.
    ///
    /// Pending tasks are dropped now. Active tasks are marked done and
    /// removed by the next `advance_all`.
    pub fn cancel_all(&mut self) {
        let mut guard = self.shared.pending.lock();
        let mut count = 0;
        for task in self.active.iter().chain(guard.iter()) {
            if !task.is_done() {
                task.cancel();
                count += 1;
            }
        }
        // Computations may submit through a spawner when dropped.
        let pending = std::mem::take(&mut *guard);
        drop(guard);
        drop(pending);

        self.shared.stats.record_cancelled(count);
        debug!(count, "cancelled all tasks");
    }

    /// Drop every task and refuse further use. Idempotent.
    pub fn dispose(&mut self) {
        if self.shared.disposed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.active.clear();
        self.scratch.clear();
        // Take the tasks out first so their computations are not dropped
        // under the lock.
        let pending = std::mem::take(&mut *self.shared.pending.lock());
        drop(pending);
        debug!("scheduler disposed");
    }

    /// Check if the scheduler has been disposed.
    #[inline]
    pub fn is_disposed(&self) -> bool {
        self.shared.disposed.load(Ordering::Acquire)
    }

    /// Number of tasks in the active set.
    #[inline]
    pub fn active_len(&self) -> usize {
        self.active.len()
    }

    /// Number of tasks waiting for the next tick boundary.
    #[inline]
    pub fn pending_len(&self) -> usize {
        self.shared.pending.lock().len()
    }

    /// Whether no tasks are active or pending.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.active.is_empty() && self.shared.pending.lock().is_empty()
    }

    /// Handles to the active tasks, in advance order.
    pub fn active_handles(&self) -> Vec<TaskHandle> {
        self.active.iter().map(Task::handle).collect()
    }

    /// Get statistics.
    #[inline]
    pub fn stats(&self) -> &SchedulerStats {
        &self.shared.stats
    }

    /// Get the configuration.
    #[inline]
    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.dispose();
    }
}

#[cfg(test)]
mod tests;
