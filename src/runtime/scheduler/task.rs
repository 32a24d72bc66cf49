//! Tasks driven by the scheduler.
//!
//! A [`Task`] wraps one [`Computation`] and advances it by at most one logical
//! step per call, honoring any pending suspension first. The observable part
//! of a task lives in a shared status record that [`TaskHandle`]s point at, so
//! callers can watch or cancel a task the scheduler owns.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, AtomicU8, AtomicUsize, Ordering};
use std::sync::Arc;

use tracing::{trace, warn};

use super::error::{Result, SchedulerError};
use super::signal::{Computation, Signal};

/// Unique task identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(pub usize);

impl TaskId {
    /// Get the inner value.
    #[inline]
    pub fn inner(&self) -> usize {
        self.0
    }
}

impl From<usize> for TaskId {
    fn from(val: usize) -> Self {
        Self(val)
    }
}

impl fmt::Display for TaskId {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(f, "Task({})", self.0)
    }
}

/// Generator for task IDs, shared by a scheduler and its spawners.
#[derive(Debug, Default)]
pub struct TaskIdGenerator {
    next_id: AtomicUsize,
}

impl TaskIdGenerator {
    /// Create a new task ID generator.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Generate the next task ID.
    #[inline]
    pub fn generate(&self) -> TaskId {
        TaskId(self.next_id.fetch_add(1, Ordering::Relaxed))
    }
}

/// Task state.
///
/// There is no "not started" state: a task is active from construction and
/// first resumed on its first advance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    /// Task can still make progress.
    Active,
    /// Task finished or was cancelled.
    Done,
}

impl TaskState {
    /// Convert from u8 (for atomic storage).
    #[inline]
    pub fn from_u8(val: u8) -> Self {
        match val {
            0 => TaskState::Active,
            _ => TaskState::Done,
        }
    }

    /// Convert to u8 (for atomic storage).
    #[inline]
    pub fn as_u8(&self) -> u8 {
        match self {
            TaskState::Active => 0,
            TaskState::Done => 1,
        }
    }
}

/// Shared, observable part of a task.
#[derive(Debug)]
struct TaskStatus {
    id: TaskId,
    name: Option<String>,
    state: AtomicU8,
    update_count: AtomicU64,
}

/// Handle to a scheduled task.
///
/// Handles are cheap to clone and compare by identity. Holding one does not
/// keep the task running, and waiting on one never advances it.
#[derive(Clone)]
pub struct TaskHandle {
    status: Arc<TaskStatus>,
}

impl TaskHandle {
    fn new(
        id: TaskId,
        name: Option<String>,
    ) -> Self {
        Self {
            status: Arc::new(TaskStatus {
                id,
                name,
                state: AtomicU8::new(TaskState::Active.as_u8()),
                update_count: AtomicU64::new(0),
            }),
        }
    }

    /// Get the task ID.
    #[inline]
    pub fn id(&self) -> TaskId {
        self.status.id
    }

    /// Get the task name, if one was given.
    #[inline]
    pub fn name(&self) -> Option<&str> {
        self.status.name.as_deref()
    }

    /// Get the current state.
    #[inline]
    pub fn state(&self) -> TaskState {
        TaskState::from_u8(self.status.state.load(Ordering::Acquire))
    }

    /// Check if the task is done.
    #[inline]
    pub fn is_done(&self) -> bool {
        self.state() == TaskState::Done
    }

    /// Number of advances that counted as a full tick.
    #[inline]
    pub fn update_count(&self) -> u64 {
        self.status.update_count.load(Ordering::Relaxed)
    }

    /// Mark the task done.
    ///
    /// Cancellation is cooperative: it takes effect the next time the owner
    /// looks at the task. A peer this task waits on is not affected.
    #[inline]
    pub fn cancel(&self) {
        self.status.state.store(TaskState::Done.as_u8(), Ordering::Release);
    }

    #[inline]
    fn finish(&self) {
        self.status.state.store(TaskState::Done.as_u8(), Ordering::Release);
    }

    #[inline]
    fn record_tick(&self) {
        self.status.update_count.fetch_add(1, Ordering::Relaxed);
    }
}

impl fmt::Debug for TaskHandle {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct("TaskHandle")
            .field("id", &self.id())
            .field("name", &self.name())
            .field("state", &self.state())
            .field("update_count", &self.update_count())
            .finish()
    }
}

impl PartialEq for TaskHandle {
    fn eq(
        &self,
        other: &Self,
    ) -> bool {
        Arc::ptr_eq(&self.status, &other.status)
    }
}

impl Eq for TaskHandle {}

impl Hash for TaskHandle {
    fn hash<H: Hasher>(
        &self,
        state: &mut H,
    ) {
        Arc::as_ptr(&self.status).hash(state);
    }
}

/// Options for submitting a computation.
#[derive(Debug, Clone)]
pub struct SubmitOptions {
    /// Diagnostic name for the task.
    pub name: Option<String>,
    /// Elapsed seconds for the immediate first advance. Only used when the
    /// submission is not deferred.
    pub initial_elapsed: f64,
    /// Wait for the next tick before the first advance.
    pub defer_to_next_tick: bool,
}

impl Default for SubmitOptions {
    fn default() -> Self {
        Self {
            name: None,
            initial_elapsed: 0.0,
            defer_to_next_tick: true,
        }
    }
}

impl SubmitOptions {
    /// Create the default options: deferred, no name.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the task name.
    #[inline]
    pub fn name(
        mut self,
        name: impl Into<String>,
    ) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Advance once right away with `initial_elapsed` instead of deferring.
    #[inline]
    pub fn immediate(
        mut self,
        initial_elapsed: f64,
    ) -> Self {
        self.initial_elapsed = initial_elapsed;
        self.defer_to_next_tick = false;
        self
    }

    /// Defer the first advance to the next tick.
    #[inline]
    pub fn deferred(mut self) -> Self {
        self.defer_to_next_tick = true;
        self
    }
}

/// A resumable computation owned by a scheduler or by a parent task.
pub struct Task {
    handle: TaskHandle,
    computation: Box<dyn Computation>,
    /// Owned sub-task spawned by a nested signal.
    child: Option<Box<Task>>,
    /// Independently scheduled peer this task waits on.
    waiting_on: Option<TaskHandle>,
    /// Remaining seconds of a timed wait.
    timer: f64,
    ids: Arc<TaskIdGenerator>,
}

impl fmt::Debug for Task {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct("Task")
            .field("handle", &self.handle)
            .field("child", &self.child.as_ref().map(|child| child.id()))
            .field("waiting_on", &self.waiting_on.as_ref().map(TaskHandle::id))
            .field("timer", &self.timer)
            .finish()
    }
}

impl Task {
    /// Wrap a computation in a new active task.
    pub fn new(
        computation: Box<dyn Computation>,
        name: Option<String>,
        ids: Arc<TaskIdGenerator>,
    ) -> Self {
        let id = ids.generate();
        Self {
            handle: TaskHandle::new(id, name),
            computation,
            child: None,
            waiting_on: None,
            timer: 0.0,
            ids,
        }
    }

    /// Get the task ID.
    #[inline]
    pub fn id(&self) -> TaskId {
        self.handle.id()
    }

    /// Get a handle to this task.
    #[inline]
    pub fn handle(&self) -> TaskHandle {
        self.handle.clone()
    }

    /// Check if the task is done.
    #[inline]
    pub fn is_done(&self) -> bool {
        self.handle.is_done()
    }

    /// Mark the task done.
    #[inline]
    pub fn cancel(&self) {
        self.handle.cancel();
    }

    /// Remaining seconds of the pending timed wait; zero or less when none.
    #[inline]
    pub fn timer(&self) -> f64 {
        self.timer
    }

    /// Whether the task is suspended on an owned child.
    #[inline]
    pub fn has_child(&self) -> bool {
        self.child.is_some()
    }

    /// The peer this task is waiting on, if any.
    #[inline]
    pub fn waiting_on(&self) -> Option<&TaskHandle> {
        self.waiting_on.as_ref()
    }

    /// Advance the task by one logical step.
    ///
    /// Suspensions are checked in a fixed order: child, then waited-on
    /// peer, then timer. Only when none of them holds the task back is the
    /// computation resumed. `counts_as_tick` is false for the synchronous
    /// catch-up resume that follows a child finishing instantly.
    pub fn advance(
        &mut self,
        elapsed: f64,
        counts_as_tick: bool,
    ) -> Result<()> {
        if self.is_done() {
            return Ok(());
        }
        if counts_as_tick {
            self.handle.record_tick();
        }

        if let Some(child) = self.child.as_mut() {
            child.advance(elapsed, true)?;
            if !child.is_done() {
                return Ok(());
            }
            self.child = None;
        }

        if let Some(peer) = &self.waiting_on {
            if !peer.is_done() {
                return Ok(());
            }
            self.waiting_on = None;
        }

        if self.timer > 0.0 {
            // Expiry is seen on the next advance, even if this drives it to zero.
            self.timer -= elapsed;
            return Ok(());
        }

        self.resume(elapsed)
    }

    /// Resume the computation, repeating for as long as nested children
    /// finish within their first advance.
    fn resume(
        &mut self,
        elapsed: f64,
    ) -> Result<()> {
        loop {
            let Some(signal) = self.computation.resume() else {
                trace!(task = %self.id(), "computation finished");
                self.handle.finish();
                return Ok(());
            };

            trace!(task = %self.id(), signal = %signal.describe(), "resumed");
            match signal {
                Signal::Continue => {}
                Signal::WaitSeconds(seconds) if seconds.is_nan() => {
                    return Err(self.invalid_signal("wait NaN seconds".to_string()));
                }
                Signal::WaitSeconds(seconds) => self.timer = seconds,
                Signal::WaitFor(peer) => self.waiting_on = Some(peer),
                Signal::Nested(computation) => {
                    let mut child = Task::new(computation, None, Arc::clone(&self.ids));
                    child.advance(elapsed, true)?;
                    if child.is_done() {
                        // Instant child: catch up within this advance, without
                        // counting another tick.
                        if self.is_done() {
                            return Ok(());
                        }
                        continue;
                    }
                    self.child = Some(Box::new(child));
                }
                Signal::Invalid(what) => return Err(self.invalid_signal(what)),
            }
            return Ok(());
        }
    }

    fn invalid_signal(
        &self,
        signal: String,
    ) -> SchedulerError {
        warn!(task = %self.id(), %signal, "invalid control signal");
        SchedulerError::InvalidControlSignal {
            task: self.id(),
            signal,
        }
    }
}
