//! Scheduler errors

use thiserror::Error;

use super::task::TaskId;

/// Errors raised by the scheduler and the tasks it drives.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SchedulerError {
    /// A computation yielded a signal outside the supported set.
    ///
    /// This is a programming error in the computation, not a runtime
    /// condition. The faulting task is aborted.
    #[error("{task} yielded an invalid control signal: {signal}")]
    InvalidControlSignal { task: TaskId, signal: String },

    /// The scheduler was used after `dispose`.
    #[error("scheduler has been disposed")]
    ObjectDisposed,
}

impl SchedulerError {
    /// Whether this error marks a defect in a computation.
    #[inline]
    pub fn is_invalid_signal(&self) -> bool {
        matches!(self, SchedulerError::InvalidControlSignal { .. })
    }
}

/// Result alias for scheduler operations.
pub type Result<T, E = SchedulerError> = std::result::Result<T, E>;
