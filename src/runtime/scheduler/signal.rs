//! Control signals and the resumable computation trait.
//!
//! A computation is resumed one step at a time. Each step either yields a
//! [`Signal`] telling its task how to suspend, or returns `None` to finish.

use std::fmt;

use super::task::TaskHandle;

/// Value yielded by a computation when it suspends.
pub enum Signal {
    /// Resume again on the next eligible advance.
    Continue,
    /// Suspend for the given number of seconds.
    WaitSeconds(f64),
    /// Suspend until another, independently scheduled task is done.
    ///
    /// The waiting task never advances the peer itself.
    WaitFor(TaskHandle),
    /// Run a sub-computation as an owned child task and resume once it
    /// finishes.
    Nested(Box<dyn Computation>),
    /// A signal the scheduler does not understand. Yielding this aborts the
    /// task with [`SchedulerError::InvalidControlSignal`].
    ///
    /// [`SchedulerError::InvalidControlSignal`]: super::SchedulerError::InvalidControlSignal
    Invalid(String),
}

impl Signal {
    /// Wrap a computation as a nested signal.
    #[inline]
    pub fn nested<C>(computation: C) -> Self
    where
        C: Computation + 'static,
    {
        Signal::Nested(Box::new(computation))
    }

    /// Short description used in logs and errors.
    pub fn describe(&self) -> String {
        match self {
            Signal::Continue => "continue".to_string(),
            Signal::WaitSeconds(seconds) => format!("wait {}s", seconds),
            Signal::WaitFor(handle) => format!("wait for {}", handle.id()),
            Signal::Nested(_) => "nested computation".to_string(),
            Signal::Invalid(what) => format!("invalid({})", what),
        }
    }
}

impl fmt::Debug for Signal {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        match self {
            Signal::Continue => f.write_str("Continue"),
            Signal::WaitSeconds(seconds) => f.debug_tuple("WaitSeconds").field(seconds).finish(),
            Signal::WaitFor(handle) => f.debug_tuple("WaitFor").field(&handle.id()).finish(),
            Signal::Nested(_) => f.write_str("Nested(..)"),
            Signal::Invalid(what) => f.debug_tuple("Invalid").field(what).finish(),
        }
    }
}

/// A resumable sequence of steps.
///
/// `resume` is called at most once per task advance. Returning `None`
/// completes the computation; it will not be resumed again.
pub trait Computation: Send {
    /// Run one step and report how to suspend, or `None` when finished.
    fn resume(&mut self) -> Option<Signal>;
}

impl<I> Computation for I
where
    I: Iterator<Item = Signal> + Send,
{
    #[inline]
    fn resume(&mut self) -> Option<Signal> {
        self.next()
    }
}
