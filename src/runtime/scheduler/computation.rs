//! Ready-made computations.
//!
//! Most time-based behavior is a short script of waits followed by an
//! action. These builders cover the common shapes so callers do not need a
//! hand-written state machine for each one.

use std::iter;

use super::signal::{Computation, Signal};
use super::task::TaskHandle;

/// Build a computation from a closure called once per resume.
///
/// The closure returns the next signal, or `None` to finish.
#[inline]
pub fn from_fn<F>(f: F) -> impl Computation
where
    F: FnMut() -> Option<Signal> + Send,
{
    iter::from_fn(f)
}

/// Wait `seconds`, then finish.
#[inline]
pub fn wait_seconds(seconds: f64) -> impl Computation {
    iter::once(Signal::WaitSeconds(seconds))
}

/// Wait until `peer` is done, then finish.
#[inline]
pub fn wait_for(peer: TaskHandle) -> impl Computation {
    iter::once(Signal::WaitFor(peer))
}

/// Run `action` on the first resume and finish in the same step.
pub fn once<F>(action: F) -> impl Computation
where
    F: FnOnce() + Send,
{
    let mut action = Some(action);
    iter::from_fn(move || {
        if let Some(action) = action.take() {
            action();
        }
        None
    })
}

/// Wait `seconds`, then run `action` and finish.
pub fn delay<F>(
    seconds: f64,
    action: F,
) -> impl Computation
where
    F: FnOnce() + Send,
{
    let mut action = Some(action);
    iter::once(Signal::WaitSeconds(seconds)).chain(iter::from_fn(move || {
        if let Some(action) = action.take() {
            action();
        }
        None
    }))
}

/// Run each computation to completion, one after another.
///
/// Every step runs as a nested child of the sequence, so a step that
/// finishes instantly hands over to the next one without losing a tick.
pub fn sequence(steps: Vec<Box<dyn Computation>>) -> impl Computation {
    steps.into_iter().map(Signal::Nested)
}

/// Call `action` every `interval` seconds for as long as it returns `true`.
///
/// The first call happens after one full interval.
pub fn repeat_every<F>(
    interval: f64,
    mut action: F,
) -> impl Computation
where
    F: FnMut() -> bool + Send,
{
    iter::once(Signal::WaitSeconds(interval))
        .chain(iter::from_fn(move || action().then_some(Signal::WaitSeconds(interval))))
}
