//! Scheduler unit tests
//!
//! Task state machine, signal handling and scheduler lifecycle.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use crate::runtime::scheduler::{
    Computation, Signal, Task, TaskHandle, TaskId, TaskIdGenerator, TaskState,
};


/// Computation that yields `signals` in order and counts its resumes.
fn counted(signals: Vec<Signal>) -> (impl Computation, Arc<AtomicUsize>) {
    let resumes = Arc::new(AtomicUsize::new(0));
    let counter = resumes.clone();
    let mut signals = signals.into_iter();
    let computation = std::iter::from_fn(move || {
        counter.fetch_add(1, Ordering::SeqCst);
        signals.next()
    });
    (computation, resumes)
}

/// Computation that yields `Continue` forever and counts its resumes.
fn forever() -> (impl Computation, Arc<AtomicUsize>) {
    let resumes = Arc::new(AtomicUsize::new(0));
    let counter = resumes.clone();
    let computation = std::iter::from_fn(move || {
        counter.fetch_add(1, Ordering::SeqCst);
        Some(Signal::Continue)
    });
    (computation, resumes)
}

fn task(computation: impl Computation + 'static) -> Task {
    Task::new(Box::new(computation), None, Arc::new(TaskIdGenerator::new()))
}

fn assert_close(
    actual: f64,
    expected: f64,
) {
    assert!(
        (actual - expected).abs() < 1e-9,
        "expected {expected}, got {actual}"
    );
}

#[cfg(test)]
mod task_id_tests {
    use super::*;

    #[test]
    fn test_task_id_display() {
        assert_eq!(TaskId(7).to_string(), "Task(7)");
    }

    #[test]
    fn test_task_id_generator_is_sequential() {
        let ids = TaskIdGenerator::new();
        assert_eq!(ids.generate(), TaskId(0));
        assert_eq!(ids.generate(), TaskId(1));
        assert_eq!(ids.generate().inner(), 2);
    }

    #[test]
    fn test_task_state_round_trip() {
        for state in [TaskState::Active, TaskState::Done] {
            assert_eq!(TaskState::from_u8(state.as_u8()), state);
        }
    }
}

#[cfg(test)]
mod task_tests {
    use super::*;

    #[test]
    fn test_task_starts_active() {
        let (computation, resumes) = counted(vec![]);
        let task = task(computation);
        assert!(!task.is_done());
        assert_eq!(task.handle().state(), TaskState::Active);
        assert_eq!(task.handle().update_count(), 0);
        assert_eq!(resumes.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_empty_computation_finishes_on_first_advance() {
        let (computation, resumes) = counted(vec![]);
        let mut task = task(computation);
        task.advance(0.1, true).unwrap();
        assert!(task.is_done());
        assert_eq!(resumes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_advance_when_done_is_noop() {
        let (computation, resumes) = counted(vec![]);
        let mut task = task(computation);
        task.advance(0.1, true).unwrap();
        task.advance(0.1, true).unwrap();
        task.advance(0.1, true).unwrap();
        assert_eq!(resumes.load(Ordering::SeqCst), 1);
        assert_eq!(task.handle().update_count(), 1);
    }

    #[test]
    fn test_continue_resumes_every_advance() {
        let (computation, resumes) = forever();
        let mut task = task(computation);
        for _ in 0..5 {
            task.advance(0.016, true).unwrap();
        }
        assert_eq!(resumes.load(Ordering::SeqCst), 5);
        assert_eq!(task.handle().update_count(), 5);
    }

    #[test]
    fn test_catch_up_advance_does_not_count_a_tick() {
        let (computation, _) = forever();
        let mut task = task(computation);
        task.advance(0.0, false).unwrap();
        assert_eq!(task.handle().update_count(), 0);
    }

    #[test]
    fn test_timer_expiry_is_seen_on_the_following_advance() {
        let (computation, resumes) = counted(vec![Signal::WaitSeconds(1.0)]);
        let mut task = task(computation);

        task.advance(0.0, true).unwrap();
        assert_close(task.timer(), 1.0);

        task.advance(0.4, true).unwrap();
        assert_close(task.timer(), 0.6);
        task.advance(0.4, true).unwrap();
        assert_close(task.timer(), 0.2);
        task.advance(0.4, true).unwrap();
        assert_close(task.timer(), -0.2);
        assert!(!task.is_done());
        assert_eq!(resumes.load(Ordering::SeqCst), 1);

        task.advance(0.4, true).unwrap();
        assert!(task.is_done());
        assert_eq!(resumes.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_timer_reaching_exactly_zero_still_waits_one_advance() {
        let (computation, _) = counted(vec![Signal::WaitSeconds(0.5)]);
        let mut task = task(computation);
        task.advance(0.0, true).unwrap();
        task.advance(0.5, true).unwrap();
        assert_close(task.timer(), 0.0);
        assert!(!task.is_done());
        task.advance(0.5, true).unwrap();
        assert!(task.is_done());
    }

    #[test]
    fn test_non_positive_wait_resumes_next_advance() {
        let (computation, resumes) = counted(vec![Signal::WaitSeconds(0.0), Signal::Continue]);
        let mut task = task(computation);
        task.advance(0.1, true).unwrap();
        task.advance(0.1, true).unwrap();
        assert_eq!(resumes.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_instant_child_resumes_parent_in_same_advance() {
        let reached = Arc::new(AtomicBool::new(false));
        let marker = reached.clone();
        let mut step = 0;
        let parent = std::iter::from_fn(move || {
            step += 1;
            match step {
                1 => Some(Signal::nested(std::iter::empty::<Signal>())),
                2 => {
                    marker.store(true, Ordering::SeqCst);
                    Some(Signal::Continue)
                }
                _ => None,
            }
        });

        let mut task = task(parent);
        task.advance(0.25, true).unwrap();

        assert!(reached.load(Ordering::SeqCst));
        assert!(!task.has_child());
        assert_eq!(task.handle().update_count(), 1);
    }

    #[test]
    fn test_chain_of_instant_children_costs_one_tick() {
        let (computation, resumes) = counted(vec![
            Signal::nested(std::iter::empty::<Signal>()),
            Signal::nested(std::iter::empty::<Signal>()),
            Signal::nested(std::iter::empty::<Signal>()),
        ]);
        let mut task = task(computation);
        task.advance(0.1, true).unwrap();
        assert!(task.is_done());
        assert_eq!(resumes.load(Ordering::SeqCst), 4);
        assert_eq!(task.handle().update_count(), 1);
    }

    #[test]
    fn test_instant_child_then_wait_uses_elapsed_once() {
        let (computation, _) = counted(vec![
            Signal::nested(std::iter::empty::<Signal>()),
            Signal::WaitSeconds(1.0),
        ]);
        let mut task = task(computation);
        task.advance(0.5, true).unwrap();
        // The wait is set by the catch-up resume and not reduced by the same
        // advance.
        assert_close(task.timer(), 1.0);
    }

    #[test]
    fn test_suspended_child_is_advanced_with_parent() {
        let (child, child_resumes) = counted(vec![Signal::WaitSeconds(0.5)]);
        let (parent, parent_resumes) = counted(vec![Signal::nested(child), Signal::Continue]);
        let mut task = task(parent);

        task.advance(0.5, true).unwrap();
        assert!(task.has_child());
        assert_eq!(child_resumes.load(Ordering::SeqCst), 1);

        task.advance(0.5, true).unwrap();
        assert!(task.has_child());
        assert_eq!(parent_resumes.load(Ordering::SeqCst), 1);

        task.advance(0.5, true).unwrap();
        assert!(!task.has_child());
        assert_eq!(child_resumes.load(Ordering::SeqCst), 2);
        assert_eq!(parent_resumes.load(Ordering::SeqCst), 2);
        assert_eq!(task.handle().update_count(), 3);
    }

    #[test]
    fn test_wait_for_does_not_advance_peer() {
        let (peer_computation, peer_resumes) = forever();
        let peer = task(peer_computation);
        let peer_handle = peer.handle();

        let (computation, resumes) = counted(vec![Signal::WaitFor(peer_handle.clone())]);
        let mut waiter = task(computation);

        for _ in 0..10 {
            waiter.advance(0.1, true).unwrap();
        }
        assert_eq!(peer_resumes.load(Ordering::SeqCst), 0);
        assert_eq!(resumes.load(Ordering::SeqCst), 1);
        assert_eq!(waiter.waiting_on(), Some(&peer_handle));

        peer_handle.cancel();
        waiter.advance(0.1, true).unwrap();
        assert!(waiter.waiting_on().is_none());
        assert!(waiter.is_done());
        assert_eq!(peer_resumes.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_cancel_marks_done_and_stops_resuming() {
        let (computation, resumes) = forever();
        let mut task = task(computation);
        task.advance(0.1, true).unwrap();
        task.cancel();
        task.advance(0.1, true).unwrap();
        assert!(task.is_done());
        assert_eq!(resumes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_cancelling_waiter_leaves_peer_running() {
        let (peer_computation, _) = forever();
        let peer = task(peer_computation);
        let (computation, _) = counted(vec![Signal::WaitFor(peer.handle())]);
        let mut waiter = task(computation);
        waiter.advance(0.1, true).unwrap();
        waiter.cancel();
        assert!(waiter.is_done());
        assert!(!peer.is_done());
    }

    #[test]
    fn test_invalid_signal_is_an_error() {
        let (computation, _) = counted(vec![Signal::Invalid("sprite".to_string())]);
        let mut task = task(computation);
        let err = task.advance(0.1, true).unwrap_err();
        assert!(err.is_invalid_signal());
        assert!(err.to_string().contains("sprite"));
    }

    #[test]
    fn test_nan_wait_is_an_invalid_signal() {
        let (computation, _) = counted(vec![Signal::WaitSeconds(f64::NAN)]);
        let mut task = task(computation);
        assert!(task.advance(0.1, true).unwrap_err().is_invalid_signal());
    }

    #[test]
    fn test_invalid_signal_in_child_propagates() {
        let (child, _) = counted(vec![Signal::Invalid("audio".to_string())]);
        let (parent, _) = counted(vec![Signal::nested(child)]);
        let mut task = task(parent);
        assert!(task.advance(0.1, true).unwrap_err().is_invalid_signal());
    }
}

#[cfg(test)]
mod handle_tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_handles_compare_by_identity() {
        let ids = Arc::new(TaskIdGenerator::new());
        let a = Task::new(Box::new(std::iter::empty::<Signal>()), None, ids.clone());
        let b = Task::new(Box::new(std::iter::empty::<Signal>()), None, ids);
        assert_eq!(a.handle(), a.handle());
        assert_ne!(a.handle(), b.handle());

        let set: HashSet<TaskHandle> = [a.handle(), a.handle(), b.handle()].into_iter().collect();
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_handle_debug_and_name() {
        let task = Task::new(
            Box::new(std::iter::empty::<Signal>()),
            Some("fade-out".to_string()),
            Arc::new(TaskIdGenerator::new()),
        );
        let handle = task.handle();
        assert_eq!(handle.name(), Some("fade-out"));
        let debug = format!("{:?}", handle);
        assert!(debug.contains("fade-out"));
        assert!(debug.contains("Active"));
    }

    #[test]
    fn test_signal_describe() {
        assert_eq!(Signal::Continue.describe(), "continue");
        assert_eq!(Signal::WaitSeconds(1.5).describe(), "wait 1.5s");
        assert_eq!(
            format!("{:?}", Signal::nested(std::iter::empty::<Signal>())),
            "Nested(..)"
        );
    }
}
