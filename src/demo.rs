//! Scripted demo simulation.
//!
//! Drives a scheduler through a fixed number of ticks with a handful of the
//! behaviors the scheduler exists for: delayed effects started by an emitter
//! task, a nested fade sequence, a cleanup that waits on the fade, and a
//! blinking indicator that gets cancelled half way through.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::info;

use crate::runtime::scheduler::computation::{delay, from_fn, once, repeat_every, sequence, wait_for};
use crate::runtime::scheduler::{Computation, Result, Scheduler, Signal, SubmitOptions};
use crate::util::config::{Config, DemoConfig};

/// One line of the demo's event log.
#[derive(Debug, Clone, PartialEq)]
pub struct DemoEvent {
    /// Tick during which the event happened, counting from zero.
    pub tick: u64,
    /// What happened.
    pub message: String,
}

/// Outcome of a demo run.
#[derive(Debug, Clone, Default)]
pub struct DemoReport {
    /// Ticks actually simulated.
    pub ticks: u64,
    /// Events in the order they happened.
    pub events: Vec<DemoEvent>,
    /// Tasks still alive when the run ended.
    pub remaining: usize,
}

#[derive(Clone)]
struct EventLog {
    tick: Arc<AtomicUsize>,
    events: Arc<Mutex<Vec<DemoEvent>>>,
}

impl EventLog {
    fn new() -> Self {
        Self {
            tick: Arc::new(AtomicUsize::new(0)),
            events: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn record(
        &self,
        message: impl Into<String>,
    ) {
        let tick = self.tick.load(Ordering::Relaxed) as u64;
        let message = message.into();
        info!(tick, "{}", message);
        self.events.lock().push(DemoEvent { tick, message });
    }
}

/// Run the demo with the given configuration.
pub fn run_demo(config: &Config) -> Result<DemoReport> {
    let DemoConfig { ticks, dt, effects } = config.demo.clone();
    let mut scheduler = Scheduler::with_config(config.scheduler.clone());
    let log = EventLog::new();

    scheduler.submit_with(
        emitter(&scheduler, &log, effects),
        SubmitOptions::new().name("emitter"),
    )?;

    let fade = scheduler.submit_with(fade_out(&log), SubmitOptions::new().name("fade-out"))?;

    let cleanup_log = log.clone();
    let cleanup: Vec<Box<dyn Computation>> = vec![
        Box::new(wait_for(fade)),
        Box::new(once(move || cleanup_log.record("entity destroyed"))),
    ];
    scheduler.submit_with(sequence(cleanup), SubmitOptions::new().name("cleanup"))?;

    let blink_log = log.clone();
    let mut lit = false;
    let blink = scheduler.submit_with(
        repeat_every(0.25, move || {
            lit = !lit;
            blink_log.record(if lit { "indicator on" } else { "indicator off" });
            true
        }),
        SubmitOptions::new().name("blink"),
    )?;

    for tick in 0..ticks {
        log.tick.store(tick as usize, Ordering::Relaxed);
        if tick == ticks / 2 && !blink.is_done() {
            blink.cancel();
            log.record("indicator cancelled");
        }
        scheduler.advance_all(dt)?;
    }

    let report = DemoReport {
        ticks,
        events: log.events.lock().clone(),
        remaining: scheduler.active_len() + scheduler.pending_len(),
    };
    scheduler.dispose();
    Ok(report)
}

/// Starts one delayed effect every half second.
fn emitter(
    scheduler: &Scheduler,
    log: &EventLog,
    effects: usize,
) -> impl Computation {
    let spawner = scheduler.spawner();
    let log = log.clone();
    let mut started = 0;
    from_fn(move || {
        if started == effects {
            return None;
        }
        started += 1;
        let index = started;
        let effect_log = log.clone();
        log.record(format!("effect {} scheduled", index));
        if let Err(err) = spawner.submit_with(
            delay(1.0, move || effect_log.record(format!("effect {} fired", index))),
            SubmitOptions::new().name(format!("effect-{}", index)),
        ) {
            log.record(format!("effect {} rejected: {}", index, err));
            return None;
        }
        Some(Signal::WaitSeconds(0.5))
    })
}

/// Three-stage fade, each stage a nested step.
fn fade_out(log: &EventLog) -> impl Computation {
    let stage = |name: &'static str, seconds: f64| -> Box<dyn Computation> {
        let log = log.clone();
        Box::new(delay(seconds, move || log.record(format!("fade {}", name))))
    };
    sequence(vec![stage("start", 0.0), stage("half", 0.5), stage("end", 0.5)])
}
