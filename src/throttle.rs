// Throttle governor for high-frequency callbacks (scroll, resize, pointer
// sampling) so that collecting metrics does not eat the frame budget being
// measured.
//
// Leading edge runs immediately, calls inside the interval are counted as
// throttled and coalesced, and the most recent one (or the fold of all of them
// when a merge is installed) runs on the trailing edge once the interval reopens.

use dashmap::DashMap;
use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::{Rc, Weak};
use std::sync::Arc;

use crate::clock::Clock;
use crate::scheduler::{Scheduler, TimerId, FRAME_INTERVAL_MS};

lazy_static! {
    static ref GLOBAL_THROTTLE_MONITOR: ThrottleMonitor = ThrottleMonitor::new();
}

// ============================================================================
// Throttle Monitor
// ============================================================================

/// Self-diagnosis counters for one wrapped function
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThrottleStats {
    pub calls: u64,
    pub throttled: u64,
    pub last_call_timestamp: Option<f64>,
}

impl ThrottleStats {
    /// Share of calls that were coalesced, 0.0..=1.0
    pub fn throttle_ratio(&self) -> f64 {
        if self.calls == 0 {
            0.0
        } else {
            self.throttled as f64 / self.calls as f64
        }
    }
}

/// Per-function call / throttle counters. Clones share the same table.
#[derive(Debug, Clone, Default)]
pub struct ThrottleMonitor {
    stats: Arc<DashMap<String, ThrottleStats>>,
}

impl ThrottleMonitor {
    pub fn new() -> Self {
        ThrottleMonitor::default()
    }

    /// Process-wide monitor used when no instance is injected
    pub fn global() -> &'static ThrottleMonitor {
        &GLOBAL_THROTTLE_MONITOR
    }

    pub fn record_call(&self, name: &str, timestamp_ms: f64) {
        let mut entry = self.stats.entry(name.to_string()).or_default();
        entry.calls += 1;
        entry.last_call_timestamp = Some(timestamp_ms);
    }

    pub fn record_throttled(&self, name: &str) {
        self.stats.entry(name.to_string()).or_default().throttled += 1;
    }

    pub fn stats(&self, name: &str) -> Option<ThrottleStats> {
        self.stats.get(name).map(|entry| *entry)
    }

    /// Sorted copy of every counter
    pub fn snapshot(&self) -> BTreeMap<String, ThrottleStats> {
        self.stats
            .iter()
            .map(|entry| (entry.key().clone(), *entry.value()))
            .collect()
    }

    pub fn reset(&self) {
        self.stats.clear();
    }
}

// ============================================================================
// Throttle
// ============================================================================

/// Minimum spacing between executions
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ThrottleCadence {
    Interval(f64),
    AnimationFrame,
}

impl ThrottleCadence {
    pub fn min_interval_ms(self) -> f64 {
        match self {
            ThrottleCadence::Interval(ms) => ms.max(0.0),
            ThrottleCadence::AnimationFrame => FRAME_INTERVAL_MS,
        }
    }
}

struct ThrottleState<T> {
    // `None` while the callback is running
    callback: Option<Box<dyn FnMut(T)>>,
    last_run_ms: Option<f64>,
    pending: Option<T>,
    timer: Option<TimerId>,
}

/// Rate-limited wrapper around a callback
pub struct Throttle<T: 'static> {
    name: String,
    cadence: ThrottleCadence,
    state: Rc<RefCell<ThrottleState<T>>>,
    clock: Rc<dyn Clock>,
    scheduler: Rc<dyn Scheduler>,
    monitor: ThrottleMonitor,
    coalesce: Option<Box<dyn Fn(T, T) -> T>>,
}

impl<T: 'static> Throttle<T> {
    pub fn new(
        name: impl Into<String>,
        cadence: ThrottleCadence,
        callback: impl FnMut(T) + 'static,
        clock: Rc<dyn Clock>,
        scheduler: Rc<dyn Scheduler>,
    ) -> Self {
        Throttle::with_monitor(
            name,
            cadence,
            callback,
            clock,
            scheduler,
            ThrottleMonitor::global().clone(),
        )
    }

    pub fn with_monitor(
        name: impl Into<String>,
        cadence: ThrottleCadence,
        callback: impl FnMut(T) + 'static,
        clock: Rc<dyn Clock>,
        scheduler: Rc<dyn Scheduler>,
        monitor: ThrottleMonitor,
    ) -> Self {
        Throttle {
            name: name.into(),
            cadence,
            state: Rc::new(RefCell::new(ThrottleState {
                callback: Some(Box::new(callback)),
                last_run_ms: None,
                pending: None,
                timer: None,
            })),
            clock,
            scheduler,
            monitor,
            coalesce: None,
        }
    }

    /// Fold throttled arguments into the pending one instead of keeping only
    /// the latest, e.g. `f64::max` to keep the worst sample of a burst.
    pub fn coalesce_with(mut self, merge: impl Fn(T, T) -> T + 'static) -> Self {
        self.coalesce = Some(Box::new(merge));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn call(&self, arg: T) {
        let now = self.clock.now_ms();
        self.monitor.record_call(&self.name, now);

        let interval = self.cadence.min_interval_ms();
        let ready = {
            let state = self.state.borrow();
            state.callback.is_some()
                && state.last_run_ms.map_or(true, |last| now - last >= interval)
        };

        if ready {
            // A late trailing timer would only replay an older argument.
            let stale_timer = {
                let mut state = self.state.borrow_mut();
                state.pending = None;
                state.timer.take()
            };
            if let Some(id) = stale_timer {
                self.scheduler.cancel(id);
            }
            run_now(&self.state, now, arg);
        } else {
            self.monitor.record_throttled(&self.name);
            {
                let mut state = self.state.borrow_mut();
                let next = match (state.pending.take(), &self.coalesce) {
                    (Some(previous), Some(merge)) => merge(previous, arg),
                    _ => arg,
                };
                state.pending = Some(next);
            }
            self.schedule_trailing(now, interval);
        }
    }

    /// Drop a pending trailing call without running it.
    pub fn cancel(&self) {
        let timer = {
            let mut state = self.state.borrow_mut();
            state.pending = None;
            state.timer.take()
        };
        if let Some(id) = timer {
            self.scheduler.cancel(id);
        }
    }

    /// Run a pending trailing call right away.
    pub fn flush(&self) {
        let (timer, pending) = {
            let mut state = self.state.borrow_mut();
            (state.timer.take(), state.pending.take())
        };
        if let Some(id) = timer {
            self.scheduler.cancel(id);
        }
        if let Some(arg) = pending {
            run_now(&self.state, self.clock.now_ms(), arg);
        }
    }

    pub fn has_pending(&self) -> bool {
        self.state.borrow().pending.is_some()
    }

    pub fn stats(&self) -> ThrottleStats {
        self.monitor.stats(&self.name).unwrap_or_default()
    }

    fn schedule_trailing(&self, now: f64, interval: f64) {
        if self.state.borrow().timer.is_some() {
            return;
        }

        let weak: Weak<RefCell<ThrottleState<T>>> = Rc::downgrade(&self.state);
        let clock = self.clock.clone();
        let task = Box::new(move || {
            let Some(state) = weak.upgrade() else {
                return;
            };
            let pending = {
                let mut state = state.borrow_mut();
                state.timer = None;
                state.pending.take()
            };
            if let Some(arg) = pending {
                run_now(&state, clock.now_ms(), arg);
            }
        });

        let id = match self.cadence {
            ThrottleCadence::AnimationFrame => self.scheduler.request_frame(task),
            ThrottleCadence::Interval(_) => {
                let last = self.state.borrow().last_run_ms.unwrap_or(now);
                let delay = (last + interval - now).max(0.0);
                self.scheduler.set_timeout(delay, task)
            }
        };
        self.state.borrow_mut().timer = Some(id);
    }
}

impl<T: 'static> Drop for Throttle<T> {
    fn drop(&mut self) {
        if let Some(id) = self.state.borrow_mut().timer.take() {
            self.scheduler.cancel(id);
        }
    }
}

fn run_now<T>(state: &Rc<RefCell<ThrottleState<T>>>, now: f64, arg: T) {
    let callback = {
        let mut state = state.borrow_mut();
        state.last_run_ms = Some(now);
        state.callback.take()
    };
    match callback {
        Some(mut callback) => {
            callback(arg);
            state.borrow_mut().callback = Some(callback);
        }
        None => state.borrow_mut().pending = Some(arg),
    }
}
