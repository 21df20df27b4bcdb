// Deferred execution on the single event loop.
//
// The throttle governor and the report refresher never block; they ask a
// `Scheduler` to run a task later. In the browser that is `setTimeout` /
// `requestAnimationFrame`; in tests it is a virtual timer queue driven by a
// `ManualClock`.

use std::cell::RefCell;
use std::rc::Rc;

use crate::clock::{Clock, ManualClock};

/// Nominal frame interval at 60 Hz
pub const FRAME_INTERVAL_MS: f64 = 1000.0 / 60.0;

pub type Task = Box<dyn FnOnce()>;

/// Handle for a scheduled task
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerId {
    Timeout(u64),
    Frame(u64),
}

pub trait Scheduler {
    /// Run `task` once, no earlier than `delay_ms` from now.
    fn set_timeout(&self, delay_ms: f64, task: Task) -> TimerId;

    /// Run `task` before the next repaint.
    fn request_frame(&self, task: Task) -> TimerId;

    /// Cancel a task that has not run yet. Unknown ids are ignored.
    fn cancel(&self, id: TimerId);
}

// ============================================================================
// Virtual scheduler
// ============================================================================

struct PendingTask {
    due_ms: f64,
    seq: u64,
    id: TimerId,
    task: Task,
}

#[derive(Default)]
struct ManualQueue {
    tasks: Vec<PendingTask>,
    next_seq: u64,
}

/// Timer queue on virtual time. `advance` moves the shared clock forward and
/// runs every task that falls due, in due-time order, with the clock set to
/// each task's due time while it runs.
#[derive(Clone)]
pub struct ManualScheduler {
    clock: ManualClock,
    queue: Rc<RefCell<ManualQueue>>,
}

impl ManualScheduler {
    pub fn new(clock: ManualClock) -> Self {
        ManualScheduler {
            clock,
            queue: Rc::new(RefCell::new(ManualQueue::default())),
        }
    }

    pub fn clock(&self) -> &ManualClock {
        &self.clock
    }

    pub fn pending(&self) -> usize {
        self.queue.borrow().tasks.len()
    }

    pub fn advance(&self, delta_ms: f64) {
        self.advance_to(self.clock.now_ms() + delta_ms);
    }

    pub fn advance_to(&self, target_ms: f64) {
        loop {
            let next = {
                let mut queue = self.queue.borrow_mut();
                let due = queue
                    .tasks
                    .iter()
                    .enumerate()
                    .filter(|(_, t)| t.due_ms <= target_ms)
                    .min_by(|(_, a), (_, b)| {
                        a.due_ms
                            .total_cmp(&b.due_ms)
                            .then_with(|| a.seq.cmp(&b.seq))
                    })
                    .map(|(index, _)| index);
                due.map(|index| queue.tasks.remove(index))
            };

            match next {
                Some(pending) => {
                    if pending.due_ms > self.clock.now_ms() {
                        self.clock.set(pending.due_ms);
                    }
                    (pending.task)();
                }
                None => break,
            }
        }

        if target_ms > self.clock.now_ms() {
            self.clock.set(target_ms);
        }
    }

    fn push(&self, delay_ms: f64, make_id: fn(u64) -> TimerId, task: Task) -> TimerId {
        let mut queue = self.queue.borrow_mut();
        let seq = queue.next_seq;
        queue.next_seq += 1;
        let id = make_id(seq);
        queue.tasks.push(PendingTask {
            due_ms: self.clock.now_ms() + delay_ms.max(0.0),
            seq,
            id,
            task,
        });
        id
    }
}

impl Scheduler for ManualScheduler {
    fn set_timeout(&self, delay_ms: f64, task: Task) -> TimerId {
        self.push(delay_ms, TimerId::Timeout, task)
    }

    fn request_frame(&self, task: Task) -> TimerId {
        self.push(FRAME_INTERVAL_MS, TimerId::Frame, task)
    }

    fn cancel(&self, id: TimerId) {
        self.queue.borrow_mut().tasks.retain(|t| t.id != id);
    }
}

// ============================================================================
// Browser scheduler
// ============================================================================

/// `setTimeout` / `requestAnimationFrame` on the page's window.
#[cfg(target_arch = "wasm32")]
#[derive(Debug, Default, Clone, Copy)]
pub struct BrowserScheduler;

#[cfg(target_arch = "wasm32")]
impl Scheduler for BrowserScheduler {
    fn set_timeout(&self, delay_ms: f64, task: Task) -> TimerId {
        use wasm_bindgen::closure::Closure;
        use wasm_bindgen::JsCast;

        let Some(window) = web_sys::window() else {
            log::warn!("No window available, dropping scheduled task");
            return TimerId::Timeout(0);
        };
        let callback = Closure::once_into_js(move || task());
        match window.set_timeout_with_callback_and_timeout_and_arguments_0(
            callback.unchecked_ref(),
            delay_ms.max(0.0).round() as i32,
        ) {
            Ok(handle) => TimerId::Timeout(handle as u64),
            Err(e) => {
                log::warn!("setTimeout failed: {:?}", e);
                TimerId::Timeout(0)
            }
        }
    }

    fn request_frame(&self, task: Task) -> TimerId {
        use wasm_bindgen::closure::Closure;
        use wasm_bindgen::JsCast;

        let Some(window) = web_sys::window() else {
            log::warn!("No window available, dropping frame task");
            return TimerId::Frame(0);
        };
        let callback = Closure::once_into_js(move |_timestamp: f64| task());
        match window.request_animation_frame(callback.unchecked_ref()) {
            Ok(handle) => TimerId::Frame(handle as u64),
            Err(e) => {
                log::warn!("requestAnimationFrame failed: {:?}", e);
                TimerId::Frame(0)
            }
        }
    }

    fn cancel(&self, id: TimerId) {
        let Some(window) = web_sys::window() else {
            return;
        };
        match id {
            TimerId::Timeout(0) | TimerId::Frame(0) => {}
            TimerId::Timeout(handle) => window.clear_timeout_with_handle(handle as i32),
            TimerId::Frame(handle) => {
                if let Err(e) = window.cancel_animation_frame(handle as i32) {
                    log::debug!("cancelAnimationFrame failed: {:?}", e);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tasks_run_in_due_order() {
        let scheduler = ManualScheduler::new(ManualClock::new(0.0));
        let log = Rc::new(RefCell::new(Vec::new()));

        for (delay, label) in [(30.0, "c"), (10.0, "a"), (20.0, "b")] {
            let log = log.clone();
            scheduler.set_timeout(delay, Box::new(move || log.borrow_mut().push(label)));
        }

        scheduler.advance(15.0);
        assert_eq!(*log.borrow(), vec!["a"]);

        scheduler.advance(100.0);
        assert_eq!(*log.borrow(), vec!["a", "b", "c"]);
        assert_eq!(scheduler.clock().now_ms(), 115.0);
    }

    #[test]
    fn test_cancelled_task_never_runs() {
        let scheduler = ManualScheduler::new(ManualClock::new(0.0));
        let ran = Rc::new(RefCell::new(false));

        let flag = ran.clone();
        let id = scheduler.set_timeout(5.0, Box::new(move || *flag.borrow_mut() = true));
        scheduler.cancel(id);
        scheduler.advance(10.0);

        assert!(!*ran.borrow());
        assert_eq!(scheduler.pending(), 0);
    }

    #[test]
    fn test_task_may_schedule_follow_up() {
        let scheduler = ManualScheduler::new(ManualClock::new(0.0));
        let hits = Rc::new(RefCell::new(Vec::new()));

        let inner_scheduler = scheduler.clone();
        let inner_hits = hits.clone();
        scheduler.set_timeout(
            10.0,
            Box::new(move || {
                inner_hits.borrow_mut().push(inner_scheduler.clock().now_ms());
                let again = inner_hits.clone();
                let clock = inner_scheduler.clock().clone();
                inner_scheduler.set_timeout(
                    10.0,
                    Box::new(move || again.borrow_mut().push(clock.now_ms())),
                );
            }),
        );

        scheduler.advance(25.0);
        assert_eq!(*hits.borrow(), vec![10.0, 20.0]);
    }
}
