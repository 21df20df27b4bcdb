// Subscriber registry and fan-out.
//
// The hub is the aggregator's single listener. It forwards every metrics
// update and budget event to each subscriber, and every alert at or above the
// notification threshold, in registration order. A subscriber that fails is
// logged and skipped; the others still get the notification.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use crate::alerts::{BudgetExceededEvent, PerformanceAlert, Severity};
use crate::error::MonitorError;
use crate::metrics::PerformanceMetrics;
use crate::performance_monitor::{HookResult, MonitorListener};

pub type SubscriberId = u64;

pub struct SubscriberHub {
    subscribers: RefCell<Vec<(SubscriberId, Rc<dyn MonitorListener>)>>,
    next_id: Cell<SubscriberId>,
    alert_threshold: Cell<Severity>,
}

impl SubscriberHub {
    pub fn new(alert_threshold: Severity) -> Self {
        SubscriberHub {
            subscribers: RefCell::new(Vec::new()),
            next_id: Cell::new(1),
            alert_threshold: Cell::new(alert_threshold),
        }
    }

    pub fn register(&self, listener: Rc<dyn MonitorListener>) -> SubscriberId {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        self.subscribers.borrow_mut().push((id, listener));
        log::debug!("Subscriber {} registered", id);
        id
    }

    /// Returns `false` when `id` was not registered.
    pub fn unregister(&self, id: SubscriberId) -> bool {
        let mut subscribers = self.subscribers.borrow_mut();
        let before = subscribers.len();
        subscribers.retain(|(existing, _)| *existing != id);
        before != subscribers.len()
    }

    pub fn contains(&self, id: SubscriberId) -> bool {
        self.subscribers.borrow().iter().any(|(existing, _)| *existing == id)
    }

    pub fn len(&self) -> usize {
        self.subscribers.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscribers.borrow().is_empty()
    }

    pub fn clear(&self) {
        self.subscribers.borrow_mut().clear();
    }

    pub fn alert_threshold(&self) -> Severity {
        self.alert_threshold.get()
    }

    pub fn set_alert_threshold(&self, threshold: Severity) {
        self.alert_threshold.set(threshold);
    }

    fn deliver(&self, what: &str, call: impl Fn(&dyn MonitorListener) -> HookResult) {
        // Snapshot so a subscriber may (un)subscribe from inside its callback.
        let subscribers = self.subscribers.borrow().clone();
        for (id, listener) in subscribers {
            if let Err(reason) = contain(|| call(listener.as_ref())) {
                log::warn!("{} ({})", MonitorError::subscriber(id, reason), what);
            }
        }
    }
}

#[cfg(not(target_arch = "wasm32"))]
fn contain(call: impl FnOnce() -> HookResult) -> Result<(), String> {
    use std::panic::{catch_unwind, AssertUnwindSafe};

    match catch_unwind(AssertUnwindSafe(call)) {
        Ok(result) => result.map_err(|e| e.to_string()),
        Err(payload) => {
            let reason = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown payload".to_string());
            Err(format!("panicked: {}", reason))
        }
    }
}

// wasm32 aborts on panic, so only returned errors can be contained there.
#[cfg(target_arch = "wasm32")]
fn contain(call: impl FnOnce() -> HookResult) -> Result<(), String> {
    call().map_err(|e| e.to_string())
}

impl MonitorListener for SubscriberHub {
    fn on_metrics_update(&self, metrics: &PerformanceMetrics) -> HookResult {
        self.deliver("metrics update", |l| l.on_metrics_update(metrics));
        Ok(())
    }

    fn on_budget_exceeded(&self, event: &BudgetExceededEvent) -> HookResult {
        self.deliver("budget event", |l| l.on_budget_exceeded(event));
        Ok(())
    }

    fn on_performance_alert(&self, alert: &PerformanceAlert) -> HookResult {
        if !alert.severity.meets(self.alert_threshold()) {
            log::debug!("Alert {} below notification threshold", alert.id);
            return Ok(());
        }
        self.deliver("alert", |l| l.on_performance_alert(alert));
        Ok(())
    }
}
