// Small helpers over `PerformanceObserver` and untyped JS objects.
//
// Entry types such as `layout-shift` or `largest-contentful-paint` have no
// web-sys bindings, so entries are read field by field through `Reflect`.

use wasm_bindgen::closure::Closure;
use wasm_bindgen::{JsCast, JsValue};
use web_sys::{PerformanceObserver, PerformanceObserverEntryList, PerformanceObserverInit};

use crate::error::{MonitorError, Result};

pub(crate) fn js_get(target: &JsValue, key: &str) -> Option<JsValue> {
    let value = js_sys::Reflect::get(target, &JsValue::from_str(key)).ok()?;
    if value.is_undefined() || value.is_null() {
        None
    } else {
        Some(value)
    }
}

pub(crate) fn js_number(target: &JsValue, key: &str) -> Option<f64> {
    js_get(target, key)?.as_f64().filter(|v| v.is_finite())
}

pub(crate) fn js_string(target: &JsValue, key: &str) -> Option<String> {
    js_get(target, key)?.as_string().filter(|s| !s.is_empty())
}

pub(crate) fn js_bool(target: &JsValue, key: &str) -> Option<bool> {
    js_get(target, key)?.as_bool()
}

/// Whether the browser can observe `entry_type` at all
pub(crate) fn supports_entry_type(entry_type: &str) -> bool {
    let Some(constructor) = js_get(&js_sys::global().into(), "PerformanceObserver") else {
        return false;
    };
    match js_get(&constructor, "supportedEntryTypes") {
        Some(types) => js_sys::Array::from(&types).includes(&JsValue::from_str(entry_type), 0),
        None => false,
    }
}

/// Live `PerformanceObserver` registration; disconnects on drop.
pub(crate) struct ObserverHandle {
    observer: PerformanceObserver,
    _callback: Closure<dyn FnMut(PerformanceObserverEntryList, PerformanceObserver)>,
}

impl ObserverHandle {
    pub(crate) fn observe(
        source: &'static str,
        entry_type: &str,
        duration_threshold: Option<f64>,
        mut on_entry: impl FnMut(&JsValue) + 'static,
    ) -> Result<ObserverHandle> {
        if !supports_entry_type(entry_type) {
            return Err(MonitorError::source_unavailable(source));
        }

        let callback = Closure::wrap(Box::new(
            move |list: PerformanceObserverEntryList, _observer: PerformanceObserver| {
                for entry in list.get_entries().iter() {
                    on_entry(&entry);
                }
            },
        )
            as Box<dyn FnMut(PerformanceObserverEntryList, PerformanceObserver)>);

        let observer = PerformanceObserver::new(callback.as_ref().unchecked_ref())
            .map_err(|e| MonitorError::source_attach(source, format!("{:?}", e)))?;

        let options = js_sys::Object::new();
        let set = |key: &str, value: JsValue| {
            js_sys::Reflect::set(&options, &JsValue::from_str(key), &value)
                .map(|_| ())
                .map_err(|e| MonitorError::source_attach(source, format!("{:?}", e)))
        };
        set("type", JsValue::from_str(entry_type))?;
        set("buffered", JsValue::TRUE)?;
        if let Some(threshold) = duration_threshold {
            set("durationThreshold", JsValue::from_f64(threshold))?;
        }

        let options: &PerformanceObserverInit = options.unchecked_ref();
        observer.observe_with_options(options);

        log::debug!("Observing `{}` entries for {}", entry_type, source);
        Ok(ObserverHandle {
            observer,
            _callback: callback,
        })
    }
}

impl Drop for ObserverHandle {
    fn drop(&mut self) {
        self.observer.disconnect();
    }
}
