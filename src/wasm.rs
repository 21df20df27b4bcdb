// JavaScript bindings for the performance engine.
//
// Every export is safe to call from best-effort instrumentation: tracking
// calls never throw, and only construction, `startMonitoring` and explicit
// conversions report errors back to JS.

use std::cell::RefCell;
use std::rc::Rc;

use js_sys::{Array, Function, Promise};
use serde::Serialize;
use wasm_bindgen::prelude::*;

use crate::alerts::{BudgetExceededEvent, PerformanceAlert};
use crate::config::MonitorConfig;
use crate::engine::{EngineContext, PerformanceEngine, RefreshHandle, Subscription};
use crate::error::MonitorError;
use crate::error_traits::{JsResult, ToJsResult};
use crate::metrics::{MetricKey, PerformanceMetrics};
use crate::performance_monitor::{HookResult, MonitorListener};
use crate::trackers::ObservedError;

#[wasm_bindgen(start)]
pub fn init() {
    wasm_logger::init(wasm_logger::Config::default());
    log::info!("vitals-wasm {} loaded", crate::report::ENGINE_VERSION);
}

fn to_js<T: Serialize>(value: &T) -> JsResult<JsValue> {
    let json = serde_json::to_string(value)
        .map_err(MonitorError::from)
        .to_js_result()?;
    js_sys::JSON::parse(&json)
}

/// Subscriber backed by up to three JS callbacks
struct JsListener {
    on_metrics: Option<Function>,
    on_alert: Option<Function>,
    on_budget: Option<Function>,
}

impl JsListener {
    fn call<T: Serialize>(callback: &Option<Function>, value: &T) -> HookResult {
        let Some(callback) = callback else {
            return Ok(());
        };
        let value = to_js(value).map_err(|e| format!("{:?}", e))?;
        callback
            .call1(&JsValue::NULL, &value)
            .map(|_| ())
            .map_err(|e| format!("{:?}", e).into())
    }
}

impl MonitorListener for JsListener {
    fn on_metrics_update(&self, metrics: &PerformanceMetrics) -> HookResult {
        JsListener::call(&self.on_metrics, metrics)
    }

    fn on_budget_exceeded(&self, event: &BudgetExceededEvent) -> HookResult {
        JsListener::call(&self.on_budget, event)
    }

    fn on_performance_alert(&self, alert: &PerformanceAlert) -> HookResult {
        JsListener::call(&self.on_alert, alert)
    }
}

#[wasm_bindgen]
pub struct WasmPerformanceEngine {
    engine: PerformanceEngine,
    subscription: RefCell<Option<Subscription>>,
    refresh: RefCell<Option<RefreshHandle>>,
}

#[wasm_bindgen]
impl WasmPerformanceEngine {
    /// `config` is an optional plain object with the camelCase keys of
    /// `MonitorConfig`.
    #[wasm_bindgen(constructor)]
    pub fn new(config: JsValue) -> JsResult<WasmPerformanceEngine> {
        let config = if config.is_undefined() || config.is_null() {
            MonitorConfig::default()
        } else {
            let json: String = js_sys::JSON::stringify(&config)?.into();
            MonitorConfig::from_json(&json).map_err(|e| crate::js_error!(e))?
        };

        let engine = PerformanceEngine::new(config, EngineContext::browser())
            .map_err(|e| crate::js_error!(e))?;
        Ok(WasmPerformanceEngine {
            engine,
            subscription: RefCell::new(None),
            refresh: RefCell::new(None),
        })
    }

    /// Resolves once sources are attached; rejects only when a required
    /// source cannot attach.
    #[wasm_bindgen(js_name = startMonitoring)]
    pub fn start_monitoring(
        &self,
        on_metrics: Option<Function>,
        on_alert: Option<Function>,
        on_budget: Option<Function>,
    ) -> Promise {
        let subscription = self.engine.subscribe(Rc::new(JsListener {
            on_metrics,
            on_alert,
            on_budget,
        }));
        let started = match self.engine.start_monitoring(&subscription) {
            Ok(()) => {
                // The previous subscription releases its hold once replaced.
                *self.subscription.borrow_mut() = Some(subscription);
                Ok(JsValue::UNDEFINED)
            }
            Err(e) => Err(crate::js_error!(e)),
        };
        wasm_bindgen_futures::future_to_promise(async move { started })
    }

    #[wasm_bindgen(js_name = stopMonitoring)]
    pub fn stop_monitoring(&self) {
        self.subscription.borrow_mut().take();
    }

    #[wasm_bindgen(js_name = isMonitoring)]
    pub fn is_monitoring(&self) -> bool {
        self.engine.is_monitoring()
    }

    #[wasm_bindgen(js_name = getPerformanceScore)]
    pub fn get_performance_score(&self) -> u8 {
        self.engine.performance_score()
    }

    #[wasm_bindgen(js_name = getAdvancedReport)]
    pub fn get_advanced_report(&self) -> JsResult<JsValue> {
        to_js(&self.engine.advanced_report())
    }

    #[wasm_bindgen(js_name = collectRUMData)]
    pub fn collect_rum_data(&self) -> JsResult<JsValue> {
        let rum = self.engine.collect_rum_data().to_js_result()?;
        to_js(&rum)
    }

    #[wasm_bindgen(js_name = setBudget)]
    pub fn set_budget(&self, metric: &str, allocated: f64) -> JsResult<()> {
        let metric = metric.parse::<MetricKey>().to_js_result()?;
        self.engine.set_budget(metric, allocated).to_js_result()
    }

    #[wasm_bindgen(js_name = recordRenderTime)]
    pub fn record_render_time(&self, component: &str, render_ms: f64) {
        self.engine.record_render_time(component, render_ms);
    }

    // ------------------------------------------------------------------
    // Gallery tracking
    // ------------------------------------------------------------------

    #[wasm_bindgen(js_name = trackGalleryLoad)]
    pub fn track_gallery_load(&self, start: f64, end: f64, item_count: u32) {
        if let Some(gallery) = self.engine.gallery() {
            gallery.track_gallery_load(start, end, item_count as usize);
        }
    }

    #[wasm_bindgen(js_name = trackArtworkDetail)]
    pub fn track_artwork_detail(&self, artwork_id: &str, load_time: f64) {
        if let Some(gallery) = self.engine.gallery() {
            gallery.track_artwork_detail(artwork_id, load_time);
        }
    }

    #[wasm_bindgen(js_name = trackSearchPerformance)]
    pub fn track_search_performance(&self, query: &str, response_time: f64, result_count: u32) {
        if let Some(gallery) = self.engine.gallery() {
            gallery.track_search_performance(query, response_time, result_count as usize);
        }
    }

    #[wasm_bindgen(js_name = trackFilterPerformance)]
    pub fn track_filter_performance(&self, filters: Array, response_time: f64) {
        if let Some(gallery) = self.engine.gallery() {
            let filters: Vec<String> = filters.iter().filter_map(|f| f.as_string()).collect();
            gallery.track_filter_performance(&filters, response_time);
        }
    }

    #[wasm_bindgen(js_name = trackImageLoading)]
    pub fn track_image_loading(&self, url: &str, load_time: f64, size_bytes: f64) {
        if let Some(gallery) = self.engine.gallery() {
            gallery.track_image_loading(url, load_time, size_bytes.max(0.0) as u64);
        }
    }

    #[wasm_bindgen(js_name = trackScrollPerformance)]
    pub fn track_scroll_performance(&self, frame_duration: f64) {
        if let Some(gallery) = self.engine.gallery() {
            gallery.track_scroll_performance(frame_duration);
        }
    }

    #[wasm_bindgen(js_name = getUserJourney)]
    pub fn get_user_journey(&self) -> JsResult<JsValue> {
        let journey = self
            .engine
            .gallery()
            .map(|gallery| gallery.user_journey())
            .unwrap_or_default();
        to_js(&journey)
    }

    // ------------------------------------------------------------------
    // Analysis
    // ------------------------------------------------------------------

    /// Resolves to `null` when error correlation is disabled.
    #[wasm_bindgen(js_name = analyzeErrorCorrelation)]
    pub fn analyze_error_correlation(&self, kind: &str, message: &str) -> JsResult<JsValue> {
        match self.engine.analyze_error(&ObservedError::new(kind, message)) {
            Some(correlation) => to_js(&correlation),
            None => Ok(JsValue::NULL),
        }
    }

    /// Promise of the bundle analytics, `null` when bundle analysis is disabled.
    #[wasm_bindgen(js_name = analyzeBundles)]
    pub fn analyze_bundles(&self) -> Promise {
        let analysis = self.engine.analyze_bundles();
        wasm_bindgen_futures::future_to_promise(async move {
            match analysis {
                Some(analysis) => to_js(&analysis.await),
                None => Ok(JsValue::NULL),
            }
        })
    }

    // ------------------------------------------------------------------
    // Reporting
    // ------------------------------------------------------------------

    /// Call `callback` with the advanced report every `updateInterval` ms.
    #[wasm_bindgen(js_name = startReportRefresh)]
    pub fn start_report_refresh(&self, callback: Function) {
        let handle = self.engine.start_report_refresh(move |report| {
            match to_js(report) {
                Ok(value) => {
                    if let Err(e) = callback.call1(&JsValue::NULL, &value) {
                        log::warn!("Report refresh callback failed: {:?}", e);
                    }
                }
                Err(e) => log::warn!("Could not convert report: {:?}", e),
            }
        });
        *self.refresh.borrow_mut() = Some(handle);
    }

    #[wasm_bindgen(js_name = stopReportRefresh)]
    pub fn stop_report_refresh(&self) {
        self.refresh.borrow_mut().take();
    }

    /// Full report as a JSON string
    #[wasm_bindgen(js_name = exportReport)]
    pub fn export_report(&self) -> JsResult<String> {
        self.engine.export_report().to_json().to_js_result()
    }

    pub fn reset(&self) {
        self.engine.monitor().reset();
    }

    pub fn dispose(&self) {
        self.refresh.borrow_mut().take();
        self.subscription.borrow_mut().take();
        self.engine.dispose();
    }
}
