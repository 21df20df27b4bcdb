//! Error classification shared by the engine and its JS boundary.
//!
//! Every public entry point of the engine is meant to be callable from a
//! best-effort instrumentation site, so callers mostly need to know *what kind*
//! of failure happened and whether monitoring can carry on. This module gives
//! `MonitorError` that vocabulary and converts results into `JsValue`s for
//! the wasm exports.

use std::fmt;
use wasm_bindgen::JsValue;

use crate::error::MonitorError;

// ============================================================================
// Core Error Trait
// ============================================================================

/// Common trait for errors raised anywhere in the telemetry pipeline
pub trait TelemetryError: fmt::Debug + fmt::Display {
    /// Convert to JavaScript error value for WASM
    fn to_js_error(&self) -> JsValue {
        JsValue::from_str(&self.to_string())
    }

    /// Get error category for logging
    fn category(&self) -> ErrorCategory {
        ErrorCategory::General
    }

    /// Check if monitoring can continue after this error
    fn is_recoverable(&self) -> bool {
        true
    }

    /// Get suggested remediation if any
    fn user_action(&self) -> Option<&str> {
        None
    }
}

/// Error categories, one per failure family of the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    General,
    SourceUnavailable,
    Setup,
    Subscriber,
    Analysis,
    Configuration,
    Export,
}

// ============================================================================
// Result Type Aliases
// ============================================================================

/// JavaScript-compatible result type
pub type JsResult<T> = Result<T, JsValue>;

/// Trait for converting results to JavaScript results
pub trait ToJsResult<T> {
    fn to_js_result(self) -> JsResult<T>;
}

impl<T, E: TelemetryError> ToJsResult<T> for Result<T, E> {
    fn to_js_result(self) -> JsResult<T> {
        self.map_err(|e| e.to_js_error())
    }
}

// ============================================================================
// Engine error classification
// ============================================================================

impl TelemetryError for MonitorError {
    fn category(&self) -> ErrorCategory {
        match self {
            MonitorError::SourceUnavailable { .. } | MonitorError::EnvironmentUnavailable { .. } => {
                ErrorCategory::SourceUnavailable
            }
            MonitorError::SourceAttach { .. } => ErrorCategory::Setup,
            MonitorError::Subscriber { .. } => ErrorCategory::Subscriber,
            MonitorError::Analysis { .. } => ErrorCategory::Analysis,
            MonitorError::InvalidConfig(_) | MonitorError::ConfigParse(_) => {
                ErrorCategory::Configuration
            }
            MonitorError::Serialization(_) | MonitorError::Io(_) => ErrorCategory::Export,
        }
    }

    fn is_recoverable(&self) -> bool {
        MonitorError::is_recoverable(self)
    }

    fn user_action(&self) -> Option<&str> {
        match self {
            MonitorError::EnvironmentUnavailable { .. } => {
                Some("Call this from an interactive browser context")
            }
            MonitorError::InvalidConfig(_) | MonitorError::ConfigParse(_) => {
                Some("Check the monitor configuration (budgets must be positive)")
            }
            MonitorError::SourceAttach { .. } => {
                Some("Mark the sample source optional or run in a browser that supports it")
            }
            _ => None,
        }
    }
}

/// Log an error, then hand it to JS.
#[macro_export]
macro_rules! js_error {
    ($error:expr) => {{
        let err = &$error;
        log::error!("{:?}", err);
        #[cfg(all(feature = "console_error", target_arch = "wasm32"))]
        web_sys::console::error_1(&wasm_bindgen::JsValue::from_str(&format!("{:?}", err)));
        $crate::error_traits::TelemetryError::to_js_error(err)
    }};
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_unavailable_category() {
        let error = MonitorError::source_unavailable("layout-shift");

        assert_eq!(error.category(), ErrorCategory::SourceUnavailable);
        assert!(TelemetryError::is_recoverable(&error));

        let display = format!("{}", error);
        assert!(display.contains("layout-shift"));
    }

    #[test]
    fn test_setup_errors_are_not_recoverable() {
        let error = MonitorError::source_attach("paint", "observer rejected entry type");

        assert_eq!(error.category(), ErrorCategory::Setup);
        assert!(!TelemetryError::is_recoverable(&error));
        assert!(error.user_action().is_some());
    }

    #[test]
    fn test_config_error_action() {
        let error = MonitorError::InvalidConfig("budget for lcp must be positive".into());

        assert_eq!(error.category(), ErrorCategory::Configuration);
        assert!(error.user_action().unwrap().contains("configuration"));
    }
}
