// Runtime capability probe and real-user-monitoring snapshot.
//
// Everything the engine learns about the device, the viewport and the network
// goes through `Environment`, so a missing browser capability just shows up as
// `None` rather than an error.

use serde::{Deserialize, Serialize};

use crate::clock::Clock;
use crate::error::{MonitorError, Result};

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

/// `navigator.connection` as far as the browser exposes it
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionInfo {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connection_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub effective_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub downlink: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rtt: Option<f64>,
}

pub trait Environment {
    /// Whether a page with a window and a navigator is available
    fn is_interactive(&self) -> bool;
    fn viewport(&self) -> Option<Viewport>;
    fn device_pixel_ratio(&self) -> Option<f64>;
    fn user_agent(&self) -> Option<String>;
    fn language(&self) -> Option<String>;
    fn page_url(&self) -> Option<String>;
    fn device_memory(&self) -> Option<f64>;
    fn hardware_concurrency(&self) -> Option<u32>;
    fn connection(&self) -> Option<ConnectionInfo>;
}

// ============================================================================
// Headless environment
// ============================================================================

/// Environment outside a browser: not interactive, only knows the CPU count.
#[derive(Debug, Default, Clone, Copy)]
pub struct HeadlessEnvironment;

impl Environment for HeadlessEnvironment {
    fn is_interactive(&self) -> bool {
        false
    }

    fn viewport(&self) -> Option<Viewport> {
        None
    }

    fn device_pixel_ratio(&self) -> Option<f64> {
        None
    }

    fn user_agent(&self) -> Option<String> {
        None
    }

    fn language(&self) -> Option<String> {
        None
    }

    fn page_url(&self) -> Option<String> {
        None
    }

    fn device_memory(&self) -> Option<f64> {
        None
    }

    fn hardware_concurrency(&self) -> Option<u32> {
        #[cfg(not(target_arch = "wasm32"))]
        {
            std::thread::available_parallelism()
                .ok()
                .map(|n| n.get() as u32)
        }
        #[cfg(target_arch = "wasm32")]
        {
            None
        }
    }

    fn connection(&self) -> Option<ConnectionInfo> {
        None
    }
}

// ============================================================================
// Browser environment
// ============================================================================

#[cfg(target_arch = "wasm32")]
pub use self::browser::BrowserEnvironment;

#[cfg(target_arch = "wasm32")]
mod browser {
    use super::{ConnectionInfo, Environment, Viewport};
    use crate::sources::js::{js_number, js_string};
    use wasm_bindgen::JsValue;

    /// Reads from `window` / `navigator` of the current page.
    #[derive(Debug, Default, Clone, Copy)]
    pub struct BrowserEnvironment;

    impl BrowserEnvironment {
        fn navigator(&self) -> Option<web_sys::Navigator> {
            web_sys::window().map(|w| w.navigator())
        }

        fn navigator_value(&self) -> Option<JsValue> {
            self.navigator().map(JsValue::from)
        }
    }

    impl Environment for BrowserEnvironment {
        fn is_interactive(&self) -> bool {
            web_sys::window().and_then(|w| w.document()).is_some()
        }

        fn viewport(&self) -> Option<Viewport> {
            let window = web_sys::window()?;
            let width = window.inner_width().ok()?.as_f64()?;
            let height = window.inner_height().ok()?.as_f64()?;
            Some(Viewport {
                width: width.max(0.0) as u32,
                height: height.max(0.0) as u32,
            })
        }

        fn device_pixel_ratio(&self) -> Option<f64> {
            web_sys::window().map(|w| w.device_pixel_ratio())
        }

        fn user_agent(&self) -> Option<String> {
            self.navigator()?.user_agent().ok()
        }

        fn language(&self) -> Option<String> {
            self.navigator()?.language()
        }

        fn page_url(&self) -> Option<String> {
            web_sys::window()?.location().href().ok()
        }

        fn device_memory(&self) -> Option<f64> {
            js_number(&self.navigator_value()?, "deviceMemory")
        }

        fn hardware_concurrency(&self) -> Option<u32> {
            let cores = self.navigator()?.hardware_concurrency();
            (cores > 0.0).then_some(cores as u32)
        }

        fn connection(&self) -> Option<ConnectionInfo> {
            let navigator = self.navigator_value()?;
            let connection = js_sys::Reflect::get(&navigator, &JsValue::from_str("connection")).ok()?;
            if connection.is_undefined() || connection.is_null() {
                return None;
            }
            Some(ConnectionInfo {
                connection_type: js_string(&connection, "type"),
                effective_type: js_string(&connection, "effectiveType"),
                downlink: js_number(&connection, "downlink"),
                rtt: js_number(&connection, "rtt"),
            })
        }
    }
}

/// The environment of the current runtime: the page in the browser,
/// headless elsewhere.
pub fn platform_environment() -> std::rc::Rc<dyn Environment> {
    #[cfg(target_arch = "wasm32")]
    {
        std::rc::Rc::new(BrowserEnvironment)
    }
    #[cfg(not(target_arch = "wasm32"))]
    {
        std::rc::Rc::new(HeadlessEnvironment)
    }
}

// ============================================================================
// RUM snapshot
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceType {
    Mobile,
    Tablet,
    Desktop,
}

impl DeviceType {
    pub fn from_viewport_width(width: u32) -> DeviceType {
        if width < 768 {
            DeviceType::Mobile
        } else if width < 1024 {
            DeviceType::Tablet
        } else {
            DeviceType::Desktop
        }
    }
}

/// Point-in-time description of the session's device and context
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RumData {
    pub device_type: DeviceType,
    pub viewport: Viewport,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_pixel_ratio: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connection: Option<ConnectionInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_memory: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hardware_concurrency: Option<u32>,
    pub timestamp: f64,
}

/// Take a RUM snapshot. Fails outside an interactive page.
pub fn collect_rum_data(environment: &dyn Environment, clock: &dyn Clock) -> Result<RumData> {
    if !environment.is_interactive() {
        return Err(MonitorError::environment_unavailable("window"));
    }
    let viewport = environment
        .viewport()
        .ok_or_else(|| MonitorError::environment_unavailable("viewport"))?;

    Ok(RumData {
        device_type: DeviceType::from_viewport_width(viewport.width),
        viewport,
        device_pixel_ratio: environment.device_pixel_ratio(),
        user_agent: environment.user_agent(),
        language: environment.language(),
        page_url: environment.page_url(),
        connection: environment.connection(),
        device_memory: environment.device_memory(),
        hardware_concurrency: environment.hardware_concurrency(),
        timestamp: clock.now_ms(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_type_breakpoints() {
        assert_eq!(DeviceType::from_viewport_width(375), DeviceType::Mobile);
        assert_eq!(DeviceType::from_viewport_width(767), DeviceType::Mobile);
        assert_eq!(DeviceType::from_viewport_width(768), DeviceType::Tablet);
        assert_eq!(DeviceType::from_viewport_width(1023), DeviceType::Tablet);
        assert_eq!(DeviceType::from_viewport_width(1440), DeviceType::Desktop);
    }

    #[test]
    fn test_headless_environment_is_not_interactive() {
        let clock = crate::clock::ManualClock::new(0.0);
        let err = collect_rum_data(&HeadlessEnvironment, &clock).unwrap_err();
        assert!(matches!(err, MonitorError::EnvironmentUnavailable { .. }));
    }
}
