//! Chrome DevTools Protocol engine backed by the `headless_chrome` crate.
//! Gated behind the "cdp" feature flag.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use headless_chrome::browser::tab::Tab;
use headless_chrome::protocol::cdp::types::Method;
use headless_chrome::protocol::cdp::{Page, DOM};
use headless_chrome::{Browser, LaunchOptions};
use serde::Serialize;
use tracing::{debug, info};

use super::{ElementHandle, EngineError, Rect, RenderEngine, Viewport};

/// Launch settings for [`CdpEngine`].
#[derive(Debug, Clone)]
pub struct CdpConfig {
    /// Initial window size; the device metrics override takes over per capture.
    pub viewport: Viewport,
    /// Browser binary. Auto-detected when `None`.
    pub chrome_path: Option<PathBuf>,
    /// Run Chrome with its sandbox (disable inside containers running as root).
    pub sandbox: bool,
    /// Upper bound for every DevTools call, navigation included.
    pub timeout: Duration,
}

impl Default for CdpConfig {
    fn default() -> Self {
        Self {
            viewport: Viewport::default(),
            chrome_path: None,
            sandbox: true,
            timeout: Duration::from_secs(30),
        }
    }
}

/// `Emulation.setDeviceMetricsOverride` with only the fields we set.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SetDeviceMetrics {
    width: u32,
    height: u32,
    device_scale_factor: f64,
    mobile: bool,
}

impl Method for SetDeviceMetrics {
    const NAME: &'static str = "Emulation.setDeviceMetricsOverride";
    type ReturnObject = serde_json::Value;
}

/// A headless Chrome instance with a single tab.
pub struct CdpEngine {
    browser: Option<Browser>,
    tab: Arc<Tab>,
}

impl CdpEngine {
    pub fn launch(config: &CdpConfig) -> Result<Self, EngineError> {
        let options = LaunchOptions::default_builder()
            .headless(true)
            .sandbox(config.sandbox)
            .path(config.chrome_path.clone())
            .window_size(Some((config.viewport.width, config.viewport.height)))
            .build()
            .map_err(|e| EngineError::Launch(format!("invalid launch options: {}", e)))?;

        let browser = Browser::new(options).map_err(|e| EngineError::Launch(e.to_string()))?;
        let tab = browser
            .new_tab()
            .map_err(|e| EngineError::Launch(format!("failed to open tab: {}", e)))?;
        tab.set_default_timeout(config.timeout);

        info!(
            width = config.viewport.width,
            height = config.viewport.height,
            "headless browser started"
        );
        Ok(Self {
            browser: Some(browser),
            tab,
        })
    }
}

impl RenderEngine for CdpEngine {
    fn set_viewport(&mut self, viewport: &Viewport) -> Result<(), EngineError> {
        self.tab
            .call_method(SetDeviceMetrics {
                width: viewport.width,
                height: viewport.height,
                device_scale_factor: viewport.device_scale_factor,
                mobile: viewport.mobile,
            })
            .map_err(|e| EngineError::Protocol(format!("set device metrics: {}", e)))?;
        Ok(())
    }

    fn navigate(&mut self, url: &str) -> Result<(), EngineError> {
        self.tab
            .navigate_to(url)
            .map_err(|e| EngineError::Navigation(e.to_string()))?
            .wait_until_navigated()
            .map_err(|e| EngineError::Navigation(e.to_string()))?;
        Ok(())
    }

    fn screenshot(&mut self) -> Result<Vec<u8>, EngineError> {
        self.tab
            .capture_screenshot(Page::CaptureScreenshotFormatOption::Png, None, None, true)
            .map_err(|e| EngineError::Protocol(format!("screenshot: {}", e)))
    }

    fn current_url(&mut self) -> Result<String, EngineError> {
        Ok(self.tab.get_url())
    }

    fn query_elements(&mut self, selector: &str) -> Result<Vec<ElementHandle>, EngineError> {
        // headless_chrome reports an empty match set as an error.
        let elements = match self.tab.find_elements(selector) {
            Ok(elements) => elements,
            Err(e) => {
                debug!(selector, error = %e, "no elements matched");
                return Ok(Vec::new());
            }
        };

        let handles = elements
            .iter()
            .map(|el| {
                let attrs = el.get_attributes().ok().flatten().unwrap_or_default();
                ElementHandle::from_flat_attributes(el.node_id, &attrs)
            })
            .collect();
        Ok(handles)
    }

    fn box_model(&mut self, element: &ElementHandle) -> Result<Rect, EngineError> {
        let reply = self
            .tab
            .call_method(DOM::GetBoxModel {
                node_id: Some(element.id),
                backend_node_id: None,
                object_id: None,
            })
            .map_err(|e| EngineError::NoBoxModel(e.to_string()))?;
        Rect::from_quad(&reply.model.content)
    }

    fn close(&mut self) -> Result<(), EngineError> {
        let closed = self.tab.close(true);
        // Dropping the browser kills the Chrome process.
        self.browser.take();
        closed
            .map(|_| ())
            .map_err(|e| EngineError::Protocol(format!("close tab: {}", e)))
    }
}
