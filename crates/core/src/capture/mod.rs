//! The capture pipeline: navigate, screenshot, collect link geometry,
//! transcode the screenshot into a GIF.

use std::time::Duration;

use serde::Serialize;
use tracing::{debug, info};
use url::Url;

use crate::engine::{EngineError, Rect, RenderEngine, Viewport};

pub mod links;
pub mod raster;

/// Configuration for a capture.
#[derive(Debug, Clone)]
pub struct CaptureConfig {
    /// Viewport the page is rendered and captured at.
    pub viewport: Viewport,
    /// Fixed wait between navigation and screenshot for late layout changes.
    pub settle: Duration,
    /// Selector for link elements.
    pub selector: String,
    /// GIF quantizer speed, 1 (best) to 30 (fastest).
    pub gif_speed: i32,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            viewport: Viewport::default(),
            settle: Duration::from_secs(2),
            selector: "a".to_string(),
            gif_speed: 10,
        }
    }
}

/// One clickable region of the image map.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LinkRegion {
    pub rect: Rect,
    /// The anchor's `href` as written in the page.
    pub href: String,
    /// `href` resolved against the landing URL.
    pub target: String,
}

impl LinkRegion {
    /// `left,top,right,bottom`, rounded to whole pixels. Halves round to
    /// even, so `0.5` becomes `0` and `2.5` becomes `2`.
    pub fn coords(&self) -> String {
        format!(
            "{:.0},{:.0},{:.0},{:.0}",
            self.rect.left, self.rect.top, self.rect.right, self.rect.bottom
        )
    }
}

/// Output of one capture.
#[derive(Debug, Clone, Serialize)]
pub struct CaptureResult {
    /// URL the browser landed on after redirects.
    pub final_url: String,
    /// Encoded GIF bytes.
    #[serde(skip)]
    pub image: Vec<u8>,
    pub width: u32,
    pub height: u32,
    /// Link regions in page enumeration order.
    pub regions: Vec<LinkRegion>,
}

#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    #[error("Unable to render page: {0}")]
    Render(#[from] EngineError),
    #[error("Unable to decode page screenshot: {0}")]
    Decode(String),
    #[error("Unable to encode GIF: {0}")]
    Encode(String),
}

/// Drives a [`RenderEngine`] through one navigation.
#[derive(Debug, Clone, Default)]
pub struct CapturePipeline {
    config: CaptureConfig,
}

impl CapturePipeline {
    pub fn new(config: CaptureConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &CaptureConfig {
        &self.config
    }

    /// Capture `target` with `engine`.
    ///
    /// Engine failures up to and including element enumeration abort the
    /// capture. A missing box model or an unresolvable `href` only drops that
    /// one link.
    pub fn capture(
        &self,
        engine: &mut dyn RenderEngine,
        target: &str,
    ) -> Result<CaptureResult, CaptureError> {
        info!(url = target, "processing capture request");

        engine.set_viewport(&self.config.viewport)?;
        engine.navigate(target)?;
        if !self.config.settle.is_zero() {
            std::thread::sleep(self.config.settle);
        }
        let png = engine.screenshot()?;
        let final_url = engine.current_url()?;
        let anchors = engine.query_elements(&self.config.selector)?;
        info!(landed = %final_url, nodes = anchors.len(), "page rendered");

        let mut boxed = Vec::with_capacity(anchors.len());
        for anchor in anchors {
            match engine.box_model(&anchor) {
                Ok(rect) => boxed.push((anchor, rect)),
                Err(e) => debug!(node = anchor.id, error = %e, "skipping link without box model"),
            }
        }

        let frame = raster::decode_png(&png)?;
        let (width, height) = frame.dimensions();
        let image = raster::encode_gif(frame, self.config.gif_speed)?;

        let base = Url::parse(&final_url).or_else(|_| Url::parse(target)).ok();
        let regions = match base {
            Some(ref base) => boxed
                .iter()
                .filter_map(|(anchor, rect)| links::region(base, anchor, *rect))
                .collect(),
            None => {
                debug!(landed = %final_url, "landing URL is not absolute, dropping all links");
                Vec::new()
            }
        };

        info!(url = target, regions = regions.len(), bytes = image.len(), "capture done");
        Ok(CaptureResult {
            final_url,
            image,
            width,
            height,
            regions,
        })
    }
}
