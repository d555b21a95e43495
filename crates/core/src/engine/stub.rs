//! In-memory engine serving a single scripted page.
//!
//! Every navigation lands on the same [`StubPage`]. Useful for exercising the
//! pipeline and the HTTP layer without a browser.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use image::{ImageEncoder, Rgba, RgbaImage};

use super::{ElementHandle, EngineError, Rect, RenderEngine, Viewport};

/// An anchor on a stub page. `rect: None` makes `box_model` fail for it.
#[derive(Debug, Clone)]
pub struct StubAnchor {
    pub href: Option<String>,
    pub rect: Option<Rect>,
}

impl StubAnchor {
    pub fn new(href: &str, rect: Rect) -> Self {
        Self {
            href: Some(href.to_string()),
            rect: Some(rect),
        }
    }

    pub fn without_box(href: &str) -> Self {
        Self {
            href: Some(href.to_string()),
            rect: None,
        }
    }

    pub fn without_href(rect: Rect) -> Self {
        Self {
            href: None,
            rect: Some(rect),
        }
    }
}

/// What the stub shows after any navigation.
#[derive(Debug, Clone, Default)]
pub struct StubPage {
    /// Landing URL to report; the navigated URL when `None`.
    pub final_url: Option<String>,
    pub screenshot: Vec<u8>,
    pub anchors: Vec<StubAnchor>,
    /// When set, every navigation fails with this message.
    pub navigate_error: Option<String>,
}

#[derive(Debug, Clone)]
pub struct StubEngine {
    page: StubPage,
    location: Option<String>,
    viewport: Option<Viewport>,
    visits: Arc<AtomicUsize>,
}

impl StubEngine {
    pub fn new(page: StubPage) -> Self {
        Self {
            page,
            location: None,
            viewport: None,
            visits: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Share a visit counter, e.g. across all engines of a pool.
    pub fn with_visits(mut self, visits: Arc<AtomicUsize>) -> Self {
        self.visits = visits;
        self
    }

    pub fn visits(&self) -> usize {
        self.visits.load(Ordering::SeqCst)
    }

    pub fn viewport(&self) -> Option<Viewport> {
        self.viewport
    }
}

impl RenderEngine for StubEngine {
    fn set_viewport(&mut self, viewport: &Viewport) -> Result<(), EngineError> {
        self.viewport = Some(*viewport);
        Ok(())
    }

    fn navigate(&mut self, url: &str) -> Result<(), EngineError> {
        self.visits.fetch_add(1, Ordering::SeqCst);
        if let Some(ref msg) = self.page.navigate_error {
            return Err(EngineError::Navigation(msg.clone()));
        }
        self.location = Some(url.to_string());
        Ok(())
    }

    fn screenshot(&mut self) -> Result<Vec<u8>, EngineError> {
        Ok(self.page.screenshot.clone())
    }

    fn current_url(&mut self) -> Result<String, EngineError> {
        self.page
            .final_url
            .clone()
            .or_else(|| self.location.clone())
            .ok_or_else(|| EngineError::Protocol("no page loaded".into()))
    }

    fn query_elements(&mut self, selector: &str) -> Result<Vec<ElementHandle>, EngineError> {
        if !selector.eq_ignore_ascii_case("a") {
            return Ok(Vec::new());
        }
        let handles = self
            .page
            .anchors
            .iter()
            .enumerate()
            .map(|(i, anchor)| {
                let handle = ElementHandle::new(i as u32);
                match anchor.href {
                    Some(ref href) => handle.with_attr("href", href),
                    None => handle,
                }
            })
            .collect();
        Ok(handles)
    }

    fn box_model(&mut self, element: &ElementHandle) -> Result<Rect, EngineError> {
        self.page
            .anchors
            .get(element.id as usize)
            .and_then(|a| a.rect)
            .ok_or_else(|| EngineError::NoBoxModel(format!("node {}", element.id)))
    }
}

/// Encode a solid-colour PNG of the given size.
pub fn png(width: u32, height: u32) -> Vec<u8> {
    let img = RgbaImage::from_pixel(width, height, Rgba([32, 96, 160, 255]));
    let mut buf = Vec::new();
    let encoder = image::codecs::png::PngEncoder::new(&mut buf);
    encoder
        .write_image(img.as_raw(), width, height, image::ExtendedColorType::Rgba8)
        .expect("an RGBA buffer of the stated size encodes into memory");
    buf
}
