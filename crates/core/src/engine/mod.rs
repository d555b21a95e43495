//! The rendering-engine seam.
//!
//! A [`RenderEngine`] is one logical browser session: it can load a URL,
//! report a screenshot of the viewport, and answer element and geometry
//! queries about the page it is showing. The capture pipeline only ever
//! talks to this trait, so the real Chrome adapter and the in-memory stub
//! are interchangeable.

use serde::Serialize;

#[cfg(feature = "cdp")]
pub mod cdp;
pub mod stub;

/// Output viewport the page is laid out and captured at.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
    pub device_scale_factor: f64,
    pub mobile: bool,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: 1024,
            height: 768,
            device_scale_factor: 1.0,
            mobile: false,
        }
    }
}

/// Axis-aligned rectangle in image pixel space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Rect {
    pub left: f64,
    pub top: f64,
    pub right: f64,
    pub bottom: f64,
}

impl Rect {
    pub fn new(left: f64, top: f64, right: f64, bottom: f64) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    /// Build a rect from a DevTools content quad.
    ///
    /// A quad is four clockwise points starting at the top-left corner,
    /// flattened to `[x1, y1, x2, y2, x3, y3, x4, y4]`. The first and third
    /// points are the top-left and bottom-right corners.
    pub fn from_quad(quad: &[f64]) -> Result<Self, EngineError> {
        if quad.len() < 8 {
            return Err(EngineError::NoBoxModel(format!(
                "content quad has {} values",
                quad.len()
            )));
        }
        Ok(Self::new(quad[0], quad[1], quad[4], quad[5]))
    }

    pub fn width(&self) -> f64 {
        self.right - self.left
    }

    pub fn height(&self) -> f64 {
        self.bottom - self.top
    }
}

/// An element found by [`RenderEngine::query_elements`].
#[derive(Debug, Clone, PartialEq)]
pub struct ElementHandle {
    /// Engine-specific node identifier, valid until the next navigation.
    pub id: u32,
    /// Attribute name/value pairs in document order.
    pub attributes: Vec<(String, String)>,
}

impl ElementHandle {
    pub fn new(id: u32) -> Self {
        Self {
            id,
            attributes: Vec::new(),
        }
    }

    pub fn with_attr(mut self, name: &str, value: &str) -> Self {
        self.attributes.push((name.to_string(), value.to_string()));
        self
    }

    /// Look up an attribute value by (case-insensitive) name.
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Pair up a flat `[name, value, name, value, ...]` list as reported by
    /// DevTools.
    pub fn from_flat_attributes(id: u32, flat: &[String]) -> Self {
        let attributes = flat
            .chunks_exact(2)
            .map(|pair| (pair[0].clone(), pair[1].clone()))
            .collect();
        Self { id, attributes }
    }
}

/// One browser session the capture pipeline can drive.
///
/// Implementations are not required to be thread-safe; the session pool
/// gives every engine a dedicated thread and never calls it concurrently.
pub trait RenderEngine {
    /// Fix the layout viewport so captured coordinates are reproducible.
    fn set_viewport(&mut self, viewport: &Viewport) -> Result<(), EngineError>;

    /// Load a URL and wait for the navigation to commit.
    fn navigate(&mut self, url: &str) -> Result<(), EngineError>;

    /// Capture the current viewport as PNG bytes.
    fn screenshot(&mut self) -> Result<Vec<u8>, EngineError>;

    /// URL the session actually landed on, after redirects.
    fn current_url(&mut self) -> Result<String, EngineError>;

    /// All elements matching a CSS selector, in document order.
    fn query_elements(&mut self, selector: &str) -> Result<Vec<ElementHandle>, EngineError>;

    /// Rendered content box of an element.
    fn box_model(&mut self, element: &ElementHandle) -> Result<Rect, EngineError>;

    /// Release the session. Called once, when the owning worker exits.
    fn close(&mut self) -> Result<(), EngineError> {
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("Failed to launch browser: {0}")]
    Launch(String),
    #[error("Navigation failed: {0}")]
    Navigation(String),
    #[error("Protocol error: {0}")]
    Protocol(String),
    #[error("No box model: {0}")]
    NoBoxModel(String),
}
