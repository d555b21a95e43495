//! Web rendering proxy core.
//!
//! Renders a page in a real browser, flattens it to a GIF and rebuilds its
//! links as an HTML image map, so clients without scripting or modern
//! image support can still browse.

pub mod cache;
pub mod capture;
pub mod engine;
pub mod pool;

pub use cache::{CacheConfig, ImageCache};
pub use capture::{CaptureConfig, CaptureError, CapturePipeline, CaptureResult, LinkRegion};
pub use engine::{ElementHandle, EngineError, Rect, RenderEngine, Viewport};
pub use pool::{PoolConfig, PoolError, SessionPool};
