//! Turning anchor elements into image-map regions.

use tracing::debug;
use url::Url;

use super::LinkRegion;
use crate::engine::{ElementHandle, Rect};

/// Resolved targets this short or shorter are dropped.
pub const MIN_TARGET_LEN: usize = 1;

/// Resolve an `href` against the page URL.
///
/// Absolute hrefs are returned as written. Blank hrefs are rejected rather
/// than resolving to the page itself.
pub fn resolve(base: &Url, href: &str) -> Option<String> {
    let href = href.trim();
    if href.is_empty() {
        return None;
    }
    match Url::parse(href) {
        Ok(_) => Some(href.to_string()),
        Err(_) => base.join(href).ok().map(String::from),
    }
}

/// Whether a box is big enough to click.
pub fn has_extent(rect: &Rect) -> bool {
    rect.width() > 0.0 && rect.height() > 0.0
}

/// Build the region for one anchor, or `None` if it should be skipped.
pub fn region(base: &Url, anchor: &ElementHandle, rect: Rect) -> Option<LinkRegion> {
    let href = anchor.attribute("href")?;
    let Some(target) = resolve(base, href) else {
        debug!(node = anchor.id, href, "skipping unresolvable link");
        return None;
    };
    if !has_extent(&rect) || target.len() <= MIN_TARGET_LEN {
        return None;
    }
    Some(LinkRegion {
        rect,
        href: href.to_string(),
        target,
    })
}
