//! HTML shell and image map rendering.
//!
//! Markup is deliberately HTML 3.2-era (uppercase tags, no CSS, no script)
//! so the oldest graphical browsers can display it.

use wrp_core::{CaptureError, LinkRegion, PoolError};

/// Title, URL form, and the opening of the body.
pub fn shell_open(url: &str) -> String {
    let url = escape(url);
    format!(
        "<HTML>\n<HEAD><TITLE>WRP {url}</TITLE></HEAD>\n<BODY BGCOLOR=\"#F0F0F0\">\
         <FORM ACTION=\"/\">URL: <INPUT TYPE=\"TEXT\" NAME=\"url\" VALUE=\"{url}\">\
         <INPUT TYPE=\"SUBMIT\" VALUE=\"Go\"></FORM><P>\n"
    )
}

pub fn shell_close() -> &'static str {
    "</BODY>\n</HTML>\n"
}

/// The captured image and its client-side map.
pub fn image_map(image_src: &str, regions: &[LinkRegion]) -> String {
    let mut out = format!(
        "<IMG SRC=\"{}\" ALT=\"wrp\" USEMAP=\"#map\">\n<MAP NAME=\"map\">\n",
        escape(image_src)
    );
    for region in regions {
        let label = escape(&region.href);
        out.push_str(&format!(
            "<AREA SHAPE=\"RECT\" COORDS=\"{}\" ALT=\"{label}\" TITLE=\"{label}\" HREF=\"{}\">\n",
            region.coords(),
            escape(&proxy_href(&region.target)),
        ));
    }
    out.push_str("</MAP>\n");
    out
}

/// Inline message shown in place of the image.
pub fn capture_error(err: &PoolError) -> String {
    let (headline, detail) = match err {
        PoolError::Capture(CaptureError::Render(e)) => ("Unable to render page:", e.to_string()),
        PoolError::Capture(CaptureError::Decode(e)) => {
            ("Unable to decode page screenshot:", e.clone())
        }
        PoolError::Capture(CaptureError::Encode(e)) => ("Unable to encode GIF:", e.clone()),
        other => ("Capture unavailable:", other.to_string()),
    };
    format!("<BR>{headline}<BR>{}<BR>\n", escape(&detail))
}

/// Link that sends `target` back through the proxy.
pub fn proxy_href(target: &str) -> String {
    let mut out = String::with_capacity(target.len() + 6);
    out.push_str("/?url=");
    for ch in target.chars() {
        match ch {
            '%' => out.push_str("%25"),
            '&' => out.push_str("%26"),
            '+' => out.push_str("%2B"),
            '#' => out.push_str("%23"),
            _ => out.push(ch),
        }
    }
    out
}

/// Escape text for use inside an HTML attribute or element body.
pub fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(ch),
        }
    }
    out
}
