//! Tests for HTML rendering helpers.

use wrp_core::{CaptureError, EngineError, LinkRegion, PoolError, Rect};
use wrp_server::{first_url, normalize_listen_addr};
use wrp_server::page::{capture_error, escape, image_map, proxy_href, shell_close, shell_open};

#[test]
fn shell_echoes_url_in_title_and_form() {
    let html = shell_open("http://example.com/?a=1&b=2");

    assert!(html.starts_with("<HTML>"));
    assert!(html.contains("<TITLE>WRP http://example.com/?a=1&amp;b=2</TITLE>"));
    assert!(html.contains("NAME=\"url\" VALUE=\"http://example.com/?a=1&amp;b=2\""));
    assert!(html.contains("<INPUT TYPE=\"SUBMIT\" VALUE=\"Go\">"));
    assert_eq!(shell_close(), "</BODY>\n</HTML>\n");
}

#[test]
fn image_map_lists_one_area_per_region() {
    let regions = vec![
        LinkRegion {
            rect: Rect::new(10.4, 20.6, 110.4, 220.6),
            href: "/a".into(),
            target: "https://x.com/a".into(),
        },
        LinkRegion {
            rect: Rect::new(0.0, 0.0, 5.0, 5.0),
            href: "b.html".into(),
            target: "https://x.com/b.html".into(),
        },
    ];

    let html = image_map("/img/k.gif", &regions);

    assert!(html.starts_with("<IMG SRC=\"/img/k.gif\" ALT=\"wrp\" USEMAP=\"#map\">"));
    assert!(html.contains(
        "<AREA SHAPE=\"RECT\" COORDS=\"10,21,110,221\" ALT=\"/a\" TITLE=\"/a\" HREF=\"/?url=https://x.com/a\">"
    ));
    assert!(html.contains("HREF=\"/?url=https://x.com/b.html\""));
    assert!(html.ends_with("</MAP>\n"));
}

#[test]
fn empty_map_is_still_well_formed() {
    let html = image_map("/img/k.gif", &[]);
    assert!(html.contains("<MAP NAME=\"map\">\n</MAP>\n"));
}

#[test]
fn proxy_href_protects_query_delimiters() {
    assert_eq!(proxy_href("http://x.com/next"), "/?url=http://x.com/next");
    assert_eq!(
        proxy_href("http://x.com/s?q=a+b&p=1#top"),
        "/?url=http://x.com/s?q=a%2Bb%26p=1%23top"
    );
    assert_eq!(proxy_href("http://x.com/%20"), "/?url=http://x.com/%2520");
}

#[test]
fn escape_handles_markup() {
    assert_eq!(escape("<a href=\"x\">&</a>"), "&lt;a href=&quot;x&quot;&gt;&amp;&lt;/a&gt;");
    assert_eq!(escape("plain"), "plain");
}

#[test]
fn capture_errors_render_inline() {
    let decode = PoolError::Capture(CaptureError::Decode("bad header".into()));
    assert_eq!(
        capture_error(&decode),
        "<BR>Unable to decode page screenshot:<BR>bad header<BR>\n"
    );

    let encode = PoolError::Capture(CaptureError::Encode("too big".into()));
    assert!(capture_error(&encode).contains("Unable to encode GIF:"));

    let render = PoolError::Capture(CaptureError::Render(EngineError::Navigation(
        "<timeout>".into(),
    )));
    let html = capture_error(&render);
    assert!(html.contains("Unable to render page:"));
    assert!(html.contains("Navigation failed: &lt;timeout&gt;"));

    assert!(capture_error(&PoolError::Closed).contains("Server is shutting down"));
}

#[test]
fn listen_addr_accepts_port_only_form() {
    assert_eq!(normalize_listen_addr(":8080"), "0.0.0.0:8080");
    assert_eq!(normalize_listen_addr("127.0.0.1:9000"), "127.0.0.1:9000");
}

#[test]
fn first_url_ignores_other_keys_and_later_values() {
    let pairs = vec![
        ("q".to_string(), "x".to_string()),
        ("url".to_string(), "http://a.example".to_string()),
        ("url".to_string(), "http://b.example".to_string()),
    ];
    assert_eq!(first_url(&pairs), Some("http://a.example".to_string()));
    assert_eq!(first_url(&pairs[..1]), None);
}
