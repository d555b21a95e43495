//! HTTP front-end for the web rendering proxy.

use std::future::IntoFuture;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{
        rejection::{FormRejection, QueryRejection},
        Path, Query, State,
    },
    http::{header, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::get,
    Form, Router,
};
use tokio::net::TcpListener;
use tokio::sync::watch;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use wrp_core::{CacheConfig, ImageCache, SessionPool};

pub mod page;

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind, `host:port`.
    pub listen: String,
    /// Page shown when no usable `url` was given.
    pub default_url: String,
    /// Shorter `url` values count as absent.
    pub min_url_len: usize,
    /// Grace period for in-flight requests after a halt.
    pub drain_timeout: Duration,
    pub cache: CacheConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: "0.0.0.0:8080".to_string(),
            default_url: "https://www.bbc.com/news".to_string(),
            min_url_len: 5,
            drain_timeout: Duration::from_secs(5),
            cache: CacheConfig::default(),
        }
    }
}

/// Shared server state.
pub struct AppState {
    pool: SessionPool,
    cache: ImageCache,
    config: ServerConfig,
    halt: watch::Sender<bool>,
}

impl AppState {
    pub fn new(config: ServerConfig, pool: SessionPool) -> Self {
        let (halt, _) = watch::channel(false);
        Self {
            pool,
            cache: ImageCache::new(config.cache.clone()),
            config,
            halt,
        }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn cache(&self) -> &ImageCache {
        &self.cache
    }

    /// Stop taking captures and tell [`serve`] to wind down.
    pub fn halt(&self) {
        self.pool.shutdown();
        self.halt.send_replace(true);
    }

    pub fn is_halted(&self) -> bool {
        *self.halt.borrow()
    }

    /// Resolves once [`AppState::halt`] has been called.
    pub async fn halted(&self) {
        let mut rx = self.halt.subscribe();
        let _ = rx.wait_for(|halted| *halted).await;
    }

    /// The URL to capture for a request's `url` parameter.
    fn target_url(&self, requested: Option<String>) -> String {
        match requested {
            Some(url) if url.trim().len() >= self.config.min_url_len => url.trim().to_string(),
            _ => self.config.default_url.clone(),
        }
    }
}

/// Turn a Go-style `:8080` into a bindable `0.0.0.0:8080`.
pub fn normalize_listen_addr(addr: &str) -> String {
    if addr.starts_with(':') {
        format!("0.0.0.0{addr}")
    } else {
        addr.to_string()
    }
}

// ---------------------------------------------------------------------------
// Request types
// ---------------------------------------------------------------------------

/// Decoded `key=value` pairs, duplicates and all.
type FormPairs = Vec<(String, String)>;

/// The first `url` value, looking at the form body before the query string.
pub fn first_url<'a>(pairs: impl IntoIterator<Item = &'a (String, String)>) -> Option<String> {
    pairs
        .into_iter()
        .find(|(key, _)| key == "url")
        .map(|(_, value)| value.clone())
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

/// Build the axum router.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(page).post(page))
        .route("/img/{file}", get(image))
        .route("/favicon.ico", get(not_found))
        .route("/halt", get(halt))
        .fallback(page)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve until halted via `/halt` or Ctrl-C.
///
/// In-flight requests get [`ServerConfig::drain_timeout`] to finish before
/// they are abandoned.
pub async fn serve(listener: TcpListener, state: Arc<AppState>) -> std::io::Result<()> {
    let app = build_router(state.clone());

    let on_ctrl_c = state.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("interrupt received");
            on_ctrl_c.halt();
        }
    });

    let graceful = {
        let state = state.clone();
        axum::serve(listener, app)
            .with_graceful_shutdown(async move { state.halted().await })
            .into_future()
    };
    let drain_deadline = async {
        state.halted().await;
        tokio::time::sleep(state.config.drain_timeout).await;
    };

    tokio::select! {
        res = graceful => res?,
        _ = drain_deadline => warn!("drain timeout reached, abandoning in-flight requests"),
    }

    state.halt();
    state.pool.close().await;
    info!("server stopped");
    Ok(())
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// GET or POST /?url=
///
/// A request that carries no readable form still gets the page.
async fn page(
    State(state): State<Arc<AppState>>,
    query: Result<Query<FormPairs>, QueryRejection>,
    form: Result<Form<FormPairs>, FormRejection>,
) -> Response {
    let query = query.map(|Query(pairs)| pairs).unwrap_or_default();
    let body = form.map(|Form(pairs)| pairs).unwrap_or_default();
    render_page(&state, first_url(body.iter().chain(query.iter()))).await
}

async fn render_page(state: &AppState, requested: Option<String>) -> Response {
    let url = state.target_url(requested);
    info!(url = %url, "page request");

    let mut html = page::shell_open(&url);
    match state.pool.capture(&url).await {
        Ok(result) => {
            let key = state.cache.store(result.image);
            let src = format!("/img/{key}.gif");
            info!(url = %url, image = %src, regions = result.regions.len(), "page ready");
            html.push_str(&page::image_map(&src, &result.regions));
        }
        Err(e) => {
            warn!(url = %url, error = %e, "capture failed");
            html.push_str(&page::capture_error(&e));
        }
    }
    html.push_str(page::shell_close());

    (StatusCode::OK, Html(html)).into_response()
}

/// GET /img/{key}.gif
async fn image(State(state): State<Arc<AppState>>, Path(file): Path<String>) -> Response {
    let key = file.strip_suffix(".gif").unwrap_or(&file);
    info!(key, "image request");

    match state.cache.take_once(key) {
        Some(bytes) => (
            StatusCode::OK,
            [
                (header::CONTENT_TYPE, "image/gif".to_string()),
                (header::CONTENT_LENGTH, bytes.len().to_string()),
            ],
            bytes,
        )
            .into_response(),
        None => {
            warn!(key, "image not found");
            (StatusCode::NOT_FOUND, "not found").into_response()
        }
    }
}

async fn not_found() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, "not found")
}

/// GET /halt
async fn halt(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    info!("shutdown request received");
    state.halt();
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain")],
        "WRP Shutdown",
    )
}
