use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use wrp_core::engine::cdp::{CdpConfig, CdpEngine};
use wrp_core::{CaptureConfig, CapturePipeline, CaptureResult, Viewport};

#[derive(Parser)]
#[command(
    name = "wrp",
    about = "Web rendering proxy: browse modern sites from ancient browsers"
)]
struct Cli {
    /// Listen address:port, e.g. :8080 or 127.0.0.1:8080
    #[arg(short = 'l', long = "listen", default_value = ":8080")]
    listen: String,

    /// Viewport size as WxH
    #[arg(long, default_value = "1024x768")]
    viewport: String,

    /// Wait after navigation before taking the screenshot, in milliseconds
    #[arg(long, default_value_t = 2000)]
    settle_ms: u64,

    /// Number of browser sessions capturing in parallel
    #[arg(long, default_value_t = 1)]
    sessions: usize,

    /// Per-capture timeout in seconds
    #[arg(long, default_value_t = 60)]
    timeout_secs: u64,

    /// Page shown when no URL is requested
    #[arg(long, default_value = "https://www.bbc.com/news")]
    default_url: String,

    /// Chrome/Chromium binary (auto-detected by default)
    #[arg(long)]
    chrome: Option<PathBuf>,

    /// Disable the Chrome sandbox
    #[arg(long)]
    no_sandbox: bool,

    /// Maximum unfetched images kept in memory
    #[arg(long, default_value_t = 256)]
    cache_entries: usize,

    /// Seconds an unfetched image is kept
    #[arg(long, default_value_t = 300)]
    cache_ttl_secs: u64,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Capture one URL without starting the server
    Capture {
        /// The URL to capture
        url: String,

        /// Where to write the GIF
        #[arg(long, short, default_value = "wrp.gif")]
        out: PathBuf,

        /// Print regions as JSON instead of compact lines
        #[arg(long)]
        json: bool,
    },
}

fn parse_viewport(s: &str) -> Viewport {
    let defaults = Viewport::default();
    let parts: Vec<&str> = s.split('x').collect();
    if parts.len() == 2 {
        Viewport {
            width: parts[0].parse().unwrap_or(defaults.width),
            height: parts[1].parse().unwrap_or(defaults.height),
            ..defaults
        }
    } else {
        defaults
    }
}

impl Cli {
    fn capture_config(&self) -> CaptureConfig {
        CaptureConfig {
            viewport: parse_viewport(&self.viewport),
            settle: Duration::from_millis(self.settle_ms),
            ..Default::default()
        }
    }

    fn cdp_config(&self) -> CdpConfig {
        CdpConfig {
            viewport: parse_viewport(&self.viewport),
            chrome_path: self.chrome.clone(),
            sandbox: !self.no_sandbox,
            timeout: Duration::from_secs(self.timeout_secs),
        }
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Capture {
            ref url,
            ref out,
            json,
        }) => capture_once(&cli, url, out, json),
        None => run_server(&cli),
    }
}

fn capture_once(
    cli: &Cli,
    url: &str,
    out: &Path,
    json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    use wrp_core::RenderEngine;

    let pipeline = CapturePipeline::new(cli.capture_config());
    let mut engine = CdpEngine::launch(&cli.cdp_config())?;
    let result = pipeline.capture(&mut engine, url);
    engine.close()?;
    let result = result?;

    std::fs::write(out, &result.image)?;
    print_result(&result, json)?;
    Ok(())
}

fn print_result(result: &CaptureResult, as_json: bool) -> Result<(), serde_json::Error> {
    if as_json {
        println!("{}", serde_json::to_string_pretty(result)?);
    } else {
        println!("url: {}", result.final_url);
        println!("img: {}x{}", result.width, result.height);
        println!("links: {}", result.regions.len());
        println!("---");
        for region in &result.regions {
            println!("[{}] {}", region.coords(), region.target);
        }
    }
    Ok(())
}

#[cfg(feature = "serve")]
fn run_server(cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    use std::sync::Arc;
    use wrp_core::{CacheConfig, PoolConfig, RenderEngine, SessionPool};
    use wrp_server::{normalize_listen_addr, AppState, ServerConfig};

    let config = ServerConfig {
        listen: normalize_listen_addr(&cli.listen),
        default_url: cli.default_url.clone(),
        cache: CacheConfig {
            max_entries: cli.cache_entries,
            ttl: Duration::from_secs(cli.cache_ttl_secs),
        },
        ..Default::default()
    };
    let pool_config = PoolConfig {
        sessions: cli.sessions,
        capture_timeout: Duration::from_secs(cli.timeout_secs),
    };
    let pipeline = CapturePipeline::new(cli.capture_config());
    let cdp = cli.cdp_config();

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(async move {
            let pool = SessionPool::start(pool_config, pipeline, move || {
                CdpEngine::launch(&cdp).map(|engine| Box::new(engine) as Box<dyn RenderEngine>)
            })
            .await?;

            let listener = tokio::net::TcpListener::bind(&config.listen).await?;
            tracing::info!("starting http server on {}", config.listen);
            let state = Arc::new(AppState::new(config, pool));
            wrp_server::serve(listener, state).await?;
            Ok::<(), Box<dyn std::error::Error>>(())
        })?;

    Ok(())
}

#[cfg(not(feature = "serve"))]
fn run_server(_cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    Err("built without the `serve` feature; only `wrp capture` is available".into())
}
