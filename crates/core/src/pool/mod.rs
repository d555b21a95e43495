//! Rendering session ownership.
//!
//! Each session is a dedicated thread that owns one [`RenderEngine`] and
//! runs captures on it one at a time. Requests go through a single FIFO
//! queue shared by all sessions, so with `sessions = 1` captures are
//! strictly serialized and with `N` at most `N` run at once.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use crate::capture::{CaptureError, CapturePipeline, CaptureResult};
use crate::engine::{EngineError, RenderEngine};

#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Number of independent rendering sessions.
    pub sessions: usize,
    /// How long a request waits for its capture, queueing included.
    pub capture_timeout: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            sessions: 1,
            capture_timeout: Duration::from_secs(60),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PoolError {
    #[error("Server is shutting down")]
    Closed,
    #[error("Capture timed out after {0:?}")]
    Timeout(Duration),
    #[error("Rendering session exited unexpectedly")]
    WorkerLost,
    #[error("Rendering session failed to start: {0}")]
    Init(EngineError),
    #[error("Could not spawn rendering session: {0}")]
    Spawn(String),
    #[error(transparent)]
    Capture(#[from] CaptureError),
}

struct CaptureJob {
    url: String,
    reply: oneshot::Sender<Result<CaptureResult, CaptureError>>,
}

/// A bounded set of rendering sessions behind one request queue.
pub struct SessionPool {
    queue: Mutex<Option<Sender<CaptureJob>>>,
    closed: Arc<AtomicBool>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    sessions: usize,
    config: PoolConfig,
}

impl SessionPool {
    /// Spawn the sessions and wait until every engine is up.
    ///
    /// If any engine fails to start the whole pool is torn down.
    ///
    /// `factory` runs once on each session thread, so engines never cross
    /// threads.
    pub async fn start<F>(
        config: PoolConfig,
        pipeline: CapturePipeline,
        factory: F,
    ) -> Result<Self, PoolError>
    where
        F: Fn() -> Result<Box<dyn RenderEngine>, EngineError> + Send + Sync + 'static,
    {
        let sessions = config.sessions.max(1);
        let (tx, rx) = mpsc::channel::<CaptureJob>();
        let rx = Arc::new(Mutex::new(rx));
        let factory = Arc::new(factory);
        let pool = Self {
            queue: Mutex::new(Some(tx)),
            closed: Arc::new(AtomicBool::new(false)),
            workers: Mutex::new(Vec::with_capacity(sessions)),
            sessions,
            config,
        };

        let mut inits = Vec::with_capacity(sessions);
        for id in 0..sessions {
            let (init_tx, init_rx) = oneshot::channel();
            let session = Session {
                id,
                jobs: Arc::clone(&rx),
                closed: Arc::clone(&pool.closed),
                pipeline: pipeline.clone(),
            };
            let factory = Arc::clone(&factory);
            let spawned = thread::Builder::new()
                .name(format!("wrp-session-{id}"))
                .spawn(move || session.run(factory, init_tx));
            match spawned {
                Ok(handle) => pool.lock_workers().push(handle),
                Err(e) => {
                    pool.close().await;
                    return Err(PoolError::Spawn(e.to_string()));
                }
            }
            inits.push(init_rx);
        }

        for init in inits {
            let ready = match init.await {
                Ok(Ok(())) => Ok(()),
                Ok(Err(e)) => Err(PoolError::Init(e)),
                Err(_) => Err(PoolError::WorkerLost),
            };
            if let Err(e) = ready {
                pool.close().await;
                return Err(e);
            }
        }

        info!(sessions, "rendering sessions ready");
        Ok(pool)
    }

    /// Queue a capture and wait for its result.
    pub async fn capture(&self, url: &str) -> Result<CaptureResult, PoolError> {
        let (reply, rx) = oneshot::channel();
        {
            let queue = self.lock_queue();
            let tx = queue.as_ref().ok_or(PoolError::Closed)?;
            tx.send(CaptureJob {
                url: url.to_string(),
                reply,
            })
            .map_err(|_| PoolError::Closed)?;
        }

        match tokio::time::timeout(self.config.capture_timeout, rx).await {
            Ok(Ok(result)) => Ok(result?),
            Ok(Err(_)) if self.is_closed() => Err(PoolError::Closed),
            Ok(Err(_)) => Err(PoolError::WorkerLost),
            Err(_) => Err(PoolError::Timeout(self.config.capture_timeout)),
        }
    }

    /// Stop accepting captures. Captures already running finish. Queued ones
    /// are dropped and their callers get [`PoolError::Closed`]. Each session
    /// then closes its engine and exits.
    pub fn shutdown(&self) {
        self.closed.store(true, Ordering::SeqCst);
        if self.lock_queue().take().is_some() {
            info!("rendering sessions shutting down");
        }
    }

    /// Shut down and wait until every session has closed its engine.
    pub async fn close(&self) {
        self.shutdown();
        let workers = std::mem::take(&mut *self.lock_workers());
        if workers.is_empty() {
            return;
        }
        let joined = tokio::task::spawn_blocking(move || {
            for worker in workers {
                if worker.join().is_err() {
                    warn!("rendering session panicked");
                }
            }
        })
        .await;
        match joined {
            Ok(()) => info!("rendering sessions closed"),
            Err(e) => warn!(error = %e, "failed to wait for rendering sessions"),
        }
    }

    pub fn is_closed(&self) -> bool {
        self.lock_queue().is_none()
    }

    pub fn sessions(&self) -> usize {
        self.sessions
    }

    fn lock_queue(&self) -> MutexGuard<'_, Option<Sender<CaptureJob>>> {
        self.queue.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn lock_workers(&self) -> MutexGuard<'_, Vec<JoinHandle<()>>> {
        self.workers.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// One session thread's share of the pool.
struct Session {
    id: usize,
    jobs: Arc<Mutex<Receiver<CaptureJob>>>,
    closed: Arc<AtomicBool>,
    pipeline: CapturePipeline,
}

impl Session {
    fn run<F>(self, factory: Arc<F>, init: oneshot::Sender<Result<(), EngineError>>)
    where
        F: Fn() -> Result<Box<dyn RenderEngine>, EngineError>,
    {
        let id = self.id;
        let mut engine = match (*factory)() {
            Ok(engine) => engine,
            Err(e) => {
                let _ = init.send(Err(e));
                return;
            }
        };
        let _ = init.send(Ok(()));
        debug!(session = id, "rendering session started");

        loop {
            let job = {
                let rx = self.jobs.lock().unwrap_or_else(|e| e.into_inner());
                rx.recv()
            };
            let Ok(job) = job else { break };

            if self.closed.load(Ordering::SeqCst) {
                debug!(session = id, url = %job.url, "pool closed, dropping queued capture");
                continue;
            }
            if job.reply.is_closed() {
                debug!(session = id, url = %job.url, "requester gone, skipping capture");
                continue;
            }
            let result = self.pipeline.capture(engine.as_mut(), &job.url);
            let _ = job.reply.send(result);
        }

        if let Err(e) = engine.close() {
            warn!(session = id, error = %e, "failed to close rendering session");
        }
        info!(session = id, "rendering session closed");
    }
}
