//! Engine lifecycle management
//!
//! The synthesis engine is expensive to build, so it is constructed lazily,
//! at most once, by whichever caller gets there first: a request handler or
//! the startup warm-up task. A failed construction leaves the slot empty and
//! the next caller tries again.
//!
//! ```text
//!   ensure_ready() ──► initialized? ──yes──► shared handle
//!                          │
//!                          no
//!                          ▼
//!        construction task: hooks ─► loader.load() (blocking pool)
//!                          │
//!                 ok ◄─────┴─────► err: surfaced, slot stays empty
//! ```
//!
//! Construction runs in its own task, so a caller that is cancelled while
//! waiting does not release the slot while a load is still running.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tempfile::TempPath;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use super::base::{EngineHandle, EngineLoader};
use super::error::{EngineError, EngineResult};
use super::hooks::{PreConstructionHook, apply_hooks};
use crate::metrics::Metrics;

/// Throwaway input used to warm the engine up
#[derive(Debug, Clone)]
pub struct WarmUpSample {
    pub text: String,
    pub reference: PathBuf,
    pub language: String,
}

/// Owner of the singleton synthesis engine
pub struct EngineLifecycle {
    loader: Arc<dyn EngineLoader>,
    hooks: Vec<Arc<dyn PreConstructionHook>>,
    engine: Arc<OnceCell<EngineHandle>>,
    constructions: Arc<AtomicU64>,
}

impl EngineLifecycle {
    pub fn new(loader: Arc<dyn EngineLoader>) -> Self {
        Self {
            loader,
            hooks: Vec::new(),
            engine: Arc::new(OnceCell::new()),
            constructions: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Register a hook applied before construction, in registration order
    pub fn with_hook(mut self, hook: Arc<dyn PreConstructionHook>) -> Self {
        self.hooks.push(hook);
        self
    }

    pub fn engine_name(&self) -> &str {
        self.loader.engine_name()
    }

    /// Return the engine, constructing it on first use
    ///
    /// Concurrent first-time callers wait on a single construction and all
    /// receive the same handle. Construction errors are returned to the
    /// callers waiting on that attempt and do not poison later attempts.
    pub async fn ensure_ready(&self) -> EngineResult<EngineHandle> {
        if let Some(engine) = self.engine.get() {
            return Ok(Arc::clone(engine));
        }

        let cell = Arc::clone(&self.engine);
        let loader = Arc::clone(&self.loader);
        let hooks = self.hooks.clone();
        let constructions = Arc::clone(&self.constructions);

        tokio::spawn(async move {
            cell.get_or_try_init(|| construct(loader, hooks, &constructions))
                .await
                .cloned()
        })
        .await
        .map_err(|e| EngineError::Task(format!("construction task failed: {e}")))?
    }

    /// Whether construction has completed. Never triggers construction.
    pub fn is_ready(&self) -> bool {
        self.engine.initialized()
    }

    /// Number of successful constructions so far
    pub fn constructions(&self) -> u64 {
        self.constructions.load(Ordering::SeqCst)
    }

    /// Construct the engine and run one throwaway synthesis
    ///
    /// Marks the metrics as warmed on success. Every failure is logged and
    /// swallowed; the return value reports whether warm-up succeeded.
    pub async fn warm_up(&self, metrics: &Metrics, sample: &WarmUpSample) -> bool {
        let engine = match self.ensure_ready().await {
            Ok(engine) => engine,
            Err(e) => {
                warn!(error = %e, "Warm-up could not construct the engine");
                return false;
            }
        };

        let scratch = match tempfile::Builder::new()
            .prefix("xtts-warmup-")
            .suffix(".wav")
            .tempfile()
        {
            Ok(file) => file.into_temp_path(),
            Err(e) => {
                warn!(error = %e, "Warm-up could not create a scratch file");
                return false;
            }
        };

        match synthesize_blocking(
            engine,
            &sample.text,
            &sample.reference,
            &sample.language,
            scratch,
        )
        .await
        {
            Ok(_scratch) => {
                metrics.set_warmed(true);
                info!("Synthesis engine warmed up");
                true
            }
            Err(e) => {
                warn!(error = %e, "Warm-up synthesis failed");
                false
            }
        }
    }
}

async fn construct(
    loader: Arc<dyn EngineLoader>,
    hooks: Vec<Arc<dyn PreConstructionHook>>,
    constructions: &AtomicU64,
) -> EngineResult<EngineHandle> {
    info!(engine = loader.engine_name(), "Constructing synthesis engine");
    let engine = tokio::task::spawn_blocking(move || {
        let environment = apply_hooks(&hooks);
        loader.load(&environment)
    })
    .await
    .map_err(|e| EngineError::Construction(format!("loader task failed: {e}")))??;

    constructions.fetch_add(1, Ordering::SeqCst);
    info!("Synthesis engine ready");
    Ok(engine)
}

impl std::fmt::Debug for EngineLifecycle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineLifecycle")
            .field("engine", &self.loader.engine_name())
            .field("hooks", &self.hooks.len())
            .field("ready", &self.is_ready())
            .finish()
    }
}

/// Run one synthesis call on the blocking thread pool
///
/// The scratch file moves into the blocking task and is handed back on
/// success. If the caller goes away first, the file is removed only once
/// the engine has finished writing it.
pub async fn synthesize_blocking(
    engine: EngineHandle,
    text: &str,
    reference: &Path,
    language: &str,
    output: TempPath,
) -> EngineResult<TempPath> {
    let text = text.to_string();
    let reference = reference.to_path_buf();
    let language = language.to_string();

    debug!(output = %output.display(), "Dispatching synthesis to blocking pool");
    tokio::task::spawn_blocking(move || {
        engine
            .synthesize(&text, &reference, &language, &output)
            .map(|()| output)
    })
    .await
    .map_err(|e| EngineError::Task(e.to_string()))?
}
