//! Test Fixtures Module
//!
//! Stub engine, loader and mastering implementations plus helpers that build
//! an `AppState` around them with reference clips in a temporary directory.

// Not every test binary uses every fixture
#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tempfile::TempDir;

use xtts_gateway::core::engine::{
    EngineEnvironment, EngineError, EngineHandle, EngineLoader, EngineResult, SynthesisEngine,
};
use xtts_gateway::core::mastering::{Mastering, MasteringChain, MasteringError, MasteringResult};
use xtts_gateway::{AppState, ServerConfig};

/// Bytes every stub synthesis writes
pub const STUB_WAV: &[u8] = b"RIFF....WAVEfmt stub";

/// One synthesis call as the engine saw it
#[derive(Debug, Clone, PartialEq)]
pub struct SeenRequest {
    pub text: String,
    pub language: String,
    pub output: PathBuf,
}

/// Engine that writes [`STUB_WAV`] or fails on demand
///
/// `delay` is slept before writing, standing in for a slow model.
#[derive(Debug, Default)]
pub struct StubEngine {
    pub fail: bool,
    pub delay: Duration,
    pub calls: AtomicUsize,
    pub requests: Mutex<Vec<SeenRequest>>,
}

impl StubEngine {
    pub fn slow(delay: Duration) -> Self {
        Self {
            delay,
            ..Default::default()
        }
    }

    pub fn requests(&self) -> Vec<SeenRequest> {
        self.requests.lock().clone()
    }
}

impl SynthesisEngine for StubEngine {
    fn synthesize(
        &self,
        text: &str,
        reference: &Path,
        language: &str,
        output: &Path,
    ) -> EngineResult<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().push(SeenRequest {
            text: text.to_string(),
            language: language.to_string(),
            output: output.to_path_buf(),
        });
        if !self.delay.is_zero() {
            std::thread::sleep(self.delay);
        }
        if self.fail {
            return Err(EngineError::Synthesis(format!(
                "stub refused '{text}' with {}",
                reference.display()
            )));
        }
        std::fs::write(output, STUB_WAV)?;
        Ok(())
    }
}

/// Loader that counts constructions, optionally sleeps and fails the first
/// `failures` attempts
///
/// `max_active` is the highest number of `load` calls seen running at once.
pub struct StubLoader {
    pub engine: Arc<StubEngine>,
    pub delay: Duration,
    pub failures: AtomicUsize,
    pub attempts: AtomicUsize,
    pub active: AtomicUsize,
    pub max_active: AtomicUsize,
    pub environments: Mutex<Vec<EngineEnvironment>>,
}

impl StubLoader {
    pub fn new() -> Self {
        Self::with_engine(StubEngine::default())
    }

    pub fn with_engine(engine: StubEngine) -> Self {
        Self {
            engine: Arc::new(engine),
            delay: Duration::ZERO,
            failures: AtomicUsize::new(0),
            attempts: AtomicUsize::new(0),
            active: AtomicUsize::new(0),
            max_active: AtomicUsize::new(0),
            environments: Mutex::new(Vec::new()),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn failing_first(self, failures: usize) -> Self {
        self.failures.store(failures, Ordering::SeqCst);
        self
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    pub fn max_active(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }

    /// Environment seen by the most recent construction attempt
    pub fn last_environment(&self) -> Option<EngineEnvironment> {
        self.environments.lock().last().cloned()
    }
}

impl EngineLoader for StubLoader {
    fn engine_name(&self) -> &str {
        "xtts_v2"
    }

    fn load(&self, environment: &EngineEnvironment) -> EngineResult<EngineHandle> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        self.environments.lock().push(environment.clone());
        let active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(active, Ordering::SeqCst);
        if !self.delay.is_zero() {
            std::thread::sleep(self.delay);
        }
        self.active.fetch_sub(1, Ordering::SeqCst);

        let remaining = self.failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failures.store(remaining - 1, Ordering::SeqCst);
            return Err(EngineError::Construction("model weights unavailable".into()));
        }

        let engine: EngineHandle = self.engine.clone();
        Ok(engine)
    }
}

/// Mastering stand-in that copies the input and records the paths it saw
#[derive(Debug, Default)]
pub struct CopyMastering {
    pub seen: Mutex<Vec<(PathBuf, PathBuf)>>,
}

#[async_trait]
impl Mastering for CopyMastering {
    async fn master(
        &self,
        input: &Path,
        output: &Path,
        _chain: &MasteringChain,
    ) -> MasteringResult<()> {
        self.seen
            .lock()
            .push((input.to_path_buf(), output.to_path_buf()));
        tokio::fs::copy(input, output)
            .await
            .map_err(MasteringError::Spawn)?;
        Ok(())
    }
}

/// Mastering stand-in that always fails after recording the paths it saw
#[derive(Debug, Default)]
pub struct FailingMastering {
    pub seen: Mutex<Vec<(PathBuf, PathBuf)>>,
}

#[async_trait]
impl Mastering for FailingMastering {
    async fn master(
        &self,
        input: &Path,
        output: &Path,
        _chain: &MasteringChain,
    ) -> MasteringResult<()> {
        self.seen
            .lock()
            .push((input.to_path_buf(), output.to_path_buf()));
        Err(MasteringError::Failed("exit status: 1: invalid filter".into()))
    }
}

/// Temporary reference directory holding `reference_kelly.wav` only
///
/// `ken` stays registered but has no clip on disk.
pub fn reference_dir() -> TempDir {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("reference_kelly.wav"), b"RIFF kelly").unwrap();
    dir
}

/// Default configuration pointing at `reference_dir`
pub fn test_config(reference_dir: &Path) -> ServerConfig {
    let mut config = ServerConfig::default();
    config.host = "127.0.0.1".to_string();
    config.speakers.reference_dir = reference_dir.to_path_buf();
    config
}

/// State wired to the given stubs. Keep the returned directory alive.
pub fn test_state(
    loader: Arc<StubLoader>,
    mastering: Arc<dyn Mastering>,
) -> (Arc<AppState>, TempDir) {
    let dir = reference_dir();
    let state = AppState::with_components(test_config(dir.path()), loader, mastering);
    (state, dir)
}
