//! XTTS v2 through a resident Coqui worker process
//!
//! Loading the model takes far longer than one synthesis, so the loader
//! starts a single Python worker that loads `TTS.api.TTS` once and then
//! serves requests over its pipes, one JSON object per line:
//!
//! ```text
//!   gateway ── {"text","speaker_wav","language","output"} ──► worker stdin
//!   gateway ◄── {"ok": true} | {"error": "..."} ─────────────── worker stdout
//! ```
//!
//! The worker announces `{"ready": true}` once the model is loaded, or
//! `{"error": "..."}` if it cannot be. Lines on stdout that are not JSON
//! objects are skipped. If the worker dies it is started again on the next
//! request.

use std::env;
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::base::{EngineEnvironment, EngineHandle, EngineLoader, SynthesisEngine};
use super::error::{EngineError, EngineResult};

/// Coqui model identifier for XTTS v2
pub const XTTS_V2_MODEL_ID: &str = "tts_models/multilingual/multi-dataset/xtts_v2";

/// Engine name reported by `/health`
pub const XTTS_ENGINE_NAME: &str = "xtts_v2";

const WORKER_SCRIPT: &str = include_str!("coqui_worker.py");

/// How to start the worker
#[derive(Debug, Clone)]
struct WorkerSpec {
    program: PathBuf,
    model_id: String,
    use_cuda: bool,
    environment: EngineEnvironment,
}

impl WorkerSpec {
    fn command(&self) -> Command {
        let mut command = Command::new(&self.program);
        command
            .arg("-u")
            .arg("-c")
            .arg(WORKER_SCRIPT)
            .arg("--model_name")
            .arg(&self.model_id)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit());
        if self.use_cuda {
            command.arg("--use_cuda");
        }
        command.envs(self.environment.iter());
        command
    }
}

#[derive(Serialize)]
struct WorkerRequest<'a> {
    text: &'a str,
    speaker_wav: &'a Path,
    language: &'a str,
    output: &'a Path,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct WorkerReply {
    ready: bool,
    ok: bool,
    error: Option<String>,
}

/// A running worker with the model loaded
struct WorkerProcess {
    child: Child,
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
}

impl WorkerProcess {
    /// Start the worker and wait until the model is loaded
    fn spawn(spec: &WorkerSpec) -> EngineResult<Self> {
        let mut child = spec.command().spawn().map_err(|e| {
            EngineError::Construction(format!(
                "failed to start {}: {e}",
                spec.program.display()
            ))
        })?;

        let (Some(stdin), Some(stdout)) = (child.stdin.take(), child.stdout.take()) else {
            let _ = child.kill();
            let _ = child.wait();
            return Err(EngineError::Construction(
                "worker pipes unavailable".to_string(),
            ));
        };

        let mut worker = Self {
            child,
            stdin,
            stdout: BufReader::new(stdout),
        };

        match worker.read_reply() {
            Ok(WorkerReply { ready: true, .. }) => {
                info!(pid = worker.child.id(), "XTTS worker ready");
                Ok(worker)
            }
            Ok(WorkerReply {
                error: Some(error), ..
            }) => Err(EngineError::Construction(error)),
            Ok(_) => Err(EngineError::Construction(
                "worker sent an unexpected startup reply".to_string(),
            )),
            Err(e) => {
                let status = worker
                    .child
                    .wait()
                    .map(|status| status.to_string())
                    .unwrap_or_else(|_| e.to_string());
                Err(EngineError::Construction(format!(
                    "worker exited before loading the model ({status})"
                )))
            }
        }
    }

    /// Next JSON object the worker wrote to stdout
    fn read_reply(&mut self) -> io::Result<WorkerReply> {
        let mut line = String::new();
        loop {
            line.clear();
            if self.stdout.read_line(&mut line)? == 0 {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "worker exited",
                ));
            }
            let line = line.trim();
            if !line.starts_with('{') {
                if !line.is_empty() {
                    debug!(output = %line, "Worker output");
                }
                continue;
            }
            match serde_json::from_str(line) {
                Ok(reply) => return Ok(reply),
                Err(e) => debug!(output = %line, error = %e, "Unparseable worker line"),
            }
        }
    }

    /// Send one request and wait for its reply
    fn request(&mut self, request: &WorkerRequest<'_>) -> io::Result<WorkerReply> {
        let mut line = serde_json::to_vec(request)?;
        line.push(b'\n');
        self.stdin.write_all(&line)?;
        self.stdin.flush()?;
        self.read_reply()
    }
}

impl Drop for WorkerProcess {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

/// Loader for [`CoquiWorkerEngine`]
#[derive(Debug, Clone)]
pub struct CoquiLoader {
    program: PathBuf,
    model_id: String,
    use_cuda: bool,
}

impl CoquiLoader {
    /// `program` is the Python interpreter that has Coqui TTS installed
    pub fn new(program: impl Into<PathBuf>, model_id: impl Into<String>, use_cuda: bool) -> Self {
        Self {
            program: program.into(),
            model_id: model_id.into(),
            use_cuda,
        }
    }
}

impl EngineLoader for CoquiLoader {
    fn engine_name(&self) -> &str {
        XTTS_ENGINE_NAME
    }

    fn load(&self, environment: &EngineEnvironment) -> EngineResult<EngineHandle> {
        let program = resolve_program(&self.program)
            .ok_or_else(|| EngineError::ProgramNotFound(self.program.display().to_string()))?;

        info!(
            program = %program.display(),
            model = %self.model_id,
            cuda = self.use_cuda,
            "Loading XTTS model"
        );

        let spec = WorkerSpec {
            program,
            model_id: self.model_id.clone(),
            use_cuda: self.use_cuda,
            environment: environment.clone(),
        };
        let worker = WorkerProcess::spawn(&spec)?;

        Ok(Arc::new(CoquiWorkerEngine {
            spec,
            worker: Mutex::new(Some(worker)),
        }))
    }
}

/// Synthesis through the resident worker
///
/// The model serves one request at a time; concurrent callers queue on the
/// worker lock.
pub struct CoquiWorkerEngine {
    spec: WorkerSpec,
    worker: Mutex<Option<WorkerProcess>>,
}

impl std::fmt::Debug for CoquiWorkerEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoquiWorkerEngine")
            .field("program", &self.spec.program)
            .field("model_id", &self.spec.model_id)
            .finish()
    }
}

impl SynthesisEngine for CoquiWorkerEngine {
    fn synthesize(
        &self,
        text: &str,
        reference: &Path,
        language: &str,
        output: &Path,
    ) -> EngineResult<()> {
        let mut slot = self.worker.lock();
        if slot.is_none() {
            warn!("XTTS worker not running, restarting it");
            *slot = Some(WorkerProcess::spawn(&self.spec)?);
        }
        let Some(worker) = slot.as_mut() else {
            return Err(EngineError::Synthesis("worker unavailable".to_string()));
        };

        debug!(
            language = %language,
            reference = %reference.display(),
            output = %output.display(),
            "Sending synthesis request to worker"
        );

        let request = WorkerRequest {
            text,
            speaker_wav: reference,
            language,
            output,
        };
        let reply = match worker.request(&request) {
            Ok(reply) => reply,
            Err(e) => {
                // Dropping the process kills it; the next call starts a new one
                *slot = None;
                return Err(EngineError::Synthesis(format!("worker failed: {e}")));
            }
        };
        drop(slot);

        if let Some(error) = reply.error {
            return Err(EngineError::Synthesis(error));
        }
        if !reply.ok {
            return Err(EngineError::Synthesis(
                "worker sent an unexpected reply".to_string(),
            ));
        }

        let written = std::fs::metadata(output).map(|m| m.len()).unwrap_or(0);
        if written == 0 {
            return Err(EngineError::Synthesis(
                "engine produced no audio".to_string(),
            ));
        }
        Ok(())
    }
}

/// Resolve a program name against `PATH`, or check an explicit path
pub fn resolve_program(program: &Path) -> Option<PathBuf> {
    if program.components().count() > 1 || program.is_absolute() {
        return program.is_file().then(|| program.to_path_buf());
    }

    let paths = env::var_os("PATH")?;
    env::split_paths(&paths)
        .map(|dir| dir.join(program))
        .find(|candidate| candidate.is_file())
}
