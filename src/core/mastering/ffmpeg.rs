use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use super::chain::MasteringChain;
use super::{Mastering, MasteringError, MasteringResult};
use crate::utils::describe_exit;

/// Mastering through an `ffmpeg` child process
#[derive(Debug, Clone)]
pub struct FfmpegMastering {
    program: PathBuf,
    timeout: Option<Duration>,
}

impl FfmpegMastering {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            timeout: None,
        }
    }

    /// Kill the child process if it runs longer than `timeout`
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Full argument vector for one run
    pub fn args(input: &Path, output: &Path, chain: &MasteringChain) -> Vec<String> {
        let mut args: Vec<String> = ["-y", "-hide_banner", "-loglevel", "error", "-i"]
            .into_iter()
            .map(String::from)
            .collect();
        args.push(input.display().to_string());
        args.push("-filter:a".to_string());
        args.push(chain.filter_graph());
        args.extend(chain.output_args());
        args.push(output.display().to_string());
        args
    }
}

#[async_trait]
impl Mastering for FfmpegMastering {
    async fn master(
        &self,
        input: &Path,
        output: &Path,
        chain: &MasteringChain,
    ) -> MasteringResult<()> {
        let mut command = Command::new(&self.program);
        command
            .args(Self::args(input, output, chain))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        debug!(
            program = %self.program.display(),
            input = %input.display(),
            output = %output.display(),
            "Running mastering chain"
        );

        let run = command.output();
        let result = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, run)
                .await
                .map_err(|_| MasteringError::Timeout(limit))?,
            None => run.await,
        }
        .map_err(MasteringError::Spawn)?;

        if !result.status.success() {
            return Err(MasteringError::Failed(describe_exit(&result)));
        }

        let written = tokio::fs::metadata(output)
            .await
            .map(|m| m.len())
            .unwrap_or(0);
        if written == 0 {
            return Err(MasteringError::EmptyOutput);
        }
        Ok(())
    }
}
