//! Audio mastering and transcoding
//!
//! Raw synthesized audio goes through a fixed chain (high-pass, compression,
//! loudness normalization, resample to mono, MP3 encode) before it is served.
//! The tool that runs the chain sits behind the [`Mastering`] trait.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

mod chain;
mod ffmpeg;

pub use chain::{CompressorSettings, LoudnessTarget, MasteringChain};
pub use ffmpeg::FfmpegMastering;

pub type MasteringResult<T> = Result<T, MasteringError>;

/// Errors raised by a mastering run
#[derive(Debug, Error)]
pub enum MasteringError {
    /// The mastering tool could not be started
    #[error("Failed to launch mastering tool: {0}")]
    Spawn(#[source] std::io::Error),

    /// The mastering tool exited unsuccessfully
    #[error("Mastering failed: {0}")]
    Failed(String),

    #[error("Mastering timed out after {0:?}")]
    Timeout(Duration),

    #[error("Mastering produced no audio")]
    EmptyOutput,
}

/// Capability that applies a [`MasteringChain`] to an audio file
#[async_trait]
pub trait Mastering: Send + Sync {
    /// Read `input`, apply `chain` and write the encoded result to `output`
    async fn master(
        &self,
        input: &Path,
        output: &Path,
        chain: &MasteringChain,
    ) -> MasteringResult<()>;
}
