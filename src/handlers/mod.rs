//! HTTP request handlers
//!
//! - `api` - health check and metrics exposition
//! - `tts` - text-to-speech synthesis

pub mod api;
pub mod tts;

pub use api::{health_check, metrics};
pub use tts::synthesize_speech;
