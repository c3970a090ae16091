//! Synthesis endpoint
//!
//! `POST /api/tts` turns text into a mastered MP3:
//!
//! ```text
//!   validate ─► resolve speaker ─► ensure_ready ─► synthesize (.wav)
//!                                                      │
//!            response ◄── read bytes ◄── master (.mp3) ◄┘
//! ```
//!
//! Synthesis and mastering run in a task of their own that owns both scratch
//! [`TempPath`]s. If the client disconnects, the task still runs to the end
//! and removes the files after the engine and ffmpeg are done with them.

use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempPath;
use tracing::{debug, error, info, warn};

use crate::core::engine::{EngineHandle, synthesize_blocking};
use crate::core::mastering::{Mastering, MasteringChain};
use crate::core::speakers::normalize_speaker;
use crate::errors::app_error::REQUEST_ID_HEADER;
use crate::errors::{AppError, AppResult};
use crate::metrics::ERRORS_TOTAL;
use crate::state::AppState;

const AUDIO_MPEG: &str = "audio/mpeg";

/// Synthesis request body
///
/// `speaker_id` and `language_id` are accepted as aliases.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TtsRequest {
    pub text: Option<String>,
    pub speaker: Option<String>,
    pub speaker_id: Option<String>,
    pub language: Option<String>,
    pub language_id: Option<String>,
}

impl TtsRequest {
    /// Requested speaker, falling back to `default` (normalized)
    pub fn speaker_or(&self, default: &str) -> String {
        first_present(&[&self.speaker, &self.speaker_id])
            .map(normalize_speaker)
            .unwrap_or_else(|| normalize_speaker(default))
    }

    /// Requested language, falling back to `default` (normalized)
    pub fn language_or(&self, default: &str) -> String {
        first_present(&[&self.language, &self.language_id])
            .unwrap_or(default)
            .trim()
            .to_lowercase()
    }

    fn text(&self) -> Option<&str> {
        self.text
            .as_deref()
            .map(str::trim)
            .filter(|text| !text.is_empty())
    }
}

fn first_present<'a>(candidates: &[&'a Option<String>]) -> Option<&'a str> {
    candidates
        .iter()
        .copied()
        .filter_map(|value| value.as_deref())
        .find(|value| !value.trim().is_empty())
}

/// Short correlation token for one request
pub fn new_request_id() -> String {
    let mut id = uuid::Uuid::new_v4().simple().to_string();
    id.truncate(8);
    id
}

/// Synthesize speech and return it as an MP3 attachment
pub async fn synthesize_speech(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<TtsRequest>, JsonRejection>,
) -> Response {
    let request_id = new_request_id();
    let _request = state.metrics.begin_request();

    let outcome = match read_payload(payload, &request_id) {
        Ok(request) => run(&state, &request, &request_id).await,
        Err(e) => Err(e),
    };

    match outcome {
        Ok((speaker, audio)) => {
            state.metrics.increment_by_speaker(&speaker);
            info!(
                request_id = %request_id,
                speaker = %speaker,
                bytes = audio.len(),
                "Synthesis complete"
            );
            audio_response(&speaker, audio, &request_id)
        }
        Err(e) => {
            state.metrics.increment(ERRORS_TOTAL, 1);
            match &e {
                AppError::Validation(_) => {
                    warn!(request_id = %request_id, error = %e, "Rejected synthesis request")
                }
                _ => error!(
                    request_id = %request_id,
                    kind = e.kind(),
                    error = %e,
                    "Synthesis request failed"
                ),
            }
            e.into_response_with_id(&request_id)
        }
    }
}

/// Body as a request; unreadable bodies count as empty
///
/// Well-formed JSON of the wrong shape is rejected so the client sees which
/// field is wrong instead of a missing-text error.
fn read_payload(
    payload: Result<Json<TtsRequest>, JsonRejection>,
    request_id: &str,
) -> AppResult<TtsRequest> {
    match payload {
        Ok(Json(request)) => Ok(request),
        Err(JsonRejection::JsonDataError(e)) => Err(AppError::Validation(format!(
            "Invalid request body: {}",
            e.body_text()
        ))),
        Err(rejection) => {
            debug!(request_id = %request_id, error = %rejection, "Unreadable request body");
            Ok(TtsRequest::default())
        }
    }
}

async fn run(
    state: &AppState,
    request: &TtsRequest,
    request_id: &str,
) -> AppResult<(String, Vec<u8>)> {
    let text = request
        .text()
        .ok_or_else(|| AppError::Validation("No text provided".to_string()))?;
    let speaker = request.speaker_or(&state.config.speakers.default_speaker);
    let language = request.language_or(&state.config.speakers.default_language);

    let reference = state.speakers.resolve(&speaker)?;
    debug!(
        request_id = %request_id,
        speaker = %speaker,
        language = %language,
        reference = %reference.display(),
        "Resolved speaker reference"
    );

    let engine = state.engine.ensure_ready().await?;

    let job = RenderJob {
        engine,
        mastering: Arc::clone(&state.mastering),
        chain: state.config.mastering.chain.clone(),
        text: text.to_string(),
        reference,
        language,
    };
    let audio = tokio::spawn(job.render())
        .await
        .map_err(|e| AppError::Internal(format!("synthesis task failed: {e}")))??;
    Ok((speaker, audio))
}

/// Everything needed to go from text to mastered bytes, owned
struct RenderJob {
    engine: EngineHandle,
    mastering: Arc<dyn Mastering>,
    chain: MasteringChain,
    text: String,
    reference: PathBuf,
    language: String,
}

impl RenderJob {
    async fn render(self) -> AppResult<Vec<u8>> {
        let raw = scratch_file(".wav")?;
        let mastered = scratch_file(".mp3")?;

        let raw = synthesize_blocking(
            self.engine,
            &self.text,
            &self.reference,
            &self.language,
            raw,
        )
        .await?;
        self.mastering.master(&raw, &mastered, &self.chain).await?;

        Ok(tokio::fs::read(&mastered).await?)
    }
}

fn scratch_file(suffix: &str) -> AppResult<TempPath> {
    let file = tempfile::Builder::new()
        .prefix("xtts-")
        .suffix(suffix)
        .tempfile()?;
    Ok(file.into_temp_path())
}

fn audio_response(speaker: &str, audio: Vec<u8>, request_id: &str) -> Response {
    let mut headers = HeaderMap::new();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(AUDIO_MPEG));

    let disposition = format!("attachment; filename=\"{speaker}_speech.mp3\"");
    let disposition = HeaderValue::from_str(&disposition)
        .unwrap_or_else(|_| HeaderValue::from_static("attachment"));
    headers.insert(header::CONTENT_DISPOSITION, disposition);

    if let Ok(value) = HeaderValue::from_str(request_id) {
        headers.insert(REQUEST_ID_HEADER, value);
    }

    (StatusCode::OK, headers, audio).into_response()
}
