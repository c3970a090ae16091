use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use super::{ServerConfig, parse_speaker_references_json};
use crate::core::speakers::normalize_speaker;

/// Build a configuration from defaults overlaid with environment variables
pub(super) fn load_from_env() -> Result<ServerConfig, Box<dyn std::error::Error>> {
    let mut config = ServerConfig::default();

    if let Some(host) = var("HOST") {
        config.host = host;
    }
    if let Some(port) = parse_var::<u16>("PORT")? {
        config.port = port;
    }
    if let Some(origins) = var("CORS_ALLOWED_ORIGINS") {
        config.cors_allowed_origins = Some(origins);
    }

    if let Some(program) = var("TTS_PROGRAM") {
        config.engine.program = PathBuf::from(program);
    }
    if let Some(model_id) = var("XTTS_MODEL_ID") {
        config.engine.model_id = model_id;
    }
    if let Some(use_cuda) = parse_bool("TTS_USE_CUDA")? {
        config.engine.use_cuda = use_cuda;
    }
    if let Some(accept) = parse_bool("COQUI_TOS_AGREED")? {
        config.engine.accept_license = accept;
    }
    if let Some(enabled) = parse_bool("WARMUP_ENABLED")? {
        config.engine.warmup_enabled = enabled;
    }
    if let Some(text) = var("WARMUP_TEXT") {
        config.engine.warmup_text = text;
    }

    if let Some(program) = var("FFMPEG_PATH") {
        config.mastering.program = PathBuf::from(program);
    }
    if let Some(seconds) = parse_var::<u64>("MASTERING_TIMEOUT_SECONDS")? {
        config.mastering.timeout_seconds = (seconds > 0).then_some(seconds);
    }

    if let Some(dir) = var("REFERENCE_DIR") {
        config.speakers.reference_dir = PathBuf::from(dir);
    }
    if let Some(speaker) = var("DEFAULT_SPEAKER") {
        config.speakers.default_speaker = normalize_speaker(&speaker);
    }
    if let Some(language) = var("DEFAULT_LANGUAGE") {
        config.speakers.default_language = language.trim().to_lowercase();
    }
    if let Some(json) = var("SPEAKER_REFERENCES_JSON") {
        config.speakers.references = parse_speaker_references_json(&json)?
            .into_iter()
            .map(|(speaker, path)| (normalize_speaker(&speaker), path))
            .collect();
    }

    Ok(config)
}

/// Non-empty value of an environment variable
fn var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_var<T>(key: &str) -> Result<Option<T>, Box<dyn std::error::Error>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match var(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| format!("Invalid {key} value '{raw}': {e}").into()),
        None => Ok(None),
    }
}

fn parse_bool(key: &str) -> Result<Option<bool>, Box<dyn std::error::Error>> {
    match var(key) {
        Some(raw) => match raw.trim().to_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(Some(true)),
            "0" | "false" | "no" | "off" => Ok(Some(false)),
            _ => Err(format!("Invalid {key} value '{raw}': expected true or false").into()),
        },
        None => Ok(None),
    }
}
