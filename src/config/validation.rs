use super::ServerConfig;
use crate::core::speakers::normalize_speaker;

/// Validate a fully merged configuration
pub(super) fn validate(config: &ServerConfig) -> Result<(), Box<dyn std::error::Error>> {
    validate_speakers(config)?;
    validate_engine(config)?;
    Ok(())
}

fn validate_speakers(config: &ServerConfig) -> Result<(), Box<dyn std::error::Error>> {
    let speakers = &config.speakers;

    if speakers.references.is_empty() {
        return Err("At least one speaker reference must be configured".into());
    }
    if speakers
        .references
        .keys()
        .any(|speaker| normalize_speaker(speaker).is_empty())
    {
        return Err("Speaker ids must not be empty".into());
    }

    let default_speaker = normalize_speaker(&speakers.default_speaker);
    if !speakers
        .references
        .keys()
        .any(|speaker| normalize_speaker(speaker) == default_speaker)
    {
        return Err(format!(
            "Default speaker '{}' has no configured reference",
            speakers.default_speaker
        )
        .into());
    }

    if speakers.default_language.trim().is_empty() {
        return Err("Default language must not be empty".into());
    }
    Ok(())
}

fn validate_engine(config: &ServerConfig) -> Result<(), Box<dyn std::error::Error>> {
    if config.engine.model_id.trim().is_empty() {
        return Err("Engine model id must not be empty".into());
    }
    if config.engine.warmup_enabled && config.engine.warmup_text.trim().is_empty() {
        return Err("Warm-up text must not be empty when warm-up is enabled".into());
    }
    Ok(())
}
