use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use super::ServerConfig;
use crate::core::mastering::MasteringChain;
use crate::core::speakers::normalize_speaker;

/// Complete YAML configuration structure
///
/// All fields are optional to allow partial configuration. Values present
/// here override the environment.
///
/// # Example YAML structure
/// ```yaml
/// server:
///   host: "0.0.0.0"
///   port: 5002
///
/// security:
///   cors_allowed_origins: "*"
///
/// engine:
///   program: "python3"
///   model_id: "tts_models/multilingual/multi-dataset/xtts_v2"
///   use_cuda: false
///   accept_license: true
///   warmup_enabled: true
///   warmup_text: "Hello, this is a short warm-up sentence."
///
/// mastering:
///   program: "ffmpeg"
///   timeout_seconds: 120
///   chain:
///     highpass_hz: 80
///     compressor:
///       threshold_db: -20
///       ratio: 2
///       attack_ms: 5
///       release_ms: 120
///     loudness:
///       integrated_lufs: -23
///       range_lu: 7
///       true_peak_dbtp: -1.0
///     sample_rate: 48000
///     channels: 1
///     codec: "libmp3lame"
///     quality: 3
///
/// speakers:
///   reference_dir: "dist"
///   default_speaker: "kelly"
///   default_language: "en"
///   references:
///     kelly: "reference_kelly.wav"
///     ken: "reference_ken_mono16k.wav"
/// ```
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct YamlConfig {
    pub server: Option<ServerYaml>,
    pub security: Option<SecurityYaml>,
    pub engine: Option<EngineYaml>,
    pub mastering: Option<MasteringYaml>,
    pub speakers: Option<SpeakersYaml>,
}

/// Server configuration from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct ServerYaml {
    pub host: Option<String>,
    pub port: Option<u16>,
}

/// Security configuration from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct SecurityYaml {
    pub cors_allowed_origins: Option<String>,
}

/// Engine configuration from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct EngineYaml {
    pub program: Option<String>,
    pub model_id: Option<String>,
    pub use_cuda: Option<bool>,
    pub accept_license: Option<bool>,
    pub warmup_enabled: Option<bool>,
    pub warmup_text: Option<String>,
}

/// Mastering configuration from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct MasteringYaml {
    pub program: Option<String>,
    /// 0 disables the timeout
    pub timeout_seconds: Option<u64>,
    pub chain: Option<MasteringChain>,
}

/// Speaker configuration from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct SpeakersYaml {
    pub reference_dir: Option<String>,
    pub default_speaker: Option<String>,
    pub default_language: Option<String>,
    /// Replaces the built-in table when present
    pub references: Option<BTreeMap<String, String>>,
}

impl YamlConfig {
    /// Load and parse a YAML configuration file
    pub fn from_file(path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config file {}: {}", path.display(), e))?;
        let config: YamlConfig = serde_yaml::from_str(&contents)
            .map_err(|e| format!("Failed to parse config file {}: {}", path.display(), e))?;
        Ok(config)
    }

    /// Apply every value present in the YAML on top of `config`
    pub fn apply(self, config: &mut ServerConfig) {
        if let Some(server) = self.server {
            if let Some(host) = server.host {
                config.host = host;
            }
            if let Some(port) = server.port {
                config.port = port;
            }
        }

        if let Some(security) = self.security {
            if let Some(origins) = security.cors_allowed_origins {
                config.cors_allowed_origins = Some(origins);
            }
        }

        if let Some(engine) = self.engine {
            if let Some(program) = engine.program {
                config.engine.program = PathBuf::from(program);
            }
            if let Some(model_id) = engine.model_id {
                config.engine.model_id = model_id;
            }
            if let Some(use_cuda) = engine.use_cuda {
                config.engine.use_cuda = use_cuda;
            }
            if let Some(accept) = engine.accept_license {
                config.engine.accept_license = accept;
            }
            if let Some(enabled) = engine.warmup_enabled {
                config.engine.warmup_enabled = enabled;
            }
            if let Some(text) = engine.warmup_text {
                config.engine.warmup_text = text;
            }
        }

        if let Some(mastering) = self.mastering {
            if let Some(program) = mastering.program {
                config.mastering.program = PathBuf::from(program);
            }
            if let Some(seconds) = mastering.timeout_seconds {
                config.mastering.timeout_seconds = (seconds > 0).then_some(seconds);
            }
            if let Some(chain) = mastering.chain {
                config.mastering.chain = chain;
            }
        }

        if let Some(speakers) = self.speakers {
            if let Some(dir) = speakers.reference_dir {
                config.speakers.reference_dir = PathBuf::from(dir);
            }
            if let Some(speaker) = speakers.default_speaker {
                config.speakers.default_speaker = normalize_speaker(&speaker);
            }
            if let Some(language) = speakers.default_language {
                config.speakers.default_language = language.trim().to_lowercase();
            }
            if let Some(references) = speakers.references {
                config.speakers.references = references
                    .into_iter()
                    .map(|(speaker, path)| (normalize_speaker(&speaker), PathBuf::from(path)))
                    .collect();
            }
        }
    }
}
