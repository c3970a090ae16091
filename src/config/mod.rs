//! Configuration module for the XTTS gateway
//!
//! This module handles server configuration from various sources: .env files, YAML files,
//! and environment variables. Priority: YAML > ENV vars > .env values > defaults.
//!
//! # Modules
//! - `yaml`: YAML configuration file loading
//! - `env`: Environment variable loading
//! - `validation`: Configuration validation logic
//!
//! # Example
//! ```rust,no_run
//! use xtts_gateway::config::ServerConfig;
//! use std::path::PathBuf;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! // Load from environment variables only
//! let config = ServerConfig::from_env()?;
//!
//! // Load from YAML file with environment variable overrides
//! let config_path = PathBuf::from("config.yaml");
//! let config = ServerConfig::from_file(&config_path)?;
//!
//! println!("Server listening on {}", config.address());
//! # Ok(())
//! # }
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

mod env;
mod validation;
mod yaml;

use crate::core::engine::XTTS_V2_MODEL_ID;
use crate::core::mastering::MasteringChain;
use crate::core::speakers::default_references;

/// Sample sentence used for the startup warm-up synthesis
pub const DEFAULT_WARMUP_TEXT: &str = "Hello, this is a short warm-up sentence.";

/// Synthesis engine configuration
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// Python interpreter with Coqui TTS installed (name on PATH or explicit path)
    pub program: PathBuf,
    /// Coqui model identifier
    pub model_id: String,
    /// Run the model on CUDA
    pub use_cuda: bool,
    /// Pre-accept the model licence during engine construction
    pub accept_license: bool,
    /// Construct and exercise the engine in the background at startup
    pub warmup_enabled: bool,
    pub warmup_text: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            program: PathBuf::from("python3"),
            model_id: XTTS_V2_MODEL_ID.to_string(),
            use_cuda: false,
            accept_license: true,
            warmup_enabled: true,
            warmup_text: DEFAULT_WARMUP_TEXT.to_string(),
        }
    }
}

/// Mastering tool configuration
#[derive(Debug, Clone, PartialEq)]
pub struct MasteringConfig {
    /// ffmpeg executable
    pub program: PathBuf,
    /// Kill the mastering process after this many seconds (None = no limit)
    pub timeout_seconds: Option<u64>,
    pub chain: MasteringChain,
}

impl MasteringConfig {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_seconds.map(Duration::from_secs)
    }
}

impl Default for MasteringConfig {
    fn default() -> Self {
        Self {
            program: PathBuf::from("ffmpeg"),
            timeout_seconds: Some(120),
            chain: MasteringChain::default(),
        }
    }
}

/// Speaker selection configuration
#[derive(Debug, Clone, PartialEq)]
pub struct SpeakerConfig {
    /// Base directory for relative reference paths
    pub reference_dir: PathBuf,
    /// Speaker used when a request names none
    pub default_speaker: String,
    /// Language used when a request names none
    pub default_language: String,
    /// Speaker id → reference clip
    pub references: BTreeMap<String, PathBuf>,
}

impl Default for SpeakerConfig {
    fn default() -> Self {
        Self {
            reference_dir: PathBuf::from("dist"),
            default_speaker: "kelly".to_string(),
            default_language: "en".to_string(),
            references: default_references(),
        }
    }
}

/// Server configuration
///
/// Contains all configuration needed to run the gateway:
/// - Server settings (host, port)
/// - CORS policy
/// - Synthesis engine and warm-up settings
/// - Mastering tool and chain
/// - Speaker reference table and request defaults
#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    // Server settings
    pub host: String,
    pub port: u16,

    // Security configuration
    /// CORS allowed origins (comma-separated list or "*" for all)
    /// Default: "*"
    pub cors_allowed_origins: Option<String>,

    pub engine: EngineConfig,
    pub mastering: MasteringConfig,
    pub speakers: SpeakerConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5002,
            cors_allowed_origins: Some("*".to_string()),
            engine: EngineConfig::default(),
            mastering: MasteringConfig::default(),
            speakers: SpeakerConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables
    ///
    /// Unset variables fall back to defaults. The result is validated.
    pub fn from_env() -> Result<Self, Box<dyn std::error::Error>> {
        let config = env::load_from_env()?;
        validation::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a YAML file with environment variable base
    ///
    /// Priority order (highest to lowest):
    /// 1. YAML file values
    /// 2. Environment variables (actual ENV vars override .env values)
    /// 3. .env file values
    /// 4. Default values
    ///
    /// # Errors
    /// Returns an error if:
    /// - The YAML file cannot be read or is malformed
    /// - Environment variables have invalid formats
    /// - Configuration validation fails
    pub fn from_file(path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        // .env is loaded in main.rs before this runs.
        let yaml_config = yaml::YamlConfig::from_file(path)?;

        let mut config = env::load_from_env()?;
        yaml_config.apply(&mut config);

        validation::validate(&config)?;
        Ok(config)
    }

    /// Get the server address as a string
    ///
    /// Returns the address in the format "host:port"
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Reference directory joined to every relative speaker path
    pub fn reference_dir(&self) -> &Path {
        &self.speakers.reference_dir
    }
}

pub(crate) fn parse_speaker_references_json(
    json_str: &str,
) -> Result<BTreeMap<String, PathBuf>, Box<dyn std::error::Error>> {
    let references: BTreeMap<String, PathBuf> = serde_json::from_str(json_str)
        .map_err(|e| format!("Invalid SPEAKER_REFERENCES_JSON format: {e}"))?;
    Ok(references)
}
