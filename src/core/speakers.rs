//! Speaker reference table
//!
//! Maps a speaker id to the reference clip XTTS clones the voice from. Keys
//! are case-insensitive. The table is built once at startup; whether a clip
//! actually exists is only checked when a request needs it.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use crate::errors::{AppError, AppResult};

/// Reference clips shipped with the service, relative to the reference dir
pub const DEFAULT_REFERENCES: [(&str, &str); 2] = [
    ("kelly", "reference_kelly.wav"),
    ("ken", "reference_ken_mono16k.wav"),
];

/// Immutable speaker → reference path map
#[derive(Debug, Clone, Default)]
pub struct SpeakerTable {
    references: HashMap<String, PathBuf>,
}

impl SpeakerTable {
    /// Build a table from configured references
    ///
    /// Relative paths are resolved against `reference_dir`.
    pub fn new(reference_dir: &Path, references: &BTreeMap<String, PathBuf>) -> Self {
        let references = references
            .iter()
            .map(|(speaker, path)| {
                let path = if path.is_absolute() {
                    path.clone()
                } else {
                    reference_dir.join(path)
                };
                (normalize_speaker(speaker), path)
            })
            .collect();
        Self { references }
    }

    /// Path registered for `speaker`, without touching the filesystem
    pub fn get(&self, speaker: &str) -> Option<&Path> {
        self.references
            .get(&normalize_speaker(speaker))
            .map(PathBuf::as_path)
    }

    /// Sorted speaker ids
    pub fn speakers(&self) -> Vec<&str> {
        let mut speakers: Vec<&str> = self.references.keys().map(String::as_str).collect();
        speakers.sort_unstable();
        speakers
    }

    /// Resolve the reference clip for `speaker`
    ///
    /// Fails when the speaker is unknown or its clip is missing on disk.
    pub fn resolve(&self, speaker: &str) -> AppResult<PathBuf> {
        match self.get(speaker) {
            Some(path) if path.is_file() => Ok(path.to_path_buf()),
            _ => Err(AppError::ResourceNotFound(format!(
                "reference wav not found for {speaker}"
            ))),
        }
    }
}

/// Default speaker table as configured relative paths
pub fn default_references() -> BTreeMap<String, PathBuf> {
    DEFAULT_REFERENCES
        .iter()
        .map(|(speaker, file)| (speaker.to_string(), PathBuf::from(file)))
        .collect()
}

/// Canonical form of a speaker id
pub fn normalize_speaker(speaker: &str) -> String {
    speaker.trim().to_lowercase()
}
