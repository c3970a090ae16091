use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use super::error::EngineResult;

/// A constructed text-to-speech engine
///
/// Implementations are blocking; callers run them on the blocking thread pool.
/// One engine instance is shared by every request, so `synthesize` must be
/// safe to call concurrently.
pub trait SynthesisEngine: Send + Sync {
    /// Synthesize `text` in `language`, cloning the voice in `reference`,
    /// and write the raw audio to `output`.
    fn synthesize(
        &self,
        text: &str,
        reference: &Path,
        language: &str,
        output: &Path,
    ) -> EngineResult<()>;
}

/// Shared engine handle
pub type EngineHandle = Arc<dyn SynthesisEngine>;

/// Builds the engine; called at most once per successful construction
pub trait EngineLoader: Send + Sync {
    /// Name of the engine, reported by `/health`
    fn engine_name(&self) -> &str;

    /// Construct the engine. Blocking.
    fn load(&self, environment: &EngineEnvironment) -> EngineResult<EngineHandle>;
}

/// Environment prepared for the engine by pre-construction hooks
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EngineEnvironment {
    vars: BTreeMap<String, String>,
}

impl EngineEnvironment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.vars.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.vars.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}
