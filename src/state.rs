use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::config::ServerConfig;
use crate::core::engine::{
    CoquiLoader, EngineLifecycle, EngineLoader, LicenseAgreementShim, SafeLoadShim, WarmUpSample,
};
use crate::core::mastering::{FfmpegMastering, Mastering};
use crate::core::speakers::SpeakerTable;
use crate::metrics::Metrics;

/// Shared application state handed to every handler
pub struct AppState {
    pub config: ServerConfig,
    pub metrics: Arc<Metrics>,
    pub engine: Arc<EngineLifecycle>,
    pub mastering: Arc<dyn Mastering>,
    pub speakers: SpeakerTable,
}

impl AppState {
    /// Build state backed by the Coqui worker engine and ffmpeg
    pub fn new(config: ServerConfig) -> Arc<Self> {
        let loader = Arc::new(CoquiLoader::new(
            config.engine.program.clone(),
            config.engine.model_id.clone(),
            config.engine.use_cuda,
        ));
        let mastering = Arc::new(
            FfmpegMastering::new(config.mastering.program.clone())
                .with_timeout(config.mastering.timeout()),
        );
        Self::with_components(config, loader, mastering)
    }

    /// Build state around an arbitrary engine loader and mastering tool
    pub fn with_components(
        config: ServerConfig,
        loader: Arc<dyn EngineLoader>,
        mastering: Arc<dyn Mastering>,
    ) -> Arc<Self> {
        let mut engine = EngineLifecycle::new(loader).with_hook(Arc::new(SafeLoadShim));
        if config.engine.accept_license {
            engine = engine.with_hook(Arc::new(LicenseAgreementShim));
        }

        let speakers = SpeakerTable::new(config.reference_dir(), &config.speakers.references);
        info!(speakers = ?speakers.speakers(), "Speaker table loaded");

        Arc::new(Self {
            config,
            metrics: Arc::new(Metrics::new()),
            engine: Arc::new(engine),
            mastering,
            speakers,
        })
    }

    /// Spawn the background warm-up task
    ///
    /// Resolves to whether warm-up succeeded. A missing default reference
    /// still constructs the engine so the first request does not pay for it.
    pub fn spawn_warm_up(self: &Arc<Self>) -> JoinHandle<bool> {
        let state = Arc::clone(self);
        tokio::spawn(async move {
            let speaker = &state.config.speakers.default_speaker;
            let reference = match state.speakers.resolve(speaker) {
                Ok(path) => path,
                Err(e) => {
                    warn!(speaker = %speaker, error = %e, "Warm-up skipped synthesis");
                    if let Err(e) = state.engine.ensure_ready().await {
                        warn!(error = %e, "Warm-up could not construct the engine");
                    }
                    return false;
                }
            };

            let sample = WarmUpSample {
                text: state.config.engine.warmup_text.clone(),
                reference,
                language: state.config.speakers.default_language.clone(),
            };
            state.engine.warm_up(&state.metrics, &sample).await
        })
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("address", &self.config.address())
            .field("engine", &self.engine)
            .field("speakers", &self.speakers.speakers())
            .finish()
    }
}
