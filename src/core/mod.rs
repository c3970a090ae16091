pub mod engine;
pub mod mastering;
pub mod speakers;

// Re-export commonly used types for convenience
pub use engine::{
    CoquiLoader, EngineEnvironment, EngineError, EngineHandle, EngineLifecycle, EngineLoader,
    EngineResult, PreConstructionHook, SynthesisEngine, WarmUpSample,
};
pub use mastering::{FfmpegMastering, Mastering, MasteringChain, MasteringError, MasteringResult};
pub use speakers::SpeakerTable;
