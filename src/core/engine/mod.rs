//! Synthesis engine abstraction and lifecycle
//!
//! - `base` - the `SynthesisEngine` / `EngineLoader` traits
//! - `hooks` - pre-construction compatibility shims
//! - `lifecycle` - lazy one-shot construction and warm-up
//! - `coqui` - XTTS v2 through a resident Coqui worker process

mod base;
pub mod coqui;
mod error;
mod hooks;
mod lifecycle;

pub use base::{EngineEnvironment, EngineHandle, EngineLoader, SynthesisEngine};
pub use coqui::{CoquiLoader, CoquiWorkerEngine, XTTS_ENGINE_NAME, XTTS_V2_MODEL_ID};
pub use error::{EngineError, EngineResult};
pub use hooks::{LicenseAgreementShim, PreConstructionHook, SafeLoadShim, apply_hooks};
pub use lifecycle::{EngineLifecycle, WarmUpSample, synthesize_blocking};
