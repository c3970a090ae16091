//! Pre-construction hooks
//!
//! Compatibility shims applied to the engine environment before the engine is
//! built. A hook that fails is skipped; it never blocks construction.

use std::sync::Arc;

use tracing::debug;

use super::base::EngineEnvironment;

/// A compatibility shim run before engine construction
pub trait PreConstructionHook: Send + Sync {
    fn name(&self) -> &str;

    fn apply(&self, environment: &mut EngineEnvironment) -> Result<(), String>;
}

/// Lets the model runtime unpickle the XTTS config object under torch >= 2.6,
/// which defaults `torch.load` to weights-only mode.
#[derive(Debug, Default, Clone, Copy)]
pub struct SafeLoadShim;

impl PreConstructionHook for SafeLoadShim {
    fn name(&self) -> &str {
        "safe-load"
    }

    fn apply(&self, environment: &mut EngineEnvironment) -> Result<(), String> {
        environment.set("TORCH_FORCE_NO_WEIGHTS_ONLY_LOAD", "1");
        Ok(())
    }
}

/// Pre-accepts the XTTS model licence so loading never waits on a prompt
#[derive(Debug, Default, Clone, Copy)]
pub struct LicenseAgreementShim;

impl PreConstructionHook for LicenseAgreementShim {
    fn name(&self) -> &str {
        "license-agreement"
    }

    fn apply(&self, environment: &mut EngineEnvironment) -> Result<(), String> {
        environment.set("COQUI_TOS_AGREED", "1");
        Ok(())
    }
}

/// Run every hook in order and return the resulting environment
pub fn apply_hooks(hooks: &[Arc<dyn PreConstructionHook>]) -> EngineEnvironment {
    let mut environment = EngineEnvironment::new();
    for hook in hooks {
        if let Err(e) = hook.apply(&mut environment) {
            debug!(hook = hook.name(), error = %e, "Skipping pre-construction hook");
        }
    }
    environment
}
