// Backend loaders
//
// One loader per backend family. Only the candle/Qwen loader exists
// today; the dispatch stays here so another family can slot in without
// touching the registry.

use anyhow::Result;

use super::generation::ModelHandle;

#[cfg(feature = "candle")]
pub mod qwen;

/// Options threaded from configuration into every loader.
#[derive(Debug, Clone, Default)]
pub struct LoaderOptions {
    /// Skip accelerator probing and run on the CPU.
    pub force_cpu: bool,
}

/// Load a single model candidate by Hub identifier.
pub fn load_candidate(model_id: &str, options: &LoaderOptions) -> Result<ModelHandle> {
    #[cfg(feature = "candle")]
    {
        qwen::load(model_id, options)
    }
    #[cfg(not(feature = "candle"))]
    {
        let _ = (model_id, options);
        anyhow::bail!("built without the candle feature, no local inference backend")
    }
}
