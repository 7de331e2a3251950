// Model loading and text generation

pub mod generation;
pub mod loaders;
pub mod registry;

pub use generation::{
    run_generation, GenerationParams, ModelHandle, PromptCompletion, SharedBackend, TextGeneration,
};
pub use loaders::LoaderOptions;
pub use registry::{LoadAttempt, LoadOutcome, ModelRegistry};
