// Text generation abstraction and the dual-path executor
//
// `TextGeneration` is the low-level token interface every backend
// implements; `PromptCompletion` is the high-level convenience wrapper
// (sampling, one sequence, prompt echoed back) that may be absent when
// wrapping failed at load time. The executor tries the high-level path
// first and degrades to tokenize/generate/decode before giving up.

use std::sync::{Arc, Mutex};

use anyhow::Result;

use crate::pipeline::error::InferenceError;

/// Sampling and length options recognized by the generation paths.
#[derive(Debug, Clone)]
pub struct GenerationParams {
    /// New tokens to generate beyond the prompt.
    pub max_new_tokens: usize,
    /// Prompt tokens are truncated to this length before generation.
    pub max_input_tokens: usize,
    pub temperature: f64,
    /// When false, both paths use greedy decoding.
    pub sample: bool,
    pub top_k: usize,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            max_new_tokens: 180,
            max_input_tokens: 512,
            temperature: 0.7,
            sample: true,
            top_k: 10,
        }
    }
}

impl GenerationParams {
    /// Settings for synthetic-reading generation.
    pub fn synthetic_reading() -> Self {
        Self::default()
    }

    /// Settings for servo prediction: lower temperature, shorter output.
    pub fn servo_prediction() -> Self {
        Self {
            max_new_tokens: 150,
            temperature: 0.3,
            ..Self::default()
        }
    }
}

/// Low-level token interface over a loaded model + tokenizer pair.
pub trait TextGeneration: Send {
    /// Greedy generation; returns prompt tokens plus new tokens.
    fn generate(&mut self, input_ids: &[u32], max_new_tokens: usize) -> Result<Vec<u32>>;

    /// Sampled generation with the given parameters. Backends without a
    /// sampler fall back to greedy decoding.
    fn generate_sampled(
        &mut self,
        input_ids: &[u32],
        params: &GenerationParams,
    ) -> Result<Vec<u32>> {
        self.generate(input_ids, params.max_new_tokens)
    }

    /// Encode text, truncating to at most `max_len` tokens.
    fn tokenize(&self, text: &str, max_len: usize) -> Result<Vec<u32>>;

    /// Decode token IDs, discarding special tokens.
    fn decode_tokens(&self, tokens: &[u32]) -> Result<String>;

    fn name(&self) -> &str;
}

/// High-level completion: prompt in, full generated text (prompt echo
/// included) out, one sampled sequence.
pub trait PromptCompletion: Send {
    fn complete(&mut self, prompt: &str, params: &GenerationParams) -> Result<String>;
}

pub type SharedBackend = Arc<Mutex<Box<dyn TextGeneration>>>;

/// Active model: identifier, low-level backend, and the optional
/// high-level pipeline wrapper. Built once at startup, read-only
/// thereafter; generation serializes through the inner mutexes.
pub struct ModelHandle {
    model_id: String,
    backend: SharedBackend,
    pipeline: Option<Mutex<Box<dyn PromptCompletion>>>,
}

impl ModelHandle {
    pub fn new(model_id: impl Into<String>, backend: Box<dyn TextGeneration>) -> Self {
        Self {
            model_id: model_id.into(),
            backend: Arc::new(Mutex::new(backend)),
            pipeline: None,
        }
    }

    pub fn with_pipeline(mut self, pipeline: Box<dyn PromptCompletion>) -> Self {
        self.pipeline = Some(Mutex::new(pipeline));
        self
    }

    pub fn from_parts(
        model_id: impl Into<String>,
        backend: SharedBackend,
        pipeline: Option<Box<dyn PromptCompletion>>,
    ) -> Self {
        Self {
            model_id: model_id.into(),
            backend,
            pipeline: pipeline.map(Mutex::new),
        }
    }

    pub fn model_id(&self) -> &str {
        &self.model_id
    }

    /// Whether the high-level completion path is available.
    pub fn has_pipeline(&self) -> bool {
        self.pipeline.is_some()
    }

    pub fn backend(&self) -> &SharedBackend {
        &self.backend
    }
}

impl std::fmt::Debug for ModelHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelHandle")
            .field("model_id", &self.model_id)
            .field("has_pipeline", &self.has_pipeline())
            .finish()
    }
}

/// Run one generation call against the handle.
///
/// Tries the high-level pipeline first; on absence or failure, the
/// low-level tokenize/generate/decode path with the same sampling
/// parameters. Both failing yields `InferenceError::Generation` — the
/// caller treats that as a fallback signal, never as fatal.
pub fn run_generation(
    handle: &ModelHandle,
    prompt: &str,
    params: &GenerationParams,
) -> Result<String, InferenceError> {
    if let Some(pipeline) = &handle.pipeline {
        match pipeline.lock() {
            Ok(mut p) => match p.complete(prompt, params) {
                Ok(text) => {
                    let response = strip_prompt(&text, prompt);
                    if !response.is_empty() {
                        return Ok(response.to_string());
                    }
                    tracing::warn!("pipeline returned empty result, using direct model");
                }
                Err(e) => {
                    tracing::warn!("pipeline generation failed, using direct model: {e:#}");
                }
            },
            Err(_) => {
                tracing::warn!("pipeline lock poisoned, using direct model");
            }
        }
    }

    let mut backend = handle
        .backend
        .lock()
        .map_err(|_| InferenceError::Generation("generation lock poisoned".to_string()))?;

    let input_ids = backend
        .tokenize(prompt, params.max_input_tokens)
        .map_err(|e| InferenceError::Generation(format!("tokenization failed: {e:#}")))?;

    let output_ids = if params.sample {
        backend.generate_sampled(&input_ids, params)
    } else {
        backend.generate(&input_ids, params.max_new_tokens)
    }
    .map_err(|e| InferenceError::Generation(format!("token generation failed: {e:#}")))?;

    let text = backend
        .decode_tokens(&output_ids)
        .map_err(|e| InferenceError::Generation(format!("decoding failed: {e:#}")))?;

    let response = strip_prompt(&text, prompt);
    if response.is_empty() {
        return Err(InferenceError::Generation(
            "model produced no text beyond the prompt".to_string(),
        ));
    }
    Ok(response.to_string())
}

/// Remove the echoed prompt prefix from generated text.
///
/// Decoding can normalize whitespace so an exact prefix match is not
/// guaranteed; when it fails, cut at the prompt's byte length instead
/// (aligned back to a char boundary).
fn strip_prompt<'a>(text: &'a str, prompt: &str) -> &'a str {
    let rest = text.strip_prefix(prompt).unwrap_or_else(|| {
        let mut cut = prompt.len().min(text.len());
        while cut > 0 && !text.is_char_boundary(cut) {
            cut -= 1;
        }
        &text[cut..]
    });
    rest.trim()
}
