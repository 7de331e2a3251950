// Inference error taxonomy
//
// Every variant here is absorbed by the pipeline's fallback cascade and is
// never surfaced to HTTP callers as an error. Boundary failures (malformed
// requests, task panics) are reported separately by the server layer.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum InferenceError {
    /// No model candidate loaded; the registry is in fallback-only mode.
    #[error("no model is loaded")]
    ModelUnavailable,

    /// Both the high-level and low-level generation paths failed, or the
    /// model produced no text beyond the echoed prompt.
    #[error("generation failed: {0}")]
    Generation(String),

    /// The generated text contained no parsable JSON object.
    #[error("no parsable JSON object in model output: {0}")]
    Parse(String),

    /// The parsed JSON lacked required structure or fields.
    #[error("model output failed validation: {0}")]
    Validation(String),
}
