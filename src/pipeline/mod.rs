// Inference pipeline
//
// One orchestrator in front of the model: build prompt, generate, extract
// JSON, validate into domain types, fall back to the rule-based generators
// at any failure. Model errors are never surfaced to callers; the source
// tag is the only externally visible difference.

pub mod error;
pub mod extract;
pub mod fallback;
pub mod prompt;
pub mod validate;

use std::sync::Arc;

use crate::domain::{ServoAction, SleepReading, Source};
use crate::models::{run_generation, GenerationParams, ModelRegistry};

pub use error::InferenceError;

/// Request counts outside this range are clamped, not rejected.
pub const MAX_BATCH_SIZE: i64 = 100;

pub struct InferencePipeline {
    registry: Arc<ModelRegistry>,
}

impl InferencePipeline {
    pub fn new(registry: Arc<ModelRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &ModelRegistry {
        &self.registry
    }

    /// Generate one synthetic reading, model-first with rule fallback.
    pub fn generate_example(&self) -> (SleepReading, Source) {
        match self.try_model_reading() {
            Ok(reading) => (reading, Source::Model),
            Err(e) => {
                if !matches!(e, InferenceError::ModelUnavailable) {
                    tracing::warn!("model generation failed, using fallback: {e}");
                }
                (
                    fallback::fallback_reading(&mut rand::thread_rng()),
                    Source::Fallback,
                )
            }
        }
    }

    /// Generate a batch of independent readings.
    ///
    /// The batch source is `Model` when any item came from the model;
    /// item-level mixing is intentional and invisible to callers.
    pub fn generate(&self, count: i64) -> (Vec<SleepReading>, Source) {
        let count = count.clamp(1, MAX_BATCH_SIZE) as usize;
        let mut readings = Vec::with_capacity(count);
        let mut source = Source::Fallback;

        for _ in 0..count {
            let (reading, item_source) = self.generate_example();
            if item_source == Source::Model {
                source = Source::Model;
            }
            readings.push(reading);
        }

        (readings, source)
    }

    /// Predict a servo action for the given reading, model-first with the
    /// deterministic rule as fallback.
    pub fn predict_servo(
        &self,
        reading: &SleepReading,
        examples: &[SleepReading],
    ) -> (ServoAction, Source) {
        match self.try_model_servo(reading, examples) {
            Ok(action) => (action, Source::Model),
            Err(e) => {
                if !matches!(e, InferenceError::ModelUnavailable) {
                    tracing::warn!("servo prediction failed, using fallback: {e}");
                }
                (
                    fallback::fallback_servo(&reading.pressure, reading.sp_o2),
                    Source::Fallback,
                )
            }
        }
    }

    fn try_model_reading(&self) -> Result<SleepReading, InferenceError> {
        let handle = self
            .registry
            .handle()
            .ok_or(InferenceError::ModelUnavailable)?;
        let text = run_generation(
            handle,
            &prompt::synthetic_reading_prompt(),
            &GenerationParams::synthetic_reading(),
        )?;
        let value = extract::extract_json(&text)?;
        validate::validate_reading(&value)
    }

    fn try_model_servo(
        &self,
        reading: &SleepReading,
        examples: &[SleepReading],
    ) -> Result<ServoAction, InferenceError> {
        let handle = self
            .registry
            .handle()
            .ok_or(InferenceError::ModelUnavailable)?;
        let text = run_generation(
            handle,
            &prompt::servo_prompt(reading, examples),
            &GenerationParams::servo_prediction(),
        )?;
        let value = extract::extract_json(&text)?;
        validate::validate_servo(&value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ModelHandle, TextGeneration};
    use anyhow::Result;

    struct CannedBackend {
        reply: String,
    }

    impl TextGeneration for CannedBackend {
        fn generate(&mut self, input_ids: &[u32], _max_new_tokens: usize) -> Result<Vec<u32>> {
            Ok(input_ids.to_vec())
        }

        // Bytes as token IDs, untruncated, so the decoded echo always
        // matches the prompt exactly.
        fn tokenize(&self, text: &str, _max_len: usize) -> Result<Vec<u32>> {
            Ok(text.bytes().map(u32::from).collect())
        }

        fn decode_tokens(&self, tokens: &[u32]) -> Result<String> {
            let bytes: Vec<u8> = tokens.iter().map(|&t| t as u8).collect();
            let mut text = String::from_utf8(bytes)?;
            text.push_str(&self.reply);
            Ok(text)
        }

        fn name(&self) -> &str {
            "canned"
        }
    }

    fn pipeline_with_reply(reply: &str) -> InferencePipeline {
        let handle = ModelHandle::new(
            "test/canned",
            Box::new(CannedBackend {
                reply: format!(" {reply}"),
            }),
        );
        InferencePipeline::new(Arc::new(ModelRegistry::with_handle(handle)))
    }

    fn fallback_only_pipeline() -> InferencePipeline {
        InferencePipeline::new(Arc::new(ModelRegistry::unavailable()))
    }

    fn current_reading() -> SleepReading {
        serde_json::from_value(serde_json::json!({
            "pressure": {
                "head": 25, "neck": 26, "upper_torso": 55, "lower_torso": 56,
                "hips": 58, "thighs": 40, "knees": 40
            },
            "spO2": 91.0
        }))
        .unwrap()
    }

    #[test]
    fn test_model_reading_marked_model_sourced() {
        let pipeline = pipeline_with_reply(
            "{\"pressure\": {\"head\": 25, \"neck\": 27, \"upper_torso\": 50, \
             \"lower_torso\": 52, \"hips\": 55, \"thighs\": 38, \"knees\": 41}, \"spO2\": 96.0}",
        );
        let (reading, source) = pipeline.generate_example();
        assert_eq!(source, Source::Model);
        assert_eq!(reading.pressure.head, 25);
        assert!((reading.sp_o2 - 96.0).abs() < 1e-9);
    }

    #[test]
    fn test_garbage_model_output_falls_back() {
        let pipeline = pipeline_with_reply("sorry, I cannot produce JSON today");
        let (reading, source) = pipeline.generate_example();
        assert_eq!(source, Source::Fallback);
        assert!(reading.pressure.within_bands());
    }

    #[test]
    fn test_unavailable_model_falls_back() {
        let pipeline = fallback_only_pipeline();
        let (reading, source) = pipeline.generate_example();
        assert_eq!(source, Source::Fallback);
        assert!(reading.pressure.within_bands());
        assert!((88.0..=99.0).contains(&reading.sp_o2));
    }

    #[test]
    fn test_batch_count_clamping() {
        let pipeline = fallback_only_pipeline();
        assert_eq!(pipeline.generate(0).0.len(), 1);
        assert_eq!(pipeline.generate(-5).0.len(), 1);
        assert_eq!(pipeline.generate(3).0.len(), 3);
        assert_eq!(pipeline.generate(500).0.len(), MAX_BATCH_SIZE as usize);
    }

    #[test]
    fn test_batch_source_fallback_when_no_model() {
        let pipeline = fallback_only_pipeline();
        let (readings, source) = pipeline.generate(5);
        assert_eq!(source, Source::Fallback);
        assert!(readings.iter().all(|r| r.pressure.within_bands()));
    }

    #[test]
    fn test_model_servo_marked_model_sourced() {
        let pipeline = pipeline_with_reply(
            "{\"left_servo\": 1, \"right_servo\": -1, \"reasoning\": \"core pressure high\"}",
        );
        let (action, source) = pipeline.predict_servo(&current_reading(), &[]);
        assert_eq!(source, Source::Model);
        assert_eq!((action.left_servo, action.right_servo), (1, -1));
        assert_eq!(action.reasoning, "core pressure high");
    }

    #[test]
    fn test_servo_fallback_applies_rule() {
        let pipeline = fallback_only_pipeline();
        let reading = current_reading();
        let (action, source) = pipeline.predict_servo(&reading, &[]);
        assert_eq!(source, Source::Fallback);
        // spO2 91 < 93 and core average > 50 means tilt.
        assert_eq!((action.left_servo, action.right_servo), (1, -1));
        assert!(!action.reasoning.is_empty());
    }
}
