// Integration tests for the inference pipeline
//
// Exercises the full model-first cascade with mock backends: canned JSON
// replies, prose-only replies, and a backend that dies mid-batch. The
// invariant under test everywhere: callers always get a structurally
// valid result, only the source tag changes.

use std::sync::Arc;

use somnia::domain::{SleepReading, Source, Zone};
use somnia::models::{ModelHandle, ModelRegistry, TextGeneration};
use somnia::pipeline::InferencePipeline;

struct ScriptedBackend {
    // One reply per generate call, then errors.
    replies: Vec<String>,
    calls: usize,
}

impl ScriptedBackend {
    fn repeating(reply: &str, times: usize) -> Self {
        Self {
            replies: vec![reply.to_string(); times],
            calls: 0,
        }
    }
}

impl TextGeneration for ScriptedBackend {
    fn generate(&mut self, input_ids: &[u32], _max_new_tokens: usize) -> anyhow::Result<Vec<u32>> {
        if self.calls >= self.replies.len() {
            anyhow::bail!("backend exhausted");
        }
        self.calls += 1;
        Ok(input_ids.to_vec())
    }

    fn tokenize(&self, text: &str, _max_len: usize) -> anyhow::Result<Vec<u32>> {
        Ok(text.bytes().map(u32::from).collect())
    }

    fn decode_tokens(&self, tokens: &[u32]) -> anyhow::Result<String> {
        let bytes: Vec<u8> = tokens.iter().map(|&t| t as u8).collect();
        let mut text = String::from_utf8(bytes)?;
        // calls was already advanced by generate.
        text.push(' ');
        text.push_str(&self.replies[self.calls - 1]);
        Ok(text)
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

const VALID_READING_JSON: &str = "{\"pressure\": {\"head\": 25, \"neck\": 27, \
    \"upper_torso\": 50, \"lower_torso\": 52, \"hips\": 55, \"thighs\": 38, \
    \"knees\": 41}, \"spO2\": 96.0}";

fn pipeline_with(backend: ScriptedBackend) -> InferencePipeline {
    let handle = ModelHandle::new("test/scripted", Box::new(backend));
    InferencePipeline::new(Arc::new(ModelRegistry::with_handle(handle)))
}

fn fallback_only() -> InferencePipeline {
    InferencePipeline::new(Arc::new(ModelRegistry::unavailable()))
}

fn assert_reading_valid(reading: &SleepReading) {
    assert!(reading.pressure.within_bands(), "{:?}", reading.pressure);
    assert!(
        (88.0..=100.0).contains(&reading.sp_o2),
        "spO2 {}",
        reading.sp_o2
    );
}

#[test]
fn test_model_batch_all_valid_and_model_sourced() {
    let pipeline = pipeline_with(ScriptedBackend::repeating(VALID_READING_JSON, 4));
    let (readings, source) = pipeline.generate(4);
    assert_eq!(source, Source::Model);
    assert_eq!(readings.len(), 4);
    for reading in &readings {
        assert_reading_valid(reading);
        assert_eq!(reading.pressure.hips, 55);
    }
}

#[test]
fn test_backend_dying_mid_batch_mixes_sources() {
    // Two model replies, then errors; the rest of the batch is filled by
    // the fallback and the batch is still tagged model.
    let pipeline = pipeline_with(ScriptedBackend::repeating(VALID_READING_JSON, 2));
    let (readings, source) = pipeline.generate(6);
    assert_eq!(source, Source::Model);
    assert_eq!(readings.len(), 6);
    for reading in &readings {
        assert_reading_valid(reading);
    }
}

#[test]
fn test_prose_only_model_falls_back_per_item() {
    let pipeline = pipeline_with(ScriptedBackend::repeating(
        "I think the sleeper is doing fine, no JSON from me",
        10,
    ));
    let (readings, source) = pipeline.generate(3);
    assert_eq!(source, Source::Fallback);
    assert_eq!(readings.len(), 3);
    for reading in &readings {
        assert_reading_valid(reading);
    }
}

#[test]
fn test_fallback_only_batch_structure() {
    let pipeline = fallback_only();
    let (readings, source) = pipeline.generate(10);
    assert_eq!(source, Source::Fallback);
    assert_eq!(readings.len(), 10);
    for reading in &readings {
        assert_reading_valid(reading);
        // Fallback saturation stays in its own narrower range.
        assert!((88.0..=99.0).contains(&reading.sp_o2));
    }
}

#[test]
fn test_count_clamping_bounds() {
    let pipeline = fallback_only();
    assert_eq!(pipeline.generate(i64::MIN).0.len(), 1);
    assert_eq!(pipeline.generate(100).0.len(), 100);
    assert_eq!(pipeline.generate(i64::MAX).0.len(), 100);
}

#[test]
fn test_model_reading_values_clamped_into_bands() {
    // Out-of-band model output is clamped, not rejected.
    let reply = "{\"pressure\": {\"head\": 900, \"neck\": 1, \"upper_torso\": 50, \
        \"lower_torso\": 52, \"hips\": 100, \"thighs\": 38, \"knees\": 41}, \"spO2\": 120}";
    let pipeline = pipeline_with(ScriptedBackend::repeating(reply, 1));
    let (reading, source) = pipeline.generate_example();
    assert_eq!(source, Source::Model);
    assert_eq!(reading.pressure.head, Zone::Head.clamp_band().1);
    assert_eq!(reading.pressure.neck, Zone::Neck.clamp_band().0);
    assert_eq!(reading.pressure.hips, Zone::Hips.clamp_band().1);
    assert!((reading.sp_o2 - 100.0).abs() < 1e-9);
}

#[test]
fn test_servo_prediction_with_few_shot_examples() {
    let reply = "{\"left_servo\": 0, \"right_servo\": 0, \"reasoning\": \"stable\"}";
    let pipeline = pipeline_with(ScriptedBackend::repeating(reply, 1));

    let current: SleepReading = serde_json::from_str(VALID_READING_JSON).unwrap();
    let history: Vec<SleepReading> = (0..7)
        .map(|_| serde_json::from_str(VALID_READING_JSON).unwrap())
        .collect();

    let (action, source) = pipeline.predict_servo(&current, &history);
    assert_eq!(source, Source::Model);
    assert_eq!((action.left_servo, action.right_servo), (0, 0));
    assert_eq!(action.reasoning, "stable");
}

#[test]
fn test_servo_fallback_rule_both_branches() {
    let pipeline = fallback_only();

    let tilt: SleepReading = serde_json::from_str(
        "{\"pressure\": {\"head\": 25, \"neck\": 26, \"upper_torso\": 56, \
         \"lower_torso\": 57, \"hips\": 58, \"thighs\": 40, \"knees\": 40}, \"spO2\": 90.0}",
    )
    .unwrap();
    let (action, source) = pipeline.predict_servo(&tilt, &[]);
    assert_eq!(source, Source::Fallback);
    assert_eq!((action.left_servo, action.right_servo), (1, -1));

    let hold: SleepReading = serde_json::from_str(VALID_READING_JSON).unwrap();
    let (action, _) = pipeline.predict_servo(&hold, &[]);
    assert_eq!((action.left_servo, action.right_servo), (0, 0));
}
