// Domain validation for model-extracted JSON
//
// Loosely-typed JSON from the model is validated into the typed domain
// entities here; nothing untyped crosses the pipeline boundary. Missing
// structure rejects (and triggers the fallback), out-of-range numerics are
// clamped rather than rejected.

use serde_json::Value;

use super::error::InferenceError;
use crate::domain::{BodyZonePressures, ServoAction, SleepReading, Zone};

/// Reasoning substituted when the model omits one.
pub const DEFAULT_SERVO_REASONING: &str = "model-based decision";

/// SpO2 clamp range applied to model-derived readings.
pub const MODEL_SPO2_RANGE: (f64, f64) = (90.0, 100.0);

/// Validate and clamp a model-emitted sensor reading.
///
/// Requires a `pressure` object containing all seven zone keys and an
/// `spO2` field. Zone values are coerced to integers and clamped into
/// their bands; spO2 is clamped into [90, 100].
pub fn validate_reading(value: &Value) -> Result<SleepReading, InferenceError> {
    let pressure = value
        .get("pressure")
        .and_then(Value::as_object)
        .ok_or_else(|| InferenceError::Validation("missing 'pressure' object".to_string()))?;

    let mut clamped = [0i64; 7];
    for (i, zone) in Zone::ALL.iter().enumerate() {
        let raw = pressure
            .get(zone.key())
            .and_then(coerce_f64)
            .ok_or_else(|| {
                InferenceError::Validation(format!(
                    "missing or non-numeric zone '{}'",
                    zone.key()
                ))
            })?;
        clamped[i] = zone.clamp(raw);
    }

    let sp_o2 = value
        .get("spO2")
        .and_then(coerce_f64)
        .ok_or_else(|| InferenceError::Validation("missing or non-numeric 'spO2'".to_string()))?;

    let (lo, hi) = MODEL_SPO2_RANGE;
    Ok(SleepReading {
        pressure: BodyZonePressures {
            head: clamped[0],
            neck: clamped[1],
            upper_torso: clamped[2],
            lower_torso: clamped[3],
            hips: clamped[4],
            thighs: clamped[5],
            knees: clamped[6],
        },
        sp_o2: sp_o2.clamp(lo, hi),
    })
}

/// Validate a model-emitted servo action.
///
/// `left_servo` and `right_servo` are required and coerced to integers; no
/// numeric clamping is applied (the prompt keeps the domain small by
/// construction). A missing or empty `reasoning` gets the generic default.
pub fn validate_servo(value: &Value) -> Result<ServoAction, InferenceError> {
    let left = value.get("left_servo").and_then(coerce_f64).ok_or_else(|| {
        InferenceError::Validation("missing or non-numeric 'left_servo'".to_string())
    })?;
    let right = value.get("right_servo").and_then(coerce_f64).ok_or_else(|| {
        InferenceError::Validation("missing or non-numeric 'right_servo'".to_string())
    })?;

    let reasoning = match value.get("reasoning").and_then(Value::as_str) {
        Some(s) if !s.trim().is_empty() => s.to_string(),
        _ => DEFAULT_SERVO_REASONING.to_string(),
    };

    Ok(ServoAction {
        left_servo: left as i64,
        right_servo: right as i64,
        reasoning,
    })
}

/// Numeric coercion: accepts JSON numbers and numeric strings, since small
/// models frequently quote their numbers. Non-finite values are rejected;
/// NaN would pass through `clamp` untouched and escape the bands.
fn coerce_f64(value: &Value) -> Option<f64> {
    value
        .as_f64()
        .or_else(|| value.as_str().and_then(|s| s.trim().parse::<f64>().ok()))
        .filter(|v| v.is_finite())
}
