// HTTP request/response types
//
// Wire DTOs are separate from the domain types: requests carry midpoint
// defaults for omitted fields, responses tag their payload with the
// source so clients can tell model output from rule output.

use serde::{Deserialize, Serialize};

use crate::domain::{BodyZonePressures, ServoAction, SleepReading, Source};

fn default_count() -> i64 {
    1
}

#[derive(Debug, Deserialize)]
pub struct GenerateRequest {
    #[serde(default = "default_count")]
    pub count: i64,
}

#[derive(Debug, Serialize)]
pub struct GenerateResponse {
    pub success: bool,
    pub source: Source,
    pub data: Vec<SleepReading>,
}

fn default_pressure() -> f64 {
    50.0
}

fn default_spo2() -> f64 {
    95.0
}

/// Pressure map with midpoint defaults for any omitted zone.
#[derive(Debug, Deserialize)]
pub struct PressureInput {
    #[serde(default = "default_pressure")]
    pub head: f64,
    #[serde(default = "default_pressure")]
    pub neck: f64,
    #[serde(default = "default_pressure")]
    pub upper_torso: f64,
    #[serde(default = "default_pressure")]
    pub lower_torso: f64,
    #[serde(default = "default_pressure")]
    pub hips: f64,
    #[serde(default = "default_pressure")]
    pub thighs: f64,
    #[serde(default = "default_pressure")]
    pub knees: f64,
}

impl Default for PressureInput {
    fn default() -> Self {
        Self {
            head: default_pressure(),
            neck: default_pressure(),
            upper_torso: default_pressure(),
            lower_torso: default_pressure(),
            hips: default_pressure(),
            thighs: default_pressure(),
            knees: default_pressure(),
        }
    }
}

impl From<&PressureInput> for BodyZonePressures {
    fn from(input: &PressureInput) -> Self {
        Self {
            head: input.head as i64,
            neck: input.neck as i64,
            upper_torso: input.upper_torso as i64,
            lower_torso: input.lower_torso as i64,
            hips: input.hips as i64,
            thighs: input.thighs as i64,
            knees: input.knees as i64,
        }
    }
}

/// A reading as supplied by the client, with midpoint defaults.
#[derive(Debug, Deserialize)]
pub struct ReadingInput {
    #[serde(default)]
    pub pressure: PressureInput,
    #[serde(rename = "spO2", default = "default_spo2")]
    pub sp_o2: f64,
}

impl From<&ReadingInput> for SleepReading {
    fn from(input: &ReadingInput) -> Self {
        Self {
            pressure: (&input.pressure).into(),
            sp_o2: input.sp_o2,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct PredictRequest {
    pub pressure: PressureInput,
    #[serde(rename = "spO2", default = "default_spo2")]
    pub sp_o2: f64,
    /// Recent history used as few-shot prompt examples.
    #[serde(default)]
    pub examples: Vec<ReadingInput>,
}

#[derive(Debug, Serialize)]
pub struct PredictResponse {
    pub success: bool,
    pub source: Source,
    pub servo_action: ServoAction,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub ok: bool,
    pub model_loaded: bool,
    pub model_name: String,
}
