// Prompt construction
//
// Pure functions of typed inputs; deterministic given identical inputs.
// The synthetic-reading prompt is zero-shot, the servo prompt is few-shot
// with labels derived from the same rule the fallback uses (no stored
// labels exist anywhere in the system).

use serde::Serialize;

use crate::domain::{BodyZonePressures, SleepReading, Zone};

/// Historical examples beyond this count are ignored.
pub const MAX_FEW_SHOT_EXAMPLES: usize = 5;

/// Zero-shot prompt asking for one strict-JSON sensor reading.
pub fn synthetic_reading_prompt() -> String {
    let zones: Vec<&str> = Zone::ALL.iter().map(|z| z.key()).collect();
    format!(
        "Generate a synthetic example of a person lying on a bed. Include integer pressures for each body zone:\n\
         {zones:?}\n\
         - Head/neck lower pressure (20-35)\n\
         - Torso/hips higher pressure (40-60)\n\
         - Legs medium pressure (30-50)\n\
         - Generate a realistic SpO2 (90-100) depending on pressure distribution\n\
         Output strictly in JSON like:\n\
         {{\"pressure\": {{\"head\":0,\"neck\":0,\"upper_torso\":0,\"lower_torso\":0,\"hips\":0,\"thighs\":0,\"knees\":0}}, \"spO2\": 0.0}}"
    )
}

#[derive(Serialize)]
struct ServoLabel {
    left_servo: i64,
    right_servo: i64,
}

#[derive(Serialize)]
struct LabeledExample<'a> {
    pressure: &'a BodyZonePressures,
    #[serde(rename = "spO2")]
    sp_o2: f64,
    servo_action: ServoLabel,
}

/// Derive the illustrative servo label for a historical example.
pub fn derive_example_label(example: &SleepReading) -> (i64, i64) {
    if example.sp_o2 < 93.0 && example.core_avg() > 50.0 {
        (1, -1)
    } else {
        (0, 0)
    }
}

/// Few-shot prompt for servo prediction: framing sentence, up to five
/// rule-labeled example lines, the current reading, and the strict-JSON
/// output instruction.
pub fn servo_prompt(reading: &SleepReading, examples: &[SleepReading]) -> String {
    let mut prompt = String::from(
        "You are a smart sleep assistant controlling a bed with 2 servo zones.\n\
         Here are examples of body pressures, SpO2, and corresponding servo actions (JSON lines):\n",
    );

    for example in examples.iter().take(MAX_FEW_SHOT_EXAMPLES) {
        let (left, right) = derive_example_label(example);
        let labeled = LabeledExample {
            pressure: &example.pressure,
            sp_o2: example.sp_o2,
            servo_action: ServoLabel {
                left_servo: left,
                right_servo: right,
            },
        };
        if let Ok(line) = serde_json::to_string(&labeled) {
            prompt.push_str(&line);
            prompt.push('\n');
        }
    }

    prompt.push_str("\nNow, given the current readings (JSON):\n");
    if let Ok(line) = serde_json::to_string(reading) {
        prompt.push_str(&line);
        prompt.push('\n');
    }
    prompt.push_str(
        "Suggest the servo movements in JSON only: \
         {\"left_servo\": VALUE, \"right_servo\": VALUE, \"reasoning\": \"...\"}.\n",
    );

    prompt
}
