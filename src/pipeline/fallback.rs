// Rule-based fallback generators
//
// Used whenever the model path is unavailable or any stage of the cascade
// fails. The reading generator is statistical (uniform per-zone sampling,
// pressure-coupled SpO2 with occasional disturbance events); the servo
// rule is fully deterministic.

use rand::Rng;

use crate::domain::{BodyZonePressures, ServoAction, SleepReading, Zone};

/// Probability of a disturbance event depressing the synthesized SpO2.
pub const DISTURBANCE_PROBABILITY: f64 = 0.10;

/// SpO2 range for rule-generated readings.
pub const FALLBACK_SPO2_RANGE: (f64, f64) = (88.0, 99.0);

/// Thresholds for the servo rule: tilt when saturation drops below this
/// while core pressure sits above this.
pub const LOW_SPO2_THRESHOLD: f64 = 93.0;
pub const HIGH_CORE_PRESSURE_THRESHOLD: f64 = 50.0;

pub const TILT_REASONING: &str =
    "Low SpO2 and high core pressure -> tilt left/up (rule-based fallback)";
pub const HOLD_REASONING: &str = "Within acceptable range -> no change (rule-based fallback)";

/// Synthesize a physiologically plausible reading.
///
/// Zone pressures are sampled uniformly from their natural bands; SpO2
/// starts from a baseline coupled to core pressure, takes a [3, 8]
/// disturbance penalty 10% of the time, gets +/-1 uniform noise, and is
/// clamped to [88, 99] at one decimal place. Returned pressures are
/// rounded into the validation bands so both sources honor the same
/// invariant.
pub fn fallback_reading<R: Rng + ?Sized>(rng: &mut R) -> SleepReading {
    let mut sampled = [0.0f64; 7];
    for (i, zone) in Zone::ALL.iter().enumerate() {
        let (lo, hi) = zone.natural_band();
        sampled[i] = rng.gen_range(lo..=hi);
    }

    // Core pressure from the raw samples, before clamping.
    let core_avg = (sampled[2] + sampled[3] + sampled[4]) / 3.0;
    let mut sp_o2 = 98.0 - (core_avg - 45.0) * 0.2;

    if rng.gen::<f64>() < DISTURBANCE_PROBABILITY {
        sp_o2 -= rng.gen_range(3.0..=8.0);
    }
    sp_o2 += rng.gen_range(-1.0..=1.0);

    let (lo, hi) = FALLBACK_SPO2_RANGE;
    sp_o2 = (sp_o2.clamp(lo, hi) * 10.0).round() / 10.0;

    SleepReading {
        pressure: BodyZonePressures {
            head: Zone::Head.clamp(sampled[0]),
            neck: Zone::Neck.clamp(sampled[1]),
            upper_torso: Zone::UpperTorso.clamp(sampled[2]),
            lower_torso: Zone::LowerTorso.clamp(sampled[3]),
            hips: Zone::Hips.clamp(sampled[4]),
            thighs: Zone::Thighs.clamp(sampled[5]),
            knees: Zone::Knees.clamp(sampled[6]),
        },
        sp_o2,
    }
}

/// Deterministic servo rule: tilt left/up when saturation is low while
/// core pressure is high, otherwise hold.
pub fn fallback_servo(pressure: &BodyZonePressures, sp_o2: f64) -> ServoAction {
    if sp_o2 < LOW_SPO2_THRESHOLD && pressure.core_avg() > HIGH_CORE_PRESSURE_THRESHOLD {
        ServoAction {
            left_servo: 1,
            right_servo: -1,
            reasoning: TILT_REASONING.to_string(),
        }
    } else {
        ServoAction {
            left_servo: 0,
            right_servo: 0,
            reasoning: HOLD_REASONING.to_string(),
        }
    }
}
