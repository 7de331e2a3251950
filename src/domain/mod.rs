// Domain entities for sleep monitoring
//
// Sensor readings (seven body-zone pressures + SpO2) and servo actions are
// the only data that crosses the inference pipeline boundary. Everything
// coming out of the model is validated into these types immediately.

use serde::{Deserialize, Serialize};

/// One of the seven body-support regions tracked by the mattress sensors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Zone {
    Head,
    Neck,
    UpperTorso,
    LowerTorso,
    Hips,
    Thighs,
    Knees,
}

impl Zone {
    /// All zones, in canonical order.
    pub const ALL: [Zone; 7] = [
        Zone::Head,
        Zone::Neck,
        Zone::UpperTorso,
        Zone::LowerTorso,
        Zone::Hips,
        Zone::Thighs,
        Zone::Knees,
    ];

    /// JSON field name for this zone.
    pub fn key(&self) -> &'static str {
        match self {
            Zone::Head => "head",
            Zone::Neck => "neck",
            Zone::UpperTorso => "upper_torso",
            Zone::LowerTorso => "lower_torso",
            Zone::Hips => "hips",
            Zone::Thighs => "thighs",
            Zone::Knees => "knees",
        }
    }

    /// Validation band. Model-derived pressures are clamped into this range.
    pub fn clamp_band(&self) -> (i64, i64) {
        match self {
            Zone::Head | Zone::Neck => (20, 35),
            Zone::UpperTorso | Zone::LowerTorso | Zone::Hips => (40, 60),
            Zone::Thighs | Zone::Knees => (30, 50),
        }
    }

    /// Natural sampling band used by the rule-based generator. Slightly
    /// wider than the clamp band for the core zones.
    pub fn natural_band(&self) -> (f64, f64) {
        match self {
            Zone::Head => (20.0, 35.0),
            Zone::Neck => (22.0, 35.0),
            Zone::UpperTorso => (42.0, 58.0),
            Zone::LowerTorso => (44.0, 64.0),
            Zone::Hips => (46.0, 64.0),
            Zone::Thighs => (30.0, 45.0),
            Zone::Knees => (30.0, 52.0),
        }
    }

    /// Clamp a raw numeric value into this zone's validation band,
    /// truncating to an integer.
    pub fn clamp(&self, value: f64) -> i64 {
        let (lo, hi) = self.clamp_band();
        value.clamp(lo as f64, hi as f64) as i64
    }
}

/// Pressure values for the seven body zones, in integer sensor units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BodyZonePressures {
    pub head: i64,
    pub neck: i64,
    pub upper_torso: i64,
    pub lower_torso: i64,
    pub hips: i64,
    pub thighs: i64,
    pub knees: i64,
}

impl BodyZonePressures {
    pub fn get(&self, zone: Zone) -> i64 {
        match zone {
            Zone::Head => self.head,
            Zone::Neck => self.neck,
            Zone::UpperTorso => self.upper_torso,
            Zone::LowerTorso => self.lower_torso,
            Zone::Hips => self.hips,
            Zone::Thighs => self.thighs,
            Zone::Knees => self.knees,
        }
    }

    /// Mean pressure across the three core zones (upper/lower torso, hips).
    /// Drives both the SpO2 synthesis and the servo threshold rule.
    /// Summed in f64: client-supplied pressures arrive unclamped and an
    /// i64 sum can overflow.
    pub fn core_avg(&self) -> f64 {
        (self.upper_torso as f64 + self.lower_torso as f64 + self.hips as f64) / 3.0
    }

    /// True when every zone value lies within its validation band.
    pub fn within_bands(&self) -> bool {
        Zone::ALL.iter().all(|z| {
            let (lo, hi) = z.clamp_band();
            let v = self.get(*z);
            v >= lo && v <= hi
        })
    }
}

/// One sensor reading: zone pressures plus blood-oxygen saturation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SleepReading {
    pub pressure: BodyZonePressures,
    #[serde(rename = "spO2")]
    pub sp_o2: f64,
}

impl SleepReading {
    pub fn core_avg(&self) -> f64 {
        self.pressure.core_avg()
    }
}

/// Servo adjustment: a small tilt command per side plus a justification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServoAction {
    pub left_servo: i64,
    pub right_servo: i64,
    pub reasoning: String,
}

/// Provenance of a pipeline result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    Model,
    Fallback,
}
