// ==============================================================================
// curve.rs - IMMUTABLE SAMPLED CURVES + TIRE FRICTION CURVE
// ------------------------------------------------------------------------------
// SampledCurve:
// - Built once from a handful of key points (x ascending).
// - Key points are joined by a monotone cubic (Fritsch–Carlson), so the curve
//   never overshoots between keys (no torque bumps above 1.0).
// - The cubic is then baked into `resolution` uniform samples; evaluation is a
//   clamp + linear lookup, cheap enough for every wheel every tick.
//
// FrictionCurve:
// - Extremum/asymptote description of a tire's force-vs-slip response:
//     0 .. extremum_slip        rises to extremum_value
//     extremum .. asymptote     falls to asymptote_value
//     > asymptote_slip          flat at asymptote_value
// - Everything is scaled by `stiffness`.
// ==============================================================================

use serde::{Deserialize, Serialize};

use crate::drivetrain::types::EPSILON;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Keyframe {
    pub x: f32,
    pub y: f32,
}

impl Keyframe {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SampledCurve {
    keys: Vec<Keyframe>,
    samples: Vec<f32>,
    x_min: f32,
    x_max: f32,
}

impl SampledCurve {
    pub const DEFAULT_RESOLUTION: usize = 64;

    pub fn from_keys(keys: &[Keyframe], resolution: usize) -> Self {
        let mut keys: Vec<Keyframe> = keys
            .iter()
            .copied()
            .filter(|k| k.x.is_finite() && k.y.is_finite())
            .collect();
        keys.sort_by(|a, b| a.x.total_cmp(&b.x));
        keys.dedup_by(|b, a| (b.x - a.x).abs() < EPSILON);

        if keys.is_empty() {
            keys.push(Keyframe::new(0.0, 0.0));
        }

        let x_min = keys[0].x;
        let x_max = keys[keys.len() - 1].x;
        let resolution = resolution.max(2);

        let tangents = monotone_tangents(&keys);
        let samples = (0..resolution)
            .map(|i| {
                let x = x_min + (x_max - x_min) * i as f32 / (resolution - 1) as f32;
                hermite_eval(&keys, &tangents, x)
            })
            .collect();

        Self { keys, samples, x_min, x_max }
    }

    pub fn keys(&self) -> &[Keyframe] {
        &self.keys
    }

    /// Clamped lookup; `x` outside the key range returns the end value.
    pub fn evaluate(&self, x: f32) -> f32 {
        if !x.is_finite() {
            return self.samples[0];
        }
        let span = self.x_max - self.x_min;
        if span < EPSILON {
            return self.samples[0];
        }

        let t = ((x - self.x_min) / span).clamp(0.0, 1.0) * (self.samples.len() - 1) as f32;
        let i = (t.floor() as usize).min(self.samples.len() - 2);
        let frac = t - i as f32;

        self.samples[i] + (self.samples[i + 1] - self.samples[i]) * frac
    }
}

// Fritsch–Carlson tangents: zero at local extrema, limited elsewhere.
fn monotone_tangents(keys: &[Keyframe]) -> Vec<f32> {
    let n = keys.len();
    if n < 2 {
        return vec![0.0; n];
    }

    let secants: Vec<f32> = keys
        .windows(2)
        .map(|w| (w[1].y - w[0].y) / (w[1].x - w[0].x).max(EPSILON))
        .collect();

    let mut m = vec![0.0; n];
    m[0] = secants[0];
    m[n - 1] = secants[n - 2];
    for i in 1..n - 1 {
        m[i] = if secants[i - 1] * secants[i] <= 0.0 {
            0.0
        } else {
            (secants[i - 1] + secants[i]) * 0.5
        };
    }

    for (i, &d) in secants.iter().enumerate() {
        if d.abs() < EPSILON {
            m[i] = 0.0;
            m[i + 1] = 0.0;
            continue;
        }
        let a = m[i] / d;
        let b = m[i + 1] / d;
        let h = a * a + b * b;
        if h > 9.0 {
            let tau = 3.0 / h.sqrt();
            m[i] = tau * a * d;
            m[i + 1] = tau * b * d;
        }
    }

    m
}

fn hermite_eval(keys: &[Keyframe], m: &[f32], x: f32) -> f32 {
    if keys.len() == 1 || x <= keys[0].x {
        return keys[0].y;
    }
    let last = keys.len() - 1;
    if x >= keys[last].x {
        return keys[last].y;
    }

    let i = keys.windows(2).position(|w| x <= w[1].x).unwrap_or(last - 1);
    let (k0, k1) = (keys[i], keys[i + 1]);
    let h = (k1.x - k0.x).max(EPSILON);
    let t = (x - k0.x) / h;
    let t2 = t * t;
    let t3 = t2 * t;

    (2.0 * t3 - 3.0 * t2 + 1.0) * k0.y
        + (t3 - 2.0 * t2 + t) * h * m[i]
        + (-2.0 * t3 + 3.0 * t2) * k1.y
        + (t3 - t2) * h * m[i + 1]
}

// ============================================
// Tire friction curve
// ============================================

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FrictionCurve {
    pub extremum_slip: f32,
    pub extremum_value: f32,
    pub asymptote_slip: f32,
    pub asymptote_value: f32,
    pub stiffness: f32,
}

impl FrictionCurve {
    /// Friction coefficient at `slip`, signed like the slip.
    pub fn evaluate(&self, slip: f32) -> f32 {
        if !slip.is_finite() {
            return 0.0;
        }
        let s = slip.abs();
        let ext_slip = self.extremum_slip.max(EPSILON);
        let asym_slip = self.asymptote_slip.max(ext_slip + EPSILON);

        let value = if s <= ext_slip {
            let t = s / ext_slip;
            self.extremum_value * t * (2.0 - t)
        } else if s <= asym_slip {
            let t = (s - ext_slip) / (asym_slip - ext_slip);
            let smooth = t * t * (3.0 - 2.0 * t);
            self.extremum_value + (self.asymptote_value - self.extremum_value) * smooth
        } else {
            self.asymptote_value
        };

        value * self.stiffness * slip.signum()
    }

    /// Peak coefficient of the curve.
    pub fn peak(&self) -> f32 {
        self.extremum_value.max(self.asymptote_value) * self.stiffness
    }
}
