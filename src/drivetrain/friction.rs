// ==============================================================================
// friction.rs - LOAD / CAMBER / COMBINED-SLIP SENSITIVE TIRE GRIP
// ------------------------------------------------------------------------------
// Per wheel, per tick, from the contact snapshot:
//
//   load      = clamp(1 - sens * (Fz / Fz_nominal - 1), 0.7, 1.05)
//   camber    = clamp(1 + |camber_static - 2 * compression| * 0.015, 0.95, 1.1)
//   combined  = max(0.6, 1 - alpha * min(|slip_fwd|, 1.5))
//
//   lateral extremum      = base * load * camber * combined * grip
//   longitudinal extremum = base * load * grip
//   asymptote value       = 0.65 * extremum
//   lateral asymptote slip= 2.8 * extremum slip
//
// Airborne wheels keep the last grounded curves (no load to read from).
//
// Traction control:
//   slip <= threshold   1
//   slip >  threshold   clamp01(1 - aggression * (slip - threshold))
// ==============================================================================

use crate::drivetrain::config::{TireSpec, TractionControlSpec};
use crate::drivetrain::curve::FrictionCurve;
use crate::drivetrain::types::{clamp01, finite_or, FrictionOverride, EPSILON};
use crate::drivetrain::wheel::WheelChannel;

const MIN_LOAD_FACTOR: f32 = 0.7;
const MAX_LOAD_FACTOR: f32 = 1.05;
const CAMBER_GAIN_PER_DEG: f32 = 0.015;
const CAMBER_PER_COMPRESSION_DEG: f32 = 2.0;
const MIN_CAMBER_FACTOR: f32 = 0.95;
const MAX_CAMBER_FACTOR: f32 = 1.1;
const MIN_COMBINED_FACTOR: f32 = 0.6;
const MAX_COMBINED_SLIP: f32 = 1.5;
const ASYMPTOTE_FRACTION: f32 = 0.65;
const LATERAL_ASYMPTOTE_SLIP_SCALE: f32 = 2.8;
const GRIP_LIMIT_FRACTION: f32 = 0.9;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrictionModel {
    tires: TireSpec,
    nominal_load: f32,
}

impl FrictionModel {
    pub fn new(tires: TireSpec, nominal_load: f32) -> Self {
        Self {
            tires,
            nominal_load: finite_or(nominal_load, 0.0).max(EPSILON),
        }
    }

    pub fn tires(&self) -> &TireSpec {
        &self.tires
    }

    pub fn load_factor(&self, normal_load: f32) -> f32 {
        let ratio = finite_or(normal_load, 0.0).max(0.0) / self.nominal_load;
        (1.0 - self.tires.load_sensitivity * (ratio - 1.0)).clamp(MIN_LOAD_FACTOR, MAX_LOAD_FACTOR)
    }

    pub fn camber_factor(&self, compression: f32) -> f32 {
        let dynamic = self.tires.static_camber_deg - CAMBER_PER_COMPRESSION_DEG * clamp01(finite_or(compression, 0.0));
        (1.0 + dynamic.abs() * CAMBER_GAIN_PER_DEG).clamp(MIN_CAMBER_FACTOR, MAX_CAMBER_FACTOR)
    }

    pub fn combined_slip_factor(&self, forward_slip: f32) -> f32 {
        let slip = finite_or(forward_slip, 0.0).abs().min(MAX_COMBINED_SLIP);
        (1.0 - self.tires.combined_slip_alpha * slip).max(MIN_COMBINED_FACTOR)
    }

    /// Effective forward/sideways curves for a grounded contact.
    pub fn effective_curves(&self, normal_load: f32, compression: f32, forward_slip: f32) -> FrictionOverride {
        let longitudinal = self.load_factor(normal_load) * self.tires.grip_multiplier;
        let lateral = longitudinal * self.camber_factor(compression) * self.combined_slip_factor(forward_slip);

        FrictionOverride {
            forward: scaled(&self.tires.forward, longitudinal, self.tires.forward.asymptote_slip),
            sideways: scaled(
                &self.tires.sideways,
                lateral,
                self.tires.sideways.extremum_slip * LATERAL_ASYMPTOTE_SLIP_SCALE,
            ),
        }
    }

    /// Writes the friction override for one wheel.
    pub fn update(&self, wheel: &mut WheelChannel) {
        if wheel.sensor.grounded {
            let s = &wheel.sensor;
            wheel.last_friction = self.effective_curves(s.normal_load, s.compression, s.forward_slip);
        }
        wheel.command.friction = Some(wheel.last_friction);
    }

    /// Largest drive torque the contact can carry before breaking loose.
    pub fn grip_torque_limit(&self, normal_load: f32, radius: f32) -> f32 {
        let mu = self.tires.forward.extremum_value * self.tires.grip_multiplier * GRIP_LIMIT_FRACTION;
        mu * finite_or(normal_load, 0.0).max(0.0) * radius.max(0.0) * self.tires.torque_limit_safety
    }
}

fn scaled(base: &FrictionCurve, factor: f32, asymptote_slip: f32) -> FrictionCurve {
    let extremum_value = base.extremum_value * factor;
    FrictionCurve {
        extremum_slip: base.extremum_slip,
        extremum_value,
        asymptote_slip: asymptote_slip.max(base.extremum_slip + EPSILON),
        asymptote_value: extremum_value * ASYMPTOTE_FRACTION,
        stiffness: base.stiffness,
    }
}

/// Multiplier applied to drive torque for the measured slip (signed along the torque).
pub fn traction_control_factor(slip: f32, tc: &TractionControlSpec) -> f32 {
    if !tc.enabled {
        return 1.0;
    }
    let slip = finite_or(slip, 0.0);
    if slip <= tc.slip_threshold {
        return 1.0;
    }
    clamp01(1.0 - tc.aggression * (slip - tc.slip_threshold))
}
