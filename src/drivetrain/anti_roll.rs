// ==============================================================================
// anti_roll.rs - ANTI-ROLL BAR BODY FORCES
// ------------------------------------------------------------------------------
// One bar per axle (FL/FR, RL/RR). Each side's travel is read from the wheel
// snapshot:
//   travel = 1 - compression   (grounded; 0 = fully compressed)
//   travel = 1                 (airborne, fully extended)
//
//   force = (travel_l - travel_r) * bar_force
//
// Left wheel receives -force along body up, right wheel +force, each at its own
// contact point and only when that wheel is grounded. With the left side less
// compressed (travel_l > travel_r) the left is pushed down and the right up.
// ==============================================================================

use crate::drivetrain::config::AntiRollSpec;
use crate::drivetrain::types::{finite_or, BodyForce, Vec3, WheelId, EPSILON};
use crate::drivetrain::wheel::WheelChannel;

/// One anti-roll bar axle pair.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AntiRollPair {
    pub left_id: WheelId,
    pub right_id: WheelId,
    pub force: f32, // N per unit travel difference
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AntiRollCompensator {
    pub axles: [AntiRollPair; 2],
}

impl AntiRollCompensator {
    pub fn new(spec: &AntiRollSpec) -> Self {
        Self {
            axles: [
                AntiRollPair { left_id: WheelId::FL, right_id: WheelId::FR, force: spec.front_force },
                AntiRollPair { left_id: WheelId::RL, right_id: WheelId::RR, force: spec.rear_force },
            ],
        }
    }

    /// Appends the corrective forces for both axles to `out`.
    pub fn compute(&self, wheels: &[WheelChannel; 4], up: Vec3, out: &mut Vec<BodyForce>) {
        for pair in &self.axles {
            apply_axle(
                &wheels[pair.left_id.index()],
                &wheels[pair.right_id.index()],
                pair.force,
                up,
                out,
            );
        }
    }
}

fn travel(wheel: &WheelChannel) -> f32 {
    if wheel.sensor.grounded {
        1.0 - wheel.sensor.compression.clamp(0.0, 1.0)
    } else {
        1.0
    }
}

fn apply_axle(left: &WheelChannel, right: &WheelChannel, bar_force: f32, up: Vec3, out: &mut Vec<BodyForce>) {
    let delta = travel(left) - travel(right);
    if delta.abs() < EPSILON || bar_force <= 0.0 {
        return;
    }

    let force = finite_or(delta * bar_force, 0.0);

    if left.sensor.grounded {
        out.push(BodyForce {
            force: up * -force,
            at_point: Some(left.sensor.contact_point),
        });
    }
    if right.sensor.grounded {
        out.push(BodyForce {
            force: up * force,
            at_point: Some(right.sensor.contact_point),
        });
    }
}
