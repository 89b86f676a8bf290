//! Aerodynamic drag and downforce, applied at the centre of mass.
//!
//! q = 0.5 * rho * v^2
//! drag      = -v_hat * q * Cd * A
//! downforce = -up * q * Cl * A

use crate::drivetrain::config::AeroSpec;
use crate::drivetrain::types::{BodyForce, BodySensor, Vec3, EPSILON};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aerodynamics {
    spec: AeroSpec,
}

impl Aerodynamics {
    pub fn new(spec: AeroSpec) -> Self {
        Self { spec }
    }

    pub fn dynamic_pressure(&self, speed: f32) -> f32 {
        0.5 * self.spec.air_density * speed * speed
    }

    pub fn drag(&self, body: &BodySensor) -> Vec3 {
        let speed = body.speed();
        if speed < EPSILON {
            return Vec3::zeros();
        }
        let dir = body.linear_velocity / speed;
        -dir * self.dynamic_pressure(speed) * self.spec.drag_coefficient * self.spec.frontal_area
    }

    pub fn downforce(&self, body: &BodySensor) -> Vec3 {
        let q = self.dynamic_pressure(body.speed());
        -body.up * q * self.spec.downforce_coefficient * self.spec.frontal_area
    }

    pub fn compute(&self, body: &BodySensor, out: &mut Vec<BodyForce>) {
        if body.speed() < EPSILON {
            return;
        }
        out.push(BodyForce {
            force: self.drag(body) + self.downforce(body),
            at_point: Some(body.center_of_mass),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drag_opposes_motion_and_grows_with_square_of_speed() {
        let aero = Aerodynamics::new(AeroSpec {
            drag_coefficient: 0.3,
            downforce_coefficient: 0.5,
            frontal_area: 2.0,
            air_density: 1.225,
        });

        let mut body = BodySensor { linear_velocity: Vec3::new(0.0, 0.0, 10.0), ..BodySensor::default() };
        let slow = aero.drag(&body);
        body.linear_velocity.z = 20.0;
        let fast = aero.drag(&body);

        assert!(slow.z < 0.0);
        assert!((fast.z / slow.z - 4.0).abs() < 1e-4);
        assert!((slow.z + 0.5 * 1.225 * 100.0 * 0.3 * 2.0).abs() < 1e-3);
        assert!(aero.downforce(&body).y < 0.0);

        let mut out = Vec::new();
        aero.compute(&BodySensor::default(), &mut out);
        assert!(out.is_empty());
    }
}
