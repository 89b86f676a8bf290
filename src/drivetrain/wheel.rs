//! One wheel's static role, latest sensor snapshot and outgoing command.

use crate::drivetrain::config::{TireSpec, WheelSpec};
use crate::drivetrain::types::{finite_or, FrictionOverride, WheelCommand, WheelId, WheelSensor};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WheelChannel {
    pub id: WheelId,
    pub is_steer: bool,
    pub is_motor: bool,
    pub is_front: bool,
    pub radius: f32,
    pub suspension_distance: f32,

    pub sensor: WheelSensor,
    pub command: WheelCommand,

    /// Curve pair from the last grounded tick; reused while airborne.
    pub last_friction: FrictionOverride,
}

impl WheelChannel {
    pub fn new(spec: &WheelSpec, tires: &TireSpec) -> Self {
        Self {
            id: spec.id,
            is_steer: spec.is_steer,
            is_motor: spec.is_motor,
            is_front: spec.id.is_front(),
            radius: spec.radius,
            suspension_distance: spec.suspension_distance,
            sensor: WheelSensor::airborne(spec.radius),
            command: WheelCommand::default(),
            last_friction: FrictionOverride {
                forward: tires.forward,
                sideways: tires.sideways,
            },
        }
    }

    /// Stores this tick's sensor snapshot. A missing/invalid radius keeps the configured one.
    pub fn read_sensor(&mut self, sensor: &WheelSensor) {
        let mut sensor = *sensor;
        if !sensor.radius.is_finite() || sensor.radius <= 0.0 {
            sensor.radius = self.radius;
        }
        sensor.normal_load = finite_or(sensor.normal_load, 0.0).max(0.0);
        sensor.compression = finite_or(sensor.compression, 0.0).clamp(0.0, 1.0);
        sensor.forward_slip = finite_or(sensor.forward_slip, 0.0);
        sensor.sideways_slip = finite_or(sensor.sideways_slip, 0.0);
        sensor.angular_speed_rpm = finite_or(sensor.angular_speed_rpm, 0.0);
        self.sensor = sensor;
    }

    /// Surface speed of the tire (m/s) from its angular speed.
    pub fn surface_speed(&self) -> f32 {
        self.sensor.angular_speed_rpm * std::f32::consts::TAU / 60.0 * self.sensor.radius
    }
}
