// ==============================================================================
// telemetry.rs - READ-ONLY PROJECTION OF THE VEHICLE STATE
// ------------------------------------------------------------------------------
// Built once per tick from shared references only; it cannot reach back into
// the engine or the gearbox.
//
//   speed            |v|                 (m/s, km/h, mph)
//   wheel speed      avg grounded rpm * 2*pi*r / 60
//   slip ratio       (driven wheel surface speed - ground speed) / max(|ground|, 1)
//   lateral slip     clamp(yaw_rate * 0.1, -1, 1)
//   power            T * rpm / 9549 (kW), * 1.341 (hp)
//
// Causality diagnostic: body speed vs wheel-derived speed beyond the configured
// tolerance raises a flag (and a debug log). Nothing is corrected.
// ==============================================================================

use serde::Serialize;

use crate::drivetrain::config::DiagnosticsSpec;
use crate::drivetrain::distributor::{DistributionSummary, Pedals};
use crate::drivetrain::engine::EngineModel;
use crate::drivetrain::transmission::TransmissionModel;
use crate::drivetrain::types::{BodySensor, DriveInput};
use crate::drivetrain::wheel::WheelChannel;

pub const MS_TO_KPH: f32 = 3.6;
pub const MS_TO_MPH: f32 = 2.236_936;
const LATERAL_SLIP_GAIN: f32 = 0.1;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TelemetrySnapshot {
    // motion
    pub speed: f32,
    pub speed_kph: f32,
    pub speed_mph: f32,
    pub forward_speed: f32,

    // engine / gearbox
    pub engine_rpm: f32,
    pub normalized_rpm: f32,
    pub engine_torque: f32,
    pub power_kw: f32,
    pub horsepower: f32,
    pub gear: i8,
    pub gear_label: String,
    pub is_shifting: bool,
    pub shift_time_remaining: f32,
    pub clutch: f32,

    // wheels
    pub wheel_rpm: [f32; 4],
    pub average_wheel_rpm: f32,
    pub grounded_wheel_rpm: f32,
    pub wheel_speed: f32,
    pub slip_ratio: f32,
    pub lateral_slip: f32,
    pub any_grounded: bool,
    pub all_grounded: bool,

    // controls
    pub steer_input: f32,
    pub throttle_input: f32,
    pub throttle: f32,
    pub brake: f32,
    pub steer_angle_deg: f32,
    pub motor_torque: f32,
    pub brake_torque: f32,
    pub is_accelerating: bool,
    pub is_braking: bool,
    pub is_coasting: bool,
    pub is_parked: bool,
    pub traction_control_active: bool,

    // diagnostics
    pub causality_violation: bool,
}

/// Everything the projection reads. Shared references only.
pub struct TelemetrySources<'a> {
    pub engine: &'a EngineModel,
    pub transmission: &'a TransmissionModel,
    pub wheels: &'a [WheelChannel; 4],
    pub body: &'a BodySensor,
    pub input: DriveInput,
    pub pedals: Pedals,
    pub summary: DistributionSummary,
    pub steer_angle_deg: f32,
    pub diagnostics: &'a DiagnosticsSpec,
}

impl TelemetrySnapshot {
    pub fn project(src: &TelemetrySources<'_>) -> Self {
        let speed = src.body.speed();
        let forward_speed = src.body.forward_speed();

        let wheel_rpm: [f32; 4] = std::array::from_fn(|i| src.wheels[i].sensor.angular_speed_rpm);
        let average_wheel_rpm = wheel_rpm.iter().map(|r| r.abs()).sum::<f32>() / 4.0;

        let grounded: Vec<&WheelChannel> = src.wheels.iter().filter(|w| w.sensor.grounded).collect();
        let any_grounded = !grounded.is_empty();
        let all_grounded = grounded.len() == 4;
        let (grounded_wheel_rpm, wheel_speed) = if any_grounded {
            let n = grounded.len() as f32;
            (
                grounded.iter().map(|w| w.sensor.angular_speed_rpm).sum::<f32>() / n,
                grounded.iter().map(|w| w.surface_speed()).sum::<f32>() / n,
            )
        } else {
            (0.0, 0.0)
        };

        let slip_ratio = slip_ratio(src.wheels, forward_speed);
        let lateral_slip = (src.body.yaw_rate() * LATERAL_SLIP_GAIN).clamp(-1.0, 1.0);

        let causality_violation = any_grounded && (speed - wheel_speed.abs()).abs() > src.diagnostics.causality_tolerance;
        if causality_violation {
            tracing::debug!(speed, wheel_speed, "body speed disagrees with wheel-derived speed");
        }

        let pedals = src.pedals;
        Self {
            speed,
            speed_kph: speed * MS_TO_KPH,
            speed_mph: speed * MS_TO_MPH,
            forward_speed,

            engine_rpm: src.engine.current_rpm(),
            normalized_rpm: src.engine.normalized_rpm(),
            engine_torque: src.engine.output_torque(),
            power_kw: src.engine.power_kw(),
            horsepower: src.engine.power_hp(),
            gear: src.transmission.gear_index(),
            gear_label: src.transmission.gear_label(),
            is_shifting: src.transmission.is_shifting(),
            shift_time_remaining: src.transmission.shift_time_remaining(),
            clutch: src.transmission.clutch_engagement(),

            wheel_rpm,
            average_wheel_rpm,
            grounded_wheel_rpm,
            wheel_speed,
            slip_ratio,
            lateral_slip,
            any_grounded,
            all_grounded,

            steer_input: src.input.steer,
            throttle_input: src.input.throttle,
            throttle: pedals.throttle,
            brake: pedals.brake,
            steer_angle_deg: src.steer_angle_deg,
            motor_torque: src.summary.motor_torque,
            brake_torque: src.summary.brake_torque,
            is_accelerating: pedals.throttle > 0.0,
            is_braking: pedals.brake > 0.0 || src.summary.parked,
            is_coasting: pedals.is_idle() && !src.summary.parked,
            is_parked: src.summary.parked,
            traction_control_active: src.summary.traction_control_active,

            causality_violation,
        }
    }
}

/// Driven-wheel slip against ground speed; 0 with no grounded motor wheel.
pub fn slip_ratio(wheels: &[WheelChannel; 4], ground_speed: f32) -> f32 {
    let driven: Vec<f32> = wheels
        .iter()
        .filter(|w| w.is_motor && w.sensor.grounded)
        .map(|w| w.surface_speed())
        .collect();
    if driven.is_empty() {
        return 0.0;
    }
    let surface = driven.iter().sum::<f32>() / driven.len() as f32;
    (surface - ground_speed) / ground_speed.abs().max(1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drivetrain::config::VehiclePreset;
    use crate::drivetrain::types::{Vec3, WheelId, WheelSensor};

    fn rpm_for(speed: f32, radius: f32) -> f32 {
        speed / radius * 60.0 / std::f32::consts::TAU
    }

    fn setup(wheel_speed: f32, body_speed: f32) -> (crate::drivetrain::config::VehicleConfig, [WheelChannel; 4], BodySensor) {
        let cfg = VehiclePreset::FamilySedan.config();
        let mut wheels = WheelId::ALL.map(|id| WheelChannel::new(cfg.wheel(id).unwrap(), &cfg.tires));
        for w in wheels.iter_mut() {
            w.read_sensor(&WheelSensor {
                grounded: true,
                normal_load: 3000.0,
                angular_speed_rpm: rpm_for(wheel_speed, w.radius),
                ..WheelSensor::airborne(w.radius)
            });
        }
        let body = BodySensor { linear_velocity: Vec3::new(0.0, 0.0, body_speed), ..BodySensor::default() };
        (cfg, wheels, body)
    }

    fn project(cfg: &crate::drivetrain::config::VehicleConfig, wheels: &[WheelChannel; 4], body: &BodySensor) -> TelemetrySnapshot {
        let engine = EngineModel::new(cfg.engine.clone());
        let transmission = TransmissionModel::new(cfg.transmission.clone(), cfg.engine.kind);
        TelemetrySnapshot::project(&TelemetrySources {
            engine: &engine,
            transmission: &transmission,
            wheels,
            body,
            input: DriveInput::new(0.0, 0.5),
            pedals: Pedals { throttle: 0.5, brake: 0.0 },
            summary: DistributionSummary::default(),
            steer_angle_deg: 0.0,
            diagnostics: &cfg.diagnostics,
        })
    }

    #[test]
    fn unit_conversions_and_labels() {
        let (cfg, wheels, body) = setup(10.0, 10.0);
        let t = project(&cfg, &wheels, &body);
        assert!((t.speed_kph - 36.0).abs() < 1e-3);
        assert!((t.speed_mph - 22.369).abs() < 1e-2);
        assert_eq!(t.gear_label, "1");
        assert!(t.all_grounded);
        assert!(t.is_accelerating && !t.is_braking && !t.is_coasting);
        assert!((t.wheel_speed - 10.0).abs() < 1e-3);
        assert!(!t.causality_violation);
    }

    #[test]
    fn slip_ratio_normalizes_by_ground_speed() {
        let (cfg, wheels, body) = setup(12.0, 10.0);
        let t = project(&cfg, &wheels, &body);
        assert!((t.slip_ratio - 0.2).abs() < 1e-3);

        let (cfg, wheels, body) = setup(2.0, 0.0);
        let t = project(&cfg, &wheels, &body);
        assert!((t.slip_ratio - 2.0).abs() < 1e-3);
    }

    #[test]
    fn causality_mismatch_is_only_flagged() {
        let (cfg, wheels, body) = setup(20.0, 10.0);
        let t = project(&cfg, &wheels, &body);
        assert!(t.causality_violation);
        assert_eq!(t.speed, 10.0);
    }

    #[test]
    fn lateral_slip_is_clamped() {
        let (cfg, wheels, mut body) = setup(5.0, 5.0);
        body.angular_velocity = Vec3::new(0.0, 50.0, 0.0);
        assert_eq!(project(&cfg, &wheels, &body).lateral_slip, 1.0);
        body.angular_velocity = Vec3::new(0.0, -2.0, 0.0);
        assert!((project(&cfg, &wheels, &body).lateral_slip + 0.2).abs() < 1e-6);
    }

    #[test]
    fn airborne_vehicle_reports_no_wheel_speed() {
        let (cfg, mut wheels, body) = setup(5.0, 5.0);
        for w in wheels.iter_mut() {
            w.read_sensor(&WheelSensor::airborne(w.radius));
        }
        let t = project(&cfg, &wheels, &body);
        assert!(!t.any_grounded);
        assert_eq!(t.slip_ratio, 0.0);
        assert!(!t.causality_violation);
    }
}
