//! End-to-end drivetrain scenarios against a point-mass plant.
//!
//! The plant stands in for the rigid body: it sums wheel forces along the
//! body's forward axis, lets brakes and road load stop (never reverse) the
//! car, and rolls every wheel without slip.

use drivetrain_server::drivetrain::config::{EngineKind, TractionControlSpec, VehicleConfig};
use drivetrain_server::drivetrain::engine::RAD_S_TO_RPM;
use drivetrain_server::drivetrain::friction::traction_control_factor;
use drivetrain_server::drivetrain::transmission::{Gear, ShiftInputs, TransmissionModel};
use drivetrain_server::drivetrain::{
    BodySensor, DriveInput, TelemetrySnapshot, TickOutput, Vec3, Vehicle, VehiclePreset, WheelId, WheelSensor, GRAVITY,
};
use drivetrain_server::error::ConfigError;

const DT: f32 = 1.0 / 60.0;
const GRIP: f32 = 1.1;
const ROLLING_RESISTANCE: f32 = 0.015;
const AIR_DRAG: f32 = 0.4; // N / (m/s)^2

struct Plant {
    speed: f32,
    /// When set, the plant ignores forces and holds this speed.
    pinned: bool,
}

impl Plant {
    fn at_rest() -> Self {
        Self { speed: 0.0, pinned: false }
    }

    fn pinned(speed: f32) -> Self {
        Self { speed, pinned: true }
    }

    fn sensors(&self, v: &Vehicle) -> [WheelSensor; 4] {
        let load = v.config().nominal_wheel_load();
        std::array::from_fn(|i| {
            let r = v.wheels()[i].radius;
            WheelSensor {
                grounded: true,
                normal_load: load,
                angular_speed_rpm: self.speed / r * RAD_S_TO_RPM,
                compression: 0.4,
                ..WheelSensor::airborne(r)
            }
        })
    }

    fn body(&self) -> BodySensor {
        BodySensor { linear_velocity: Vec3::new(0.0, 0.0, self.speed), ..BodySensor::default() }
    }

    fn step(&mut self, v: &mut Vehicle, input: DriveInput) -> TickOutput {
        v.set_input(input);
        let sensors = self.sensors(v);
        let out = v.tick(&self.body(), &sensors, DT);
        if self.pinned {
            return out;
        }

        let mass = v.config().chassis.mass;
        let grip = GRIP * mass * GRAVITY;
        let (drive, brake) = out.commands.iter().zip(v.wheels().iter()).fold((0.0, 0.0), |(d, b), (c, w)| {
            (d + c.motor_torque / w.radius, b + c.brake_torque / w.radius)
        });

        let road_load = ROLLING_RESISTANCE * mass * GRAVITY + AIR_DRAG * self.speed * self.speed;
        let next = self.speed + drive.clamp(-grip, grip) / mass * DT;
        let brake_dv = (brake.min(grip) + road_load) / mass * DT;
        self.speed = if next.abs() <= brake_dv { 0.0 } else { next - next.signum() * brake_dv };
        out
    }

    fn run(&mut self, v: &mut Vehicle, input: DriveInput, seconds: f32) -> TickOutput {
        let ticks = (seconds / DT).round() as usize;
        let mut out = self.step(v, input);
        for _ in 1..ticks {
            out = self.step(v, input);
        }
        out
    }
}

// ============================================
// ----- scenarios ----------------------------
// ============================================

#[test]
fn launch_slip_revs_toward_peak_power_without_upshifting() {
    let mut v = Vehicle::from_preset(VehiclePreset::Sportscar);
    let idle = v.config().engine.idle_rpm;
    let max = v.config().engine.max_rpm;
    let target = v.config().engine.peak_power_rpm;
    let mut plant = Plant::pinned(0.2);

    let mut last = v.engine().current_rpm();
    let mut out = plant.step(&mut v, DriveInput::new(0.0, 1.0));
    for _ in 0..120 {
        out = plant.step(&mut v, DriveInput::new(0.0, 1.0));
        let rpm = out.telemetry.engine_rpm;
        assert!(rpm >= last - 1e-3 && rpm <= max);
        last = rpm;
    }

    assert!(last > idle + 800.0);
    assert!((last - target).abs() < 50.0, "rpm {last}");
    assert_eq!(v.transmission().gear(), Gear::Forward(1));
    assert!(out.telemetry.clutch < 0.5);
}

#[test]
fn high_rpm_requests_an_upshift_for_exactly_the_shift_duration() {
    let cfg = VehiclePreset::FamilySedan.config();
    let duration = cfg.transmission.shift_duration;
    let max = cfg.engine.max_rpm;
    let mut t = TransmissionModel::new(cfg.transmission.clone(), EngineKind::Ice);
    let inputs = ShiftInputs { engine_rpm: 0.9 * max, max_rpm: max, throttle: 0.5, speed: 12.0 };

    t.update(inputs, DT);
    assert!(t.is_shifting());
    assert_eq!(t.gear(), Gear::Forward(1));

    let mut shifting_for = 0.0;
    while t.is_shifting() {
        shifting_for += DT;
        t.update(inputs, DT);
        assert!(shifting_for < 2.0 * duration);
    }
    assert!((shifting_for - duration).abs() <= DT * 0.5 + 1e-4, "{shifting_for}");
    assert_eq!(t.gear(), Gear::Forward(2));
}

#[test]
fn traction_control_reference_point() {
    let tc = TractionControlSpec { enabled: true, slip_threshold: 0.15, aggression: 0.8 };
    assert!((traction_control_factor(0.3, &tc) - 0.88).abs() < 1e-5);
    assert_eq!(traction_control_factor(0.15, &tc), 1.0);
}

#[test]
fn electric_launch_at_light_throttle() {
    let mut v = Vehicle::from_preset(VehiclePreset::ElectricHatch);
    let mut plant = Plant::at_rest();

    let mut saw_torque = false;
    for _ in 0..120 {
        let out = plant.step(&mut v, DriveInput::new(0.0, 0.2));
        let t = &out.telemetry;
        assert!(t.engine_rpm >= 0.0);
        saw_torque |= t.engine_torque > 0.0 && t.motor_torque > 0.0;
    }

    assert!(saw_torque);
    assert!(v.engine().current_rpm() > 0.0);
    assert!(plant.speed > 0.5, "speed {}", plant.speed);
}

#[test]
fn held_electric_car_revs_with_throttle() {
    let mut v = Vehicle::from_preset(VehiclePreset::ElectricHatch);
    let mut plant = Plant::pinned(0.0);

    let mut prev_rpm = 0.0;
    for _ in 0..120 {
        let out = plant.step(&mut v, DriveInput::new(0.0, 0.2));
        let t = &out.telemetry;
        assert!(t.engine_torque > 0.0);
        assert!(t.engine_rpm + 1e-3 >= prev_rpm, "{} after {prev_rpm}", t.engine_rpm);
        prev_rpm = t.engine_rpm;
    }
    assert!(prev_rpm > 0.0);
}

#[test]
fn no_propulsion_at_or_above_top_speed() {
    for preset in [VehiclePreset::Sportscar, VehiclePreset::ElectricHatch, VehiclePreset::FamilySedan] {
        let mut v = Vehicle::from_preset(preset);
        let top = v.config().limits.top_speed;
        let mut plant = Plant::pinned(top + 1.0);

        let out = plant.run(&mut v, DriveInput::new(0.0, 1.0), 1.0);
        for c in out.commands {
            assert!(c.motor_torque.abs() < 1e-4, "{preset:?}: {}", c.motor_torque);
        }
    }
}

// ============================================
// ----- closed loop --------------------------
// ============================================

#[test]
fn released_throttle_returns_to_rest() {
    for preset in [VehiclePreset::Sportscar, VehiclePreset::ElectricHatch] {
        let mut v = Vehicle::from_preset(preset);
        let mut plant = Plant::at_rest();

        plant.run(&mut v, DriveInput::new(0.0, 1.0), 2.0);
        assert!(plant.speed > 3.0, "{preset:?} only reached {}", plant.speed);

        let out = plant.run(&mut v, DriveInput::default(), 120.0);
        assert_eq!(plant.speed, 0.0, "{preset:?}");
        let rest = if v.config().is_electric() { 0.0 } else { v.config().engine.idle_rpm };
        assert!((out.telemetry.engine_rpm - rest).abs() < 1.0, "{preset:?}: {}", out.telemetry.engine_rpm);
        assert!(out.telemetry.is_parked);
    }
}

#[test]
fn automatic_gearbox_climbs_through_the_gears() {
    let mut v = Vehicle::from_preset(VehiclePreset::FamilySedan);
    let mut plant = Plant::at_rest();

    let mut highest = 0;
    for _ in 0..(20.0 / DT) as usize {
        let out = plant.step(&mut v, DriveInput::new(0.0, 1.0));
        highest = highest.max(out.telemetry.gear);
        assert!(out.telemetry.engine_rpm <= v.config().engine.max_rpm);
    }
    assert!(highest >= 3, "highest gear {highest}");
}

#[test]
fn reverse_needs_a_stop_and_a_release() {
    let mut v = Vehicle::from_preset(VehiclePreset::FamilySedan);
    let mut plant = Plant::at_rest();

    plant.run(&mut v, DriveInput::new(0.0, -1.0), 3.0);
    assert_eq!(v.transmission().gear(), Gear::Reverse);
    assert!(plant.speed < -0.5, "speed {}", plant.speed);

    // forward input while rolling back brakes; the direction stays locked
    let out = plant.step(&mut v, DriveInput::new(0.0, 1.0));
    assert!(out.telemetry.brake > 0.0);
    plant.run(&mut v, DriveInput::new(0.0, 1.0), 3.0);
    assert_eq!(plant.speed, 0.0);
    assert_eq!(v.transmission().gear(), Gear::Reverse);

    plant.step(&mut v, DriveInput::default());
    plant.run(&mut v, DriveInput::new(0.0, 1.0), 4.0);
    assert!(matches!(v.transmission().gear(), Gear::Forward(_)));
    assert!(plant.speed > 0.5, "speed {}", plant.speed);
}

#[test]
fn identical_runs_produce_identical_telemetry() {
    let run = |preset: VehiclePreset| -> Vec<TelemetrySnapshot> {
        let mut v = Vehicle::from_preset(preset);
        let mut plant = Plant::at_rest();
        (0..600)
            .map(|i| {
                let t = i as f32 * DT;
                let throttle = if t < 6.0 { 1.0 } else { -0.6 };
                plant.step(&mut v, DriveInput::new((t * 0.7).sin(), throttle)).telemetry
            })
            .collect()
    };
    for preset in VehiclePreset::ALL {
        assert_eq!(run(preset), run(preset), "{preset:?}");
    }
}

// ============================================
// ----- configuration ------------------------
// ============================================

#[test]
fn degraded_config_still_drives() {
    let mut cfg = VehiclePreset::FamilySedan.config();
    cfg.name = "broken".into();
    cfg.transmission.gear_ratios.clear();
    cfg.wheels.retain(|w| w.id != WheelId::RR);
    if let Some(fl) = cfg.wheels.iter_mut().find(|w| w.id == WheelId::FL) {
        fl.radius = -1.0;
    }

    let (_, issues) = cfg.clone().validated();
    assert!(issues.iter().any(|e| matches!(e, ConfigError::EmptyGearTable)));
    assert!(issues.iter().any(|e| matches!(e, ConfigError::MissingWheel(WheelId::RR))));
    assert!(issues.iter().any(|e| matches!(e, ConfigError::InvalidWheelRadius { wheel: WheelId::FL, .. })));

    let mut v = Vehicle::new(cfg);
    assert_eq!(v.wheels()[WheelId::FL.index()].radius, 0.34);
    assert!(!v.config().transmission.gear_ratios.is_empty());

    let mut plant = Plant::at_rest();
    let out = plant.run(&mut v, DriveInput::new(0.3, 1.0), 3.0);
    assert!(out.commands.iter().all(|c| c.motor_torque.is_finite() && c.brake_torque.is_finite()));
    assert!(plant.speed > 1.0);
}

#[test]
fn presets_round_trip_by_name_and_json() {
    for preset in VehiclePreset::ALL {
        assert_eq!(preset.as_str().parse::<VehiclePreset>().ok(), Some(preset));

        let cfg = preset.config();
        let json = serde_json::to_string(&cfg).unwrap();
        assert_eq!(VehicleConfig::from_json_str(&json).unwrap(), cfg);
    }
    assert!(matches!("hovercraft".parse::<VehiclePreset>(), Err(ConfigError::UnknownPreset(_))));
}
