// ==============================================================================
// sim.rs - ONE VEHICLE, ONE FIXED TICK
// ------------------------------------------------------------------------------
// Vehicle owns every piece of per-vehicle state (engine, gearbox, wheels). The
// host calls `tick` once per physics step after its contact solver has run:
//
//   1) input         last-value-wins DriveInput, direction + pedals
//   2) transmission  direction gear select, shift timers, automatic logic, clutch
//   3) engine        rpm update under the transmission's coupling
//   4) distribution  drive torque -> per-wheel torque / brake / steer
//   5) friction      per-wheel curve overrides
//   6) outputs       wheel commands, body forces (anti-roll, aero), telemetry
//
// No wall clock, no randomness: identical input + prior state => identical output.
// ==============================================================================

use crate::drivetrain::aero::Aerodynamics;
use crate::drivetrain::anti_roll::AntiRollCompensator;
use crate::drivetrain::config::{VehicleConfig, VehiclePreset};
use crate::drivetrain::distributor::{DirectionSelector, Direction, DriveContext, DriveDistributor, Pedals};
use crate::drivetrain::engine::EngineModel;
use crate::drivetrain::friction::FrictionModel;
use crate::drivetrain::telemetry::{TelemetrySnapshot, TelemetrySources};
use crate::drivetrain::transmission::{Gear, ShiftInputs, TransmissionModel};
use crate::drivetrain::types::{finite_or, BodyForce, BodySensor, DriveInput, WheelCommand, WheelId, WheelSensor};
use crate::drivetrain::wheel::WheelChannel;

/// Everything the host has to write back after a tick.
#[derive(Debug, Clone, PartialEq)]
pub struct TickOutput {
    pub commands: [WheelCommand; 4],
    pub body_forces: Vec<BodyForce>,
    pub telemetry: TelemetrySnapshot,
}

#[derive(Debug, Clone)]
pub struct Vehicle {
    config: VehicleConfig,
    engine: EngineModel,
    transmission: TransmissionModel,
    friction: FrictionModel,
    distributor: DriveDistributor,
    direction: DirectionSelector,
    anti_roll: AntiRollCompensator,
    aero: Aerodynamics,
    wheels: [WheelChannel; 4],
    input: DriveInput,
    telemetry: TelemetrySnapshot,
}

impl Vehicle {
    /// Validates `config` (logging every repair) and builds the vehicle.
    pub fn new(config: VehicleConfig) -> Self {
        let (config, issues) = config.validated();
        for issue in &issues {
            tracing::warn!(vehicle = %config.name, "{issue}");
        }

        // validated() guarantees one spec per corner, in WheelId order
        let wheels = std::array::from_fn(|i| WheelChannel::new(&config.wheels[i], &config.tires));

        tracing::info!(
            vehicle = %config.name,
            engine = ?config.engine.kind,
            layout = ?config.layout,
            gears = config.transmission.gear_ratios.len(),
            "vehicle initialized"
        );

        Self {
            engine: EngineModel::new(config.engine.clone()),
            transmission: TransmissionModel::new(config.transmission.clone(), config.engine.kind),
            friction: FrictionModel::new(config.tires, config.nominal_wheel_load()),
            distributor: DriveDistributor::new(&config),
            direction: DirectionSelector::new(config.direction),
            anti_roll: AntiRollCompensator::new(&config.anti_roll),
            aero: Aerodynamics::new(config.aero),
            wheels,
            input: DriveInput::default(),
            telemetry: TelemetrySnapshot::default(),
            config,
        }
    }

    pub fn from_preset(preset: VehiclePreset) -> Self {
        Self::new(preset.config())
    }

    pub fn config(&self) -> &VehicleConfig {
        &self.config
    }

    pub fn engine(&self) -> &EngineModel {
        &self.engine
    }

    pub fn transmission(&self) -> &TransmissionModel {
        &self.transmission
    }

    pub fn wheels(&self) -> &[WheelChannel; 4] {
        &self.wheels
    }

    pub fn direction(&self) -> Direction {
        self.direction.direction()
    }

    /// Last tick's telemetry.
    pub fn telemetry(&self) -> &TelemetrySnapshot {
        &self.telemetry
    }

    pub fn input(&self) -> DriveInput {
        self.input
    }

    /// Latest input wins; read once at the start of the next tick.
    pub fn set_input(&mut self, input: DriveInput) {
        self.input = input.sanitized();
    }

    pub fn shift_up(&mut self) -> bool {
        self.transmission.shift_up()
    }

    pub fn shift_down(&mut self) -> bool {
        self.transmission.shift_down()
    }

    pub fn tick(&mut self, body: &BodySensor, sensors: &[WheelSensor; 4], dt: f32) -> TickOutput {
        let dt = finite_or(dt, 0.0).max(0.0);

        // --- 1) input ---
        let input = self.input;
        for (wheel, sensor) in self.wheels.iter_mut().zip(sensors.iter()) {
            wheel.read_sensor(sensor);
        }
        let forward_speed = body.forward_speed();
        let speed = body.speed();

        let direction = self.direction.update(input.throttle, forward_speed, dt);
        let pedals = Pedals::from_input(input.throttle, direction, self.config.direction.input_deadzone);

        // --- 2) transmission ---
        match (direction, self.transmission.gear()) {
            (Direction::Forward, Gear::Reverse) => self.transmission.select(Gear::Forward(1)),
            (Direction::Reverse, gear) if gear != Gear::Reverse => self.transmission.select(Gear::Reverse),
            _ => {}
        }
        self.transmission.update(
            ShiftInputs {
                engine_rpm: self.engine.current_rpm(),
                max_rpm: self.engine.spec().max_rpm,
                throttle: pedals.throttle,
                speed: forward_speed.abs(),
            },
            dt,
        );

        // --- 3) engine ---
        let coupling = self.transmission.coupling(self.motor_wheel_rpm(), forward_speed);
        let engine_throttle = if self.transmission.is_shifting() { 0.0 } else { pedals.throttle };
        let engine_torque = self.engine.update(engine_throttle, coupling, dt);

        // --- 4) distribution ---
        let ctx = DriveContext {
            drive_torque: self.transmission.drive_torque(engine_torque),
            gear_sign: self.transmission.gear().sign(),
            pedals,
            steer: input.steer,
            forward_speed,
            speed,
        };
        let summary = self.distributor.distribute(&ctx, &self.friction, &mut self.wheels, dt);

        // --- 5) friction ---
        for wheel in self.wheels.iter_mut() {
            self.friction.update(wheel);
        }

        // --- 6) outputs ---
        let mut body_forces = Vec::with_capacity(5);
        self.anti_roll.compute(&self.wheels, body.up, &mut body_forces);
        self.aero.compute(body, &mut body_forces);

        self.telemetry = TelemetrySnapshot::project(&TelemetrySources {
            engine: &self.engine,
            transmission: &self.transmission,
            wheels: &self.wheels,
            body,
            input,
            pedals,
            summary,
            steer_angle_deg: self.distributor.steer_angle_deg(),
            diagnostics: &self.config.diagnostics,
        });

        TickOutput {
            commands: std::array::from_fn(|i| self.wheels[i].command),
            body_forces,
            telemetry: self.telemetry.clone(),
        }
    }

    /// Average |rpm| of the driven wheels.
    fn motor_wheel_rpm(&self) -> f32 {
        let (sum, n) = self
            .wheels
            .iter()
            .filter(|w| w.is_motor)
            .fold((0.0, 0usize), |(s, n), w| (s + w.sensor.angular_speed_rpm.abs(), n + 1));
        if n == 0 { 0.0 } else { sum / n as f32 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drivetrain::types::Vec3;

    const DT: f32 = 1.0 / 60.0;

    fn resting_sensors(v: &Vehicle) -> [WheelSensor; 4] {
        let load = v.config().nominal_wheel_load();
        std::array::from_fn(|i| WheelSensor {
            grounded: true,
            normal_load: load,
            compression: 0.5,
            ..WheelSensor::airborne(v.wheels()[i].radius)
        })
    }

    #[test]
    fn idle_vehicle_is_parked_with_full_command_set() {
        let mut v = Vehicle::from_preset(VehiclePreset::FamilySedan);
        let sensors = resting_sensors(&v);
        let out = v.tick(&BodySensor::default(), &sensors, DT);

        assert!(out.telemetry.is_parked);
        assert!(out.commands.iter().all(|c| c.brake_torque > 0.0 && c.friction.is_some()));
        assert!(out.commands.iter().all(|c| c.motor_torque == 0.0));
        assert_eq!(out.telemetry.engine_rpm, v.config().engine.idle_rpm);
        assert!(out.body_forces.is_empty());
    }

    #[test]
    fn throttle_at_rest_produces_drive_torque() {
        let mut v = Vehicle::from_preset(VehiclePreset::Sportscar);
        v.set_input(DriveInput::new(0.0, 1.0));
        let sensors = resting_sensors(&v);
        let out = v.tick(&BodySensor::default(), &sensors, DT);

        assert!(!out.telemetry.is_parked);
        assert!(out.commands[WheelId::RL.index()].motor_torque > 0.0);
        assert_eq!(out.commands[WheelId::FL.index()].motor_torque, 0.0);
    }

    #[test]
    fn nan_inputs_never_leak_into_commands() {
        let mut v = Vehicle::from_preset(VehiclePreset::RaceCar);
        v.set_input(DriveInput { steer: f32::NAN, throttle: f32::INFINITY });
        let mut sensors = resting_sensors(&v);
        sensors[0].normal_load = f32::NAN;
        sensors[1].forward_slip = f32::NEG_INFINITY;
        let body = BodySensor { linear_velocity: Vec3::new(0.0, 0.0, 12.0), ..BodySensor::default() };

        for _ in 0..30 {
            let out = v.tick(&body, &sensors, DT);
            for c in out.commands {
                assert!(c.motor_torque.is_finite() && c.brake_torque.is_finite() && c.steer_angle.is_finite());
            }
        }
    }

    #[test]
    fn held_brake_at_rest_selects_reverse() {
        let mut v = Vehicle::from_preset(VehiclePreset::FamilySedan);
        v.set_input(DriveInput::new(0.0, -1.0));
        let sensors = resting_sensors(&v);
        let mut out = v.tick(&BodySensor::default(), &sensors, DT);
        for _ in 0..40 {
            out = v.tick(&BodySensor::default(), &sensors, DT);
        }
        assert_eq!(v.transmission().gear(), Gear::Reverse);
        assert_eq!(out.telemetry.gear_label, "R");
        assert!(out.commands[WheelId::FL.index()].motor_torque < 0.0);
    }

    #[test]
    fn manual_neutral_survives_the_next_tick() {
        let mut v = Vehicle::from_preset(VehiclePreset::FamilySedan);
        let sensors = resting_sensors(&v);
        assert!(v.shift_down());
        assert!(!v.shift_down());

        let out = v.tick(&BodySensor::default(), &sensors, DT);
        assert_eq!(v.transmission().gear(), Gear::Neutral);
        assert_eq!(out.telemetry.gear_label, "N");
    }

    #[test]
    fn identical_runs_are_identical() {
        let run = || {
            let mut v = Vehicle::from_preset(VehiclePreset::SportSedan);
            let sensors = resting_sensors(&v);
            let mut outs = Vec::new();
            for i in 0..120 {
                v.set_input(DriveInput::new((i as f32 * 0.1).sin(), 0.8));
                let body = BodySensor { linear_velocity: Vec3::new(0.0, 0.0, i as f32 * 0.1), ..BodySensor::default() };
                outs.push(v.tick(&body, &sensors, DT));
            }
            outs
        };
        assert_eq!(run(), run());
    }
}
