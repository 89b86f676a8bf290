// ==============================================================================
// distributor.rs - PER-WHEEL TORQUE / BRAKE / STEER COMMANDS
// ------------------------------------------------------------------------------
// Input side:
//   DirectionSelector  turns the single throttle axis into a travel direction.
//                      Flipping needs near-standstill plus a continuous hold of
//                      the opposing input; after a flip it stays locked until
//                      the input is released.
//   Pedals             throttle/brake split of that axis for the direction.
//
// Per motor wheel, in order:
//   1) even split of drive torque over motor wheels
//   2) engine braking faded out near standstill (never pushes the car backwards)
//   3) power limit     min(|T| / r, P / max(speed, 1)) * r
//   4) top speed fade  clamp01((top - speed) / (fade * top)), propulsive only
//   5) traction control on the slip measured along the torque
//   6) grip limit      |T| <= mu * Fz * r * safety
//   7) airborne        T * airborne_torque_scale
//
// Brakes: bias split front/rear, per wheel = share / 2. Park hold applies the
// full brake with no input near standstill; coasting adds a small rolling
// resistance brake on motor wheels.
//
// Steering: input * lerp(max_angle, max_angle_at_speed, speed / top_speed),
// rate-limited, emitted in radians.
// ==============================================================================

use crate::drivetrain::config::{
    BrakeSpec, DirectionSpec, LimitSpec, SteeringSpec, TractionControlSpec, VehicleConfig,
};
use crate::drivetrain::friction::{traction_control_factor, FrictionModel};
use crate::drivetrain::types::{clamp01, finite_or, lerp, move_towards};
use crate::drivetrain::wheel::WheelChannel;

/// Below this speed (m/s) the power limit uses 1 m/s.
const POWER_LIMIT_MIN_SPEED: f32 = 1.0;

// ============================================
// direction
// ============================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Forward,
    Reverse,
}

impl Direction {
    pub fn sign(&self) -> f32 {
        match self {
            Direction::Forward => 1.0,
            Direction::Reverse => -1.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DirectionSelector {
    spec: DirectionSpec,
    direction: Direction,
    hold: f32,
    locked: bool,
}

impl DirectionSelector {
    pub fn new(spec: DirectionSpec) -> Self {
        Self {
            spec,
            direction: Direction::Forward,
            hold: 0.0,
            locked: false,
        }
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn is_locked(&self) -> bool {
        self.locked
    }

    pub fn update(&mut self, throttle_input: f32, forward_speed: f32, dt: f32) -> Direction {
        let input = finite_or(throttle_input, 0.0);
        if input.abs() < self.spec.input_deadzone {
            self.hold = 0.0;
            self.locked = false;
            return self.direction;
        }

        let wanted = if input > 0.0 { Direction::Forward } else { Direction::Reverse };
        if wanted == self.direction || self.locked {
            self.hold = 0.0;
            return self.direction;
        }

        if finite_or(forward_speed, 0.0).abs() < self.spec.near_stop_speed {
            self.hold += finite_or(dt, 0.0).max(0.0);
            if self.hold >= self.spec.reverse_engage_delay {
                tracing::debug!(?wanted, "direction flipped");
                self.direction = wanted;
                self.hold = 0.0;
                self.locked = true;
            }
        } else {
            self.hold = 0.0;
        }
        self.direction
    }
}

/// Throttle/brake split of the input axis for the current direction (both 0..1).
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Pedals {
    pub throttle: f32,
    pub brake: f32,
}

impl Pedals {
    pub fn from_input(throttle_input: f32, direction: Direction, deadzone: f32) -> Self {
        let along = finite_or(throttle_input, 0.0).clamp(-1.0, 1.0) * direction.sign();
        if along.abs() < deadzone {
            return Self::default();
        }
        if along > 0.0 {
            Self { throttle: along, brake: 0.0 }
        } else {
            Self { throttle: 0.0, brake: -along }
        }
    }

    pub fn is_idle(&self) -> bool {
        self.throttle <= 0.0 && self.brake <= 0.0
    }
}

// ============================================
// distribution
// ============================================

/// Everything the distributor needs from the rest of the tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DriveContext {
    pub drive_torque: f32, // total at the wheels, signed
    pub gear_sign: f32,    // +1 forward, -1 reverse, 0 neutral
    pub pedals: Pedals,
    pub steer: f32,         // -1..1
    pub forward_speed: f32, // m/s, signed
    pub speed: f32,         // m/s
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DistributionSummary {
    pub motor_torque: f32,
    pub brake_torque: f32,
    pub parked: bool,
    pub traction_control_active: bool,
}

#[derive(Debug, Clone)]
pub struct DriveDistributor {
    brakes: BrakeSpec,
    steering: SteeringSpec,
    direction: DirectionSpec,
    limits: LimitSpec,
    traction_control: TractionControlSpec,
    power_per_wheel_w: f32,
    motor_count: usize,
    steer_angle_deg: f32,
}

impl DriveDistributor {
    pub fn new(config: &VehicleConfig) -> Self {
        let motor_count = config.wheels.iter().filter(|w| w.is_motor).count().max(1);
        let power_w = config.engine.peak_power_kw * 1000.0 * config.transmission.drivetrain_efficiency;

        Self {
            brakes: config.brakes,
            steering: config.steering,
            direction: config.direction,
            limits: config.limits,
            traction_control: config.traction_control,
            power_per_wheel_w: power_w / motor_count as f32,
            motor_count,
            steer_angle_deg: 0.0,
        }
    }

    pub fn motor_count(&self) -> usize {
        self.motor_count
    }

    /// Current (rate-limited) steering angle in degrees.
    pub fn steer_angle_deg(&self) -> f32 {
        self.steer_angle_deg
    }

    pub fn steer_target_deg(&self, steer: f32, speed: f32) -> f32 {
        let t = finite_or(speed, 0.0).abs() / self.limits.top_speed.max(1.0);
        let max_angle = lerp(self.steering.max_angle_deg, self.steering.max_angle_at_speed_deg, t);
        finite_or(steer, 0.0).clamp(-1.0, 1.0) * max_angle
    }

    /// Moves the steering angle toward its target; returns radians.
    pub fn update_steering(&mut self, steer: f32, speed: f32, dt: f32) -> f32 {
        let target = self.steer_target_deg(steer, speed);
        let step = self.steering.rate_deg_per_sec * finite_or(dt, 0.0).max(0.0);
        self.steer_angle_deg = move_towards(self.steer_angle_deg, target, step);
        self.steer_angle_deg.to_radians()
    }

    pub fn power_limited(&self, torque: f32, radius: f32, speed: f32) -> f32 {
        let radius = radius.max(1e-3);
        let force_from_torque = torque.abs() / radius;
        let force_from_power = self.power_per_wheel_w / finite_or(speed, 0.0).abs().max(POWER_LIMIT_MIN_SPEED);
        force_from_torque.min(force_from_power) * radius * torque.signum()
    }

    /// 1 well below top speed, 0 at and above it.
    pub fn top_speed_factor(&self, speed: f32) -> f32 {
        let top = self.limits.top_speed;
        let band = (self.limits.top_speed_fade * top).max(1e-3);
        clamp01((top - finite_or(speed, 0.0).abs()) / band)
    }

    /// Brake torque per wheel (front, rear) for a 0..1 pedal.
    pub fn brake_split(&self, brake: f32) -> (f32, f32) {
        let total = clamp01(brake) * self.brakes.max_brake_torque;
        let bias = clamp01(self.brakes.front_bias);
        (total * bias * 0.5, total * (1.0 - bias) * 0.5)
    }

    pub fn distribute(
        &mut self,
        ctx: &DriveContext,
        friction: &FrictionModel,
        wheels: &mut [WheelChannel; 4],
        dt: f32,
    ) -> DistributionSummary {
        let steer_rad = self.update_steering(ctx.steer, ctx.speed, dt);

        let parked = ctx.pedals.is_idle() && ctx.speed.abs() < self.brakes.park_speed;
        let brake_pedal = if parked { 1.0 } else { ctx.pedals.brake };
        let (front_brake, rear_brake) = self.brake_split(brake_pedal);
        let coasting = ctx.pedals.is_idle() && !parked;

        let per_wheel = finite_or(ctx.drive_torque, 0.0) / self.motor_count as f32;
        let mut summary = DistributionSummary { parked, ..Default::default() };

        for wheel in wheels.iter_mut() {
            let mut brake = if wheel.is_front { front_brake } else { rear_brake };
            let mut torque = 0.0;

            if wheel.is_motor {
                let (t, tc_active) = self.wheel_torque(per_wheel, ctx, friction, wheel);
                torque = t;
                summary.traction_control_active |= tc_active;
                if coasting {
                    brake += self.brakes.coast_brake_torque;
                }
            }

            wheel.command.motor_torque = finite_or(torque, 0.0);
            wheel.command.brake_torque = finite_or(brake, 0.0).max(0.0);
            wheel.command.steer_angle = if wheel.is_steer { steer_rad } else { 0.0 };

            summary.motor_torque += wheel.command.motor_torque;
            summary.brake_torque += wheel.command.brake_torque;
        }

        summary
    }

    fn wheel_torque(&self, torque: f32, ctx: &DriveContext, friction: &FrictionModel, wheel: &WheelChannel) -> (f32, bool) {
        if torque == 0.0 || ctx.gear_sign == 0.0 {
            return (0.0, false);
        }
        let mut torque = torque;
        let propulsive = torque * ctx.gear_sign > 0.0;

        if !propulsive {
            let moving_along = ctx.forward_speed * ctx.gear_sign;
            torque *= clamp01(moving_along / self.direction.near_stop_speed.max(1e-3));
        }

        torque = self.power_limited(torque, wheel.sensor.radius, ctx.forward_speed);

        let mut tc_active = false;
        if propulsive {
            torque *= self.top_speed_factor(ctx.speed);

            let slip_along = wheel.sensor.forward_slip * torque.signum();
            let tc = traction_control_factor(slip_along, &self.traction_control);
            tc_active = tc < 1.0;
            torque *= tc;
        }

        if wheel.sensor.grounded {
            let limit = friction.grip_torque_limit(wheel.sensor.normal_load, wheel.sensor.radius);
            torque = torque.clamp(-limit, limit);
        } else {
            torque *= self.limits.airborne_torque_scale;
        }

        (torque, tc_active)
    }
}
