//! Core shared types for `drivetrain` (engine-agnostic).
// drivetrain/types.rs
use std::fmt;

use nalgebra::{Point3, Vector3};
use serde::{Deserialize, Serialize};

use crate::drivetrain::curve::FrictionCurve;

pub type Vec3 = Vector3<f32>;
pub type Pos3 = Point3<f32>;

/// Floor used before every division by a speed, ratio or RPM.
pub const EPSILON: f32 = 1e-4;

pub const GRAVITY: f32 = 9.81;

// ----- scalar helpers: clamped interpolation and rate-limited approach -----
#[inline] pub fn clamp01(x: f32) -> f32 { x.clamp(0.0, 1.0) }
#[inline] pub fn lerp(a: f32, b: f32, t: f32) -> f32 { a + (b - a) * clamp01(t) }

#[inline]
pub fn inverse_lerp(a: f32, b: f32, v: f32) -> f32 {
    if (b - a).abs() < EPSILON { 0.0 } else { clamp01((v - a) / (b - a)) }
}

#[inline]
pub fn move_towards(current: f32, target: f32, max_delta: f32) -> f32 {
    let delta = target - current;
    if delta.abs() <= max_delta { target } else { current + max_delta.copysign(delta) }
}

/// Replaces NaN/inf with `fallback` so a bad sensor value never leaks into a command.
#[inline]
pub fn finite_or(x: f32, fallback: f32) -> f32 {
    if x.is_finite() { x } else { fallback }
}

// ============================================
// Wheel identification
// ============================================

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum WheelId { FL, FR, RL, RR }

impl WheelId {
    /// Fixed iteration order of the four wheel channels.
    pub const ALL: [WheelId; 4] = [WheelId::FL, WheelId::FR, WheelId::RL, WheelId::RR];

    pub fn index(&self) -> usize {
        match self {
            WheelId::FL => 0,
            WheelId::FR => 1,
            WheelId::RL => 2,
            WheelId::RR => 3,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            WheelId::FL => "FL",
            WheelId::FR => "FR",
            WheelId::RL => "RL",
            WheelId::RR => "RR",
        }
    }

    pub fn is_front(&self) -> bool {
        matches!(self, WheelId::FL | WheelId::FR)
    }

    pub fn is_left(&self) -> bool {
        matches!(self, WheelId::FL | WheelId::RL)
    }
}

impl fmt::Display for WheelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================
// ----- inputs -------------------------------
// ============================================

/// The player's 2D input vector, read once at tick start.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct DriveInput {
    pub steer: f32,    // -1..1
    pub throttle: f32, // -1..1 (negative = brake / reverse)
}

impl DriveInput {
    pub fn new(steer: f32, throttle: f32) -> Self {
        Self { steer, throttle }.sanitized()
    }

    pub fn sanitized(self) -> Self {
        Self {
            steer: finite_or(self.steer, 0.0).clamp(-1.0, 1.0),
            throttle: finite_or(self.throttle, 0.0).clamp(-1.0, 1.0),
        }
    }
}

// ============================================
// ----- sensors (physics engine -> core) -----
// ============================================

/// Per-wheel contact snapshot from the suspension solver.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WheelSensor {
    pub grounded: bool,
    pub normal_load: f32,        // N
    pub forward_slip: f32,       // signed, ~-1.5..1.5
    pub sideways_slip: f32,      // signed
    pub angular_speed_rpm: f32,  // signed
    pub radius: f32,             // m
    pub compression: f32,        // 0 = fully extended, 1 = fully compressed
    pub contact_point: Pos3,     // world
}

impl WheelSensor {
    /// An airborne wheel with no contact.
    pub fn airborne(radius: f32) -> Self {
        Self {
            grounded: false,
            normal_load: 0.0,
            forward_slip: 0.0,
            sideways_slip: 0.0,
            angular_speed_rpm: 0.0,
            radius,
            compression: 0.0,
            contact_point: Pos3::origin(),
        }
    }
}

/// Rigid-body snapshot of the chassis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BodySensor {
    pub linear_velocity: Vec3,  // world, m/s
    pub angular_velocity: Vec3, // world, rad/s
    pub forward: Vec3,          // unit, world
    pub up: Vec3,               // unit, world
    pub center_of_mass: Pos3,   // world
}

impl BodySensor {
    /// Signed speed along the chassis forward axis.
    pub fn forward_speed(&self) -> f32 {
        finite_or(self.linear_velocity.dot(&self.forward), 0.0)
    }

    pub fn speed(&self) -> f32 {
        finite_or(self.linear_velocity.norm(), 0.0)
    }

    pub fn yaw_rate(&self) -> f32 {
        finite_or(self.angular_velocity.dot(&self.up), 0.0)
    }
}

impl Default for BodySensor {
    fn default() -> Self {
        Self {
            linear_velocity: Vec3::zeros(),
            angular_velocity: Vec3::zeros(),
            forward: Vec3::z(),
            up: Vec3::y(),
            center_of_mass: Pos3::origin(),
        }
    }
}

// ============================================
// ----- commands (core -> physics engine) ----
// ============================================

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct WheelCommand {
    pub motor_torque: f32, // N*m, signed
    pub brake_torque: f32, // N*m, >= 0
    pub steer_angle: f32,  // radians
    pub friction: Option<FrictionOverride>,
}

/// Forward + sideways friction curves for one wheel.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FrictionOverride {
    pub forward: FrictionCurve,
    pub sideways: FrictionCurve,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BodyForce {
    /// Force in world space (N).
    pub force: Vec3,

    /// Optional application point (world). If None => apply at COM.
    pub at_point: Option<Pos3>,
}
