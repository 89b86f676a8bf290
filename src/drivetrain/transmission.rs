// ==============================================================================
// transmission.rs - GEAR STATE MACHINE + CLUTCH ENGAGEMENT
// ------------------------------------------------------------------------------
// Gear:        Reverse | Neutral | Forward(1..N)
// ShiftState:  Idle | Shifting { from, to, remaining }
//
// The shift state is the single source of truth for "is shifting" and for the
// clutch engagement that both the engine (coupling) and the distributor (drive
// torque floor) consume.
//
// Forward -> Forward changes go through a timed shift:
//   request -> Shifting (clutch = shift_engagement, gear still `from`)
//           -> timer elapsed -> commit `to`, cooldown starts
// Anything touching Neutral/Reverse is an instantaneous select.
//
// Clutch engagement (ICE, in gear, not shifting):
//   speed < clutch_slip_speed  lerp(launch_engagement, 1, speed / slip_speed)
//   otherwise                  1
//
// Electric: one fixed ratio, always engaged, leaves Neutral on its own.
// ==============================================================================

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::drivetrain::config::{EngineKind, TransmissionMode, TransmissionSpec};
use crate::drivetrain::engine::Coupling;
use crate::drivetrain::types::{clamp01, finite_or, lerp, EPSILON};

/// Shift timers below this count as elapsed (float accumulation slack).
const SHIFT_TIMER_SLACK: f32 = 1e-5;

/// Below this speed an electric motor is free to run ahead of its wheels.
pub const ELECTRIC_STANDSTILL_SPEED: f32 = 1.0;

/// Engagement at or above which the engine is treated as locked to the wheels.
pub const LOCK_ENGAGEMENT: f32 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Gear {
    Reverse,
    Neutral,
    Forward(u8),
}

impl Gear {
    /// -1 reverse, 0 neutral, 1..N forward.
    pub fn index(&self) -> i8 {
        match self {
            Gear::Reverse => -1,
            Gear::Neutral => 0,
            Gear::Forward(n) => i8::try_from(*n).unwrap_or(i8::MAX),
        }
    }

    /// Sign applied to drive torque (+1 forward, -1 reverse, 0 neutral).
    pub fn sign(&self) -> f32 {
        match self {
            Gear::Reverse => -1.0,
            Gear::Neutral => 0.0,
            Gear::Forward(_) => 1.0,
        }
    }

    pub fn is_forward(&self) -> bool {
        matches!(self, Gear::Forward(_))
    }
}

impl fmt::Display for Gear {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Gear::Reverse => write!(f, "R"),
            Gear::Neutral => write!(f, "N"),
            Gear::Forward(n) => write!(f, "{n}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ShiftState {
    Idle,
    Shifting { from: Gear, to: Gear, remaining: f32 },
}

/// Per-tick inputs to the shift logic.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShiftInputs {
    pub engine_rpm: f32,
    pub max_rpm: f32,
    pub throttle: f32, // 0..1, engine side
    pub speed: f32,    // m/s, unsigned
}

#[derive(Debug, Clone)]
pub struct TransmissionModel {
    spec: TransmissionSpec,
    kind: EngineKind,
    gear: Gear,
    shift: ShiftState,
    clutch: f32,
    cooldown: f32,
}

impl TransmissionModel {
    pub fn new(spec: TransmissionSpec, kind: EngineKind) -> Self {
        let gear = match kind {
            EngineKind::Ice => Gear::Forward(1),
            EngineKind::Electric => Gear::Neutral,
        };
        let mut model = Self {
            spec,
            kind,
            gear,
            shift: ShiftState::Idle,
            clutch: 0.0,
            cooldown: 0.0,
        };
        model.clutch = model.target_engagement(0.0);
        model
    }

    pub fn spec(&self) -> &TransmissionSpec {
        &self.spec
    }

    pub fn gear(&self) -> Gear {
        self.gear
    }

    pub fn gear_index(&self) -> i8 {
        self.gear.index()
    }

    pub fn gear_label(&self) -> String {
        self.gear.to_string()
    }

    pub fn shift_state(&self) -> ShiftState {
        self.shift
    }

    pub fn is_shifting(&self) -> bool {
        matches!(self.shift, ShiftState::Shifting { .. })
    }

    pub fn shift_time_remaining(&self) -> f32 {
        match self.shift {
            ShiftState::Shifting { remaining, .. } => remaining.max(0.0),
            ShiftState::Idle => 0.0,
        }
    }

    pub fn clutch_engagement(&self) -> f32 {
        self.clutch
    }

    pub fn cooldown_remaining(&self) -> f32 {
        self.cooldown
    }

    /// Number of forward gears, capped so every gear has an `i8` index.
    pub fn gear_count(&self) -> u8 {
        match self.kind {
            EngineKind::Electric => 1,
            EngineKind::Ice => self.spec.gear_ratios.len().clamp(1, i8::MAX as usize) as u8,
        }
    }

    // ============================================
    // ratios
    // ============================================

    /// Signed gearbox ratio for `gear` (without final drive).
    pub fn ratio_for_gear(&self, gear: Gear) -> f32 {
        match (self.kind, gear) {
            (_, Gear::Neutral) => 0.0,
            (EngineKind::Electric, Gear::Forward(_)) => self.spec.electric_fixed_ratio,
            (EngineKind::Electric, Gear::Reverse) => -self.spec.electric_fixed_ratio,
            (EngineKind::Ice, Gear::Reverse) => -self.spec.reverse_ratio,
            (EngineKind::Ice, Gear::Forward(n)) => {
                let ratios = &self.spec.gear_ratios;
                if ratios.is_empty() {
                    return 0.0;
                }
                let i = (n.max(1) as usize - 1).min(ratios.len() - 1);
                ratios[i]
            }
        }
    }

    /// Gear ratio x final drive for the current gear.
    pub fn total_ratio(&self) -> f32 {
        self.ratio_for_gear(self.gear) * self.spec.final_drive_ratio
    }

    pub fn drive_torque(&self, engine_torque: f32) -> f32 {
        if self.kind == EngineKind::Ice && self.clutch < self.spec.engagement_floor {
            return 0.0;
        }
        finite_or(engine_torque, 0.0) * self.total_ratio() * self.spec.drivetrain_efficiency
    }

    /// Engine rpm after moving from `from` to `to` at constant wheel speed.
    pub fn rpm_after_shift(&self, rpm: f32, from: Gear, to: Gear) -> f32 {
        let from_ratio = self.ratio_for_gear(from).abs();
        if from_ratio < EPSILON {
            return rpm;
        }
        rpm * self.ratio_for_gear(to).abs() / from_ratio
    }

    /// How the engine should integrate this tick given the average motor-wheel
    /// rpm and the body's unsigned speed.
    pub fn coupling(&self, wheel_rpm: f32, speed: f32) -> Coupling {
        let engine_side = finite_or(wheel_rpm, 0.0).abs() * self.total_ratio().abs();

        if self.kind == EngineKind::Electric {
            if finite_or(speed, 0.0).abs() < ELECTRIC_STANDSTILL_SPEED {
                return Coupling::Slipping { wheel_rpm: engine_side, engagement: 1.0 };
            }
            return Coupling::Locked { wheel_rpm: engine_side };
        }
        if self.gear == Gear::Neutral || self.is_shifting() {
            return Coupling::Free;
        }
        if self.clutch < LOCK_ENGAGEMENT {
            Coupling::Slipping { wheel_rpm: engine_side, engagement: self.clutch }
        } else {
            Coupling::Locked { wheel_rpm: engine_side }
        }
    }

    // ============================================
    // transitions
    // ============================================

    /// Instantaneous gear change (no timer). Aborts a shift in progress.
    pub fn select(&mut self, gear: Gear) {
        let gear = match gear {
            Gear::Forward(n) => Gear::Forward(n.clamp(1, self.gear_count())),
            other => other,
        };
        if gear != self.gear {
            tracing::debug!(from = %self.gear, to = %gear, "gear selected");
        }
        self.gear = gear;
        self.shift = ShiftState::Idle;
    }

    /// Starts a shift towards `to`. Returns false when blocked by an active
    /// shift, the cooldown or an out-of-range gear.
    pub fn request_shift(&mut self, to: Gear) -> bool {
        if self.is_shifting() || self.cooldown > 0.0 {
            return false;
        }
        if let Gear::Forward(n) = to {
            if n == 0 || n > self.gear_count() {
                return false;
            }
        }
        if to == self.gear {
            return false;
        }

        if !(self.gear.is_forward() && to.is_forward()) || self.kind == EngineKind::Electric {
            self.select(to);
            return true;
        }

        if self.spec.shift_duration <= SHIFT_TIMER_SLACK {
            self.commit(to);
            return true;
        }

        tracing::debug!(from = %self.gear, to = %to, "shift started");
        self.shift = ShiftState::Shifting {
            from: self.gear,
            to,
            remaining: self.spec.shift_duration,
        };
        self.clutch = self.spec.shift_engagement;
        true
    }

    /// Manual request one gear up. Reverse belongs to the direction selector,
    /// so a manual request never enters or leaves it.
    pub fn shift_up(&mut self) -> bool {
        match self.gear {
            Gear::Reverse => false,
            Gear::Neutral => self.request_shift(Gear::Forward(1)),
            Gear::Forward(n) => self.request_shift(Gear::Forward(n.saturating_add(1))),
        }
    }

    pub fn shift_down(&mut self) -> bool {
        match self.gear {
            Gear::Reverse | Gear::Neutral => false,
            Gear::Forward(1) => self.request_shift(Gear::Neutral),
            Gear::Forward(n) => self.request_shift(Gear::Forward(n - 1)),
        }
    }

    fn commit(&mut self, to: Gear) {
        tracing::debug!(from = %self.gear, to = %to, "shift committed");
        self.gear = to;
        self.shift = ShiftState::Idle;
        self.cooldown = self.spec.shift_cooldown;
    }

    /// Advances timers, runs the automatic logic and refreshes clutch engagement.
    pub fn update(&mut self, inputs: ShiftInputs, dt: f32) {
        let dt = finite_or(dt, 0.0).max(0.0);
        let speed = finite_or(inputs.speed, 0.0).abs();
        self.cooldown = (self.cooldown - dt).max(0.0);

        if self.kind == EngineKind::Electric {
            if self.gear == Gear::Neutral {
                self.select(Gear::Forward(1));
            }
            self.clutch = 1.0;
            return;
        }

        if let ShiftState::Shifting { to, remaining, .. } = self.shift {
            let remaining = remaining - dt;
            if remaining <= SHIFT_TIMER_SLACK {
                self.commit(to);
            } else if let ShiftState::Shifting { remaining: r, .. } = &mut self.shift {
                *r = remaining;
            }
        }

        if self.spec.mode == TransmissionMode::Automatic {
            self.automatic_logic(inputs, speed);
        }

        self.clutch = self.target_engagement(speed);
    }

    fn automatic_logic(&mut self, inputs: ShiftInputs, speed: f32) {
        if self.is_shifting() || self.cooldown > 0.0 {
            return;
        }
        let throttle = clamp01(finite_or(inputs.throttle, 0.0));

        let n = match self.gear {
            Gear::Forward(n) => n,
            Gear::Neutral if throttle > 0.0 => {
                self.select(Gear::Forward(1));
                return;
            }
            _ => return,
        };

        let max_rpm = inputs.max_rpm.max(EPSILON);
        let rpm = finite_or(inputs.engine_rpm, 0.0);
        let fraction = rpm / max_rpm;
        let launching = speed < self.spec.clutch_slip_speed;

        if fraction >= self.spec.upshift_threshold && n < self.gear_count() && !launching {
            self.request_shift(Gear::Forward(n + 1));
            return;
        }

        if n <= 1 {
            return;
        }
        let lower = Gear::Forward(n - 1);
        let after = self.rpm_after_shift(rpm, self.gear, lower) / max_rpm;
        if after >= self.spec.upshift_threshold {
            return;
        }

        let kickdown = throttle >= self.spec.kickdown_throttle && fraction < self.spec.kickdown_rpm_fraction;
        let relaxed = fraction <= self.spec.downshift_threshold && throttle < self.spec.downshift_max_throttle;
        if kickdown || relaxed {
            self.request_shift(lower);
        }
    }

    fn target_engagement(&self, speed: f32) -> f32 {
        if self.kind == EngineKind::Electric {
            return 1.0;
        }
        if self.is_shifting() {
            return self.spec.shift_engagement;
        }
        if self.gear == Gear::Neutral {
            return 0.0;
        }
        let slip_speed = self.spec.clutch_slip_speed;
        if slip_speed > EPSILON && speed < slip_speed {
            lerp(self.spec.launch_engagement, 1.0, speed / slip_speed)
        } else {
            1.0
        }
    }
}
