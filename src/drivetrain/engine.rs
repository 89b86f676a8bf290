// ==============================================================================
// engine.rs - ENGINE TORQUE MODEL (COMBUSTION + ELECTRIC)
// ==============================================================================
// calculate_torque(rpm, throttle) is pure: it reads the immutable curve built at
// construction and never touches current_rpm.
//
// ICE:
//   torque curve over normalized rpm x = (rpm - idle) / (max - idle):
//     x = 0                 idle_torque_fraction
//     x = peak torque rpm   1.0
//     x = peak power rpm    P / (T_peak * w_pp)   (so torque * w hits peak power)
//     x = 1                 redline_torque_fraction (never zero, no torque cliff)
//
// Electric:
//   crossover = P / T_peak (rad/s -> rpm)
//   rpm <= crossover   T_peak            (constant torque)
//   rpm >  crossover   P / w             (constant power)
//
// Both subtract friction + engine braking:
//   drag = friction + braking * (1 - throttle) * rpm / max
// and never go negative while the throttle is open.
//
// RPM update, one of three couplings (decided by the transmission):
//   Free      rpm += T / I * dt, decays to idle off-throttle
//   Slipping  rpm -> max(wheel_rpm * clutch, lerp(idle + 800, peak_power_rpm, throttle))
//             (idle instead of the lerp with the throttle closed)
//   Locked    rpm -> wheel_rpm
// Electric motors are Slipping only below walking pace, where the rotor may run
// ahead of held wheels up to max_rpm * throttle * 0.3.
// Slipping/Locked move at a bounded rate so a shift never jumps the needle.
// ==============================================================================

use std::f32::consts::PI;

use crate::drivetrain::config::{EngineKind, EngineSpec};
use crate::drivetrain::curve::{Keyframe, SampledCurve};
use crate::drivetrain::types::{clamp01, finite_or, lerp, move_towards, EPSILON};

pub const RAD_S_TO_RPM: f32 = 60.0 / (2.0 * PI);
pub const RPM_TO_RAD_S: f32 = 2.0 * PI / 60.0;

/// Throttle below this counts as closed.
pub const THROTTLE_EPSILON: f32 = 0.01;

/// Launch-slip target starts this far above idle.
const LAUNCH_RPM_OFFSET: f32 = 800.0;

/// Seconds (per kg*m^2 of inertia) to sweep idle..max when coupled.
const RESPONSE_TIME_PER_INERTIA: f32 = 10.0;

/// Electric motors follow the wheels this many full ranges per second.
const ELECTRIC_RESPONSE: f32 = 5.0;

/// A held electric motor spins up to this fraction of max rpm per unit throttle.
const ELECTRIC_STANDSTILL_SPIN: f32 = 0.3;
const ELECTRIC_STANDSTILL_THROTTLE: f32 = 0.1;

/// How the engine is connected to the wheels this tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Coupling {
    /// Neutral or clutch open: the engine revs against its own inertia.
    Free,
    /// Launch slip: clutch partly closed. For an electric motor, the car
    /// is below walking pace and the rotor may run ahead of the wheels.
    Slipping { wheel_rpm: f32, engagement: f32 },
    /// Clutch closed: rpm follows the wheels.
    Locked { wheel_rpm: f32 },
}

#[derive(Debug, Clone)]
pub struct EngineModel {
    spec: EngineSpec,
    torque_curve: SampledCurve,
    crossover_rpm: f32,
    current_rpm: f32,
    output_torque: f32,
}

impl EngineModel {
    pub fn new(spec: EngineSpec) -> Self {
        let torque_curve = build_torque_curve(&spec);
        let crossover_rpm = crossover_rpm(&spec);
        let current_rpm = match spec.kind {
            EngineKind::Ice => spec.idle_rpm,
            EngineKind::Electric => 0.0,
        };

        Self {
            spec,
            torque_curve,
            crossover_rpm,
            current_rpm,
            output_torque: 0.0,
        }
    }

    pub fn spec(&self) -> &EngineSpec {
        &self.spec
    }

    pub fn kind(&self) -> EngineKind {
        self.spec.kind
    }

    pub fn current_rpm(&self) -> f32 {
        self.current_rpm
    }

    /// Net torque produced by the last `update`.
    pub fn output_torque(&self) -> f32 {
        self.output_torque
    }

    pub fn crossover_rpm(&self) -> f32 {
        self.crossover_rpm
    }

    pub fn torque_curve(&self) -> &SampledCurve {
        &self.torque_curve
    }

    pub fn min_rpm(&self) -> f32 {
        match self.spec.kind {
            EngineKind::Ice => self.spec.idle_rpm,
            EngineKind::Electric => 0.0,
        }
    }

    pub fn normalized_rpm(&self) -> f32 {
        clamp01(self.current_rpm / self.spec.max_rpm.max(EPSILON))
    }

    /// Torque before friction and engine braking.
    pub fn gross_torque(&self, rpm: f32, throttle: f32) -> f32 {
        let rpm = finite_or(rpm, 0.0).max(0.0);
        let throttle = clamp01(finite_or(throttle, 0.0));

        if rpm >= self.spec.max_rpm - self.spec.rev_limiter_band {
            return 0.0;
        }

        match self.spec.kind {
            EngineKind::Ice => {
                let span = (self.spec.max_rpm - self.spec.idle_rpm).max(EPSILON);
                let x = (rpm - self.spec.idle_rpm) / span;
                self.torque_curve.evaluate(x) * self.spec.peak_torque_nm * throttle
            }
            EngineKind::Electric => {
                if rpm <= self.crossover_rpm {
                    self.spec.peak_torque_nm * throttle
                } else {
                    let omega = (rpm * RPM_TO_RAD_S).max(EPSILON);
                    (self.spec.peak_power_kw * 1000.0 / omega).min(self.spec.peak_torque_nm) * throttle
                }
            }
        }
    }

    /// Friction plus closed-throttle engine braking at `rpm`.
    pub fn drag_torque(&self, rpm: f32, throttle: f32) -> f32 {
        let rpm = finite_or(rpm, 0.0).max(0.0);
        let throttle = clamp01(finite_or(throttle, 0.0));
        let rpm_frac = clamp01(rpm / self.spec.max_rpm.max(EPSILON));
        self.spec.friction_torque + self.spec.braking_torque * (1.0 - throttle) * rpm_frac
    }

    /// Net engine torque at (rpm, throttle). Pure.
    pub fn calculate_torque(&self, rpm: f32, throttle: f32) -> f32 {
        let net = self.gross_torque(rpm, throttle) - self.drag_torque(rpm, throttle);
        if clamp01(finite_or(throttle, 0.0)) > THROTTLE_EPSILON {
            net.max(0.0)
        } else {
            net
        }
    }

    /// Advances rpm by one tick; returns the net torque at the new rpm.
    pub fn update(&mut self, throttle: f32, coupling: Coupling, dt: f32) -> f32 {
        let throttle = clamp01(finite_or(throttle, 0.0));
        let dt = finite_or(dt, 0.0).max(0.0);
        let min_rpm = self.min_rpm();
        let max_rpm = self.spec.max_rpm;

        let rpm = match (self.spec.kind, coupling) {
            (_, Coupling::Free) => {
                let torque = self.calculate_torque(self.current_rpm, throttle);
                let inertia = self.spec.inertia.max(EPSILON);
                let mut rpm = self.current_rpm + torque / inertia * dt * RAD_S_TO_RPM;
                if throttle < THROTTLE_EPSILON {
                    rpm = move_towards(rpm, min_rpm, self.spec.idle_return_rate * dt);
                }
                rpm
            }
            (EngineKind::Electric, Coupling::Slipping { wheel_rpm, .. }) => {
                let mut target = finite_or(wheel_rpm, 0.0).abs();
                if throttle > ELECTRIC_STANDSTILL_THROTTLE {
                    target = target.max(max_rpm * throttle * ELECTRIC_STANDSTILL_SPIN);
                }
                move_towards(self.current_rpm, target.min(max_rpm), max_rpm * ELECTRIC_RESPONSE * dt)
            }
            (EngineKind::Electric, Coupling::Locked { wheel_rpm }) => {
                let target = finite_or(wheel_rpm, 0.0).abs().min(max_rpm);
                move_towards(self.current_rpm, target, max_rpm * ELECTRIC_RESPONSE * dt)
            }
            (EngineKind::Ice, Coupling::Slipping { wheel_rpm, engagement }) => {
                let wheel_rpm = finite_or(wheel_rpm, 0.0).abs();
                let free_rev = if throttle < THROTTLE_EPSILON {
                    self.spec.idle_rpm
                } else {
                    lerp(self.spec.idle_rpm + LAUNCH_RPM_OFFSET, self.spec.peak_power_rpm, throttle)
                };
                let target = (wheel_rpm * clamp01(engagement)).max(free_rev).min(max_rpm);
                move_towards(self.current_rpm, target, self.coupled_rate() * dt)
            }
            (EngineKind::Ice, Coupling::Locked { wheel_rpm }) => {
                let target = finite_or(wheel_rpm, 0.0).abs().max(min_rpm).min(max_rpm);
                move_towards(self.current_rpm, target, self.coupled_rate() * dt)
            }
        };

        self.current_rpm = finite_or(rpm, min_rpm).clamp(min_rpm, max_rpm);
        self.output_torque = self.calculate_torque(self.current_rpm, throttle);
        self.output_torque
    }

    fn coupled_rate(&self) -> f32 {
        (self.spec.max_rpm - self.spec.idle_rpm) / (self.spec.inertia * RESPONSE_TIME_PER_INERTIA).max(EPSILON)
    }

    /// Engine rpm the wheels would impose through `total_ratio`.
    pub fn rpm_from_wheel(wheel_rpm: f32, total_ratio: f32) -> f32 {
        if total_ratio.abs() < EPSILON {
            return 0.0;
        }
        finite_or(wheel_rpm, 0.0).abs() * total_ratio.abs()
    }

    pub fn power_kw(&self) -> f32 {
        (self.output_torque.max(0.0) * self.current_rpm) / 9549.0
    }

    pub fn power_hp(&self) -> f32 {
        self.power_kw() * 1.341
    }
}

fn crossover_rpm(spec: &EngineSpec) -> f32 {
    let omega = spec.peak_power_kw * 1000.0 / spec.peak_torque_nm.max(EPSILON);
    omega * RAD_S_TO_RPM
}

fn build_torque_curve(spec: &EngineSpec) -> SampledCurve {
    if spec.kind == EngineKind::Electric {
        return SampledCurve::from_keys(&[Keyframe::new(0.0, 1.0), Keyframe::new(1.0, 1.0)], 2);
    }

    let span = (spec.max_rpm - spec.idle_rpm).max(EPSILON);
    let norm = |rpm: f32| clamp01((rpm - spec.idle_rpm) / span);

    let redline = spec.redline_torque_fraction.clamp(0.05, 1.0);
    let mut keys = vec![
        Keyframe::new(0.0, spec.idle_torque_fraction.clamp(0.05, 1.0)),
        Keyframe::new(norm(spec.peak_torque_rpm), 1.0),
    ];

    let omega_pp = (spec.peak_power_rpm * RPM_TO_RAD_S).max(EPSILON);
    let pp_fraction = (spec.peak_power_kw * 1000.0 / omega_pp / spec.peak_torque_nm.max(EPSILON)).clamp(redline, 1.0);
    let x_pp = norm(spec.peak_power_rpm);
    if x_pp > norm(spec.peak_torque_rpm) + 0.01 && x_pp < 0.99 {
        keys.push(Keyframe::new(x_pp, pp_fraction));
    }
    keys.push(Keyframe::new(1.0, redline.min(pp_fraction)));

    SampledCurve::from_keys(&keys, SampledCurve::DEFAULT_RESOLUTION)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drivetrain::config::VehiclePreset;
    use rand::{rngs::StdRng, Rng, SeedableRng};

    fn engine(preset: VehiclePreset) -> EngineModel {
        EngineModel::new(preset.config().engine)
    }

    #[test]
    fn torque_is_finite_and_non_negative_under_throttle() {
        let mut rng = StdRng::seed_from_u64(7);
        for preset in VehiclePreset::ALL {
            let e = engine(preset);
            let (lo, hi) = (e.min_rpm(), e.spec().max_rpm);
            for _ in 0..2000 {
                let rpm = rng.gen_range(lo..=hi);
                let throttle = rng.gen_range(0.02..=1.0);
                let t = e.calculate_torque(rpm, throttle);
                assert!(t.is_finite(), "{preset:?} rpm={rpm} throttle={throttle}");
                assert!(t >= 0.0, "{preset:?} rpm={rpm} throttle={throttle} torque={t}");
            }
        }
    }

    #[test]
    fn calculate_torque_is_pure() {
        let e = engine(VehiclePreset::Sportscar);
        let before = e.current_rpm();
        let a = e.calculate_torque(4500.0, 0.7);
        let b = e.calculate_torque(4500.0, 0.7);
        assert_eq!(a, b);
        assert_eq!(e.current_rpm(), before);
    }

    #[test]
    fn ice_curve_peaks_at_peak_torque_rpm() {
        let e = engine(VehiclePreset::Sportscar);
        let peak = e.gross_torque(e.spec().peak_torque_rpm, 1.0);
        assert!((peak - e.spec().peak_torque_nm).abs() < 1.0);

        for rpm in [1000.0, 2000.0, 3000.0, 6000.0, 7200.0] {
            assert!(e.gross_torque(rpm, 1.0) <= peak + 0.5);
        }
    }

    #[test]
    fn ice_curve_matches_peak_power() {
        let e = engine(VehiclePreset::FamilySedan);
        let spec = e.spec().clone();
        let torque = e.gross_torque(spec.peak_power_rpm, 1.0);
        let power_kw = torque * spec.peak_power_rpm * RPM_TO_RAD_S / 1000.0;
        assert!((power_kw - spec.peak_power_kw).abs() / spec.peak_power_kw < 0.03, "{power_kw} kW");
    }

    #[test]
    fn redline_keeps_some_torque_then_limiter_cuts() {
        let e = engine(VehiclePreset::Sportscar);
        let max = e.spec().max_rpm;
        assert!(e.gross_torque(max - e.spec().rev_limiter_band - 5.0, 1.0) > 0.0);
        assert_eq!(e.gross_torque(max, 1.0), 0.0);
        assert_eq!(e.calculate_torque(max, 1.0), 0.0);
    }

    #[test]
    fn closed_throttle_gives_engine_braking() {
        let e = engine(VehiclePreset::Sportscar);
        assert!(e.calculate_torque(5000.0, 0.0) < 0.0);
        assert!(e.calculate_torque(5000.0, 0.0) < e.calculate_torque(1000.0, 0.0));
    }

    #[test]
    fn electric_constant_torque_then_constant_power() {
        let e = engine(VehiclePreset::ElectricHatch);
        let spec = e.spec().clone();
        let crossover = e.crossover_rpm();
        assert!((crossover - spec.peak_power_kw * 1000.0 / spec.peak_torque_nm * RAD_S_TO_RPM).abs() < 1.0);

        assert!((e.gross_torque(0.0, 1.0) - spec.peak_torque_nm).abs() < 1e-3);
        assert!((e.gross_torque(crossover * 0.5, 0.5) - spec.peak_torque_nm * 0.5).abs() < 1e-3);

        let rpm = crossover * 2.0;
        let expected = spec.peak_power_kw * 1000.0 / (rpm * RPM_TO_RAD_S);
        assert!((e.gross_torque(rpm, 1.0) - expected).abs() < 0.5);
    }

    #[test]
    fn free_rev_returns_to_idle() {
        let mut e = engine(VehiclePreset::Sportscar);
        for _ in 0..30 {
            e.update(1.0, Coupling::Free, 1.0 / 60.0);
        }
        assert!(e.current_rpm() > 3000.0);
        assert!(e.current_rpm() <= e.spec().max_rpm);

        for _ in 0..600 {
            e.update(0.0, Coupling::Free, 1.0 / 60.0);
        }
        assert!((e.current_rpm() - e.spec().idle_rpm).abs() < 1.0);
    }

    #[test]
    fn launch_slip_revs_toward_peak_power() {
        let mut e = engine(VehiclePreset::Sportscar);
        let target = e.spec().peak_power_rpm;
        let mut last = e.current_rpm();
        for _ in 0..240 {
            e.update(1.0, Coupling::Slipping { wheel_rpm: 40.0, engagement: 0.2 }, 1.0 / 60.0);
            assert!(e.current_rpm() >= last);
            assert!(e.current_rpm() <= e.spec().max_rpm);
            last = e.current_rpm();
        }
        assert!((e.current_rpm() - target).abs() < 1.0);
    }

    #[test]
    fn locked_rpm_follows_wheels_at_bounded_rate() {
        let mut e = engine(VehiclePreset::Sportscar);
        let dt = 1.0 / 60.0;
        e.update(0.5, Coupling::Locked { wheel_rpm: 6000.0 }, dt);
        let step = e.current_rpm() - e.spec().idle_rpm;
        assert!(step > 0.0 && step < 6000.0 - e.spec().idle_rpm);

        for _ in 0..600 {
            e.update(0.5, Coupling::Locked { wheel_rpm: 6000.0 }, dt);
        }
        assert!((e.current_rpm() - 6000.0).abs() < 1.0);

        for _ in 0..600 {
            e.update(0.0, Coupling::Locked { wheel_rpm: 0.0 }, dt);
        }
        assert!((e.current_rpm() - e.spec().idle_rpm).abs() < 1.0);
    }

    #[test]
    fn electric_settles_at_zero_and_never_goes_negative() {
        let mut e = engine(VehiclePreset::ElectricHatch);
        for _ in 0..120 {
            e.update(0.0, Coupling::Locked { wheel_rpm: 0.0 }, 1.0 / 60.0);
            assert!(e.current_rpm() >= 0.0);
        }
        assert_eq!(e.current_rpm(), 0.0);
        assert!(e.calculate_torque(0.0, 0.2) > 0.0);
    }

    #[test]
    fn held_electric_motor_spins_up_with_throttle() {
        let mut e = engine(VehiclePreset::ElectricHatch);
        let target = e.spec().max_rpm * 0.2 * 0.3;
        let held = Coupling::Slipping { wheel_rpm: 0.0, engagement: 1.0 };

        let mut last = e.current_rpm();
        for _ in 0..120 {
            let torque = e.update(0.2, held, 1.0 / 60.0);
            assert!(torque > 0.0);
            assert!(e.current_rpm() >= last);
            last = e.current_rpm();
        }
        assert!((last - target).abs() < 1e-2, "{last}");

        // a feathered pedal leaves the rotor with the wheels
        for _ in 0..60 {
            e.update(0.05, held, 1.0 / 60.0);
        }
        assert_eq!(e.current_rpm(), 0.0);
    }

    #[test]
    fn rpm_from_wheel_handles_neutral() {
        assert_eq!(EngineModel::rpm_from_wheel(500.0, 0.0), 0.0);
        assert_eq!(EngineModel::rpm_from_wheel(-500.0, -10.0), 5000.0);
    }
}
