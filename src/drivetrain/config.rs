// ==============================================================================
// config.rs - VEHICLE TUNING SNAPSHOT + NAMED PRESETS
// ------------------------------------------------------------------------------
// VehicleConfig is selected once (preset or manual JSON), validated once, and is
// read-only afterwards. Validation never fails the vehicle: every problem is
// returned as a ConfigError next to a repaired config so the caller can log it
// and keep simulating in degraded mode.
// ==============================================================================

use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::drivetrain::curve::FrictionCurve;
use crate::drivetrain::types::{WheelId, GRAVITY};
use crate::error::ConfigError;

pub const DEFAULT_WHEEL_RADIUS: f32 = 0.34;
pub const DEFAULT_SUSPENSION_DISTANCE: f32 = 0.2;
pub const DEFAULT_MASS: f32 = 1500.0;
pub const DEFAULT_GEAR_RATIOS: [f32; 6] = [3.5, 2.1, 1.4, 1.0, 0.8, 0.65];

// ============================================
// ----- engine -------------------------------
// ============================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineKind {
    Ice,
    Electric,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineSpec {
    pub kind: EngineKind,
    pub peak_torque_nm: f32,
    pub peak_power_kw: f32,
    pub idle_rpm: f32,               // ICE only, 0 for electric
    pub peak_torque_rpm: f32,        // ICE only
    pub peak_power_rpm: f32,
    pub max_rpm: f32,
    pub inertia: f32,                // kg*m^2
    pub friction_torque: f32,        // N*m, always present
    pub braking_torque: f32,         // N*m at max rpm, closed throttle
    pub idle_torque_fraction: f32,   // curve value at idle
    pub redline_torque_fraction: f32,// curve value at max rpm, keeps the curve off zero
    pub rev_limiter_band: f32,       // rpm below max where torque is cut
    pub idle_return_rate: f32,       // rpm/s decay toward idle when off throttle
}

// ============================================
// ----- transmission -------------------------
// ============================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransmissionMode {
    Automatic,
    Manual,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransmissionSpec {
    pub mode: TransmissionMode,
    pub gear_ratios: Vec<f32>,        // 1st .. top
    pub reverse_ratio: f32,
    pub electric_fixed_ratio: f32,
    pub final_drive_ratio: f32,
    pub drivetrain_efficiency: f32,   // 0.7..1
    pub upshift_threshold: f32,       // rpm / max
    pub downshift_threshold: f32,     // rpm / max
    pub downshift_max_throttle: f32,  // "not accelerating hard"
    pub kickdown_throttle: f32,
    pub kickdown_rpm_fraction: f32,
    pub shift_duration: f32,          // s
    pub shift_cooldown: f32,          // s
    pub clutch_slip_speed: f32,       // m/s
    pub launch_engagement: f32,       // engagement at standstill
    pub shift_engagement: f32,        // engagement while shifting
    pub engagement_floor: f32,        // below this, no drive torque
}

// ============================================
// ----- wheels + tires -----------------------
// ============================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DriveLayout {
    Rwd,
    Fwd,
    Awd,
}

impl DriveLayout {
    pub fn drives(&self, wheel: WheelId) -> bool {
        match self {
            DriveLayout::Rwd => !wheel.is_front(),
            DriveLayout::Fwd => wheel.is_front(),
            DriveLayout::Awd => true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WheelSpec {
    pub id: WheelId,
    pub radius: f32,
    pub suspension_distance: f32,
    pub is_steer: bool,
    pub is_motor: bool,
}

impl WheelSpec {
    pub fn standard(id: WheelId, layout: DriveLayout, radius: f32, suspension_distance: f32) -> Self {
        Self {
            id,
            radius,
            suspension_distance,
            is_steer: id.is_front(),
            is_motor: layout.drives(id),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TireSpec {
    pub forward: FrictionCurve,
    pub sideways: FrictionCurve,
    pub load_sensitivity: f32,
    pub combined_slip_alpha: f32,
    pub static_camber_deg: f32,
    pub grip_multiplier: f32,
    pub torque_limit_safety: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TractionControlSpec {
    pub enabled: bool,
    pub slip_threshold: f32,
    pub aggression: f32,
}

// ============================================
// ----- controls -----------------------------
// ============================================

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BrakeSpec {
    pub max_brake_torque: f32,   // N*m, whole vehicle
    pub front_bias: f32,         // 0..1
    pub park_speed: f32,         // m/s
    pub coast_brake_torque: f32, // N*m per motor wheel, rolling resistance
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SteeringSpec {
    pub max_angle_deg: f32,
    pub max_angle_at_speed_deg: f32,
    pub rate_deg_per_sec: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DirectionSpec {
    pub input_deadzone: f32,
    pub near_stop_speed: f32,      // m/s
    pub reverse_engage_delay: f32, // s of continuous hold
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LimitSpec {
    pub top_speed: f32,          // m/s
    pub top_speed_fade: f32,     // fraction of top speed over which torque fades
    pub airborne_torque_scale: f32,
}

// ============================================
// ----- body ---------------------------------
// ============================================

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChassisSpec {
    pub mass: f32,                  // kg
    pub center_of_mass_offset: f32, // m, vertical
    pub half_extents: [f32; 3],     // m
    pub front_weight_fraction: f32, // static weight on front axle
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AntiRollSpec {
    pub front_force: f32, // N per unit travel difference
    pub rear_force: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AeroSpec {
    pub drag_coefficient: f32,
    pub downforce_coefficient: f32,
    pub frontal_area: f32, // m^2
    pub air_density: f32,  // kg/m^3
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DiagnosticsSpec {
    /// Allowed gap (m/s) between body speed and wheel-derived speed.
    pub causality_tolerance: f32,
}

// ============================================
// ----- the snapshot -------------------------
// ============================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VehicleConfig {
    pub name: String,
    pub chassis: ChassisSpec,
    pub engine: EngineSpec,
    pub transmission: TransmissionSpec,
    pub layout: DriveLayout,
    pub wheels: Vec<WheelSpec>,
    pub tires: TireSpec,
    pub traction_control: TractionControlSpec,
    pub brakes: BrakeSpec,
    pub steering: SteeringSpec,
    pub direction: DirectionSpec,
    pub limits: LimitSpec,
    pub anti_roll: AntiRollSpec,
    pub aero: AeroSpec,
    pub diagnostics: DiagnosticsSpec,
}

impl Default for VehicleConfig {
    fn default() -> Self {
        VehiclePreset::FamilySedan.config()
    }
}

impl VehicleConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json_str(&text)
    }

    /// Static per-wheel load used as the friction model's reference.
    pub fn nominal_wheel_load(&self) -> f32 {
        self.chassis.mass / 4.0 * GRAVITY
    }

    pub fn wheel(&self, id: WheelId) -> Option<&WheelSpec> {
        self.wheels.iter().find(|w| w.id == id)
    }

    pub fn is_electric(&self) -> bool {
        self.engine.kind == EngineKind::Electric
    }

    /// Repairs everything the simulation cannot run with; each repair is reported.
    pub fn validated(mut self) -> (Self, Vec<ConfigError>) {
        let mut issues = Vec::new();

        // --- chassis ---
        let mass = self.chassis.mass;
        fix("chassis.mass", &mut self.chassis.mass, DEFAULT_MASS, mass > 0.0, &mut issues);
        let fw = self.chassis.front_weight_fraction;
        fix("chassis.front_weight_fraction", &mut self.chassis.front_weight_fraction, 0.5, (0.0..=1.0).contains(&fw), &mut issues);

        // --- engine ---
        let e = &mut self.engine;
        let v = e.peak_torque_nm;
        fix("engine.peak_torque_nm", &mut e.peak_torque_nm, 300.0, v > 0.0, &mut issues);
        let v = e.peak_power_kw;
        fix("engine.peak_power_kw", &mut e.peak_power_kw, 150.0, v > 0.0, &mut issues);
        let v = e.inertia;
        fix("engine.inertia", &mut e.inertia, 0.15, v > 0.0, &mut issues);
        if e.kind == EngineKind::Electric {
            e.idle_rpm = 0.0;
        }
        let v = e.idle_rpm;
        fix("engine.idle_rpm", &mut e.idle_rpm, 800.0, v >= 0.0, &mut issues);
        let (idle, max) = (e.idle_rpm, e.max_rpm);
        fix("engine.max_rpm", &mut e.max_rpm, (idle + 1000.0).max(7000.0), max > idle + 500.0, &mut issues);
        let (idle, max) = (e.idle_rpm, e.max_rpm);
        let v = e.peak_torque_rpm;
        fix("engine.peak_torque_rpm", &mut e.peak_torque_rpm, idle + (max - idle) * 0.5, v > idle && v < max, &mut issues);
        let pt = e.peak_torque_rpm;
        let v = e.peak_power_rpm;
        fix("engine.peak_power_rpm", &mut e.peak_power_rpm, pt + (max - pt) * 0.6, v > pt && v <= max, &mut issues);
        let v = e.idle_return_rate;
        fix("engine.idle_return_rate", &mut e.idle_return_rate, 2500.0, v >= 0.0, &mut issues);

        // --- transmission ---
        let t = &mut self.transmission;
        if self.engine.kind == EngineKind::Ice {
            if t.gear_ratios.is_empty() {
                issues.push(ConfigError::EmptyGearTable);
                t.gear_ratios = DEFAULT_GEAR_RATIOS.to_vec();
            } else if t.gear_ratios.iter().any(|r| !r.is_finite() || *r <= 0.0) {
                issues.push(ConfigError::InvalidGearRatios(t.gear_ratios.clone()));
                t.gear_ratios = DEFAULT_GEAR_RATIOS.to_vec();
            }
        }
        let v = t.final_drive_ratio;
        fix("transmission.final_drive_ratio", &mut t.final_drive_ratio, 3.7, v > 0.0, &mut issues);
        let v = t.reverse_ratio;
        fix("transmission.reverse_ratio", &mut t.reverse_ratio, 3.2, v > 0.0, &mut issues);
        let v = t.electric_fixed_ratio;
        fix("transmission.electric_fixed_ratio", &mut t.electric_fixed_ratio, 9.0, v > 0.0, &mut issues);
        let v = t.drivetrain_efficiency;
        fix("transmission.drivetrain_efficiency", &mut t.drivetrain_efficiency, 0.85, v > 0.0 && v <= 1.0, &mut issues);
        let v = t.shift_duration;
        fix("transmission.shift_duration", &mut t.shift_duration, 0.25, v >= 0.0, &mut issues);
        let v = t.clutch_slip_speed;
        fix("transmission.clutch_slip_speed", &mut t.clutch_slip_speed, 4.2, v >= 0.0, &mut issues);
        let v = t.upshift_threshold;
        fix("transmission.upshift_threshold", &mut t.upshift_threshold, 0.85, v > 0.0 && v <= 1.0, &mut issues);
        let (v, up) = (t.downshift_threshold, t.upshift_threshold);
        fix("transmission.downshift_threshold", &mut t.downshift_threshold, up * 0.35, v > 0.0 && v < up, &mut issues);
        let v = t.launch_engagement;
        fix("transmission.launch_engagement", &mut t.launch_engagement, 0.2, (0.0..=1.0).contains(&v), &mut issues);
        let v = t.shift_engagement;
        fix("transmission.shift_engagement", &mut t.shift_engagement, 0.1, (0.0..=1.0).contains(&v), &mut issues);
        let v = t.engagement_floor;
        fix("transmission.engagement_floor", &mut t.engagement_floor, 0.15, (0.0..=1.0).contains(&v), &mut issues);

        // --- wheels: exactly one of each, positive radius ---
        let mut wheels = Vec::with_capacity(4);
        for id in WheelId::ALL {
            let mut spec = match self.wheels.iter().find(|w| w.id == id) {
                Some(w) => *w,
                None => {
                    issues.push(ConfigError::MissingWheel(id));
                    WheelSpec::standard(id, self.layout, DEFAULT_WHEEL_RADIUS, DEFAULT_SUSPENSION_DISTANCE)
                }
            };
            if !spec.radius.is_finite() || spec.radius <= 0.0 {
                issues.push(ConfigError::InvalidWheelRadius { wheel: id, radius: spec.radius });
                spec.radius = DEFAULT_WHEEL_RADIUS;
            }
            let v = spec.suspension_distance;
            fix("wheel.suspension_distance", &mut spec.suspension_distance, DEFAULT_SUSPENSION_DISTANCE, v > 0.0, &mut issues);
            wheels.push(spec);
        }
        if !wheels.iter().any(|w| w.is_motor) {
            issues.push(ConfigError::NoDrivenWheels);
            for w in wheels.iter_mut() {
                w.is_motor = self.layout.drives(w.id);
            }
        }
        self.wheels = wheels;

        // --- limits / brakes ---
        let v = self.limits.top_speed;
        fix("limits.top_speed", &mut self.limits.top_speed, 40.0, v > 0.0, &mut issues);
        let v = self.limits.top_speed_fade;
        fix("limits.top_speed_fade", &mut self.limits.top_speed_fade, 0.1, v > 0.0 && v <= 1.0, &mut issues);
        let v = self.brakes.front_bias;
        fix("brakes.front_bias", &mut self.brakes.front_bias, 0.6, (0.0..=1.0).contains(&v), &mut issues);
        let v = self.brakes.max_brake_torque;
        fix("brakes.max_brake_torque", &mut self.brakes.max_brake_torque, 10_000.0, v >= 0.0, &mut issues);

        (self, issues)
    }
}

fn fix(field: &'static str, value: &mut f32, fallback: f32, ok: bool, issues: &mut Vec<ConfigError>) {
    if !ok || !value.is_finite() {
        issues.push(ConfigError::InvalidValue { field, value: *value, fallback });
        *value = fallback;
    }
}

// ============================================
// ----- presets ------------------------------
// ============================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VehiclePreset {
    HeavyVan,
    DeliveryTruck,
    FamilySedan,
    SportSedan,
    Sportscar,
    RaceCar,
    ElectricHatch,
}

impl VehiclePreset {
    pub const ALL: [VehiclePreset; 7] = [
        VehiclePreset::HeavyVan,
        VehiclePreset::DeliveryTruck,
        VehiclePreset::FamilySedan,
        VehiclePreset::SportSedan,
        VehiclePreset::Sportscar,
        VehiclePreset::RaceCar,
        VehiclePreset::ElectricHatch,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            VehiclePreset::HeavyVan => "heavy_van",
            VehiclePreset::DeliveryTruck => "delivery_truck",
            VehiclePreset::FamilySedan => "family_sedan",
            VehiclePreset::SportSedan => "sport_sedan",
            VehiclePreset::Sportscar => "sportscar",
            VehiclePreset::RaceCar => "race_car",
            VehiclePreset::ElectricHatch => "electric_hatch",
        }
    }

    pub fn config(&self) -> VehicleConfig {
        match self {
            VehiclePreset::HeavyVan => heavy_van(),
            VehiclePreset::DeliveryTruck => delivery_truck(),
            VehiclePreset::FamilySedan => family_sedan(),
            VehiclePreset::SportSedan => sport_sedan(),
            VehiclePreset::Sportscar => sportscar(),
            VehiclePreset::RaceCar => race_car(),
            VehiclePreset::ElectricHatch => electric_hatch(),
        }
    }
}

impl FromStr for VehiclePreset {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase().replace(['-', ' '], "_");
        VehiclePreset::ALL
            .into_iter()
            .find(|p| p.as_str() == wanted)
            .ok_or_else(|| ConfigError::UnknownPreset(s.to_string()))
    }
}

fn curve(extremum_slip: f32, extremum_value: f32, asymptote_slip: f32, asymptote_value: f32, stiffness: f32) -> FrictionCurve {
    FrictionCurve { extremum_slip, extremum_value, asymptote_slip, asymptote_value, stiffness }
}

fn wheels(layout: DriveLayout, radius: f32, suspension_distance: f32) -> Vec<WheelSpec> {
    WheelId::ALL
        .into_iter()
        .map(|id| WheelSpec::standard(id, layout, radius, suspension_distance))
        .collect()
}

fn ice(peak_torque_nm: f32, peak_power_kw: f32, idle_rpm: f32, peak_torque_rpm: f32, peak_power_rpm: f32, max_rpm: f32) -> EngineSpec {
    EngineSpec {
        kind: EngineKind::Ice,
        peak_torque_nm,
        peak_power_kw,
        idle_rpm,
        peak_torque_rpm,
        peak_power_rpm,
        max_rpm,
        inertia: 0.15,
        friction_torque: 12.0,
        braking_torque: 45.0,
        idle_torque_fraction: 0.55,
        redline_torque_fraction: 0.35,
        rev_limiter_band: 100.0,
        idle_return_rate: 2500.0,
    }
}

fn automatic(gear_ratios: &[f32], final_drive_ratio: f32) -> TransmissionSpec {
    TransmissionSpec {
        mode: TransmissionMode::Automatic,
        gear_ratios: gear_ratios.to_vec(),
        reverse_ratio: 3.2,
        electric_fixed_ratio: 9.0,
        final_drive_ratio,
        drivetrain_efficiency: 0.85,
        upshift_threshold: 0.85,
        downshift_threshold: 0.3,
        downshift_max_throttle: 0.3,
        kickdown_throttle: 0.9,
        kickdown_rpm_fraction: 0.5,
        shift_duration: 0.25,
        shift_cooldown: 1.0,
        clutch_slip_speed: 15.0 / 3.6,
        launch_engagement: 0.2,
        shift_engagement: 0.1,
        engagement_floor: 0.15,
    }
}

fn common(name: &str, chassis: ChassisSpec, engine: EngineSpec, transmission: TransmissionSpec, layout: DriveLayout, wheel_specs: Vec<WheelSpec>, tires: TireSpec, tc: TractionControlSpec, brakes: BrakeSpec, steering: SteeringSpec, top_speed: f32) -> VehicleConfig {
    VehicleConfig {
        name: name.to_string(),
        chassis,
        engine,
        transmission,
        layout,
        wheels: wheel_specs,
        tires,
        traction_control: tc,
        brakes,
        steering,
        direction: DirectionSpec {
            input_deadzone: 0.05,
            near_stop_speed: 0.5,
            reverse_engage_delay: 0.3,
        },
        limits: LimitSpec {
            top_speed,
            top_speed_fade: 0.1,
            airborne_torque_scale: 0.1,
        },
        anti_roll: AntiRollSpec {
            front_force: 15_000.0,
            rear_force: 12_000.0,
        },
        aero: AeroSpec {
            drag_coefficient: 0.3,
            downforce_coefficient: 0.1,
            frontal_area: 2.2,
            air_density: 1.225,
        },
        diagnostics: DiagnosticsSpec { causality_tolerance: 2.0 },
    }
}

fn heavy_van() -> VehicleConfig {
    let layout = DriveLayout::Rwd;
    common(
        "heavy_van",
        ChassisSpec { mass: 2100.0, center_of_mass_offset: -0.3, half_extents: [1.0, 0.9, 2.6], front_weight_fraction: 0.6 },
        ice(400.0, 120.0, 750.0, 1800.0, 3800.0, 4500.0),
        automatic(&[4.1, 2.4, 1.5, 1.0, 0.8], 3.9),
        layout,
        wheels(layout, 0.38, 0.25),
        TireSpec {
            forward: curve(0.4, 1.1, 1.0, 0.7, 1.1),
            sideways: curve(0.15, 1.0, 0.4, 0.65, 1.1),
            load_sensitivity: 0.03,
            combined_slip_alpha: 0.3,
            static_camber_deg: -0.5,
            grip_multiplier: 1.2,
            torque_limit_safety: 0.75,
        },
        TractionControlSpec { enabled: true, slip_threshold: 0.25, aggression: 0.6 },
        BrakeSpec { max_brake_torque: 16_000.0, front_bias: 0.65, park_speed: 0.5, coast_brake_torque: 10.0 },
        SteeringSpec { max_angle_deg: 35.0, max_angle_at_speed_deg: 12.0, rate_deg_per_sec: 120.0 },
        25.0,
    )
}

fn delivery_truck() -> VehicleConfig {
    let layout = DriveLayout::Rwd;
    common(
        "delivery_truck",
        ChassisSpec { mass: 2800.0, center_of_mass_offset: -0.2, half_extents: [1.1, 1.1, 3.0], front_weight_fraction: 0.5 },
        ice(520.0, 130.0, 700.0, 1600.0, 3200.0, 4000.0),
        automatic(&[5.0, 2.9, 1.8, 1.3, 1.0, 0.78], 4.1),
        layout,
        wheels(layout, 0.4, 0.3),
        TireSpec {
            forward: curve(0.45, 1.05, 1.1, 0.65, 1.15),
            sideways: curve(0.18, 0.95, 0.45, 0.6, 1.15),
            load_sensitivity: 0.04,
            combined_slip_alpha: 0.35,
            static_camber_deg: -0.3,
            grip_multiplier: 1.3,
            torque_limit_safety: 0.7,
        },
        TractionControlSpec { enabled: true, slip_threshold: 0.3, aggression: 0.5 },
        BrakeSpec { max_brake_torque: 20_000.0, front_bias: 0.6, park_speed: 0.5, coast_brake_torque: 10.0 },
        SteeringSpec { max_angle_deg: 40.0, max_angle_at_speed_deg: 15.0, rate_deg_per_sec: 110.0 },
        22.0,
    )
}

fn family_sedan() -> VehicleConfig {
    let layout = DriveLayout::Fwd;
    common(
        "family_sedan",
        ChassisSpec { mass: 1500.0, center_of_mass_offset: -0.4, half_extents: [0.9, 0.55, 2.3], front_weight_fraction: 0.6 },
        ice(250.0, 110.0, 800.0, 4000.0, 6000.0, 6500.0),
        automatic(&DEFAULT_GEAR_RATIOS, 3.7),
        layout,
        wheels(layout, DEFAULT_WHEEL_RADIUS, 0.18),
        TireSpec {
            forward: curve(0.35, 1.05, 0.9, 0.65, 1.0),
            sideways: curve(0.12, 1.0, 0.35, 0.6, 1.0),
            load_sensitivity: 0.06,
            combined_slip_alpha: 0.4,
            static_camber_deg: -1.0,
            grip_multiplier: 1.0,
            torque_limit_safety: 0.85,
        },
        TractionControlSpec { enabled: true, slip_threshold: 0.2, aggression: 0.7 },
        BrakeSpec { max_brake_torque: 10_000.0, front_bias: 0.65, park_speed: 0.5, coast_brake_torque: 10.0 },
        SteeringSpec { max_angle_deg: 32.0, max_angle_at_speed_deg: 8.0, rate_deg_per_sec: 120.0 },
        35.0,
    )
}

fn sport_sedan() -> VehicleConfig {
    let layout = DriveLayout::Rwd;
    common(
        "sport_sedan",
        ChassisSpec { mass: 1600.0, center_of_mass_offset: -0.5, half_extents: [0.92, 0.5, 2.4], front_weight_fraction: 0.5 },
        ice(400.0, 250.0, 800.0, 3500.0, 6500.0, 7000.0),
        automatic(&[3.8, 2.3, 1.6, 1.2, 1.0, 0.8], 3.3),
        layout,
        wheels(layout, DEFAULT_WHEEL_RADIUS, 0.15),
        TireSpec {
            forward: curve(0.3, 1.1, 0.8, 0.7, 1.05),
            sideways: curve(0.1, 1.05, 0.3, 0.65, 1.05),
            load_sensitivity: 0.07,
            combined_slip_alpha: 0.45,
            static_camber_deg: -1.5,
            grip_multiplier: 1.05,
            torque_limit_safety: 0.88,
        },
        TractionControlSpec { enabled: true, slip_threshold: 0.18, aggression: 0.75 },
        BrakeSpec { max_brake_torque: 12_000.0, front_bias: 0.62, park_speed: 0.5, coast_brake_torque: 10.0 },
        SteeringSpec { max_angle_deg: 30.0, max_angle_at_speed_deg: 6.0, rate_deg_per_sec: 140.0 },
        45.0,
    )
}

fn sportscar() -> VehicleConfig {
    let layout = DriveLayout::Rwd;
    common(
        "sportscar",
        ChassisSpec { mass: 1400.0, center_of_mass_offset: -0.55, half_extents: [0.95, 0.4, 2.2], front_weight_fraction: 0.4 },
        ice(450.0, 330.0, 850.0, 4500.0, 7000.0, 7500.0),
        automatic(&[3.2, 2.2, 1.6, 1.25, 1.0, 0.82], 3.5),
        layout,
        wheels(layout, 0.33, 0.12),
        TireSpec {
            forward: curve(0.25, 1.15, 0.7, 0.75, 1.1),
            sideways: curve(0.08, 1.1, 0.25, 0.7, 1.1),
            load_sensitivity: 0.08,
            combined_slip_alpha: 0.5,
            static_camber_deg: -2.0,
            grip_multiplier: 1.1,
            torque_limit_safety: 0.9,
        },
        TractionControlSpec { enabled: true, slip_threshold: 0.15, aggression: 0.8 },
        BrakeSpec { max_brake_torque: 14_000.0, front_bias: 0.6, park_speed: 0.5, coast_brake_torque: 10.0 },
        SteeringSpec { max_angle_deg: 28.0, max_angle_at_speed_deg: 5.0, rate_deg_per_sec: 160.0 },
        55.0,
    )
}

fn race_car() -> VehicleConfig {
    let layout = DriveLayout::Rwd;
    let mut cfg = common(
        "race_car",
        ChassisSpec { mass: 1200.0, center_of_mass_offset: -0.6, half_extents: [0.95, 0.35, 2.3], front_weight_fraction: 0.4 },
        ice(520.0, 450.0, 1200.0, 6500.0, 8500.0, 9000.0),
        automatic(&[2.9, 2.1, 1.65, 1.35, 1.15, 1.0], 3.6),
        layout,
        wheels(layout, 0.33, 0.1),
        TireSpec {
            forward: curve(0.2, 1.2, 0.6, 0.8, 1.2),
            sideways: curve(0.06, 1.15, 0.2, 0.75, 1.2),
            load_sensitivity: 0.1,
            combined_slip_alpha: 0.6,
            static_camber_deg: -2.5,
            grip_multiplier: 1.2,
            torque_limit_safety: 0.92,
        },
        TractionControlSpec { enabled: true, slip_threshold: 0.12, aggression: 0.85 },
        BrakeSpec { max_brake_torque: 16_000.0, front_bias: 0.58, park_speed: 0.5, coast_brake_torque: 10.0 },
        SteeringSpec { max_angle_deg: 25.0, max_angle_at_speed_deg: 4.0, rate_deg_per_sec: 180.0 },
        70.0,
    );
    cfg.transmission.shift_duration = 0.12;
    cfg.transmission.shift_cooldown = 0.6;
    cfg.engine.inertia = 0.1;
    cfg.aero.downforce_coefficient = 1.2;
    cfg.aero.drag_coefficient = 0.6;
    cfg.anti_roll = AntiRollSpec { front_force: 22_000.0, rear_force: 18_000.0 };
    cfg
}

fn electric_hatch() -> VehicleConfig {
    let layout = DriveLayout::Fwd;
    let mut transmission = automatic(&[], 1.0);
    transmission.electric_fixed_ratio = 9.0;
    transmission.drivetrain_efficiency = 0.92;

    common(
        "electric_hatch",
        ChassisSpec { mass: 1650.0, center_of_mass_offset: -0.6, half_extents: [0.9, 0.5, 2.1], front_weight_fraction: 0.55 },
        EngineSpec {
            kind: EngineKind::Electric,
            peak_torque_nm: 310.0,
            peak_power_kw: 150.0,
            idle_rpm: 0.0,
            peak_torque_rpm: 1.0,
            peak_power_rpm: 4620.0,
            max_rpm: 16_000.0,
            inertia: 0.05,
            friction_torque: 4.0,
            braking_torque: 60.0,
            idle_torque_fraction: 1.0,
            redline_torque_fraction: 1.0,
            rev_limiter_band: 100.0,
            idle_return_rate: 6000.0,
        },
        transmission,
        layout,
        wheels(layout, DEFAULT_WHEEL_RADIUS, 0.16),
        TireSpec {
            forward: curve(0.35, 1.05, 0.9, 0.65, 1.0),
            sideways: curve(0.12, 1.0, 0.35, 0.6, 1.0),
            load_sensitivity: 0.06,
            combined_slip_alpha: 0.4,
            static_camber_deg: -1.0,
            grip_multiplier: 1.0,
            torque_limit_safety: 0.85,
        },
        TractionControlSpec { enabled: true, slip_threshold: 0.18, aggression: 0.75 },
        BrakeSpec { max_brake_torque: 11_000.0, front_bias: 0.62, park_speed: 0.5, coast_brake_torque: 6.0 },
        SteeringSpec { max_angle_deg: 33.0, max_angle_at_speed_deg: 8.0, rate_deg_per_sec: 130.0 },
        44.0,
    )
}
