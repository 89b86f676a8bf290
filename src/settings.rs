//! Server settings, read once from the environment at startup.
//!
//! | variable                  | default        |
//! |---------------------------|----------------|
//! | `DRIVETRAIN_BIND`         | `0.0.0.0:9001` |
//! | `DRIVETRAIN_TICK_HZ`      | `60`           |
//! | `DRIVETRAIN_PRESET`       | `family_sedan` |
//! | `DRIVETRAIN_VEHICLE_JSON` | unset          |
//!
//! A vehicle JSON file, when given, wins over the preset.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use crate::drivetrain::{VehicleConfig, VehiclePreset};
use crate::error::{ConfigError, SettingsError};

pub const ENV_BIND: &str = "DRIVETRAIN_BIND";
pub const ENV_TICK_HZ: &str = "DRIVETRAIN_TICK_HZ";
pub const ENV_PRESET: &str = "DRIVETRAIN_PRESET";
pub const ENV_VEHICLE_JSON: &str = "DRIVETRAIN_VEHICLE_JSON";

pub const DEFAULT_BIND: &str = "0.0.0.0:9001";
pub const DEFAULT_TICK_HZ: u32 = 60;
const MAX_TICK_HZ: u32 = 1_000;

/// Where a player's car comes from when the client doesn't pick one.
#[derive(Debug, Clone, PartialEq)]
pub enum VehicleSource {
    Preset(VehiclePreset),
    Json(PathBuf),
}

impl VehicleSource {
    pub fn load(&self) -> Result<VehicleConfig, ConfigError> {
        match self {
            VehicleSource::Preset(p) => Ok(p.config()),
            VehicleSource::Json(path) => VehicleConfig::from_json_file(path),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub bind: SocketAddr,
    pub tick_hz: u32,
    pub vehicle: VehicleSource,
}

impl Settings {
    pub fn from_env() -> Result<Self, SettingsError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as `from_env`, with the variable lookup injected.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, SettingsError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let bind_raw = var(ENV_BIND).unwrap_or_else(|| DEFAULT_BIND.to_string());
        let bind = bind_raw
            .parse::<SocketAddr>()
            .map_err(|_| SettingsError::InvalidVar { var: ENV_BIND, value: bind_raw.clone() })?;

        let tick_hz = match var(ENV_TICK_HZ) {
            None => DEFAULT_TICK_HZ,
            Some(raw) => match raw.parse::<u32>() {
                Ok(hz) if (1..=MAX_TICK_HZ).contains(&hz) => hz,
                _ => return Err(SettingsError::InvalidVar { var: ENV_TICK_HZ, value: raw }),
            },
        };

        let vehicle = match (var(ENV_VEHICLE_JSON), var(ENV_PRESET)) {
            (Some(path), _) => VehicleSource::Json(PathBuf::from(path)),
            (None, Some(name)) => VehicleSource::Preset(name.parse()?),
            (None, None) => VehicleSource::Preset(VehiclePreset::FamilySedan),
        };

        Ok(Self { bind, tick_hz, vehicle })
    }

    /// Fixed physics step in seconds.
    pub fn dt(&self) -> f32 {
        1.0 / self.tick_hz as f32
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.tick_hz as f64)
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([0, 0, 0, 0], 9001)),
            tick_hz: DEFAULT_TICK_HZ,
            vehicle: VehicleSource::Preset(VehiclePreset::FamilySedan),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn settings(vars: &[(&str, &str)]) -> Result<Settings, SettingsError> {
        let map: HashMap<String, String> = vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        Settings::from_lookup(|k| map.get(k).cloned())
    }

    #[test]
    fn empty_environment_gives_defaults() {
        let s = settings(&[]).unwrap();
        assert_eq!(s, Settings::default());
        assert!((s.dt() - 1.0 / 60.0).abs() < 1e-9);
    }

    #[test]
    fn preset_name_is_parsed() {
        let s = settings(&[(ENV_PRESET, "race-car"), (ENV_TICK_HZ, "120")]).unwrap();
        assert_eq!(s.vehicle, VehicleSource::Preset(VehiclePreset::RaceCar));
        assert_eq!(s.tick_hz, 120);
        assert_eq!(s.tick_interval(), Duration::from_secs_f64(1.0 / 120.0));
    }

    #[test]
    fn json_path_wins_over_preset() {
        let s = settings(&[(ENV_PRESET, "sportscar"), (ENV_VEHICLE_JSON, "/tmp/car.json")]).unwrap();
        assert_eq!(s.vehicle, VehicleSource::Json(PathBuf::from("/tmp/car.json")));
    }

    #[test]
    fn bad_values_are_rejected() {
        assert!(matches!(
            settings(&[(ENV_TICK_HZ, "0")]),
            Err(SettingsError::InvalidVar { var: ENV_TICK_HZ, .. })
        ));
        assert!(matches!(
            settings(&[(ENV_BIND, "not-an-addr")]),
            Err(SettingsError::InvalidVar { var: ENV_BIND, .. })
        ));
        assert!(matches!(
            settings(&[(ENV_PRESET, "hovercraft")]),
            Err(SettingsError::Config(ConfigError::UnknownPreset(_)))
        ));
    }

    #[test]
    fn missing_json_file_is_an_io_error() {
        let source = VehicleSource::Json(PathBuf::from("/definitely/not/here.json"));
        assert!(matches!(source.load(), Err(ConfigError::Io { .. })));
    }
}
