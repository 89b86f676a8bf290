//! Error types

use thiserror::Error;

use crate::drivetrain::types::WheelId;

/// Problems found while building a vehicle's configuration.
///
/// Everything except `Io`/`Json` is recoverable: the validator repairs the value
/// and the vehicle keeps running on the fallback.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Unknown vehicle preset: {0}")]
    UnknownPreset(String),

    #[error("Missing wheel {0}, using default wheel")]
    MissingWheel(WheelId),

    #[error("Wheel {wheel} has invalid radius {radius}, using default radius")]
    InvalidWheelRadius { wheel: WheelId, radius: f32 },

    #[error("Gear ratio table is empty, using default ratios")]
    EmptyGearTable,

    #[error("Gear ratio table {0:?} contains non-positive ratios, using default ratios")]
    InvalidGearRatios(Vec<f32>),

    #[error("No driven wheels, deriving from drive layout")]
    NoDrivenWheels,

    #[error("Invalid {field} = {value}, using {fallback}")]
    InvalidValue {
        field: &'static str,
        value: f32,
        fallback: f32,
    },

    #[error("Failed to read vehicle config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid vehicle config JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Problems with the server's own settings (environment).
#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("Invalid value for {var}: {value}")]
    InvalidVar { var: &'static str, value: String },

    #[error(transparent)]
    Config(#[from] ConfigError),
}
