//! drivetrain - engine-agnostic drivetrain + tire core (pure types + per-tick sim)

pub mod types;
pub mod curve;
pub mod config;
pub mod wheel;
pub mod engine;
pub mod transmission;
pub mod friction;
pub mod distributor;
pub mod anti_roll;
pub mod aero;
pub mod telemetry;
pub mod sim;

pub use types::*;
pub use config::{VehicleConfig, VehiclePreset};
pub use sim::{TickOutput, Vehicle};
pub use telemetry::TelemetrySnapshot;
