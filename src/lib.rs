//! drivetrain-server - vehicle drivetrain and tire dynamics behind a fixed-tick physics server.
//!
//! `drivetrain` is the engine-agnostic core; everything else hosts it in a
//! rapier world and serves it over a websocket.

pub mod drivetrain;
pub mod error;
pub mod net;
pub mod physics;
pub mod settings;
pub mod state;
pub mod suspension_contact;
