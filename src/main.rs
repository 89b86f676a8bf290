use std::sync::Arc;

use anyhow::Context;
use tokio::sync::Mutex;
use tokio::time::{interval, MissedTickBehavior};
use tracing_subscriber::EnvFilter;

use drivetrain_server::drivetrain::{VehicleConfig, VehiclePreset};
use drivetrain_server::net::{start_websocket_server, ServerContext};
use drivetrain_server::physics::PhysicsWorld;
use drivetrain_server::settings::Settings;
use drivetrain_server::state::SharedGameState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let settings = Settings::from_env().context("reading server settings")?;
    tracing::info!(bind = %settings.bind, tick_hz = settings.tick_hz, vehicle = ?settings.vehicle, "starting drivetrain server");

    // a broken vehicle file should not keep the server down
    let default_vehicle: VehicleConfig = settings.vehicle.load().unwrap_or_else(|e| {
        tracing::error!(error = %e, "failed to load vehicle, falling back to family_sedan");
        VehiclePreset::FamilySedan.config()
    });

    let state = Arc::new(Mutex::new(SharedGameState::new()));
    let physics = Arc::new(Mutex::new(PhysicsWorld::new()));

    let ctx = ServerContext {
        state: Arc::clone(&state),
        physics: Arc::clone(&physics),
        default_vehicle: Arc::new(default_vehicle),
    };
    let bind = settings.bind;
    let mut server = tokio::spawn(async move { start_websocket_server(bind, ctx).await });

    let dt = settings.dt();
    let mut ticker = interval(settings.tick_interval());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            res = &mut server => {
                // the listener only returns on a bind/accept-loop failure
                return match res {
                    Ok(Ok(())) => Ok(()),
                    Ok(Err(e)) => Err(e).with_context(|| format!("websocket server on {bind}")),
                    Err(e) => Err(e).context("websocket server task"),
                };
            }
        }

        // lock order: state, then physics (same as the client tasks)
        let mut game = state.lock().await;
        let mut phys = physics.lock().await;

        for entity in game.entities.values() {
            if let Some(input) = entity.last_input {
                phys.set_input(&entity.id, input.axes.into());
            }
        }

        phys.step(dt);

        game.tick += 1;
        game.broadcast_snapshot(&phys);
    }
}
