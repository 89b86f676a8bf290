use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::mpsc::UnboundedSender;
use uuid::Uuid;

use crate::drivetrain::{DriveInput, TelemetrySnapshot};
use crate::physics::PhysicsWorld;

/// The 2D input vector a client streams.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Axes {
    pub steer: f32,
    pub throttle: f32,
}

impl From<Axes> for DriveInput {
    fn from(a: Axes) -> Self {
        DriveInput::new(a.steer, a.throttle)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct EntityInput {
    pub tick: u64,
    pub axes: Axes,
}

pub struct Entity {
    pub id: String,
    pub vehicle: String,
    pub last_input: Option<EntityInput>,
}

#[derive(Serialize)]
pub struct PlayerSnapshot<'a> {
    pub id: &'a str,
    pub vehicle: &'a str,
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub rotation: [f32; 4],
    pub telemetry: &'a TelemetrySnapshot,
}

#[derive(Serialize)]
pub struct Snapshot<'a> {
    pub tick: u64,
    pub players: Vec<PlayerSnapshot<'a>>,
}

#[derive(Default)]
pub struct SharedGameState {
    pub tick: u64,
    pub clients: HashMap<String, UnboundedSender<String>>,
    pub entities: HashMap<String, Entity>,
}

impl SharedGameState {
    pub fn new() -> Self {
        Self::default()
    }

    /// New player id; the physics body is spawned separately.
    pub fn add_entity(&mut self, vehicle: &str) -> String {
        let id = Uuid::new_v4().to_string();
        self.entities.insert(
            id.clone(),
            Entity { id: id.clone(), vehicle: vehicle.to_string(), last_input: None },
        );
        id
    }

    pub fn register_client(&mut self, id: &str, tx: UnboundedSender<String>) {
        self.clients.insert(id.to_string(), tx);
    }

    /// Drops both the entity and its outgoing channel.
    pub fn remove_entity(&mut self, id: &str) {
        self.entities.remove(id);
        self.clients.remove(id);
    }

    /// Last value wins; stale ticks are not filtered.
    pub fn update_input(&mut self, id: &str, axes: Axes, tick: u64) {
        if let Some(e) = self.entities.get_mut(id) {
            e.last_input = Some(EntityInput { tick, axes });
        }
    }

    pub fn set_vehicle(&mut self, id: &str, vehicle: &str) {
        if let Some(e) = self.entities.get_mut(id) {
            e.vehicle = vehicle.to_string();
        }
    }

    pub fn snapshot<'a>(&'a self, physics: &'a PhysicsWorld) -> Snapshot<'a> {
        let mut players = Vec::with_capacity(self.entities.len());

        for entity in self.entities.values() {
            let (Some(pose), Some(telemetry)) = (physics.pose(&entity.id), physics.telemetry(&entity.id)) else {
                continue;
            };
            let [x, y, z] = pose.position;
            players.push(PlayerSnapshot {
                id: &entity.id,
                vehicle: &entity.vehicle,
                x,
                y,
                z,
                rotation: pose.rotation,
                telemetry,
            });
        }
        players.sort_by(|a, b| a.id.cmp(&b.id));

        Snapshot { tick: self.tick, players }
    }

    /// Build and send a snapshot of all entities to all clients.
    pub fn broadcast_snapshot(&mut self, physics: &PhysicsWorld) {
        let json = match serde_json::to_string(&self.snapshot(physics)) {
            Ok(json) => json,
            Err(e) => {
                tracing::error!(error = %e, "failed to serialize snapshot");
                return;
            }
        };

        // a closed receiver means the client task is gone
        self.clients.retain(|_, tx| tx.send(json.clone()).is_ok());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drivetrain::VehiclePreset;
    use tokio::sync::mpsc;

    #[test]
    fn input_is_last_value_wins() {
        let mut game = SharedGameState::new();
        let id = game.add_entity("family_sedan");
        game.update_input(&id, Axes { steer: 0.5, throttle: 1.0 }, 3);
        game.update_input(&id, Axes { steer: -0.2, throttle: 0.0 }, 4);

        let last = game.entities[&id].last_input.unwrap();
        assert_eq!(last.tick, 4);
        assert_eq!(last.axes, Axes { steer: -0.2, throttle: 0.0 });

        game.update_input("nobody", Axes::default(), 5);
        assert_eq!(game.entities.len(), 1);
    }

    #[test]
    fn snapshot_carries_pose_and_telemetry() {
        let mut game = SharedGameState::new();
        let mut physics = PhysicsWorld::new();
        let id = game.add_entity("sportscar");
        physics.spawn_vehicle(&id, VehiclePreset::Sportscar.config());
        physics.step(1.0 / 60.0);
        game.tick = 7;

        let (tx, mut rx) = mpsc::unbounded_channel();
        game.register_client(&id, tx);
        game.broadcast_snapshot(&physics);

        let msg = rx.try_recv().unwrap();
        let v: serde_json::Value = serde_json::from_str(&msg).unwrap();
        assert_eq!(v["tick"], 7);
        assert_eq!(v["players"][0]["id"], id.as_str());
        assert_eq!(v["players"][0]["vehicle"], "sportscar");
        assert!(v["players"][0]["telemetry"]["engine_rpm"].as_f64().unwrap() > 0.0);
    }

    #[test]
    fn closed_clients_are_pruned() {
        let mut game = SharedGameState::new();
        let physics = PhysicsWorld::new();
        let (tx, rx) = mpsc::unbounded_channel();
        game.register_client("gone", tx);
        drop(rx);
        game.broadcast_snapshot(&physics);
        assert!(game.clients.is_empty());
    }
}
