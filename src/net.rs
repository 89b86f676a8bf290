use std::net::SocketAddr;
use std::sync::Arc;

use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, Mutex};
use tokio_tungstenite::accept_async;
use tungstenite::Message;

use crate::drivetrain::{VehicleConfig, VehiclePreset};
use crate::physics::PhysicsWorld;
use crate::state::{Axes, SharedGameState};

/// client -> server
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    Input {
        #[serde(default)]
        steer: f32,
        #[serde(default)]
        throttle: f32,
    },
    /// Respawn in a named preset.
    Join { preset: String },
    /// Manual gear request; the reply says whether the gearbox took it.
    Shift { up: bool },
    Ping,
}

impl ClientMessage {
    pub fn from_json(txt: &str) -> Option<Self> {
        serde_json::from_str(txt).ok()
    }
}

/// server -> client (snapshots are sent by `SharedGameState`)
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage<'a> {
    Welcome { player_id: &'a str, vehicle: &'a str },
    Pong,
    Shift { up: bool, accepted: bool },
    Error { message: String },
}

impl ServerMessage<'_> {
    fn to_json(&self) -> Option<String> {
        match serde_json::to_string(self) {
            Ok(s) => Some(s),
            Err(e) => {
                tracing::error!(error = %e, "failed to serialize server message");
                None
            }
        }
    }
}

/// Shared handles every client task needs.
#[derive(Clone)]
pub struct ServerContext {
    pub state: Arc<Mutex<SharedGameState>>,
    pub physics: Arc<Mutex<PhysicsWorld>>,
    pub default_vehicle: Arc<VehicleConfig>,
}

pub async fn start_websocket_server(bind: SocketAddr, ctx: ServerContext) -> std::io::Result<()> {
    let listener = TcpListener::bind(bind).await?;
    tracing::info!(%bind, "websocket listening");

    loop {
        let (raw, peer) = match listener.accept().await {
            Ok(conn) => conn,
            Err(e) => {
                tracing::warn!(error = %e, "accept failed");
                continue;
            }
        };
        tokio::spawn(handle_client(raw, peer, ctx.clone()));
    }
}

async fn handle_client(raw: TcpStream, peer: SocketAddr, ctx: ServerContext) {
    let ws = match accept_async(raw).await {
        Ok(ws) => ws,
        Err(e) => {
            tracing::warn!(%peer, error = %e, "websocket handshake failed");
            return;
        }
    };
    let (mut write, mut read) = ws.split();

    // -------------------------------
    // 1) outgoing message channel + send loop
    // -------------------------------
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();
    tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if write.send(Message::Text(msg)).await.is_err() {
                break;
            }
        }
    });

    // -------------------------------
    // 2) entity + physics body
    // -------------------------------
    let player_id = {
        let mut game = ctx.state.lock().await;
        let id = game.add_entity(&ctx.default_vehicle.name);
        game.register_client(&id, tx.clone());

        let mut phys = ctx.physics.lock().await;
        phys.spawn_vehicle(&id, (*ctx.default_vehicle).clone());
        id
    };
    tracing::info!(player = %player_id, %peer, "player connected");

    let welcome = ServerMessage::Welcome { player_id: &player_id, vehicle: &ctx.default_vehicle.name };
    if let Some(json) = welcome.to_json() {
        let _ = tx.send(json);
    }

    // -------------------------------
    // 3) receive loop
    // -------------------------------
    while let Some(msg) = read.next().await {
        let msg = match msg {
            Ok(m) => m,
            Err(e) => {
                tracing::debug!(player = %player_id, error = %e, "read failed");
                break;
            }
        };
        if msg.is_close() {
            break;
        }
        let Ok(text) = msg.to_text() else {
            continue;
        };
        let Some(parsed) = ClientMessage::from_json(text) else {
            tracing::debug!(player = %player_id, text, "ignoring unparseable message");
            continue;
        };

        if let Some(reply) = handle_message(&ctx, &player_id, parsed).await {
            let _ = tx.send(reply);
        }
    }

    tracing::info!(player = %player_id, "player disconnected");
    ctx.state.lock().await.remove_entity(&player_id);
    ctx.physics.lock().await.remove_vehicle(&player_id);
}

/// Applies one client message; returns the reply, if any.
pub async fn handle_message(ctx: &ServerContext, player_id: &str, msg: ClientMessage) -> Option<String> {
    match msg {
        ClientMessage::Ping => ServerMessage::Pong.to_json(),

        ClientMessage::Input { steer, throttle } => {
            let mut game = ctx.state.lock().await;
            let tick = game.tick;
            game.update_input(player_id, Axes { steer, throttle }, tick);
            None
        }

        ClientMessage::Shift { up } => {
            let accepted = ctx.physics.lock().await.shift(player_id, up);
            ServerMessage::Shift { up, accepted }.to_json()
        }

        ClientMessage::Join { preset } => match preset.parse::<VehiclePreset>() {
            Ok(preset) => {
                ctx.physics.lock().await.spawn_vehicle(player_id, preset.config());
                ctx.state.lock().await.set_vehicle(player_id, preset.as_str());
                ServerMessage::Welcome { player_id, vehicle: preset.as_str() }.to_json()
            }
            Err(e) => {
                tracing::warn!(player = %player_id, error = %e, "join refused");
                ServerMessage::Error { message: e.to_string() }.to_json()
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context() -> ServerContext {
        ServerContext {
            state: Arc::new(Mutex::new(SharedGameState::new())),
            physics: Arc::new(Mutex::new(PhysicsWorld::new())),
            default_vehicle: Arc::new(VehiclePreset::FamilySedan.config()),
        }
    }

    #[test]
    fn client_messages_parse() {
        assert_eq!(
            ClientMessage::from_json(r#"{"type":"input","steer":0.5,"throttle":-1}"#),
            Some(ClientMessage::Input { steer: 0.5, throttle: -1.0 })
        );
        assert_eq!(
            ClientMessage::from_json(r#"{"type":"input","throttle":0.3}"#),
            Some(ClientMessage::Input { steer: 0.0, throttle: 0.3 })
        );
        assert_eq!(ClientMessage::from_json(r#"{"type":"ping"}"#), Some(ClientMessage::Ping));
        assert_eq!(
            ClientMessage::from_json(r#"{"type":"join","preset":"race_car"}"#),
            Some(ClientMessage::Join { preset: "race_car".into() })
        );
        assert_eq!(ClientMessage::from_json(r#"{"type":"fly"}"#), None);
        assert_eq!(ClientMessage::from_json("not json"), None);
    }

    #[test]
    fn server_messages_are_tagged() {
        let json = ServerMessage::Welcome { player_id: "abc", vehicle: "sportscar" }.to_json().unwrap();
        assert_eq!(json, r#"{"type":"welcome","player_id":"abc","vehicle":"sportscar"}"#);
        assert_eq!(ServerMessage::Pong.to_json().unwrap(), r#"{"type":"pong"}"#);
    }

    #[tokio::test]
    async fn input_is_stored_and_join_respawns() {
        let ctx = context();
        let id = ctx.state.lock().await.add_entity("family_sedan");

        let reply = handle_message(&ctx, &id, ClientMessage::Input { steer: 0.1, throttle: 0.9 }).await;
        assert!(reply.is_none());
        let axes = ctx.state.lock().await.entities[&id].last_input.map(|i| i.axes);
        assert_eq!(axes, Some(Axes { steer: 0.1, throttle: 0.9 }));

        let reply = handle_message(&ctx, &id, ClientMessage::Join { preset: "electric_hatch".into() }).await;
        assert!(reply.unwrap().contains("electric_hatch"));
        assert!(ctx.physics.lock().await.vehicles.contains_key(&id));
        assert_eq!(ctx.state.lock().await.entities[&id].vehicle, "electric_hatch");

        let reply = handle_message(&ctx, &id, ClientMessage::Join { preset: "tank".into() }).await;
        assert!(reply.unwrap().contains("\"type\":\"error\""));
    }

    #[tokio::test]
    async fn shift_without_a_car_is_refused() {
        let ctx = context();
        let reply = handle_message(&ctx, "nobody", ClientMessage::Shift { up: true }).await.unwrap();
        assert!(reply.contains("\"accepted\":false"));
    }
}
