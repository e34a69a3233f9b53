//! Client implementation.
//!
//! The client maintains:
//! - A reliable control stream (handshake + spawn/despawn + critical messages)
//! - An unreliable datagram socket (inputs, snapshots)
//! - Snapshot history for interpolating remote characters
//! - A local prediction world running the same shared simulation as the
//!   server; each authoritative snapshot overwrites the predicted state
//!   (snap-to-server, last-write-wins; no rollback/resimulation)

use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use anyhow::Context;
use arena_shared::{
    character::{CharacterConfig, CharacterId},
    codec,
    config::SimConfig,
    net::{
        CharacterSpawn, ClientId, NetMsg, PlayerInput, ReliableConn, UnreliableConn,
        PROTOCOL_VERSION,
    },
    physics::{demo_arena, FlatWorld, PhysicsWorld},
    world::SimWorld,
};
use tokio::net::TcpStream;
use tracing::{debug, info, warn};

use crate::{
    input::{build_command, InputState},
    interp::SnapshotBuffer,
};

/// Client connection state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientState {
    /// Not connected to any server.
    Disconnected,
    /// Connected, waiting to be spawned.
    Connected,
    /// Our character exists; prediction is live.
    Playing,
}

/// High-level game client.
pub struct GameClient {
    pub client_id: ClientId,
    pub state: ClientState,

    reliable: ReliableConn,
    pub unreliable: UnreliableConn,
    pub snaps: SnapshotBuffer,
    tick: u32,
    tick_hz: u32,

    /// Prediction world mirroring the server's simulation.
    predict_sim: SimWorld,
    predict_physics: FlatWorld,
    /// Our character's id in the local prediction world.
    predicted: Option<CharacterId>,
    /// Our character's id as the server knows it.
    pub server_character: Option<CharacterId>,

    /// Characters announced by the server (own and remote).
    pub known_spawns: Vec<CharacterSpawn>,

    /// Server messages to display.
    pub server_messages: Vec<String>,
}

impl GameClient {
    /// Connects to a server and performs handshake.
    pub async fn connect(cfg: &SimConfig) -> anyhow::Result<Self> {
        let server_addr: SocketAddr = cfg.server_addr.parse().context("parse server_addr")?;

        info!(server = %server_addr, "Connecting to server");

        // Bind UDP first so we can tell the server where to send snapshots.
        let bind = SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 0);
        let unreliable = UnreliableConn::connect(bind, server_addr).await?;
        let client_udp_port = unreliable.local_addr().context("udp local_addr")?.port();

        let stream = TcpStream::connect(server_addr)
            .await
            .context("tcp connect")?;
        let mut reliable = ReliableConn::new(stream);

        reliable
            .send(&NetMsg::Hello {
                protocol: PROTOCOL_VERSION,
            })
            .await?;

        reliable.send(&NetMsg::UdpHello { client_udp_port }).await?;

        let welcome = reliable.recv().await?;
        let client_id = match welcome {
            NetMsg::Welcome { client_id } => client_id,
            other => anyhow::bail!("expected Welcome, got {other:?}"),
        };

        info!(client_id = ?client_id, "Connected to server");

        let mut predict_physics = FlatWorld::new();
        // prediction must run against the same geometry as the server
        let _spawn_points = demo_arena(&mut predict_physics);

        Ok(Self {
            client_id,
            state: ClientState::Connected,
            reliable,
            unreliable,
            snaps: SnapshotBuffer::new(32),
            tick: 0,
            tick_hz: cfg.tick_hz,
            predict_sim: SimWorld::new(),
            predict_physics,
            predicted: None,
            server_character: None,
            known_spawns: Vec::new(),
            server_messages: Vec::new(),
        })
    }

    /// Sends a "ready" signal to the server, requesting a spawn.
    pub async fn send_ready(&mut self) -> anyhow::Result<()> {
        self.unreliable
            .send(&NetMsg::ClientReady {
                client_id: self.client_id,
            })
            .await?;
        info!("Sent ready signal to server");
        Ok(())
    }

    /// Polls the reliable connection for messages.
    pub async fn poll_reliable(&mut self) -> anyhow::Result<()> {
        // Use a short timeout to avoid blocking.
        match tokio::time::timeout(std::time::Duration::from_millis(10), self.reliable.recv()).await
        {
            Ok(Ok(msg)) => {
                self.handle_reliable_message(msg);
            }
            Ok(Err(e)) => {
                warn!(error = %e, "Reliable connection error");
                self.state = ClientState::Disconnected;
            }
            Err(_) => {
                // Timeout, no message available.
            }
        }
        Ok(())
    }

    fn handle_reliable_message(&mut self, msg: NetMsg) {
        match msg {
            NetMsg::CharacterSpawn(spawn) => {
                debug!(id = ?spawn.id, team = ?spawn.team, "Character spawn received");
                if spawn.client_id == Some(self.client_id) {
                    self.spawn_prediction(&spawn);
                }
                self.known_spawns.push(spawn);
            }
            NetMsg::CharacterDespawn { id } => {
                debug!(id = ?id, "Character despawn received");
                self.known_spawns.retain(|s| s.id != id);
                if self.server_character == Some(id) {
                    if let Some(predicted) = self.predicted.take() {
                        self.predict_sim.despawn(predicted, &mut self.predict_physics);
                    }
                    self.server_character = None;
                    self.state = ClientState::Connected;
                }
            }
            NetMsg::ServerPrint { message } => {
                info!(message = %message, "Server message");
                self.server_messages.push(message);
            }
            NetMsg::Disconnect { reason } => {
                info!(reason = %reason, "Disconnected from server");
                self.state = ClientState::Disconnected;
            }
            other => {
                debug!(?other, "Unhandled reliable message");
            }
        }
    }

    /// Mirrors our server-side character into the prediction world.
    fn spawn_prediction(&mut self, spawn: &CharacterSpawn) {
        let config = CharacterConfig::default();
        // the spawn packet carries the neck origin; recreate from body center
        let center = arena_shared::math::Vec3::new(
            spawn.position.x,
            spawn.position.y,
            spawn.position.z - config.body_height * 0.5,
        );
        let predicted = self.predict_sim.spawn_character(
            &mut self.predict_physics,
            config,
            spawn.team,
            Some(self.client_id),
            center,
            Vec::new(),
        );
        self.predicted = Some(predicted);
        self.server_character = Some(spawn.id);
        self.state = ClientState::Playing;
        info!(server_id = ?spawn.id, local_id = ?predicted, "Prediction started");
    }

    /// Advances one client tick: send the input command and predict locally.
    pub async fn tick(&mut self, input: InputState) -> anyhow::Result<PlayerInput> {
        let cmd = build_command(self.client_id, self.tick, input);
        self.unreliable
            .send(&NetMsg::PlayerInput(cmd.clone()))
            .await?;

        // run the same simulation the server will run for this input
        if let Some(predicted) = self.predicted {
            self.predict_sim.queue_input(predicted, cmd.cmd.clone());
            let dt = 1.0 / self.tick_hz.max(1) as f32;
            self.predict_sim.tick(&mut self.predict_physics, dt);
        }

        self.tick += 1;
        Ok(cmd)
    }

    /// Receives messages over the unreliable channel and reconciles.
    pub async fn recv_snapshot(&mut self) -> anyhow::Result<()> {
        if let Some(msg) = self
            .unreliable
            .recv_timeout(std::time::Duration::from_millis(20))
            .await?
        {
            match msg {
                NetMsg::Snapshot(snap) => {
                    self.reconcile(&snap);
                    self.snaps.push(snap);
                }
                other => {
                    debug!(?other, "Unexpected UDP message");
                }
            }
        }
        Ok(())
    }

    /// Applies the authoritative state of our character over the prediction.
    fn reconcile(&mut self, snap: &arena_shared::net::Snapshot) {
        let (Some(server_id), Some(predicted)) = (self.server_character, self.predicted) else {
            return;
        };
        let Some(entry) = snap.characters.iter().find(|c| c.id == server_id) else {
            return;
        };
        if let Some(ch) = self.predict_sim.character_mut(predicted) {
            codec::apply_state(ch, &mut self.predict_physics, &entry.state);
            ch.health = entry.health;
            ch.armor = entry.armor;
        }
    }

    /// The predicted local character's position, when playing.
    pub fn predicted_position(&self) -> Option<arena_shared::math::Vec3> {
        let predicted = self.predicted?;
        let ch = self.predict_sim.character(predicted)?;
        Some(self.predict_physics.position(ch.body))
    }

    /// Returns the underlying reliable connection peer.
    pub fn server_peer(&self) -> anyhow::Result<SocketAddr> {
        self.reliable.peer_addr()
    }
}
