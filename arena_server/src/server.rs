//! Server implementation.
//!
//! An authoritative tick-based server. Per tick it drains queued client
//! input, steps the shared simulation against the physics world, relays
//! lifecycle events over the reliable channel, and broadcasts a state
//! snapshot over UDP.
//!
//! Determinism notes:
//! - Keep simulation in a fixed timestep.
//! - Avoid wall-clock-dependent branching in gameplay code.
//! - Use stable ordering when iterating collections.

use anyhow::Context;
use arena_shared::{
    character::{CharacterConfig, CharacterId, Weapon},
    codec,
    config::SimConfig,
    filter::Team,
    math::Vec3,
    net::{
        CharacterSpawn, CharacterState, ClientId, NetMsg, PlayerInput, ReliableConn,
        ReliableListener, Snapshot, PROTOCOL_VERSION,
    },
    physics::{demo_arena, FlatWorld, PhysicsWorld},
    world::{SimEvent, SimWorld},
};
use rand::seq::SliceRandom;
use std::{
    collections::HashMap,
    net::{IpAddr, Ipv4Addr, SocketAddr},
    time::Duration,
};
use tokio::{net::UdpSocket, time::Instant};
use tracing::{debug, info, warn};

/// Connected client state.
struct ClientState {
    reliable: ReliableConn,
    udp_peer: SocketAddr,
    last_input_tick: u32,
    /// Whether the client has requested to be spawned into the world.
    ready: bool,
    /// Character controlled by this client, cleared on death.
    character: Option<CharacterId>,
}

/// Game server.
pub struct GameServer {
    pub cfg: SimConfig,
    sim: SimWorld,
    physics: FlatWorld,
    clients: HashMap<ClientId, ClientState>,

    tcp: ReliableListener,
    udp: UdpSocket,

    /// Client id allocation is owned here, not by process-wide state.
    next_client_id: u32,
    spawn_points: Vec<Vec3>,
}

/// Default loadout handed to fresh spawns. Slot 2 is intentionally left
/// empty so relative weapon cycling gets exercised in real play.
fn default_loadout() -> Vec<Option<Weapon>> {
    vec![
        Some(Weapon::new("knife")),
        Some(Weapon::new("pistol")),
        None,
        Some(Weapon::new("rifle")),
    ]
}

impl GameServer {
    /// Creates a new server with the given config.
    pub async fn new(cfg: SimConfig) -> anyhow::Result<Self> {
        let addr: SocketAddr = cfg.server_addr.parse().context("parse server_addr")?;
        let tcp = ReliableListener::bind(addr).await?;
        let udp = UdpSocket::bind(addr).await.context("udp bind")?;

        let mut physics = FlatWorld::new();
        let spawn_points = demo_arena(&mut physics);

        Ok(Self {
            cfg,
            sim: SimWorld::new(),
            physics,
            clients: HashMap::new(),
            tcp,
            udp,
            next_client_id: 1,
            spawn_points,
        })
    }

    /// Returns the local address (after binding).
    pub fn local_addr(&self) -> anyhow::Result<SocketAddr> {
        self.tcp.local_addr()
    }

    /// Current simulation tick.
    pub fn tick(&self) -> u32 {
        self.sim.tick_count()
    }

    /// Number of connected clients.
    pub fn client_count(&self) -> usize {
        self.clients.len()
    }

    /// Number of live characters.
    pub fn character_count(&self) -> usize {
        self.sim.len()
    }

    fn alloc_client_id(&mut self) -> ClientId {
        let id = ClientId(self.next_client_id);
        self.next_client_id += 1;
        id
    }

    /// Accepts exactly one client (blocking handshake).
    pub async fn accept_one(&mut self) -> anyhow::Result<ClientId> {
        let (conn, peer) = self.tcp.accept().await?;
        self.handle_new_connection(conn, peer).await
    }

    /// Accepts a client with timeout (non-blocking).
    pub async fn try_accept(&mut self, timeout: Duration) -> anyhow::Result<Option<ClientId>> {
        match tokio::time::timeout(timeout, self.tcp.accept()).await {
            Ok(Ok((conn, peer))) => self.handle_new_connection(conn, peer).await.map(Some),
            Ok(Err(e)) => Err(e),
            Err(_) => Ok(None), // Timeout
        }
    }

    async fn handle_new_connection(
        &mut self,
        mut conn: ReliableConn,
        peer: SocketAddr,
    ) -> anyhow::Result<ClientId> {
        let msg = conn.recv().await?;
        match msg {
            NetMsg::Hello { protocol } if protocol == PROTOCOL_VERSION => {
                let udp_hello = conn.recv().await?;
                let client_udp_port = match udp_hello {
                    NetMsg::UdpHello { client_udp_port } => client_udp_port,
                    other => anyhow::bail!("expected UdpHello, got {other:?}"),
                };

                let id = self.alloc_client_id();
                conn.send(&NetMsg::Welcome { client_id: id }).await?;

                let udp_peer = SocketAddr::new(peer.ip(), client_udp_port);
                self.clients.insert(
                    id,
                    ClientState {
                        reliable: conn,
                        udp_peer,
                        last_input_tick: 0,
                        ready: false,
                        character: None,
                    },
                );

                info!(client_id = ?id, %udp_peer, "Client connected");
                Ok(id)
            }
            other => anyhow::bail!("unexpected handshake msg: {other:?}"),
        }
    }

    /// Marks a client as ready and spawns their character.
    pub fn client_ready(&mut self, client_id: ClientId) -> anyhow::Result<CharacterId> {
        let spawn = self
            .spawn_points
            .choose(&mut rand::thread_rng())
            .copied()
            .unwrap_or(Vec3::new(0.0, 0.0, 0.9));

        // alternate teams by connection order
        let team = if client_id.0 % 2 == 1 {
            Team::Alpha
        } else {
            Team::Bravo
        };

        let character = self.sim.spawn_character(
            &mut self.physics,
            CharacterConfig::default(),
            team,
            Some(client_id),
            spawn,
            default_loadout(),
        );

        if let Some(client) = self.clients.get_mut(&client_id) {
            client.ready = true;
            client.character = Some(character);
        }

        info!(client_id = ?client_id, character = ?character, "Client ready, character spawned");
        Ok(character)
    }

    /// Runs the server for a number of ticks.
    pub async fn run_for_ticks(&mut self, ticks: u32) -> anyhow::Result<()> {
        let dt = Duration::from_secs_f32(1.0 / self.cfg.tick_hz as f32);
        let mut next = Instant::now();

        for _ in 0..ticks {
            next += dt;
            self.step(dt.as_secs_f32()).await?;
            tokio::time::sleep_until(next).await;
        }
        Ok(())
    }

    /// Executes one fixed simulation step.
    pub async fn step(&mut self, dt_sec: f32) -> anyhow::Result<()> {
        self.recv_inputs().await?;
        let events = self.sim.tick(&mut self.physics, dt_sec);
        self.relay_events(events).await;
        self.send_snapshots().await?;
        Ok(())
    }

    async fn recv_inputs(&mut self) -> anyhow::Result<()> {
        let mut buf = vec![0u8; 64 * 1024];
        loop {
            match self.udp.try_recv_from(&mut buf) {
                Ok((n, from)) => {
                    if let Ok(msg) = serde_json::from_slice::<NetMsg>(&buf[..n]) {
                        self.handle_udp_message(from, msg);
                    }
                }
                Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => break,
                Err(e) => return Err(e).context("udp recv")?,
            }
        }
        Ok(())
    }

    fn handle_udp_message(&mut self, from: SocketAddr, msg: NetMsg) {
        match msg {
            NetMsg::PlayerInput(input) => {
                self.on_input(from, input);
            }
            NetMsg::ClientReady { client_id } => {
                if self.clients.get(&client_id).is_some_and(|c| !c.ready) {
                    if let Err(e) = self.client_ready(client_id) {
                        warn!(client_id = ?client_id, error = %e, "Failed to spawn client");
                    }
                }
            }
            _ => {
                debug!(?msg, "Unexpected UDP message");
            }
        }
    }

    fn on_input(&mut self, from: SocketAddr, input: PlayerInput) {
        if let Some(client) = self.clients.get_mut(&input.client_id) {
            client.udp_peer = from;
            client.last_input_tick = input.tick;

            if let Some(character) = client.character {
                // the payload stays raw here; the sim's codec validates it
                self.sim.queue_input(character, input.cmd);
            }
        }
    }

    async fn relay_events(&mut self, events: Vec<SimEvent>) {
        for event in events {
            match event {
                SimEvent::Spawned(id) => {
                    let Some(ch) = self.sim.character(id) else {
                        continue;
                    };
                    let spawn = CharacterSpawn {
                        id,
                        client_id: ch.controller,
                        team: ch.team,
                        position: self.physics.position(ch.body),
                    };
                    for client in self.clients.values_mut() {
                        let _ = client.reliable.send(&NetMsg::CharacterSpawn(spawn.clone())).await;
                    }
                }
                SimEvent::Died(id) => {
                    // sever the controller's reference to the character
                    for client in self.clients.values_mut() {
                        if client.character == Some(id) {
                            client.character = None;
                        }
                        let _ = client
                            .reliable
                            .send(&NetMsg::CharacterDespawn { id })
                            .await;
                    }
                    info!(character = ?id, "Character despawned");
                }
            }
        }
    }

    async fn send_snapshots(&self) -> anyhow::Result<()> {
        let characters: Vec<CharacterState> = self
            .sim
            .characters()
            .map(|(id, ch)| CharacterState {
                id,
                state: codec::encode_state(ch, &self.physics),
                health: ch.health,
                armor: ch.armor,
            })
            .collect();

        let snap = NetMsg::Snapshot(Snapshot {
            tick: self.sim.tick_count(),
            characters,
        });
        let payload = serde_json::to_vec(&snap).context("serialize snapshot")?;

        for c in self.clients.values() {
            if c.ready {
                let _ = self.udp.send_to(&payload, c.udp_peer).await;
            }
        }
        Ok(())
    }
}

/// Helper for tests: bind to an ephemeral port.
pub async fn bind_ephemeral(tick_hz: u32) -> anyhow::Result<(GameServer, SimConfig)> {
    let cfg = SimConfig {
        server_addr: format!("{}:{}", IpAddr::V4(Ipv4Addr::LOCALHOST), 0),
        tick_hz,
        ..Default::default()
    };

    // Bind TCP first to get an ephemeral port, then bind UDP to that same port.
    let tcp = ReliableListener::bind(cfg.server_addr.parse()?).await?;
    let addr = tcp.local_addr()?;
    let mut cfg = cfg;
    cfg.server_addr = addr.to_string();

    let udp_bind = SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), addr.port());
    let udp = UdpSocket::bind(udp_bind).await?;

    let mut physics = FlatWorld::new();
    let spawn_points = demo_arena(&mut physics);

    Ok((
        GameServer {
            cfg: cfg.clone(),
            sim: SimWorld::new(),
            physics,
            clients: HashMap::new(),
            tcp,
            udp,
            next_client_id: 1,
            spawn_points,
        },
        cfg,
    ))
}
