//! `arena_server`
//!
//! Server-side systems:
//! - Fixed timestep authoritative simulation loop
//! - Character spawn/despawn per connected client
//! - Receives raw input payloads over UDP
//! - Sends `Snapshot`s
//!
//! Networking model:
//! - TCP: handshake/control plane (spawns, despawns, disconnects)
//! - UDP: gameplay plane (inputs/snapshots)

pub mod server;

pub use server::GameServer;
