//! `arena_client`
//!
//! Client-side systems:
//! - Connection management (reliable + unreliable channels)
//! - Input capture and command generation
//! - Local prediction running the shared simulation, reconciled by
//!   snapping to the server's authoritative snapshots
//! - Interpolation for remote character states

pub mod client;
pub mod input;
pub mod interp;

pub use client::GameClient;
