//! Input and state codec.
//!
//! Wire layout is fixed and shared by client and server: input messages are
//! `{o, m, i, w}` objects and state snapshots are `{orient, pos, vel, state,
//! weap}` objects. Button and state bit positions are part of the protocol
//! and must never be reordered.
//!
//! Malformed payloads are dropped, not errored: a non-object or type-invalid
//! message decodes to `None` and the tick simply proceeds with the previous
//! input state. The next well-formed message recovers everything.

use serde::{Deserialize, Serialize};

use crate::character::Character;
use crate::math::{Vec2, Vec3};
use crate::physics::PhysicsWorld;

bitflags::bitflags! {
    /// Packed input buttons, one bit each, in fixed wire order.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Buttons: u8 {
        const JUMP = 1 << 0;
        const CROUCH = 1 << 1;
        const FIRE = 1 << 2;
        const ALT_FIRE = 1 << 3;
        const USE = 1 << 4;
        const RELOAD = 1 << 5;
        const MELEE = 1 << 6;
        const ZOOM = 1 << 7;
    }
}

/// Snapshot state bit: character is standing on walkable ground.
pub const STATE_GROUNDED: u8 = 1 << 0;
/// Snapshot state bit: character is crouched.
pub const STATE_CROUCHED: u8 = 1 << 1;

/// One tick of controller input.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct InputWire {
    /// Look orientation: `x` = yaw, `y` = pitch, `z` unused.
    pub o: Vec3,
    /// Movement axis in local space; may exceed unit length on the wire.
    pub m: Vec2,
    /// Packed button bits, see [`Buttons`].
    pub i: u8,
    /// Weapon selection request; `None`/`null` when no switch is requested.
    #[serde(default)]
    pub w: Option<i32>,
}

/// One character's replicated state.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StateWire {
    /// `x` = yaw, `y` = pitch, `z` unused.
    pub orient: Vec3,
    pub pos: Vec3,
    pub vel: Vec3,
    /// Packed grounded/crouched bits.
    pub state: u8,
    /// Current weapon slot, `-1` when none.
    pub weap: i32,
}

/// Decodes an input payload; `None` for anything that is not a well-formed
/// input object.
pub fn decode_input(value: &serde_json::Value) -> Option<InputWire> {
    if !value.is_object() {
        return None;
    }
    serde_json::from_value(value.clone()).ok()
}

/// Decodes a snapshot payload with the same drop-on-malformed contract.
pub fn decode_state(value: &serde_json::Value) -> Option<StateWire> {
    if !value.is_object() {
        return None;
    }
    serde_json::from_value(value.clone()).ok()
}

/// Encodes a character's authoritative state.
pub fn encode_state(ch: &Character, physics: &dyn PhysicsWorld) -> StateWire {
    let mut state = 0u8;
    if ch.grounded {
        state |= STATE_GROUNDED;
    }
    if ch.crouched {
        state |= STATE_CROUCHED;
    }
    StateWire {
        orient: Vec3::new(ch.orientation.yaw, ch.orientation.pitch, 0.0),
        pos: physics.position(ch.body),
        vel: physics.velocity(ch.body),
        state,
        weap: ch.current_weapon.map_or(-1, |i| i as i32),
    }
}

/// Overwrites a character with a decoded snapshot (last-write-wins).
pub fn apply_state(ch: &mut Character, physics: &mut dyn PhysicsWorld, wire: &StateWire) {
    ch.orientation.yaw = wire.orient.x;
    ch.orientation.pitch = wire.orient.y;
    physics.set_position(ch.body, wire.pos);
    physics.set_velocity(ch.body, wire.vel);
    ch.grounded = wire.state & STATE_GROUNDED != 0;
    ch.crouched = wire.state & STATE_CROUCHED != 0;
    ch.current_weapon = match usize::try_from(wire.weap) {
        Ok(idx) if idx < ch.weapons.len() && ch.weapons[idx].is_some() => Some(idx),
        _ => None,
    };
}
