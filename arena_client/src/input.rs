//! Input handling.
//!
//! In a real client this would integrate with windowing, raw mouse/keyboard,
//! action bindings, and per-frame sampling. This scaffold focuses on turning
//! sampled state into deterministic per-tick `PlayerInput` messages in the
//! `{o, m, i, w}` wire layout.

use arena_shared::{
    codec::{Buttons, InputWire},
    math::{Vec2, Vec3},
    net::{ClientId, PlayerInput},
};

/// User input state at a moment in time.
#[derive(Debug, Clone, Copy, Default)]
pub struct InputState {
    /// Local movement wish; clamping to unit length happens in the sim.
    pub axis: Vec2,
    pub yaw: f32,
    pub pitch: f32,
    pub jump: bool,
    pub crouch: bool,
    pub fire: bool,
    pub alt_fire: bool,
    pub use_key: bool,
    pub reload: bool,
    pub melee: bool,
    pub zoom: bool,
    /// Weapon switch request, `None` when untouched this tick.
    pub weapon: Option<i32>,
}

impl InputState {
    /// Packs the button booleans in wire bit order.
    pub fn buttons(&self) -> Buttons {
        let mut b = Buttons::empty();
        b.set(Buttons::JUMP, self.jump);
        b.set(Buttons::CROUCH, self.crouch);
        b.set(Buttons::FIRE, self.fire);
        b.set(Buttons::ALT_FIRE, self.alt_fire);
        b.set(Buttons::USE, self.use_key);
        b.set(Buttons::RELOAD, self.reload);
        b.set(Buttons::MELEE, self.melee);
        b.set(Buttons::ZOOM, self.zoom);
        b
    }

    /// The `{o, m, i, w}` wire form of this input.
    pub fn wire(&self) -> InputWire {
        InputWire {
            o: Vec3::new(self.yaw, self.pitch, 0.0),
            m: self.axis,
            i: self.buttons().bits(),
            w: self.weapon,
        }
    }
}

/// Turns sampled input into a `PlayerInput` for a tick.
pub fn build_command(client_id: ClientId, tick: u32, input: InputState) -> PlayerInput {
    // serializing a plain struct cannot realistically fail; a null payload
    // would simply be dropped by the receiving codec
    let cmd = serde_json::to_value(input.wire()).unwrap_or(serde_json::Value::Null);
    PlayerInput {
        client_id,
        tick,
        cmd,
    }
}
