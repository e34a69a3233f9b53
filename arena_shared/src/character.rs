//! Character entity and lifecycle.
//!
//! One concrete type per controlled agent, with no base-class hierarchy. The character owns its rigid-body handle, derived probe
//! geometry, health/armor, weapon slots, and per-tick input state. Movement,
//! probing, crouch, and platform reconciliation live in sibling modules and
//! mutate the character through `&mut`.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::codec::Buttons;
use crate::filter::{resolve, Team};
use crate::math::{Vec2, Vec3};
use crate::net::ClientId;
use crate::physics::{BodyDesc, BodyHandle, BodyKind, PhysicsWorld, ShapeDesc};
use crate::platform::PlatformAttachment;

/// Ticks a jump press stays live while waiting for ground contact.
pub const JUMP_WINDOW_TICKS: u32 = 10;

/// Fraction of incoming damage charged to armor when armor is present.
pub const ARMOR_ABSORPTION: f32 = 2.0 / 3.0;

/// Identifies a character within one world. Never zero.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct CharacterId(pub u32);

/// Look direction. The body itself is rotation-locked; this is the only
/// orientation state that exists.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct Orientation {
    pub yaw: f32,
    pub pitch: f32,
}

/// A held weapon. Firing is dispatched externally; the simulation core only
/// tracks which slot is current.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Weapon {
    pub name: String,
}

impl Weapon {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// Fully-enumerated character tuning. Every field has an explicit default;
/// a configured `0.0` is respected, never treated as "unset".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CharacterConfig {
    /// Standing collider height.
    pub body_height: f32,
    /// Collider height when fully crouched.
    pub crouch_height: f32,
    /// Horizontal collider extent; also fixes the probe footprint.
    pub body_width: f32,
    /// Head volume edge length, stacked above the neck origin.
    pub head_size: f32,
    pub mass: f32,
    pub walk_speed: f32,
    pub crouch_speed: f32,
    pub jump_force: f32,
    pub max_health: f32,
    /// Starting armor; `None` means this character has no armor system.
    pub armor: Option<f32>,
    /// Armor cap; `None` means uncapped.
    pub max_armor: Option<f32>,
}

impl Default for CharacterConfig {
    fn default() -> Self {
        Self {
            body_height: 1.8,
            crouch_height: 1.2,
            body_width: 0.6,
            head_size: 0.3,
            mass: 80.0,
            walk_speed: 6.0,
            crouch_speed: 3.0,
            jump_force: 7.0,
            max_health: 100.0,
            armor: Some(0.0),
            max_armor: Some(100.0),
        }
    }
}

/// One controlled agent.
#[derive(Debug)]
pub struct Character {
    pub id: CharacterId,
    /// Owning controller; weak by construction, severed on death.
    pub controller: Option<ClientId>,
    pub team: Team,
    pub config: CharacterConfig,

    pub health: f32,
    pub max_health: f32,
    pub armor: Option<f32>,
    pub max_armor: Option<f32>,

    pub orientation: Orientation,
    pub grounded: bool,
    pub crouched: bool,
    pub dead: bool,
    /// Countdown in ticks; loaded on a jump press, zeroed when a jump fires.
    pub jump_timer: u32,
    pub platform: Option<PlatformAttachment>,

    /// Sparse slot list; empty entries are legal.
    pub weapons: Vec<Option<Weapon>>,
    /// Invariant: when `Some`, always indexes a populated slot.
    pub current_weapon: Option<usize>,

    pub body: BodyHandle,
    pub body_shape: usize,
    pub head_shape: usize,
    /// Current vertical half-extent of the body collider; the crouch state
    /// machine interpolates it within `[crouch_height/2, body_height/2]`.
    pub half_height: f32,
    /// Footprint sample points: center first, then the four corners.
    pub probe_offsets: [Vec2; 5],

    /// Latest decoded input, persisted across ticks with no message.
    pub movement: Vec2,
    pub buttons: Buttons,
    pub weapon_request: Option<i32>,
    pub(crate) queued_input: Option<serde_json::Value>,
}

impl Character {
    /// Creates the character and its rigid body.
    ///
    /// `position` places the body's center; the origin is raised by half
    /// the body height so it sits at neck level, with the body volume
    /// hanging below it and the head volume stacked above.
    pub fn spawn(
        id: CharacterId,
        controller: Option<ClientId>,
        team: Team,
        config: CharacterConfig,
        physics: &mut dyn PhysicsWorld,
        position: Vec3,
        weapons: Vec<Option<Weapon>>,
    ) -> Self {
        let half = config.body_height * 0.5;
        let half_w = config.body_width * 0.5;
        let origin = Vec3::new(position.x, position.y, position.z + half);

        let body = physics.create_body(BodyDesc {
            kind: BodyKind::Dynamic,
            mass: config.mass,
            position: origin,
            rotation_locked: true,
            filter: resolve(team, false),
        });
        let body_shape = physics.add_shape(
            body,
            ShapeDesc {
                half_extents: Vec3::new(half_w, half_w, half),
                offset: Vec3::new(0.0, 0.0, -half),
            },
        );
        let head_half = config.head_size * 0.5;
        let head_shape = physics.add_shape(
            body,
            ShapeDesc {
                half_extents: Vec3::new(head_half, head_half, head_half),
                offset: Vec3::new(0.0, 0.0, head_half),
            },
        );

        let probe_offsets = [
            Vec2::ZERO,
            Vec2::new(-half_w, -half_w),
            Vec2::new(-half_w, half_w),
            Vec2::new(half_w, -half_w),
            Vec2::new(half_w, half_w),
        ];

        let current_weapon = weapons.iter().position(|slot| slot.is_some());

        debug!(id = ?id, team = ?team, "Character spawned");

        Self {
            id,
            controller,
            team,
            health: config.max_health,
            max_health: config.max_health,
            armor: config.armor,
            max_armor: config.max_armor,
            orientation: Orientation::default(),
            grounded: false,
            crouched: false,
            dead: false,
            jump_timer: 0,
            platform: None,
            weapons,
            current_weapon,
            body,
            body_shape,
            head_shape,
            half_height: half,
            probe_offsets,
            movement: Vec2::ZERO,
            buttons: Buttons::empty(),
            weapon_request: None,
            queued_input: None,
            config,
        }
    }

    /// Queues a raw input payload for the next tick's decode pass.
    pub fn queue_input(&mut self, raw: serde_json::Value) {
        self.queued_input = Some(raw);
    }

    /// Horizontal speed for the current stance.
    pub fn speed(&self) -> f32 {
        if self.crouched {
            self.config.crouch_speed
        } else {
            self.config.walk_speed
        }
    }

    /// Applies incoming damage, splitting it between armor and health.
    ///
    /// Armor, when present and positive, absorbs a fixed fraction; whatever
    /// armor cannot cover transfers back onto health, so the total charged
    /// across both pools always equals `amount`.
    pub fn apply_damage(&mut self, amount: f32) {
        if self.dead {
            return;
        }

        let mut health_damage = amount;
        if let Some(armor) = self.armor.as_mut() {
            if *armor > 0.0 {
                let armor_damage = amount * ARMOR_ABSORPTION;
                health_damage = amount - armor_damage;
                *armor -= armor_damage;
                if *armor < 0.0 {
                    // shortfall the armor could not absorb
                    health_damage -= *armor;
                    *armor = 0.0;
                }
            }
        }

        self.health -= health_damage;
        if self.health <= 0.0 {
            self.dead = true;
            debug!(id = ?self.id, "Character died");
        }
    }

    /// Heals, clamped to `max_health` only when the cap is positive.
    pub fn apply_health(&mut self, amount: f32) {
        self.health += amount;
        if self.max_health > 0.0 {
            self.health = self.health.min(self.max_health);
        }
    }

    /// Adds armor; a no-op for characters without an armor system.
    pub fn apply_armor(&mut self, amount: f32) {
        if let Some(armor) = self.armor.as_mut() {
            *armor += amount;
            if let Some(max) = self.max_armor {
                *armor = armor.min(max);
            }
        }
    }

    /// Applies a weapon-switch request.
    ///
    /// An in-bounds index pointing at a populated slot selects directly.
    /// Anything else is relative: `-1` walks backward, any other value
    /// walks forward, cyclically, visiting at most one full cycle.
    pub fn select_weapon(&mut self, request: i32) {
        if self.weapons.is_empty() {
            return;
        }
        let len = self.weapons.len();
        if request >= 0 {
            let idx = request as usize;
            if idx < len && self.weapons[idx].is_some() {
                self.current_weapon = Some(idx);
                return;
            }
        }

        // +len-1 steps backward one slot modulo len
        let step = if request == -1 { len - 1 } else { 1 };
        let mut idx = self.current_weapon.unwrap_or(0);
        for _ in 0..len {
            idx = (idx + step) % len;
            if self.weapons[idx].is_some() {
                self.current_weapon = Some(idx);
                return;
            }
        }
    }

    /// Removes the rigid body and severs the controller link. The character
    /// must not be mutated afterwards; it is never reused.
    pub fn die(&mut self, physics: &mut dyn PhysicsWorld) {
        physics.remove_body(self.body);
        self.controller = None;
        self.dead = true;
        debug!(id = ?self.id, "Character destroyed");
    }
}
