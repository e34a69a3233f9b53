//! Simulation world.
//!
//! Owns the characters of one world instance and runs the fixed tick in the
//! mandated order: decode queued input, integrate movement and crouch, step
//! the physics world, re-probe ground support, reconcile platform drift,
//! apply weapon switches, then reap the dead. One world is single-threaded;
//! independent worlds share nothing, so several may run concurrently.
//!
//! Determinism notes:
//! - Characters iterate in id order (`BTreeMap`), identically on client
//!   and server.
//! - Ids are allocated by a per-world monotonic counter, not process-wide
//!   state; the counter wraps from `u32::MAX` back to 1.

use std::collections::BTreeMap;

use tracing::debug;

use crate::character::{Character, CharacterConfig, CharacterId, Weapon};
use crate::codec::{self, Buttons};
use crate::crouch;
use crate::filter::Team;
use crate::math::Vec3;
use crate::movement;
use crate::net::ClientId;
use crate::physics::PhysicsWorld;
use crate::platform;
use crate::probe;

/// Lifecycle notifications produced by a tick (and by explicit spawns).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimEvent {
    Spawned(CharacterId),
    Died(CharacterId),
}

/// One world instance.
pub struct SimWorld {
    characters: BTreeMap<CharacterId, Character>,
    next_id: u32,
    tick: u32,
    pending_events: Vec<SimEvent>,
}

impl SimWorld {
    pub fn new() -> Self {
        Self {
            characters: BTreeMap::new(),
            next_id: 1,
            tick: 0,
            pending_events: Vec::new(),
        }
    }

    /// Current tick count.
    pub fn tick_count(&self) -> u32 {
        self.tick
    }

    fn alloc_id(&mut self) -> CharacterId {
        let id = self.next_id;
        // 0 is never issued; the counter wraps well before overflow UB
        self.next_id = if self.next_id == u32::MAX {
            1
        } else {
            self.next_id + 1
        };
        CharacterId(id)
    }

    /// Spawns a character and reports it in the next tick's event list.
    pub fn spawn_character(
        &mut self,
        physics: &mut dyn PhysicsWorld,
        config: CharacterConfig,
        team: Team,
        controller: Option<ClientId>,
        position: Vec3,
        weapons: Vec<Option<Weapon>>,
    ) -> CharacterId {
        let id = self.alloc_id();
        let ch = Character::spawn(id, controller, team, config, physics, position, weapons);
        self.characters.insert(id, ch);
        self.pending_events.push(SimEvent::Spawned(id));
        id
    }

    pub fn character(&self, id: CharacterId) -> Option<&Character> {
        self.characters.get(&id)
    }

    pub fn character_mut(&mut self, id: CharacterId) -> Option<&mut Character> {
        self.characters.get_mut(&id)
    }

    pub fn characters(&self) -> impl Iterator<Item = (CharacterId, &Character)> {
        self.characters.iter().map(|(id, ch)| (*id, ch))
    }

    pub fn len(&self) -> usize {
        self.characters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.characters.is_empty()
    }

    /// Queues a raw input payload for `id`, consumed at the next tick.
    pub fn queue_input(&mut self, id: CharacterId, raw: serde_json::Value) {
        if let Some(ch) = self.characters.get_mut(&id) {
            ch.queue_input(raw);
        }
    }

    /// Routes damage to a character (the weapon collaborator's entry point).
    pub fn apply_damage(&mut self, id: CharacterId, amount: f32) {
        if let Some(ch) = self.characters.get_mut(&id) {
            ch.apply_damage(amount);
        }
    }

    /// Immediately destroys a character outside the normal reap path.
    pub fn despawn(&mut self, id: CharacterId, physics: &mut dyn PhysicsWorld) -> bool {
        match self.characters.remove(&id) {
            Some(mut ch) => {
                ch.die(physics);
                self.pending_events.push(SimEvent::Died(id));
                true
            }
            None => false,
        }
    }

    /// Runs one fixed simulation step and returns the lifecycle events it
    /// produced.
    pub fn tick(&mut self, physics: &mut dyn PhysicsWorld, dt: f32) -> Vec<SimEvent> {
        // 1) decode queued input; malformed payloads drop, previous state holds
        for ch in self.characters.values_mut() {
            if let Some(raw) = ch.queued_input.take() {
                if let Some(wire) = codec::decode_input(&raw) {
                    ch.orientation.yaw = wire.o.x;
                    ch.orientation.pitch = wire.o.y;
                    ch.movement = wire.m;
                    ch.buttons = Buttons::from_bits_truncate(wire.i);
                    ch.weapon_request = wire.w;
                }
            }
        }

        // 2) movement and crouch mutate body velocity/shape
        for ch in self.characters.values_mut() {
            let axis = ch.movement;
            let jump = ch.buttons.contains(Buttons::JUMP);
            let crouch_held = ch.buttons.contains(Buttons::CROUCH);
            movement::integrate(ch, physics, axis, jump);
            crouch::update(ch, physics, crouch_held);
        }

        // 3) external physics step
        physics.step(dt);

        // 4-6) support, platform drift (strictly after the step), weapons
        for ch in self.characters.values_mut() {
            probe::ground_check(ch, physics);
            platform::apply_drift(ch, physics);
            if let Some(request) = ch.weapon_request.take() {
                ch.select_weapon(request);
            }
        }

        // 7) reap characters whose dead flag was raised
        let dead: Vec<CharacterId> = self
            .characters
            .iter()
            .filter(|(_, ch)| ch.dead)
            .map(|(id, _)| *id)
            .collect();
        let mut events = std::mem::take(&mut self.pending_events);
        for id in dead {
            if let Some(mut ch) = self.characters.remove(&id) {
                ch.die(physics);
                events.push(SimEvent::Died(id));
                debug!(id = ?id, "Character reaped");
            }
        }

        self.tick += 1;
        events
    }
}

impl Default for SimWorld {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::physics::FlatWorld;
    use serde_json::json;

    fn input(m: (f32, f32), buttons: u8) -> serde_json::Value {
        json!({
            "o": {"x": 0.0, "y": 0.0, "z": 0.0},
            "m": {"x": m.0, "y": m.1},
            "i": buttons,
            "w": null,
        })
    }

    fn standing_world() -> (SimWorld, FlatWorld, CharacterId) {
        let mut physics = FlatWorld::new();
        physics.add_ground_plane(0.0);
        let mut sim = SimWorld::new();
        let id = sim.spawn_character(
            &mut physics,
            CharacterConfig::default(),
            Team::Alpha,
            Some(ClientId(1)),
            Vec3::new(0.0, 0.0, 0.9),
            vec![Some(Weapon::new("pistol"))],
        );
        (sim, physics, id)
    }

    #[test]
    fn ids_are_monotonic_and_wrap_before_overflow() {
        let mut physics = FlatWorld::new();
        let mut sim = SimWorld::new();
        let a = sim.spawn_character(
            &mut physics,
            CharacterConfig::default(),
            Team::None,
            None,
            Vec3::ZERO,
            Vec::new(),
        );
        let b = sim.spawn_character(
            &mut physics,
            CharacterConfig::default(),
            Team::None,
            None,
            Vec3::ZERO,
            Vec::new(),
        );
        assert_eq!(a, CharacterId(1));
        assert_eq!(b, CharacterId(2));

        sim.next_id = u32::MAX;
        let c = sim.alloc_id();
        let d = sim.alloc_id();
        assert_eq!(c, CharacterId(u32::MAX));
        assert_eq!(d, CharacterId(1));
    }

    #[test]
    fn spawn_and_death_produce_events() {
        let (mut sim, mut physics, id) = standing_world();
        let events = sim.tick(&mut physics, 1.0 / 64.0);
        assert!(events.contains(&SimEvent::Spawned(id)));

        sim.apply_damage(id, 1000.0);
        let events = sim.tick(&mut physics, 1.0 / 64.0);
        assert!(events.contains(&SimEvent::Died(id)));
        assert!(sim.character(id).is_none());
        assert!(sim.is_empty());
    }

    #[test]
    fn tick_grounds_a_character_standing_on_the_floor() {
        let (mut sim, mut physics, id) = standing_world();
        sim.tick(&mut physics, 1.0 / 64.0);
        assert!(sim.character(id).expect("alive").grounded);
    }

    #[test]
    fn queued_movement_translates_the_body() {
        let (mut sim, mut physics, id) = standing_world();
        sim.tick(&mut physics, 1.0 / 64.0); // settle and ground

        for _ in 0..64 {
            sim.queue_input(id, input((1.0, 0.0), 0));
            sim.tick(&mut physics, 1.0 / 64.0);
        }
        let body = sim.character(id).expect("alive").body;
        // one second of walking at walk_speed
        assert!((physics.position(body).x - 6.0).abs() < 0.2);
    }

    #[test]
    fn malformed_input_keeps_previous_state() {
        let (mut sim, mut physics, id) = standing_world();
        sim.tick(&mut physics, 1.0 / 64.0);

        sim.queue_input(id, input((1.0, 0.0), 0));
        sim.tick(&mut physics, 1.0 / 64.0);

        // garbage payload: the walk input from last tick keeps applying
        sim.queue_input(id, json!("garbage"));
        sim.tick(&mut physics, 1.0 / 64.0);
        let ch = sim.character(id).expect("alive");
        assert!((ch.movement.x - 1.0).abs() < 1e-6);
    }

    #[test]
    fn jump_input_launches_then_lands() {
        let (mut sim, mut physics, id) = standing_world();
        sim.tick(&mut physics, 1.0 / 64.0);
        assert!(sim.character(id).expect("alive").grounded);

        sim.queue_input(id, input((0.0, 0.0), Buttons::JUMP.bits()));
        sim.tick(&mut physics, 1.0 / 64.0);
        let ch = sim.character(id).expect("alive");
        assert!(physics.velocity(ch.body).z > 0.0);

        // one more tick clears the probe padding
        sim.queue_input(id, input((0.0, 0.0), 0));
        sim.tick(&mut physics, 1.0 / 64.0);
        assert!(!sim.character(id).expect("alive").grounded);

        // gravity brings the character back
        for _ in 0..200 {
            sim.tick(&mut physics, 1.0 / 64.0);
        }
        assert!(sim.character(id).expect("alive").grounded);
    }

    #[test]
    fn weapon_request_applies_once() {
        let mut physics = FlatWorld::new();
        physics.add_ground_plane(0.0);
        let mut sim = SimWorld::new();
        let id = sim.spawn_character(
            &mut physics,
            CharacterConfig::default(),
            Team::Alpha,
            None,
            Vec3::new(0.0, 0.0, 0.9),
            vec![Some(Weapon::new("pistol")), Some(Weapon::new("rifle"))],
        );

        sim.queue_input(
            id,
            json!({
                "o": {"x": 0.0, "y": 0.0, "z": 0.0},
                "m": {"x": 0.0, "y": 0.0},
                "i": 0,
                "w": 1,
            }),
        );
        sim.tick(&mut physics, 1.0 / 64.0);
        assert_eq!(sim.character(id).expect("alive").current_weapon, Some(1));

        // no new request: selection stays put
        sim.tick(&mut physics, 1.0 / 64.0);
        assert_eq!(sim.character(id).expect("alive").current_weapon, Some(1));
    }

    #[test]
    fn riding_a_platform_carries_the_character() {
        let mut physics = FlatWorld::new();
        let platform = physics.add_platform(
            Vec3::new(0.0, 0.0, -0.25),
            Vec3::new(3.0, 3.0, 0.25),
            Vec3::new(1.0, 0.0, 0.0),
            0.0,
        );
        let mut sim = SimWorld::new();
        let id = sim.spawn_character(
            &mut physics,
            CharacterConfig::default(),
            Team::None,
            None,
            Vec3::new(0.0, 0.0, 0.9),
            Vec::new(),
        );

        // first tick attaches, later ticks accumulate drift
        for _ in 0..65 {
            sim.tick(&mut physics, 1.0 / 64.0);
        }
        let ch = sim.character(id).expect("alive");
        assert_eq!(ch.platform.as_ref().map(|a| a.platform), Some(platform));
        assert!(physics.position(ch.body).x > 0.9);
    }
}
