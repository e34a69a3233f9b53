//! Simulation parity runner.
//!
//! Runs two independent world instances (standing in for the server's
//! authoritative simulation and a client's prediction) through an identical
//! scripted input sequence and asserts their encoded state is bit-identical
//! every tick. Any divergence here is a desync bug.
//!
//! Usage:
//!   cargo run -p arena_tests --bin parity_runner [ticks]

use arena_shared::{
    character::{CharacterConfig, CharacterId, Weapon},
    codec,
    filter::Team,
    math::Vec3,
    physics::{demo_arena, FlatWorld},
    world::SimWorld,
};
use serde_json::json;

const DT: f32 = 1.0 / 64.0;

struct Instance {
    sim: SimWorld,
    physics: FlatWorld,
    character: CharacterId,
}

fn build_instance() -> Instance {
    let mut physics = FlatWorld::new();
    let spawn_points = demo_arena(&mut physics);
    let mut sim = SimWorld::new();
    let character = sim.spawn_character(
        &mut physics,
        CharacterConfig::default(),
        Team::Alpha,
        None,
        spawn_points[0],
        vec![
            Some(Weapon::new("knife")),
            Some(Weapon::new("pistol")),
            None,
            Some(Weapon::new("rifle")),
        ],
    );
    Instance {
        sim,
        physics,
        character,
    }
}

/// Deterministic input script: walk in a square, jump periodically, crouch
/// through a phase, and cycle weapons.
fn scripted_input(tick: u32) -> serde_json::Value {
    let phase = (tick / 64) % 4;
    let (mx, my) = match phase {
        0 => (1.0, 0.0),
        1 => (0.0, 1.0),
        2 => (-1.0, 0.0),
        _ => (0.0, -1.0),
    };
    let mut buttons = 0u8;
    if tick % 96 == 0 {
        buttons |= 1; // jump
    }
    if phase == 2 {
        buttons |= 2; // crouch
    }
    let weapon = if tick % 50 == 0 {
        json!(-2)
    } else {
        json!(null)
    };
    json!({
        "o": {"x": (tick as f32) * 0.01, "y": 0.0, "z": 0.0},
        "m": {"x": mx, "y": my},
        "i": buttons,
        "w": weapon,
    })
}

fn main() {
    let ticks: u32 = std::env::args()
        .nth(1)
        .and_then(|s| s.parse().ok())
        .unwrap_or(512);

    println!("Simulation parity runner");
    println!("========================");
    println!("Running {ticks} ticks at {}hz\n", (1.0 / DT) as u32);

    let mut authority = build_instance();
    let mut prediction = build_instance();

    let mut mismatches = 0u32;
    for tick in 0..ticks {
        let input = scripted_input(tick);
        authority.sim.queue_input(authority.character, input.clone());
        prediction.sim.queue_input(prediction.character, input);

        authority.sim.tick(&mut authority.physics, DT);
        prediction.sim.tick(&mut prediction.physics, DT);

        let a = authority
            .sim
            .character(authority.character)
            .map(|ch| codec::encode_state(ch, &authority.physics));
        let b = prediction
            .sim
            .character(prediction.character)
            .map(|ch| codec::encode_state(ch, &prediction.physics));

        if a != b {
            mismatches += 1;
            println!("tick {tick}: DIVERGED");
            println!("  authority:  {a:?}");
            println!("  prediction: {b:?}");
        }

        if tick % 128 == 0 {
            if let Some(state) = &a {
                println!(
                    "tick {tick:>4}: pos=({:+.3}, {:+.3}, {:+.3}) state={:02b} weap={}",
                    state.pos.x, state.pos.y, state.pos.z, state.state, state.weap
                );
            }
        }
    }

    // sanity: the script must have actually moved the character
    let final_pos = authority
        .sim
        .character(authority.character)
        .map(|ch| {
            use arena_shared::physics::PhysicsWorld;
            authority.physics.position(ch.body)
        })
        .unwrap_or(Vec3::ZERO);

    println!("\nFinal position: ({:.3}, {:.3}, {:.3})", final_pos.x, final_pos.y, final_pos.z);
    println!("Mismatched ticks: {mismatches}/{ticks}");

    if mismatches > 0 {
        println!("\nFAIL: client and server simulations diverged");
        std::process::exit(1);
    }
    println!("\nOK: simulations are tick-for-tick identical");
}
