//! Standalone client binary.
//!
//! Usage:
//!   cargo run -p arena_client -- [--addr 127.0.0.1:40000] [--name Player]
//!
//! The client connects to the server, requests a spawn, sends input
//! commands, predicts locally, and displays received snapshots.
//!
//! Console commands:
//!   status      - Show client status
//!   quit        - Exit client

use std::env;
use std::io::{BufRead, Write};
use std::time::Duration;

use anyhow::Context;
use arena_client::client::{ClientState, GameClient};
use arena_client::input::InputState;
use arena_shared::config::SimConfig;
use tokio::sync::mpsc;
use tracing::info;

fn parse_args() -> SimConfig {
    let mut cfg = SimConfig::default();
    let args: Vec<String> = env::args().collect();
    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--addr" if i + 1 < args.len() => {
                cfg.server_addr = args[i + 1].clone();
                i += 2;
            }
            "--name" if i + 1 < args.len() => {
                cfg.player_name = args[i + 1].clone();
                i += 2;
            }
            _ => i += 1,
        }
    }
    cfg
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cfg = parse_args();
    info!(server = %cfg.server_addr, name = %cfg.player_name, "Starting client");

    let mut client = GameClient::connect(&cfg).await.context("connect")?;
    info!(client_id = ?client.client_id, "Connected to server");

    // Set up console input channel.
    let (console_tx, mut console_rx) = mpsc::channel::<String>(32);

    // Spawn stdin reader thread.
    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        let mut stdout = std::io::stdout();
        loop {
            print!("] ");
            let _ = stdout.flush();
            let mut line = String::new();
            if stdin.lock().read_line(&mut line).is_err() {
                break;
            }
            let line = line.trim().to_string();
            if !line.is_empty() && console_tx.blocking_send(line).is_err() {
                break;
            }
        }
    });

    println!("Client connected. Type 'status' for info, 'quit' to exit.");
    println!();

    client.send_ready().await?;

    let tick_interval = Duration::from_secs_f32(1.0 / cfg.tick_hz as f32);

    loop {
        // Process console commands.
        while let Ok(line) = console_rx.try_recv() {
            match line.as_str() {
                "status" => {
                    println!("State: {:?}", client.state);
                    println!("Client ID: {:?}", client.client_id);
                    println!("Snapshots buffered: {}", client.snaps.len());
                    if let Some(pos) = client.predicted_position() {
                        println!("Predicted position: {:.2} {:.2} {:.2}", pos.x, pos.y, pos.z);
                    }
                }
                "quit" | "exit" => {
                    return Ok(());
                }
                other => {
                    println!("Unknown command: {}", other);
                }
            }
        }

        // Check for reliable messages (spawns, despawns, etc.).
        client.poll_reliable().await?;

        // If disconnected, exit.
        if client.state == ClientState::Disconnected {
            println!("Disconnected from server.");
            break;
        }

        // In a real client this input would come from keyboard/mouse.
        let input = InputState::default();
        if let Err(e) = client.tick(input).await {
            println!("Tick error: {}", e);
        }

        // Receive snapshots.
        if let Err(e) = client.recv_snapshot().await {
            println!("Snapshot error: {}", e);
        }

        // Print snapshot info occasionally.
        if let Some(snap) = client.snaps.last_snapshot() {
            if snap.tick % 64 == 0 {
                info!(tick = snap.tick, characters = snap.characters.len(), "Snapshot");
            }
        }

        tokio::time::sleep(tick_interval).await;
    }

    Ok(())
}
