//! Full socket-based integration tests for client ↔ server communication.

use std::time::Duration;

use arena_client::client::ClientState;
use arena_client::input::InputState;
use arena_client::GameClient;
use arena_server::server::bind_ephemeral;
use arena_shared::config::SimConfig;
use arena_shared::math::Vec2;
use arena_shared::net::{decode_from_bytes, encode_to_bytes, ClientId, NetMsg, PROTOCOL_VERSION};

/// Unit-style test: protocol messages roundtrip correctly.
#[test]
fn protocol_messages_roundtrip() -> anyhow::Result<()> {
    let hello = NetMsg::Hello {
        protocol: PROTOCOL_VERSION,
    };
    assert_eq!(decode_from_bytes(&encode_to_bytes(&hello)?)?, hello);

    let udp_hello = NetMsg::UdpHello {
        client_udp_port: 50000,
    };
    assert_eq!(decode_from_bytes(&encode_to_bytes(&udp_hello)?)?, udp_hello);

    let welcome = NetMsg::Welcome {
        client_id: ClientId(1),
    };
    assert_eq!(decode_from_bytes(&encode_to_bytes(&welcome)?)?, welcome);

    Ok(())
}

/// Full integration: spawn server, connect client, exchange inputs/snapshots.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn client_server_full_roundtrip() -> anyhow::Result<()> {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("info")
        .with_test_writer()
        .try_init();

    // Bind server to ephemeral port.
    let (mut server, cfg) = bind_ephemeral(64).await?;
    let server_addr = cfg.server_addr.clone();

    // Spawn server accept + step loop in background.
    let server_handle = tokio::spawn(async move {
        // Accept one client.
        let _cid = server.accept_one().await?;
        // Run enough ticks to spawn the character and send snapshots.
        for _ in 0..40 {
            server.step(1.0 / 64.0).await?;
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        Ok::<_, anyhow::Error>(server)
    });

    // Give server a moment to start listening.
    tokio::time::sleep(Duration::from_millis(10)).await;

    // Connect client and request a spawn.
    let mut client = GameClient::connect(&SimConfig {
        server_addr,
        tick_hz: 64,
        player_name: "TestPlayer".to_string(),
    })
    .await?;
    client.send_ready().await?;

    // Send walk+jump input and collect snapshots.
    for _ in 0..40 {
        client.poll_reliable().await?;
        client
            .tick(InputState {
                axis: Vec2::new(1.0, 0.0),
                jump: true,
                ..Default::default()
            })
            .await?;
        client.recv_snapshot().await?;
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    // Wait for server task to finish.
    let server = server_handle.await??;

    // The server spawned our character and told us about it.
    assert_eq!(client.state, ClientState::Playing);
    assert!(client.server_character.is_some());
    assert_eq!(server.character_count(), 1);

    // We should have received at least one snapshot carrying our character.
    let snap = client.snaps.last_snapshot().expect("at least one snapshot");
    let ours = client.server_character.expect("spawned");
    assert!(
        snap.characters.iter().any(|c| c.id == ours),
        "snapshot should contain our character"
    );

    Ok(())
}
