//! Integration tests driving a real server instance over websockets.
//!
//! Each test binds its own server on an ephemeral port, connects real
//! clients and asserts on the JSON frames they observe.

use assert_approx_eq::assert_approx_eq;
use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use server::config::ServerConfig;
use server::network::Server;
use server::players::TokenRegistry;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};

type WsClient = WebSocketStream<MaybeTlsStream<TcpStream>>;

const WAIT: Duration = Duration::from_secs(5);

async fn start_server(config: ServerConfig) -> SocketAddr {
    let server = Server::bind("127.0.0.1:0", config, TokenRegistry::with_demo_tokens())
        .await
        .expect("failed to bind server");
    let addr = server.local_addr().expect("no local addr");
    tokio::spawn(async move {
        let _ = server.run().await;
    });
    addr
}

async fn connect(addr: SocketAddr) -> WsClient {
    let (ws, _) = timeout(WAIT, connect_async(format!("ws://{}", addr)))
        .await
        .expect("connect timed out")
        .expect("websocket handshake failed");
    ws
}

async fn send_json(ws: &mut WsClient, value: Value) {
    ws.send(Message::Text(value.to_string()))
        .await
        .expect("send failed");
}

/// Next text frame, parsed. Panics if the connection ends first.
async fn next_json(ws: &mut WsClient) -> Value {
    loop {
        let frame = timeout(WAIT, ws.next())
            .await
            .expect("read timed out")
            .expect("connection closed")
            .expect("read failed");
        if let Message::Text(text) = frame {
            return serde_json::from_str(&text).expect("server sent invalid JSON");
        }
    }
}

/// Reads frames until one of the wanted `type` arrives, skipping `state`
/// snapshots and anything else in between.
async fn next_of_type(ws: &mut WsClient, wanted: &str) -> Value {
    for _ in 0..200 {
        let value = next_json(ws).await;
        if value["type"] == wanted {
            return value;
        }
    }
    panic!("no '{}' frame within 200 frames", wanted);
}

mod auth_tests {
    use super::*;

    #[tokio::test]
    async fn first_player_auth_round_trip() {
        let addr = start_server(ServerConfig::default()).await;
        let mut ws = connect(addr).await;

        send_json(&mut ws, json!({"type": "auth", "token": "player1"})).await;

        let reply = next_json(&mut ws).await;
        assert_eq!(
            reply,
            json!({"type": "auth_ok", "player_id": 1, "name": "Alice"})
        );
    }

    #[tokio::test]
    async fn unknown_token_is_refused() {
        let addr = start_server(ServerConfig::default()).await;
        let mut ws = connect(addr).await;

        send_json(&mut ws, json!({"type": "auth", "token": "bogus"})).await;

        let reply = next_json(&mut ws).await;
        assert_eq!(
            reply,
            json!({"type": "auth_fail", "reason": "invalid token"})
        );

        // The connection stays open for retry
        send_json(&mut ws, json!({"type": "auth", "token": "player1"})).await;
        let retry = next_json(&mut ws).await;
        assert_eq!(retry["type"], "auth_ok");
    }

    #[tokio::test]
    async fn second_join_is_announced_to_first_player_only() {
        let addr = start_server(ServerConfig::default()).await;
        let mut alice = connect(addr).await;
        send_json(&mut alice, json!({"type": "auth", "token": "player1"})).await;
        assert_eq!(next_json(&mut alice).await["type"], "auth_ok");

        let mut bob = connect(addr).await;
        send_json(&mut bob, json!({"type": "auth", "token": "player2"})).await;
        let bob_reply = next_json(&mut bob).await;
        assert_eq!(
            bob_reply,
            json!({"type": "auth_ok", "player_id": 2, "name": "Bob"})
        );

        let join = next_of_type(&mut alice, "player_join").await;
        assert_eq!(join["player_id"], 2);
        assert_eq!(join["name"], "Bob");
    }

    #[tokio::test]
    async fn connection_beyond_capacity_is_closed() {
        let config = ServerConfig {
            max_players: 1,
            ..ServerConfig::default()
        };
        let addr = start_server(config).await;

        let mut first = connect(addr).await;
        send_json(&mut first, json!({"type": "auth", "token": "player1"})).await;
        assert_eq!(next_json(&mut first).await["type"], "auth_ok");

        // The 65th-style overflow connection: handshake succeeds, then the
        // server closes without ever answering
        let mut overflow = connect(addr).await;
        let outcome = timeout(WAIT, overflow.next()).await.expect("read timed out");
        match outcome {
            None | Some(Ok(Message::Close(_))) | Some(Err(_)) => {}
            Some(Ok(frame)) => panic!("expected close, got {:?}", frame),
        }
    }
}

mod gameplay_tests {
    use super::*;

    #[tokio::test]
    async fn state_snapshots_carry_the_player() {
        let addr = start_server(ServerConfig::default()).await;
        let mut ws = connect(addr).await;
        send_json(&mut ws, json!({"type": "auth", "token": "player1"})).await;
        assert_eq!(next_json(&mut ws).await["type"], "auth_ok");

        let state = next_of_type(&mut ws, "state").await;
        let players = state["players"].as_array().expect("players array");
        assert_eq!(players.len(), 1);
        assert_eq!(players[0]["id"], 1);
        assert_eq!(players[0]["name"], "Alice");
        // Default spawn is the world center, grounded
        assert_eq!(players[0]["x"], 50.0);
        assert_eq!(players[0]["y"], 37.5);
        assert_eq!(players[0]["z"], 0.0);
    }

    #[tokio::test]
    async fn forward_input_moves_the_player_north() {
        let addr = start_server(ServerConfig::default()).await;
        let mut ws = connect(addr).await;
        send_json(&mut ws, json!({"type": "auth", "token": "player1"})).await;
        assert_eq!(next_json(&mut ws).await["type"], "auth_ok");

        send_json(&mut ws, json!({"type": "input", "up": true})).await;

        // Let a handful of ticks elapse, then compare two snapshots
        let first = next_of_type(&mut ws, "state").await;
        let mut last = first.clone();
        for _ in 0..10 {
            last = next_of_type(&mut ws, "state").await;
        }

        let y0 = first["players"][0]["y"].as_f64().unwrap();
        let y1 = last["players"][0]["y"].as_f64().unwrap();
        let x1 = last["players"][0]["x"].as_f64().unwrap();
        assert!(y1 > y0, "player did not advance: {} -> {}", y0, y1);
        assert_approx_eq!(x1, 50.0, 1e-3);

        let t0 = first["tick"].as_u64().unwrap();
        let t1 = last["tick"].as_u64().unwrap();
        assert!(t1 > t0);
    }

    #[tokio::test]
    async fn chat_is_echoed_to_sender_and_peer() {
        let addr = start_server(ServerConfig::default()).await;
        let mut alice = connect(addr).await;
        send_json(&mut alice, json!({"type": "auth", "token": "player1"})).await;
        assert_eq!(next_json(&mut alice).await["type"], "auth_ok");

        let mut bob = connect(addr).await;
        send_json(&mut bob, json!({"type": "auth", "token": "player2"})).await;
        assert_eq!(next_json(&mut bob).await["type"], "auth_ok");

        send_json(&mut alice, json!({"type": "chat", "msg": "hello arena"})).await;

        let expected = json!({
            "type": "chat_broadcast",
            "player_id": 1,
            "name": "Alice",
            "msg": "hello arena",
        });
        assert_eq!(next_of_type(&mut alice, "chat_broadcast").await, expected);
        assert_eq!(next_of_type(&mut bob, "chat_broadcast").await, expected);
    }

    #[tokio::test]
    async fn disconnect_is_announced_to_remaining_players() {
        let addr = start_server(ServerConfig::default()).await;
        let mut alice = connect(addr).await;
        send_json(&mut alice, json!({"type": "auth", "token": "player1"})).await;
        assert_eq!(next_json(&mut alice).await["type"], "auth_ok");

        let mut bob = connect(addr).await;
        send_json(&mut bob, json!({"type": "auth", "token": "player2"})).await;
        assert_eq!(next_json(&mut bob).await["type"], "auth_ok");

        bob.close(None).await.expect("close failed");

        let leave = next_of_type(&mut alice, "player_leave").await;
        assert_eq!(leave, json!({"type": "player_leave", "player_id": 2}));
    }
}
