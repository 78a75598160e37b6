//! # Arena Session Server Library
//!
//! Authoritative server for a realtime multiplayer arena. It accepts
//! persistent websocket connections, authenticates each one against a token
//! registry, runs a fixed-rate world simulation, and synchronizes world
//! state and chat to every connected client over a compact JSON protocol.
//!
//! ## Architecture
//!
//! ### Single-Threaded Event Loop
//! All game state lives in one game-loop task. Connection tasks forward
//! inbound frames over a channel; the loop interleaves them with the fixed
//! tick via `tokio::select!`. Because every callback runs to completion
//! before the next is dispatched, the registry, chat history and tick
//! counter are mutated without locks.
//!
//! ### Authoritative Simulation
//! Clients send only intents (auth, input bitmask, chat). The server
//! integrates movement, jumping and gravity at a fixed 20 Hz timestep and
//! broadcasts snapshots; clients conform to what the server says.
//!
//! ## Module Organization
//!
//! - [`players`]: connection slots, identity, the token registry
//! - [`game`]: the fixed-timestep simulation engine
//! - [`chat`]: bounded ring of recent chat entries
//! - [`session`]: orchestration of message dispatch, lifecycle, broadcast
//! - [`network`]: websocket transport and the game loop itself
//! - [`config`]: startup-time tunables
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::config::ServerConfig;
//! use server::network::Server;
//! use server::players::TokenRegistry;
//!
//! #[tokio::main]
//! async fn main() -> std::io::Result<()> {
//!     let server = Server::bind(
//!         "127.0.0.1:9000",
//!         ServerConfig::default(),
//!         TokenRegistry::with_demo_tokens(),
//!     )
//!     .await?;
//!     server.run().await
//! }
//! ```

pub mod chat;
pub mod config;
pub mod game;
pub mod network;
pub mod players;
pub mod session;

use std::time::{Duration, SystemTime, UNIX_EPOCH};

// Get current timestamp in milliseconds
pub fn timestamp_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::from_secs(0))
        .as_millis() as u64
}
