//! Runtime configuration for the session server.
//!
//! Everything here is fixed at process start; nothing is hot-reloadable.

use std::time::Duration;

/// Tunables consumed by the registry, simulation and controller.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Milliseconds between simulation ticks.
    pub tick_ms: u64,
    pub world_width: f32,
    pub world_height: f32,
    /// Forward/backward speed in world units per second.
    pub move_speed: f32,
    /// Turn rate in radians per second.
    pub rotate_speed: f32,
    /// Initial vertical velocity applied on jump.
    pub jump_velocity: f32,
    /// Downward acceleration in world units per second squared.
    pub gravity: f32,
    pub max_players: usize,
    pub max_chat_history: usize,
    /// Upper bound on a single inbound frame in bytes.
    pub max_message_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            tick_ms: shared::TICK_MS,
            world_width: shared::WORLD_WIDTH,
            world_height: shared::WORLD_HEIGHT,
            move_speed: shared::MOVE_SPEED,
            rotate_speed: shared::ROTATE_SPEED,
            jump_velocity: shared::JUMP_VELOCITY,
            gravity: shared::GRAVITY,
            max_players: shared::MAX_PLAYERS,
            max_chat_history: shared::MAX_CHAT_HISTORY,
            max_message_size: shared::MAX_JSON_SIZE,
        }
    }
}

impl ServerConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }

    /// Fixed simulation timestep in seconds.
    pub fn tick_dt(&self) -> f32 {
        self.tick_ms as f32 / 1000.0
    }
}
