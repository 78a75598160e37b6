//! Fixed-timestep world simulation.
//!
//! Advances every authenticated player's kinematic state once per tick:
//! rotation, forward/backward translation along the facing angle, jump and
//! gravity integration, and modular world wrapping. The engine has no notion
//! of identity beyond what the registry hands it.

use crate::config::ServerConfig;
use crate::players::{Player, PlayerRegistry};
use shared::{InputFlags, PlayerState};
use std::f32::consts::TAU;

/// Tick counter plus the per-player state machine.
#[derive(Debug, Default)]
pub struct Simulation {
    tick: u32,
}

impl Simulation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tick(&self) -> u32 {
        self.tick
    }

    /// Runs one simulation step of duration `dt` seconds over all
    /// authenticated players. The tick counter advances even when the world
    /// is empty.
    pub fn step(&mut self, registry: &mut PlayerRegistry, config: &ServerConfig, dt: f32) {
        self.tick = self.tick.wrapping_add(1);

        for player in registry.active_players_mut() {
            update_player(player, config, dt);
        }
    }

    /// Snapshot of all authenticated players in canonical slot order.
    pub fn player_states(registry: &PlayerRegistry) -> Vec<PlayerState> {
        registry
            .active_players()
            .map(|p| PlayerState {
                id: p.id,
                x: p.x,
                y: p.y,
                z: p.z,
                angle: p.angle,
                name: p.name.clone(),
            })
            .collect()
    }
}

fn update_player(player: &mut Player, config: &ServerConfig, dt: f32) {
    let inputs = player.inputs;

    // Rotation
    if inputs.contains(InputFlags::LEFT) {
        player.angle -= config.rotate_speed * dt;
    }
    if inputs.contains(InputFlags::RIGHT) {
        player.angle += config.rotate_speed * dt;
    }
    player.angle = player.angle.rem_euclid(TAU);

    // Forward/backward movement; up and down cancel
    let mut travel = 0.0;
    if inputs.contains(InputFlags::UP) {
        travel += config.move_speed * dt;
    }
    if inputs.contains(InputFlags::DOWN) {
        travel -= config.move_speed * dt;
    }

    if travel != 0.0 {
        // Angle 0 faces +y ("north"), increasing angle turns toward +x
        player.x += player.angle.sin() * travel;
        player.y += player.angle.cos() * travel;
    }

    // Jump is gated strictly on the grounded flag
    if inputs.contains(InputFlags::JUMP) && player.grounded {
        player.vz = config.jump_velocity;
        player.grounded = false;
        player.jumping = true;
    }

    // Vertical integration is skipped entirely while grounded
    if !player.grounded {
        player.vz -= config.gravity * dt;
        player.z += player.vz * dt;

        if player.z <= 0.0 {
            player.z = 0.0;
            player.vz = 0.0;
            player.grounded = true;
            player.jumping = false;
        }
    }

    // Players crossing an edge reappear at the opposite edge
    player.x = player.x.rem_euclid(config.world_width);
    player.y = player.y.rem_euclid(config.world_height);
}
