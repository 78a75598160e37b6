//! Player registry: connection slots, identity and authentication
//!
//! This module owns the server-side table of player slots, including:
//! - Slot lifecycle (connection established, authenticated, closed)
//! - The token registry mapping pre-provisioned credentials to display names
//! - Per-player transient state (position, control bitmask)
//!
//! The registry is the single owner of all player records and of the
//! connection-to-slot association. Slots are stored in a fixed-length array
//! and scanned linearly; slot-index order is the canonical iteration order
//! observed by snapshot and broadcast consumers.

use log::{info, warn};
use shared::{truncate_utf8, InputFlags, MAX_PLAYER_NAME, MAX_TOKEN_LENGTH};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

/// Opaque handle identifying one transport connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(pub u64);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// One occupied connection slot.
///
/// A slot exists from connection establishment until close. Identity fields
/// (`name`, `token`, `authenticated`) are populated by authentication;
/// kinematic fields are advanced by the simulation each tick.
#[derive(Debug)]
pub struct Player {
    /// Unique id, assigned on slot acquisition, never reused or mutated.
    pub id: u32,
    pub name: String,
    pub token: String,
    pub authenticated: bool,
    /// Transport connection bound to this slot.
    pub conn: ConnectionId,

    // Position and movement
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub angle: f32,
    /// Vertical velocity.
    pub vz: f32,
    pub grounded: bool,
    pub jumping: bool,

    /// Last-received control bitmask (last write wins).
    pub inputs: InputFlags,
}

impl Player {
    fn spawn(id: u32, conn: ConnectionId, x: f32, y: f32) -> Self {
        Self {
            id,
            name: String::new(),
            token: String::new(),
            authenticated: false,
            conn,
            x,
            y,
            z: 0.0,
            angle: 0.0,
            vz: 0.0,
            grounded: true,
            jumping: false,
            inputs: InputFlags::empty(),
        }
    }
}

#[derive(Debug, Clone)]
struct TokenEntry {
    token: String,
    name: String,
}

/// Static credential-to-name mapping, read-only after startup.
#[derive(Debug, Default)]
pub struct TokenRegistry {
    entries: Vec<TokenEntry>,
}

impl TokenRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry seeded with the built-in demo credentials.
    pub fn with_demo_tokens() -> Self {
        let mut registry = Self::new();
        registry.register("player1", "Alice");
        registry.register("player2", "Bob");
        registry.register("player3", "Charlie");
        registry.register("debug", "Debug Player");
        registry
    }

    /// Loads a token file: a JSON object mapping token to display name.
    pub fn from_file(path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        let raw = std::fs::read_to_string(path)?;
        let map: BTreeMap<String, String> = serde_json::from_str(&raw)?;
        let mut registry = Self::new();
        for (token, name) in &map {
            registry.register(token, name);
        }
        Ok(registry)
    }

    /// Adds a credential. Token and name are truncated to protocol bounds.
    pub fn register(&mut self, token: &str, name: &str) {
        let mut token = token.to_string();
        let mut name = name.to_string();
        truncate_utf8(&mut token, MAX_TOKEN_LENGTH);
        truncate_utf8(&mut name, MAX_PLAYER_NAME);
        self.entries.push(TokenEntry { token, name });
    }

    /// Exact-match lookup, returns the mapped display name.
    pub fn lookup(&self, token: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|entry| entry.token == token)
            .map(|entry| entry.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Fixed-capacity table of player slots with linear-scan lookup.
///
/// Capacity exhaustion is the only hard failure; every lookup degrades to
/// "not found". Ids increase monotonically for the process lifetime.
pub struct PlayerRegistry {
    slots: Vec<Option<Player>>,
    next_id: u32,
    spawn: (f32, f32),
    tokens: TokenRegistry,
}

impl PlayerRegistry {
    /// Creates an empty registry. `spawn` is the default spawn position
    /// handed to every new connection (world center).
    pub fn new(max_players: usize, spawn: (f32, f32), tokens: TokenRegistry) -> Self {
        let mut slots = Vec::with_capacity(max_players);
        slots.resize_with(max_players, || None);
        Self {
            slots,
            next_id: 1,
            spawn,
            tokens,
        }
    }

    /// Binds a new connection to the first free slot.
    ///
    /// Returns the assigned player id, or `None` when every slot is taken;
    /// the caller must then reject and close the connection. No state is
    /// mutated on failure.
    pub fn add_connection(&mut self, conn: ConnectionId) -> Option<u32> {
        let slot = self.slots.iter().position(|s| s.is_none())?;

        let id = self.next_id;
        self.next_id += 1;
        self.slots[slot] = Some(Player::spawn(id, conn, self.spawn.0, self.spawn.1));
        info!("connection {} bound to slot {}, player id {}", conn, slot, id);
        Some(id)
    }

    /// Frees the slot bound to `conn`. Idempotent; unknown handles are a
    /// no-op.
    pub fn remove_connection(&mut self, conn: ConnectionId) -> bool {
        for slot in self.slots.iter_mut() {
            if let Some(player) = slot {
                if player.conn == conn {
                    info!("removed player id {} ({})", player.id, player.name);
                    *slot = None;
                    return true;
                }
            }
        }
        false
    }

    pub fn find_by_conn(&self, conn: ConnectionId) -> Option<&Player> {
        self.slots
            .iter()
            .filter_map(|s| s.as_ref())
            .find(|p| p.conn == conn)
    }

    pub fn find_by_conn_mut(&mut self, conn: ConnectionId) -> Option<&mut Player> {
        self.slots
            .iter_mut()
            .filter_map(|s| s.as_mut())
            .find(|p| p.conn == conn)
    }

    pub fn find_by_id(&self, id: u32) -> Option<&Player> {
        self.slots
            .iter()
            .filter_map(|s| s.as_ref())
            .find(|p| p.id == id)
    }

    /// Authenticates the slot bound to `conn` against the token registry.
    ///
    /// On success the slot keeps the token, takes the mapped display name and
    /// becomes authenticated; returns `(id, name)`. On unknown token or
    /// unknown connection the slot is left untouched and `None` is returned.
    /// Rejecting re-authentication is the caller's responsibility.
    pub fn authenticate(&mut self, conn: ConnectionId, token: &str) -> Option<(u32, String)> {
        let name = match self.tokens.lookup(token) {
            Some(name) => name.to_string(),
            None => {
                warn!("auth failed for connection {}: unknown token", conn);
                return None;
            }
        };

        let player = self.find_by_conn_mut(conn)?;
        player.authenticated = true;
        player.token = token.to_string();
        player.name = name.clone();
        info!("player {} authenticated as '{}'", player.id, player.name);
        Some((player.id, name))
    }

    /// Overwrites the control bitmask for the slot bound to `conn`.
    /// The caller must have confirmed authentication first.
    pub fn set_input(&mut self, conn: ConnectionId, inputs: InputFlags) -> bool {
        match self.find_by_conn_mut(conn) {
            Some(player) => {
                player.inputs = inputs;
                true
            }
            None => false,
        }
    }

    /// All occupied, authenticated slots in canonical slot order.
    ///
    /// This ordering is what the simulation and every broadcast fan-out
    /// observe; it is stable within a tick.
    pub fn active_players(&self) -> impl Iterator<Item = &Player> {
        self.slots
            .iter()
            .filter_map(|s| s.as_ref())
            .filter(|p| p.authenticated)
    }

    pub fn active_players_mut(&mut self) -> impl Iterator<Item = &mut Player> {
        self.slots
            .iter_mut()
            .filter_map(|s| s.as_mut())
            .filter(|p| p.authenticated)
    }

    pub fn authenticated_count(&self) -> usize {
        self.active_players().count()
    }

    /// Number of occupied slots, authenticated or not.
    pub fn connection_count(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }
}
