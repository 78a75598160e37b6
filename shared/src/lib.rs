//! Wire protocol definitions shared between the server and clients.
//!
//! Every frame on the wire is a single UTF-8 JSON object discriminated by a
//! `type` field. [`decode_client_message`] turns untrusted client text into a
//! typed [`ClientMessage`]; [`ServerMessage::encode`] produces outbound frames.
//! The game and protocol constants live here so both sides of the connection
//! agree on them.

use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

pub const PROTOCOL_VERSION: u32 = 1;
pub const DEFAULT_PORT: u16 = 9000;

/// Simulation rate in ticks per second.
pub const TICK_RATE: u32 = 20;
/// Milliseconds per simulation tick.
pub const TICK_MS: u64 = 50;

pub const MAX_PLAYERS: usize = 64;
pub const MAX_PLAYER_NAME: usize = 32;
pub const MAX_TOKEN_LENGTH: usize = 64;
pub const MAX_CHAT_MESSAGE: usize = 256;
pub const MAX_CHAT_HISTORY: usize = 100;
/// Upper bound on a single inbound frame, enforced before parsing.
pub const MAX_JSON_SIZE: usize = 4096;

pub const MOVE_SPEED: f32 = 12.5;
pub const ROTATE_SPEED: f32 = 3.0;
pub const JUMP_VELOCITY: f32 = 15.0;
pub const GRAVITY: f32 = 30.0;
pub const WORLD_WIDTH: f32 = 100.0;
pub const WORLD_HEIGHT: f32 = 75.0;

/// Compact control bitmask, one bit per client input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct InputFlags(u8);

impl InputFlags {
    pub const UP: InputFlags = InputFlags(1 << 0);
    pub const DOWN: InputFlags = InputFlags(1 << 1);
    pub const LEFT: InputFlags = InputFlags(1 << 2);
    pub const RIGHT: InputFlags = InputFlags(1 << 3);
    pub const JUMP: InputFlags = InputFlags(1 << 4);
    pub const ACTION: InputFlags = InputFlags(1 << 5);

    pub const fn empty() -> Self {
        InputFlags(0)
    }

    pub const fn bits(self) -> u8 {
        self.0
    }

    pub const fn contains(self, other: InputFlags) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn insert(&mut self, other: InputFlags) {
        self.0 |= other.0;
    }

    /// Packs the six wire-level booleans into a bitmask.
    pub fn from_parts(
        up: bool,
        down: bool,
        left: bool,
        right: bool,
        jump: bool,
        action: bool,
    ) -> Self {
        let mut flags = InputFlags::empty();
        if up {
            flags.insert(InputFlags::UP);
        }
        if down {
            flags.insert(InputFlags::DOWN);
        }
        if left {
            flags.insert(InputFlags::LEFT);
        }
        if right {
            flags.insert(InputFlags::RIGHT);
        }
        if jump {
            flags.insert(InputFlags::JUMP);
        }
        if action {
            flags.insert(InputFlags::ACTION);
        }
        flags
    }
}

/// A message sent by a client, discriminated by the `type` field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    Auth {
        #[serde(default)]
        token: String,
    },
    Input {
        #[serde(default, deserialize_with = "truthy_flag")]
        up: bool,
        #[serde(default, deserialize_with = "truthy_flag")]
        down: bool,
        #[serde(default, deserialize_with = "truthy_flag")]
        left: bool,
        #[serde(default, deserialize_with = "truthy_flag")]
        right: bool,
        #[serde(default, deserialize_with = "truthy_flag")]
        jump: bool,
        #[serde(default, deserialize_with = "truthy_flag")]
        action: bool,
    },
    Chat {
        #[serde(default)]
        msg: String,
    },
}

impl ClientMessage {
    /// Bitmask view of an `Input` message; `None` for other kinds.
    pub fn input_flags(&self) -> Option<InputFlags> {
        match *self {
            ClientMessage::Input {
                up,
                down,
                left,
                right,
                jump,
                action,
            } => Some(InputFlags::from_parts(up, down, left, right, jump, action)),
            _ => None,
        }
    }
}

/// Accepts JSON `true` or any nonzero number as "pressed"; anything else,
/// including wrong-typed values, reads as released.
fn truthy_flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::Bool(b) => b,
        serde_json::Value::Number(n) => n.as_f64().map(|v| v != 0.0).unwrap_or(false),
        _ => false,
    })
}

/// One player's kinematic row inside a `state` snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerState {
    pub id: u32,
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub angle: f32,
    pub name: String,
}

/// A message sent by the server, discriminated by the `type` field.
///
/// Absent optional strings are encoded as `""`, never omitted or null.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    AuthOk {
        player_id: u32,
        name: String,
    },
    AuthFail {
        reason: String,
    },
    State {
        tick: u32,
        players: Vec<PlayerState>,
    },
    ChatBroadcast {
        player_id: u32,
        name: String,
        msg: String,
    },
    PlayerJoin {
        player_id: u32,
        name: String,
    },
    PlayerLeave {
        player_id: u32,
    },
}

impl ServerMessage {
    /// Serializes to a single JSON frame. Total for well-formed messages.
    pub fn encode(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("frame of {0} bytes exceeds limit of {1}")]
    FrameTooLarge(usize, usize),
    #[error("invalid message: {0}")]
    Invalid(#[from] serde_json::Error),
}

/// Parses an untrusted client frame.
///
/// Frames longer than `max_len` bytes are rejected before any parsing.
/// Unrecognized or missing `type` fields fail; no partial message is ever
/// produced. Token and chat text are truncated to their protocol bounds on
/// UTF-8 character boundaries.
pub fn decode_client_message(raw: &str, max_len: usize) -> Result<ClientMessage, DecodeError> {
    if raw.len() > max_len {
        return Err(DecodeError::FrameTooLarge(raw.len(), max_len));
    }

    let mut message: ClientMessage = serde_json::from_str(raw)?;
    match &mut message {
        ClientMessage::Auth { token } => truncate_utf8(token, MAX_TOKEN_LENGTH),
        ClientMessage::Chat { msg } => truncate_utf8(msg, MAX_CHAT_MESSAGE),
        ClientMessage::Input { .. } => {}
    }
    Ok(message)
}

/// Truncates `s` to at most `max_bytes`, backing up to a character boundary.
pub fn truncate_utf8(s: &mut String, max_bytes: usize) {
    if s.len() <= max_bytes {
        return;
    }
    let mut cut = max_bytes;
    while !s.is_char_boundary(cut) {
        cut -= 1;
    }
    s.truncate(cut);
}
