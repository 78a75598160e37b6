//! Session orchestration and broadcast fan-out.
//!
//! The controller ties the registry, chat history and simulation together
//! behind four reactor callbacks: connection established, connection closed,
//! message received and tick. It owns no player state of its own; outbound
//! delivery goes through the [`Outbound`] seam so the network layer and tests
//! plug in interchangeably.
//!
//! Per-connection state machine: `Connected-Unauthenticated → Authenticated`,
//! terminal until close. Malformed frames and pre-auth input/chat are dropped
//! silently (logged only); auth problems are answered with `auth_fail` and
//! the connection stays open for retry.

use crate::chat::ChatHistory;
use crate::config::ServerConfig;
use crate::game::Simulation;
use crate::players::{ConnectionId, PlayerRegistry, TokenRegistry};
use log::{debug, info, warn};
use shared::{decode_client_message, ClientMessage, ServerMessage};

/// Delivery seam between the controller and the transport.
///
/// Implementations must treat a failed send as that recipient's problem:
/// it must never abort fan-out to the remaining connections.
pub trait Outbound {
    fn send(&mut self, conn: ConnectionId, frame: &str);
}

/// Routes inbound events to registry/chat/simulation operations and fans
/// encoded notifications out to subscribed connections.
pub struct SessionController {
    config: ServerConfig,
    registry: PlayerRegistry,
    chat: ChatHistory,
    sim: Simulation,
}

impl SessionController {
    pub fn new(config: ServerConfig, tokens: TokenRegistry) -> Self {
        let spawn = (config.world_width / 2.0, config.world_height / 2.0);
        let registry = PlayerRegistry::new(config.max_players, spawn, tokens);
        let chat = ChatHistory::new(config.max_chat_history);
        Self {
            config,
            registry,
            chat,
            sim: Simulation::new(),
        }
    }

    pub fn registry(&self) -> &PlayerRegistry {
        &self.registry
    }

    pub fn chat(&self) -> &ChatHistory {
        &self.chat
    }

    pub fn tick(&self) -> u32 {
        self.sim.tick()
    }

    /// Connection established. Returns `false` when every slot is taken;
    /// the caller must then close the connection.
    pub fn on_connect(&mut self, conn: ConnectionId) -> bool {
        match self.registry.add_connection(conn) {
            Some(_) => true,
            None => {
                warn!("rejecting connection {}: server full", conn);
                false
            }
        }
    }

    /// Connection closed. Notifies the remaining authenticated players when
    /// the departing slot was authenticated, then frees the slot.
    pub fn on_disconnect(&mut self, conn: ConnectionId, out: &mut dyn Outbound) {
        let leave = match self.registry.find_by_conn(conn) {
            Some(p) if p.authenticated => {
                Some(ServerMessage::PlayerLeave { player_id: p.id }.encode())
            }
            _ => None,
        };
        if let Some(frame) = leave {
            self.broadcast(out, &frame, Some(conn));
        }
        self.registry.remove_connection(conn);
    }

    /// Raw frame received. Malformed frames are dropped without a reply.
    pub fn on_message(&mut self, conn: ConnectionId, raw: &str, out: &mut dyn Outbound) {
        let message = match decode_client_message(raw, self.config.max_message_size) {
            Ok(message) => message,
            Err(e) => {
                debug!("dropping frame from connection {}: {}", conn, e);
                return;
            }
        };

        match message {
            ClientMessage::Auth { token } => self.handle_auth(conn, &token, out),
            ClientMessage::Input {
                up,
                down,
                left,
                right,
                jump,
                action,
            } => {
                let flags = shared::InputFlags::from_parts(up, down, left, right, jump, action);
                self.handle_input(conn, flags);
            }
            ClientMessage::Chat { msg } => self.handle_chat(conn, &msg, out),
        }
    }

    /// Tick timer fired. Advances the simulation by the fixed timestep, then
    /// broadcasts one world snapshot unless nobody is authenticated.
    pub fn on_tick(&mut self, out: &mut dyn Outbound) {
        self.sim
            .step(&mut self.registry, &self.config, self.config.tick_dt());

        if self.registry.authenticated_count() == 0 {
            return;
        }

        let frame = ServerMessage::State {
            tick: self.sim.tick(),
            players: Simulation::player_states(&self.registry),
        }
        .encode();
        self.broadcast(out, &frame, None);
    }

    fn handle_auth(&mut self, conn: ConnectionId, token: &str, out: &mut dyn Outbound) {
        match self.registry.find_by_conn(conn) {
            None => {
                debug!("auth from unknown connection {}", conn);
                return;
            }
            Some(p) if p.authenticated => {
                let frame = ServerMessage::AuthFail {
                    reason: "already authenticated".to_string(),
                }
                .encode();
                out.send(conn, &frame);
                return;
            }
            Some(_) => {}
        }

        match self.registry.authenticate(conn, token) {
            Some((player_id, name)) => {
                let ok = ServerMessage::AuthOk {
                    player_id,
                    name: name.clone(),
                }
                .encode();
                out.send(conn, &ok);

                let join = ServerMessage::PlayerJoin { player_id, name }.encode();
                self.broadcast(out, &join, Some(conn));
                info!("player {} joined", player_id);
            }
            None => {
                let frame = ServerMessage::AuthFail {
                    reason: "invalid token".to_string(),
                }
                .encode();
                out.send(conn, &frame);
            }
        }
    }

    fn handle_input(&mut self, conn: ConnectionId, flags: shared::InputFlags) {
        match self.registry.find_by_conn(conn) {
            Some(p) if p.authenticated => {
                self.registry.set_input(conn, flags);
            }
            _ => debug!("ignoring input from unauthenticated connection {}", conn),
        }
    }

    fn handle_chat(&mut self, conn: ConnectionId, text: &str, out: &mut dyn Outbound) {
        let (player_id, name) = match self.registry.find_by_conn(conn) {
            Some(p) if p.authenticated => (p.id, p.name.clone()),
            _ => {
                debug!("ignoring chat from unauthenticated connection {}", conn);
                return;
            }
        };

        self.chat.append(player_id, &name, text);

        // Chat goes to every authenticated player, the sender included
        let frame = ServerMessage::ChatBroadcast {
            player_id,
            name,
            msg: text.to_string(),
        }
        .encode();
        self.broadcast(out, &frame, None);
    }

    /// Delivers one pre-encoded frame to every authenticated connection in
    /// canonical slot order, optionally excluding one handle.
    fn broadcast(&self, out: &mut dyn Outbound, frame: &str, exclude: Option<ConnectionId>) {
        for player in self.registry.active_players() {
            if Some(player.conn) == exclude {
                continue;
            }
            out.send(player.conn, frame);
        }
    }
}
