//! Server network layer: websocket transport and game loop coordination.
//!
//! One task accepts TCP connections and performs the websocket handshake;
//! each connection then gets a reader task (forwarding inbound frames as
//! events) and a writer task (draining a per-connection outbox). All events
//! funnel into a single game-loop task that owns the [`SessionController`],
//! so callbacks run to completion and never concurrently. The fixed tick
//! fires from the same loop.

use crate::config::ServerConfig;
use crate::players::{ConnectionId, TokenRegistry};
use crate::session::{Outbound, SessionController};
use futures_util::{SinkExt, StreamExt};
use log::{debug, error, info, warn};
use std::collections::HashMap;
use std::io;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::time::{interval, MissedTickBehavior};
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message;

/// Events sent from connection tasks to the game loop.
#[derive(Debug)]
pub enum ServerEvent {
    Connected {
        conn: ConnectionId,
        sender: mpsc::UnboundedSender<Message>,
    },
    MessageReceived {
        conn: ConnectionId,
        text: String,
    },
    Disconnected {
        conn: ConnectionId,
    },
}

/// Outbound side of every live connection, keyed by handle.
///
/// Dropping a sender ends that connection's writer task and closes the
/// socket.
#[derive(Debug, Default)]
pub struct ConnectionTable {
    senders: HashMap<ConnectionId, mpsc::UnboundedSender<Message>>,
}

impl ConnectionTable {
    fn insert(&mut self, conn: ConnectionId, sender: mpsc::UnboundedSender<Message>) {
        self.senders.insert(conn, sender);
    }

    fn remove(&mut self, conn: ConnectionId) {
        self.senders.remove(&conn);
    }

    pub fn len(&self) -> usize {
        self.senders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.senders.is_empty()
    }
}

impl Outbound for ConnectionTable {
    fn send(&mut self, conn: ConnectionId, frame: &str) {
        if let Some(sender) = self.senders.get(&conn) {
            // A full/closed outbox is that connection's problem only
            if sender.send(Message::Text(frame.to_string())).is_err() {
                warn!("failed to queue frame for connection {}", conn);
            }
        }
    }
}

/// Websocket session server: accept loop plus the single-threaded game loop.
pub struct Server {
    listener: TcpListener,
    controller: SessionController,
    tick_interval: Duration,
}

impl Server {
    pub async fn bind(
        addr: &str,
        config: ServerConfig,
        tokens: TokenRegistry,
    ) -> io::Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        info!("listening on {}", listener.local_addr()?);
        info!(
            "tick rate: {} Hz ({} ms)",
            1000 / config.tick_ms.max(1),
            config.tick_ms
        );

        let tick_interval = config.tick_interval();
        Ok(Server {
            listener,
            controller: SessionController::new(config, tokens),
            tick_interval,
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Runs the accept loop and the game loop until the event channel
    /// closes.
    pub async fn run(mut self) -> io::Result<()> {
        let (event_tx, mut event_rx) = mpsc::unbounded_channel();
        tokio::spawn(accept_loop(self.listener, event_tx));

        let mut connections = ConnectionTable::default();
        let mut ticker = interval(self.tick_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // The first tick fires immediately; skip it
        ticker.tick().await;

        loop {
            tokio::select! {
                event = event_rx.recv() => {
                    match event {
                        Some(ServerEvent::Connected { conn, sender }) => {
                            connections.insert(conn, sender);
                            if !self.controller.on_connect(conn) {
                                // Dropping the sender closes the socket
                                connections.remove(conn);
                            }
                        }
                        Some(ServerEvent::MessageReceived { conn, text }) => {
                            self.controller.on_message(conn, &text, &mut connections);
                        }
                        Some(ServerEvent::Disconnected { conn }) => {
                            self.controller.on_disconnect(conn, &mut connections);
                            connections.remove(conn);
                        }
                        None => {
                            info!("event channel closed, stopping game loop");
                            break;
                        }
                    }
                }
                _ = ticker.tick() => {
                    self.controller.on_tick(&mut connections);
                }
            }
        }

        Ok(())
    }
}

/// Accepts TCP connections and hands each to its own connection task.
async fn accept_loop(listener: TcpListener, event_tx: mpsc::UnboundedSender<ServerEvent>) {
    let mut next_conn_id: u64 = 1;

    loop {
        match listener.accept().await {
            Ok((stream, peer)) => {
                let conn = ConnectionId(next_conn_id);
                next_conn_id += 1;
                tokio::spawn(serve_connection(stream, peer, conn, event_tx.clone()));
            }
            Err(e) => {
                error!("accept error: {}", e);
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        }
    }
}

/// Performs the websocket handshake, then pumps frames in both directions
/// until the peer goes away or the game loop drops the outbox sender.
async fn serve_connection(
    stream: TcpStream,
    peer: SocketAddr,
    conn: ConnectionId,
    event_tx: mpsc::UnboundedSender<ServerEvent>,
) {
    let ws = match accept_async(stream).await {
        Ok(ws) => ws,
        Err(e) => {
            warn!("websocket handshake with {} failed: {}", peer, e);
            return;
        }
    };
    info!("connection {} established from {}", conn, peer);

    let (mut sink, mut frames) = ws.split();
    let (sender, mut outbox) = mpsc::unbounded_channel::<Message>();

    if event_tx.send(ServerEvent::Connected { conn, sender }).is_err() {
        return;
    }

    let writer = tokio::spawn(async move {
        while let Some(frame) = outbox.recv().await {
            if sink.send(frame).await.is_err() {
                break;
            }
        }
        let _ = sink.close().await;
    });

    while let Some(frame) = frames.next().await {
        match frame {
            Ok(Message::Text(text)) => {
                if event_tx
                    .send(ServerEvent::MessageReceived { conn, text })
                    .is_err()
                {
                    break;
                }
            }
            Ok(Message::Close(_)) => break,
            // Ping/pong are handled by tungstenite; binary is not part of
            // the protocol
            Ok(_) => {}
            Err(e) => {
                debug!("connection {} read error: {}", conn, e);
                break;
            }
        }
    }

    info!("connection {} closed", conn);
    let _ = event_tx.send(ServerEvent::Disconnected { conn });
    let _ = writer.await;
}
