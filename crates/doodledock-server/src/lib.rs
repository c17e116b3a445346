//! DoodleDock WebSocket Relay Server
//!
//! Hosts the shared per-room action logs and presence maps and relays every
//! change to connected clients.
//!
//! ## Protocol
//!
//! Messages are JSON tagged by `type`:
//! ```json
//! { "type": "join", "room": "room-id", "user": "user-id", "name": "alice" }
//! { "type": "append", "action": { "type": "stroke", "points": [...], "color": "#000000", "size": 2 } }
//! { "type": "cursor", "x": 100, "y": 200, "tool": "Pen" }
//! ```
//! The server answers a join with `joined`, then sends the full `actions`
//! log and `presence` map, and sends both again after every change.

pub mod config;
mod rest;
mod ws;

pub use config::{ConfigError, ServerConfig};

use axum::{
    Router,
    routing::{get, post},
};
use dashmap::DashMap;
use doodledock_core::protocol::ServerMessage;
use doodledock_core::store::{MemoryPresenceStore, MemoryRoomStore};
use std::{collections::HashSet, sync::Arc};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::debug;

const CHANNEL_CAPACITY: usize = 256;

/// Connections currently in a room.
struct Room {
    /// Peer notifications, tagged with the sending connection id.
    tx: broadcast::Sender<(String, ServerMessage)>,
    /// Connection ids.
    peers: HashSet<String>,
}

impl Room {
    fn new() -> Self {
        let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            tx,
            peers: HashSet::new(),
        }
    }
}

/// Shared application state
pub struct AppState {
    /// Room logs and access rules.
    pub rooms: Arc<MemoryRoomStore>,
    /// Cursor maps.
    pub presence: Arc<MemoryPresenceStore>,
    /// Live connections per room.
    connections: DashMap<String, Room>,
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}

impl AppState {
    pub fn new() -> Self {
        Self::with_stores(Arc::new(MemoryRoomStore::new()), Arc::new(MemoryPresenceStore::new()))
    }

    /// Serve existing stores.
    pub fn with_stores(rooms: Arc<MemoryRoomStore>, presence: Arc<MemoryPresenceStore>) -> Self {
        Self {
            rooms,
            presence,
            connections: DashMap::new(),
        }
    }

    /// Number of connections in `room`.
    pub fn peer_count(&self, room: &str) -> usize {
        self.connections.get(room).map_or(0, |r| r.peers.len())
    }

    /// Add a connection to a room
    fn join_room(&self, room_id: &str, conn_id: &str) -> (broadcast::Receiver<(String, ServerMessage)>, usize) {
        let mut room = self.connections.entry(room_id.to_string()).or_insert_with(Room::new);
        room.peers.insert(conn_id.to_string());
        (room.tx.subscribe(), room.peers.len())
    }

    /// Remove a connection from a room and tell the others
    fn leave_room(&self, room_id: &str, conn_id: &str, user: &str) {
        let Some(mut room) = self.connections.get_mut(room_id) else {
            return;
        };
        room.peers.remove(conn_id);
        if room.peers.is_empty() {
            drop(room);
            self.connections.remove(room_id);
            debug!("Room {} has no connections left", room_id);
        } else {
            let _ = room.tx.send((
                conn_id.to_string(),
                ServerMessage::PeerLeft {
                    user: user.to_string(),
                },
            ));
        }
    }

    /// Send a peer notification to everyone else in the room
    fn broadcast(&self, room_id: &str, from: &str, msg: ServerMessage) {
        if let Some(room) = self.connections.get(room_id) {
            let _ = room.tx.send((from.to_string(), msg));
        }
    }
}

/// Build the HTTP and WebSocket routes.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/health", get(health))
        .route("/ws", get(ws::ws_handler))
        .route("/rooms", get(rest::list_rooms).post(rest::create_room))
        .route("/rooms/join-by-code", post(rest::join_by_code))
        .route("/rooms/by-user/{user}", get(rest::rooms_by_user))
        .route("/rooms/{id}", get(rest::get_room))
        .route("/rooms/{id}/actions", get(rest::get_actions).post(rest::append_action))
        .route("/rooms/{id}/clear", post(rest::clear_room))
        .route("/rooms/{id}/join", post(rest::join_room))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Serve on an already bound listener until the process exits.
pub async fn serve(listener: TcpListener, state: Arc<AppState>) -> std::io::Result<()> {
    axum::serve(listener, router(state)).await
}

/// Index page
async fn index() -> &'static str {
    "DoodleDock Relay Server - Connect via WebSocket at /ws"
}

/// Health check
async fn health() -> &'static str {
    "ok"
}
