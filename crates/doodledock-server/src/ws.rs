//! WebSocket connections.

use crate::AppState;
use axum::{
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::IntoResponse,
};
use doodledock_core::actions::{decode, encode};
use doodledock_core::presence::{ANONYMOUS_NAME, CursorState, PresenceMap, now_millis};
use doodledock_core::protocol::{ClientMessage, ServerMessage};
use doodledock_core::store::{PresenceStore, RoomStore, StoreError, Subscription};
use futures_util::{SinkExt, StreamExt, stream::SplitSink};
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::{broadcast, watch};
use tracing::{info, warn};
use uuid::Uuid;

/// A connection's seat in a room.
struct Membership {
    room: String,
    user: String,
    name: String,
    events: broadcast::Receiver<(String, ServerMessage)>,
    _actions: Subscription,
    _presence: Subscription,
}

/// Newest store snapshot of one kind waiting for the socket. A slow reader
/// skips intermediate snapshots instead of queueing them.
#[derive(Clone)]
struct Latest(Arc<watch::Sender<Option<ServerMessage>>>);

impl Latest {
    fn channel() -> (Self, watch::Receiver<Option<ServerMessage>>) {
        let (tx, rx) = watch::channel(None);
        (Self(Arc::new(tx)), rx)
    }

    fn put(&self, msg: ServerMessage) {
        self.0.send_replace(Some(msg));
    }
}

/// Where store callbacks leave snapshots for the connection loop.
struct Outbox {
    actions: Latest,
    presence: Latest,
}

/// WebSocket upgrade handler
pub(crate) async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Handle a WebSocket connection
async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let conn_id = Uuid::new_v4().to_string();
    info!("New connection: {}", conn_id);

    let (mut sender, mut receiver) = socket.split();
    // Store callbacks run synchronously; they hand snapshots to this loop.
    let (actions, mut actions_rx) = Latest::channel();
    let (presence, mut presence_rx) = Latest::channel();
    let outbox = Outbox { actions, presence };
    let mut membership: Option<Membership> = None;

    loop {
        tokio::select! {
            // Handle incoming messages from client
            msg = receiver.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        let replies = match serde_json::from_str::<ClientMessage>(&text) {
                            Ok(client_msg) => {
                                handle_message(&state, &conn_id, &outbox, &mut membership, client_msg).await
                            }
                            Err(e) => {
                                warn!("Invalid message from {}: {}", conn_id, e);
                                vec![ServerMessage::error(format!("Invalid message: {}", e))]
                            }
                        };
                        if send_all(&mut sender, &replies).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        break;
                    }
                    Some(Ok(_)) => {} // Ignore binary and ping/pong
                    Some(Err(e)) => {
                        warn!("WebSocket error for {}: {}", conn_id, e);
                        break;
                    }
                }
            }

            // Log and presence snapshots from the stores
            Ok(()) = actions_rx.changed() => {
                let msg = actions_rx.borrow_and_update().clone();
                if send_all(&mut sender, msg.as_slice()).await.is_err() {
                    break;
                }
            }
            Ok(()) = presence_rx.changed() => {
                let msg = presence_rx.borrow_and_update().clone();
                if send_all(&mut sender, msg.as_slice()).await.is_err() {
                    break;
                }
            }

            // Peer notifications from the room
            msg = async {
                match membership.as_mut() {
                    Some(m) => m.events.recv().await.ok(),
                    None => std::future::pending::<Option<(String, ServerMessage)>>().await,
                }
            } => {
                if let Some((from, server_msg)) = msg {
                    // Don't echo back to sender
                    if from != conn_id && send_all(&mut sender, &[server_msg]).await.is_err() {
                        break;
                    }
                }
            }
        }
    }

    // Cleanup on disconnect. Cursors stay in the presence map.
    if let Some(m) = membership.take() {
        state.leave_room(&m.room, &conn_id, &m.user);
    }
    info!("Connection closed: {}", conn_id);
}

/// Apply one client message. Returns the replies for this client only.
async fn handle_message(
    state: &AppState,
    conn_id: &str,
    outbox: &Outbox,
    membership: &mut Option<Membership>,
    msg: ClientMessage,
) -> Vec<ServerMessage> {
    match msg {
        ClientMessage::Join { room, user, name } => {
            if let Some(old) = membership.take() {
                state.leave_room(&old.room, conn_id, &old.user);
            }
            let name = name.unwrap_or_else(|| ANONYMOUS_NAME.to_string());
            match join(state, conn_id, outbox, &room, &user, name) {
                Ok((joined, peer_count)) => {
                    *membership = Some(joined);
                    state.broadcast(&room, conn_id, ServerMessage::PeerJoined { user: user.clone() });
                    info!("User {} joined room {} ({})", user, room, conn_id);
                    vec![ServerMessage::Joined { room, peer_count }]
                }
                Err(e) => {
                    warn!("User {} could not join room {}: {}", user, room, e);
                    vec![ServerMessage::error(e.to_string())]
                }
            }
        }
        ClientMessage::Leave => {
            if let Some(old) = membership.take() {
                state.leave_room(&old.room, conn_id, &old.user);
                info!("User {} left room {}", old.user, old.room);
            }
            Vec::new()
        }
        ClientMessage::Append { action } => {
            let Some((room, user, _)) = seat(membership) else {
                return vec![ServerMessage::error("Not in a room")];
            };
            let record = match decode(&action).map(|action| encode(&action)) {
                Ok(Ok(record)) => record,
                Ok(Err(e)) => return vec![ServerMessage::error(format!("Failed to encode action: {}", e))],
                Err(e) => {
                    warn!("Rejected action from {}: {}", user, e);
                    return vec![ServerMessage::error(format!("Invalid action: {}", e))];
                }
            };
            reply_on_error(state.rooms.append(&room, &user, record).await)
        }
        ClientMessage::Clear => {
            let Some((room, user, _)) = seat(membership) else {
                return vec![ServerMessage::error("Not in a room")];
            };
            reply_on_error(state.rooms.replace(&room, &user, Vec::new()).await)
        }
        ClientMessage::Cursor { x, y, tool } => {
            let Some((room, user, name)) = seat(membership) else {
                return vec![ServerMessage::error("Not in a room")];
            };
            let cursor = CursorState {
                x,
                y,
                tool_label: tool,
                display_name: name,
                updated_at: now_millis(),
            };
            reply_on_error(state.presence.upsert(&room, &user, cursor).await)
        }
    }
}

/// Subscribe a connection to a room's log and presence map.
fn join(
    state: &AppState,
    conn_id: &str,
    outbox: &Outbox,
    room: &str,
    user: &str,
    name: String,
) -> Result<(Membership, usize), StoreError> {
    let tx = outbox.actions.clone();
    let room_id = room.to_string();
    let actions = state.rooms.subscribe(
        room,
        user,
        Arc::new(move |records: &[Value]| {
            tx.put(ServerMessage::Actions {
                room: room_id.clone(),
                actions: records.to_vec(),
            });
        }),
    )?;

    let tx = outbox.presence.clone();
    let room_id = room.to_string();
    let presence = state.presence.subscribe(
        room,
        Arc::new(move |cursors: &PresenceMap| {
            tx.put(ServerMessage::Presence {
                room: room_id.clone(),
                cursors: cursors.clone(),
            });
        }),
    )?;

    let (events, peer_count) = state.join_room(room, conn_id);
    Ok((
        Membership {
            room: room.to_string(),
            user: user.to_string(),
            name,
            events,
            _actions: actions,
            _presence: presence,
        },
        peer_count,
    ))
}

fn seat(membership: &Option<Membership>) -> Option<(String, String, String)> {
    membership
        .as_ref()
        .map(|m| (m.room.clone(), m.user.clone(), m.name.clone()))
}

fn reply_on_error(result: Result<(), StoreError>) -> Vec<ServerMessage> {
    match result {
        Ok(()) => Vec::new(),
        Err(e) => {
            warn!("Store operation failed: {}", e);
            vec![ServerMessage::error(e.to_string())]
        }
    }
}

async fn send_all(sender: &mut SplitSink<WebSocket, Message>, messages: &[ServerMessage]) -> Result<(), axum::Error> {
    for msg in messages {
        match serde_json::to_string(msg) {
            Ok(json) => sender.send(Message::Text(json.into())).await?,
            Err(e) => warn!("Failed to encode message: {}", e),
        }
    }
    Ok(())
}
