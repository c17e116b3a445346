//! Relay wire protocol.
//!
//! JSON messages exchanged over the relay server's WebSocket, tagged by
//! `"type"`. Action records travel in their transport form; the server
//! validates them with [`crate::actions::decode`] before they enter a log.

use crate::actions::{Action, encode};
use crate::presence::PresenceMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Messages sent to the server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Join a room as `user`. Leaves any room joined before.
    Join {
        room: String,
        user: String,
        /// Label shown next to the cursor. Defaults to "User".
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
    },
    /// Leave current room
    Leave,
    /// Append one action record to the room log
    Append { action: Value },
    /// Replace the room log with an empty one
    Clear,
    /// Publish this client's cursor
    Cursor { x: f64, y: f64, tool: String },
}

impl ClientMessage {
    /// Build an append message for `action`.
    pub fn append(action: &Action) -> Result<Self, serde_json::Error> {
        Ok(Self::Append {
            action: encode(action)?,
        })
    }
}

/// Messages received from the server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Confirm room join. The full log follows as an `actions` message.
    Joined { room: String, peer_count: usize },
    /// Full action log of the room, sent on join and after every change
    Actions { room: String, actions: Vec<Value> },
    /// Full presence map of the room, sent on join and after every change
    Presence { room: String, cursors: PresenceMap },
    /// Another user joined the room
    PeerJoined { user: String },
    /// Another user left the room
    PeerLeft { user: String },
    /// Error message
    Error { message: String },
}

impl ServerMessage {
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }
}
