//! DoodleDock Core Library
//!
//! Platform-agnostic core of the DoodleDock collaborative whiteboard: the
//! action model, gesture handling, local undo, and the sync and presence
//! channels over pluggable room stores.

pub mod actions;
pub mod board;
pub mod color;
pub mod config;
pub mod history;
pub mod presence;
pub mod protocol;
pub mod session;
pub mod store;
pub mod sync;
pub mod tools;

pub use actions::{Action, DecodeError, decode, decode_all, encode, encode_all};
pub use board::BoardView;
pub use color::BoardColor;
pub use config::DrawingSessionConfig;
pub use history::{LocalHistory, UndoPolicy};
pub use presence::{CursorState, Identity, PresenceChannel, PresenceMap};
pub use protocol::{ClientMessage, ServerMessage};
pub use session::DrawingSession;
pub use store::{MemoryPresenceStore, MemoryRoomStore, PresenceStore, RoomStore, StoreError, Subscription};
pub use sync::{AppendMode, SyncChannel, SyncError, SyncResult};
pub use tools::{DrawingEngine, GestureFeedback, InputError, ToolKind};
