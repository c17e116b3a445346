//! Backing-store contracts for room action logs and presence maps.
//!
//! Stores hold transport records (`serde_json::Value`), not decoded actions:
//! a corrupt entry written by one client must not poison the log for the
//! others. Decoding happens at the synchronization channel.

mod memory;
mod presence;
mod subscription;

pub use memory::{JOIN_CODE_ALPHABET, JOIN_CODE_LEN, MemoryRoomStore};
pub use presence::MemoryPresenceStore;
pub use subscription::{Listener, Subscription};

use crate::presence::{CursorState, PresenceMap};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

/// Store errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("Room not found: {0}")]
    RoomNotFound(String),
    #[error("Permission denied for room {0}")]
    PermissionDenied(String),
    #[error("Store unavailable: {0}")]
    Unavailable(String),
    #[error("Lock error: {0}")]
    Lock(String),
}

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Boxed future for store operations.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Listener for a room's full action record sequence.
pub type RecordListener = Listener<[Value]>;

/// Listener for a room's full presence map.
pub type PresenceListener = Listener<PresenceMap>;

/// Room metadata without the action log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoomInfo {
    pub id: String,
    pub name: String,
    /// Six-character join code.
    pub code: String,
    /// User that created the room. Always allowed in.
    pub creator: String,
    pub is_private: bool,
    /// Users admitted to a private room. Unused for public rooms.
    #[serde(default)]
    pub allowed_users: Vec<String>,
}

impl RoomInfo {
    /// Whether `user` may read and write this room.
    pub fn permits(&self, user: &str) -> bool {
        !self.is_private || self.creator == user || self.allowed_users.iter().any(|u| u == user)
    }
}

/// A room together with its current action log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoomSnapshot {
    #[serde(flatten)]
    pub info: RoomInfo,
    /// Action records in log order.
    pub actions: Vec<Value>,
}

/// Shared per-room action log.
pub trait RoomStore: Send + Sync {
    /// Fetch a room and its current log.
    fn get(&self, room: &str) -> BoxFuture<'_, StoreResult<RoomSnapshot>>;

    /// Append one record to the end of the log as a single store-side step.
    fn append(&self, room: &str, user: &str, record: Value) -> BoxFuture<'_, StoreResult<()>>;

    /// Overwrite the whole log.
    fn replace(&self, room: &str, user: &str, records: Vec<Value>) -> BoxFuture<'_, StoreResult<()>>;

    /// Register `listener` for every change of the room's log.
    ///
    /// The current log is delivered once before this returns.
    fn subscribe(&self, room: &str, user: &str, listener: RecordListener) -> StoreResult<Subscription>;
}

/// Per-room map of user cursors.
pub trait PresenceStore: Send + Sync {
    /// Overwrite the cursor record of `user`.
    fn upsert(&self, room: &str, user: &str, cursor: CursorState) -> BoxFuture<'_, StoreResult<()>>;

    /// Drop the cursor record of `user`, if any.
    fn remove(&self, room: &str, user: &str) -> BoxFuture<'_, StoreResult<()>>;

    /// Register `listener` for every change of the room's presence map.
    ///
    /// The current map is delivered once before this returns.
    fn subscribe(&self, room: &str, listener: PresenceListener) -> StoreResult<Subscription>;
}

#[cfg(test)]
pub(crate) fn block_on<F: std::future::Future>(f: F) -> F::Output {
    // Simple blocking executor for tests
    use std::task::{Context, Poll, RawWaker, RawWakerVTable, Waker};

    fn dummy_raw_waker() -> RawWaker {
        fn no_op(_: *const ()) {}
        fn clone(_: *const ()) -> RawWaker {
            dummy_raw_waker()
        }
        static VTABLE: RawWakerVTable = RawWakerVTable::new(clone, no_op, no_op, no_op);
        RawWaker::new(std::ptr::null(), &VTABLE)
    }

    let waker = unsafe { Waker::from_raw(dummy_raw_waker()) };
    let mut cx = Context::from_waker(&waker);
    let mut f = std::pin::pin!(f);

    loop {
        match f.as_mut().poll(&mut cx) {
            Poll::Ready(result) => return result,
            Poll::Pending => {}
        }
    }
}
