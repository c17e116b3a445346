//! Synchronization channel between a client and its room's shared action log.

use crate::actions::{Action, decode_all, encode};
use crate::store::{RecordListener, RoomStore, StoreError, Subscription};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;

/// Sync errors. Shown to the user as a transient notice, never fatal.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SyncError {
    #[error("Room not found: {0}")]
    RoomNotFound(String),
    #[error("You do not have access to room {0}")]
    PermissionDenied(String),
    #[error("Failed to sync drawing: {0}")]
    Network(String),
    #[error("Not in a room")]
    NotJoined,
    #[error("Failed to encode action: {0}")]
    Encode(String),
}

impl From<StoreError> for SyncError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::RoomNotFound(room) => SyncError::RoomNotFound(room),
            StoreError::PermissionDenied(room) => SyncError::PermissionDenied(room),
            StoreError::Unavailable(message) => SyncError::Network(message),
            StoreError::Lock(message) => SyncError::Network(message),
        }
    }
}

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// How an append reaches the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppendMode {
    /// Single store-side append. Concurrent writers never lose records.
    #[default]
    Atomic,
    /// Read the whole log, push, write it back. Two writers racing through
    /// this path can overwrite each other's records (last write wins).
    ReadModifyWrite,
}

/// Propagates actions to, and observes, a room's shared log.
pub struct SyncChannel<S: RoomStore + ?Sized> {
    store: Arc<S>,
    mode: AppendMode,
}

impl<S: RoomStore + ?Sized> Clone for SyncChannel<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            mode: self.mode,
        }
    }
}

impl<S: RoomStore + ?Sized> SyncChannel<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            mode: AppendMode::default(),
        }
    }

    pub fn with_mode(mut self, mode: AppendMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn mode(&self) -> AppendMode {
        self.mode
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Propagate one action to the end of the room's log.
    pub async fn append(&self, room: &str, user: &str, action: &Action) -> SyncResult<()> {
        let record = encode(action).map_err(|e| SyncError::Encode(e.to_string()))?;
        match self.mode {
            AppendMode::Atomic => self.store.append(room, user, record).await?,
            AppendMode::ReadModifyWrite => {
                let mut records: Vec<Value> = self.store.get(room).await?.actions;
                records.push(record);
                self.store.replace(room, user, records).await?;
            }
        }
        Ok(())
    }

    /// Replace the room's log with an empty sequence.
    pub async fn clear(&self, room: &str, user: &str) -> SyncResult<()> {
        self.store.replace(room, user, Vec::new()).await?;
        Ok(())
    }

    /// Receive the room's full decoded action sequence now and on every change.
    ///
    /// Records that fail to decode are logged and skipped.
    pub fn subscribe(
        &self,
        room: &str,
        user: &str,
        on_update: impl Fn(Vec<Action>) + Send + Sync + 'static,
    ) -> SyncResult<Subscription> {
        let listener: RecordListener = Arc::new(move |records: &[Value]| on_update(decode_all(records)));
        Ok(self.store.subscribe(room, user, listener)?)
    }
}
