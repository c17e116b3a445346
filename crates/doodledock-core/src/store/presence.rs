//! In-memory presence store.

use super::subscription::Listeners;
use super::{BoxFuture, PresenceListener, PresenceStore, StoreError, StoreResult, Subscription};
use crate::presence::{CursorState, PresenceMap};
use std::collections::HashMap;
use std::sync::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};

#[derive(Default)]
struct RoomPresence {
    cursors: PresenceMap,
    revision: u64,
}

/// In-memory presence store. Rooms are created on first use.
#[derive(Default)]
pub struct MemoryPresenceStore {
    rooms: RwLock<HashMap<String, RoomPresence>>,
    listeners: Listeners<PresenceMap>,
    offline: AtomicBool,
}

impl MemoryPresenceStore {
    /// Create a new empty presence store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate losing the connection to the store.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Current cursors of `room`.
    pub fn cursors(&self, room: &str) -> StoreResult<PresenceMap> {
        let rooms = self.rooms.read().map_err(|e| StoreError::Lock(e.to_string()))?;
        Ok(rooms.get(room).map(|r| r.cursors.clone()).unwrap_or_default())
    }

    /// Drop every cursor of `room`.
    pub fn tear_down(&self, room: &str) -> StoreResult<()> {
        self.mutate(room, |cursors| cursors.clear())
    }

    fn check_online(&self) -> StoreResult<()> {
        if self.offline.load(Ordering::SeqCst) {
            Err(StoreError::Unavailable("presence store is offline".to_string()))
        } else {
            Ok(())
        }
    }

    fn mutate(&self, room: &str, change: impl FnOnce(&mut PresenceMap)) -> StoreResult<()> {
        self.check_online()?;
        let (revision, cursors) = {
            let mut rooms = self.rooms.write().map_err(|e| StoreError::Lock(e.to_string()))?;
            let entry = rooms.entry(room.to_string()).or_default();
            change(&mut entry.cursors);
            entry.revision += 1;
            (entry.revision, entry.cursors.clone())
        };
        self.listeners.notify(room, revision, &cursors);
        Ok(())
    }
}

impl PresenceStore for MemoryPresenceStore {
    fn upsert(&self, room: &str, user: &str, cursor: CursorState) -> BoxFuture<'_, StoreResult<()>> {
        let room = room.to_string();
        let user = user.to_string();
        Box::pin(async move {
            self.mutate(&room, |cursors| {
                cursors.insert(user, cursor);
            })
        })
    }

    fn remove(&self, room: &str, user: &str) -> BoxFuture<'_, StoreResult<()>> {
        let room = room.to_string();
        let user = user.to_string();
        Box::pin(async move {
            self.mutate(&room, |cursors| {
                cursors.remove(&user);
            })
        })
    }

    fn subscribe(&self, room: &str, listener: PresenceListener) -> StoreResult<Subscription> {
        self.check_online()?;
        let (subscription, id) = self.listeners.add(room, listener)?;
        let (revision, cursors) = {
            let rooms = self.rooms.read().map_err(|e| StoreError::Lock(e.to_string()))?;
            rooms
                .get(room)
                .map(|r| (r.revision, r.cursors.clone()))
                .unwrap_or_default()
        };
        self.listeners.deliver_to(room, id, revision, &cursors);
        Ok(subscription)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::block_on;
    use std::sync::{Arc, Mutex};

    fn cursor(x: f64) -> CursorState {
        CursorState {
            x,
            y: 0.0,
            tool_label: "Pen".to_string(),
            display_name: "bob".to_string(),
            updated_at: 0,
        }
    }

    #[test]
    fn test_upsert_overwrites() {
        let store = MemoryPresenceStore::new();
        block_on(store.upsert("room", "u", cursor(1.0))).unwrap();
        block_on(store.upsert("room", "u", cursor(2.0))).unwrap();

        let cursors = store.cursors("room").unwrap();
        assert_eq!(cursors.len(), 1);
        assert_eq!(cursors["u"].x, 2.0);
    }

    #[test]
    fn test_subscribe_sees_empty_room_then_updates() {
        let store = MemoryPresenceStore::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let _sub = store
            .subscribe(
                "room",
                Arc::new(move |map: &PresenceMap| sink.lock().unwrap().push(map.len())),
            )
            .unwrap();

        block_on(store.upsert("room", "a", cursor(1.0))).unwrap();
        block_on(store.upsert("room", "b", cursor(1.0))).unwrap();
        block_on(store.remove("room", "a")).unwrap();

        assert_eq!(*seen.lock().unwrap(), vec![0, 1, 2, 1]);
    }

    #[test]
    fn test_tear_down_clears_room() {
        let store = MemoryPresenceStore::new();
        block_on(store.upsert("room", "a", cursor(1.0))).unwrap();
        store.tear_down("room").unwrap();
        assert!(store.cursors("room").unwrap().is_empty());
    }

    #[test]
    fn test_offline_upsert_fails() {
        let store = MemoryPresenceStore::new();
        store.set_offline(true);
        assert!(matches!(
            block_on(store.upsert("room", "a", cursor(1.0))),
            Err(StoreError::Unavailable(_))
        ));
    }
}
