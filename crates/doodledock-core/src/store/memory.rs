//! In-memory room store.

use super::subscription::Listeners;
use super::{
    BoxFuture, RecordListener, RoomInfo, RoomSnapshot, RoomStore, StoreError, StoreResult,
    Subscription,
};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};
use uuid::Uuid;

/// Characters used in join codes. No 0/O/1/I.
pub const JOIN_CODE_ALPHABET: &[u8; 32] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

/// Length of a join code.
pub const JOIN_CODE_LEN: usize = 6;

struct RoomEntry {
    info: RoomInfo,
    actions: Vec<Value>,
    /// Bumped on every change of `actions`.
    revision: u64,
}

/// In-memory room store for tests, local sessions and the relay server.
///
/// Appends are applied under a single write lock, so concurrent writers
/// never lose each other's records.
#[derive(Default)]
pub struct MemoryRoomStore {
    rooms: RwLock<HashMap<String, RoomEntry>>,
    listeners: Listeners<[Value]>,
    offline: AtomicBool,
}

impl MemoryRoomStore {
    /// Create a new empty room store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a room with a fresh id and a unique join code.
    pub fn create_room(&self, name: &str, is_private: bool, creator: &str) -> StoreResult<RoomInfo> {
        self.create_room_with_id(&Uuid::new_v4().to_string(), name, is_private, creator)
    }

    /// Create a room under a caller-chosen id.
    pub fn create_room_with_id(
        &self,
        id: &str,
        name: &str,
        is_private: bool,
        creator: &str,
    ) -> StoreResult<RoomInfo> {
        let mut rooms = self.rooms.write().map_err(|e| StoreError::Lock(e.to_string()))?;
        if let Some(existing) = rooms.get(id) {
            return Ok(existing.info.clone());
        }
        let code = loop {
            let code = generate_join_code();
            if !rooms.values().any(|room| room.info.code == code) {
                break code;
            }
        };
        let info = RoomInfo {
            id: id.to_string(),
            name: name.to_string(),
            code,
            creator: creator.to_string(),
            is_private,
            allowed_users: Vec::new(),
        };
        rooms.insert(
            id.to_string(),
            RoomEntry {
                info: info.clone(),
                actions: Vec::new(),
                revision: 0,
            },
        );
        log::debug!("Created room {} ({})", info.id, info.code);
        Ok(info)
    }

    /// Join a room by id. Private rooms record the user as allowed.
    pub fn join(&self, room: &str, user: &str) -> StoreResult<RoomInfo> {
        let mut rooms = self.rooms.write().map_err(|e| StoreError::Lock(e.to_string()))?;
        let entry = rooms
            .get_mut(room)
            .ok_or_else(|| StoreError::RoomNotFound(room.to_string()))?;
        admit(&mut entry.info, user);
        Ok(entry.info.clone())
    }

    /// Join a room by its join code. Surrounding whitespace and case are ignored.
    pub fn join_by_code(&self, code: &str, user: &str) -> StoreResult<RoomInfo> {
        let code = code.trim().to_ascii_uppercase();
        let mut rooms = self.rooms.write().map_err(|e| StoreError::Lock(e.to_string()))?;
        let entry = rooms
            .values_mut()
            .find(|room| room.info.code == code)
            .ok_or_else(|| StoreError::RoomNotFound(code.clone()))?;
        admit(&mut entry.info, user);
        Ok(entry.info.clone())
    }

    /// All rooms, ordered by name then id.
    pub fn list_rooms(&self) -> StoreResult<Vec<RoomInfo>> {
        let rooms = self.rooms.read().map_err(|e| StoreError::Lock(e.to_string()))?;
        let mut list: Vec<RoomInfo> = rooms.values().map(|room| room.info.clone()).collect();
        list.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
        Ok(list)
    }

    /// Rooms created by `user`.
    pub fn rooms_created_by(&self, user: &str) -> StoreResult<Vec<RoomInfo>> {
        Ok(self
            .list_rooms()?
            .into_iter()
            .filter(|room| room.creator == user)
            .collect())
    }

    /// Simulate losing the connection to the store. All operations fail with
    /// [`StoreError::Unavailable`] while offline.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Number of live subscriptions on `room`.
    pub fn subscriber_count(&self, room: &str) -> usize {
        self.listeners.count(room)
    }

    fn check_online(&self) -> StoreResult<()> {
        if self.offline.load(Ordering::SeqCst) {
            Err(StoreError::Unavailable("store is offline".to_string()))
        } else {
            Ok(())
        }
    }

    /// Apply `change` to the log of `room` and notify subscribers.
    fn mutate(&self, room: &str, user: &str, change: impl FnOnce(&mut Vec<Value>)) -> StoreResult<()> {
        self.check_online()?;
        let (revision, actions) = {
            let mut rooms = self.rooms.write().map_err(|e| StoreError::Lock(e.to_string()))?;
            let entry = rooms
                .get_mut(room)
                .ok_or_else(|| StoreError::RoomNotFound(room.to_string()))?;
            if !entry.info.permits(user) {
                return Err(StoreError::PermissionDenied(room.to_string()));
            }
            change(&mut entry.actions);
            entry.revision += 1;
            (entry.revision, entry.actions.clone())
        };
        self.listeners.notify(room, revision, &actions);
        Ok(())
    }
}

impl RoomStore for MemoryRoomStore {
    fn get(&self, room: &str) -> BoxFuture<'_, StoreResult<RoomSnapshot>> {
        let room = room.to_string();
        Box::pin(async move {
            self.check_online()?;
            let rooms = self.rooms.read().map_err(|e| StoreError::Lock(e.to_string()))?;
            rooms
                .get(&room)
                .map(|entry| RoomSnapshot {
                    info: entry.info.clone(),
                    actions: entry.actions.clone(),
                })
                .ok_or(StoreError::RoomNotFound(room))
        })
    }

    fn append(&self, room: &str, user: &str, record: Value) -> BoxFuture<'_, StoreResult<()>> {
        let room = room.to_string();
        let user = user.to_string();
        Box::pin(async move { self.mutate(&room, &user, |actions| actions.push(record)) })
    }

    fn replace(&self, room: &str, user: &str, records: Vec<Value>) -> BoxFuture<'_, StoreResult<()>> {
        let room = room.to_string();
        let user = user.to_string();
        Box::pin(async move { self.mutate(&room, &user, |actions| *actions = records) })
    }

    fn subscribe(&self, room: &str, user: &str, listener: RecordListener) -> StoreResult<Subscription> {
        self.check_online()?;
        {
            let rooms = self.rooms.read().map_err(|e| StoreError::Lock(e.to_string()))?;
            let entry = rooms
                .get(room)
                .ok_or_else(|| StoreError::RoomNotFound(room.to_string()))?;
            if !entry.info.permits(user) {
                return Err(StoreError::PermissionDenied(room.to_string()));
            }
        }

        // Register first so no change between the read below and registration is missed.
        let (subscription, id) = self.listeners.add(room, listener)?;
        let (revision, actions) = {
            let rooms = self.rooms.read().map_err(|e| StoreError::Lock(e.to_string()))?;
            match rooms.get(room) {
                Some(entry) => (entry.revision, entry.actions.clone()),
                None => return Err(StoreError::RoomNotFound(room.to_string())),
            }
        };
        self.listeners.deliver_to(room, id, revision, &actions);
        Ok(subscription)
    }
}

fn admit(info: &mut RoomInfo, user: &str) {
    if info.is_private && info.creator != user && !info.allowed_users.iter().any(|u| u == user) {
        info.allowed_users.push(user.to_string());
    }
}

fn generate_join_code() -> String {
    // 32 symbols divide 256 evenly, so taking bytes modulo the alphabet is unbiased.
    Uuid::new_v4()
        .as_bytes()
        .iter()
        .take(JOIN_CODE_LEN)
        .map(|b| JOIN_CODE_ALPHABET[(*b as usize) % JOIN_CODE_ALPHABET.len()] as char)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::block_on;
    use serde_json::json;
    use std::sync::{Arc, Mutex};

    fn recorder() -> (RecordListener, Arc<Mutex<Vec<Vec<Value>>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let listener: RecordListener = Arc::new(move |records: &[Value]| {
            sink.lock().unwrap().push(records.to_vec());
        });
        (listener, seen)
    }

    #[test]
    fn test_create_room_generates_code() {
        let store = MemoryRoomStore::new();
        let room = store.create_room("Sketches", false, "alice").unwrap();
        assert_eq!(room.code.len(), JOIN_CODE_LEN);
        assert!(room.code.bytes().all(|b| JOIN_CODE_ALPHABET.contains(&b)));

        let snapshot = block_on(store.get(&room.id)).unwrap();
        assert_eq!(snapshot.info, room);
        assert!(snapshot.actions.is_empty());
    }

    #[test]
    fn test_not_found() {
        let store = MemoryRoomStore::new();
        let result = block_on(store.get("nonexistent"));
        assert!(matches!(result, Err(StoreError::RoomNotFound(_))));
    }

    #[test]
    fn test_append_preserves_order() {
        let store = MemoryRoomStore::new();
        let room = store.create_room("r", false, "alice").unwrap();
        block_on(store.append(&room.id, "alice", json!({"n": 1}))).unwrap();
        block_on(store.append(&room.id, "bob", json!({"n": 2}))).unwrap();

        let snapshot = block_on(store.get(&room.id)).unwrap();
        assert_eq!(snapshot.actions, vec![json!({"n": 1}), json!({"n": 2})]);
    }

    #[test]
    fn test_subscribe_delivers_current_then_changes() {
        let store = MemoryRoomStore::new();
        let room = store.create_room("r", false, "alice").unwrap();
        block_on(store.append(&room.id, "alice", json!(1))).unwrap();

        let (listener, seen) = recorder();
        let sub = store.subscribe(&room.id, "bob", listener).unwrap();
        block_on(store.append(&room.id, "alice", json!(2))).unwrap();
        block_on(store.replace(&room.id, "alice", Vec::new())).unwrap();

        assert_eq!(
            *seen.lock().unwrap(),
            vec![vec![json!(1)], vec![json!(1), json!(2)], vec![]]
        );

        drop(sub);
        block_on(store.append(&room.id, "alice", json!(3))).unwrap();
        assert_eq!(seen.lock().unwrap().len(), 3);
        assert_eq!(store.subscriber_count(&room.id), 0);
    }

    #[test]
    fn test_listener_can_write_back_to_its_room() {
        let store = Arc::new(MemoryRoomStore::new());
        let room = store.create_room("r", false, "alice").unwrap();
        block_on(store.append(&room.id, "alice", json!("hello"))).unwrap();

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let handle = Arc::downgrade(&store);
        let id = room.id.clone();
        let bot: RecordListener = Arc::new(move |records: &[Value]| {
            sink.lock().unwrap().push(records.len());
            if records.len() == 1 {
                if let Some(store) = handle.upgrade() {
                    block_on(store.append(&id, "bot", json!("welcome"))).unwrap();
                }
            }
        });
        let _sub = store.subscribe(&room.id, "bot", bot).unwrap();

        assert_eq!(*seen.lock().unwrap(), vec![1, 2]);
        block_on(store.append(&room.id, "alice", json!("thanks"))).unwrap();
        assert_eq!(*seen.lock().unwrap(), vec![1, 2, 3]);
        assert_eq!(block_on(store.get(&room.id)).unwrap().actions.len(), 3);
    }

    #[test]
    fn test_private_room_rejects_strangers() {
        let store = MemoryRoomStore::new();
        let room = store.create_room("secret", true, "alice").unwrap();

        let result = block_on(store.append(&room.id, "mallory", json!(1)));
        assert!(matches!(result, Err(StoreError::PermissionDenied(_))));
        let (listener, _) = recorder();
        assert!(matches!(
            store.subscribe(&room.id, "mallory", listener),
            Err(StoreError::PermissionDenied(_))
        ));

        // The creator needs no invitation.
        block_on(store.append(&room.id, "alice", json!(1))).unwrap();
    }

    #[test]
    fn test_join_by_code_admits_user() {
        let store = MemoryRoomStore::new();
        let room = store.create_room("secret", true, "alice").unwrap();

        let joined = store
            .join_by_code(&format!("  {}  ", room.code.to_lowercase()), "bob")
            .unwrap();
        assert_eq!(joined.id, room.id);
        assert_eq!(joined.allowed_users, vec!["bob".to_string()]);

        // Joining twice does not duplicate membership.
        let again = store.join(&room.id, "bob").unwrap();
        assert_eq!(again.allowed_users.len(), 1);

        block_on(store.append(&room.id, "bob", json!(1))).unwrap();
        assert!(matches!(
            store.join_by_code("ZZZZZZ", "bob"),
            Err(StoreError::RoomNotFound(_))
        ));
    }

    #[test]
    fn test_public_join_does_not_track_members() {
        let store = MemoryRoomStore::new();
        let room = store.create_room("open", false, "alice").unwrap();
        let joined = store.join(&room.id, "bob").unwrap();
        assert!(joined.allowed_users.is_empty());
    }

    #[test]
    fn test_list_and_filter_by_creator() {
        let store = MemoryRoomStore::new();
        store.create_room("b", false, "alice").unwrap();
        store.create_room("a", true, "bob").unwrap();

        let names: Vec<String> = store.list_rooms().unwrap().into_iter().map(|r| r.name).collect();
        assert_eq!(names, vec!["a".to_string(), "b".to_string()]);
        assert_eq!(store.rooms_created_by("alice").unwrap().len(), 1);
    }

    #[test]
    fn test_offline_store_is_unavailable() {
        let store = MemoryRoomStore::new();
        let room = store.create_room("r", false, "alice").unwrap();
        store.set_offline(true);
        assert!(matches!(
            block_on(store.append(&room.id, "alice", json!(1))),
            Err(StoreError::Unavailable(_))
        ));
        store.set_offline(false);
        block_on(store.append(&room.id, "alice", json!(1))).unwrap();
    }

    #[test]
    fn test_concurrent_appends_are_not_lost() {
        let store = Arc::new(MemoryRoomStore::new());
        let room = store.create_room("r", false, "alice").unwrap();

        let handles: Vec<_> = (0..4)
            .map(|t| {
                let store = Arc::clone(&store);
                let id = room.id.clone();
                std::thread::spawn(move || {
                    for i in 0..25 {
                        block_on(store.append(&id, "alice", json!([t, i]))).unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(block_on(store.get(&room.id)).unwrap().actions.len(), 100);
    }
}
