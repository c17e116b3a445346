//! Ephemeral per-user cursor broadcast, independent of the action log.
//!
//! Records are overwritten, never appended. There is no built-in expiry:
//! a cursor stays in the map until its owner publishes again or the room is
//! torn down. Hosts that want stale cursors hidden can set a TTL on the
//! session config, which only filters the delivered view.

use crate::store::{PresenceListener, PresenceStore, Subscription};
use crate::sync::SyncResult;
use kurbo::Point;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Display name used when no email is known.
pub const ANONYMOUS_NAME: &str = "User";

/// One user's pointer position, tool and label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CursorState {
    pub x: f64,
    pub y: f64,
    /// Human-readable tool label, e.g. "Pen" or "Eraser".
    #[serde(rename = "tool")]
    pub tool_label: String,
    #[serde(rename = "name")]
    pub display_name: String,
    /// Milliseconds since the Unix epoch.
    #[serde(rename = "updated")]
    pub updated_at: u64,
}

impl CursorState {
    /// Create a cursor record stamped with the current time.
    pub fn new(at: Point, tool_label: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            x: at.x,
            y: at.y,
            tool_label: tool_label.into(),
            display_name: display_name.into(),
            updated_at: now_millis(),
        }
    }

    pub fn position(&self) -> Point {
        Point::new(self.x, self.y)
    }

    /// Whether the record is older than `ttl` at time `now` (epoch millis).
    pub fn is_stale(&self, ttl: Duration, now: u64) -> bool {
        now.saturating_sub(self.updated_at) > ttl.as_millis() as u64
    }
}

/// Cursors of a room keyed by user id.
pub type PresenceMap = BTreeMap<String, CursorState>;

/// Who is drawing. Supplied by the host's identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// Stable opaque user id.
    pub user_id: String,
    /// Label shown next to this user's cursor.
    pub display_name: String,
}

impl Identity {
    pub fn new(user_id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            display_name: display_name.into(),
        }
    }

    /// Derive the display name from the local part of an email address.
    pub fn from_email(user_id: impl Into<String>, email: Option<&str>) -> Self {
        let display_name = email
            .and_then(|email| email.split('@').next())
            .filter(|name| !name.is_empty())
            .unwrap_or(ANONYMOUS_NAME);
        Self::new(user_id, display_name)
    }
}

/// Current time in milliseconds since the Unix epoch.
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Cursors other than `own_id`, minus those older than `ttl` if one is set.
pub fn visible_cursors(map: &PresenceMap, own_id: &str, ttl: Option<Duration>, now: u64) -> PresenceMap {
    map.iter()
        .filter(|(user, _)| user.as_str() != own_id)
        .filter(|(_, cursor)| ttl.is_none_or(|ttl| !cursor.is_stale(ttl, now)))
        .map(|(user, cursor)| (user.clone(), cursor.clone()))
        .collect()
}

/// Publishes and observes cursors through a [`PresenceStore`].
pub struct PresenceChannel<P: PresenceStore + ?Sized> {
    store: Arc<P>,
}

impl<P: PresenceStore + ?Sized> Clone for PresenceChannel<P> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<P: PresenceStore + ?Sized> PresenceChannel<P> {
    pub fn new(store: Arc<P>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<P> {
        &self.store
    }

    /// Overwrite the cursor of `user` in `room`.
    pub async fn publish(&self, room: &str, user: &str, cursor: CursorState) -> SyncResult<()> {
        self.store.upsert(room, user, cursor).await?;
        Ok(())
    }

    /// Remove the cursor of `user` from `room`.
    pub async fn withdraw(&self, room: &str, user: &str) -> SyncResult<()> {
        self.store.remove(room, user).await?;
        Ok(())
    }

    /// Receive the full presence map of `room` now and on every change.
    pub fn subscribe(
        &self,
        room: &str,
        on_update: impl Fn(PresenceMap) + Send + Sync + 'static,
    ) -> SyncResult<Subscription> {
        let listener: PresenceListener = Arc::new(move |map: &PresenceMap| on_update(map.clone()));
        Ok(self.store.subscribe(room, listener)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemoryPresenceStore, block_on};
    use std::sync::Mutex;

    fn cursor(x: f64, y: f64, updated_at: u64) -> CursorState {
        CursorState {
            x,
            y,
            tool_label: "Pen".to_string(),
            display_name: "alice".to_string(),
            updated_at,
        }
    }

    #[test]
    fn test_identity_from_email() {
        assert_eq!(Identity::from_email("u1", Some("alice@example.com")).display_name, "alice");
        assert_eq!(Identity::from_email("u1", None).display_name, ANONYMOUS_NAME);
        assert_eq!(Identity::from_email("u1", Some("@nowhere")).display_name, ANONYMOUS_NAME);
    }

    #[test]
    fn test_cursor_wire_names() {
        let value = serde_json::to_value(cursor(1.0, 2.0, 7)).unwrap();
        assert_eq!(
            value,
            serde_json::json!({"x": 1.0, "y": 2.0, "tool": "Pen", "name": "alice", "updated": 7})
        );
    }

    #[test]
    fn test_publish_overwrites() {
        let channel = PresenceChannel::new(Arc::new(MemoryPresenceStore::new()));
        let seen = Arc::new(Mutex::new(PresenceMap::new()));
        let sink = Arc::clone(&seen);
        let _sub = channel
            .subscribe("room", move |map| *sink.lock().unwrap() = map)
            .unwrap();

        block_on(channel.publish("room", "u", cursor(1.0, 1.0, 1))).unwrap();
        block_on(channel.publish("room", "u", cursor(2.0, 2.0, 2))).unwrap();

        let map = seen.lock().unwrap();
        assert_eq!(map.len(), 1);
        assert_eq!(map["u"].position(), Point::new(2.0, 2.0));
    }

    #[test]
    fn test_withdraw_removes_cursor() {
        let channel = PresenceChannel::new(Arc::new(MemoryPresenceStore::new()));
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let _sub = channel
            .subscribe("room", move |map: PresenceMap| sink.lock().unwrap().push(map))
            .unwrap();

        block_on(channel.publish("room", "u", cursor(1.0, 1.0, 1))).unwrap();
        block_on(channel.publish("room", "v", cursor(3.0, 3.0, 1))).unwrap();
        block_on(channel.withdraw("room", "u")).unwrap();

        let seen = seen.lock().unwrap();
        let last = seen.last().unwrap();
        assert_eq!(last.keys().cloned().collect::<Vec<_>>(), vec!["v"]);
        assert_eq!(seen.len(), 4);
    }

    #[test]
    fn test_visible_cursors_excludes_self_and_stale() {
        let mut map = PresenceMap::new();
        map.insert("me".to_string(), cursor(0.0, 0.0, 1_000));
        map.insert("fresh".to_string(), cursor(0.0, 0.0, 9_500));
        map.insert("old".to_string(), cursor(0.0, 0.0, 1_000));

        let all = visible_cursors(&map, "me", None, 10_000);
        assert_eq!(all.keys().cloned().collect::<Vec<_>>(), vec!["fresh", "old"]);

        let recent = visible_cursors(&map, "me", Some(Duration::from_secs(5)), 10_000);
        assert_eq!(recent.keys().cloned().collect::<Vec<_>>(), vec!["fresh"]);
    }
}
