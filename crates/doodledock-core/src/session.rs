//! One client's drawing session: the surface the UI layer talks to.
//!
//! Ties the drawing engine, the local board view and its undo history to
//! the sync and presence channels of the joined room. Store callbacks only
//! queue snapshots; the host's event loop applies them with
//! [`DrawingSession::poll_remote`], so all session state is touched from a
//! single thread.

use crate::actions::Action;
use crate::board::BoardView;
use crate::color::BoardColor;
use crate::config::DrawingSessionConfig;
use crate::history::{LocalHistory, UndoPolicy};
use crate::presence::{CursorState, Identity, PresenceChannel, PresenceMap, now_millis, visible_cursors};
use crate::store::{PresenceStore, RoomStore, Subscription};
use crate::sync::{AppendMode, SyncChannel, SyncError, SyncResult};
use crate::tools::{DrawingEngine, GestureFeedback, ToolKind};
use kurbo::Point;
use std::sync::Arc;
use std::sync::mpsc::{Receiver, Sender, channel};

/// Called with the full action view and the background whenever the view
/// changes by anything other than a local commit.
pub type RenderCallback = Box<dyn FnMut(&[Action], BoardColor)>;

/// Snapshot queued by a store callback.
enum RemoteEvent {
    Actions { room: String, actions: Vec<Action> },
    Presence { room: String, cursors: PresenceMap },
}

/// Subscriptions held while a room is open.
struct JoinedRoom {
    id: String,
    _actions: Subscription,
    _presence: Subscription,
}

/// A client's view of one whiteboard room.
pub struct DrawingSession<S: RoomStore, P: PresenceStore> {
    identity: Identity,
    config: DrawingSessionConfig,
    engine: DrawingEngine,
    view: BoardView,
    history: LocalHistory,
    sync: SyncChannel<S>,
    presence: PresenceChannel<P>,
    room: Option<JoinedRoom>,
    events_tx: Sender<RemoteEvent>,
    events_rx: Receiver<RemoteEvent>,
    cursors: PresenceMap,
    on_render: Option<RenderCallback>,
    notice: Option<SyncError>,
}

impl<S: RoomStore, P: PresenceStore> DrawingSession<S, P> {
    /// Create a session for `identity` with default settings.
    pub fn new(identity: Identity, rooms: Arc<S>, presence: Arc<P>) -> Self {
        let (events_tx, events_rx) = channel();
        Self {
            identity,
            config: DrawingSessionConfig::default(),
            engine: DrawingEngine::new(),
            view: BoardView::new(),
            history: LocalHistory::new(),
            sync: SyncChannel::new(rooms),
            presence: PresenceChannel::new(presence),
            room: None,
            events_tx,
            events_rx,
            cursors: PresenceMap::new(),
            on_render: None,
            notice: None,
        }
    }

    pub fn with_config(mut self, config: DrawingSessionConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_append_mode(mut self, mode: AppendMode) -> Self {
        self.sync = self.sync.with_mode(mode);
        self
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn config(&self) -> &DrawingSessionConfig {
        &self.config
    }

    /// Id of the joined room, if any.
    pub fn room(&self) -> Option<&str> {
        self.room.as_ref().map(|room| room.id.as_str())
    }

    /// Actions currently shown, in paint order.
    pub fn actions(&self) -> &[Action] {
        self.view.actions()
    }

    pub fn engine(&self) -> &DrawingEngine {
        &self.engine
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    // --- Room lifecycle ---

    /// Open `room`, leaving any room open before.
    ///
    /// The room's current log is applied (and rendered) before this returns.
    pub fn join(&mut self, room: &str) -> SyncResult<()> {
        self.leave();

        let user = self.identity.user_id.clone();
        let tx = self.events_tx.clone();
        let room_id = room.to_string();
        let actions = self.sync.subscribe(room, &user, move |actions| {
            let _ = tx.send(RemoteEvent::Actions {
                room: room_id.clone(),
                actions,
            });
        })?;

        let tx = self.events_tx.clone();
        let room_id = room.to_string();
        let presence = self.presence.subscribe(room, move |cursors| {
            let _ = tx.send(RemoteEvent::Presence {
                room: room_id.clone(),
                cursors,
            });
        })?;

        log::debug!("Joined room {}", room);
        self.room = Some(JoinedRoom {
            id: room.to_string(),
            _actions: actions,
            _presence: presence,
        });
        self.poll_remote();
        Ok(())
    }

    /// Close the current room and dispose its subscriptions.
    pub fn leave(&mut self) {
        if let Some(room) = self.room.take() {
            log::debug!("Left room {}", room.id);
        }
        // Snapshots still queued belong to the room just closed.
        while self.events_rx.try_recv().is_ok() {}
        self.engine.cancel();
        self.view.clear();
        self.history.reset();
        self.cursors.clear();
    }

    /// Apply every snapshot delivered since the last call.
    ///
    /// Returns the number of action snapshots applied. Renders once if any
    /// were applied.
    pub fn poll_remote(&mut self) -> usize {
        let Some(current) = self.room.as_ref().map(|room| room.id.clone()) else {
            while self.events_rx.try_recv().is_ok() {}
            return 0;
        };

        let mut applied = 0;
        while let Ok(event) = self.events_rx.try_recv() {
            match event {
                RemoteEvent::Actions { room, actions } if room == current => {
                    let shown = self.history.reconcile(actions, self.config.undo_policy);
                    self.view.replace(shown);
                    applied += 1;
                }
                RemoteEvent::Presence { room, cursors } if room == current => {
                    self.cursors = cursors;
                }
                _ => {}
            }
        }
        if applied > 0 {
            self.emit_render();
        }
        applied
    }

    // --- Gestures ---

    /// Pointer-down with the current tool.
    pub fn start_gesture(&mut self, point: Point) -> GestureFeedback {
        self.engine.start_gesture(point, &self.config)
    }

    /// Pointer-move.
    pub fn update_pointer(&mut self, point: Point) -> GestureFeedback {
        self.engine.update_pointer(point)
    }

    /// Pointer-up. Commits the gesture's action, if it produced one.
    ///
    /// The action stays in the local view even when propagation fails; the
    /// failure is kept as a notice.
    pub async fn commit_gesture(&mut self) -> Option<Action> {
        match self.engine.commit_gesture() {
            Ok(action) => {
                self.commit(action.clone()).await;
                Some(action)
            }
            Err(e) => {
                log::debug!("Discarded gesture: {}", e);
                None
            }
        }
    }

    /// Submit text for the pending insertion point.
    pub async fn submit_text(&mut self, content: &str) -> Option<Action> {
        match self.engine.submit_text(content, &self.config) {
            Ok(action) => {
                self.commit(action.clone()).await;
                Some(action)
            }
            Err(e) => {
                log::debug!("Discarded text: {}", e);
                None
            }
        }
    }

    /// Abandon the current gesture.
    pub fn cancel_gesture(&mut self) {
        self.engine.cancel();
    }

    async fn commit(&mut self, action: Action) {
        // Already on the canvas from incremental painting; no render here.
        self.view.push(action.clone());
        self.history.record_commit();

        let Some(room) = self.room().map(str::to_string) else {
            self.report(SyncError::NotJoined);
            return;
        };
        let result = self.sync.append(&room, &self.identity.user_id, &action).await;
        if let Err(e) = result {
            self.report(e);
        }
    }

    // --- Undo/redo ---

    /// Hide the topmost action locally. The shared log is not touched.
    pub fn undo(&mut self) -> bool {
        let changed = self.history.undo(&mut self.view);
        if changed {
            self.emit_render();
        }
        changed
    }

    /// Restore the most recently undone action locally.
    pub fn redo(&mut self) -> bool {
        let changed = self.history.redo(&mut self.view);
        if changed {
            self.emit_render();
        }
        changed
    }

    // --- Board ---

    /// Empty the board locally and in the shared log.
    pub async fn clear_board(&mut self) {
        self.engine.cancel();
        self.view.clear();
        self.history.reset();
        self.emit_render();

        let Some(room) = self.room().map(str::to_string) else {
            self.report(SyncError::NotJoined);
            return;
        };
        let result = self.sync.clear(&room, &self.identity.user_id).await;
        if let Err(e) = result {
            self.report(e);
        }
    }

    // --- Presence ---

    /// Publish this user's cursor at `point` with the current tool label.
    pub async fn move_cursor(&mut self, point: Point) {
        let Some(room) = self.room().map(str::to_string) else {
            return;
        };
        let cursor = CursorState::new(point, self.config.tool.label(), self.identity.display_name.clone());
        let result = self.presence.publish(&room, &self.identity.user_id, cursor).await;
        if let Err(e) = result {
            self.report(e);
        }
    }

    /// Other users' cursors, filtered by the configured TTL.
    pub fn cursors(&self) -> PresenceMap {
        visible_cursors(
            &self.cursors,
            &self.identity.user_id,
            self.config.presence_ttl,
            now_millis(),
        )
    }

    // --- Settings ---

    /// Switch tools. Any gesture in progress is abandoned.
    pub fn set_tool(&mut self, tool: ToolKind) {
        if self.config.tool != tool {
            self.engine.cancel();
            self.config.tool = tool;
        }
    }

    /// Switch tools and re-announce this user's cursor at `at` so others see
    /// the new tool label without waiting for the pointer to move.
    pub async fn switch_tool(&mut self, tool: ToolKind, at: Point) {
        self.set_tool(tool);
        self.move_cursor(at).await;
    }

    pub fn set_color(&mut self, color: BoardColor) {
        self.config.color = color;
    }

    /// Set the pen size, clamped to the supported range.
    pub fn set_stroke_width(&mut self, width: f64) {
        self.config.set_stroke_width(width);
    }

    /// Change the canvas background and repaint.
    ///
    /// Eraser strokes keep the color they were drawn with, so content they
    /// covered stays hidden.
    pub fn set_canvas_background(&mut self, background: BoardColor) {
        if self.config.background != background {
            self.config.background = background;
            self.emit_render();
        }
    }

    pub fn set_undo_policy(&mut self, policy: UndoPolicy) {
        self.config.undo_policy = policy;
    }

    // --- Host integration ---

    /// Install the render callback.
    pub fn set_render_callback(&mut self, callback: impl FnMut(&[Action], BoardColor) + 'static) {
        self.on_render = Some(Box::new(callback));
    }

    /// Take the pending transient error, if any.
    pub fn take_notice(&mut self) -> Option<SyncError> {
        self.notice.take()
    }

    fn report(&mut self, err: SyncError) {
        log::error!("{}", err);
        self.notice = Some(err);
    }

    fn emit_render(&mut self) {
        if let Some(callback) = self.on_render.as_mut() {
            callback(self.view.actions(), self.config.background);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::Stroke;
    use crate::store::{MemoryPresenceStore, MemoryRoomStore, block_on};
    use std::cell::RefCell;
    use std::rc::Rc;

    type Session = DrawingSession<MemoryRoomStore, MemoryPresenceStore>;

    struct Fixture {
        rooms: Arc<MemoryRoomStore>,
        presence: Arc<MemoryPresenceStore>,
        room: String,
    }

    impl Fixture {
        fn new() -> Self {
            let rooms = Arc::new(MemoryRoomStore::new());
            let room = rooms.create_room("board", false, "alice").unwrap().id;
            Self {
                rooms,
                presence: Arc::new(MemoryPresenceStore::new()),
                room,
            }
        }

        fn session(&self, user: &str) -> Session {
            let identity = Identity::from_email(user, Some(&format!("{}@example.com", user)));
            let mut session = DrawingSession::new(identity, Arc::clone(&self.rooms), Arc::clone(&self.presence));
            session.join(&self.room).unwrap();
            session
        }
    }

    fn renders(session: &mut Session) -> Rc<RefCell<Vec<usize>>> {
        let log = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&log);
        session.set_render_callback(move |actions, _| sink.borrow_mut().push(actions.len()));
        log
    }

    fn draw_stroke(session: &mut Session, from: (f64, f64), to: (f64, f64)) -> Option<Action> {
        session.start_gesture(Point::new(from.0, from.1));
        session.update_pointer(Point::new(to.0, to.1));
        block_on(session.commit_gesture())
    }

    #[test]
    fn test_commit_propagates_without_render() {
        let fixture = Fixture::new();
        let mut alice = fixture.session("alice");
        let mut bob = fixture.session("bob");
        let alice_renders = renders(&mut alice);

        let action = draw_stroke(&mut alice, (0.0, 0.0), (10.0, 10.0)).unwrap();
        assert_eq!(alice.actions(), &[action.clone()]);
        assert!(alice_renders.borrow().is_empty());

        assert_eq!(bob.poll_remote(), 1);
        assert_eq!(bob.actions(), &[action]);
    }

    #[test]
    fn test_read_modify_write_session_appends() {
        let fixture = Fixture::new();
        let identity = Identity::from_email("alice", Some("alice@example.com"));
        let mut alice = DrawingSession::new(identity, Arc::clone(&fixture.rooms), Arc::clone(&fixture.presence))
            .with_append_mode(AppendMode::ReadModifyWrite);
        alice.join(&fixture.room).unwrap();

        draw_stroke(&mut alice, (0.0, 0.0), (4.0, 4.0)).unwrap();
        draw_stroke(&mut alice, (4.0, 4.0), (8.0, 0.0)).unwrap();

        let snapshot = block_on(fixture.rooms.get(&fixture.room)).unwrap();
        assert_eq!(snapshot.actions.len(), 2);
        assert_eq!(alice.actions().len(), 2);
    }

    #[test]
    fn test_join_seeds_existing_log() {
        let fixture = Fixture::new();
        let mut alice = fixture.session("alice");
        draw_stroke(&mut alice, (0.0, 0.0), (5.0, 5.0)).unwrap();

        let bob = fixture.session("bob");
        assert_eq!(bob.actions().len(), 1);
    }

    #[test]
    fn test_single_point_stroke_not_committed() {
        let fixture = Fixture::new();
        let mut alice = fixture.session("alice");
        alice.start_gesture(Point::new(1.0, 1.0));
        assert!(block_on(alice.commit_gesture()).is_none());
        assert!(alice.actions().is_empty());
        assert!(block_on(fixture.rooms.get(&fixture.room)).unwrap().actions.is_empty());
    }

    #[test]
    fn test_eraser_commits_background_stroke() {
        let fixture = Fixture::new();
        let mut alice = fixture.session("alice");
        alice.set_tool(ToolKind::Eraser);
        let action = draw_stroke(&mut alice, (0.0, 0.0), (3.0, 0.0)).unwrap();
        let Action::Stroke(Stroke { color, width, .. }) = action else {
            panic!("eraser should produce a stroke");
        };
        assert_eq!(color, alice.config().background);
        assert_eq!(width, crate::config::ERASER_WIDTH);
    }

    #[test]
    fn test_undo_redo_render_local_view() {
        let fixture = Fixture::new();
        let mut alice = fixture.session("alice");
        let first = draw_stroke(&mut alice, (0.0, 0.0), (1.0, 1.0)).unwrap();
        let second = draw_stroke(&mut alice, (2.0, 2.0), (3.0, 3.0)).unwrap();
        alice.poll_remote();
        let log = renders(&mut alice);

        assert!(alice.undo());
        assert_eq!(alice.actions(), &[first.clone()]);
        assert!(alice.redo());
        assert_eq!(alice.actions(), &[first, second]);
        assert!(!alice.redo());
        assert_eq!(*log.borrow(), vec![1, 2]);

        // The shared log was never touched.
        assert_eq!(block_on(fixture.rooms.get(&fixture.room)).unwrap().actions.len(), 2);
    }

    #[test]
    fn test_remote_update_reintroduces_undone_action() {
        let fixture = Fixture::new();
        let mut alice = fixture.session("alice");
        let mut bob = fixture.session("bob");
        draw_stroke(&mut alice, (0.0, 0.0), (1.0, 1.0)).unwrap();
        alice.poll_remote();

        alice.undo();
        assert!(alice.actions().is_empty());

        draw_stroke(&mut bob, (5.0, 5.0), (6.0, 6.0)).unwrap();
        alice.poll_remote();
        assert_eq!(alice.actions().len(), 2);
    }

    #[test]
    fn test_masked_policy_keeps_undo() {
        let fixture = Fixture::new();
        let mut alice = fixture.session("alice");
        alice.set_undo_policy(UndoPolicy::Masked);
        let mut bob = fixture.session("bob");
        draw_stroke(&mut alice, (0.0, 0.0), (1.0, 1.0)).unwrap();
        alice.poll_remote();
        alice.undo();

        let theirs = draw_stroke(&mut bob, (5.0, 5.0), (6.0, 6.0)).unwrap();
        alice.poll_remote();
        assert_eq!(alice.actions(), &[theirs]);
        assert!(alice.can_redo());
    }

    #[test]
    fn test_clear_board_reaches_subscribers() {
        let fixture = Fixture::new();
        let mut alice = fixture.session("alice");
        let mut bob = fixture.session("bob");
        for i in 0..3 {
            let x = i as f64 * 10.0;
            draw_stroke(&mut alice, (x, 0.0), (x + 5.0, 5.0)).unwrap();
        }
        bob.poll_remote();
        assert_eq!(bob.actions().len(), 3);
        let bob_renders = renders(&mut bob);

        block_on(alice.clear_board());
        assert!(alice.actions().is_empty());
        assert_eq!(bob.poll_remote(), 1);
        assert!(bob.actions().is_empty());
        assert_eq!(*bob_renders.borrow(), vec![0]);
    }

    #[test]
    fn test_failed_append_keeps_local_action() {
        let fixture = Fixture::new();
        let mut alice = fixture.session("alice");
        fixture.rooms.set_offline(true);

        let action = draw_stroke(&mut alice, (0.0, 0.0), (1.0, 1.0)).unwrap();
        assert_eq!(alice.actions(), &[action]);
        assert!(matches!(alice.take_notice(), Some(SyncError::Network(_))));
        assert!(alice.take_notice().is_none());
    }

    #[test]
    fn test_commit_outside_room_reports_not_joined() {
        let fixture = Fixture::new();
        let mut alice = fixture.session("alice");
        alice.leave();
        draw_stroke(&mut alice, (0.0, 0.0), (1.0, 1.0)).unwrap();
        assert_eq!(alice.take_notice(), Some(SyncError::NotJoined));
    }

    #[test]
    fn test_private_room_join_denied() {
        let fixture = Fixture::new();
        let secret = fixture.rooms.create_room("secret", true, "alice").unwrap();
        let mut bob = fixture.session("bob");
        assert!(matches!(bob.join(&secret.id), Err(SyncError::PermissionDenied(_))));
        assert!(bob.room().is_none());

        fixture.rooms.join_by_code(&secret.code, "bob").unwrap();
        bob.join(&secret.id).unwrap();
        assert_eq!(bob.room(), Some(secret.id.as_str()));
    }

    #[test]
    fn test_leave_stops_updates() {
        let fixture = Fixture::new();
        let mut alice = fixture.session("alice");
        let mut bob = fixture.session("bob");
        bob.leave();
        assert_eq!(fixture.rooms.subscriber_count(&fixture.room), 1);

        draw_stroke(&mut alice, (0.0, 0.0), (1.0, 1.0)).unwrap();
        assert_eq!(bob.poll_remote(), 0);
        assert!(bob.actions().is_empty());
    }

    #[test]
    fn test_cursors_exclude_self() {
        let fixture = Fixture::new();
        let mut alice = fixture.session("alice");
        let mut bob = fixture.session("bob");

        block_on(alice.move_cursor(Point::new(4.0, 2.0)));
        block_on(bob.switch_tool(ToolKind::Circle, Point::new(1.0, 1.0)));
        alice.poll_remote();
        bob.poll_remote();

        let seen_by_alice = alice.cursors();
        assert_eq!(seen_by_alice.len(), 1);
        assert_eq!(seen_by_alice["bob"].tool_label, "Circle");
        assert_eq!(seen_by_alice["bob"].display_name, "bob");

        let seen_by_bob = bob.cursors();
        assert_eq!(seen_by_bob["alice"].position(), Point::new(4.0, 2.0));
    }

    #[test]
    fn test_background_change_renders() {
        let fixture = Fixture::new();
        let mut alice = fixture.session("alice");
        let log = renders(&mut alice);
        alice.set_canvas_background(BoardColor::white());
        alice.set_canvas_background(BoardColor::white());
        assert_eq!(*log.borrow(), vec![0]);
    }

    #[test]
    fn test_text_flow() {
        let fixture = Fixture::new();
        let mut alice = fixture.session("alice");
        alice.set_tool(ToolKind::Text);
        assert_eq!(
            alice.start_gesture(Point::new(3.0, 4.0)),
            GestureFeedback::Positioned(Point::new(3.0, 4.0))
        );
        assert!(block_on(alice.submit_text("   ")).is_none());
        let action = block_on(alice.submit_text("hello")).unwrap();
        assert_eq!(action.kind(), "text");
        assert_eq!(alice.actions().len(), 1);
    }
}
