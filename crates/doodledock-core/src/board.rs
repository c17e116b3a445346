//! The local client's view of a room's action sequence.

use crate::actions::Action;

/// Ordered actions as this client currently shows them.
///
/// Usually equal to the room's shared log, but may run ahead of it
/// (optimistic commits) or behind it (local undo) until the next snapshot.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BoardView {
    actions: Vec<Action>,
}

impl BoardView {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a view seeded with an existing sequence.
    pub fn from_actions(actions: Vec<Action>) -> Self {
        Self { actions }
    }

    /// Actions in paint order (oldest first).
    pub fn actions(&self) -> &[Action] {
        &self.actions
    }

    /// Append an action on top of the board.
    pub fn push(&mut self, action: Action) {
        self.actions.push(action);
    }

    /// Remove and return the topmost action.
    pub fn pop(&mut self) -> Option<Action> {
        self.actions.pop()
    }

    /// Replace the whole sequence, e.g. with a remote snapshot.
    pub fn replace(&mut self, actions: Vec<Action>) {
        self.actions = actions;
    }

    pub fn clear(&mut self) {
        self.actions.clear();
    }

    pub fn last(&self) -> Option<&Action> {
        self.actions.last()
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}
