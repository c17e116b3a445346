//! Local-only undo/redo over the board view.
//!
//! Undo never retracts anything from the shared log. Under the default
//! [`UndoPolicy::Advisory`] the next remote snapshot brings undone actions
//! back into view: eventual consistency wins over local undo.

use crate::actions::Action;
use crate::board::BoardView;
use serde::{Deserialize, Serialize};

/// How locally undone actions interact with incoming remote snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UndoPolicy {
    /// Remote snapshots replace the view as-is; undone actions reappear.
    #[default]
    Advisory,
    /// Undone actions stay hidden across snapshots until redone or cleared.
    Masked,
}

/// Undo/redo stacks for one client session. Never synchronized.
#[derive(Debug, Clone, Default)]
pub struct LocalHistory {
    /// Actions removed by undo, most recent on top. These are what redo restores.
    undone: Vec<Action>,
}

impl LocalHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Move the topmost action of the view onto the undone stack.
    /// Returns false if the view is empty.
    pub fn undo(&mut self, view: &mut BoardView) -> bool {
        match view.pop() {
            Some(action) => {
                self.undone.push(action);
                true
            }
            None => false,
        }
    }

    /// Put the most recently undone action back on top of the view.
    /// Returns false if there is nothing to redo.
    pub fn redo(&mut self, view: &mut BoardView) -> bool {
        match self.undone.pop() {
            Some(action) => {
                view.push(action);
                true
            }
            None => false,
        }
    }

    /// A new action was committed; stale redo entries are dropped.
    pub fn record_commit(&mut self) {
        self.undone.clear();
    }

    /// Forget everything, e.g. after clearing the board or leaving the room.
    pub fn reset(&mut self) {
        self.undone.clear();
    }

    pub fn can_redo(&self) -> bool {
        !self.undone.is_empty()
    }

    pub fn undone(&self) -> &[Action] {
        &self.undone
    }

    /// Turn a remote snapshot into the sequence this client should show.
    pub fn reconcile(&mut self, mut remote: Vec<Action>, policy: UndoPolicy) -> Vec<Action> {
        if policy == UndoPolicy::Advisory {
            return remote;
        }
        // Hide the latest occurrence of each undone action. Entries that are no
        // longer in the shared log (cleared by someone) cannot be redone.
        let mut still_hidden = Vec::with_capacity(self.undone.len());
        for action in self.undone.drain(..) {
            if let Some(pos) = remote.iter().rposition(|a| *a == action) {
                remote.remove(pos);
                still_hidden.push(action);
            }
        }
        self.undone = still_hidden;
        remote
    }
}
