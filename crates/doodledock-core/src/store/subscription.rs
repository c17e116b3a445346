//! Subscription handles and the per-room listener registry behind them.

use super::{StoreError, StoreResult};
use std::borrow::Cow;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

/// Callback invoked with the full current state of a room.
pub type Listener<P> = Arc<dyn Fn(&P) + Send + Sync>;

/// Handle for an active subscription.
///
/// Dropping the handle (or calling [`Subscription::cancel`]) unregisters the
/// listener; no callback runs after cancellation returns.
#[must_use = "dropping a Subscription cancels it immediately"]
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl Subscription {
    /// Create a subscription that runs `cancel` once when disposed.
    pub fn new(cancel: impl FnOnce() + Send + Sync + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    /// Stop further callbacks.
    pub fn cancel(mut self) {
        self.dispose();
    }

    fn dispose(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.cancel.is_some())
            .finish()
    }
}

/// Delivery bookkeeping for one listener.
struct Delivery<T> {
    /// Revision last handed to the callback.
    delivered: Option<u64>,
    /// Set while a callback for this listener is running.
    busy: bool,
    /// Newest state that arrived while busy; the running deliverer hands it
    /// over once its callback returns.
    pending: Option<(u64, T)>,
}

impl<T> Delivery<T> {
    fn is_stale(&self, revision: u64) -> bool {
        self.delivered.is_some_and(|last| last >= revision)
            || self.pending.as_ref().is_some_and(|(last, _)| *last >= revision)
    }
}

struct Entry<P: ?Sized + ToOwned> {
    id: u64,
    delivery: Arc<Mutex<Delivery<P::Owned>>>,
    listener: Listener<P>,
}

impl<P: ?Sized + ToOwned> Clone for Entry<P> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            delivery: Arc::clone(&self.delivery),
            listener: Arc::clone(&self.listener),
        }
    }
}

struct Table<P: ?Sized + ToOwned> {
    next_id: u64,
    rooms: HashMap<String, Vec<Entry<P>>>,
}

/// Listeners grouped by room.
pub(crate) struct Listeners<P: ?Sized + ToOwned> {
    table: Arc<Mutex<Table<P>>>,
}

impl<P: ?Sized + ToOwned> Default for Listeners<P> {
    fn default() -> Self {
        Self {
            table: Arc::new(Mutex::new(Table {
                next_id: 0,
                rooms: HashMap::new(),
            })),
        }
    }
}

impl<P> Listeners<P>
where
    P: ?Sized + ToOwned + 'static,
    P::Owned: Send + 'static,
{
    /// Register a listener for `room`.
    ///
    /// The caller is expected to deliver the current state right after
    /// registering, through [`Listeners::deliver_to`].
    pub fn add(&self, room: &str, listener: Listener<P>) -> StoreResult<(Subscription, u64)> {
        let mut table = self
            .table
            .lock()
            .map_err(|e| StoreError::Lock(e.to_string()))?;
        let id = table.next_id;
        table.next_id += 1;
        table.rooms.entry(room.to_string()).or_default().push(Entry {
            id,
            delivery: Arc::new(Mutex::new(Delivery {
                delivered: None,
                busy: false,
                pending: None,
            })),
            listener,
        });

        let weak: Weak<Mutex<Table<P>>> = Arc::downgrade(&self.table);
        let room = room.to_string();
        let subscription = Subscription::new(move || {
            let Some(table) = weak.upgrade() else {
                return;
            };
            let mut table = lock(&table);
            if let Some(entries) = table.rooms.get_mut(&room) {
                entries.retain(|entry| entry.id != id);
                if entries.is_empty() {
                    table.rooms.remove(&room);
                }
            }
        });
        Ok((subscription, id))
    }

    /// Deliver `payload` at `revision` to every listener of `room`.
    pub fn notify(&self, room: &str, revision: u64, payload: &P) {
        for entry in self.entries(room) {
            Self::deliver(&entry, revision, payload);
        }
    }

    /// Deliver `payload` at `revision` to one listener only.
    pub fn deliver_to(&self, room: &str, id: u64, revision: u64, payload: &P) {
        if let Some(entry) = self.entries(room).into_iter().find(|e| e.id == id) {
            Self::deliver(&entry, revision, payload);
        }
    }

    /// Number of live listeners for `room`.
    pub fn count(&self, room: &str) -> usize {
        self.table
            .lock()
            .map(|table| table.rooms.get(room).map_or(0, Vec::len))
            .unwrap_or(0)
    }

    // Callbacks run outside the table lock so they may subscribe, cancel or
    // write to the store.
    fn entries(&self, room: &str) -> Vec<Entry<P>> {
        match self.table.lock() {
            Ok(table) => table.rooms.get(room).cloned().unwrap_or_default(),
            Err(e) => {
                log::error!("Listener table poisoned: {}", e);
                Vec::new()
            }
        }
    }

    // Deliveries to one listener never overlap or go backwards. A delivery
    // that arrives while the callback runs (from another thread, or from the
    // callback itself writing to the store) is parked and drained by the
    // running deliverer, newest wins.
    fn deliver(entry: &Entry<P>, revision: u64, payload: &P) {
        {
            let mut delivery = lock(&entry.delivery);
            if delivery.is_stale(revision) {
                return;
            }
            if delivery.busy {
                delivery.pending = Some((revision, payload.to_owned()));
                return;
            }
            delivery.busy = true;
        }

        let mut current = (revision, Cow::Borrowed(payload));
        loop {
            (entry.listener)(&*current.1);
            let mut delivery = lock(&entry.delivery);
            delivery.delivered = Some(current.0);
            match delivery.pending.take() {
                Some((next, state)) if next > current.0 => current = (next, Cow::Owned(state)),
                _ => {
                    delivery.busy = false;
                    return;
                }
            }
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
