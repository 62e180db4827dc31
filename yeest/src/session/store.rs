//! Session model and its single-writer store.
//!
//! The store wraps a `tokio::sync::watch` channel: the controller is the only
//! writer, and any number of presentation readers hold receivers that always
//! see the latest snapshot.

use tokio::sync::watch;
use uuid::Uuid;

use super::turn::Turn;

/// The conversation plus transient UI flags.
#[derive(Debug, Clone)]
pub struct Session {
    id: Uuid,
    turns: Vec<Turn>,
    pending: bool,
    last_error: Option<String>,
}

impl Session {
    /// Create an empty session with a fresh id.
    pub fn new() -> Self {
        Self {
            id: Uuid::now_v7(),
            turns: Vec::new(),
            pending: false,
            last_error: None,
        }
    }

    /// Identifier regenerated on every reset.
    pub const fn id(&self) -> Uuid {
        self.id
    }

    /// Turns in chronological (and display) order.
    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    /// Whether a question is currently in flight.
    pub const fn is_pending(&self) -> bool {
        self.pending
    }

    /// Banner text for the most recent failure, if not yet cleared.
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub(crate) fn push(&mut self, turn: Turn) {
        self.turns.push(turn);
    }

    pub(crate) fn set_pending(&mut self, pending: bool) {
        self.pending = pending;
    }

    pub(crate) fn set_last_error(&mut self, error: Option<String>) {
        self.last_error = error;
    }

    /// Drop all turns and the banner, and start a new epoch.
    /// `pending` is left alone: an in-flight request still owns it.
    pub(crate) fn clear(&mut self) {
        self.id = Uuid::now_v7();
        self.turns.clear();
        self.last_error = None;
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

/// Holder of the one live [`Session`].
pub struct SessionStore {
    tx: watch::Sender<Session>,
}

impl SessionStore {
    /// Create a store holding an empty session.
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(Session::new());
        Self { tx }
    }

    /// Read-only view that is notified after every mutation.
    pub fn subscribe(&self) -> watch::Receiver<Session> {
        self.tx.subscribe()
    }

    /// Clone of the current state.
    pub fn snapshot(&self) -> Session {
        self.tx.borrow().clone()
    }

    /// Apply a mutation atomically. The closure returns whether it changed
    /// anything; readers are only notified when it did.
    pub(crate) fn modify(&self, f: impl FnOnce(&mut Session) -> bool) -> bool {
        self.tx.send_if_modified(f)
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}
