//! Conversation state: turns, citations, and the observable session store.

mod store;
mod turn;

pub use store::{Session, SessionStore};
pub use turn::{HistoryEntry, Provenance, Role, SourceRef, Turn};
