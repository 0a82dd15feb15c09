//! Dialogue session state: slot map, turn history and progress tracking.

mod store;
mod types;

pub use store::{
    InMemorySessionStore, SessionError, SessionStore, DEFAULT_REPORT_TYPE, DEFAULT_STATUS_FILTER,
    DEFAULT_TIMEZONE,
};
pub use types::{NextAction, Role, Session, SessionId, SlotKey, SlotMap, SlotValue, Turn};
