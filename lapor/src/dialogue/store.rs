//! Per-session dialogue state store.

use dashmap::DashMap;
use uuid::Uuid;

use super::types::{NextAction, Role, Session, SessionId, SlotKey, SlotMap, Turn};
use crate::locale::Locale;

/// Default status filter applied when the user never narrowed it down.
pub const DEFAULT_STATUS_FILTER: [&str; 2] = ["PAID", "CAPTURED"];
/// Default report category.
pub const DEFAULT_REPORT_TYPE: &str = "transaction";
/// Default timezone for schedules.
pub const DEFAULT_TIMEZONE: &str = "Asia/Jakarta";

/// Errors from session store operations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error("session not found: {0}")]
    NotFound(SessionId),
}

/// Injected session state abstraction.
///
/// Implementations must be safe for concurrent access across distinct session
/// keys; mutations of a single session are serialized by the store. Retention
/// is the caller's concern: sessions live until `delete` is called.
pub trait SessionStore: Send + Sync {
    /// Create a session with an empty slot map, the full missing-field list
    /// and `ask_merchant` as the first prompt target.
    fn create(&self, user_id: &str, locale: Locale) -> Session;

    /// Snapshot of a session's current state.
    fn get(&self, id: &str) -> Option<Session>;

    /// Merge a slot delta into the session (later values overwrite earlier
    /// ones) and recompute the missing-field list. Idempotent.
    fn apply_delta(&self, id: &str, delta: &SlotMap) -> Result<(), SessionError>;

    /// Append a turn to the conversation history. No other side effect.
    fn append_turn(&self, id: &str, role: Role, content: &str) -> Result<(), SessionError>;

    /// First missing field's prompt target in fixed priority order, or
    /// `Confirm` when nothing is missing.
    fn compute_next_action(&self, id: &str) -> Result<NextAction, SessionError>;

    /// Fill defaults for unset optional fields into the live slot map, then
    /// check that every hard-required field is present and non-empty.
    fn check_complete(&self, id: &str) -> Result<bool, SessionError>;

    /// Record derived progress on the session.
    fn set_progress(
        &self,
        id: &str,
        next_action: NextAction,
        is_complete: bool,
    ) -> Result<(), SessionError>;

    fn delete(&self, id: &str) -> bool;

    fn list_ids(&self) -> Vec<SessionId>;
}

/// In-memory session store.
///
/// The shard-locked map serializes mutations of one session while letting
/// distinct sessions proceed fully in parallel.
#[derive(Default)]
pub struct InMemorySessionStore {
    sessions: DashMap<SessionId, Session>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStore for InMemorySessionStore {
    fn create(&self, user_id: &str, locale: Locale) -> Session {
        let session = Session::new(Uuid::new_v4().to_string(), user_id, locale);
        self.sessions.insert(session.id.clone(), session.clone());
        session
    }

    fn get(&self, id: &str) -> Option<Session> {
        self.sessions.get(id).map(|s| s.value().clone())
    }

    fn apply_delta(&self, id: &str, delta: &SlotMap) -> Result<(), SessionError> {
        let mut session = self
            .sessions
            .get_mut(id)
            .ok_or_else(|| SessionError::NotFound(id.to_string()))?;
        session.slots.merge(delta);
        let missing = session.slots.missing_fields();
        session.missing_fields = missing;
        Ok(())
    }

    fn append_turn(&self, id: &str, role: Role, content: &str) -> Result<(), SessionError> {
        let mut session = self
            .sessions
            .get_mut(id)
            .ok_or_else(|| SessionError::NotFound(id.to_string()))?;
        session.turns.push(Turn::new(role, content));
        Ok(())
    }

    fn compute_next_action(&self, id: &str) -> Result<NextAction, SessionError> {
        let session = self
            .sessions
            .get(id)
            .ok_or_else(|| SessionError::NotFound(id.to_string()))?;
        let action = SlotKey::TRACKED
            .iter()
            .find(|key| !session.slots.is_filled(**key))
            .map(|key| NextAction::for_field(*key))
            .unwrap_or(NextAction::Confirm);
        Ok(action)
    }

    fn check_complete(&self, id: &str) -> Result<bool, SessionError> {
        let mut session = self
            .sessions
            .get_mut(id)
            .ok_or_else(|| SessionError::NotFound(id.to_string()))?;

        // Defaults land in the live slot map, not just in this check.
        if !session.slots.is_filled(SlotKey::StatusFilter) {
            session.slots.insert(
                SlotKey::StatusFilter,
                DEFAULT_STATUS_FILTER
                    .iter()
                    .map(|s| s.to_string())
                    .collect::<Vec<_>>(),
            );
        }
        if !session.slots.is_filled(SlotKey::ReportType) {
            session.slots.insert(SlotKey::ReportType, DEFAULT_REPORT_TYPE);
        }
        if !session.slots.is_filled(SlotKey::Timezone) {
            session.slots.insert(SlotKey::Timezone, DEFAULT_TIMEZONE);
        }
        let missing = session.slots.missing_fields();
        session.missing_fields = missing;

        Ok(SlotKey::REQUIRED
            .iter()
            .all(|key| session.slots.is_filled(*key)))
    }

    fn set_progress(
        &self,
        id: &str,
        next_action: NextAction,
        is_complete: bool,
    ) -> Result<(), SessionError> {
        let mut session = self
            .sessions
            .get_mut(id)
            .ok_or_else(|| SessionError::NotFound(id.to_string()))?;
        session.next_action = next_action;
        session.is_complete = is_complete;
        Ok(())
    }

    fn delete(&self, id: &str) -> bool {
        self.sessions.remove(id).is_some()
    }

    fn list_ids(&self) -> Vec<SessionId> {
        self.sessions.iter().map(|s| s.id.clone()).collect()
    }
}
