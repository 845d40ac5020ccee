use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// A conversation identity.
///
/// Created once per conversation by the session manager; the stream
/// controller only ever reads it. `active` flips false on explicit teardown.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    /// Unique session identifier.
    pub id: String,

    /// When the session was created.
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,

    /// Whether the session is still usable for new turns.
    pub active: bool,
}

impl Session {
    /// Returns true if the session can still start turns.
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Marks the session as torn down.
    pub fn deactivate(&mut self) {
        self.active = false;
    }
}
