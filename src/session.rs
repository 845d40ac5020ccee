//! Conversation identity management.
//!
//! The session manager mints the [`Session`] consumed by the stream
//! controller. It knows nothing about networking or retries.

use std::sync::atomic::{AtomicU64, Ordering};

use time::OffsetDateTime;

use crate::error::{Error, Result};
use crate::types::Session;

static SESSION_SEQUENCE: AtomicU64 = AtomicU64::new(0);

/// Creates and inspects conversation sessions.
#[derive(Debug, Default)]
pub struct SessionManager;

impl SessionManager {
    /// Creates a new active session.
    ///
    /// Sessions exist only to drive streaming turns, so creation fails with
    /// an initialization error when no async runtime is ambient to drive
    /// them.
    pub fn create() -> Result<Session> {
        tokio::runtime::Handle::try_current().map_err(|_| {
            Error::initialization("no async runtime available to drive streaming turns")
        })?;
        let seq = SESSION_SEQUENCE.fetch_add(1, Ordering::Relaxed);
        let created_at = OffsetDateTime::now_utc();
        Ok(Session {
            id: format!("session-{}-{seq}", created_at.unix_timestamp()),
            created_at,
            active: true,
        })
    }

    /// Returns true if the session can still start turns.
    pub fn is_active(session: &Session) -> bool {
        session.is_active()
    }
}
