use super::Session;
use moka::sync::Cache;
use std::{sync::Arc, time::Duration};
use uuid::Uuid;

type SharedSession = Arc<tokio::sync::Mutex<Session>>;

/// In-process sessions keyed by the id the caller keeps in a cookie.
///
/// Every session sits behind an async mutex, so requests of the same
/// caller are processed one at a time. A session not accessed for `ttl`
/// is evicted.
#[derive(Clone)]
pub struct SessionStore {
    sessions: Cache<Uuid, SharedSession>,
}

impl SessionStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            sessions: Cache::builder().time_to_idle(ttl).build(),
        }
    }

    /// Returns the session with the given id, or a new one if the id is
    /// unknown or expired.
    pub fn get_or_create(&self, id: Option<Uuid>) -> (Uuid, SharedSession) {
        if let Some(id) = id {
            if let Some(session) = self.sessions.get(&id) {
                return (id, session);
            }
        }

        let id = Uuid::new_v4();
        let session = SharedSession::default();
        self.sessions.insert(id, session.clone());
        tracing::debug!(session_id = %id, "new session created");
        (id, session)
    }
}
