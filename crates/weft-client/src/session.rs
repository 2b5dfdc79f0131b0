//! Session identity.

use std::sync::OnceLock;

use tracing::debug;
use weft_core::SessionId;

/// Holds the session id correlating this process with the server.
///
/// The id is generated on first use and never changes afterwards.
#[derive(Debug, Default)]
pub struct SessionManager {
    id: OnceLock<SessionId>,
}

impl SessionManager {
    /// Manager with no id yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// Manager resuming a known session.
    pub fn with_id(id: SessionId) -> Self {
        Self {
            id: OnceLock::from(id),
        }
    }

    /// The session id, generated on first call.
    pub fn get_or_create_id(&self) -> SessionId {
        self.id
            .get_or_init(|| {
                let id = SessionId::new();
                debug!(session_id = %id, "session created");
                id
            })
            .clone()
    }

    /// The session id if one exists yet.
    pub fn current(&self) -> Option<SessionId> {
        self.id.get().cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn lazily_created_and_stable() {
        let session = SessionManager::new();
        assert!(session.current().is_none());
        let first = session.get_or_create_id();
        assert_eq!(session.get_or_create_id(), first);
        assert_eq!(session.current(), Some(first));
    }

    #[test]
    fn resumed_id_is_kept() {
        let session = SessionManager::with_id("resumed".into());
        assert_eq!(session.get_or_create_id().as_str(), "resumed");
    }

    #[test]
    fn concurrent_callers_see_one_id() {
        let session = Arc::new(SessionManager::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let s = Arc::clone(&session);
                std::thread::spawn(move || s.get_or_create_id())
            })
            .collect();
        let ids: Vec<SessionId> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert!(ids.iter().all(|id| *id == ids[0]));
    }
}
