//! Connection manager for prediction WebSocket sessions.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

pub type SessionId = Uuid;

/// An accepted WebSocket session.
#[derive(Debug, Clone)]
pub struct Session {
    pub id: SessionId,
    /// Origin header the client connected with.
    pub origin: String,
    /// When the session was accepted.
    pub connected_at: DateTime<Utc>,
}

/// Tracks open WebSocket sessions.
///
/// Membership only; messages are written directly by each session's task.
#[derive(Debug, Default)]
pub struct ConnectionManager {
    sessions: RwLock<HashMap<SessionId, Session>>,
}

impl ConnectionManager {
    pub fn new() -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Register an accepted session and return its id.
    pub async fn connect(&self, origin: impl Into<String>) -> SessionId {
        let session = Session {
            id: Uuid::new_v4(),
            origin: origin.into(),
            connected_at: Utc::now(),
        };
        let id = session.id;
        self.sessions.write().await.insert(id, session);
        tracing::debug!(session_id = %id, "WebSocket session registered");
        id
    }

    /// Remove a session. Unknown ids are ignored.
    pub async fn disconnect(&self, id: &SessionId) -> Option<Session> {
        let removed = self.sessions.write().await.remove(id);
        if removed.is_some() {
            tracing::debug!(session_id = %id, "WebSocket session removed");
        }
        removed
    }

    pub async fn is_connected(&self, id: &SessionId) -> bool {
        self.sessions.read().await.contains_key(id)
    }

    /// Number of open sessions.
    pub async fn count(&self) -> usize {
        self.sessions.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_connect_and_disconnect() {
        let manager = ConnectionManager::new();
        assert_eq!(manager.count().await, 0);

        let id = manager.connect("http://localhost:3000").await;
        assert_eq!(manager.count().await, 1);
        assert!(manager.is_connected(&id).await);

        let session = manager.disconnect(&id).await.unwrap();
        assert_eq!(session.origin, "http://localhost:3000");
        assert_eq!(manager.count().await, 0);
        assert!(!manager.is_connected(&id).await);
    }

    #[tokio::test]
    async fn test_disconnect_unknown_is_noop() {
        let manager = ConnectionManager::new();
        let _id = manager.connect("http://localhost:3000").await;

        assert!(manager.disconnect(&Uuid::new_v4()).await.is_none());
        assert_eq!(manager.count().await, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_connect_disconnect() {
        let manager = Arc::new(ConnectionManager::new());

        let tasks: Vec<_> = (0..50)
            .map(|i| {
                let manager = manager.clone();
                tokio::spawn(async move {
                    let id = manager.connect(format!("http://client-{}", i)).await;
                    tokio::task::yield_now().await;
                    manager.disconnect(&id).await
                })
            })
            .collect();

        for task in tasks {
            assert!(task.await.unwrap().is_some());
        }
        assert_eq!(manager.count().await, 0);
    }
}
