//! Presence directory.
//!
//! Process-wide map from identity to its current connection. Every
//! (re)registration overwrites the previous mapping, so with multiple tabs
//! the most recent registration is the addressable target. Removal is
//! guarded by the connection id: a stale disconnect firing after a newer
//! reconnect must not evict the newer connection.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{mpsc, RwLock};
use tracing::debug;

use palaver_shared::{ConnId, ServerEvent, UserId};

pub type EventSender = mpsc::UnboundedSender<ServerEvent>;

struct Entry {
    conn: ConnId,
    name: String,
    sender: EventSender,
}

/// Concurrency-safe identity -> connection map.
#[derive(Clone, Default)]
pub struct Directory {
    entries: Arc<RwLock<HashMap<UserId, Entry>>>,
}

impl Directory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or re-register) an identity. Last registration wins.
    pub async fn register(&self, identity: UserId, name: String, conn: ConnId, sender: EventSender) {
        let mut entries = self.entries.write().await;
        let replaced = entries
            .insert(identity.clone(), Entry { conn, name, sender })
            .is_some();
        debug!(identity = %identity, replaced, "registered presence");
    }

    /// The currently addressable connection for an identity.
    pub async fn lookup(&self, identity: &UserId) -> Option<EventSender> {
        let entries = self.entries.read().await;
        entries.get(identity).map(|e| e.sender.clone())
    }

    /// Display name recorded at registration time.
    pub async fn lookup_name(&self, identity: &UserId) -> Option<String> {
        let entries = self.entries.read().await;
        entries.get(identity).map(|e| e.name.clone())
    }

    /// Remove an identity's registration, but only if `conn` still matches
    /// the registered connection. Returns whether an entry was removed.
    pub async fn remove(&self, identity: &UserId, conn: ConnId) -> bool {
        let mut entries = self.entries.write().await;
        match entries.get(identity) {
            Some(entry) if entry.conn == conn => {
                entries.remove(identity);
                debug!(identity = %identity, "removed presence");
                true
            }
            Some(_) => {
                debug!(identity = %identity, "ignoring stale disconnect");
                false
            }
            None => false,
        }
    }

    /// Sorted snapshot of every registered identity.
    pub async fn snapshot(&self) -> Vec<UserId> {
        let entries = self.entries.read().await;
        let mut users: Vec<UserId> = entries.keys().cloned().collect();
        users.sort();
        users
    }

    /// Emit the current snapshot to every registered connection. O(n)
    /// fan-out, called whenever the directory changes.
    pub async fn broadcast_presence(&self) {
        let entries = self.entries.read().await;
        let mut users: Vec<UserId> = entries.keys().cloned().collect();
        users.sort();

        for (identity, entry) in entries.iter() {
            let event = ServerEvent::OnlineUsers {
                users: users.clone(),
            };
            if entry.sender.send(event).is_err() {
                debug!(identity = %identity, "presence broadcast to closed connection");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn channel() -> (EventSender, mpsc::UnboundedReceiver<ServerEvent>) {
        mpsc::unbounded_channel()
    }

    #[tokio::test]
    async fn last_registration_wins() {
        let directory = Directory::new();
        let u1 = UserId::new("u1");
        let (tx1, _rx1) = channel();
        let (tx2, mut rx2) = channel();

        let c1 = ConnId::new();
        let c2 = ConnId::new();
        directory.register(u1.clone(), "Ada".into(), c1, tx1).await;
        directory.register(u1.clone(), "Ada".into(), c2, tx2).await;

        let sender = directory.lookup(&u1).await.unwrap();
        sender
            .send(ServerEvent::OnlineUsers { users: vec![] })
            .unwrap();
        assert!(rx2.try_recv().is_ok());
    }

    #[tokio::test]
    async fn stale_disconnect_does_not_evict_newer_connection() {
        let directory = Directory::new();
        let u1 = UserId::new("u1");
        let (tx1, _rx1) = channel();
        let (tx2, _rx2) = channel();

        let old_conn = ConnId::new();
        let new_conn = ConnId::new();
        directory.register(u1.clone(), "Ada".into(), old_conn, tx1).await;
        directory.register(u1.clone(), "Ada".into(), new_conn, tx2).await;

        // The old tab's disconnect fires after the reconnect.
        assert!(!directory.remove(&u1, old_conn).await);
        assert!(directory.lookup(&u1).await.is_some());

        assert!(directory.remove(&u1, new_conn).await);
        assert!(directory.lookup(&u1).await.is_none());
    }

    #[tokio::test]
    async fn broadcast_reflects_registration_and_removal() {
        let directory = Directory::new();
        let u1 = UserId::new("u1");
        let u2 = UserId::new("u2");
        let (tx1, mut rx1) = channel();
        let (tx2, _rx2) = channel();

        let c1 = ConnId::new();
        let c2 = ConnId::new();
        directory.register(u1.clone(), "Ada".into(), c1, tx1).await;
        directory.register(u2.clone(), "Grace".into(), c2, tx2).await;

        directory.broadcast_presence().await;
        match rx1.try_recv().unwrap() {
            ServerEvent::OnlineUsers { users } => {
                assert_eq!(users, vec![u1.clone(), u2.clone()]);
            }
            other => panic!("unexpected event: {other:?}"),
        }

        directory.remove(&u2, c2).await;
        directory.broadcast_presence().await;
        match rx1.try_recv().unwrap() {
            ServerEvent::OnlineUsers { users } => {
                assert_eq!(users, vec![u1.clone()]);
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }
}
