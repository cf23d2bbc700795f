//! Best-effort event relay.
//!
//! Forwards ephemeral events to the connection currently registered for a
//! target identity. There is no acknowledgement and no retry: durability
//! for chat messages comes from the persistence write, not from this
//! channel. If the target is not registered the event is dropped.

use tracing::debug;

use palaver_shared::{ChatMessage, PeerRef, ServerEvent, UserId};

use crate::presence::Directory;

#[derive(Clone)]
pub struct Relay {
    directory: Directory,
}

impl Relay {
    pub fn new(directory: Directory) -> Self {
        Self { directory }
    }

    /// Deliver an event to the registered connection of `to`. Returns
    /// whether a connection was found; a miss is not an error.
    pub async fn deliver(&self, to: &UserId, event: ServerEvent) -> bool {
        match self.directory.lookup(to).await {
            Some(sender) => sender.send(event).is_ok(),
            None => {
                debug!(to = %to, "dropping event for unregistered identity");
                false
            }
        }
    }

    /// Forward an already-persisted message to its recipient, re-addressed
    /// with `from` = the sending identity, and echo it to the sender's own
    /// identity so their other tabs converge on the canonical record.
    pub async fn relay_private(&self, sender: &UserId, mut message: ChatMessage) {
        message.from = sender.clone();

        match message.to.clone() {
            PeerRef::User(recipient) => {
                self.deliver(
                    &recipient,
                    ServerEvent::PrivateReceive {
                        message: message.clone(),
                    },
                )
                .await;

                if recipient != *sender {
                    self.deliver(sender, ServerEvent::PrivateReceive { message })
                        .await;
                }
            }
            PeerRef::Group(group) => {
                // Group fan-out is not a relay concern; members read the
                // conversation from persisted history.
                debug!(group = %group, "dropping relay for group recipient");
                self.deliver(sender, ServerEvent::PrivateReceive { message })
                    .await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use palaver_shared::{ConnId, MessageBody};
    use tokio::sync::mpsc;
    use uuid::Uuid;

    fn text_message(from: &str, to: &str, text: &str) -> ChatMessage {
        ChatMessage {
            id: Uuid::new_v4(),
            from: UserId::new(from),
            to: PeerRef::from_wire(to),
            body: MessageBody::Text {
                text: text.to_string(),
            },
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn delivers_to_recipient_and_echoes_to_sender() {
        let directory = Directory::new();
        let relay = Relay::new(directory.clone());

        let (tx1, mut rx1) = mpsc::unbounded_channel();
        let (tx2, mut rx2) = mpsc::unbounded_channel();
        directory
            .register(UserId::new("u1"), "Ada".into(), ConnId::new(), tx1)
            .await;
        directory
            .register(UserId::new("u2"), "Grace".into(), ConnId::new(), tx2)
            .await;

        relay
            .relay_private(&UserId::new("u1"), text_message("u1", "u2", "hi"))
            .await;

        match rx2.try_recv().unwrap() {
            ServerEvent::PrivateReceive { message } => {
                assert_eq!(message.from, UserId::new("u1"));
                assert_eq!(
                    message.body,
                    MessageBody::Text {
                        text: "hi".to_string()
                    }
                );
            }
            other => panic!("unexpected event: {other:?}"),
        }

        // Echo back to the sender's registered connection.
        assert!(matches!(
            rx1.try_recv().unwrap(),
            ServerEvent::PrivateReceive { .. }
        ));
    }

    #[tokio::test]
    async fn unreachable_recipient_is_dropped_without_error() {
        let directory = Directory::new();
        let relay = Relay::new(directory.clone());

        let (tx1, mut rx1) = mpsc::unbounded_channel();
        directory
            .register(UserId::new("u1"), "Ada".into(), ConnId::new(), tx1)
            .await;

        relay
            .relay_private(&UserId::new("u1"), text_message("u1", "offline", "hi"))
            .await;

        // Sender still gets the echo; nothing else happens.
        assert!(matches!(
            rx1.try_recv().unwrap(),
            ServerEvent::PrivateReceive { .. }
        ));
        assert!(rx1.try_recv().is_err());
    }

    #[tokio::test]
    async fn relayed_from_field_is_overwritten() {
        let directory = Directory::new();
        let relay = Relay::new(directory.clone());

        let (tx2, mut rx2) = mpsc::unbounded_channel();
        directory
            .register(UserId::new("u2"), "Grace".into(), ConnId::new(), tx2)
            .await;

        // A client claiming to be someone else gets re-addressed.
        relay
            .relay_private(&UserId::new("u1"), text_message("impostor", "u2", "hi"))
            .await;

        match rx2.try_recv().unwrap() {
            ServerEvent::PrivateReceive { message } => {
                assert_eq!(message.from, UserId::new("u1"));
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }
}
