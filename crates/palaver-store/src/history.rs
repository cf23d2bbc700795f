//! Conversation history resolver.
//!
//! Private history must match rows written under either identifier
//! representation: the query fans out over every stored form of both
//! participants, and each returned row is normalized to the canonical
//! form. Dropping one arm silently loses the history written under the
//! other representation, so both stay until a backfill unifies storage.

use rusqlite::params;

use palaver_shared::{ChatMessage, GroupId, PeerRef, UserId};

use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::messages::{row_to_message, MESSAGE_COLUMNS};

impl Database {
    /// Serve the conversation history between `requester` and `peer`,
    /// ascending by creation time.
    ///
    /// Group peers require the requester to currently be a member of the
    /// group; the check runs on every call.
    pub fn resolve_history(&self, requester: &UserId, peer: &PeerRef) -> Result<Vec<ChatMessage>> {
        match peer {
            PeerRef::Group(group) => {
                if !self.is_group_member(group, requester)? {
                    return Err(StoreError::NotAMember(group.clone()));
                }
                self.group_history(group)
            }
            PeerRef::User(peer) => self.private_history(requester, peer),
        }
    }

    /// All messages addressed to the exact group tag.
    pub fn group_history(&self, group: &GroupId) -> Result<Vec<ChatMessage>> {
        let mut stmt = self.conn().prepare(&format!(
            "SELECT {MESSAGE_COLUMNS} FROM messages
             WHERE recipient = ?1
             ORDER BY created_at ASC"
        ))?;

        let rows = stmt.query_map(
            params![PeerRef::Group(group.clone()).to_stored()],
            row_to_message,
        )?;

        let mut messages = Vec::new();
        for row in rows {
            messages.push(row?);
        }
        Ok(messages)
    }

    /// All messages between two identities, in either direction, matching
    /// both the legacy and the structured identifier forms.
    pub fn private_history(&self, requester: &UserId, peer: &UserId) -> Result<Vec<ChatMessage>> {
        let requester_forms = PeerRef::User(requester.clone()).stored_forms();
        let peer_forms = PeerRef::User(peer.clone()).stored_forms();

        let mut stmt = self.conn().prepare(&format!(
            "SELECT {MESSAGE_COLUMNS} FROM messages
             WHERE (sender IN (?1, ?2) AND recipient IN (?3, ?4))
                OR (sender IN (?3, ?4) AND recipient IN (?1, ?2))
             ORDER BY created_at ASC"
        ))?;

        let rows = stmt.query_map(
            params![
                requester_forms[0],
                requester_forms[1],
                peer_forms[0],
                peer_forms[1],
            ],
            row_to_message,
        )?;

        let mut messages = Vec::new();
        for row in rows {
            messages.push(row?);
        }
        Ok(messages)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use palaver_shared::MessageBody;
    use uuid::Uuid;

    fn text_message(from: &str, to: &str, text: &str, age_secs: i64) -> ChatMessage {
        ChatMessage {
            id: Uuid::new_v4(),
            from: UserId::new(from),
            to: PeerRef::from_wire(to),
            body: MessageBody::Text {
                text: text.to_string(),
            },
            created_at: Utc::now() - Duration::seconds(age_secs),
        }
    }

    /// Insert a row the way the legacy writer did: bare identifier strings.
    fn insert_legacy_text(db: &Database, from: &str, to: &str, text: &str, age_secs: i64) {
        let created = (Utc::now() - Duration::seconds(age_secs)).to_rfc3339();
        db.conn()
            .execute(
                "INSERT INTO messages (id, sender, recipient, type, text, created_at)
                 VALUES (?1, ?2, ?3, 'text', ?4, ?5)",
                params![Uuid::new_v4().to_string(), from, to, text, created],
            )
            .unwrap();
    }

    #[test]
    fn mixed_representation_history_is_complete_and_ordered() {
        let db = Database::open_in_memory().unwrap();

        // Older row written with bare identifiers, newer with structured.
        insert_legacy_text(&db, "u1", "u2", "old form", 60);
        db.insert_message(&text_message("u2", "u1", "new form", 10))
            .unwrap();

        let history = db
            .resolve_history(&UserId::new("u1"), &PeerRef::from_wire("u2"))
            .unwrap();

        assert_eq!(history.len(), 2);
        assert_eq!(
            history[0].body,
            MessageBody::Text {
                text: "old form".to_string()
            }
        );
        assert_eq!(
            history[1].body,
            MessageBody::Text {
                text: "new form".to_string()
            }
        );
        // Every identifier comes back in canonical form.
        assert_eq!(history[0].from, UserId::new("u1"));
        assert_eq!(history[0].to, PeerRef::from_wire("u2"));
        assert_eq!(history[1].from, UserId::new("u2"));
    }

    #[test]
    fn private_history_excludes_other_conversations() {
        let db = Database::open_in_memory().unwrap();
        db.insert_message(&text_message("u1", "u2", "ours", 30)).unwrap();
        db.insert_message(&text_message("u1", "u3", "theirs", 20)).unwrap();
        insert_legacy_text(&db, "u3", "u2", "also theirs", 10);

        let history = db
            .resolve_history(&UserId::new("u1"), &PeerRef::from_wire("u2"))
            .unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(
            history[0].body,
            MessageBody::Text {
                text: "ours".to_string()
            }
        );
    }

    #[test]
    fn group_history_requires_membership() {
        let db = Database::open_in_memory().unwrap();
        let group = PeerRef::from_wire("group:team-7");
        db.insert_message(&text_message("u1", "group:team-7", "standup", 5))
            .unwrap();

        match db.resolve_history(&UserId::new("u2"), &group) {
            Err(StoreError::NotAMember(g)) => assert_eq!(g, GroupId::new("team-7")),
            other => panic!("expected NotAMember, got {other:?}"),
        }

        db.add_group_member(&GroupId::new("team-7"), &UserId::new("u2"))
            .unwrap();
        let history = db.resolve_history(&UserId::new("u2"), &group).unwrap();
        assert_eq!(history.len(), 1);
    }

    #[test]
    fn group_history_matches_exact_tag_only() {
        let db = Database::open_in_memory().unwrap();
        let member = UserId::new("u1");
        db.add_group_member(&GroupId::new("team-7"), &member).unwrap();

        db.insert_message(&text_message("u2", "group:team-7", "in", 10))
            .unwrap();
        db.insert_message(&text_message("u2", "group:team-77", "out", 5))
            .unwrap();

        let history = db
            .resolve_history(&member, &PeerRef::from_wire("group:team-7"))
            .unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(
            history[0].body,
            MessageBody::Text {
                text: "in".to_string()
            }
        );
    }

    /// U2 sends "hi" to U1, then U1 fetches the conversation and sees
    /// exactly that one message.
    #[test]
    fn single_text_round_trip() {
        let db = Database::open_in_memory().unwrap();
        db.insert_message(&text_message("u2", "u1", "hi", 1)).unwrap();

        let history = db
            .resolve_history(&UserId::new("u1"), &PeerRef::from_wire("u2"))
            .unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].from, UserId::new("u2"));
        assert_eq!(
            history[0].body,
            MessageBody::Text {
                text: "hi".to_string()
            }
        );
    }
}
