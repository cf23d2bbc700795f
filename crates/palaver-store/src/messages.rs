//! Typed CRUD for the `messages` table.
//!
//! New rows are always written with structured identifier forms
//! (`user:<id>` / `group:<id>`). Reads normalize whatever form is on disk.

use chrono::{DateTime, Utc};
use rusqlite::params;
use uuid::Uuid;

use palaver_shared::{ChatMessage, MessageBody, PeerRef, UserId};

use crate::database::Database;
use crate::error::{Result, StoreError};

pub(crate) const MESSAGE_COLUMNS: &str =
    "id, sender, recipient, type, text, file_url, file_name, file_size, created_at";

impl Database {
    /// Persist a message, assigning the structured identifier forms.
    pub fn insert_message(&self, message: &ChatMessage) -> Result<()> {
        let (kind, text, file_url, file_name, file_size) = match &message.body {
            MessageBody::Text { text } => ("text", Some(text.as_str()), None, None, None),
            MessageBody::File {
                file_url,
                file_name,
                file_size,
            } => (
                "file",
                None,
                Some(file_url.as_str()),
                Some(file_name.as_str()),
                Some(*file_size),
            ),
            MessageBody::Voice {
                file_url,
                file_name,
                file_size,
            } => (
                "voice",
                None,
                Some(file_url.as_str()),
                Some(file_name.as_str()),
                Some(*file_size),
            ),
        };

        self.conn().execute(
            "INSERT INTO messages (id, sender, recipient, type, text, file_url, file_name, file_size, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                message.id.to_string(),
                PeerRef::User(message.from.clone()).to_stored(),
                message.to.to_stored(),
                kind,
                text,
                file_url,
                file_name,
                file_size,
                message.created_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    pub fn get_message_by_id(&self, id: Uuid) -> Result<ChatMessage> {
        self.conn()
            .query_row(
                &format!("SELECT {MESSAGE_COLUMNS} FROM messages WHERE id = ?1"),
                params![id.to_string()],
                row_to_message,
            )
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => StoreError::NotFound,
                other => StoreError::Sqlite(other),
            })
    }
}

/// Map one row to a [`ChatMessage`], normalizing every identifier column to
/// its canonical form regardless of how the row was written.
pub(crate) fn row_to_message(row: &rusqlite::Row<'_>) -> rusqlite::Result<ChatMessage> {
    let id_str: String = row.get(0)?;
    let sender: String = row.get(1)?;
    let recipient: String = row.get(2)?;
    let kind: String = row.get(3)?;
    let text: Option<String> = row.get(4)?;
    let file_url: Option<String> = row.get(5)?;
    let file_name: Option<String> = row.get(6)?;
    let file_size: Option<u64> = row.get(7)?;
    let ts_str: String = row.get(8)?;

    let id = Uuid::parse_str(&id_str).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
    })?;

    let body = match kind.as_str() {
        "text" => MessageBody::Text {
            text: text.unwrap_or_default(),
        },
        "file" => MessageBody::File {
            file_url: file_url.unwrap_or_default(),
            file_name: file_name.unwrap_or_default(),
            file_size: file_size.unwrap_or_default(),
        },
        "voice" => MessageBody::Voice {
            file_url: file_url.unwrap_or_default(),
            file_name: file_name.unwrap_or_default(),
            file_size: file_size.unwrap_or_default(),
        },
        other => {
            return Err(rusqlite::Error::FromSqlConversionFailure(
                3,
                rusqlite::types::Type::Text,
                format!("unknown message type: {other}").into(),
            ))
        }
    };

    let created_at: DateTime<Utc> = DateTime::parse_from_rfc3339(&ts_str)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(8, rusqlite::types::Type::Text, Box::new(e))
        })?;

    Ok(ChatMessage {
        id,
        from: UserId::from_stored(&sender),
        to: PeerRef::from_stored(&recipient),
        body,
        created_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

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

    #[test]
    fn insert_writes_structured_forms() {
        let db = Database::open_in_memory().unwrap();
        let msg = text_message("u1", "u2", "hi");
        db.insert_message(&msg).unwrap();

        let (sender, recipient): (String, String) = db
            .conn()
            .query_row("SELECT sender, recipient FROM messages", [], |r| {
                Ok((r.get(0)?, r.get(1)?))
            })
            .unwrap();
        assert_eq!(sender, "user:u1");
        assert_eq!(recipient, "user:u2");
    }

    #[test]
    fn read_back_normalizes() {
        let db = Database::open_in_memory().unwrap();
        let msg = text_message("u1", "group:team-7", "hello all");
        db.insert_message(&msg).unwrap();

        let loaded = db.get_message_by_id(msg.id).unwrap();
        assert_eq!(loaded.from, UserId::new("u1"));
        assert_eq!(loaded.to.to_wire(), "group:team-7");
        assert_eq!(loaded.body, msg.body);
    }

    #[test]
    fn missing_message_is_not_found() {
        let db = Database::open_in_memory().unwrap();
        match db.get_message_by_id(Uuid::new_v4()) {
            Err(StoreError::NotFound) => {}
            other => panic!("expected NotFound, got {other:?}"),
        }
    }
}
