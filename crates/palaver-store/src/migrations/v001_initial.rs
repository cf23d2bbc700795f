//! v001 -- Initial schema creation.
//!
//! Creates the `messages` table and the `group_members` table read by the
//! live membership check. Sender and recipient columns are TEXT on purpose:
//! rows written before the structured-identifier change store the bare
//! identity string, newer rows store `user:<id>` / `group:<id>`.

use rusqlite::Connection;

/// SQL executed when upgrading from version 0 to version 1.
const UP_SQL: &str = r#"
-- ----------------------------------------------------------------
-- Messages
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS messages (
    id          TEXT PRIMARY KEY NOT NULL,            -- UUID v4
    sender      TEXT NOT NULL,                        -- bare id or user:<id>
    recipient   TEXT NOT NULL,                        -- bare id, user:<id> or group:<id>
    type        TEXT NOT NULL
                CHECK (type IN ('text', 'file', 'voice')),
    text        TEXT,                                 -- text messages only
    file_url    TEXT,                                 -- file/voice messages
    file_name   TEXT,
    file_size   INTEGER,
    deleted_for TEXT NOT NULL DEFAULT '[]',           -- JSON array of user ids
    created_at  TEXT NOT NULL                         -- ISO-8601 / RFC-3339
);

CREATE INDEX IF NOT EXISTS idx_messages_sender    ON messages(sender);
CREATE INDEX IF NOT EXISTS idx_messages_recipient ON messages(recipient);
CREATE INDEX IF NOT EXISTS idx_messages_created   ON messages(created_at);

-- ----------------------------------------------------------------
-- Group membership (written by the external group service)
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS group_members (
    group_id TEXT NOT NULL,
    user_id  TEXT NOT NULL,

    PRIMARY KEY (group_id, user_id)
);
"#;

/// Apply the initial migration.
pub fn up(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(UP_SQL)
}
