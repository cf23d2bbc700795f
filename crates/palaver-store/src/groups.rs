//! Group membership reads.
//!
//! The `group_members` table is owned by the external group service; this
//! crate only consumes it. The check is performed live on every history
//! request, never cached.

use rusqlite::params;

use palaver_shared::{GroupId, UserId};

use crate::database::Database;
use crate::error::Result;

impl Database {
    /// Whether `user` is currently a member of `group`.
    pub fn is_group_member(&self, group: &GroupId, user: &UserId) -> Result<bool> {
        let count: u32 = self.conn().query_row(
            "SELECT COUNT(*) FROM group_members WHERE group_id = ?1 AND user_id = ?2",
            params![group.0, user.0],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    /// Mirror of the group service's membership write, for embedded setups
    /// and tests.
    pub fn add_group_member(&self, group: &GroupId, user: &UserId) -> Result<()> {
        self.conn().execute(
            "INSERT OR IGNORE INTO group_members (group_id, user_id) VALUES (?1, ?2)",
            params![group.0, user.0],
        )?;
        Ok(())
    }

    pub fn remove_group_member(&self, group: &GroupId, user: &UserId) -> Result<bool> {
        let affected = self.conn().execute(
            "DELETE FROM group_members WHERE group_id = ?1 AND user_id = ?2",
            params![group.0, user.0],
        )?;
        Ok(affected > 0)
    }
}
