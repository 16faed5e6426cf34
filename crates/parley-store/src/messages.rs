use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use parley_core::ids::MessageId;

use crate::database::Database;
use crate::error::StoreError;

/// One persisted chat message. Created by `append`; immutable afterward.
/// The id and timestamp are always server-assigned.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MessageRow {
    pub id: MessageId,
    pub sender: String,
    pub content: String,
    pub created_at: String,
}

pub struct MessageRepo {
    db: Database,
}

impl MessageRepo {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Persist a message, assigning its id and creation timestamp.
    #[instrument(skip(self, content))]
    pub fn append(&self, sender: &str, content: &str) -> Result<MessageRow, StoreError> {
        let id = MessageId::new();
        let now = Utc::now().to_rfc3339();

        self.db.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO messages (id, sender, content, created_at)
                 VALUES (?1, ?2, ?3, ?4)",
                rusqlite::params![id.as_str(), sender, content, now],
            )?;

            Ok(MessageRow {
                id,
                sender: sender.to_string(),
                content: content.to_string(),
                created_at: now,
            })
        })
    }

    /// List messages in insertion order. Ids are time-ordered, so
    /// `ORDER BY id` keeps pagination stable across calls.
    #[instrument(skip(self))]
    pub fn list(&self, skip: u32, limit: u32) -> Result<Vec<MessageRow>, StoreError> {
        self.db.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, sender, content, created_at FROM messages
                 ORDER BY id ASC LIMIT ?1 OFFSET ?2",
            )?;
            let rows = stmt
                .query_map([limit, skip], |row| {
                    Ok(MessageRow {
                        id: MessageId::from_raw(row.get::<_, String>(0)?),
                        sender: row.get(1)?,
                        content: row.get(2)?,
                        created_at: row.get(3)?,
                    })
                })?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Total number of persisted messages.
    pub fn count(&self) -> Result<u64, StoreError> {
        self.db.with_conn(|conn| {
            let n: u64 = conn.query_row("SELECT COUNT(*) FROM messages", [], |row| row.get(0))?;
            Ok(n)
        })
    }
}
