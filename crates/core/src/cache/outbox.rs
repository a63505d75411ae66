//! Outbox of submissions queued while offline.
//!
//! Entries are grouped by sync tag and replayed in insertion order.

use super::connection::CacheDb;
use crate::{Error, RequestRecord};
use serde::{Deserialize, Serialize};
use tokio_rusqlite::params;

/// A queued submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutboxEntry {
    pub id: i64,
    pub tag: String,
    pub method: String,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
    pub queued_at: String,
}

impl CacheDb {
    /// Queue a request under `tag`. Returns the entry id.
    pub async fn enqueue_outbox(&self, tag: &str, request: &RequestRecord) -> Result<i64, Error> {
        let tag = tag.to_string();
        let method = request.method.to_ascii_uppercase();
        let url = request.url.to_string();
        let headers_json = serde_json::to_string(&request.headers)?;
        let body = request.body.to_vec();
        let now = chrono::Utc::now().to_rfc3339();
        self.conn
            .call(move |conn| -> Result<i64, Error> {
                conn.execute(
                    "INSERT INTO outbox (tag, method, url, headers_json, body, queued_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                    params![tag, method, url, headers_json, body, now],
                )?;
                Ok(conn.last_insert_rowid())
            })
            .await
            .map_err(Error::from)
    }

    /// Entries queued under `tag`, oldest first.
    pub async fn outbox_entries(&self, tag: &str) -> Result<Vec<OutboxEntry>, Error> {
        let tag = tag.to_string();
        self.conn
            .call(move |conn| -> Result<Vec<OutboxEntry>, Error> {
                let mut stmt = conn.prepare(
                    "SELECT id, tag, method, url, headers_json, body, queued_at
                     FROM outbox WHERE tag = ?1 ORDER BY id",
                )?;
                let rows = stmt
                    .query_map(params![tag], |row| {
                        Ok((
                            row.get::<_, i64>(0)?,
                            row.get::<_, String>(1)?,
                            row.get::<_, String>(2)?,
                            row.get::<_, String>(3)?,
                            row.get::<_, String>(4)?,
                            row.get::<_, Vec<u8>>(5)?,
                            row.get::<_, String>(6)?,
                        ))
                    })?
                    .collect::<Result<Vec<_>, _>>()?;

                rows.into_iter()
                    .map(|(id, tag, method, url, headers_json, body, queued_at)| -> Result<OutboxEntry, Error> {
                        let headers = serde_json::from_str(&headers_json)?;
                        Ok(OutboxEntry { id, tag, method, url, headers, body, queued_at })
                    })
                    .collect()
            })
            .await
            .map_err(Error::from)
    }

    /// Remove a delivered entry.
    pub async fn remove_outbox(&self, id: i64) -> Result<bool, Error> {
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let count = conn.execute("DELETE FROM outbox WHERE id = ?1", params![id])?;
                Ok(count > 0)
            })
            .await
            .map_err(Error::from)
    }

    /// Number of entries queued under `tag`.
    pub async fn outbox_len(&self, tag: &str) -> Result<u64, Error> {
        let tag = tag.to_string();
        self.conn
            .call(move |conn| -> Result<u64, Error> {
                let count: i64 =
                    conn.query_row("SELECT COUNT(*) FROM outbox WHERE tag = ?1", params![tag], |row| row.get(0))?;
                Ok(count as u64)
            })
            .await
            .map_err(Error::from)
    }
}
