//! Entry reads and writes.
//!
//! Writes create the target bucket if needed. Duplicate keys are
//! last-write-wins.

use super::connection::CacheDb;
use crate::{Error, ResponseRecord};
use tokio_rusqlite::{params, rusqlite};

const UPSERT_ENTRY: &str = "INSERT INTO entries (
        bucket, request_key, status, status_text, headers_json, body, stored_at
    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
    ON CONFLICT(bucket, request_key) DO UPDATE SET
        status = excluded.status,
        status_text = excluded.status_text,
        headers_json = excluded.headers_json,
        body = excluded.body,
        stored_at = excluded.stored_at";

const ENSURE_BUCKET: &str = "INSERT OR IGNORE INTO buckets (name, created_at) VALUES (?1, ?2)";

/// Row form of a response, ready to bind.
struct EntryRow {
    key: String,
    status: i64,
    status_text: String,
    headers_json: String,
    body: Vec<u8>,
}

impl EntryRow {
    fn new(key: &str, response: &ResponseRecord) -> Result<Self, Error> {
        Ok(Self {
            key: key.to_string(),
            status: i64::from(response.status),
            status_text: response.status_text.clone(),
            headers_json: serde_json::to_string(&response.headers)?,
            body: response.body.to_vec(),
        })
    }

    fn insert(&self, conn: &rusqlite::Connection, bucket: &str, now: &str) -> Result<(), Error> {
        conn.execute(
            UPSERT_ENTRY,
            params![bucket, &self.key, self.status, &self.status_text, &self.headers_json, &self.body, now],
        )?;
        Ok(())
    }
}

type RawEntry = (i64, String, String, Vec<u8>);

fn read_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawEntry> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
}

fn decode(status: i64, status_text: String, headers_json: String, body: Vec<u8>) -> Result<ResponseRecord, Error> {
    let status = u16::try_from(status).map_err(|_| Error::CorruptEntry(format!("status {status} out of range")))?;
    let headers: Vec<(String, String)> = serde_json::from_str(&headers_json)?;
    Ok(ResponseRecord { status, status_text, headers, body: body.into() })
}

impl CacheDb {
    /// Store one response under `key` in `bucket`.
    pub async fn put_entry(&self, bucket: &str, key: &str, response: &ResponseRecord) -> Result<(), Error> {
        let bucket = bucket.to_string();
        let row = EntryRow::new(key, response)?;
        let now = chrono::Utc::now().to_rfc3339();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute(ENSURE_BUCKET, params![&bucket, &now])?;
                row.insert(conn, &bucket, &now)
            })
            .await
            .map_err(Error::from)
    }

    /// Store a batch of responses in one transaction. Either all are written or none.
    pub async fn put_entries(&self, bucket: &str, entries: &[(String, ResponseRecord)]) -> Result<usize, Error> {
        let bucket = bucket.to_string();
        let rows = entries
            .iter()
            .map(|(key, response)| EntryRow::new(key, response))
            .collect::<Result<Vec<_>, _>>()?;
        let now = chrono::Utc::now().to_rfc3339();
        self.conn
            .call(move |conn| -> Result<usize, Error> {
                let tx = conn.transaction()?;
                tx.execute(ENSURE_BUCKET, params![&bucket, &now])?;
                for row in &rows {
                    row.insert(&tx, &bucket, &now)?;
                }
                tx.commit()?;
                Ok(rows.len())
            })
            .await
            .map_err(Error::from)
    }

    /// Look up `key` in one bucket.
    pub async fn match_entry(&self, bucket: &str, key: &str) -> Result<Option<ResponseRecord>, Error> {
        let bucket = bucket.to_string();
        let key = key.to_string();
        self.conn
            .call(move |conn| -> Result<Option<ResponseRecord>, Error> {
                let result = conn.query_row(
                    "SELECT status, status_text, headers_json, body
                     FROM entries WHERE bucket = ?1 AND request_key = ?2",
                    params![bucket, key],
                    read_row,
                );

                match result {
                    Ok((status, status_text, headers_json, body)) => {
                        decode(status, status_text, headers_json, body).map(Some)
                    }
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)
    }

    /// Look up `key` across all buckets, oldest bucket first.
    pub async fn match_any(&self, key: &str) -> Result<Option<ResponseRecord>, Error> {
        let key = key.to_string();
        self.conn
            .call(move |conn| -> Result<Option<ResponseRecord>, Error> {
                let result = conn.query_row(
                    "SELECT e.status, e.status_text, e.headers_json, e.body
                     FROM entries e JOIN buckets b ON e.bucket = b.name
                     WHERE e.request_key = ?1
                     ORDER BY b.rowid ASC LIMIT 1",
                    params![key],
                    read_row,
                );

                match result {
                    Ok((status, status_text, headers_json, body)) => {
                        decode(status, status_text, headers_json, body).map(Some)
                    }
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)
    }

    /// Keys stored in a bucket, sorted.
    #[cfg(test)]
    pub(crate) async fn keys(&self, bucket: &str) -> Result<Vec<String>, Error> {
        let bucket = bucket.to_string();
        self.conn
            .call(move |conn| -> Result<Vec<String>, Error> {
                let mut stmt = conn.prepare("SELECT request_key FROM entries WHERE bucket = ?1 ORDER BY request_key")?;
                let keys = stmt
                    .query_map(params![bucket], |row| row.get(0))?
                    .collect::<Result<Vec<String>, _>>()?;
                Ok(keys)
            })
            .await
            .map_err(Error::from)
    }
}
