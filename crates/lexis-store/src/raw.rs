// crates/lexis-store/src/raw.rs
//
// Raw response index: one row per executed fetch, keyed by `response_id`.
// `headers` is stored as a JSON object, `body` as a BLOB.

use std::collections::BTreeMap;

use async_trait::async_trait;
use rusqlite::{params, OptionalExtension, Row};

use lexis_core::{LexisError, RawResponseEffect, RawResponseStore};

use crate::db::{sql_err, Database};

const COLUMNS: &str =
    "response_id, tool, call_id, endpoint, status_code, content_type, headers, body, fetch_duration_ms";

/// SQLite-backed [`RawResponseStore`].
#[derive(Clone)]
pub struct RawResponseIndex {
    db: Database,
}

struct RawRow {
    response_id: String,
    tool: String,
    call_id: String,
    endpoint: String,
    status_code: i32,
    content_type: String,
    headers: String,
    body: Vec<u8>,
    fetch_duration_ms: i64,
}

impl RawRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            response_id: row.get(0)?,
            tool: row.get(1)?,
            call_id: row.get(2)?,
            endpoint: row.get(3)?,
            status_code: row.get(4)?,
            content_type: row.get(5)?,
            headers: row.get(6)?,
            body: row.get(7)?,
            fetch_duration_ms: row.get(8)?,
        })
    }

    fn into_effect(self) -> Result<RawResponseEffect, LexisError> {
        let headers: BTreeMap<String, String> = serde_json::from_str(&self.headers)?;
        Ok(RawResponseEffect {
            response_id: self.response_id,
            tool: self.tool,
            call_id: self.call_id,
            endpoint: self.endpoint,
            status_code: self.status_code,
            content_type: self.content_type,
            headers,
            body: self.body,
            fetch_duration_ms: self.fetch_duration_ms.max(0) as u64,
        })
    }
}

impl RawResponseIndex {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

#[async_trait]
impl RawResponseStore for RawResponseIndex {
    async fn save_response(&self, effect: &RawResponseEffect) -> Result<(), LexisError> {
        let headers = serde_json::to_string(&effect.headers)?;
        let conn = self.db.connection()?;
        conn.execute(
            "INSERT OR REPLACE INTO raw_responses
                (response_id, tool, call_id, endpoint, status_code, content_type, headers, body,
                 fetch_duration_ms, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, CURRENT_TIMESTAMP)",
            params![
                effect.response_id,
                effect.tool,
                effect.call_id,
                effect.endpoint,
                effect.status_code,
                effect.content_type,
                headers,
                effect.body,
                effect.fetch_duration_ms as i64,
            ],
        )
        .map_err(sql_err("raw response upsert"))?;
        Ok(())
    }

    async fn get_response(&self, response_id: &str) -> Result<Option<RawResponseEffect>, LexisError> {
        let conn = self.db.connection()?;
        let sql = format!("SELECT {} FROM raw_responses WHERE response_id = ?1", COLUMNS);
        let row = conn
            .query_row(&sql, params![response_id], RawRow::from_row)
            .optional()
            .map_err(sql_err("raw response lookup"))?;
        row.map(RawRow::into_effect).transpose()
    }

    async fn list_responses_for_call(&self, call_id: &str) -> Result<Vec<RawResponseEffect>, LexisError> {
        let conn = self.db.connection()?;
        let sql = format!(
            "SELECT {} FROM raw_responses WHERE call_id = ?1 ORDER BY created_at, response_id",
            COLUMNS
        );
        let mut stmt = conn.prepare(&sql).map_err(sql_err("raw response list"))?;
        let rows = stmt
            .query_map(params![call_id], RawRow::from_row)
            .map_err(sql_err("raw response list"))?
            .collect::<Result<Vec<_>, _>>()
            .map_err(sql_err("raw response list"))?;
        rows.into_iter().map(RawRow::into_effect).collect()
    }
}
