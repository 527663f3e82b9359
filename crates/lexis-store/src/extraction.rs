// crates/lexis-store/src/extraction.rs

use async_trait::async_trait;
use rusqlite::{params, OptionalExtension, Row};

use lexis_core::{ExtractionEffect, ExtractionStore, LexisError};

use crate::db::{sql_err, Database};

const COLUMNS: &str = "extraction_id, tool, call_id, source_call_id, response_id, kind, canonical, \
                       payload, provenance_chain, load_duration_ms";

/// SQLite-backed [`ExtractionStore`], keyed by the stable `extraction_id`.
#[derive(Clone)]
pub struct ExtractionIndex {
    db: Database,
}

struct ExtractionRow {
    extraction_id: String,
    tool: String,
    call_id: String,
    source_call_id: String,
    response_id: String,
    kind: String,
    canonical: Option<String>,
    payload: String,
    provenance_chain: String,
    load_duration_ms: i64,
}

impl ExtractionRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            extraction_id: row.get(0)?,
            tool: row.get(1)?,
            call_id: row.get(2)?,
            source_call_id: row.get(3)?,
            response_id: row.get(4)?,
            kind: row.get(5)?,
            canonical: row.get(6)?,
            payload: row.get(7)?,
            provenance_chain: row.get(8)?,
            load_duration_ms: row.get(9)?,
        })
    }

    fn into_effect(self) -> Result<ExtractionEffect, LexisError> {
        Ok(ExtractionEffect {
            extraction_id: self.extraction_id,
            tool: self.tool,
            call_id: self.call_id,
            source_call_id: self.source_call_id,
            response_id: self.response_id,
            kind: self.kind,
            canonical: self.canonical,
            payload: serde_json::from_str(&self.payload)?,
            provenance_chain: serde_json::from_str(&self.provenance_chain)?,
            load_duration_ms: self.load_duration_ms.max(0) as u64,
        })
    }
}

impl ExtractionIndex {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

#[async_trait]
impl ExtractionStore for ExtractionIndex {
    async fn save_extraction(&self, effect: &ExtractionEffect) -> Result<(), LexisError> {
        let payload = serde_json::to_string(&effect.payload)?;
        let chain = serde_json::to_string(&effect.provenance_chain)?;
        let conn = self.db.connection()?;
        conn.execute(
            "INSERT OR REPLACE INTO extractions
                (extraction_id, response_id, tool, call_id, source_call_id, kind, canonical,
                 payload, provenance_chain, load_duration_ms, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, CURRENT_TIMESTAMP)",
            params![
                effect.extraction_id,
                effect.response_id,
                effect.tool,
                effect.call_id,
                effect.source_call_id,
                effect.kind,
                effect.canonical,
                payload,
                chain,
                effect.load_duration_ms as i64,
            ],
        )
        .map_err(sql_err("extraction upsert"))?;
        Ok(())
    }

    async fn get_extraction(&self, extraction_id: &str) -> Result<Option<ExtractionEffect>, LexisError> {
        let conn = self.db.connection()?;
        let sql = format!("SELECT {} FROM extractions WHERE extraction_id = ?1", COLUMNS);
        let row = conn
            .query_row(&sql, params![extraction_id], ExtractionRow::from_row)
            .optional()
            .map_err(sql_err("extraction lookup"))?;
        row.map(ExtractionRow::into_effect).transpose()
    }

    async fn list_extractions_for_response(
        &self,
        response_id: &str,
    ) -> Result<Vec<ExtractionEffect>, LexisError> {
        let conn = self.db.connection()?;
        let sql = format!(
            "SELECT {} FROM extractions WHERE response_id = ?1 ORDER BY extraction_id",
            COLUMNS
        );
        let mut stmt = conn.prepare(&sql).map_err(sql_err("extraction list"))?;
        let rows = stmt
            .query_map(params![response_id], ExtractionRow::from_row)
            .map_err(sql_err("extraction list"))?
            .collect::<Result<Vec<_>, _>>()
            .map_err(sql_err("extraction list"))?;
        rows.into_iter().map(ExtractionRow::into_effect).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lexis_core::{RawResponseEffect, Stage, ToolCallSpec};

    fn sample() -> ExtractionEffect {
        let mut raw = RawResponseEffect::new("whitakers-0", "/usr/local/bin/words").with_status(0);
        raw.tool = "fetch.whitakers".to_string();
        let call = ToolCallSpec::new(
            Stage::Extract,
            "extract.whitakers.text",
            "whitakers-0/extract",
            "lexis://extract",
        );
        ExtractionEffect::new(
            &call,
            &raw,
            "tokens",
            Some("amo".to_string()),
            serde_json::json!({"tokens": ["amo", "amare"]}),
        )
    }

    #[tokio::test]
    async fn save_and_get_extraction() {
        let index = Database::open_in_memory().unwrap().extractions();
        let effect = sample();
        index.save_extraction(&effect).await.unwrap();

        let loaded = index.get_extraction(&effect.extraction_id).await.unwrap().unwrap();
        assert_eq!(loaded, effect);
        assert_eq!(loaded.provenance_chain.len(), 2);
    }

    #[tokio::test]
    async fn resaving_same_extraction_keeps_one_row() {
        let db = Database::open_in_memory().unwrap();
        let index = db.extractions();
        let effect = sample();
        index.save_extraction(&effect).await.unwrap();
        index.save_extraction(&effect).await.unwrap();
        assert_eq!(db.count_rows(crate::EffectTable::Extractions).unwrap(), 1);

        let listed = index
            .list_extractions_for_response(&effect.response_id)
            .await
            .unwrap();
        assert_eq!(listed, vec![effect]);
    }
}
