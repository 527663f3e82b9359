// crates/lexis-store/src/derivation.rs

use async_trait::async_trait;
use rusqlite::{params, OptionalExtension, Row};

use lexis_core::{DerivationEffect, DerivationStore, LexisError};

use crate::db::{sql_err, Database};

const COLUMNS: &str = "derivation_id, tool, call_id, source_call_id, extraction_id, kind, canonical, \
                       payload, provenance_chain, derive_duration_ms";

/// SQLite-backed [`DerivationStore`], keyed by the stable `derivation_id`.
#[derive(Clone)]
pub struct DerivationIndex {
    db: Database,
}

struct DerivationRow {
    derivation_id: String,
    tool: String,
    call_id: String,
    source_call_id: String,
    extraction_id: String,
    kind: String,
    canonical: Option<String>,
    payload: String,
    provenance_chain: String,
    derive_duration_ms: i64,
}

impl DerivationRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            derivation_id: row.get(0)?,
            tool: row.get(1)?,
            call_id: row.get(2)?,
            source_call_id: row.get(3)?,
            extraction_id: row.get(4)?,
            kind: row.get(5)?,
            canonical: row.get(6)?,
            payload: row.get(7)?,
            provenance_chain: row.get(8)?,
            derive_duration_ms: row.get(9)?,
        })
    }

    fn into_effect(self) -> Result<DerivationEffect, LexisError> {
        Ok(DerivationEffect {
            derivation_id: self.derivation_id,
            tool: self.tool,
            call_id: self.call_id,
            source_call_id: self.source_call_id,
            extraction_id: self.extraction_id,
            kind: self.kind,
            canonical: self.canonical,
            payload: serde_json::from_str(&self.payload)?,
            provenance_chain: serde_json::from_str(&self.provenance_chain)?,
            derive_duration_ms: self.derive_duration_ms.max(0) as u64,
        })
    }
}

impl DerivationIndex {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

#[async_trait]
impl DerivationStore for DerivationIndex {
    async fn save_derivation(&self, effect: &DerivationEffect) -> Result<(), LexisError> {
        let payload = serde_json::to_string(&effect.payload)?;
        let chain = serde_json::to_string(&effect.provenance_chain)?;
        let conn = self.db.connection()?;
        conn.execute(
            "INSERT OR REPLACE INTO derivations
                (derivation_id, extraction_id, tool, call_id, source_call_id, kind, canonical,
                 payload, provenance_chain, derive_duration_ms, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, CURRENT_TIMESTAMP)",
            params![
                effect.derivation_id,
                effect.extraction_id,
                effect.tool,
                effect.call_id,
                effect.source_call_id,
                effect.kind,
                effect.canonical,
                payload,
                chain,
                effect.derive_duration_ms as i64,
            ],
        )
        .map_err(sql_err("derivation upsert"))?;
        Ok(())
    }

    async fn get_derivation(&self, derivation_id: &str) -> Result<Option<DerivationEffect>, LexisError> {
        let conn = self.db.connection()?;
        let sql = format!("SELECT {} FROM derivations WHERE derivation_id = ?1", COLUMNS);
        let row = conn
            .query_row(&sql, params![derivation_id], DerivationRow::from_row)
            .optional()
            .map_err(sql_err("derivation lookup"))?;
        row.map(DerivationRow::into_effect).transpose()
    }

    async fn list_derivations_for_extraction(
        &self,
        extraction_id: &str,
    ) -> Result<Vec<DerivationEffect>, LexisError> {
        let conn = self.db.connection()?;
        let sql = format!(
            "SELECT {} FROM derivations WHERE extraction_id = ?1 ORDER BY derivation_id",
            COLUMNS
        );
        let mut stmt = conn.prepare(&sql).map_err(sql_err("derivation list"))?;
        let rows = stmt
            .query_map(params![extraction_id], DerivationRow::from_row)
            .map_err(sql_err("derivation list"))?
            .collect::<Result<Vec<_>, _>>()
            .map_err(sql_err("derivation list"))?;
        rows.into_iter().map(DerivationRow::into_effect).collect()
    }
}
