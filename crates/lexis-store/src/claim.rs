// crates/lexis-store/src/claim.rs

use async_trait::async_trait;
use rusqlite::{params, OptionalExtension, Row};

use lexis_core::{ClaimEffect, ClaimStore, LexisError};

use crate::db::{sql_err, Database};

const COLUMNS: &str = "claim_id, tool, call_id, source_call_id, derivation_id, subject, predicate, \
                       value, provenance_chain, load_duration_ms";

/// SQLite-backed [`ClaimStore`], keyed by the stable `claim_id`.
#[derive(Clone)]
pub struct ClaimIndex {
    db: Database,
}

struct ClaimRow {
    claim_id: String,
    tool: String,
    call_id: String,
    source_call_id: String,
    derivation_id: String,
    subject: String,
    predicate: String,
    value: String,
    provenance_chain: String,
    load_duration_ms: i64,
}

impl ClaimRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            claim_id: row.get(0)?,
            tool: row.get(1)?,
            call_id: row.get(2)?,
            source_call_id: row.get(3)?,
            derivation_id: row.get(4)?,
            subject: row.get(5)?,
            predicate: row.get(6)?,
            value: row.get(7)?,
            provenance_chain: row.get(8)?,
            load_duration_ms: row.get(9)?,
        })
    }

    fn into_effect(self) -> Result<ClaimEffect, LexisError> {
        Ok(ClaimEffect {
            claim_id: self.claim_id,
            tool: self.tool,
            call_id: self.call_id,
            source_call_id: self.source_call_id,
            derivation_id: self.derivation_id,
            subject: self.subject,
            predicate: self.predicate,
            value: serde_json::from_str(&self.value)?,
            provenance_chain: serde_json::from_str(&self.provenance_chain)?,
            load_duration_ms: self.load_duration_ms.max(0) as u64,
        })
    }
}

impl ClaimIndex {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

#[async_trait]
impl ClaimStore for ClaimIndex {
    async fn save_claim(&self, effect: &ClaimEffect) -> Result<(), LexisError> {
        let value = serde_json::to_string(&effect.value)?;
        let chain = serde_json::to_string(&effect.provenance_chain)?;
        let conn = self.db.connection()?;
        conn.execute(
            "INSERT OR REPLACE INTO claims
                (claim_id, derivation_id, tool, call_id, source_call_id, subject, predicate,
                 value, provenance_chain, load_duration_ms, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, CURRENT_TIMESTAMP)",
            params![
                effect.claim_id,
                effect.derivation_id,
                effect.tool,
                effect.call_id,
                effect.source_call_id,
                effect.subject,
                effect.predicate,
                value,
                chain,
                effect.load_duration_ms as i64,
            ],
        )
        .map_err(sql_err("claim upsert"))?;
        Ok(())
    }

    async fn get_claim(&self, claim_id: &str) -> Result<Option<ClaimEffect>, LexisError> {
        let conn = self.db.connection()?;
        let sql = format!("SELECT {} FROM claims WHERE claim_id = ?1", COLUMNS);
        let row = conn
            .query_row(&sql, params![claim_id], ClaimRow::from_row)
            .optional()
            .map_err(sql_err("claim lookup"))?;
        row.map(ClaimRow::into_effect).transpose()
    }

    async fn list_claims_for_derivation(&self, derivation_id: &str) -> Result<Vec<ClaimEffect>, LexisError> {
        let conn = self.db.connection()?;
        let sql = format!(
            "SELECT {} FROM claims WHERE derivation_id = ?1 ORDER BY claim_id",
            COLUMNS
        );
        let mut stmt = conn.prepare(&sql).map_err(sql_err("claim list"))?;
        let rows = stmt
            .query_map(params![derivation_id], ClaimRow::from_row)
            .map_err(sql_err("claim list"))?
            .collect::<Result<Vec<_>, _>>()
            .map_err(sql_err("claim list"))?;
        rows.into_iter().map(ClaimRow::into_effect).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lexis_core::{
        DerivationEffect, DerivationStore, ExtractionEffect, RawResponseEffect, Stage, ToolCallSpec,
    };

    fn chain() -> (DerivationEffect, ClaimEffect) {
        let mut raw = RawResponseEffect::new("heritage-0", "http://localhost/cgi-bin/sktsearch")
            .with_status(200);
        raw.tool = "fetch.heritage".to_string();
        let extraction = ExtractionEffect::new(
            &ToolCallSpec::new(Stage::Extract, "extract.heritage.html", "heritage-0/extract", "lexis://extract"),
            &raw,
            "tokens",
            None,
            serde_json::json!({"tokens": ["Agni"]}),
        );
        let derivation = DerivationEffect::new(
            &ToolCallSpec::new(Stage::Derive, "derive.heritage.lemmas", "heritage-0/derive", "lexis://derive"),
            &extraction,
            "lemmas",
            None,
            serde_json::json!({"lemmas": ["agni"]}),
        );
        let claim = ClaimEffect::new(
            &ToolCallSpec::new(Stage::Claim, "claim.heritage.lemmas", "heritage-0/claim", "lexis://claim"),
            &derivation,
            "agni",
            "has_lemmas",
            serde_json::json!({"lemmas": ["agni"]}),
        );
        (derivation, claim)
    }

    #[tokio::test]
    async fn save_and_lookup_claims() {
        let db = Database::open_in_memory().unwrap();
        let claims = db.claims();
        let (derivation, claim) = chain();
        db.derivations().save_derivation(&derivation).await.unwrap();
        claims.save_claim(&claim).await.unwrap();

        let loaded = claims.get_claim(&claim.claim_id).await.unwrap().unwrap();
        assert_eq!(loaded, claim);

        let by_derivation = claims
            .list_claims_for_derivation(&derivation.derivation_id)
            .await
            .unwrap();
        assert_eq!(by_derivation.len(), 1);
        assert_eq!(by_derivation[0].subject, "agni");
        assert_eq!(by_derivation[0].predicate, "has_lemmas");
    }

    #[tokio::test]
    async fn derivation_roundtrip_keeps_chain() {
        let db = Database::open_in_memory().unwrap();
        let (derivation, _) = chain();
        db.derivations().save_derivation(&derivation).await.unwrap();
        let loaded = db
            .derivations()
            .get_derivation(&derivation.derivation_id)
            .await
            .unwrap()
            .unwrap();
        let stages: Vec<Stage> = loaded.provenance_chain.iter().map(|l| l.stage).collect();
        assert_eq!(stages, vec![Stage::Fetch, Stage::Extract, Stage::Derive]);
    }
}
