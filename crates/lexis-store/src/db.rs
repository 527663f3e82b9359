// crates/lexis-store/src/db.rs
//
// SQLite database handle with r2d2 connection pooling.
//
// Tables (one per effect type plus the plan cache), all keyed by the
// effect's stable ID and written with `INSERT OR REPLACE`:
//   raw_responses   (response_id PK)
//   extractions     (extraction_id PK)
//   derivations     (derivation_id PK)
//   claims          (claim_id PK)
//   plan_responses  (plan_hash PK)
//
// Each index write is a single autocommit statement, so concurrent writers to
// different tables never hold overlapping locks.

use std::path::Path;

use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;

use lexis_core::LexisError;

use crate::claim::ClaimIndex;
use crate::derivation::DerivationIndex;
use crate::extraction::ExtractionIndex;
use crate::plan_cache::PlanResponseIndex;
use crate::raw::RawResponseIndex;

/// Type alias for the connection pool.
pub type DbPool = Pool<SqliteConnectionManager>;

/// Type alias for a connection checked out of the pool.
pub type DbConnection = PooledConnection<SqliteConnectionManager>;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS raw_responses (
    response_id TEXT PRIMARY KEY,
    tool TEXT NOT NULL,
    call_id TEXT NOT NULL,
    endpoint TEXT NOT NULL,
    status_code INTEGER NOT NULL,
    content_type TEXT NOT NULL,
    headers TEXT NOT NULL,
    body BLOB NOT NULL,
    fetch_duration_ms INTEGER NOT NULL DEFAULT 0,
    created_at TEXT DEFAULT CURRENT_TIMESTAMP
);
CREATE INDEX IF NOT EXISTS idx_raw_responses_call ON raw_responses(call_id);

CREATE TABLE IF NOT EXISTS extractions (
    extraction_id TEXT PRIMARY KEY,
    response_id TEXT NOT NULL,
    tool TEXT NOT NULL,
    call_id TEXT NOT NULL,
    source_call_id TEXT NOT NULL,
    kind TEXT NOT NULL,
    canonical TEXT,
    payload TEXT NOT NULL,
    provenance_chain TEXT NOT NULL,
    load_duration_ms INTEGER NOT NULL DEFAULT 0,
    created_at TEXT DEFAULT CURRENT_TIMESTAMP
);
CREATE INDEX IF NOT EXISTS idx_extractions_response ON extractions(response_id);

CREATE TABLE IF NOT EXISTS derivations (
    derivation_id TEXT PRIMARY KEY,
    extraction_id TEXT NOT NULL,
    tool TEXT NOT NULL,
    call_id TEXT NOT NULL,
    source_call_id TEXT NOT NULL,
    kind TEXT NOT NULL,
    canonical TEXT,
    payload TEXT NOT NULL,
    provenance_chain TEXT NOT NULL,
    derive_duration_ms INTEGER NOT NULL DEFAULT 0,
    created_at TEXT DEFAULT CURRENT_TIMESTAMP
);
CREATE INDEX IF NOT EXISTS idx_derivations_extraction ON derivations(extraction_id);

CREATE TABLE IF NOT EXISTS claims (
    claim_id TEXT PRIMARY KEY,
    derivation_id TEXT NOT NULL,
    tool TEXT NOT NULL,
    call_id TEXT NOT NULL,
    source_call_id TEXT NOT NULL,
    subject TEXT NOT NULL,
    predicate TEXT NOT NULL,
    value TEXT NOT NULL,
    provenance_chain TEXT NOT NULL,
    load_duration_ms INTEGER NOT NULL DEFAULT 0,
    created_at TEXT DEFAULT CURRENT_TIMESTAMP
);
CREATE INDEX IF NOT EXISTS idx_claims_derivation ON claims(derivation_id);

CREATE TABLE IF NOT EXISTS plan_responses (
    plan_hash TEXT PRIMARY KEY,
    plan_id TEXT NOT NULL,
    responses TEXT NOT NULL,
    execution_time_ms INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL,
    last_accessed TEXT NOT NULL
);
";

/// Map a rusqlite error into a storage error tagged with the failed operation.
pub(crate) fn sql_err(op: &'static str) -> impl FnOnce(rusqlite::Error) -> LexisError {
    move |e| LexisError::Storage(format!("SQLite {} failed: {}", op, e))
}

/// Pooled SQLite database holding every effect index.
#[derive(Clone)]
pub struct Database {
    pool: DbPool,
}

impl Database {
    /// Open (or create) a database file at `path`.
    ///
    /// Creates the parent directory if needed and enables WAL so readers do
    /// not block the single writer.
    pub fn open(path: &Path) -> Result<Self, LexisError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    LexisError::Storage(format!(
                        "Failed to create database directory {}: {}",
                        parent.display(),
                        e
                    ))
                })?;
            }
        }

        let manager = SqliteConnectionManager::file(path).with_init(|conn| {
            conn.execute_batch("PRAGMA journal_mode = WAL; PRAGMA busy_timeout = 5000;")
        });
        let pool = Pool::builder().max_size(8).build(manager).map_err(|e| {
            LexisError::Storage(format!(
                "Failed to open SQLite database at {}: {}",
                path.display(),
                e
            ))
        })?;

        let db = Self { pool };
        db.init_schema()?;
        tracing::debug!("Opened effect store at {}", path.display());
        Ok(db)
    }

    /// Create an in-memory database for tests and one-shot runs.
    ///
    /// Every in-memory connection is its own database, so the pool is capped
    /// at a single connection.
    pub fn open_in_memory() -> Result<Self, LexisError> {
        let manager = SqliteConnectionManager::memory();
        let pool = Pool::builder()
            .max_size(1)
            .build(manager)
            .map_err(|e| LexisError::Storage(format!("Failed to create connection pool: {}", e)))?;

        let db = Self { pool };
        db.init_schema()?;
        Ok(db)
    }

    /// Check out a pooled connection.
    pub fn connection(&self) -> Result<DbConnection, LexisError> {
        self.pool
            .get()
            .map_err(|e| LexisError::Storage(format!("Failed to get connection: {}", e)))
    }

    fn init_schema(&self) -> Result<(), LexisError> {
        let conn = self.connection()?;
        conn.execute_batch(SCHEMA).map_err(sql_err("schema init"))
    }

    pub fn raw_responses(&self) -> RawResponseIndex {
        RawResponseIndex::new(self.clone())
    }

    pub fn extractions(&self) -> ExtractionIndex {
        ExtractionIndex::new(self.clone())
    }

    pub fn derivations(&self) -> DerivationIndex {
        DerivationIndex::new(self.clone())
    }

    pub fn claims(&self) -> ClaimIndex {
        ClaimIndex::new(self.clone())
    }

    pub fn plan_responses(&self) -> PlanResponseIndex {
        PlanResponseIndex::new(self.clone())
    }

    /// Row count of one of the effect tables.
    pub fn count_rows(&self, table: EffectTable) -> Result<u64, LexisError> {
        let conn = self.connection()?;
        let sql = format!("SELECT COUNT(*) FROM {}", table.name());
        let count: i64 = conn
            .query_row(&sql, [], |row| row.get(0))
            .map_err(sql_err("count"))?;
        Ok(count as u64)
    }
}

/// The tables managed by [`Database`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EffectTable {
    RawResponses,
    Extractions,
    Derivations,
    Claims,
    PlanResponses,
}

impl EffectTable {
    pub fn name(&self) -> &'static str {
        match self {
            EffectTable::RawResponses => "raw_responses",
            EffectTable::Extractions => "extractions",
            EffectTable::Derivations => "derivations",
            EffectTable::Claims => "claims",
            EffectTable::PlanResponses => "plan_responses",
        }
    }
}
