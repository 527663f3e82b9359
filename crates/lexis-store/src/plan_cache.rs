// crates/lexis-store/src/plan_cache.rs
//
// Plan-level result cache: `plan_hash` -> serialized response-ref list.
//
// Timestamps are stored as fixed-width RFC 3339 UTC strings so that string
// comparison in SQL matches chronological order.

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, OptionalExtension};

use lexis_core::{ExecutedPlan, LexisError, PlanResponseStore, ToolResponseRef};

use crate::db::{sql_err, Database};

fn timestamp(t: DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// SQLite-backed [`PlanResponseStore`].
#[derive(Clone)]
pub struct PlanResponseIndex {
    db: Database,
}

impl PlanResponseIndex {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// When the entry for `plan_hash` was last read or written.
    pub fn last_accessed(&self, plan_hash: &str) -> Result<Option<DateTime<Utc>>, LexisError> {
        let conn = self.db.connection()?;
        let value: Option<String> = conn
            .query_row(
                "SELECT last_accessed FROM plan_responses WHERE plan_hash = ?1",
                params![plan_hash],
                |row| row.get(0),
            )
            .optional()
            .map_err(sql_err("plan cache lookup"))?;
        value
            .map(|s| {
                DateTime::parse_from_rfc3339(&s)
                    .map(|t| t.with_timezone(&Utc))
                    .map_err(|e| LexisError::Serialization(format!("Bad last_accessed {}: {}", s, e)))
            })
            .transpose()
    }
}

#[async_trait]
impl PlanResponseStore for PlanResponseIndex {
    async fn save_executed_plan(&self, plan: &ExecutedPlan) -> Result<(), LexisError> {
        let responses = serde_json::to_string(&plan.responses)?;
        let now = timestamp(Utc::now());
        let conn = self.db.connection()?;
        conn.execute(
            "INSERT OR REPLACE INTO plan_responses
                (plan_hash, plan_id, responses, execution_time_ms, created_at, last_accessed)
             VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
            params![
                plan.plan_hash,
                plan.plan_id,
                responses,
                plan.execution_time_ms as i64,
                now,
            ],
        )
        .map_err(sql_err("plan cache upsert"))?;
        Ok(())
    }

    async fn get_executed_plan(&self, plan_hash: &str) -> Result<Option<ExecutedPlan>, LexisError> {
        let conn = self.db.connection()?;
        let row: Option<(String, String, i64)> = conn
            .query_row(
                "SELECT plan_id, responses, execution_time_ms FROM plan_responses WHERE plan_hash = ?1",
                params![plan_hash],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .optional()
            .map_err(sql_err("plan cache lookup"))?;

        let Some((plan_id, responses, execution_time_ms)) = row else {
            return Ok(None);
        };

        conn.execute(
            "UPDATE plan_responses SET last_accessed = ?1 WHERE plan_hash = ?2",
            params![timestamp(Utc::now()), plan_hash],
        )
        .map_err(sql_err("plan cache touch"))?;

        let responses: Vec<ToolResponseRef> = serde_json::from_str(&responses)?;
        Ok(Some(ExecutedPlan {
            plan_id,
            plan_hash: plan_hash.to_string(),
            responses,
            execution_time_ms: execution_time_ms.max(0) as u64,
            from_cache: false,
        }))
    }

    async fn prune_older_than(&self, cutoff: DateTime<Utc>) -> Result<usize, LexisError> {
        let conn = self.db.connection()?;
        let removed = conn
            .execute(
                "DELETE FROM plan_responses WHERE last_accessed < ?1",
                params![timestamp(cutoff)],
            )
            .map_err(sql_err("plan cache prune"))?;
        if removed > 0 {
            tracing::debug!("Pruned {} stale plan cache entries", removed);
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use lexis_core::Stage;

    fn executed(plan_hash: &str) -> ExecutedPlan {
        ExecutedPlan {
            plan_id: "plan-1".to_string(),
            plan_hash: plan_hash.to_string(),
            responses: vec![ToolResponseRef {
                tool: "fetch.diogenes".to_string(),
                call_id: "diogenes-0".to_string(),
                response_id: "raw-1".to_string(),
                stage: Stage::Fetch,
                cached: false,
            }],
            execution_time_ms: 12,
            from_cache: false,
        }
    }

    #[tokio::test]
    async fn save_and_get_plan() {
        let index = Database::open_in_memory().unwrap().plan_responses();
        assert!(index.get_executed_plan("h1").await.unwrap().is_none());

        let plan = executed("h1");
        index.save_executed_plan(&plan).await.unwrap();
        let loaded = index.get_executed_plan("h1").await.unwrap().unwrap();
        assert_eq!(loaded, plan);
    }

    #[tokio::test]
    async fn get_refreshes_last_accessed() {
        let index = Database::open_in_memory().unwrap().plan_responses();
        index.save_executed_plan(&executed("h1")).await.unwrap();
        let first = index.last_accessed("h1").unwrap().unwrap();

        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        index.get_executed_plan("h1").await.unwrap();
        let second = index.last_accessed("h1").unwrap().unwrap();
        assert!(second > first);
    }

    #[tokio::test]
    async fn prune_removes_only_stale_entries() {
        let index = Database::open_in_memory().unwrap().plan_responses();
        index.save_executed_plan(&executed("h1")).await.unwrap();
        index.save_executed_plan(&executed("h2")).await.unwrap();

        let removed = index
            .prune_older_than(Utc::now() - Duration::hours(1))
            .await
            .unwrap();
        assert_eq!(removed, 0);

        let removed = index
            .prune_older_than(Utc::now() + Duration::seconds(1))
            .await
            .unwrap();
        assert_eq!(removed, 2);
        assert!(index.get_executed_plan("h1").await.unwrap().is_none());
    }
}
