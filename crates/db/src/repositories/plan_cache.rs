use async_trait::async_trait;
use chrono::{DateTime, Utc};
use restock_core::cache::{CacheError, CacheNamespace, PlanCache, StoreOutcome};
use restock_core::domain::plan::{CachedPlan, Fingerprint, InputsEcho, ProcurementPlan};
use sqlx::{sqlite::SqliteRow, Row};

use super::RepositoryError;
use crate::DbPool;

/// SQLite-backed plan cache. Each row is written by one statement, so readers
/// never observe a partial entry.
pub struct SqlPlanCache {
    pool: DbPool,
}

impl SqlPlanCache {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn count(&self, namespace: &CacheNamespace) -> Result<i64, RepositoryError> {
        let row = sqlx::query("SELECT COUNT(*) AS count FROM plan_cache WHERE namespace = ?")
            .bind(&namespace.0)
            .fetch_one(&self.pool)
            .await?;
        Ok(row.try_get::<i64, _>("count")?)
    }

    async fn find(
        &self,
        namespace: &CacheNamespace,
        fingerprint: &Fingerprint,
    ) -> Result<Option<CachedPlan>, RepositoryError> {
        let row = sqlx::query(
            r#"
            SELECT fingerprint, plan_json, inputs_echo_json, created_at
            FROM plan_cache
            WHERE namespace = ? AND fingerprint = ?
            "#,
        )
        .bind(&namespace.0)
        .bind(fingerprint.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map(|row| cached_plan_from_row(&row)).transpose()
    }

    async fn insert(
        &self,
        namespace: &CacheNamespace,
        plan: &CachedPlan,
    ) -> Result<StoreOutcome, RepositoryError> {
        let plan_json = serde_json::to_string(&plan.response_body)
            .map_err(|error| RepositoryError::Decode(error.to_string()))?;
        let inputs_echo_json = serde_json::to_string(&plan.inputs_echo)
            .map_err(|error| RepositoryError::Decode(error.to_string()))?;
        let content_hash = plan.response_body.content_hash();
        let status = match plan.response_body {
            ProcurementPlan::Success(_) => "SUCCESS",
            ProcurementPlan::Refused(_) => "REFUSED",
        };

        let inserted = sqlx::query(
            r#"
            INSERT INTO plan_cache (
                namespace, fingerprint, plan_status, plan_json, inputs_echo_json,
                content_hash, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(namespace, fingerprint) DO NOTHING
            "#,
        )
        .bind(&namespace.0)
        .bind(plan.fingerprint.as_str())
        .bind(status)
        .bind(plan_json)
        .bind(inputs_echo_json)
        .bind(&content_hash)
        .bind(plan.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?
        .rows_affected();

        if inserted == 1 {
            return Ok(StoreOutcome::Stored);
        }

        let existing_hash: String = sqlx::query(
            "SELECT content_hash FROM plan_cache WHERE namespace = ? AND fingerprint = ?",
        )
        .bind(&namespace.0)
        .bind(plan.fingerprint.as_str())
        .fetch_one(&self.pool)
        .await?
        .try_get("content_hash")?;

        if existing_hash == content_hash {
            Ok(StoreOutcome::AlreadyPresent)
        } else {
            Ok(StoreOutcome::AlreadyExistsButDiffers)
        }
    }
}

#[async_trait]
impl PlanCache for SqlPlanCache {
    async fn lookup(
        &self,
        namespace: &CacheNamespace,
        fingerprint: &Fingerprint,
    ) -> Result<Option<CachedPlan>, CacheError> {
        Ok(self.find(namespace, fingerprint).await?)
    }

    async fn store(
        &self,
        namespace: &CacheNamespace,
        plan: &CachedPlan,
    ) -> Result<StoreOutcome, CacheError> {
        Ok(self.insert(namespace, plan).await?)
    }
}

fn cached_plan_from_row(row: &SqliteRow) -> Result<CachedPlan, RepositoryError> {
    let fingerprint: String = row.try_get("fingerprint")?;
    let plan_json: String = row.try_get("plan_json")?;
    let inputs_echo_json: String = row.try_get("inputs_echo_json")?;
    let created_at: String = row.try_get("created_at")?;

    let response_body = serde_json::from_str::<ProcurementPlan>(&plan_json)
        .map_err(|error| RepositoryError::Decode(format!("plan_json: {error}")))?;
    let inputs_echo = serde_json::from_str::<InputsEcho>(&inputs_echo_json)
        .map_err(|error| RepositoryError::Decode(format!("inputs_echo_json: {error}")))?;
    let created_at = DateTime::parse_from_rfc3339(&created_at)
        .map(|value| value.with_timezone(&Utc))
        .map_err(|error| RepositoryError::Decode(format!("created_at: {error}")))?;

    Ok(CachedPlan { fingerprint: Fingerprint(fingerprint), response_body, created_at, inputs_echo })
}
