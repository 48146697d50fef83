use sqlx::PgPool;
use uuid::Uuid;

use tickerflow_core::{StageName, StageStatus};

use crate::store::{CounterDelta, StageCounters, StageExecution, StoreError};

const STAGE_COLUMNS: &str = "workflow_id, stage_name, stage_index, status, retry_count, \
     symbols_processed, symbols_succeeded, symbols_failed, symbols_skipped, started_at, completed_at";

pub async fn begin_stage(
    pool: &PgPool,
    workflow_id: Uuid,
    stage: StageName,
    stage_index: i32,
) -> Result<StageExecution, StoreError> {
    let sql = format!(
        r#"
INSERT INTO stage_executions (workflow_id, stage_name, stage_index, status, started_at)
VALUES ($1, $2, $3, 'running', now())
ON CONFLICT (workflow_id, stage_name) DO UPDATE
SET status = 'running',
    started_at = COALESCE(stage_executions.started_at, now()),
    completed_at = NULL
RETURNING {STAGE_COLUMNS}
        "#
    );
    let rec = sqlx::query_as::<_, StageExecution>(&sql)
        .bind(workflow_id)
        .bind(stage.as_str())
        .bind(stage_index)
        .fetch_one(pool)
        .await?;
    Ok(rec)
}

pub async fn increment_stage_counters(
    pool: &PgPool,
    workflow_id: Uuid,
    stage: StageName,
    delta: CounterDelta,
) -> Result<(), StoreError> {
    sqlx::query(
        r#"
UPDATE stage_executions
SET symbols_processed = symbols_processed + $3,
    symbols_succeeded = symbols_succeeded + $4,
    symbols_failed = symbols_failed + $5,
    symbols_skipped = symbols_skipped + $6
WHERE workflow_id = $1 AND stage_name = $2
        "#,
    )
    .bind(workflow_id)
    .bind(stage.as_str())
    .bind(delta.processed)
    .bind(delta.succeeded)
    .bind(delta.failed)
    .bind(delta.skipped)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn set_stage_counters(
    pool: &PgPool,
    workflow_id: Uuid,
    stage: StageName,
    counters: StageCounters,
) -> Result<(), StoreError> {
    sqlx::query(
        r#"
UPDATE stage_executions
SET symbols_processed = $3,
    symbols_succeeded = $4,
    symbols_failed = $5,
    symbols_skipped = $6
WHERE workflow_id = $1 AND stage_name = $2
        "#,
    )
    .bind(workflow_id)
    .bind(stage.as_str())
    .bind(counters.processed)
    .bind(counters.succeeded)
    .bind(counters.failed)
    .bind(counters.skipped)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn finish_stage(
    pool: &PgPool,
    workflow_id: Uuid,
    stage: StageName,
    status: StageStatus,
    retry_count: i32,
) -> Result<(), StoreError> {
    sqlx::query(
        r#"
UPDATE stage_executions
SET status = $3,
    retry_count = $4,
    completed_at = CASE WHEN $5 THEN now() ELSE NULL END
WHERE workflow_id = $1 AND stage_name = $2
        "#,
    )
    .bind(workflow_id)
    .bind(stage.as_str())
    .bind(status.as_str())
    .bind(retry_count)
    .bind(status.is_terminal())
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn get_stage_execution(
    pool: &PgPool,
    workflow_id: Uuid,
    stage: StageName,
) -> Result<Option<StageExecution>, StoreError> {
    let sql = format!(
        "SELECT {STAGE_COLUMNS} FROM stage_executions WHERE workflow_id = $1 AND stage_name = $2"
    );
    let rec = sqlx::query_as::<_, StageExecution>(&sql)
        .bind(workflow_id)
        .bind(stage.as_str())
        .fetch_optional(pool)
        .await?;
    Ok(rec)
}

pub async fn get_stage_executions(
    pool: &PgPool,
    workflow_id: Uuid,
) -> Result<Vec<StageExecution>, StoreError> {
    let sql = format!(
        "SELECT {STAGE_COLUMNS} FROM stage_executions WHERE workflow_id = $1 ORDER BY stage_index ASC"
    );
    let rows = sqlx::query_as::<_, StageExecution>(&sql)
        .bind(workflow_id)
        .fetch_all(pool)
        .await?;
    Ok(rows)
}
