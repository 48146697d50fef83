use sqlx::PgPool;
use uuid::Uuid;

use tickerflow_core::{StageName, SymbolStatus};

use crate::store::{StoreError, SymbolState, SymbolStateUpdate};

const SYMBOL_COLUMNS: &str = "workflow_id, symbol, stage, status, retry_count, error_message, \
     next_attempt_at, started_at, completed_at, updated_at";

pub async fn get_symbol_state(
    pool: &PgPool,
    workflow_id: Uuid,
    symbol: &str,
    stage: StageName,
) -> Result<Option<SymbolState>, StoreError> {
    let sql = format!(
        "SELECT {SYMBOL_COLUMNS} FROM symbol_states WHERE workflow_id = $1 AND symbol = $2 AND stage = $3"
    );
    let rec = sqlx::query_as::<_, SymbolState>(&sql)
        .bind(workflow_id)
        .bind(symbol)
        .bind(stage.as_str())
        .fetch_optional(pool)
        .await?;
    Ok(rec)
}

pub async fn get_symbol_states(
    pool: &PgPool,
    workflow_id: Uuid,
    stage: StageName,
) -> Result<Vec<SymbolState>, StoreError> {
    let sql = format!(
        "SELECT {SYMBOL_COLUMNS} FROM symbol_states WHERE workflow_id = $1 AND stage = $2 ORDER BY symbol"
    );
    let rows = sqlx::query_as::<_, SymbolState>(&sql)
        .bind(workflow_id)
        .bind(stage.as_str())
        .fetch_all(pool)
        .await?;
    Ok(rows)
}

pub async fn upsert_symbol_state(
    pool: &PgPool,
    update: SymbolStateUpdate,
) -> Result<SymbolState, StoreError> {
    let sql = format!(
        r#"
INSERT INTO symbol_states
  (workflow_id, symbol, stage, status, retry_count, error_message, next_attempt_at,
   started_at, completed_at, updated_at)
VALUES ($1, $2, $3, $4, $5, $6, $7,
        CASE WHEN $8 THEN now() END,
        CASE WHEN $9 THEN now() END,
        now())
ON CONFLICT (workflow_id, symbol, stage) DO UPDATE
SET status = EXCLUDED.status,
    retry_count = EXCLUDED.retry_count,
    error_message = EXCLUDED.error_message,
    next_attempt_at = EXCLUDED.next_attempt_at,
    started_at = COALESCE(symbol_states.started_at, EXCLUDED.started_at),
    completed_at = EXCLUDED.completed_at,
    updated_at = now()
RETURNING {SYMBOL_COLUMNS}
        "#
    );
    let rec = sqlx::query_as::<_, SymbolState>(&sql)
        .bind(update.workflow_id)
        .bind(&update.symbol)
        .bind(update.stage.as_str())
        .bind(update.status.as_str())
        .bind(update.retry_count)
        .bind(&update.error_message)
        .bind(update.next_attempt_at)
        .bind(update.status == SymbolStatus::Running)
        .bind(update.status.is_terminal())
        .fetch_one(pool)
        .await?;
    Ok(rec)
}

pub async fn reset_stale_running(pool: &PgPool, workflow_id: Uuid) -> Result<i64, StoreError> {
    let res = sqlx::query(
        r#"
UPDATE symbol_states
SET status = 'pending', updated_at = now()
WHERE workflow_id = $1 AND status = 'running'
        "#,
    )
    .bind(workflow_id)
    .execute(pool)
    .await?;
    Ok(res.rows_affected() as i64)
}
