use sqlx::PgPool;
use uuid::Uuid;

use crate::store::{DlqEntry, NewDlqEntry, StoreError};

const DLQ_COLUMNS: &str = "id, workflow_id, symbol, stage, error_message, error_type, context, \
     retry_count, resolved, resolved_at, resolved_by, created_at";

pub async fn insert_dlq_entry(pool: &PgPool, entry: NewDlqEntry) -> Result<i64, StoreError> {
    let id: i64 = sqlx::query_scalar(
        r#"
INSERT INTO dlq_entries
  (workflow_id, symbol, stage, error_message, error_type, context, retry_count)
VALUES ($1, $2, $3, $4, $5, $6, $7)
RETURNING id
        "#,
    )
    .bind(entry.workflow_id)
    .bind(&entry.symbol)
    .bind(entry.stage.as_str())
    .bind(&entry.error_message)
    .bind(&entry.error_type)
    .bind(&entry.context)
    .bind(entry.retry_count)
    .fetch_one(pool)
    .await?;
    Ok(id)
}

pub async fn list_dlq(pool: &PgPool, resolved: bool, limit: i64) -> Result<Vec<DlqEntry>, StoreError> {
    let sql = format!(
        "SELECT {DLQ_COLUMNS} FROM dlq_entries WHERE resolved = $1 ORDER BY created_at DESC, id DESC LIMIT $2"
    );
    let rows = sqlx::query_as::<_, DlqEntry>(&sql)
        .bind(resolved)
        .bind(limit)
        .fetch_all(pool)
        .await?;
    Ok(rows)
}

pub async fn list_workflow_dlq(pool: &PgPool, workflow_id: Uuid) -> Result<Vec<DlqEntry>, StoreError> {
    let sql = format!("SELECT {DLQ_COLUMNS} FROM dlq_entries WHERE workflow_id = $1 ORDER BY id");
    let rows = sqlx::query_as::<_, DlqEntry>(&sql)
        .bind(workflow_id)
        .fetch_all(pool)
        .await?;
    Ok(rows)
}

pub async fn get_dlq_entry(pool: &PgPool, id: i64) -> Result<Option<DlqEntry>, StoreError> {
    let sql = format!("SELECT {DLQ_COLUMNS} FROM dlq_entries WHERE id = $1");
    let rec = sqlx::query_as::<_, DlqEntry>(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await?;
    Ok(rec)
}

pub async fn resolve_dlq_entry(pool: &PgPool, id: i64, resolved_by: &str) -> Result<bool, StoreError> {
    let res = sqlx::query(
        r#"
UPDATE dlq_entries
SET resolved = TRUE, resolved_at = now(), resolved_by = $2
WHERE id = $1 AND resolved = FALSE
        "#,
    )
    .bind(id)
    .bind(resolved_by)
    .execute(pool)
    .await?;
    Ok(res.rows_affected() > 0)
}

pub async fn count_open_dlq(pool: &PgPool, workflow_id: Uuid) -> Result<i64, StoreError> {
    let count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM dlq_entries WHERE workflow_id = $1 AND resolved = FALSE",
    )
    .bind(workflow_id)
    .fetch_one(pool)
    .await?;
    Ok(count)
}
