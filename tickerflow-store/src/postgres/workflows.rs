use sqlx::PgPool;
use uuid::Uuid;

use tickerflow_core::{ControlRequest, StageName, WorkflowStatus};

use crate::store::{NewWorkflowExecution, StoreError, WorkflowExecution};

const WORKFLOW_COLUMNS: &str = "id, workflow_type, status, current_stage, symbols, metadata, \
     control_request, error_message, created_at, started_at, completed_at";

pub async fn create_workflow(
    pool: &PgPool,
    workflow: NewWorkflowExecution,
) -> Result<WorkflowExecution, StoreError> {
    let sql = format!(
        r#"
INSERT INTO workflow_executions (id, workflow_type, status, symbols, metadata)
VALUES ($1, $2, 'pending', $3, $4)
RETURNING {WORKFLOW_COLUMNS}
        "#
    );
    let rec = sqlx::query_as::<_, WorkflowExecution>(&sql)
        .bind(Uuid::new_v4())
        .bind(&workflow.workflow_type)
        .bind(&workflow.symbols)
        .bind(&workflow.metadata)
        .fetch_one(pool)
        .await?;
    Ok(rec)
}

pub async fn get_workflow(pool: &PgPool, id: Uuid) -> Result<Option<WorkflowExecution>, StoreError> {
    let sql = format!("SELECT {WORKFLOW_COLUMNS} FROM workflow_executions WHERE id = $1");
    let rec = sqlx::query_as::<_, WorkflowExecution>(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await?;
    Ok(rec)
}

pub async fn list_workflows(
    pool: &PgPool,
    status: Option<WorkflowStatus>,
    limit: i64,
) -> Result<Vec<WorkflowExecution>, StoreError> {
    let sql = format!(
        r#"
SELECT {WORKFLOW_COLUMNS}
FROM workflow_executions
WHERE ($1::text IS NULL OR status = $1)
ORDER BY created_at DESC
LIMIT $2
        "#
    );
    let rows = sqlx::query_as::<_, WorkflowExecution>(&sql)
        .bind(status.map(|s| s.as_str()))
        .bind(limit)
        .fetch_all(pool)
        .await?;
    Ok(rows)
}

/// Compare-and-set on `status`, so two drivers cannot both claim a run.
pub async fn mark_workflow_running(
    pool: &PgPool,
    id: Uuid,
    expected: WorkflowStatus,
) -> Result<bool, StoreError> {
    let res = sqlx::query(
        r#"
UPDATE workflow_executions
SET status = 'running',
    started_at = COALESCE(started_at, now()),
    completed_at = NULL,
    error_message = NULL
WHERE id = $1 AND status = $2
        "#,
    )
    .bind(id)
    .bind(expected.as_str())
    .execute(pool)
    .await?;
    if res.rows_affected() > 0 {
        return Ok(true);
    }
    let exists: Option<Uuid> = sqlx::query_scalar("SELECT id FROM workflow_executions WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?;
    match exists {
        Some(_) => Ok(false),
        None => Err(StoreError::not_found("workflow", id)),
    }
}

pub async fn set_workflow_status(
    pool: &PgPool,
    id: Uuid,
    status: WorkflowStatus,
) -> Result<(), StoreError> {
    sqlx::query("UPDATE workflow_executions SET status = $2 WHERE id = $1")
        .bind(id)
        .bind(status.as_str())
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn set_current_stage(
    pool: &PgPool,
    id: Uuid,
    stage: Option<StageName>,
) -> Result<(), StoreError> {
    sqlx::query("UPDATE workflow_executions SET current_stage = $2 WHERE id = $1")
        .bind(id)
        .bind(stage.map(|s| s.as_str()))
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn finish_workflow(
    pool: &PgPool,
    id: Uuid,
    status: WorkflowStatus,
    error_message: Option<String>,
) -> Result<(), StoreError> {
    sqlx::query(
        r#"
UPDATE workflow_executions
SET status = $2, error_message = $3, completed_at = now(), control_request = NULL
WHERE id = $1
        "#,
    )
    .bind(id)
    .bind(status.as_str())
    .bind(&error_message)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn request_control(
    pool: &PgPool,
    id: Uuid,
    request: ControlRequest,
) -> Result<(), StoreError> {
    // cancel wins over an earlier pause that has not been picked up yet
    sqlx::query(
        r#"
UPDATE workflow_executions
SET control_request = CASE
      WHEN control_request = 'cancel' THEN control_request
      ELSE $2
    END
WHERE id = $1
        "#,
    )
    .bind(id)
    .bind(request.as_str())
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn take_control_request(
    pool: &PgPool,
    id: Uuid,
) -> Result<Option<ControlRequest>, StoreError> {
    let taken: Option<String> = sqlx::query_scalar(
        r#"
WITH pending AS (
  SELECT id, control_request FROM workflow_executions
  WHERE id = $1 AND control_request IS NOT NULL
  FOR UPDATE
)
UPDATE workflow_executions w
SET control_request = NULL
FROM pending
WHERE w.id = pending.id
RETURNING pending.control_request
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;

    taken
        .map(|s| s.parse::<ControlRequest>())
        .transpose()
        .map_err(|e| StoreError::Other(e.to_string()))
}
