use sqlx::PgPool;
use uuid::Uuid;

use crate::store::{
    Checkpoint, GateResult, NewCheckpoint, NewEvent, NewGateResult, StoreError, WorkflowEvent,
};

pub async fn insert_gate_result(pool: &PgPool, result: NewGateResult) -> Result<(), StoreError> {
    sqlx::query(
        r#"
INSERT INTO gate_results
  (workflow_id, stage, symbol, gate_name, passed, action, reason, gates_short_circuited)
VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        "#,
    )
    .bind(result.workflow_id)
    .bind(result.stage.as_str())
    .bind(&result.symbol)
    .bind(&result.gate_name)
    .bind(result.passed)
    .bind(&result.action)
    .bind(&result.reason)
    .bind(result.gates_short_circuited)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn get_gate_results(pool: &PgPool, workflow_id: Uuid) -> Result<Vec<GateResult>, StoreError> {
    let rows = sqlx::query_as::<_, GateResult>(
        r#"
SELECT id, workflow_id, stage, symbol, gate_name, passed, action, reason,
       gates_short_circuited, created_at
FROM gate_results
WHERE workflow_id = $1
ORDER BY id
        "#,
    )
    .bind(workflow_id)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

pub async fn insert_checkpoint(pool: &PgPool, checkpoint: NewCheckpoint) -> Result<Checkpoint, StoreError> {
    let rec = sqlx::query_as::<_, Checkpoint>(
        r#"
INSERT INTO checkpoints (workflow_id, stage, state)
VALUES ($1, $2, $3)
RETURNING id, workflow_id, stage, state, created_at
        "#,
    )
    .bind(checkpoint.workflow_id)
    .bind(checkpoint.stage.as_str())
    .bind(&checkpoint.state)
    .fetch_one(pool)
    .await?;
    Ok(rec)
}

pub async fn latest_checkpoint(pool: &PgPool, workflow_id: Uuid) -> Result<Option<Checkpoint>, StoreError> {
    let rec = sqlx::query_as::<_, Checkpoint>(
        r#"
SELECT id, workflow_id, stage, state, created_at
FROM checkpoints
WHERE workflow_id = $1
ORDER BY id DESC
LIMIT 1
        "#,
    )
    .bind(workflow_id)
    .fetch_optional(pool)
    .await?;
    Ok(rec)
}

pub async fn list_checkpoints(pool: &PgPool, workflow_id: Uuid) -> Result<Vec<Checkpoint>, StoreError> {
    let rows = sqlx::query_as::<_, Checkpoint>(
        r#"
SELECT id, workflow_id, stage, state, created_at
FROM checkpoints
WHERE workflow_id = $1
ORDER BY id
        "#,
    )
    .bind(workflow_id)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

pub async fn append_event(pool: &PgPool, event: NewEvent) -> Result<(), StoreError> {
    sqlx::query(
        r#"
INSERT INTO workflow_events (workflow_id, stage, symbol, event_type, payload)
VALUES ($1, $2, $3, $4, $5)
        "#,
    )
    .bind(event.workflow_id)
    .bind(event.stage.map(|s| s.as_str()))
    .bind(&event.symbol)
    .bind(&event.event_type)
    .bind(&event.payload)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn get_events_after(
    pool: &PgPool,
    workflow_id: Uuid,
    after_id: i64,
    limit: i64,
) -> Result<Vec<WorkflowEvent>, StoreError> {
    let rows = sqlx::query_as::<_, WorkflowEvent>(
        r#"
SELECT id, workflow_id, ts, stage, symbol, event_type, payload
FROM workflow_events
WHERE workflow_id = $1 AND id > $2
ORDER BY id
LIMIT $3
        "#,
    )
    .bind(workflow_id)
    .bind(after_id)
    .bind(limit)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}
