use std::sync::Arc;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use tickerflow_core::{StageName, StageStatus, WorkflowType};
use tickerflow_store::{Checkpoint, NewCheckpoint, StateStore};

use crate::error::EngineError;

pub const CHECKPOINT_VERSION: u32 = 1;

/// Resume cursor written after every stage and on pause/cancel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckpointState {
    pub version: u32,
    pub stage_index: usize,
    pub stage: StageName,
    pub stage_status: StageStatus,
    pub next_stage_index: usize,
    pub completed_stages: Vec<StageName>,
    /// Symbols of `stage` still pending, deferred or retrying.
    pub pending_symbols: Vec<String>,
    pub config_hash: String,
}

/// SHA-256 over the canonical JSON form of a workflow type.
pub fn config_hash(workflow_type: &WorkflowType) -> Result<String, EngineError> {
    let bytes = serde_json::to_vec(workflow_type)
        .map_err(|e| EngineError::Internal(format!("serialize workflow type: {e}")))?;
    Ok(hex::encode(Sha256::digest(&bytes)))
}

pub struct CheckpointManager {
    store: Arc<dyn StateStore>,
}

impl CheckpointManager {
    pub fn new(store: Arc<dyn StateStore>) -> Self {
        Self { store }
    }

    pub async fn save(&self, workflow_id: Uuid, state: &CheckpointState) -> Result<Checkpoint, EngineError> {
        let value = serde_json::to_value(state)
            .map_err(|e| EngineError::Internal(format!("serialize checkpoint: {e}")))?;
        let rec = self
            .store
            .insert_checkpoint(NewCheckpoint {
                workflow_id,
                stage: state.stage,
                state: value,
            })
            .await?;
        Ok(rec)
    }

    /// Latest checkpoint, validated against the current workflow type.
    pub async fn latest(
        &self,
        workflow_id: Uuid,
        workflow_type: &WorkflowType,
    ) -> Result<Option<CheckpointState>, EngineError> {
        let Some(rec) = self.store.latest_checkpoint(workflow_id).await? else {
            return Ok(None);
        };
        let corrupt = |reason: String| EngineError::CheckpointCorrupt { workflow_id, reason };

        let state: CheckpointState = serde_json::from_value(rec.state)
            .map_err(|e| corrupt(format!("checkpoint {} does not deserialize: {e}", rec.id)))?;

        if state.version != CHECKPOINT_VERSION {
            return Err(corrupt(format!("unsupported version {}", state.version)));
        }
        for stage in std::iter::once(&state.stage).chain(&state.completed_stages) {
            if workflow_type.stage(*stage).is_none() {
                return Err(corrupt(format!(
                    "stage '{stage}' is not part of workflow type '{}'",
                    workflow_type.name
                )));
            }
        }
        if workflow_type.stage_index(state.stage) != Some(state.stage_index) {
            return Err(corrupt(format!(
                "stage '{}' recorded at index {}",
                state.stage, state.stage_index
            )));
        }

        let actual = config_hash(workflow_type)?;
        if state.config_hash != actual {
            return Err(EngineError::ConfigDrift {
                workflow_id,
                expected: state.config_hash,
                actual,
            });
        }
        Ok(Some(state))
    }
}
