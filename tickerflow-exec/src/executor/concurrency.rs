use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use tickerflow_core::StageName;

use crate::error::EngineError;

/// Global limit for a run plus optional per-stage limits (provider rate limits).
pub struct ConcurrencyLimits {
    global: Arc<Semaphore>,
    per_stage: HashMap<StageName, Arc<Semaphore>>,
}

impl ConcurrencyLimits {
    pub fn new(global_limit: usize, per_stage_limits: &BTreeMap<StageName, usize>) -> Self {
        Self {
            global: Arc::new(Semaphore::new(global_limit.max(1))),
            per_stage: per_stage_limits
                .iter()
                .map(|(stage, limit)| (*stage, Arc::new(Semaphore::new((*limit).max(1)))))
                .collect(),
        }
    }

    pub async fn acquire(&self, stage: StageName) -> Result<ConcurrencyPermit, EngineError> {
        let global = self
            .global
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| EngineError::Internal("concurrency semaphore closed".into()))?;
        let stage_permit = match self.per_stage.get(&stage) {
            Some(sem) => Some(
                sem.clone()
                    .acquire_owned()
                    .await
                    .map_err(|_| EngineError::Internal(format!("semaphore for stage '{stage}' closed")))?,
            ),
            None => None,
        };
        Ok(ConcurrencyPermit {
            _global: global,
            _stage: stage_permit,
        })
    }
}

pub struct ConcurrencyPermit {
    _global: OwnedSemaphorePermit,
    _stage: Option<OwnedSemaphorePermit>,
}
