use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;
use uuid::Uuid;

use tickerflow_core::ControlRequest;
use tickerflow_store::{StateStore, StoreError};

const NONE: u8 = 0;
const PAUSE: u8 = 1;
const CANCEL: u8 = 2;

/// Pause/cancel flag for one in-process run. Cancel outranks pause.
pub struct RunControl {
    requested: AtomicU8,
    poll_interval: Duration,
    last_poll: Mutex<Option<Instant>>,
}

impl RunControl {
    pub fn new(poll_interval: Duration) -> Self {
        Self {
            requested: AtomicU8::new(NONE),
            poll_interval,
            last_poll: Mutex::new(None),
        }
    }

    pub fn request(&self, request: ControlRequest) {
        let level = match request {
            ControlRequest::Pause => PAUSE,
            ControlRequest::Cancel => CANCEL,
        };
        self.requested.fetch_max(level, Ordering::SeqCst);
    }

    pub fn requested(&self) -> Option<ControlRequest> {
        match self.requested.load(Ordering::SeqCst) {
            PAUSE => Some(ControlRequest::Pause),
            CANCEL => Some(ControlRequest::Cancel),
            _ => None,
        }
    }

    /// Local flag, plus the persisted `control_request` at most once per poll interval.
    pub async fn check(
        &self,
        store: &dyn StateStore,
        workflow_id: Uuid,
    ) -> Result<Option<ControlRequest>, StoreError> {
        {
            let mut last = self.last_poll.lock().await;
            let due = last.map_or(true, |t| t.elapsed() >= self.poll_interval);
            if due {
                *last = Some(Instant::now());
                if let Some(request) = store.take_control_request(workflow_id).await? {
                    self.request(request);
                }
            }
        }
        Ok(self.requested())
    }
}

/// Runs currently driven by this process, keyed by workflow id.
#[derive(Clone, Default)]
pub struct ControlRegistry {
    runs: Arc<Mutex<HashMap<Uuid, Arc<RunControl>>>>,
}

impl ControlRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `None` when the run already has a driver in this process.
    pub async fn register(&self, workflow_id: Uuid, poll_interval: Duration) -> Option<Arc<RunControl>> {
        match self.runs.lock().await.entry(workflow_id) {
            Entry::Occupied(_) => None,
            Entry::Vacant(slot) => Some(slot.insert(Arc::new(RunControl::new(poll_interval))).clone()),
        }
    }

    /// Returns false when the run is not driven by this process.
    pub async fn request(&self, workflow_id: Uuid, request: ControlRequest) -> bool {
        match self.runs.lock().await.get(&workflow_id) {
            Some(control) => {
                control.request(request);
                true
            }
            None => false,
        }
    }

    pub async fn unregister(&self, workflow_id: Uuid) {
        self.runs.lock().await.remove(&workflow_id);
    }
}
