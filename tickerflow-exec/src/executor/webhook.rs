use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use url::Url;

use crate::executor::http::HttpClient;
use crate::executor::{Event, EventSink};

const WEBHOOK_TIMEOUT: Duration = Duration::from_secs(5);

/// Forwards every event to `base` and POSTs terminal and paused workflow events
/// to a webhook. Delivery is fire-and-forget.
pub struct WebhookEventSink {
    url: Url,
    http: Arc<dyn HttpClient>,
    base: Arc<dyn EventSink>,
}

impl WebhookEventSink {
    pub fn new(url: Url, http: Arc<dyn HttpClient>, base: Arc<dyn EventSink>) -> Self {
        Self { url, http, base }
    }
}

#[async_trait]
impl EventSink for WebhookEventSink {
    async fn emit(&self, event: Event) {
        self.base.emit(event.clone()).await;

        if !matches!(event, Event::WorkflowFinished { .. } | Event::WorkflowPaused { .. }) {
            return;
        }

        let payload = event.to_json();
        let url = self.url.clone();
        let http = self.http.clone();
        tokio::spawn(async move {
            if let Err(e) = http.post_json(&url, &payload, WEBHOOK_TIMEOUT).await {
                tracing::warn!(url = %url, error = %e, "webhook delivery failed");
            }
        });
    }
}
