use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tempora_application::FlowOrchestrator;
use tempora_core::{AppError, AppResult};
use tempora_domain::FlowSpec;
use tracing::{debug, warn};
use uuid::Uuid;

#[derive(Debug, Serialize)]
struct FlowRunRequest<'a> {
    execution_id: Uuid,
    flow_uri: &'a str,
    flow_version: &'a str,
    description: Option<&'a str>,
    properties: &'a BTreeMap<String, String>,
}

/// Orchestrator that hands resolved flows to an execution engine over HTTP.
pub struct HttpFlowOrchestrator {
    http_client: reqwest::Client,
    endpoint: String,
    max_attempts: u8,
    retry_backoff_ms: u64,
}

impl HttpFlowOrchestrator {
    /// Creates a new orchestrator posting to `endpoint`.
    #[must_use]
    pub fn new(
        http_client: reqwest::Client,
        endpoint: impl Into<String>,
        max_attempts: u8,
        retry_backoff_ms: u64,
    ) -> Self {
        Self {
            http_client,
            endpoint: endpoint.into(),
            max_attempts: max_attempts.max(1),
            retry_backoff_ms: retry_backoff_ms.max(50),
        }
    }
}

#[async_trait]
impl FlowOrchestrator for HttpFlowOrchestrator {
    async fn orchestrate(&self, flow_spec: &FlowSpec) -> AppResult<()> {
        let request = FlowRunRequest {
            execution_id: Uuid::new_v4(),
            flow_uri: flow_spec.uri(),
            flow_version: flow_spec.version(),
            description: flow_spec.description(),
            properties: flow_spec.properties(),
        };
        let idempotency_key = request.execution_id.to_string();

        let mut attempt = 0_u8;
        let mut last_error: Option<String> = None;

        while attempt < self.max_attempts {
            attempt = attempt.saturating_add(1);
            let response = self
                .http_client
                .post(self.endpoint.as_str())
                .header("Idempotency-Key", idempotency_key.as_str())
                .header("X-Tempora-Flow", flow_spec.uri())
                .json(&request)
                .send()
                .await;

            match response {
                Ok(response) if response.status().is_success() => {
                    debug!(flow_uri = %flow_spec.uri(), attempt, "execution engine accepted flow run");
                    return Ok(());
                }
                Ok(response)
                    if response.status().is_server_error()
                        || response.status() == reqwest::StatusCode::TOO_MANY_REQUESTS =>
                {
                    last_error = Some(format!(
                        "transient HTTP status {} running flow '{}'",
                        response.status(),
                        flow_spec.uri()
                    ));
                }
                Ok(response) => {
                    let status = response.status();
                    let body = response
                        .text()
                        .await
                        .unwrap_or_else(|_| "<response body unavailable>".to_owned());
                    return Err(AppError::Validation(format!(
                        "execution engine rejected flow '{}' with status {status}: {body}",
                        flow_spec.uri()
                    )));
                }
                Err(error) => {
                    last_error = Some(format!("execution engine transport error: {error}"));
                }
            }

            if attempt < self.max_attempts {
                warn!(
                    flow_uri = %flow_spec.uri(),
                    attempt,
                    error = last_error.as_deref().unwrap_or_default(),
                    "retrying flow run hand-off"
                );
                let delay = self.retry_backoff_ms.saturating_mul(u64::from(attempt));
                tokio::time::sleep(Duration::from_millis(delay)).await;
            }
        }

        Err(AppError::Unavailable(last_error.unwrap_or_else(|| {
            "execution engine hand-off exhausted retries".to_owned()
        })))
    }
}
