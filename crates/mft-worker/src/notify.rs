//! Outbound webhook notifications for finished executions.

use std::time::Duration;

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use tracing;
use uuid::Uuid;

use mft_core::config::WebhookConfig;
use mft_core::error::{AppError, ErrorKind};
use mft_core::result::AppResult;
use mft_entity::{ConfigRunResult, HistoryStatus, Job, JobHistory, TriggerKind};

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the body signature.
pub const SIGNATURE_HEADER: &str = "x-hub-signature-256";
/// Header carrying the event name.
pub const EVENT_HEADER: &str = "x-mft-event";

/// JSON body posted to the webhook URL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebhookPayload {
    /// `job.completed` or `job.failed`.
    pub event: String,
    pub job_id: Uuid,
    pub job_name: String,
    pub history_id: Uuid,
    pub status: HistoryStatus,
    pub trigger: TriggerKind,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub duration_seconds: Option<f64>,
    pub bytes_transferred: i64,
    pub files_transferred: i32,
    pub error_message: Option<String>,
    pub config_results: Vec<ConfigRunResult>,
}

impl WebhookPayload {
    /// Build the payload for a finalized execution.
    pub fn for_execution(job: &Job, history: &JobHistory) -> Self {
        let event = if history.succeeded() {
            "job.completed"
        } else {
            "job.failed"
        };
        Self {
            event: event.to_string(),
            job_id: job.id,
            job_name: job.name.clone(),
            history_id: history.id,
            status: history.status,
            trigger: history.trigger,
            start_time: history.start_time,
            end_time: history.end_time,
            duration_seconds: history
                .duration()
                .map(|d| d.num_milliseconds() as f64 / 1000.0),
            bytes_transferred: history.bytes_transferred,
            files_transferred: history.files_transferred,
            error_message: history.error_message.clone(),
            config_results: history.config_results.0.clone(),
        }
    }
}

/// What happened to a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotifyOutcome {
    /// The job's flags did not ask for one.
    Skipped,
    /// Accepted by the endpoint after this many attempts.
    Delivered { attempts: u32 },
    /// Both attempts failed.
    Failed,
}

/// Posts execution results to job webhooks.
///
/// Delivery problems are logged and reported through [`NotifyOutcome`];
/// they never fail the execution that triggered them.
#[derive(Debug, Clone)]
pub struct WebhookDispatcher {
    client: reqwest::Client,
    retry_delay: Duration,
}

impl WebhookDispatcher {
    /// Create a dispatcher with the configured timeout and user agent.
    pub fn new(config: &WebhookConfig) -> AppResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| {
                AppError::with_source(
                    ErrorKind::Configuration,
                    "Failed to build webhook HTTP client",
                    e,
                )
            })?;
        Ok(Self {
            client,
            retry_delay: Duration::from_millis(config.retry_delay_ms),
        })
    }

    /// Notify the job's webhook about a finalized execution, if its flags
    /// ask for it. Failed deliveries are retried once.
    pub async fn notify(&self, job: &Job, history: &JobHistory) -> NotifyOutcome {
        if !job.should_notify(history.succeeded()) {
            tracing::debug!(
                "No webhook for job '{}' ({} execution)",
                job.name,
                history.status
            );
            return NotifyOutcome::Skipped;
        }
        let Some(url) = job.webhook_url.as_deref() else {
            return NotifyOutcome::Skipped;
        };

        let payload = WebhookPayload::for_execution(job, history);
        let prepared = serde_json::to_vec(&payload)
            .map_err(AppError::from)
            .and_then(|body| Ok((build_headers(job, &payload.event, &body)?, body)));
        let (headers, body) = match prepared {
            Ok(prepared) => prepared,
            Err(e) => {
                tracing::warn!("Could not prepare webhook for job '{}': {}", job.name, e);
                return NotifyOutcome::Failed;
            }
        };

        for attempt in 1..=2u32 {
            match self.deliver(url, headers.clone(), body.clone()).await {
                Ok(()) => {
                    tracing::info!(
                        "Webhook '{}' delivered for job '{}' (attempt {})",
                        payload.event,
                        job.name,
                        attempt
                    );
                    return NotifyOutcome::Delivered { attempts: attempt };
                }
                Err(e) if attempt == 1 => {
                    tracing::debug!(
                        "Webhook for job '{}' failed, retrying in {}ms: {}",
                        job.name,
                        self.retry_delay.as_millis(),
                        e
                    );
                    tokio::time::sleep(self.retry_delay).await;
                }
                Err(e) => {
                    tracing::warn!("Webhook for job '{}' not delivered: {}", job.name, e);
                }
            }
        }
        NotifyOutcome::Failed
    }

    async fn deliver(&self, url: &str, headers: HeaderMap, body: Vec<u8>) -> AppResult<()> {
        let response = self
            .client
            .post(url)
            .headers(headers)
            .body(body)
            .send()
            .await
            .map_err(|e| {
                AppError::with_source(
                    ErrorKind::WebhookDelivery,
                    format!("Request to {url} failed: {e}"),
                    e,
                )
            })?;
        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(AppError::webhook_delivery(format!(
                "{url} answered {status}"
            )))
        }
    }
}

/// `sha256=<hex>` HMAC of the body.
pub fn sign(secret: &str, body: &[u8]) -> AppResult<String> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| AppError::internal(format!("Invalid webhook secret: {e}")))?;
    mac.update(body);
    Ok(format!("sha256={}", hex::encode(mac.finalize().into_bytes())))
}

/// Custom headers first, then the fixed ones so they win on conflict.
fn build_headers(job: &Job, event: &str, body: &[u8]) -> AppResult<HeaderMap> {
    let mut headers = HeaderMap::new();
    match job.parsed_webhook_headers() {
        Ok(custom) => {
            for (name, value) in custom {
                match (
                    HeaderName::from_bytes(name.as_bytes()),
                    HeaderValue::from_str(&value),
                ) {
                    (Ok(name), Ok(value)) => {
                        headers.insert(name, value);
                    }
                    _ => tracing::warn!(
                        "Ignoring invalid webhook header '{}' on job '{}'",
                        name,
                        job.name
                    ),
                }
            }
        }
        Err(e) => tracing::warn!("Ignoring webhook headers of job '{}': {}", job.name, e),
    }

    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    headers.insert(
        HeaderName::from_static(EVENT_HEADER),
        HeaderValue::from_str(event)
            .map_err(|e| AppError::internal(format!("Invalid event name: {e}")))?,
    );
    if let Some(secret) = job.webhook_secret.as_deref().filter(|s| !s.is_empty()) {
        let signature = sign(secret, body)?;
        headers.insert(
            HeaderName::from_static(SIGNATURE_HEADER),
            HeaderValue::from_str(&signature)
                .map_err(|e| AppError::internal(format!("Invalid signature header: {e}")))?,
        );
    }
    Ok(headers)
}
