//! Job entity model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use mft_core::error::AppError;
use mft_core::result::AppResult;

/// A scheduled unit of work executing one or more transfer configs in order.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Job {
    /// Unique job identifier.
    pub id: Uuid,
    /// Display name.
    pub name: String,
    /// Cron expression (5 or 6 fields).
    pub schedule: String,
    /// Transfer configs in execution order.
    pub config_ids: Vec<Uuid>,
    /// Whether the scheduler should fire this job.
    pub enabled: bool,
    /// Start time of the most recent firing.
    pub last_run: Option<DateTime<Utc>>,
    /// Next scheduled firing.
    pub next_run: Option<DateTime<Utc>>,
    /// Whether to send webhook notifications.
    pub webhook_enabled: bool,
    /// Webhook target URL.
    pub webhook_url: Option<String>,
    /// HMAC-SHA256 signing secret. Never serialized back out.
    #[serde(default, skip_serializing)]
    pub webhook_secret: Option<String>,
    /// Extra webhook headers as a JSON object string.
    pub webhook_headers: Option<String>,
    /// Notify when an execution completes.
    pub notify_on_success: bool,
    /// Notify when an execution fails.
    pub notify_on_failure: bool,
    /// When the job was created.
    pub created_at: DateTime<Utc>,
    /// When the job was last updated.
    pub updated_at: DateTime<Utc>,
}

impl Job {
    /// Create an enabled job without webhook settings.
    pub fn new(name: impl Into<String>, schedule: impl Into<String>, config_ids: Vec<Uuid>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            schedule: schedule.into(),
            config_ids,
            enabled: true,
            last_run: None,
            next_run: None,
            webhook_enabled: false,
            webhook_url: None,
            webhook_secret: None,
            webhook_headers: None,
            notify_on_success: false,
            notify_on_failure: false,
            created_at: now,
            updated_at: now,
        }
    }

    /// Copy this job into a new, disabled job with the same configs,
    /// schedule and webhook settings.
    pub fn duplicate(&self, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: format!("{} (Copy)", self.name),
            enabled: false,
            last_run: None,
            next_run: None,
            created_at: now,
            updated_at: now,
            ..self.clone()
        }
    }

    /// Whether a finished execution with the given outcome should notify.
    pub fn should_notify(&self, succeeded: bool) -> bool {
        self.webhook_enabled
            && self.webhook_url.as_deref().is_some_and(|u| !u.is_empty())
            && if succeeded {
                self.notify_on_success
            } else {
                self.notify_on_failure
            }
    }

    /// Parse `webhook_headers` into name/value pairs.
    ///
    /// Non-string values are rendered as JSON text.
    pub fn parsed_webhook_headers(&self) -> AppResult<Vec<(String, String)>> {
        let raw = match self.webhook_headers.as_deref().map(str::trim) {
            None | Some("") => return Ok(Vec::new()),
            Some(raw) => raw,
        };
        let value: serde_json::Value = serde_json::from_str(raw)?;
        let object = value.as_object().ok_or_else(|| {
            AppError::validation("webhook_headers must be a JSON object")
        })?;
        Ok(object
            .iter()
            .map(|(k, v)| {
                let text = match v {
                    serde_json::Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                (k.clone(), text)
            })
            .collect())
    }

    /// Validate the job fields that do not depend on other entities.
    pub fn validate(&self) -> AppResult<()> {
        if self.name.trim().is_empty() {
            return Err(AppError::validation("Job name must not be empty"));
        }
        if self.webhook_enabled && self.webhook_url.as_deref().is_none_or(str::is_empty) {
            return Err(AppError::validation(
                "webhook_url is required when webhooks are enabled",
            ));
        }
        self.parsed_webhook_headers()
            .map_err(|e| AppError::validation(format!("Invalid webhook_headers: {}", e.message)))?;
        Ok(())
    }
}
