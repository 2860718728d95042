//! Unified application error types.
//!
//! All crates map their internal errors into [`AppError`] for consistent
//! propagation through the ? operator. The transfer-specific kinds
//! (`InvalidSchedule`, `ProviderConnection`, `ProviderAuth`,
//! `WebhookDelivery`, `AlreadyRunning`) drive the executor's retry and
//! abort decisions.

use std::fmt;
use thiserror::Error;

/// Top-level error kind categorization used across the entire engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum ErrorKind {
    /// The requested resource was not found.
    NotFound,
    /// Input validation failed.
    Validation,
    /// A conflict occurred (entity still referenced, already finalized, etc.).
    Conflict,
    /// An internal error occurred.
    Internal,
    /// A database error occurred.
    Database,
    /// A storage I/O error occurred.
    Storage,
    /// A configuration error occurred.
    Configuration,
    /// A serialization/deserialization error occurred.
    Serialization,
    /// A cron expression could not be parsed.
    InvalidSchedule,
    /// A provider could not be reached or an operation failed transiently.
    ProviderConnection,
    /// A provider rejected the configured credentials.
    ProviderAuth,
    /// A webhook could not be delivered.
    WebhookDelivery,
    /// The job is already executing.
    AlreadyRunning,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => write!(f, "NOT_FOUND"),
            Self::Validation => write!(f, "VALIDATION"),
            Self::Conflict => write!(f, "CONFLICT"),
            Self::Internal => write!(f, "INTERNAL"),
            Self::Database => write!(f, "DATABASE"),
            Self::Storage => write!(f, "STORAGE"),
            Self::Configuration => write!(f, "CONFIGURATION"),
            Self::Serialization => write!(f, "SERIALIZATION"),
            Self::InvalidSchedule => write!(f, "INVALID_SCHEDULE"),
            Self::ProviderConnection => write!(f, "PROVIDER_CONNECTION"),
            Self::ProviderAuth => write!(f, "PROVIDER_AUTH"),
            Self::WebhookDelivery => write!(f, "WEBHOOK_DELIVERY"),
            Self::AlreadyRunning => write!(f, "ALREADY_RUNNING"),
        }
    }
}

/// The unified application error.
///
/// Crate-specific errors are mapped into `AppError` using `From` impls
/// or explicit `.map_err()` calls.
#[derive(Debug, Error)]
#[error("{kind}: {message}")]
pub struct AppError {
    /// The category of error.
    pub kind: ErrorKind,
    /// A human-readable error message.
    pub message: String,
    /// Optional underlying cause.
    #[source]
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl AppError {
    /// Create a new application error.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            source: None,
        }
    }

    /// Create a new application error with an underlying cause.
    pub fn with_source(
        kind: ErrorKind,
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            kind,
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a not-found error.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, message)
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Validation, message)
    }

    /// Create a conflict error.
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Conflict, message)
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, message)
    }

    /// Create a database error.
    pub fn database(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Database, message)
    }

    /// Create a storage error.
    pub fn storage(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Storage, message)
    }

    /// Create a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Configuration, message)
    }

    /// Create an invalid-schedule error.
    pub fn invalid_schedule(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidSchedule, message)
    }

    /// Create a provider connection error.
    pub fn provider_connection(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ProviderConnection, message)
    }

    /// Create a provider authentication error.
    pub fn provider_auth(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ProviderAuth, message)
    }

    /// Create a webhook delivery error.
    pub fn webhook_delivery(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::WebhookDelivery, message)
    }

    /// Create an already-running error.
    pub fn already_running(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::AlreadyRunning, message)
    }

    /// Whether a per-file operation that failed with this error may be retried.
    pub fn is_retryable(&self) -> bool {
        matches!(self.kind, ErrorKind::ProviderConnection)
    }

    /// Whether this error poisons every remaining use of the same provider
    /// endpoint within one execution.
    pub fn is_fatal(&self) -> bool {
        matches!(self.kind, ErrorKind::ProviderAuth)
    }
}

impl Clone for AppError {
    fn clone(&self) -> Self {
        Self {
            kind: self.kind,
            message: self.message.clone(),
            source: None,
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        Self::with_source(
            ErrorKind::Serialization,
            format!("JSON serialization error: {err}"),
            err,
        )
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        Self::with_source(ErrorKind::Storage, format!("I/O error: {err}"), err)
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        Self::with_source(
            ErrorKind::Configuration,
            format!("Configuration error: {err}"),
            err,
        )
    }
}
