//! Error types for wbcalc.

use crate::collector::FieldKey;

/// Errors from the input-collection flow.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CalcError {
    /// An answer arrived for a user with no calculation in progress.
    #[error("No active calculation for user {user_id}")]
    NoActiveSession { user_id: String },

    /// Finalization found a field missing or holding the wrong kind of value.
    #[error("Calculation input is incomplete: field '{field}' has no usable value")]
    IncompleteInput { field: FieldKey },
}

/// Errors from message channels.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("Channel {name} failed to start: {reason}")]
    StartupFailed { name: String, reason: String },

    #[error("Channel {name} failed to send: {reason}")]
    SendFailed { name: String, reason: String },

    #[error("Channel {name} received an invalid message: {reason}")]
    InvalidMessage { name: String, reason: String },

    #[error("Channel {name} API error: {reason}")]
    Api { name: String, reason: String },

    #[error("Channel {name} health check failed")]
    HealthCheckFailed { name: String },

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Errors while loading configuration.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required setting {key}: {hint}")]
    MissingRequired { key: String, hint: String },

    #[error("Invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Result type for the collection flow.
pub type Result<T> = std::result::Result<T, CalcError>;
