use std::sync::Arc;
use courtside_common::non_api_structs::QueryKey;
use courtside_common::{InconsistentRelationship, TransitionError, TransitionErrorKind};
use reqwest::StatusCode;
use thiserror::Error;

/// Everything a connection-graph call can fail with.
///
/// Cloneable so one in-flight fetch can hand the same failure to every
/// reader waiting on it.
#[derive(Error, Debug, Clone)]
pub enum ConnectionError {
    /// A relationship already exists in a state incompatible with the action.
    #[error("relationship conflict: {0}")]
    Conflict(String),

    /// No relationship of the needed kind exists from the acting side.
    #[error("relationship not found: {0}")]
    NotFound(String),

    /// Missing or expired credential.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Transport failure, including timeouts.
    #[error("network error: {0}")]
    Network(#[source] Arc<reqwest::Error>),

    /// Any other non-2xx answer.
    #[error("server returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("malformed response: {0}")]
    Decode(#[source] Arc<serde_json::Error>),

    #[error(transparent)]
    InconsistentRelationship(#[from] InconsistentRelationship),

    /// The query lost all its observers before the fetch came back; the
    /// result was dropped instead of being stored.
    #[error("{0} was deactivated before its fetch completed")]
    Deactivated(QueryKey),

    #[error("invalid configuration: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, ConnectionError>;

impl ConnectionError {
    pub fn from_status(status: StatusCode, body: String) -> Self {
        match status {
            StatusCode::CONFLICT => ConnectionError::Conflict(body),
            StatusCode::NOT_FOUND => ConnectionError::NotFound(body),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ConnectionError::Unauthorized(body),
            _ => ConnectionError::Status { status: status.as_u16(), body },
        }
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, ConnectionError::Conflict(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, ConnectionError::NotFound(_))
    }
}

impl From<reqwest::Error> for ConnectionError {
    fn from(err: reqwest::Error) -> Self {
        ConnectionError::Network(Arc::new(err))
    }
}

impl From<serde_json::Error> for ConnectionError {
    fn from(err: serde_json::Error) -> Self {
        ConnectionError::Decode(Arc::new(err))
    }
}

impl From<TransitionError> for ConnectionError {
    fn from(err: TransitionError) -> Self {
        match err.kind {
            TransitionErrorKind::Conflict => ConnectionError::Conflict(err.to_string()),
            TransitionErrorKind::NotFound => ConnectionError::NotFound(err.to_string()),
        }
    }
}
