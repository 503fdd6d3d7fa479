//! Collaborator transport errors

use thiserror::Error;

/// Transport-level failure talking to a collaborator
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ServiceError {
    pub kind: ServiceErrorKind,
    pub message: String,
}

impl ServiceError {
    pub fn new(kind: ServiceErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(ServiceErrorKind::Network, message)
    }

    pub fn status(code: u16, message: impl Into<String>) -> Self {
        Self::new(ServiceErrorKind::Status(code), message)
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        Self::new(ServiceErrorKind::Malformed, message)
    }

    pub fn is_malformed(&self) -> bool {
        self.kind == ServiceErrorKind::Malformed
    }
}

impl From<reqwest::Error> for ServiceError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            Self::malformed(e.to_string())
        } else if let Some(status) = e.status() {
            Self::status(status.as_u16(), e.to_string())
        } else {
            Self::network(e.to_string())
        }
    }
}

/// Error classification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceErrorKind {
    /// Connection refused, timeout, DNS
    Network,
    /// Non-success HTTP status
    Status(u16),
    /// Response body did not have the expected shape
    Malformed,
}
