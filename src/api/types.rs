//! API request and response types

use crate::state_machine::SessionSnapshot;
use serde::{Deserialize, Serialize};

/// Request to upload a document
#[derive(Debug, Deserialize)]
pub struct UploadRequest {
    pub file_name: String,
    /// Base64-encoded file contents
    pub data: String,
}

/// Request to send a chat message
#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub text: String,
}

/// Response carrying a session's current snapshot
#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub id: String,
    pub session: SessionSnapshot,
}

/// Response for lifecycle actions
#[derive(Debug, Serialize)]
pub struct SuccessResponse {
    pub success: bool,
}

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            error: message.into(),
        }
    }
}
