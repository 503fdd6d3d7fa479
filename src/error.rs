//! User-visible failures of collaborator calls
//!
//! Every failure of the parsing, chat, or email service is converted into one of
//! these at the runtime boundary. None of them is fatal; the user retries the
//! same action.

use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "kind", content = "message", rename_all = "snake_case")]
pub enum ActionError {
    /// The parsing service could not be reached or rejected the upload
    #[error("Error processing document: {0}")]
    Upload(String),
    /// The parsing service answered without the expected result marker
    #[error("Unexpected response from the document service: {0}")]
    Parse(String),
    /// Chat transport failure or empty answer
    #[error("Error sending message: {0}")]
    Chat(String),
    /// Drafting call failed or the draft had no subject/body split
    #[error("Could not draft the dispute email: {0}")]
    Draft(String),
    /// Email service returned a non-success status or was unreachable
    #[error("Failed to send the dispute email: {0}")]
    Send(String),
}

impl ActionError {
    pub fn kind(&self) -> &'static str {
        match self {
            ActionError::Upload(_) => "upload",
            ActionError::Parse(_) => "parse",
            ActionError::Chat(_) => "chat",
            ActionError::Draft(_) => "draft",
            ActionError::Send(_) => "send",
        }
    }
}
