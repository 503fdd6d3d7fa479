//! Effects produced by state transitions

use crate::dispute::DisputeOutcome;
use crate::document::UploadedFile;
use crate::error::ActionError;
use crate::services::OutgoingEmail;

/// Effects to be executed after state transition
#[derive(Debug, Clone)]
pub enum Effect {
    /// Upload the file to the parsing service
    ParseDocument { upload: UploadedFile },

    /// Ask the chat service about the active document
    RequestChat { query: String, document_path: String },

    /// Ask the chat service for a dispute email draft
    RequestDraft { prompt: String, document_path: String },

    /// Hand the confirmed draft to the email service
    SendEmail { email: OutgoingEmail },

    /// Publish the current snapshot to connected clients
    NotifyClient,

    /// Surface a failure to the user
    ReportError { error: ActionError },

    /// A dispute episode ended
    DisputeClosed { outcome: DisputeOutcome },
}

impl Effect {
    pub fn report(error: ActionError) -> Self {
        Effect::ReportError { error }
    }

    /// Whether executing this effect calls a collaborator
    #[cfg(test)]
    pub fn is_collaborator_call(&self) -> bool {
        matches!(
            self,
            Effect::ParseDocument { .. }
                | Effect::RequestChat { .. }
                | Effect::RequestDraft { .. }
                | Effect::SendEmail { .. }
        )
    }
}
