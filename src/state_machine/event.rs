//! Events that can occur in a session

use crate::dispute::{DisputeFieldsUpdate, EmailDraft};
use crate::document::{DocumentRef, UploadedFile};
use crate::error::ActionError;

/// Events that trigger state transitions
#[derive(Debug, Clone)]
pub enum Event {
    // User actions
    DocumentUploaded {
        upload: UploadedFile,
    },
    UserMessage {
        text: String,
    },
    DisputeFieldsUpdated {
        update: DisputeFieldsUpdate,
    },
    DraftRequested,
    SendConfirmed,
    /// User leaves the dispute and goes back to chatting
    DisputeCancelled,
    Reset,

    // Parsing service
    DocumentProcessed {
        document: DocumentRef,
    },
    DocumentFailed {
        error: ActionError,
    },

    // Chat service
    ChatReplied {
        text: String,
    },
    ChatFailed {
        error: ActionError,
    },
    DraftReady {
        draft: EmailDraft,
    },
    DraftFailed {
        error: ActionError,
    },

    // Email service
    EmailSent,
    EmailFailed {
        error: ActionError,
    },
}
