//! Session state types

use crate::conversation::{ConversationLog, Turn};
use crate::dispute::DisputeCase;
use crate::document::{DocumentRef, DocumentSession};
use crate::intent::IntentClassifier;
use serde::Serialize;
use std::sync::Arc;

/// Which part of the UI is active
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    AwaitingDocument,
    Chatting,
    Disputing,
}

/// The one collaborator call a session may have outstanding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PendingCall {
    Parse,
    Chat,
    Draft,
    Send,
}

/// Root aggregate for one client.
///
/// Fields are only written by [`transition`](super::transition). The mode is
/// derived, so `AwaitingDocument` holds exactly when there is no document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Session {
    pub(super) document: DocumentSession,
    pub(super) messages: ConversationLog,
    /// Only present while a document is active
    pub(super) dispute: Option<DisputeCase>,
    pub(super) pending: Option<PendingCall>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mode(&self) -> Mode {
        match (self.document.is_active(), &self.dispute) {
            (false, _) => Mode::AwaitingDocument,
            (true, Some(_)) => Mode::Disputing,
            (true, None) => Mode::Chatting,
        }
    }

    pub fn document(&self) -> Option<&DocumentRef> {
        self.document.current()
    }

    pub fn messages(&self) -> &ConversationLog {
        &self.messages
    }

    pub fn dispute(&self) -> Option<&DisputeCase> {
        self.dispute.as_ref()
    }

    pub fn pending(&self) -> Option<PendingCall> {
        self.pending
    }

    pub fn is_busy(&self) -> bool {
        self.pending.is_some()
    }

    /// Everything the rendering layer needs after an action
    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            mode: self.mode(),
            document: self.document.current().cloned(),
            messages: self.messages.all().cloned().collect(),
            dispute: self.dispute.clone(),
            pending: self.pending,
        }
    }
}

/// Render signal published after every state change
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionSnapshot {
    pub mode: Mode,
    pub document: Option<DocumentRef>,
    pub messages: Vec<Turn>,
    pub dispute: Option<DisputeCase>,
    pub pending: Option<PendingCall>,
}

impl Default for SessionSnapshot {
    fn default() -> Self {
        Session::default().snapshot()
    }
}

/// Per-session configuration (immutable)
#[derive(Clone)]
pub struct SessionContext {
    pub session_id: String,
    pub classifier: Arc<dyn IntentClassifier>,
}

impl SessionContext {
    pub fn new(session_id: impl Into<String>, classifier: Arc<dyn IntentClassifier>) -> Self {
        Self {
            session_id: session_id.into(),
            classifier,
        }
    }

    /// Context using the default keyword classifier
    #[cfg(test)]
    pub fn with_default_classifier(session_id: impl Into<String>) -> Self {
        Self::new(session_id, Arc::new(crate::intent::classify))
    }
}
