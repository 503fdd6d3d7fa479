//! Pure state transition function

use super::{Effect, Event, PendingCall, Session, SessionContext};
use crate::conversation::Role;
use crate::dispute::{DisputeCase, DisputeOutcome, DISPUTE_NOTICE, SENT_CONFIRMATION};
use crate::document::DocumentRef;
use thiserror::Error;

/// Result of a state transition
#[derive(Debug)]
pub struct TransitionResult {
    pub new_state: Session,
    pub effects: Vec<Effect>,
}

impl TransitionResult {
    pub fn new(state: Session) -> Self {
        Self {
            new_state: state,
            effects: vec![],
        }
    }

    pub fn with_effect(mut self, effect: Effect) -> Self {
        self.effects.push(effect);
        self
    }
}

/// Actions the session cannot accept in its current state
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error("A request is already in progress, wait for it to finish")]
    Busy,
    #[error("Please upload a document before asking questions")]
    NoDocument,
    #[error("A document is already loaded, start a new session to upload another")]
    DocumentAlreadyActive,
    #[error("Message is empty")]
    EmptyMessage,
    #[error("No dispute is in progress")]
    NotDisputing,
    #[error("Fill in the dispute details, your email, and the bank's email first")]
    IncompleteDispute,
    #[error("There is no draft to send yet")]
    NoDraft,
    #[error("This dispute has already been sent")]
    DisputeClosed,
    #[error("Unexpected event: {0}")]
    Unexpected(String),
}

/// Pure transition function
///
/// Given the same inputs it always produces the same outputs and performs no
/// I/O. On `Err` the caller keeps the old state untouched.
pub fn transition(
    state: &Session,
    context: &SessionContext,
    event: Event,
) -> Result<TransitionResult, TransitionError> {
    match event {
        // ============================================================
        // Reset: always allowed, discards everything
        // ============================================================
        Event::Reset => {
            let mut next = state.clone();
            next.document.clear();
            next.messages.clear();
            next.dispute = None;
            next.pending = None;

            let mut result = TransitionResult::new(next);
            if state.dispute.is_some() {
                result = result.with_effect(Effect::DisputeClosed {
                    outcome: DisputeOutcome::Abandoned,
                });
            }
            Ok(result.with_effect(Effect::NotifyClient))
        }

        // ============================================================
        // Document upload
        // ============================================================
        Event::DocumentUploaded { upload } => {
            ensure_idle(state)?;
            if state.document.is_active() {
                return Err(TransitionError::DocumentAlreadyActive);
            }
            let mut next = state.clone();
            next.pending = Some(PendingCall::Parse);
            Ok(TransitionResult::new(next)
                .with_effect(Effect::NotifyClient)
                .with_effect(Effect::ParseDocument { upload }))
        }

        Event::DocumentProcessed { document } => {
            expect_pending(state, PendingCall::Parse)?;
            let mut next = state.clone();
            next.pending = None;
            next.document.activate(document);
            Ok(TransitionResult::new(next).with_effect(Effect::NotifyClient))
        }

        // ============================================================
        // Chat
        // ============================================================
        Event::UserMessage { text } => {
            ensure_idle(state)?;
            let document = active_document(state)?;
            if text.trim().is_empty() {
                return Err(TransitionError::EmptyMessage);
            }

            let mut next = state.clone();
            next.messages.append(Role::User, text.clone());

            // Classification is not re-applied once a dispute is running
            if next.dispute.is_none() && context.classifier.is_dispute(&text) {
                next.dispute = Some(DisputeCase::new());
                next.messages.append(Role::Assistant, DISPUTE_NOTICE);
                return Ok(TransitionResult::new(next).with_effect(Effect::NotifyClient));
            }

            let document_path = document.path.clone();
            next.pending = Some(PendingCall::Chat);
            Ok(TransitionResult::new(next)
                .with_effect(Effect::NotifyClient)
                .with_effect(Effect::RequestChat {
                    query: text,
                    document_path,
                }))
        }

        Event::ChatReplied { text } => {
            expect_pending(state, PendingCall::Chat)?;
            let mut next = state.clone();
            next.pending = None;
            next.messages.append(Role::Assistant, text);
            Ok(TransitionResult::new(next).with_effect(Effect::NotifyClient))
        }

        // ============================================================
        // Dispute workflow
        // ============================================================
        Event::DisputeFieldsUpdated { update } => {
            ensure_idle(state)?;
            let mut next = state.clone();
            dispute_mut(&mut next)?.apply(update)?;
            Ok(TransitionResult::new(next).with_effect(Effect::NotifyClient))
        }

        Event::DraftRequested => {
            ensure_idle(state)?;
            let document_path = active_document(state)?.path.clone();
            let mut next = state.clone();
            let prompt = dispute_mut(&mut next)?.begin_draft()?;
            next.pending = Some(PendingCall::Draft);
            Ok(TransitionResult::new(next)
                .with_effect(Effect::NotifyClient)
                .with_effect(Effect::RequestDraft {
                    prompt,
                    document_path,
                }))
        }

        Event::DraftReady { draft } => {
            expect_pending(state, PendingCall::Draft)?;
            let mut next = state.clone();
            next.pending = None;
            dispute_mut(&mut next)?.draft_ready(draft);
            Ok(TransitionResult::new(next).with_effect(Effect::NotifyClient))
        }

        Event::SendConfirmed => {
            ensure_idle(state)?;
            let mut next = state.clone();
            let email = dispute_mut(&mut next)?.begin_send()?;
            next.pending = Some(PendingCall::Send);
            Ok(TransitionResult::new(next)
                .with_effect(Effect::NotifyClient)
                .with_effect(Effect::SendEmail { email }))
        }

        Event::EmailSent => {
            expect_pending(state, PendingCall::Send)?;
            let mut next = state.clone();
            next.pending = None;
            dispute_mut(&mut next)?.mark_sent();
            // The case ends here; back to chatting
            next.dispute = None;
            next.messages.append(Role::Assistant, SENT_CONFIRMATION);
            Ok(TransitionResult::new(next)
                .with_effect(Effect::DisputeClosed {
                    outcome: DisputeOutcome::Sent,
                })
                .with_effect(Effect::NotifyClient))
        }

        Event::DisputeCancelled => {
            ensure_idle(state)?;
            if state.dispute.is_none() {
                return Err(TransitionError::NotDisputing);
            }
            let mut next = state.clone();
            next.dispute = None;
            Ok(TransitionResult::new(next)
                .with_effect(Effect::DisputeClosed {
                    outcome: DisputeOutcome::Abandoned,
                })
                .with_effect(Effect::NotifyClient))
        }

        // ============================================================
        // Collaborator failures: back to the prior state, report
        // ============================================================
        Event::DocumentFailed { error } => {
            expect_pending(state, PendingCall::Parse)?;
            let mut next = state.clone();
            next.pending = None;
            Ok(TransitionResult::new(next)
                .with_effect(Effect::report(error))
                .with_effect(Effect::NotifyClient))
        }

        Event::ChatFailed { error } => {
            // The user turn stays logged
            expect_pending(state, PendingCall::Chat)?;
            let mut next = state.clone();
            next.pending = None;
            Ok(TransitionResult::new(next)
                .with_effect(Effect::report(error))
                .with_effect(Effect::NotifyClient))
        }

        Event::DraftFailed { error } => {
            expect_pending(state, PendingCall::Draft)?;
            let mut next = state.clone();
            next.pending = None;
            dispute_mut(&mut next)?.draft_failed();
            Ok(TransitionResult::new(next)
                .with_effect(Effect::report(error))
                .with_effect(Effect::NotifyClient))
        }

        Event::EmailFailed { error } => {
            expect_pending(state, PendingCall::Send)?;
            let mut next = state.clone();
            next.pending = None;
            dispute_mut(&mut next)?.send_failed();
            Ok(TransitionResult::new(next)
                .with_effect(Effect::report(error))
                .with_effect(Effect::NotifyClient))
        }
    }
}

// Helper functions

fn ensure_idle(state: &Session) -> Result<(), TransitionError> {
    if state.is_busy() {
        Err(TransitionError::Busy)
    } else {
        Ok(())
    }
}

fn active_document(state: &Session) -> Result<&DocumentRef, TransitionError> {
    state.document.current().ok_or(TransitionError::NoDocument)
}

fn dispute_mut(state: &mut Session) -> Result<&mut DisputeCase, TransitionError> {
    state.dispute.as_mut().ok_or(TransitionError::NotDisputing)
}

/// Collaborator results only apply to the call that is actually outstanding;
/// anything else is stale (e.g. it arrived after a reset).
fn expect_pending(state: &Session, expected: PendingCall) -> Result<(), TransitionError> {
    match state.pending {
        Some(pending) if pending == expected => Ok(()),
        other => Err(TransitionError::Unexpected(format!(
            "{expected:?} result while pending call is {other:?}"
        ))),
    }
}
