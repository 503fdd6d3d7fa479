//! Session runtime executor

use super::{Action, SessionError, SessionUpdate};
use crate::dispute::{parse_draft, DisputeFieldsUpdate};
use crate::document::{self, UploadedFile};
use crate::error::ActionError;
use crate::services::{ChatService, DocumentParser, EmailSender, OutgoingEmail};
use crate::state_machine::{
    transition, Effect, Event, Session, SessionContext, SessionSnapshot, TransitionError,
};
use tokio::sync::{broadcast, watch};

/// Drives one [`Session`]: applies events through the pure transition
/// function and performs the resulting effects against the collaborators.
///
/// Each public action runs to completion, including its collaborator call,
/// before returning. Callers serialize actions by holding `&mut self` and
/// must not drop an action's future part way; [`SessionHandle`](super::SessionHandle)
/// runs each one on its own task.
pub struct SessionRuntime<P, C, M>
where
    P: DocumentParser,
    C: ChatService,
    M: EmailSender,
{
    context: SessionContext,
    state: Session,
    parser: P,
    chat: C,
    email: M,
    broadcast_tx: broadcast::Sender<SessionUpdate>,
    latest_tx: watch::Sender<SessionSnapshot>,
}

impl<P, C, M> SessionRuntime<P, C, M>
where
    P: DocumentParser,
    C: ChatService,
    M: EmailSender,
{
    pub fn new(
        context: SessionContext,
        parser: P,
        chat: C,
        email: M,
        broadcast_tx: broadcast::Sender<SessionUpdate>,
        latest_tx: watch::Sender<SessionSnapshot>,
    ) -> Self {
        Self {
            context,
            state: Session::new(),
            parser,
            chat,
            email,
            broadcast_tx,
            latest_tx,
        }
    }

    pub fn session_id(&self) -> &str {
        &self.context.session_id
    }

    #[cfg(test)]
    pub fn state(&self) -> &Session {
        &self.state
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.state.snapshot()
    }

    /// Run one user action to completion
    pub async fn perform(&mut self, action: Action) -> Result<SessionSnapshot, SessionError> {
        match action {
            Action::UploadDocument(upload) => self.upload_document(upload).await,
            Action::SendMessage(text) => self.send_message(text).await,
            Action::UpdateDispute(update) => self.update_dispute(update).await,
            Action::RequestDraft => self.request_draft().await,
            Action::ConfirmSend => self.confirm_send().await,
            Action::CancelDispute => self.cancel_dispute().await,
        }
    }

    pub async fn upload_document(
        &mut self,
        upload: UploadedFile,
    ) -> Result<SessionSnapshot, SessionError> {
        self.dispatch(Event::DocumentUploaded { upload }).await
    }

    pub async fn send_message(&mut self, text: String) -> Result<SessionSnapshot, SessionError> {
        self.dispatch(Event::UserMessage { text }).await
    }

    pub async fn update_dispute(
        &mut self,
        update: DisputeFieldsUpdate,
    ) -> Result<SessionSnapshot, SessionError> {
        self.dispatch(Event::DisputeFieldsUpdated { update }).await
    }

    pub async fn request_draft(&mut self) -> Result<SessionSnapshot, SessionError> {
        self.dispatch(Event::DraftRequested).await
    }

    pub async fn confirm_send(&mut self) -> Result<SessionSnapshot, SessionError> {
        self.dispatch(Event::SendConfirmed).await
    }

    pub async fn cancel_dispute(&mut self) -> Result<SessionSnapshot, SessionError> {
        self.dispatch(Event::DisputeCancelled).await
    }

    /// Always succeeds
    pub async fn reset(&mut self) -> SessionSnapshot {
        match self.dispatch(Event::Reset).await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                tracing::error!(session_id = %self.session_id(), error = %e, "Reset rejected");
                self.snapshot()
            }
        }
    }

    /// Apply a user action and every event its effects generate.
    ///
    /// A rejected action leaves the state untouched. A collaborator failure is
    /// applied to the state (which restores it, bar any logged user turn) and
    /// then returned as the error.
    async fn dispatch(&mut self, action: Event) -> Result<SessionSnapshot, SessionError> {
        let result = transition(&self.state, &self.context, action).map_err(|e| {
            tracing::debug!(session_id = %self.context.session_id, error = %e, "Action rejected");
            SessionError::Rejected(e)
        })?;

        let mut failure = None;
        let mut pending = vec![result];

        // Process in a loop to handle chained effects
        while let Some(result) = pending.pop() {
            self.state = result.new_state;

            for effect in result.effects {
                let Some(generated) = self.execute_effect(effect, &mut failure).await else {
                    continue;
                };
                match transition(&self.state, &self.context, generated) {
                    Ok(next) => pending.push(next),
                    Err(e) => self.discard_stale(&e),
                }
            }
        }

        match failure {
            Some(error) => Err(SessionError::Failed(error)),
            None => Ok(self.snapshot()),
        }
    }

    fn discard_stale(&self, error: &TransitionError) {
        tracing::warn!(
            session_id = %self.context.session_id,
            error = %error,
            "Discarding collaborator result"
        );
    }

    /// Execute an effect and optionally return a generated event
    async fn execute_effect(
        &self,
        effect: Effect,
        failure: &mut Option<ActionError>,
    ) -> Option<Event> {
        match effect {
            Effect::ParseDocument { upload } => {
                tracing::info!(
                    session_id = %self.context.session_id,
                    file_name = %upload.file_name,
                    "Processing document"
                );
                Some(match document::submit(&self.parser, &upload).await {
                    Ok(document) => Event::DocumentProcessed { document },
                    Err(error) => Event::DocumentFailed { error },
                })
            }

            Effect::RequestChat {
                query,
                document_path,
            } => Some(match self.ask(&query, &document_path).await {
                Ok(text) => Event::ChatReplied { text },
                Err(e) => Event::ChatFailed {
                    error: ActionError::Chat(e),
                },
            }),

            Effect::RequestDraft {
                prompt,
                document_path,
            } => {
                let drafted = self
                    .ask(&prompt, &document_path)
                    .await
                    .map_err(ActionError::Draft)
                    .and_then(|text| parse_draft(&text));
                Some(match drafted {
                    Ok(draft) => Event::DraftReady { draft },
                    Err(error) => Event::DraftFailed { error },
                })
            }

            Effect::SendEmail { email } => Some(match self.send(&email).await {
                Ok(()) => Event::EmailSent,
                Err(error) => Event::EmailFailed { error },
            }),

            Effect::NotifyClient => {
                let snapshot = self.snapshot();
                self.latest_tx.send_replace(snapshot.clone());
                let _ = self.broadcast_tx.send(SessionUpdate::Snapshot(snapshot));
                None
            }

            Effect::ReportError { error } => {
                tracing::warn!(
                    session_id = %self.context.session_id,
                    kind = error.kind(),
                    error = %error,
                    "Action failed"
                );
                let _ = self.broadcast_tx.send(SessionUpdate::Error {
                    message: error.to_string(),
                });
                *failure = Some(error);
                None
            }

            Effect::DisputeClosed { outcome } => {
                tracing::info!(
                    session_id = %self.context.session_id,
                    outcome = ?outcome,
                    "Dispute episode ended"
                );
                None
            }
        }
    }

    /// Chat call with empty answers treated as failures
    async fn ask(&self, query: &str, document_path: &str) -> Result<String, String> {
        match self.chat.ask(query, document_path).await {
            Ok(text) if text.trim().is_empty() => {
                Err("the chat service returned an empty response".to_string())
            }
            Ok(text) => Ok(text),
            Err(e) => Err(e.message),
        }
    }

    async fn send(&self, email: &OutgoingEmail) -> Result<(), ActionError> {
        match self.email.send(email).await {
            Ok(status) if (200..300).contains(&status) => Ok(()),
            Ok(status) => Err(ActionError::Send(format!(
                "email service returned status {status}"
            ))),
            Err(e) => Err(ActionError::Send(e.message)),
        }
    }
}
