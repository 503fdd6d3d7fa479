//! Mock implementations for testing
//!
//! These mocks enable integration testing without real I/O.

use super::{Collaborators, SessionError, SessionRuntime, SessionUpdate};
use crate::services::{
    ChatService, DocumentParser, EmailSender, OutgoingEmail, ParseResponse, ServiceError,
};
use crate::state_machine::{SessionContext, SessionSnapshot};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tokio::sync::{broadcast, watch};

// ============================================================================
// Mock Parser
// ============================================================================

/// Mock parsing service that returns queued results
#[derive(Default)]
pub struct MockParser {
    results: Mutex<VecDeque<Result<ParseResponse, ServiceError>>>,
    /// File names of every upload
    pub uploads: Mutex<Vec<String>>,
}

impl MockParser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn queue_result(&self, result_text: impl Into<String>) {
        self.results.lock().unwrap().push_back(Ok(ParseResponse {
            result_text: result_text.into(),
        }));
    }

    pub fn queue_error(&self, error: ServiceError) {
        self.results.lock().unwrap().push_back(Err(error));
    }

    pub fn recorded_uploads(&self) -> Vec<String> {
        self.uploads.lock().unwrap().clone()
    }
}

#[async_trait]
impl DocumentParser for MockParser {
    async fn parse(&self, file_name: &str, _bytes: &[u8]) -> Result<ParseResponse, ServiceError> {
        self.uploads.lock().unwrap().push(file_name.to_string());
        self.results
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(ServiceError::network("No mock result queued")))
    }
}

// ============================================================================
// Mock Chat
// ============================================================================

/// Mock chat service that returns queued answers
#[derive(Default)]
pub struct MockChat {
    responses: Mutex<VecDeque<Result<String, ServiceError>>>,
    /// Record of all `(query, document_path)` pairs
    pub requests: Mutex<Vec<(String, String)>>,
}

impl MockChat {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn queue_response(&self, text: impl Into<String>) {
        self.responses.lock().unwrap().push_back(Ok(text.into()));
    }

    pub fn queue_error(&self, error: ServiceError) {
        self.responses.lock().unwrap().push_back(Err(error));
    }

    pub fn recorded_requests(&self) -> Vec<(String, String)> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatService for MockChat {
    async fn ask(&self, query: &str, document_path: &str) -> Result<String, ServiceError> {
        self.requests
            .lock()
            .unwrap()
            .push((query.to_string(), document_path.to_string()));
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(ServiceError::network("No mock response queued")))
    }
}

// ============================================================================
// Mock Email Sender
// ============================================================================

/// Mock email service returning queued status codes (200 when empty)
#[derive(Default)]
pub struct MockEmail {
    statuses: Mutex<VecDeque<Result<u16, ServiceError>>>,
    pub sent: Mutex<Vec<OutgoingEmail>>,
}

impl MockEmail {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn queue_status(&self, status: u16) {
        self.statuses.lock().unwrap().push_back(Ok(status));
    }

    pub fn queue_error(&self, error: ServiceError) {
        self.statuses.lock().unwrap().push_back(Err(error));
    }

    pub fn recorded_emails(&self) -> Vec<OutgoingEmail> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl EmailSender for MockEmail {
    async fn send(&self, email: &OutgoingEmail) -> Result<u16, ServiceError> {
        self.sent.lock().unwrap().push(email.clone());
        self.statuses.lock().unwrap().pop_front().unwrap_or(Ok(200))
    }
}

// ============================================================================
// Test Runtime Builder
// ============================================================================

/// Shared mocks for one test
#[derive(Clone, Default)]
pub struct MockCollaborators {
    pub parser: Arc<MockParser>,
    pub chat: Arc<MockChat>,
    pub email: Arc<MockEmail>,
}

impl MockCollaborators {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn collaborators(&self) -> Collaborators {
        Collaborators {
            parser: self.parser.clone(),
            chat: self.chat.clone(),
            email: self.email.clone(),
        }
    }
}

pub type TestRuntime = SessionRuntime<Arc<MockParser>, Arc<MockChat>, Arc<MockEmail>>;

/// Runtime wired to mocks, plus the receivers a client would hold
pub struct TestHarness {
    pub runtime: TestRuntime,
    pub mocks: MockCollaborators,
    pub updates: broadcast::Receiver<SessionUpdate>,
    pub latest: watch::Receiver<SessionSnapshot>,
}

impl TestHarness {
    pub fn new() -> Self {
        let mocks = MockCollaborators::new();
        let (broadcast_tx, updates) = broadcast::channel(64);
        let (latest_tx, latest) = watch::channel(SessionSnapshot::default());
        let runtime = SessionRuntime::new(
            SessionContext::with_default_classifier("test-session"),
            mocks.parser.clone(),
            mocks.chat.clone(),
            mocks.email.clone(),
            broadcast_tx,
            latest_tx,
        );
        Self {
            runtime,
            mocks,
            updates,
            latest,
        }
    }

    /// Upload a document that processes successfully
    pub async fn with_document(mut self) -> Self {
        self.mocks
            .parser
            .queue_result("Parsed. Results saved to: /tmp/doc123.json\ndone");
        self.runtime
            .upload_document(crate::document::UploadedFile::new(
                "statement.pdf",
                b"%PDF-1.4".to_vec(),
            ))
            .await
            .unwrap();
        self
    }

    /// Enter a dispute with a complete form
    pub async fn with_filled_dispute(self) -> Self {
        let mut harness = self.with_document().await;
        harness
            .runtime
            .send_message("this account is not mine".to_string())
            .await
            .unwrap();
        harness
            .runtime
            .update_dispute(crate::dispute::DisputeFieldsUpdate {
                details: Some("Account 1234 was never opened by me".to_string()),
                user_email: Some("me@example.com".to_string()),
                bank_email: Some("disputes@bank.example".to_string()),
            })
            .await
            .unwrap();
        harness
    }

    /// Drain updates published so far
    pub fn drain_updates(&mut self) -> Vec<SessionUpdate> {
        let mut updates = Vec::new();
        while let Ok(update) = self.updates.try_recv() {
            updates.push(update);
        }
        updates
    }
}

pub fn is_failure(result: &Result<SessionSnapshot, SessionError>) -> bool {
    matches!(result, Err(SessionError::Failed(_)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversation::Role;
    use crate::dispute::{DisputeStage, DISPUTE_NOTICE, SENT_CONFIRMATION};
    use crate::document::UploadedFile;
    use crate::error::ActionError;
    use crate::state_machine::state::Mode;
    use crate::state_machine::{PendingCall, TransitionError};

    #[tokio::test]
    async fn test_upload_enters_chatting() {
        let mut h = TestHarness::new();
        h.mocks
            .parser
            .queue_result("ok. Results saved to: /tmp/doc123.json\nmore text");

        let snapshot = h
            .runtime
            .upload_document(UploadedFile::new("report.pdf", b"%PDF".to_vec()))
            .await
            .unwrap();

        assert_eq!(snapshot.mode, Mode::Chatting);
        let document = snapshot.document.unwrap();
        assert_eq!(document.display_name, "report.pdf");
        assert_eq!(document.path, "/tmp/doc123.json");
        assert_eq!(h.latest.borrow().mode, Mode::Chatting);
    }

    #[tokio::test]
    async fn test_upload_publishes_processing_snapshot_first() {
        let mut h = TestHarness::new();
        h.mocks.parser.queue_result("Results saved to: /tmp/a.json");
        h.runtime
            .upload_document(UploadedFile::new("a.pdf", vec![]))
            .await
            .unwrap();

        let snapshots: Vec<SessionSnapshot> = h
            .drain_updates()
            .into_iter()
            .filter_map(|u| match u {
                SessionUpdate::Snapshot(s) => Some(s),
                SessionUpdate::Error { .. } => None,
            })
            .collect();
        assert_eq!(snapshots.len(), 2);
        assert_eq!(snapshots[0].pending, Some(PendingCall::Parse));
        assert_eq!(snapshots[0].mode, Mode::AwaitingDocument);
        assert_eq!(snapshots[1].pending, None);
        assert_eq!(snapshots[1].mode, Mode::Chatting);
    }

    #[tokio::test]
    async fn test_upload_failure_keeps_awaiting_document() {
        let mut h = TestHarness::new();
        h.mocks
            .parser
            .queue_error(ServiceError::network("connection refused"));

        let result = h
            .runtime
            .upload_document(UploadedFile::new("a.pdf", vec![]))
            .await;

        assert!(matches!(
            result,
            Err(SessionError::Failed(ActionError::Upload(_)))
        ));
        assert_eq!(h.runtime.state().mode(), Mode::AwaitingDocument);
        assert!(!h.runtime.state().is_busy());
        assert!(h
            .drain_updates()
            .iter()
            .any(|u| matches!(u, SessionUpdate::Error { .. })));
    }

    #[tokio::test]
    async fn test_chat_before_upload_is_rejected() {
        let mut h = TestHarness::new();
        let result = h.runtime.send_message("hello".to_string()).await;
        assert_eq!(result, Err(SessionError::Rejected(TransitionError::NoDocument)));
        assert!(h.mocks.chat.recorded_requests().is_empty());
    }

    #[tokio::test]
    async fn test_question_round_trip() {
        let mut h = TestHarness::new().with_document().await;
        h.mocks.chat.queue_response("Your balance is $120.");

        let snapshot = h
            .runtime
            .send_message("What is my balance?".to_string())
            .await
            .unwrap();

        assert_eq!(snapshot.messages.len(), 2);
        assert_eq!(snapshot.messages[1].content(), "Your balance is $120.");
        assert_eq!(
            h.mocks.chat.recorded_requests(),
            vec![(
                "What is my balance?".to_string(),
                "/tmp/doc123.json".to_string()
            )]
        );
    }

    #[tokio::test]
    async fn test_chat_failure_keeps_user_turn() {
        let mut h = TestHarness::new().with_document().await;
        h.mocks.chat.queue_error(ServiceError::status(500, "boom"));

        let result = h.runtime.send_message("What is my balance?".to_string()).await;

        assert!(matches!(result, Err(SessionError::Failed(ActionError::Chat(_)))));
        let messages = h.runtime.state().messages();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages.last().unwrap().role(), Role::User);
        assert_eq!(h.runtime.state().mode(), Mode::Chatting);
    }

    #[tokio::test]
    async fn test_empty_chat_answer_is_an_error() {
        let mut h = TestHarness::new().with_document().await;
        h.mocks.chat.queue_response("   ");

        let result = h.runtime.send_message("What is my balance?".to_string()).await;
        assert!(is_failure(&result));
        assert_eq!(h.runtime.state().messages().len(), 1);
    }

    #[tokio::test]
    async fn test_dispute_message_skips_chat() {
        let mut h = TestHarness::new().with_document().await;

        let snapshot = h
            .runtime
            .send_message("this account is not mine".to_string())
            .await
            .unwrap();

        assert_eq!(snapshot.mode, Mode::Disputing);
        assert_eq!(snapshot.messages.len(), 2);
        assert_eq!(snapshot.messages[1].content(), DISPUTE_NOTICE);
        assert!(h.mocks.chat.recorded_requests().is_empty());

        // The next message goes to the chat service again
        h.mocks.chat.queue_response("Account 1234 opened in 2019.");
        h.runtime
            .send_message("when was it opened? it's wrong".to_string())
            .await
            .unwrap();
        assert_eq!(h.mocks.chat.recorded_requests().len(), 1);
        assert_eq!(h.runtime.state().mode(), Mode::Disputing);
    }

    #[tokio::test]
    async fn test_full_dispute_flow() {
        let mut h = TestHarness::new().with_filled_dispute().await;
        h.mocks
            .chat
            .queue_response("SUBJECT: Dispute of Account X\nDear Sir...");

        let snapshot = h.runtime.request_draft().await.unwrap();
        let case = snapshot.dispute.unwrap();
        assert_eq!(case.stage(), DisputeStage::Previewing);
        let draft = case.draft().unwrap();
        assert_eq!(draft.subject, "Dispute of Account X");
        assert_eq!(draft.body, "Dear Sir...");

        let (prompt, path) = h.mocks.chat.recorded_requests().pop().unwrap();
        assert!(prompt.contains("Account 1234 was never opened by me"));
        assert_eq!(path, "/tmp/doc123.json");

        let snapshot = h.runtime.confirm_send().await.unwrap();
        assert_eq!(snapshot.mode, Mode::Chatting);
        assert!(snapshot.dispute.is_none());
        assert_eq!(
            snapshot.messages.last().unwrap().content(),
            SENT_CONFIRMATION
        );

        let emails = h.mocks.email.recorded_emails();
        assert_eq!(emails.len(), 1);
        assert_eq!(emails[0].sender_email, "me@example.com");
        assert_eq!(emails[0].receiver_email, "disputes@bank.example");
        assert_eq!(emails[0].subject, "Dispute of Account X");
        assert_eq!(emails[0].attachment, None);
    }

    #[tokio::test]
    async fn test_draft_before_fields_is_rejected() {
        let mut h = TestHarness::new().with_document().await;
        h.runtime
            .send_message("that charge is incorrect".to_string())
            .await
            .unwrap();

        let result = h.runtime.request_draft().await;
        assert_eq!(
            result,
            Err(SessionError::Rejected(TransitionError::IncompleteDispute))
        );
        assert!(h.mocks.chat.recorded_requests().is_empty());
    }

    #[tokio::test]
    async fn test_bad_draft_stays_collecting() {
        let mut h = TestHarness::new().with_filled_dispute().await;
        h.mocks.chat.queue_response("Subject: only a subject");

        let result = h.runtime.request_draft().await;

        assert!(matches!(result, Err(SessionError::Failed(ActionError::Draft(_)))));
        let case = h.runtime.state().dispute().unwrap();
        assert_eq!(case.stage(), DisputeStage::Collecting);
        assert!(!h.runtime.state().is_busy());
    }

    #[tokio::test]
    async fn test_send_failure_keeps_draft_for_retry() {
        let mut h = TestHarness::new().with_filled_dispute().await;
        h.mocks
            .chat
            .queue_response("Subject: Dispute of Account X\nDear Sir...");
        h.runtime.request_draft().await.unwrap();
        h.mocks.email.queue_status(503);

        let result = h.runtime.confirm_send().await;

        assert!(matches!(result, Err(SessionError::Failed(ActionError::Send(_)))));
        let state = h.runtime.state();
        assert_eq!(state.mode(), Mode::Disputing);
        let case = state.dispute().unwrap();
        assert_eq!(case.stage(), DisputeStage::Previewing);
        assert_eq!(case.draft().unwrap().subject, "Dispute of Account X");
        assert_eq!(case.draft().unwrap().body, "Dear Sir...");

        // Retry without re-drafting
        let snapshot = h.runtime.confirm_send().await.unwrap();
        assert_eq!(snapshot.mode, Mode::Chatting);
        assert_eq!(h.mocks.chat.recorded_requests().len(), 1);
        assert_eq!(h.mocks.email.recorded_emails().len(), 2);
    }

    #[tokio::test]
    async fn test_cancel_dispute_returns_to_chat() {
        let mut h = TestHarness::new().with_filled_dispute().await;
        let snapshot = h.runtime.cancel_dispute().await.unwrap();
        assert_eq!(snapshot.mode, Mode::Chatting);
        assert!(snapshot.dispute.is_none());
        assert_eq!(snapshot.messages.len(), 2);
    }

    #[tokio::test]
    async fn test_reset_from_dispute() {
        let mut h = TestHarness::new().with_filled_dispute().await;
        let snapshot = h.runtime.reset().await;

        assert_eq!(snapshot.mode, Mode::AwaitingDocument);
        assert!(snapshot.document.is_none());
        assert!(snapshot.messages.is_empty());
        assert!(snapshot.dispute.is_none());
        assert_eq!(*h.latest.borrow(), SessionSnapshot::default());
    }

    #[tokio::test]
    async fn test_upload_after_reset_is_accepted() {
        let mut h = TestHarness::new().with_document().await;
        let rejected = h
            .runtime
            .upload_document(UploadedFile::new("second.pdf", vec![]))
            .await;
        assert_eq!(
            rejected,
            Err(SessionError::Rejected(TransitionError::DocumentAlreadyActive))
        );

        h.runtime.reset().await;
        h.mocks.parser.queue_result("Results saved to: /tmp/second.json");
        let snapshot = h
            .runtime
            .upload_document(UploadedFile::new("second.pdf", vec![]))
            .await
            .unwrap();
        assert_eq!(snapshot.document.unwrap().display_name, "second.pdf");
    }
}
