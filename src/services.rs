//! External collaborators
//!
//! The document parser, chat service, and email sender are owned elsewhere;
//! this module only holds their contracts and an HTTP client for them.

mod config;
mod error;
mod http;

pub use config::ServiceConfig;
pub use error::ServiceError;
pub use http::HttpServices;

use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;

/// Raw answer from the parsing service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseResponse {
    pub result_text: String,
}

/// Email handed to the sending service
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutgoingEmail {
    pub sender_email: String,
    pub receiver_email: String,
    pub subject: String,
    pub body: String,
    pub attachment: Option<String>,
}

/// Uploads and processes a document
#[async_trait]
pub trait DocumentParser: Send + Sync {
    async fn parse(&self, file_name: &str, bytes: &[u8]) -> Result<ParseResponse, ServiceError>;
}

/// Answers a query about a processed document
#[async_trait]
pub trait ChatService: Send + Sync {
    async fn ask(&self, query: &str, document_path: &str) -> Result<String, ServiceError>;
}

/// Sends an email, returning the service's HTTP status code.
///
/// A non-success status is not an `Err`; only transport failures are.
#[async_trait]
pub trait EmailSender: Send + Sync {
    async fn send(&self, email: &OutgoingEmail) -> Result<u16, ServiceError>;
}

// ============================================================================
// Arc implementations for trait objects
// ============================================================================

#[async_trait]
impl<T: DocumentParser + ?Sized> DocumentParser for Arc<T> {
    async fn parse(&self, file_name: &str, bytes: &[u8]) -> Result<ParseResponse, ServiceError> {
        (**self).parse(file_name, bytes).await
    }
}

#[async_trait]
impl<T: ChatService + ?Sized> ChatService for Arc<T> {
    async fn ask(&self, query: &str, document_path: &str) -> Result<String, ServiceError> {
        (**self).ask(query, document_path).await
    }
}

#[async_trait]
impl<T: EmailSender + ?Sized> EmailSender for Arc<T> {
    async fn send(&self, email: &OutgoingEmail) -> Result<u16, ServiceError> {
        (**self).send(email).await
    }
}
