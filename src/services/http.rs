//! HTTP client for the document/chat/email service

use super::{
    ChatService, DocumentParser, EmailSender, OutgoingEmail, ParseResponse, ServiceConfig,
    ServiceError,
};
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};
use std::time::Instant;

/// One client for all three endpoints; they share a host
pub struct HttpServices {
    client: Client,
    parse_url: String,
    chat_url: String,
    email_url: String,
}

impl HttpServices {
    pub fn new(config: &ServiceConfig) -> Result<Self, ServiceError> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| ServiceError::network(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            parse_url: config.parse_url(),
            chat_url: config.chat_url(),
            email_url: config.email_url(),
        })
    }
}

#[derive(Debug, Deserialize)]
struct ParseReply {
    result: String,
}

#[derive(Debug, Serialize)]
struct ChatPayload<'a> {
    query: &'a str,
    document_path: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    response: String,
}

fn send_failure(e: reqwest::Error) -> ServiceError {
    if e.is_timeout() {
        ServiceError::network(format!("Request timeout: {e}"))
    } else if e.is_connect() {
        ServiceError::network(format!("Connection failed: {e}"))
    } else {
        ServiceError::from(e)
    }
}

/// Reject non-success statuses, keeping the body for the log
async fn require_success(response: Response) -> Result<Response, ServiceError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(ServiceError::status(
        status.as_u16(),
        format!("Service returned {status}: {body}"),
    ))
}

#[async_trait]
impl DocumentParser for HttpServices {
    async fn parse(&self, file_name: &str, bytes: &[u8]) -> Result<ParseResponse, ServiceError> {
        let start = Instant::now();
        let part = Part::bytes(bytes.to_vec())
            .file_name(file_name.to_string())
            .mime_str("application/pdf")
            .map_err(|e| ServiceError::network(format!("Invalid upload part: {e}")))?;
        let form = Form::new().part("file", part);

        let result = async {
            let response = self
                .client
                .post(&self.parse_url)
                .multipart(form)
                .send()
                .await
                .map_err(send_failure)?;
            let reply: ParseReply = require_success(response).await?.json().await?;
            Ok::<_, ServiceError>(ParseResponse {
                result_text: reply.result,
            })
        }
        .await;

        match &result {
            Ok(_) => tracing::info!(
                file_name,
                size = bytes.len(),
                duration_ms = %start.elapsed().as_millis(),
                "Document processed"
            ),
            Err(e) => tracing::error!(
                file_name,
                duration_ms = %start.elapsed().as_millis(),
                error = %e,
                "Document processing failed"
            ),
        }
        result
    }
}

#[async_trait]
impl ChatService for HttpServices {
    async fn ask(&self, query: &str, document_path: &str) -> Result<String, ServiceError> {
        let start = Instant::now();
        let result = async {
            let response = self
                .client
                .post(&self.chat_url)
                .json(&ChatPayload {
                    query,
                    document_path,
                })
                .send()
                .await
                .map_err(send_failure)?;
            let reply: ChatReply = require_success(response).await?.json().await?;
            Ok::<_, ServiceError>(reply.response)
        }
        .await;

        match &result {
            Ok(text) => tracing::info!(
                document_path,
                duration_ms = %start.elapsed().as_millis(),
                response_len = text.len(),
                "Chat request completed"
            ),
            Err(e) => tracing::error!(
                document_path,
                duration_ms = %start.elapsed().as_millis(),
                error = %e,
                "Chat request failed"
            ),
        }
        result
    }
}

#[async_trait]
impl EmailSender for HttpServices {
    async fn send(&self, email: &OutgoingEmail) -> Result<u16, ServiceError> {
        let start = Instant::now();
        let result = self
            .client
            .post(&self.email_url)
            .json(email)
            .send()
            .await
            .map_err(send_failure)
            .map(|response| response.status().as_u16());

        match &result {
            Ok(status) => tracing::info!(
                receiver = %email.receiver_email,
                status,
                duration_ms = %start.elapsed().as_millis(),
                "Email service responded"
            ),
            Err(e) => tracing::error!(
                receiver = %email.receiver_email,
                duration_ms = %start.elapsed().as_millis(),
                error = %e,
                "Email request failed"
            ),
        }
        result
    }
}
