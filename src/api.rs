//! HTTP API for the credit report assistant
//!
//! The rendering layer drives sessions through these endpoints and renders
//! the snapshots they return or stream.

mod handlers;
mod sse;
mod types;

pub use handlers::create_router;
#[allow(unused_imports)] // Public API re-exports
pub use types::*;

use crate::intent::{classify, IntentClassifier, KeywordClassifier};
use crate::runtime::SessionManager;
use std::sync::Arc;
use std::time::Duration;

const DEFAULT_PORT: u16 = 8501;
const DEFAULT_MAX_UPLOAD_MB: usize = 25;
const DEFAULT_SESSION_IDLE_MINS: u64 = 60;
const MB: usize = 1024 * 1024;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub sessions: Arc<SessionManager>,
    /// Largest decoded document accepted by the upload endpoint
    pub max_upload_bytes: usize,
}

impl AppState {
    pub fn new(sessions: Arc<SessionManager>, max_upload_bytes: usize) -> Self {
        Self {
            sessions,
            max_upload_bytes,
        }
    }
}

/// Server settings read once at startup
#[derive(Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub max_upload_mb: usize,
    /// Sessions with no client activity for this long are dropped
    pub session_idle_timeout: Duration,
    /// Keywords from `CREDITREP_DISPUTE_KEYWORDS`, when set
    pub custom_keywords: Option<KeywordClassifier>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            max_upload_mb: DEFAULT_MAX_UPLOAD_MB,
            session_idle_timeout: Duration::from_secs(DEFAULT_SESSION_IDLE_MINS * 60),
            custom_keywords: None,
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let port = std::env::var("CREDITREP_PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(defaults.port);
        let max_upload_mb = std::env::var("CREDITREP_MAX_UPLOAD_MB")
            .ok()
            .and_then(|m| m.parse().ok())
            .filter(|&m| m > 0)
            .unwrap_or(defaults.max_upload_mb);
        let session_idle_timeout = std::env::var("CREDITREP_SESSION_IDLE_MINS")
            .ok()
            .and_then(|m| m.parse::<u64>().ok())
            .filter(|&m| m > 0)
            .map_or(defaults.session_idle_timeout, |m| {
                Duration::from_secs(m.saturating_mul(60))
            });
        let custom_keywords = std::env::var("CREDITREP_DISPUTE_KEYWORDS")
            .ok()
            .map(|list| KeywordClassifier::from_list(&list));

        Self {
            port,
            max_upload_mb,
            session_idle_timeout,
            custom_keywords,
        }
    }

    /// Custom keywords when configured, the default keyword set otherwise
    pub fn classifier(&self) -> Arc<dyn IntentClassifier> {
        match &self.custom_keywords {
            Some(keywords) => Arc::new(keywords.clone()),
            None => Arc::new(classify),
        }
    }

    pub fn max_upload_bytes(&self) -> usize {
        self.max_upload_mb.saturating_mul(MB)
    }

    /// Request body cap; base64 inflates the document by a third
    pub fn max_body_bytes(&self) -> usize {
        (self.max_upload_bytes() / 3)
            .saturating_mul(4)
            .saturating_add(64 * 1024)
    }
}
