//! Runtime for executing sessions
//!
//! One [`SessionRuntime`] per connected client, each behind its own lock.
//! Sessions share nothing but the collaborator clients.

mod executor;

#[cfg(test)]
pub mod testing;

pub use executor::SessionRuntime;

use crate::dispute::DisputeFieldsUpdate;
use crate::document::UploadedFile;
use crate::error::ActionError;
use crate::intent::IntentClassifier;
use crate::services::{ChatService, DocumentParser, EmailSender};
use crate::state_machine::{SessionContext, SessionSnapshot, TransitionError};
use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex, PoisonError};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{broadcast, watch, Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// Runtime over shared collaborator trait objects
pub type SharedRuntime =
    SessionRuntime<Arc<dyn DocumentParser>, Arc<dyn ChatService>, Arc<dyn EmailSender>>;

/// Why an action did not complete
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    /// The session cannot accept the action in its current state
    #[error(transparent)]
    Rejected(#[from] TransitionError),
    /// A collaborator call failed; the session is back in its prior state
    #[error(transparent)]
    Failed(#[from] ActionError),
    /// The task running the action panicked
    #[error("Session task ended unexpectedly: {0}")]
    Interrupted(String),
}

/// A user action accepted from the rendering layer
#[derive(Debug)]
pub enum Action {
    UploadDocument(UploadedFile),
    SendMessage(String),
    UpdateDispute(DisputeFieldsUpdate),
    RequestDraft,
    ConfirmSend,
    CancelDispute,
}

/// Events sent to connected clients
#[derive(Debug, Clone)]
pub enum SessionUpdate {
    Snapshot(SessionSnapshot),
    Error { message: String },
}

/// The external services every session talks to
#[derive(Clone)]
pub struct Collaborators {
    pub parser: Arc<dyn DocumentParser>,
    pub chat: Arc<dyn ChatService>,
    pub email: Arc<dyn EmailSender>,
}

/// Handle to interact with a session
#[derive(Clone)]
pub struct SessionHandle {
    pub runtime: Arc<Mutex<SharedRuntime>>,
    pub broadcast_tx: broadcast::Sender<SessionUpdate>,
    pub latest_rx: watch::Receiver<SessionSnapshot>,
    last_active: Arc<StdMutex<Instant>>,
}

impl SessionHandle {
    fn new(
        runtime: SharedRuntime,
        broadcast_tx: broadcast::Sender<SessionUpdate>,
        latest_rx: watch::Receiver<SessionSnapshot>,
    ) -> Self {
        Self {
            runtime: Arc::new(Mutex::new(runtime)),
            broadcast_tx,
            latest_rx,
            last_active: Arc::new(StdMutex::new(Instant::now())),
        }
    }

    /// Last published snapshot; readable while an action is in flight
    pub fn latest(&self) -> SessionSnapshot {
        self.latest_rx.borrow().clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionUpdate> {
        self.touch();
        self.broadcast_tx.subscribe()
    }

    /// Run an action unless another one is in flight.
    ///
    /// The action runs on its own task holding the session lock, so the
    /// caller going away does not cut a collaborator call short.
    pub async fn perform(&self, action: Action) -> Result<SessionSnapshot, SessionError> {
        self.touch();
        let mut runtime = self
            .runtime
            .clone()
            .try_lock_owned()
            .map_err(|_| TransitionError::Busy)?;

        let task = tokio::spawn(async move { runtime.perform(action).await });
        let result = task
            .await
            .map_err(|e| SessionError::Interrupted(e.to_string()))?;
        self.touch();
        result
    }

    /// Wait for any in-flight action, then clear the session
    pub async fn reset(&self) -> Result<SessionSnapshot, SessionError> {
        self.touch();
        let runtime = self.runtime.clone();
        tokio::spawn(async move {
            let mut runtime = runtime.lock_owned().await;
            runtime.reset().await
        })
        .await
        .map_err(|e| SessionError::Interrupted(e.to_string()))
    }

    fn touch(&self) {
        *self
            .last_active
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Instant::now();
    }

    /// Quiet for `idle_timeout`, with no stream open and no action running
    fn is_idle(&self, idle_timeout: Duration) -> bool {
        let quiet = self
            .last_active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .elapsed()
            >= idle_timeout;
        quiet && self.broadcast_tx.receiver_count() == 0 && self.runtime.try_lock().is_ok()
    }
}

/// Manager for all live sessions
pub struct SessionManager {
    collaborators: Collaborators,
    classifier: Arc<dyn IntentClassifier>,
    sessions: RwLock<HashMap<String, SessionHandle>>,
}

impl SessionManager {
    pub fn new(collaborators: Collaborators, classifier: Arc<dyn IntentClassifier>) -> Self {
        Self {
            collaborators,
            classifier,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Start a fresh session in `AwaitingDocument`
    pub async fn create(&self) -> (String, SessionHandle) {
        let session_id = uuid::Uuid::new_v4().to_string();
        let context = SessionContext::new(&session_id, self.classifier.clone());

        let (broadcast_tx, _) = broadcast::channel(64);
        let (latest_tx, latest_rx) = watch::channel(SessionSnapshot::default());

        let runtime: SharedRuntime = SessionRuntime::new(
            context,
            self.collaborators.parser.clone(),
            self.collaborators.chat.clone(),
            self.collaborators.email.clone(),
            broadcast_tx.clone(),
            latest_tx,
        );

        let handle = SessionHandle::new(runtime, broadcast_tx, latest_rx);

        self.sessions
            .write()
            .await
            .insert(session_id.clone(), handle.clone());
        tracing::info!(session_id = %session_id, "Session created");

        (session_id, handle)
    }

    /// Look up a session; any lookup counts as client activity
    pub async fn get(&self, session_id: &str) -> Option<SessionHandle> {
        let handle = self.sessions.read().await.get(session_id).cloned();
        if let Some(handle) = &handle {
            handle.touch();
        }
        handle
    }

    /// Drop a session; an in-flight action finishes on its own task
    pub async fn close(&self, session_id: &str) -> bool {
        let removed = self.sessions.write().await.remove(session_id).is_some();
        if removed {
            tracing::info!(session_id = %session_id, "Session closed");
        }
        removed
    }

    /// Drop sessions whose client has gone quiet, returning how many went
    pub async fn evict_idle(&self, idle_timeout: Duration) -> usize {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|session_id, handle| {
            let idle = handle.is_idle(idle_timeout);
            if idle {
                tracing::info!(session_id = %session_id, "Evicting idle session");
            }
            !idle
        });
        before - sessions.len()
    }

    /// Start the background task that evicts idle sessions
    pub fn start_idle_sweeper(self: &Arc<Self>, idle_timeout: Duration) -> JoinHandle<()> {
        let manager = Arc::clone(self);
        let period = (idle_timeout / 4).clamp(Duration::from_secs(1), Duration::from_secs(60));

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            loop {
                ticker.tick().await;
                let evicted = manager.evict_idle(idle_timeout).await;
                if evicted > 0 {
                    tracing::debug!(evicted, "Idle sweep finished");
                }
            }
        })
    }

    #[allow(dead_code)] // Used for diagnostics and tests
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }
}
