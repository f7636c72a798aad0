//! Session coordinator: starts the one remote avatar session.
//!
//! The "already started" latch is the session state itself. `Idle` and
//! `Failed` may start a bootstrap; `Connecting` and `Ready` may not. The
//! transition to `Connecting` happens under the lock before the bootstrap
//! task is spawned, so concurrent arrivals cannot both start a session.
//!
//! State transitions:
//! ```text
//! Idle ──arrival──▶ Connecting ──ok──▶ Ready
//!  ▲                    │
//!  └──arrival── Failed ◀┘ (auth / start error)
//! ```

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use tokio::task::JoinHandle;

use crate::auth::TokenIssuer;
use crate::avatar::{AvatarConnector, SessionHandle};
use crate::error::{SessionError, SessionResult};
use crate::persona::PersonaConfig;
use crate::status::{self, StatusBoard};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// Never started, or torn down.
    Idle,
    Connecting,
    Ready,
    /// Last bootstrap failed; the next arrival retries.
    Failed,
}

impl SessionState {
    /// Whether a session is live or on its way.
    pub fn is_started(self) -> bool {
        matches!(self, SessionState::Connecting | SessionState::Ready)
    }
}

/// Where the session renders and what it says first.
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    /// Video surface the avatar stream is bound to.
    pub avatar_target: String,
    /// Scripted introduction spoken on reaching `Ready`.
    pub intro: String,
}

struct Inner {
    state: SessionState,
    session: Option<SessionHandle>,
    /// Bumped on every bootstrap; stale completions are discarded.
    attempt: u64,
    closed: bool,
}

/// Clone-safe handle to the coordinator.
#[derive(Clone)]
pub struct SessionCoordinator {
    inner: Arc<Mutex<Inner>>,
    issuer: Arc<dyn TokenIssuer>,
    connector: Arc<dyn AvatarConnector>,
    persona: Arc<PersonaConfig>,
    config: Arc<CoordinatorConfig>,
    status: StatusBoard,
}

impl SessionCoordinator {
    pub fn new(
        issuer: Arc<dyn TokenIssuer>,
        connector: Arc<dyn AvatarConnector>,
        persona: PersonaConfig,
        config: CoordinatorConfig,
        status: StatusBoard,
    ) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                state: SessionState::Idle,
                session: None,
                attempt: 0,
                closed: false,
            })),
            issuer,
            connector,
            persona: Arc::new(persona),
            config: Arc::new(config),
            status,
        }
    }

    pub fn state(&self) -> SessionState {
        self.lock().state
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// A customer is in range: start the session unless one is already
    /// starting or live.
    ///
    /// Returns the bootstrap task when one was started. Must be called from
    /// within a tokio runtime.
    pub fn on_arrival_in_range(&self) -> Option<JoinHandle<()>> {
        let attempt = {
            let mut inner = self.lock();
            if inner.closed || inner.state.is_started() {
                tracing::trace!(state = ?inner.state, "arrival ignored, session already started");
                return None;
            }
            if inner.state == SessionState::Failed {
                tracing::info!("retrying session after previous failure");
            }
            inner.state = SessionState::Connecting;
            inner.attempt += 1;
            self.status.update(|s| {
                s.session = SessionState::Connecting;
                s.message = status::MSG_CONNECTING.to_string();
            });
            inner.attempt
        };

        tracing::info!(attempt, "starting avatar session");
        let this = self.clone();
        Some(tokio::spawn(async move { this.bootstrap(attempt).await }))
    }

    async fn bootstrap(self, attempt: u64) {
        let token = match self.issuer.issue_token(&self.persona).await {
            Ok(token) => token,
            Err(e) => return self.fail(attempt, e),
        };

        let session = match self.connector.connect(token, &self.config.avatar_target).await {
            Ok(session) => session,
            Err(e) => return self.fail(attempt, e),
        };

        let committed = {
            let mut inner = self.lock();
            let current = !inner.closed && inner.attempt == attempt;
            if current {
                inner.state = SessionState::Ready;
                inner.session = Some(Arc::clone(&session));
                self.status.update(|s| {
                    s.session = SessionState::Ready;
                    s.message = status::MSG_READY.to_string();
                    s.last_error = None;
                });
            }
            current
        };

        if !committed {
            tracing::info!(attempt, "session came up after teardown, stopping it");
            if let Err(e) = session.stop_streaming().await {
                tracing::warn!(error = %e, "failed to stop orphaned session");
            }
            return;
        }

        tracing::info!(attempt, target = %self.config.avatar_target, "avatar session ready");
        if let Err(e) = session.speak(&self.config.intro).await {
            tracing::warn!(error = %e, "introduction failed");
        }
    }

    fn fail(&self, attempt: u64, error: SessionError) {
        let mut inner = self.lock();
        if inner.closed || inner.attempt != attempt {
            tracing::debug!(attempt, error = %error, "ignoring failure of stale bootstrap");
            return;
        }
        inner.state = SessionState::Failed;
        tracing::error!(attempt, error = %error, "avatar session bootstrap failed");
        self.status.update(|s| {
            s.session = SessionState::Failed;
            s.message = status::MSG_CONNECT_FAILED.to_string();
            s.last_error = Some(error.to_string());
        });
    }

    /// Forward a typed message to the live session.
    ///
    /// Blank text is ignored in every state (`Ok(false)`). Anything else
    /// before `Ready` is dropped with [`SessionError::NotReady`]; nothing is
    /// queued for later.
    pub async fn send_message(&self, text: &str) -> SessionResult<bool> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(false);
        }

        let session = {
            let inner = self.lock();
            match (&inner.state, &inner.session) {
                (SessionState::Ready, Some(session)) if !inner.closed => Arc::clone(session),
                _ => return Err(SessionError::NotReady),
            }
        };

        tracing::debug!(chars = text.len(), "forwarding message to avatar");
        session.speak(text).await?;
        Ok(true)
    }

    /// Stop the live session, if any, and refuse further bootstraps.
    ///
    /// Idempotent. A bootstrap still in flight is left to finish; its
    /// session is stopped as soon as it arrives. Stop failures are logged.
    pub async fn teardown(&self) {
        let session = {
            let mut inner = self.lock();
            if inner.closed {
                return;
            }
            inner.closed = true;
            inner.state = SessionState::Idle;
            self.status.update(|s| s.session = SessionState::Idle);
            inner.session.take()
        };

        let Some(session) = session else {
            tracing::debug!("coordinator closed with no live session");
            return;
        };
        tracing::info!("stopping avatar session");
        if let Err(e) = session.stop_streaming().await {
            tracing::warn!(error = %e, "failed to stop avatar session");
        }
    }
}
