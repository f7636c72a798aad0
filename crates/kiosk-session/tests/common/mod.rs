//! In-process fakes for the token endpoint and the avatar renderer.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use kiosk_session::{
    AvatarConnector, AvatarSession, CoordinatorConfig, KioskPersona, PersonaConfig,
    SessionCoordinator, SessionError, SessionHandle, SessionResult, SessionToken, StatusBoard,
    TokenIssuer,
};
use tokio::sync::Semaphore;

pub const INTRO: &str = "Hello from the kiosk";
pub const TARGET: &str = "persona-video";

/// Token issuer that answers from a script (default: success) and can be
/// held open with a gate to keep the coordinator in `Connecting`.
#[derive(Default)]
pub struct FakeIssuer {
    pub calls: AtomicUsize,
    script: Mutex<VecDeque<SessionResult<SessionToken>>>,
    gate: Option<Arc<Semaphore>>,
}

impl FakeIssuer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn gated(gate: Arc<Semaphore>) -> Self {
        Self {
            gate: Some(gate),
            ..Self::default()
        }
    }

    pub fn then(self, result: SessionResult<SessionToken>) -> Self {
        self.script.lock().unwrap().push_back(result);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TokenIssuer for FakeIssuer {
    async fn issue_token(&self, _persona: &PersonaConfig) -> SessionResult<SessionToken> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            gate.acquire().await.unwrap().forget();
        }
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(SessionToken::new("token")))
    }
}

/// Records every call made on the sessions it hands out.
#[derive(Default)]
pub struct SessionLog {
    pub spoken: Mutex<Vec<String>>,
    pub stops: AtomicUsize,
}

impl SessionLog {
    pub fn spoken(&self) -> Vec<String> {
        self.spoken.lock().unwrap().clone()
    }

    pub fn stops(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }
}

pub struct FakeSession {
    log: Arc<SessionLog>,
    fail_stop: bool,
}

#[async_trait]
impl AvatarSession for FakeSession {
    async fn speak(&self, text: &str) -> SessionResult<()> {
        self.log.spoken.lock().unwrap().push(text.to_string());
        Ok(())
    }

    async fn stop_streaming(&self) -> SessionResult<()> {
        self.log.stops.fetch_add(1, Ordering::SeqCst);
        if self.fail_stop {
            return Err(SessionError::Call("stream already gone".into()));
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeConnector {
    pub connects: AtomicUsize,
    pub targets: Mutex<Vec<String>>,
    pub log: Arc<SessionLog>,
    pub fail_connect: bool,
    pub fail_stop: bool,
}

impl FakeConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AvatarConnector for FakeConnector {
    async fn connect(&self, token: SessionToken, target: &str) -> SessionResult<SessionHandle> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        self.targets.lock().unwrap().push(target.to_string());
        if self.fail_connect {
            return Err(SessionError::SessionStart(format!(
                "renderer refused token of {} bytes",
                token.as_str().len()
            )));
        }
        Ok(Arc::new(FakeSession {
            log: Arc::clone(&self.log),
            fail_stop: self.fail_stop,
        }))
    }
}

pub fn coordinator(
    issuer: &Arc<FakeIssuer>,
    connector: &Arc<FakeConnector>,
    status: &StatusBoard,
) -> SessionCoordinator {
    let persona = KioskPersona::embedded().unwrap().persona_config();
    SessionCoordinator::new(
        Arc::clone(issuer) as Arc<dyn TokenIssuer>,
        Arc::clone(connector) as Arc<dyn AvatarConnector>,
        persona,
        CoordinatorConfig {
            avatar_target: TARGET.to_string(),
            intro: INTRO.to_string(),
        },
        status.clone(),
    )
}
