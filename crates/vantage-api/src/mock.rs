//! In-memory backend for tests
//!
//! Records every call, keeps a session list that behaves like the real
//! backend, and can fail or hold individual operations.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use tokio::sync::Semaphore;

use crate::client::RemoteApi;
use crate::error::ApiError;
use crate::types::{
    BackendStatus, ClickRequest, NavigateOutcome, RemoteSession, ScrollRequest, TypeRequest,
};
use crate::Result;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiCall {
    List,
    Create(String),
    Close(String),
    Navigate(String, String),
    Screenshot(String, u64),
    Click(String, ClickRequest),
    Type(String, TypeRequest),
    Keypress(String, String),
    Scroll(String, ScrollRequest),
    Status,
}

impl ApiCall {
    fn op(&self) -> &'static str {
        match self {
            ApiCall::List => "list",
            ApiCall::Create(_) => "create",
            ApiCall::Close(_) => "close",
            ApiCall::Navigate(..) => "navigate",
            ApiCall::Screenshot(..) => "screenshot",
            ApiCall::Click(..) => "click",
            ApiCall::Type(..) => "type",
            ApiCall::Keypress(..) => "keypress",
            ApiCall::Scroll(..) => "scroll",
            ApiCall::Status => "status",
        }
    }
}

#[derive(Default)]
pub struct MockApi {
    sessions: Mutex<Vec<RemoteSession>>,
    calls: Mutex<Vec<ApiCall>>,
    failing: Mutex<HashSet<&'static str>>,
    gates: Mutex<HashMap<&'static str, Arc<Semaphore>>>,
    unavailable: Mutex<bool>,
    next_id: AtomicU64,
}

impl MockApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sessions(sessions: Vec<RemoteSession>) -> Self {
        let api = Self::default();
        *api.sessions.lock() = sessions;
        api
    }

    /// Replace the backend's view, as if something else changed it.
    pub fn set_sessions(&self, sessions: Vec<RemoteSession>) {
        *self.sessions.lock() = sessions;
    }

    pub fn sessions(&self) -> Vec<RemoteSession> {
        self.sessions.lock().clone()
    }

    /// Make `op` ("create", "close", "screenshot", ...) answer with HTTP 500.
    pub fn fail(&self, op: &'static str) {
        self.failing.lock().insert(op);
    }

    pub fn succeed(&self, op: &'static str) {
        self.failing.lock().remove(op);
    }

    /// Make every call fail at the transport level.
    pub fn set_unavailable(&self, unavailable: bool) {
        *self.unavailable.lock() = unavailable;
    }

    /// Keep calls to `op` in flight until [`MockApi::release`].
    pub fn hold(&self, op: &'static str) {
        self.gates.lock().insert(op, Arc::new(Semaphore::new(0)));
    }

    pub fn release(&self, op: &'static str) {
        if let Some(gate) = self.gates.lock().remove(op) {
            gate.add_permits(Semaphore::MAX_PERMITS / 2);
        }
    }

    pub fn calls(&self) -> Vec<ApiCall> {
        self.calls.lock().clone()
    }

    pub fn count(&self, predicate: impl Fn(&ApiCall) -> bool) -> usize {
        self.calls.lock().iter().filter(|c| predicate(c)).count()
    }

    async fn enter(&self, call: ApiCall) -> Result<()> {
        let op = call.op();
        self.calls.lock().push(call);

        let gate = self.gates.lock().get(op).cloned();
        if let Some(gate) = gate {
            let _permit = gate.acquire().await;
        }

        if *self.unavailable.lock() {
            return Err(ApiError::Unavailable("connection refused".to_string()));
        }
        if self.failing.lock().contains(op) {
            return Err(ApiError::ActionFailed {
                action: op,
                status: 500,
                message: format!("{} failed", op),
            });
        }
        Ok(())
    }

    fn not_found(action: &'static str) -> ApiError {
        ApiError::ActionFailed {
            action,
            status: 404,
            message: "Tab not found".to_string(),
        }
    }
}

fn normalize(url: &str) -> String {
    if url.contains("://") || url.starts_with("about:") {
        url.to_string()
    } else {
        format!("https://{}", url)
    }
}

#[async_trait]
impl RemoteApi for MockApi {
    async fn list_sessions(&self) -> Result<Vec<RemoteSession>> {
        // Answer reflects the backend when the request arrived
        let sessions = self.sessions.lock().clone();
        self.enter(ApiCall::List).await?;
        Ok(sessions)
    }

    async fn create_session(&self, url: &str) -> Result<RemoteSession> {
        self.enter(ApiCall::Create(url.to_string())).await?;
        let id = format!("t{}", self.next_id.fetch_add(1, Ordering::SeqCst) + 1);
        let session = RemoteSession::new(id, normalize(url));
        self.sessions.lock().push(session.clone());
        Ok(session)
    }

    async fn close_session(&self, session_id: &str) -> Result<()> {
        self.enter(ApiCall::Close(session_id.to_string())).await?;
        let mut sessions = self.sessions.lock();
        let before = sessions.len();
        sessions.retain(|s| s.id != session_id);
        if sessions.len() == before {
            return Err(Self::not_found("close"));
        }
        Ok(())
    }

    async fn navigate(&self, session_id: &str, url: &str) -> Result<NavigateOutcome> {
        self.enter(ApiCall::Navigate(session_id.to_string(), url.to_string()))
            .await?;
        let mut sessions = self.sessions.lock();
        let session = sessions
            .iter_mut()
            .find(|s| s.id == session_id)
            .ok_or_else(|| Self::not_found("navigate"))?;
        session.url = normalize(url);
        Ok(NavigateOutcome {
            url: Some(session.url.clone()),
            title: session.title.clone(),
        })
    }

    async fn screenshot(&self, session_id: &str, token: u64) -> Result<Bytes> {
        self.enter(ApiCall::Screenshot(session_id.to_string(), token))
            .await?;
        Ok(Bytes::from(format!("jpeg:{}:{}", session_id, token)))
    }

    fn screenshot_url(&self, session_id: &str, token: u64) -> String {
        format!("mock://sessions/{}/screenshot?t={}", session_id, token)
    }

    async fn click(&self, session_id: &str, click: &ClickRequest) -> Result<()> {
        self.enter(ApiCall::Click(session_id.to_string(), click.clone()))
            .await
    }

    async fn type_text(&self, session_id: &str, input: &TypeRequest) -> Result<()> {
        self.enter(ApiCall::Type(session_id.to_string(), input.clone()))
            .await
    }

    async fn keypress(&self, session_id: &str, key: &str) -> Result<()> {
        self.enter(ApiCall::Keypress(session_id.to_string(), key.to_string()))
            .await
    }

    async fn scroll(&self, session_id: &str, scroll: &ScrollRequest) -> Result<()> {
        self.enter(ApiCall::Scroll(session_id.to_string(), scroll.clone()))
            .await
    }

    async fn status(&self) -> Result<BackendStatus> {
        self.enter(ApiCall::Status).await?;
        let pages = self.sessions.lock().len();
        Ok(BackendStatus {
            browser_type: "chromium".to_string(),
            headless: true,
            active_contexts: 1,
            active_pages: pages,
        })
    }
}
