//! Session Registry
//!
//! Owns the ordered session list and the active selection. Backend calls
//! run outside the lock; each change to local state is one critical section
//! that ends by publishing a snapshot to subscribers.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use tokio::sync::watch;
use uuid::Uuid;
use vantage_api::{RemoteApi, RemoteSession};

use crate::error::SessionError;
use crate::session::Session;
use crate::state::SessionState;
use crate::Result;

const RELOAD_RETRY_DELAY: Duration = Duration::from_millis(500);

/// Point-in-time copy of the registry, published on every change.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegistrySnapshot {
    pub sessions: Vec<Session>,
    pub active_id: Option<String>,
    /// Creations still waiting on the backend
    pub pending_creates: usize,
    pub revision: u64,
}

impl RegistrySnapshot {
    pub fn active(&self) -> Option<&Session> {
        let id = self.active_id.as_deref()?;
        self.sessions.iter().find(|s| s.id == id)
    }
}

#[derive(Default)]
struct RegistryState {
    /// Display order
    sessions: Vec<Session>,
    active_id: Option<String>,
    pending_creates: HashSet<String>,
    pending_closes: HashSet<String>,
    /// Sessions created or closed locally, with the revision it happened at.
    /// A reload requested before that revision reflects an older backend
    /// state and must not undo the change.
    created_at: HashMap<String, u64>,
    closed_at: HashMap<String, u64>,
    revision: u64,
}

impl RegistryState {
    fn position(&self, id: &str) -> Option<usize> {
        self.sessions.iter().position(|s| s.id == id)
    }

    fn find_mut(&mut self, id: &str) -> Option<&mut Session> {
        self.sessions.iter_mut().find(|s| s.id == id)
    }

    fn is_selectable(&self, id: &str) -> bool {
        !self.pending_closes.contains(id) && self.position(id).is_some()
    }

    fn first_selectable(&self) -> Option<String> {
        self.sessions
            .iter()
            .find(|s| !self.pending_closes.contains(&s.id))
            .map(|s| s.id.clone())
    }

    /// Session that takes over from the one at `index`: the next in display
    /// order, else the previous one.
    fn neighbour_of(&self, index: usize) -> Option<String> {
        let open = |s: &&Session| !self.pending_closes.contains(&s.id);
        self.sessions[index + 1..]
            .iter()
            .find(open)
            .or_else(|| self.sessions[..index].iter().rev().find(open))
            .map(|s| s.id.clone())
    }

    fn repair_active(&mut self) {
        self.active_id = match self.active_id.take() {
            Some(id) if self.is_selectable(&id) => Some(id),
            _ => self.first_selectable(),
        };
    }

    /// Replace the local view with the backend's list, fetched by a reload
    /// that started at revision `started`.
    fn replace_sessions(&mut self, remote: Vec<RemoteSession>, started: u64) {
        let listed: HashSet<String> = remote.iter().map(|r| r.id.clone()).collect();
        let fresh_creates: HashSet<String> = self
            .created_at
            .iter()
            .filter(|(_, at)| **at >= started)
            .map(|(id, _)| id.clone())
            .collect();

        // Known sessions keep their relative order
        let mut next = Vec::with_capacity(remote.len());
        for mut session in std::mem::take(&mut self.sessions) {
            if let Some(update) = remote.iter().find(|r| r.id == session.id) {
                session.absorb(update);
                next.push(session);
            } else if fresh_creates.contains(&session.id) {
                next.push(session);
            } else {
                tracing::debug!(session_id = %session.id, "Session gone from backend");
            }
        }

        for update in remote {
            let closed_after_request = self
                .closed_at
                .get(&update.id)
                .is_some_and(|at| *at >= started);
            if closed_after_request || next.iter().any(|s| s.id == update.id) {
                continue;
            }
            next.push(Session::from_remote(update));
        }

        self.sessions = next;
        self.created_at
            .retain(|id, at| *at >= started && !listed.contains(id));
        self.closed_at.retain(|_, at| *at >= started);
        self.repair_active();
    }

    fn snapshot(&self) -> RegistrySnapshot {
        RegistrySnapshot {
            sessions: self.sessions.clone(),
            active_id: self.active_id.clone(),
            pending_creates: self.pending_creates.len(),
            revision: self.revision,
        }
    }
}

pub struct SessionRegistry {
    api: Arc<dyn RemoteApi>,
    state: Arc<RwLock<RegistryState>>,
    changes: Arc<watch::Sender<RegistrySnapshot>>,
}

impl SessionRegistry {
    pub fn new(api: Arc<dyn RemoteApi>) -> Self {
        let (changes, _) = watch::channel(RegistrySnapshot::default());

        Self {
            api,
            state: Arc::new(RwLock::new(RegistryState::default())),
            changes: Arc::new(changes),
        }
    }

    fn update<T>(&self, f: impl FnOnce(&mut RegistryState) -> T) -> T {
        let mut state = self.state.write();
        let result = f(&mut state);
        state.revision += 1;
        // Published under the lock so subscribers never see revisions go back
        self.changes.send_replace(state.snapshot());
        result
    }

    fn try_update<T>(&self, f: impl FnOnce(&mut RegistryState) -> Result<T>) -> Result<T> {
        let mut state = self.state.write();
        let result = f(&mut state)?;
        state.revision += 1;
        self.changes.send_replace(state.snapshot());
        Ok(result)
    }

    // === Queries ===

    /// Current local view in display order. Never contacts the backend.
    pub fn list(&self) -> Vec<Session> {
        self.state.read().sessions.clone()
    }

    pub fn get(&self, id: &str) -> Result<Session> {
        self.state
            .read()
            .sessions
            .iter()
            .find(|s| s.id == id)
            .cloned()
            .ok_or_else(|| SessionError::not_found(id))
    }

    pub fn active_id(&self) -> Option<String> {
        self.state.read().active_id.clone()
    }

    pub fn active_session(&self) -> Option<Session> {
        let state = self.state.read();
        let id = state.active_id.as_deref()?;
        state.sessions.iter().find(|s| s.id == id).cloned()
    }

    pub fn is_pending_close(&self, id: &str) -> bool {
        self.state.read().pending_closes.contains(id)
    }

    pub fn len(&self) -> usize {
        self.state.read().sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.read().sessions.is_empty()
    }

    pub fn snapshot(&self) -> RegistrySnapshot {
        self.state.read().snapshot()
    }

    /// Change feed; the receiver always holds the latest snapshot.
    pub fn subscribe(&self) -> watch::Receiver<RegistrySnapshot> {
        self.changes.subscribe()
    }

    // === Reconciliation ===

    /// Replace the local view with the backend's list.
    ///
    /// Keeps the active session if it survived, otherwise selects the first
    /// remaining one. Idempotent, so safe to repeat.
    pub async fn reload(&self) -> Result<()> {
        let started = self.state.read().revision;
        let remote = self.api.list_sessions().await?;
        let count = remote.len();

        self.update(|state| state.replace_sessions(remote, started));

        tracing::debug!(count, "Reloaded sessions");
        Ok(())
    }

    pub async fn reload_with_retry(&self, attempts: u32) -> Result<()> {
        let attempts = attempts.max(1);
        let mut attempt = 1;
        loop {
            match self.reload().await {
                Ok(()) => return Ok(()),
                Err(e) if attempt < attempts => {
                    tracing::warn!(attempt, error = %e, "Session reload failed, retrying");
                    tokio::time::sleep(RELOAD_RETRY_DELAY * attempt).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    // === User actions ===

    /// Create a session and make it active. Not retried on failure.
    pub async fn create(&self, url: &str) -> Result<Session> {
        let url = url.trim();
        if url.is_empty() {
            return Err(SessionError::InvalidUrl("URL cannot be empty".to_string()));
        }

        let token = Uuid::new_v4().to_string();
        self.update(|state| {
            state.pending_creates.insert(token.clone());
        });

        let remote = match self.api.create_session(url).await {
            Ok(remote) => remote,
            Err(e) => {
                self.update(|state| {
                    state.pending_creates.remove(&token);
                });
                tracing::warn!(url = %url, error = %e, "Failed to create session");
                return Err(e.into());
            }
        };

        let session = self.update(|state| {
            state.pending_creates.remove(&token);
            let revision = state.revision;
            state.created_at.insert(remote.id.clone(), revision);

            // A reload triggered by the creation notification may have won
            let session = match state.position(&remote.id) {
                Some(index) => {
                    state.sessions[index].absorb(&remote);
                    state.sessions[index].clone()
                }
                None => {
                    let session = Session::from_remote(remote);
                    state.sessions.push(session.clone());
                    session
                }
            };
            state.active_id = Some(session.id.clone());
            session
        });

        tracing::info!(session_id = %session.id, url = %session.url, "Created session");

        Ok(session)
    }

    /// Make `id` the active session. Purely local.
    pub fn select(&self, id: &str) -> Result<Session> {
        let session = self.try_update(|state| {
            if state.pending_closes.contains(id) {
                return Err(SessionError::closing(id));
            }
            let session = state
                .sessions
                .iter()
                .find(|s| s.id == id)
                .cloned()
                .ok_or_else(|| SessionError::not_found(id))?;
            state.active_id = Some(session.id.clone());
            Ok(session)
        })?;

        tracing::debug!(session_id = %id, "Selected session");

        Ok(session)
    }

    /// Close a session.
    ///
    /// While the call is in flight the session counts as closing: it cannot
    /// be selected or receive input, and if it was active the selection has
    /// already moved to its neighbour. A failed close puts everything back.
    pub async fn close(&self, id: &str) -> Result<()> {
        let (was_active, successor) = self.try_update(|state| {
            if state.pending_closes.contains(id) {
                return Err(SessionError::ClosePending(id.to_string()));
            }
            let index = state.position(id).ok_or_else(|| SessionError::not_found(id))?;
            if state.sessions[index].is_loading() {
                return Err(SessionError::SessionBusy(id.to_string()));
            }
            state.sessions[index].transition_to(SessionState::Closing)?;
            state.pending_closes.insert(id.to_string());

            let was_active = state.active_id.as_deref() == Some(id);
            if was_active {
                state.active_id = state.neighbour_of(index);
            }
            Ok((was_active, state.active_id.clone()))
        })?;

        match self.api.close_session(id).await {
            Ok(()) => {
                self.update(|state| {
                    state.pending_closes.remove(id);
                    if let Some(index) = state.position(id) {
                        state.sessions.remove(index);
                    }
                    let revision = state.revision;
                    state.closed_at.insert(id.to_string(), revision);
                    state.created_at.remove(id);
                    state.repair_active();
                });

                tracing::info!(session_id = %id, "Closed session");
                Ok(())
            }
            Err(e) => {
                self.update(|state| {
                    state.pending_closes.remove(id);
                    let restored = match state.find_mut(id) {
                        Some(session) => {
                            let _ = session.transition_to(SessionState::Ready);
                            true
                        }
                        None => false,
                    };
                    // Give the selection back unless it moved on meanwhile
                    if restored && was_active && state.active_id == successor {
                        state.active_id = Some(id.to_string());
                    }
                });

                tracing::warn!(session_id = %id, error = %e, "Failed to close session");
                Err(e.into())
            }
        }
    }

    /// Navigate a session. `loading` is set for the duration of the call and
    /// `url` only changes once the backend confirms.
    pub async fn navigate(&self, id: &str, url: &str) -> Result<Session> {
        let url = url.trim();
        if url.is_empty() {
            return Err(SessionError::InvalidUrl("URL cannot be empty".to_string()));
        }

        self.try_update(|state| {
            if state.pending_closes.contains(id) {
                return Err(SessionError::closing(id));
            }
            let session = state.find_mut(id).ok_or_else(|| SessionError::not_found(id))?;
            if !session.state.is_settled() {
                return Err(SessionError::SessionBusy(id.to_string()));
            }
            session.transition_to(SessionState::Loading)
        })?;

        tracing::info!(session_id = %id, url = %url, "Navigating session");

        let result = self.api.navigate(id, url).await;

        self.update(|state| {
            let Some(session) = state.find_mut(id) else {
                // Gone while the call was in flight; the result is moot
                return Err(match result {
                    Ok(_) => SessionError::not_found(id),
                    Err(e) => e.into(),
                });
            };

            if session.is_loading() {
                let _ = session.transition_to(SessionState::Ready);
            }

            match result {
                Ok(outcome) => {
                    session.url = outcome.url.unwrap_or_else(|| url.to_string());
                    if outcome.title.is_some() {
                        session.title = outcome.title;
                    }
                    Ok(session.clone())
                }
                Err(e) => {
                    tracing::warn!(session_id = %id, error = %e, "Navigation failed");
                    Err(e.into())
                }
            }
        })
    }

    /// Load the session's current URL again.
    pub async fn refresh(&self, id: &str) -> Result<Session> {
        let url = self.get(id)?.url;
        self.navigate(id, &url).await
    }
}

impl Clone for SessionRegistry {
    fn clone(&self) -> Self {
        Self {
            api: Arc::clone(&self.api),
            state: Arc::clone(&self.state),
            changes: Arc::clone(&self.changes),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vantage_api::{ApiCall, MockApi};

    fn remote(id: &str) -> RemoteSession {
        RemoteSession::new(id, format!("https://{}.test", id))
    }

    async fn registry_with(ids: &[&str]) -> (Arc<MockApi>, SessionRegistry) {
        let api = Arc::new(MockApi::with_sessions(ids.iter().map(|id| remote(id)).collect()));
        let registry = SessionRegistry::new(api.clone());
        registry.reload().await.unwrap();
        (api, registry)
    }

    async fn wait_for_calls(api: &MockApi, predicate: fn(&ApiCall) -> bool, n: usize) {
        for _ in 0..1000 {
            if api.count(predicate) >= n {
                return;
            }
            tokio::task::yield_now().await;
        }
        panic!("expected backend call never happened");
    }

    fn ids(registry: &SessionRegistry) -> Vec<String> {
        registry.list().into_iter().map(|s| s.id).collect()
    }

    fn assert_active_valid(registry: &SessionRegistry) {
        let snapshot = registry.snapshot();
        match snapshot.active_id.as_deref() {
            None => assert!(snapshot.sessions.iter().all(|s| s.is_closing())),
            Some(id) => {
                assert!(snapshot.sessions.iter().any(|s| s.id == id));
                assert!(!registry.is_pending_close(id));
            }
        }
    }

    #[tokio::test]
    async fn test_create_appends_and_activates() {
        let api = Arc::new(MockApi::new());
        let registry = SessionRegistry::new(api.clone());

        let session = registry.create("example.com").await.unwrap();
        assert_eq!(session.id, "t1");
        assert_eq!(session.url, "https://example.com");
        assert!(session.title.is_none());

        assert_eq!(ids(&registry), vec!["t1"]);
        assert_eq!(registry.active_id().as_deref(), Some("t1"));
        assert_eq!(registry.snapshot().pending_creates, 0);
    }

    #[tokio::test]
    async fn test_create_failure_leaves_no_trace() {
        let (api, registry) = registry_with(&["a"]).await;
        api.fail("create");

        let err = registry.create("example.com").await.unwrap_err();
        assert!(matches!(err, SessionError::Api(_)));
        assert_eq!(ids(&registry), vec!["a"]);
        assert_eq!(registry.active_id().as_deref(), Some("a"));
        assert_eq!(registry.snapshot().pending_creates, 0);
        assert_eq!(api.count(|c| matches!(c, ApiCall::Create(_))), 1);
    }

    #[tokio::test]
    async fn test_create_rejects_empty_url() {
        let (api, registry) = registry_with(&[]).await;
        assert!(matches!(
            registry.create("  ").await,
            Err(SessionError::InvalidUrl(_))
        ));
        assert_eq!(api.count(|c| matches!(c, ApiCall::Create(_))), 0);
    }

    #[tokio::test]
    async fn test_create_after_reload_is_not_duplicated() {
        let (api, registry) = registry_with(&[]).await;
        api.hold("create");

        let r = registry.clone();
        let creating = tokio::spawn(async move { r.create("example.com").await });
        wait_for_calls(&api, |c| matches!(c, ApiCall::Create(_)), 1).await;

        // The backend has created it and the notification-driven reload lands
        // before the create response does
        api.set_sessions(vec![remote("t1")]);
        registry.reload().await.unwrap();
        api.release("create");

        let session = creating.await.unwrap().unwrap();
        assert_eq!(session.id, "t1");
        assert_eq!(ids(&registry), vec!["t1"]);
        assert_eq!(registry.active_id().as_deref(), Some("t1"));
    }

    #[tokio::test]
    async fn test_close_active_selects_next_in_order() {
        let (_api, registry) = registry_with(&["a", "b", "c"]).await;
        registry.select("b").unwrap();

        registry.close("b").await.unwrap();
        assert_eq!(ids(&registry), vec!["a", "c"]);
        assert_eq!(registry.active_id().as_deref(), Some("c"));

        // Last in order falls back to the previous one
        registry.close("c").await.unwrap();
        assert_eq!(registry.active_id().as_deref(), Some("a"));

        registry.close("a").await.unwrap();
        assert!(registry.is_empty());
        assert_eq!(registry.active_id(), None);
    }

    #[tokio::test]
    async fn test_close_inactive_keeps_selection() {
        let (_api, registry) = registry_with(&["a", "b", "c"]).await;
        registry.select("c").unwrap();

        registry.close("a").await.unwrap();
        assert_eq!(registry.active_id().as_deref(), Some("c"));
    }

    #[tokio::test]
    async fn test_double_close_rejected_without_second_call() {
        let (api, registry) = registry_with(&["a", "b"]).await;
        api.hold("close");

        let r = registry.clone();
        let first = tokio::spawn(async move { r.close("a").await });
        wait_for_calls(&api, |c| matches!(c, ApiCall::Close(_)), 1).await;

        // The active selection already moved off the closing session
        assert_eq!(registry.active_id().as_deref(), Some("b"));
        assert!(registry.is_pending_close("a"));
        assert!(matches!(
            registry.select("a"),
            Err(SessionError::InvalidSession { .. })
        ));

        let second = registry.close("a").await;
        assert!(matches!(second, Err(SessionError::ClosePending(ref id)) if id == "a"));

        api.release("close");
        first.await.unwrap().unwrap();

        assert_eq!(api.count(|c| matches!(c, ApiCall::Close(_))), 1);
        assert_eq!(ids(&registry), vec!["b"]);
        assert!(!registry.is_pending_close("a"));
    }

    #[tokio::test]
    async fn test_close_failure_restores_state() {
        let (api, registry) = registry_with(&["a", "b", "c"]).await;
        registry.select("b").unwrap();
        api.fail("close");

        assert!(registry.close("b").await.is_err());
        assert_eq!(ids(&registry), vec!["a", "b", "c"]);
        assert_eq!(registry.active_id().as_deref(), Some("b"));
        assert!(!registry.is_pending_close("b"));
        assert_eq!(registry.get("b").unwrap().state, SessionState::Ready);
    }

    #[tokio::test]
    async fn test_select_validation() {
        let (_api, registry) = registry_with(&["a", "b"]).await;

        assert_eq!(registry.select("b").unwrap().id, "b");
        assert!(matches!(
            registry.select("zzz"),
            Err(SessionError::InvalidSession { reason: "not found", .. })
        ));
        assert_eq!(registry.active_id().as_deref(), Some("b"));
    }

    #[tokio::test]
    async fn test_navigate_marks_loading_until_confirmed() {
        let (api, registry) = registry_with(&["a"]).await;
        api.hold("navigate");

        let r = registry.clone();
        let navigating = tokio::spawn(async move { r.navigate("a", "https://rust-lang.org").await });
        wait_for_calls(&api, |c| matches!(c, ApiCall::Navigate(..)), 1).await;

        let during = registry.get("a").unwrap();
        assert!(during.is_loading());
        assert_eq!(during.url, "https://a.test");

        // One mutating call per session
        assert!(matches!(
            registry.navigate("a", "https://other.test").await,
            Err(SessionError::SessionBusy(_))
        ));
        assert!(matches!(
            registry.close("a").await,
            Err(SessionError::SessionBusy(_))
        ));

        api.release("navigate");
        let after = navigating.await.unwrap().unwrap();
        assert!(!after.is_loading());
        assert_eq!(after.url, "https://rust-lang.org");
    }

    #[tokio::test]
    async fn test_navigate_failure_clears_loading() {
        let (api, registry) = registry_with(&["a"]).await;
        api.fail("navigate");

        assert!(registry.navigate("a", "https://b.test").await.is_err());
        let session = registry.get("a").unwrap();
        assert!(!session.is_loading());
        assert_eq!(session.url, "https://a.test");
    }

    #[tokio::test]
    async fn test_navigate_unknown_session() {
        let (api, registry) = registry_with(&["a"]).await;
        assert!(matches!(
            registry.navigate("zzz", "https://b.test").await,
            Err(SessionError::InvalidSession { .. })
        ));
        assert_eq!(api.count(|c| matches!(c, ApiCall::Navigate(..))), 0);
    }

    #[tokio::test]
    async fn test_refresh_renavigates_current_url() {
        let (api, registry) = registry_with(&["a"]).await;
        registry.refresh("a").await.unwrap();
        assert_eq!(
            api.calls().last(),
            Some(&ApiCall::Navigate("a".to_string(), "https://a.test".to_string()))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_reload_retries_after_failure() {
        let api = Arc::new(MockApi::with_sessions(vec![remote("a"), remote("b")]));
        let registry = SessionRegistry::new(api.clone());
        api.fail("list");

        let r = registry.clone();
        let reload = tokio::spawn(async move { r.reload_with_retry(3).await });

        wait_for_calls(&api, |c| matches!(c, ApiCall::List), 1).await;
        assert!(registry.is_empty());
        api.succeed("list");

        reload.await.unwrap().unwrap();
        assert_eq!(api.count(|c| matches!(c, ApiCall::List)), 2);
        assert_eq!(ids(&registry), vec!["a", "b"]);
        assert_eq!(registry.active_id().as_deref(), Some("a"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_reload_gives_up_after_attempts() {
        let api = Arc::new(MockApi::with_sessions(vec![remote("a")]));
        let registry = SessionRegistry::new(api.clone());
        api.fail("list");

        let started = tokio::time::Instant::now();
        let err = registry.reload_with_retry(3).await.unwrap_err();

        assert!(matches!(err, SessionError::Api(_)));
        assert_eq!(api.count(|c| matches!(c, ApiCall::List)), 3);
        // Backs off 500ms, then 1000ms
        assert_eq!(started.elapsed(), Duration::from_millis(1500));
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_reload_preserves_or_replaces_active() {
        let (api, registry) = registry_with(&["a", "b", "c"]).await;
        assert_eq!(registry.active_id().as_deref(), Some("a"));
        registry.select("c").unwrap();

        api.set_sessions(vec![remote("a"), remote("c"), remote("d")]);
        registry.reload().await.unwrap();
        assert_eq!(ids(&registry), vec!["a", "c", "d"]);
        assert_eq!(registry.active_id().as_deref(), Some("c"));

        api.set_sessions(vec![remote("d"), remote("a")]);
        registry.reload().await.unwrap();
        // Known sessions keep their display order
        assert_eq!(ids(&registry), vec!["a", "d"]);
        assert_eq!(registry.active_id().as_deref(), Some("a"));

        api.set_sessions(vec![]);
        registry.reload().await.unwrap();
        assert_eq!(registry.active_id(), None);
    }

    #[tokio::test]
    async fn test_stale_reload_keeps_local_changes() {
        let (api, registry) = registry_with(&["a", "b"]).await;
        api.hold("list");

        let r = registry.clone();
        let reloading = tokio::spawn(async move { r.reload().await });
        wait_for_calls(&api, |c| matches!(c, ApiCall::List), 2).await;

        // Both land after the list was taken
        let created = registry.create("new.test").await.unwrap();
        registry.close("b").await.unwrap();

        api.release("list");
        reloading.await.unwrap().unwrap();

        assert_eq!(ids(&registry), vec!["a".to_string(), created.id.clone()]);
        assert_eq!(registry.active_id(), Some(created.id));
    }

    #[tokio::test]
    async fn test_active_never_dangles() {
        let (_api, registry) = registry_with(&[]).await;

        let mut open: Vec<String> = Vec::new();
        for step in 0..40u32 {
            if step % 3 == 2 && !open.is_empty() {
                let victim = open.remove((step as usize * 7) % open.len());
                registry.close(&victim).await.unwrap();
            } else {
                open.push(registry.create("example.com").await.unwrap().id);
            }
            assert_active_valid(&registry);
        }
        while let Some(victim) = open.pop() {
            registry.close(&victim).await.unwrap();
            assert_active_valid(&registry);
        }
        assert_eq!(registry.active_id(), None);
    }

    #[tokio::test]
    async fn test_subscribers_see_changes() {
        let (_api, registry) = registry_with(&["a", "b"]).await;
        let mut changes = registry.subscribe();
        let before = changes.borrow_and_update().revision;

        registry.select("b").unwrap();
        assert!(changes.has_changed().unwrap());
        let snapshot = changes.borrow_and_update().clone();
        assert!(snapshot.revision > before);
        assert_eq!(snapshot.active().map(|s| s.id.as_str()), Some("b"));
    }
}
