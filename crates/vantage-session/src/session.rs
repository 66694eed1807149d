//! Session data structure
//!
//! One remote browser tab as the client sees it. Display metadata (title,
//! favicon) is best-effort and may be stale; `url` only changes on a
//! confirmed navigation or a reload from the backend.

use serde::{Deserialize, Serialize};
use vantage_api::RemoteSession;

use crate::error::SessionError;
use crate::state::SessionState;
use crate::Result;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// Backend-assigned identifier
    pub id: String,
    /// Current address
    pub url: String,
    pub title: Option<String>,
    pub favicon: Option<String>,
    /// Position in the per-session state machine
    pub state: SessionState,
}

impl Session {
    pub fn from_remote(remote: RemoteSession) -> Self {
        Self {
            id: remote.id,
            url: remote.url,
            title: remote.title,
            favicon: remote.favicon,
            state: SessionState::Ready,
        }
    }

    /// Attempt to transition to a new state
    pub fn transition_to(&mut self, new_state: SessionState) -> Result<()> {
        if !self.state.can_transition_to(new_state) {
            return Err(SessionError::InvalidTransition {
                from: self.state.to_string(),
                to: new_state.to_string(),
            });
        }

        tracing::debug!(
            session_id = %self.id,
            from = %self.state,
            to = %new_state,
            "Session state transition"
        );

        self.state = new_state;
        Ok(())
    }

    /// Take fresh metadata from the backend. The URL of a session with a
    /// navigation in flight is left alone until that navigation settles.
    pub(crate) fn absorb(&mut self, remote: &RemoteSession) {
        if self.state != SessionState::Loading {
            self.url = remote.url.clone();
        }
        self.title = remote.title.clone();
        self.favicon = remote.favicon.clone();
    }

    pub fn is_loading(&self) -> bool {
        self.state == SessionState::Loading
    }

    pub fn is_closing(&self) -> bool {
        self.state == SessionState::Closing
    }

    /// Get display title (with fallback to URL)
    pub fn display_title(&self) -> &str {
        match self.title.as_deref() {
            Some(title) => title,
            None if !self.url.is_empty() => &self.url,
            None => "New Tab",
        }
    }
}
