//! Per-session lifecycle state machine
//!
//! ```text
//!          navigate            close
//! Loading <-------- Ready --------> Closing
//!         --------->      <--------
//!          complete          close failed
//! ```
//!
//! At most one mutating call is outstanding per session: a session that is
//! `Loading` or `Closing` accepts no further navigate/close until it settles.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    /// Idle; accepts navigation, input and close
    #[default]
    Ready,
    /// A navigation or refresh is outstanding
    Loading,
    /// A close call is outstanding
    Closing,
}

impl SessionState {
    /// Check if transition to another state is valid
    pub fn can_transition_to(&self, target: SessionState) -> bool {
        match (self, target) {
            (SessionState::Ready, SessionState::Loading) => true,
            (SessionState::Loading, SessionState::Ready) => true,
            (SessionState::Ready, SessionState::Closing) => true,
            // Close failed; the session is still there
            (SessionState::Closing, SessionState::Ready) => true,
            _ => false,
        }
    }

    /// Whether a new mutating call may start from this state
    pub fn is_settled(&self) -> bool {
        matches!(self, SessionState::Ready)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SessionState::Ready => "ready",
            SessionState::Loading => "loading",
            SessionState::Closing => "closing",
        }
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_transitions() {
        assert!(SessionState::Ready.can_transition_to(SessionState::Loading));
        assert!(SessionState::Loading.can_transition_to(SessionState::Ready));
        assert!(SessionState::Ready.can_transition_to(SessionState::Closing));
        assert!(SessionState::Closing.can_transition_to(SessionState::Ready));
    }

    #[test]
    fn test_invalid_transitions() {
        // One outstanding mutation per session
        assert!(!SessionState::Loading.can_transition_to(SessionState::Closing));
        assert!(!SessionState::Closing.can_transition_to(SessionState::Loading));
        assert!(!SessionState::Loading.can_transition_to(SessionState::Loading));
        assert!(!SessionState::Closing.can_transition_to(SessionState::Closing));
    }
}
