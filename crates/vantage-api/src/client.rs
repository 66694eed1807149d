//! HTTP client for the automation backend
//!
//! Endpoints, relative to the configured base URL:
//! ```text
//! GET    sessions
//! POST   sessions                    {url}
//! DELETE sessions/{id}
//! POST   sessions/{id}/navigate      {url}
//! GET    sessions/{id}/screenshot?t={token}
//! POST   sessions/{id}/click         {x, y, button, click_count}
//! POST   sessions/{id}/type          {text, delay}
//! POST   sessions/{id}/keypress?key={name}
//! POST   sessions/{id}/scroll        {delta_x, delta_y}
//! GET    browser/status
//! ```

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use serde::Deserialize;
use url::Url;

use crate::error::ApiError;
use crate::types::{
    BackendStatus, ClickRequest, NavigateOutcome, RemoteSession, ScrollRequest, TypeRequest,
};
use crate::Result;

/// Calls against the automation backend.
///
/// Every call is a single request/response; nothing is retried here. Callers
/// decide whether a failed call is safe to repeat.
#[async_trait]
pub trait RemoteApi: Send + Sync {
    async fn list_sessions(&self) -> Result<Vec<RemoteSession>>;

    async fn create_session(&self, url: &str) -> Result<RemoteSession>;

    async fn close_session(&self, session_id: &str) -> Result<()>;

    async fn navigate(&self, session_id: &str, url: &str) -> Result<NavigateOutcome>;

    /// Fetch a fresh still image. `token` busts any intermediate cache.
    async fn screenshot(&self, session_id: &str, token: u64) -> Result<Bytes>;

    /// Address of the still image for `token`, usable as an image reference.
    fn screenshot_url(&self, session_id: &str, token: u64) -> String;

    async fn click(&self, session_id: &str, click: &ClickRequest) -> Result<()>;

    async fn type_text(&self, session_id: &str, input: &TypeRequest) -> Result<()>;

    async fn keypress(&self, session_id: &str, key: &str) -> Result<()>;

    async fn scroll(&self, session_id: &str, scroll: &ScrollRequest) -> Result<()>;

    async fn status(&self) -> Result<BackendStatus>;
}

#[derive(Deserialize)]
#[serde(untagged)]
enum SessionList {
    Bare(Vec<RemoteSession>),
    Wrapped {
        #[serde(alias = "tabs")]
        sessions: Vec<RemoteSession>,
    },
}

#[derive(Deserialize)]
#[serde(untagged)]
enum CreatedSession {
    Wrapped {
        #[serde(default = "default_success")]
        success: bool,
        #[serde(alias = "tab")]
        session: RemoteSession,
    },
    Bare(RemoteSession),
}

fn default_success() -> bool {
    true
}

/// FastAPI-style error body
#[derive(Deserialize)]
struct ErrorBody {
    detail: String,
}

pub struct HttpApiClient {
    http: reqwest::Client,
    base: Url,
}

impl HttpApiClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let mut base = Url::parse(base_url)
            .map_err(|e| ApiError::InvalidUrl(format!("{}: {}", base_url, e)))?;

        if base.cannot_be_a_base() {
            return Err(ApiError::InvalidUrl(base_url.to_string()));
        }

        // Url::join semantics need the trailing slash on the base path
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }

        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ApiError::Unavailable(e.to_string()))?;

        Ok(Self { http, base })
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base.clone();
        {
            let mut path = url
                .path_segments_mut()
                .map_err(|_| ApiError::InvalidUrl(self.base.to_string()))?;
            path.pop_if_empty();
            path.extend(segments);
        }
        Ok(url)
    }

    async fn check(action: &'static str, response: reqwest::Response) -> Result<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorBody>(&body)
            .map(|b| b.detail)
            .unwrap_or(body);

        tracing::warn!(action, status = status.as_u16(), %message, "Backend rejected request");

        Err(ApiError::ActionFailed {
            action,
            status: status.as_u16(),
            message,
        })
    }

    async fn post_json<B: serde::Serialize + ?Sized>(
        &self,
        action: &'static str,
        url: Url,
        body: &B,
    ) -> Result<reqwest::Response> {
        let response = self.http.post(url).json(body).send().await?;
        Self::check(action, response).await
    }
}

#[async_trait]
impl RemoteApi for HttpApiClient {
    async fn list_sessions(&self) -> Result<Vec<RemoteSession>> {
        let url = self.endpoint(&["sessions"])?;
        let response = Self::check("list", self.http.get(url).send().await?).await?;

        let sessions = match response.json::<SessionList>().await? {
            SessionList::Bare(sessions) => sessions,
            SessionList::Wrapped { sessions } => sessions,
        };

        tracing::debug!(count = sessions.len(), "Listed remote sessions");
        Ok(sessions)
    }

    async fn create_session(&self, url: &str) -> Result<RemoteSession> {
        let endpoint = self.endpoint(&["sessions"])?;
        let response = self
            .post_json("create", endpoint, &serde_json::json!({ "url": url }))
            .await?;

        match response.json::<CreatedSession>().await? {
            CreatedSession::Bare(session) => Ok(session),
            CreatedSession::Wrapped { success: true, session } => Ok(session),
            CreatedSession::Wrapped { success: false, .. } => Err(ApiError::ActionFailed {
                action: "create",
                status: 200,
                message: "backend reported failure".to_string(),
            }),
        }
    }

    async fn close_session(&self, session_id: &str) -> Result<()> {
        let url = self.endpoint(&["sessions", session_id])?;
        Self::check("close", self.http.delete(url).send().await?).await?;
        Ok(())
    }

    async fn navigate(&self, session_id: &str, url: &str) -> Result<NavigateOutcome> {
        let endpoint = self.endpoint(&["sessions", session_id, "navigate"])?;
        let response = self
            .post_json("navigate", endpoint, &serde_json::json!({ "url": url }))
            .await?;

        // Older backends answer with an empty body
        let body = response.bytes().await?;
        if body.is_empty() {
            return Ok(NavigateOutcome::default());
        }
        serde_json::from_slice(&body).map_err(|e| ApiError::InvalidResponse(e.to_string()))
    }

    async fn screenshot(&self, session_id: &str, token: u64) -> Result<Bytes> {
        let url = self.endpoint(&["sessions", session_id, "screenshot"])?;
        let response = self
            .http
            .get(url)
            .query(&[("t", token)])
            .send()
            .await?;
        let response = Self::check("screenshot", response).await?;
        Ok(response.bytes().await?)
    }

    fn screenshot_url(&self, session_id: &str, token: u64) -> String {
        match self.endpoint(&["sessions", session_id, "screenshot"]) {
            Ok(mut url) => {
                url.query_pairs_mut().append_pair("t", &token.to_string());
                url.to_string()
            }
            Err(_) => String::new(),
        }
    }

    async fn click(&self, session_id: &str, click: &ClickRequest) -> Result<()> {
        let url = self.endpoint(&["sessions", session_id, "click"])?;
        self.post_json("click", url, click).await?;
        Ok(())
    }

    async fn type_text(&self, session_id: &str, input: &TypeRequest) -> Result<()> {
        let url = self.endpoint(&["sessions", session_id, "type"])?;
        self.post_json("type", url, input).await?;
        Ok(())
    }

    async fn keypress(&self, session_id: &str, key: &str) -> Result<()> {
        let url = self.endpoint(&["sessions", session_id, "keypress"])?;
        let response = self.http.post(url).query(&[("key", key)]).send().await?;
        Self::check("keypress", response).await?;
        Ok(())
    }

    async fn scroll(&self, session_id: &str, scroll: &ScrollRequest) -> Result<()> {
        let url = self.endpoint(&["sessions", session_id, "scroll"])?;
        self.post_json("scroll", url, scroll).await?;
        Ok(())
    }

    async fn status(&self) -> Result<BackendStatus> {
        let url = self.endpoint(&["browser", "status"])?;
        let response = Self::check("status", self.http.get(url).send().await?).await?;
        Ok(response.json().await?)
    }
}
