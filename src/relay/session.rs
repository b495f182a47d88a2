//! Session token storage and validation

use reqwest::header::HeaderValue;
use reqwest::{Client, StatusCode, Url};
use tracing::{debug, info, warn};

use super::error::{ProtocolError, RelayError, Result};
use super::types::SessionDetails;

/// Host name used when neither the configuration nor the relay provides one.
pub const DEFAULT_HOST_NAME: &str = "Beetroot NeuroFunk";

/// Snapshot of the session a client currently holds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    /// Opaque bearer credential
    pub token: String,
    /// Display name listeners see for this host
    pub host_name: String,
    /// Listener URL handed out by the relay, when known
    pub client_url: Option<String>,
    /// Whether the relay has confirmed the token
    pub valid: bool,
}

/// Holds the current bearer token and host display name.
///
/// Not synchronized; the owning client serializes access.
#[derive(Debug)]
pub struct SessionStore {
    token: Option<String>,
    host_name: String,
    client_url: Option<String>,
}

impl SessionStore {
    pub fn new(host_name: impl Into<String>) -> Self {
        Self {
            token: None,
            host_name: host_name.into(),
            client_url: None,
        }
    }

    /// Look `token` up against the relay's session endpoint.
    ///
    /// Touches no store; callers decide whether to
    /// [`activate`](Self::activate) the token afterwards.
    pub async fn validate(
        transport: &Client,
        session_url: &Url,
        token: &str,
    ) -> Result<SessionDetails> {
        debug!(url = %session_url, "Validating session token");

        let response = transport
            .get(session_url.clone())
            .bearer_auth(token)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            let body = response.text().await?;
            let details = if body.trim().is_empty() {
                SessionDetails::default()
            } else {
                serde_json::from_str(&body)?
            };
            info!(token = %redact(token), "Session token validated");
            return Ok(details);
        }

        let body = response.text().await.unwrap_or_default();
        if is_rejection(status) {
            warn!(token = %redact(token), status = status.as_u16(), "Relay rejected session token");
            return Err(RelayError::Auth {
                status: status.as_u16(),
                error: serde_json::from_str::<ProtocolError>(&body).ok(),
            });
        }

        Err(RelayError::Server {
            status: status.as_u16(),
            message: body,
        })
    }

    pub fn active_token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub fn is_active(&self) -> bool {
        self.token.is_some()
    }

    pub fn host_name(&self) -> &str {
        &self.host_name
    }

    pub fn set_host_name(&mut self, host_name: impl Into<String>) {
        self.host_name = host_name.into();
    }

    pub fn client_url(&self) -> Option<&str> {
        self.client_url.as_deref()
    }

    /// Store a confirmed token, replacing any previous one.
    pub fn activate(&mut self, token: String, client_url: Option<String>) {
        self.token = Some(token);
        self.client_url = client_url;
    }

    /// Forget the current token.
    pub fn clear(&mut self) {
        self.token = None;
        self.client_url = None;
    }

    pub fn session(&self) -> Option<Session> {
        self.token.as_ref().map(|token| Session {
            token: token.clone(),
            host_name: self.host_name.clone(),
            client_url: self.client_url.clone(),
            valid: true,
        })
    }
}

/// Statuses with which the relay reports a token as unknown or expired.
fn is_rejection(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN | StatusCode::NOT_FOUND
    )
}

/// Whether `token` can travel in a request header.
pub(crate) fn is_header_safe(token: &str) -> bool {
    HeaderValue::from_str(token).is_ok()
}

/// Shortened token for log output.
pub(crate) fn redact(token: &str) -> String {
    let prefix: String = token.chars().take(4).collect();
    format!("{}...", prefix)
}
