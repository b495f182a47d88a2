//! Relay API facade
//!
//! Owns the single session a host holds on the relay and upgrades it into the
//! player socket.

use std::fmt;
use std::sync::Arc;

use reqwest::{header, Client, StatusCode, Url, Version};
use tokio::sync::Mutex;
use tokio_tungstenite::{
    tungstenite::{
        handshake::{client::generate_key, derive_accept_key},
        protocol::Role,
    },
    WebSocketStream,
};
use tracing::{debug, info, warn};

use super::connection::ConnectionHandle;
use super::error::{ProtocolError, RelayError, Result};
use super::handlers::{RequestHandler, RequestHandlers};
use super::session::{is_header_safe, redact, Session, SessionStore, DEFAULT_HOST_NAME};
use super::types::{CreateSessionRequest, CreateSessionResponse, RenameSessionRequest};

/// Identity presented on the player socket upgrade.
pub const PLAYER_USER_AGENT: &str = "Beetroot/1 NeuroFunk/0.1";

/// User agent reported when registering a session, unless configured.
pub const DEFAULT_USER_AGENT: &str = "NeuroFunk";

/// Header carrying the session token on the upgrade request.
pub const SESSION_TOKEN_HEADER: &str = "x-session-token";

const REGISTER_PATH: &str = "/player/register";
const SESSION_PATH: &str = "/player/session";
const CONNECT_PATH: &str = "/player/connect";

/// Options for creating a relay client.
#[derive(Clone)]
pub struct RelayClientConfig {
    /// Root for all relay requests, e.g. `http://localhost:8080`
    pub base_url: String,

    /// HTTP client to use; a default client is built when absent
    pub transport: Option<Client>,

    /// Existing session token. Validated during construction.
    pub session_token: Option<String>,

    /// Host display name.
    ///
    /// Always wins when set. Otherwise the name recorded on a supplied
    /// session is used, falling back to "Beetroot NeuroFunk".
    pub host_name: Option<String>,

    /// User agent reported when registering a session
    pub user_agent: String,

    /// Library request handler (required)
    pub on_library_request: Option<Arc<dyn RequestHandler>>,

    /// Track queue request handler (required)
    pub on_queue_request: Option<Arc<dyn RequestHandler>>,
}

impl RelayClientConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            transport: None,
            session_token: None,
            host_name: None,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            on_library_request: None,
            on_queue_request: None,
        }
    }

    pub fn with_transport(mut self, transport: Client) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn with_session_token(mut self, token: impl Into<String>) -> Self {
        self.session_token = Some(token.into());
        self
    }

    pub fn with_host_name(mut self, host_name: impl Into<String>) -> Self {
        self.host_name = Some(host_name.into());
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    pub fn on_library_request(mut self, handler: impl RequestHandler + 'static) -> Self {
        self.on_library_request = Some(Arc::new(handler));
        self
    }

    pub fn on_queue_request(mut self, handler: impl RequestHandler + 'static) -> Self {
        self.on_queue_request = Some(Arc::new(handler));
        self
    }
}

impl fmt::Debug for RelayClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RelayClientConfig")
            .field("base_url", &self.base_url)
            .field("session_token", &self.session_token.as_deref().map(redact))
            .field("host_name", &self.host_name)
            .field("user_agent", &self.user_agent)
            .field("on_library_request", &self.on_library_request.is_some())
            .field("on_queue_request", &self.on_queue_request.is_some())
            .finish_non_exhaustive()
    }
}

/// Shared state behind a [`RelayClient`].
///
/// Connection handles point back here through a `Weak`.
pub(crate) struct RelayInner {
    transport: Client,
    user_agent: String,
    register_url: Url,
    session_url: Url,
    connect_url: Url,
    store: Mutex<SessionStore>,
    handlers: RequestHandlers,
}

/// API facade for the relay.
///
/// Cloning is cheap; clones share the same session.
#[derive(Clone)]
pub struct RelayClient {
    inner: Arc<RelayInner>,
}

impl RelayClient {
    /// Create a relay client.
    ///
    /// Fails with [`RelayError::Config`] before any request is made when a
    /// handler is missing, the base URL is unusable or the supplied token
    /// cannot be sent as a header. A supplied session token
    /// is validated first and its failure is returned as is.
    pub async fn new(config: RelayClientConfig) -> Result<Self> {
        let library = config
            .on_library_request
            .ok_or_else(|| RelayError::Config("on_library_request handler is required".into()))?;
        let queue = config
            .on_queue_request
            .ok_or_else(|| RelayError::Config("on_queue_request handler is required".into()))?;

        let base_url = parse_base_url(&config.base_url)?;
        let register_url = endpoint(&base_url, REGISTER_PATH)?;
        let session_url = endpoint(&base_url, SESSION_PATH)?;
        let connect_url = endpoint(&base_url, CONNECT_PATH)?;

        if let Some(token) = &config.session_token {
            if !is_header_safe(token) {
                return Err(RelayError::Config(
                    "session token is not a valid header value".into(),
                ));
            }
        }

        let transport = config.transport.unwrap_or_default();
        let mut store = SessionStore::new(DEFAULT_HOST_NAME);

        if let Some(token) = config.session_token {
            let details = SessionStore::validate(&transport, &session_url, &token).await?;
            if let Some(name) = details.host_name {
                store.set_host_name(name);
            }
            store.activate(token, details.client_url);
        }

        if let Some(name) = config.host_name {
            store.set_host_name(name);
        }

        info!(
            relay = %base_url,
            host_name = %store.host_name(),
            has_session = store.is_active(),
            "Relay client ready"
        );

        Ok(Self {
            inner: Arc::new(RelayInner {
                transport,
                user_agent: config.user_agent,
                register_url,
                session_url,
                connect_url,
                store: Mutex::new(store),
                handlers: RequestHandlers::new(library, queue),
            }),
        })
    }

    pub(crate) fn from_inner(inner: Arc<RelayInner>) -> Self {
        Self { inner }
    }

    /// Register a new session with the relay and keep its token.
    ///
    /// An already active session is replaced locally and abandoned on the
    /// relay, which keeps it until it expires there. Call
    /// [`delete_session`](Self::delete_session) first to end it explicitly.
    pub async fn create_session(&self) -> Result<Session> {
        let mut store = self.inner.store.lock().await;
        self.inner.register(&mut store).await
    }

    /// Current session token, registering a session first if there is none.
    pub async fn get_active_session_token(&self) -> Result<String> {
        let mut store = self.inner.store.lock().await;
        if let Some(token) = store.active_token() {
            return Ok(token.to_string());
        }
        let session = self.inner.register(&mut store).await?;
        Ok(session.token)
    }

    /// Change the host's name on the session.
    ///
    /// Without an active session only the local name changes; it is sent
    /// when the next session is registered.
    pub async fn rename(&self, new_name: impl Into<String>) -> Result<()> {
        let new_name = new_name.into();
        let mut store = self.inner.store.lock().await;

        let Some(token) = store.active_token().map(str::to_string) else {
            info!(host_name = %new_name, "Host renamed locally, no active session");
            store.set_host_name(new_name);
            return Ok(());
        };

        debug!(url = %self.inner.session_url, "Renaming relay session");
        let response = self
            .inner
            .transport
            .patch(self.inner.session_url.clone())
            .bearer_auth(&token)
            .json(&RenameSessionRequest {
                host_name: &new_name,
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(RelayError::Server {
                status: status.as_u16(),
                message,
            });
        }

        info!(host_name = %new_name, "Relay session renamed");
        store.set_host_name(new_name);
        Ok(())
    }

    /// Delete the session on the relay.
    ///
    /// The local token is cleared only once the relay confirms the deletion
    /// or reports the session as already gone; on any other failure the
    /// token is kept and the error returned. The next operation needing a
    /// token registers a new session.
    pub async fn delete_session(&self) -> Result<()> {
        let mut store = self.inner.store.lock().await;

        let Some(token) = store.active_token().map(str::to_string) else {
            debug!("No active relay session to delete");
            return Ok(());
        };

        debug!(url = %self.inner.session_url, "Deleting relay session");
        let response = self
            .inner
            .transport
            .delete(self.inner.session_url.clone())
            .bearer_auth(&token)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            info!(token = %redact(&token), "Relay session deleted");
        } else if matches!(
            status,
            reqwest::StatusCode::NOT_FOUND | reqwest::StatusCode::UNAUTHORIZED
        ) {
            warn!(
                token = %redact(&token),
                status = status.as_u16(),
                "Relay session already gone, clearing local token"
            );
        } else {
            let message = response.text().await.unwrap_or_default();
            return Err(RelayError::Server {
                status: status.as_u16(),
                message,
            });
        }

        store.clear();
        Ok(())
    }

    /// Connect to the relay's player socket.
    ///
    /// The upgrade is attempted exactly once. A refused upgrade is read as a
    /// complete HTTP response, so its body may arrive in any framing.
    pub async fn connect(&self) -> Result<ConnectionHandle> {
        let token = self.get_active_session_token().await?;
        let key = generate_key();

        info!(url = %self.inner.connect_url, "Connecting to relay player socket");

        let response = self
            .inner
            .transport
            .get(self.inner.connect_url.clone())
            .version(Version::HTTP_11)
            .header(header::CONNECTION, "Upgrade")
            .header(header::UPGRADE, "websocket")
            .header(header::SEC_WEBSOCKET_VERSION, "13")
            .header(header::SEC_WEBSOCKET_KEY, &key)
            .header(header::USER_AGENT, PLAYER_USER_AGENT)
            .header(SESSION_TOKEN_HEADER, &token)
            .send()
            .await?;

        let status = response.status();
        if status != StatusCode::SWITCHING_PROTOCOLS {
            let body = response.bytes().await?;
            return Err(upgrade_rejection(status, &body));
        }

        let accept = response
            .headers()
            .get(header::SEC_WEBSOCKET_ACCEPT)
            .and_then(|v| v.to_str().ok());
        if accept != Some(derive_accept_key(key.as_bytes()).as_str()) {
            return Err(RelayError::Transport(
                "relay answered the upgrade with a mismatched Sec-WebSocket-Accept".into(),
            ));
        }

        let upgraded = response.upgrade().await?;
        let socket = WebSocketStream::from_raw_socket(upgraded, Role::Client, None).await;

        info!("Connected to relay player socket");
        Ok(ConnectionHandle::new(socket, Arc::downgrade(&self.inner)))
    }

    /// Snapshot of the active session, if any.
    pub async fn active_session(&self) -> Option<Session> {
        self.inner.store.lock().await.session()
    }

    pub async fn host_name(&self) -> String {
        self.inner.store.lock().await.host_name().to_string()
    }

    /// Hooks for the frame loop driving the player socket.
    pub fn handlers(&self) -> &RequestHandlers {
        &self.inner.handlers
    }
}

impl fmt::Debug for RelayClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RelayClient")
            .field("register_url", &self.inner.register_url.as_str())
            .field("connect_url", &self.inner.connect_url.as_str())
            .finish_non_exhaustive()
    }
}

impl RelayInner {
    pub(crate) fn handlers(&self) -> &RequestHandlers {
        &self.handlers
    }

    /// `POST /player/register`. Caller holds the store lock.
    async fn register(&self, store: &mut SessionStore) -> Result<Session> {
        debug!(url = %self.register_url, "Creating relay session");

        let response = self
            .transport
            .post(self.register_url.clone())
            .json(&CreateSessionRequest {
                user_agent: &self.user_agent,
                host_name: store.host_name(),
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(RelayError::Server {
                status: status.as_u16(),
                message,
            });
        }

        let created: CreateSessionResponse = response.json().await?;
        if !is_header_safe(&created.session_token) {
            return Err(RelayError::Decode(
                "relay issued a session token that is not a valid header value".into(),
            ));
        }

        if let Some(previous) = store.active_token() {
            warn!(
                token = %redact(previous),
                "Replacing active relay session, the old one is left to expire"
            );
        }
        store.activate(created.session_token.clone(), Some(created.client_url.clone()));

        info!(
            token = %redact(&created.session_token),
            client_url = %created.client_url,
            "Relay session created"
        );

        Ok(Session {
            token: created.session_token,
            host_name: store.host_name().to_string(),
            client_url: Some(created.client_url),
            valid: true,
        })
    }
}

/// Map a refused upgrade onto the error taxonomy.
fn upgrade_rejection(status: StatusCode, body: &[u8]) -> RelayError {
    if status != StatusCode::UNAUTHORIZED {
        return RelayError::UnexpectedStatus {
            status: status.as_u16(),
        };
    }

    match serde_json::from_slice::<ProtocolError>(body) {
        Ok(error) => {
            warn!(code = %error.code, id = %error.id, "Relay refused player socket");
            RelayError::Auth {
                status: status.as_u16(),
                error: Some(error),
            }
        }
        Err(e) => RelayError::Decode(format!("unauthorized upgrade body: {}", e)),
    }
}

fn parse_base_url(raw: &str) -> Result<Url> {
    let url = Url::parse(raw)
        .map_err(|e| RelayError::Config(format!("invalid relay URL '{}': {}", raw, e)))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(RelayError::Config(format!(
            "relay URL must be http or https, got '{}'",
            other
        ))),
    }
}

fn endpoint(base: &Url, path: &str) -> Result<Url> {
    let joined = format!("{}{}", base.as_str().trim_end_matches('/'), path);
    Url::parse(&joined)
        .map_err(|e| RelayError::Config(format!("invalid endpoint '{}': {}", joined, e)))
}
