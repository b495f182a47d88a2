//! Request and response bodies for the relay session API

use serde::{Deserialize, Serialize};

/// `POST /player/register` body
#[derive(Debug, Clone, Serialize)]
pub struct CreateSessionRequest<'a> {
    pub user_agent: &'a str,
    pub host_name: &'a str,
}

/// `POST /player/register` response
#[derive(Debug, Clone, Deserialize)]
pub struct CreateSessionResponse {
    /// URL listeners open to join this host
    #[serde(alias = "ClientURL")]
    pub client_url: String,
    #[serde(alias = "SessionToken")]
    pub session_token: String,
}

/// `GET /player/session` response
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SessionDetails {
    #[serde(default, alias = "HostName")]
    pub host_name: Option<String>,
    #[serde(default, alias = "ClientURL")]
    pub client_url: Option<String>,
}

/// `PATCH /player/session` body
#[derive(Debug, Clone, Serialize)]
pub struct RenameSessionRequest<'a> {
    pub host_name: &'a str,
}
