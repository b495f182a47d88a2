//! Relay session client
//!
//! A host holds one short-lived session on the relay:
//! 1. Register a session (or validate a supplied token)
//! 2. Upgrade the session into the player socket
//! 3. Tear the socket down, optionally deleting the session
//!
//! The frames carried over the socket are handled elsewhere; this module only
//! stores the library/queue request hooks for that layer.

pub mod client;
pub mod connection;
pub mod error;
pub mod handlers;
pub mod session;
pub mod types;

pub use client::{RelayClient, RelayClientConfig, DEFAULT_USER_AGENT, PLAYER_USER_AGENT};
pub use connection::{ConnectionHandle, PlayerSocket};
pub use error::{ProtocolError, RelayError, Result};
pub use handlers::{RequestHandler, RequestHandlers};
pub use session::{Session, SessionStore, DEFAULT_HOST_NAME};
