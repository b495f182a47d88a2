//! Player socket handle

use std::fmt;
use std::sync::Weak;

use reqwest::Upgraded;
use tokio_tungstenite::{tungstenite, WebSocketStream};
use tracing::{debug, info};

use super::client::{RelayClient, RelayInner};
use super::error::{RelayError, Result};
use super::handlers::RequestHandlers;

/// Upgraded player socket, carried on the relay HTTP client's connection.
pub type PlayerSocket = WebSocketStream<Upgraded>;

/// An established player connection.
///
/// Only produced by [`RelayClient::connect`]. The relay it came from is held
/// weakly, so a handle never keeps a client alive.
pub struct ConnectionHandle {
    socket: Option<PlayerSocket>,
    relay: Weak<RelayInner>,
}

impl ConnectionHandle {
    pub(crate) fn new(socket: PlayerSocket, relay: Weak<RelayInner>) -> Self {
        Self {
            socket: Some(socket),
            relay,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.socket.is_some()
    }

    /// The socket, for the loop that reads and writes frames.
    pub fn socket_mut(&mut self) -> Result<&mut PlayerSocket> {
        self.socket.as_mut().ok_or(RelayError::AlreadyDisconnected)
    }

    /// The client this connection belongs to, if it still exists.
    pub fn relay(&self) -> Option<RelayClient> {
        self.relay.upgrade().map(RelayClient::from_inner)
    }

    /// Request hooks configured on the owning client.
    pub fn handlers(&self) -> Option<RequestHandlers> {
        self.relay.upgrade().map(|inner| inner.handlers().clone())
    }

    /// Close the socket.
    ///
    /// The socket is released even when the close handshake fails; a second
    /// call returns [`RelayError::AlreadyDisconnected`].
    pub async fn disconnect(&mut self) -> Result<()> {
        let mut socket = self.socket.take().ok_or(RelayError::AlreadyDisconnected)?;

        match socket.close(None).await {
            Ok(()) => {}
            Err(tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed) => {
                debug!("Player socket was already closed by the relay");
            }
            Err(e) => return Err(e.into()),
        }

        info!("Disconnected from relay player socket");
        Ok(())
    }
}

impl fmt::Debug for ConnectionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionHandle")
            .field("connected", &self.is_connected())
            .field("relay_alive", &(self.relay.strong_count() > 0))
            .finish()
    }
}
