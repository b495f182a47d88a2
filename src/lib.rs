//! NeuroFunk - Beetroot host for the player relay
//!
//! Registers a host session with the relay, upgrades it into the player
//! socket and exposes the hooks the relay uses to ask for the host's library
//! and track queue.
//!
//! ```rust,no_run
//! use neurofunk::{RelayClient, RelayClientConfig};
//!
//! # async fn example() -> neurofunk::Result<()> {
//! let relay = RelayClient::new(
//!     RelayClientConfig::new("http://localhost:8080")
//!         .with_host_name("Kitchen")
//!         .on_library_request(|| println!("library requested"))
//!         .on_queue_request(|| println!("queue requested")),
//! )
//! .await?;
//!
//! let mut conn = relay.connect().await?;
//! conn.disconnect().await?;
//! relay.delete_session().await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod fixtures;
pub mod relay;

pub use config::Args;
pub use relay::{
    ConnectionHandle, ProtocolError, RelayClient, RelayClientConfig, RelayError, Result, Session,
};
