//! Configuration for the NeuroFunk host
//!
//! CLI arguments with environment variable fallbacks, using clap.

use std::path::PathBuf;

use clap::Parser;

use crate::relay::{RelayClientConfig, DEFAULT_USER_AGENT};

/// NeuroFunk - Beetroot host for the player relay
#[derive(Parser, Debug, Clone)]
#[command(name = "neurofunk")]
#[command(about = "Hosts a Beetroot player session on the relay")]
pub struct Args {
    /// User agent reported when registering the session
    #[arg(short = 'a', long, env = "NEUROFUNK_USER_AGENT", default_value = DEFAULT_USER_AGENT)]
    pub user_agent: String,

    /// Name of the host shown to listeners
    #[arg(short = 'n', long, env = "NEUROFUNK_HOST_NAME")]
    pub host_name: String,

    /// Base URL of the relay
    #[arg(short = 'r', long, env = "NEUROFUNK_RELAY", default_value = "http://localhost:8080")]
    pub relay: String,

    /// Resume an existing session instead of registering a new one
    #[arg(long, env = "NEUROFUNK_SESSION_TOKEN", hide_env_values = true)]
    pub session_token: Option<String>,

    /// Track fixtures to serve
    #[arg(long, env = "NEUROFUNK_FIXTURES", default_value = "testdata.yml")]
    pub fixtures: PathBuf,

    /// Open the player socket and hold it until Ctrl-C
    #[arg(long)]
    pub connect: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

impl Args {
    pub fn validate(&self) -> Result<(), String> {
        if self.host_name.trim().is_empty() {
            return Err("host name must not be empty".to_string());
        }

        if !(self.relay.starts_with("http://") || self.relay.starts_with("https://")) {
            return Err(format!("relay URL must be http or https: {}", self.relay));
        }

        Ok(())
    }

    /// Relay client options; request handlers still need to be attached.
    pub fn relay_config(&self) -> RelayClientConfig {
        let mut config = RelayClientConfig::new(&self.relay)
            .with_host_name(&self.host_name)
            .with_user_agent(&self.user_agent);
        config.session_token = self.session_token.clone();
        config
    }
}
