//! Track fixtures served while the real library integration is pending
//!
//! Loaded from a YAML file (`testdata.yml` by default):
//!
//! ```yaml
//! tracks:
//!   - index: 0
//!     id: "4uLU6hMCjMI75M1A2tKUQC"
//!     title: "Never Gonna Give You Up"
//!     album: "Whenever You Need Somebody"
//!     artists: ["Rick Astley"]
//!     explicit: 0
//!     externalurl: "https://example.com/track/4uLU6hMCjMI75M1A2tKUQC"
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Track {
    pub index: u32,
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub album: String,
    #[serde(default)]
    pub artists: Vec<String>,
    #[serde(default)]
    pub explicit: u8,
    #[serde(default, rename = "externalurl")]
    pub external_url: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TestData {
    #[serde(default)]
    pub tracks: Vec<Track>,
}

#[derive(Debug, Error)]
pub enum FixtureError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid fixture YAML: {0}")]
    Parse(#[from] serde_yaml::Error),
}

/// Load fixtures from `path`.
pub fn load(path: impl AsRef<Path>) -> Result<TestData, FixtureError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|source| FixtureError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(serde_yaml::from_str(&content)?)
}
