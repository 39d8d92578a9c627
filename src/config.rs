use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::ServiceResult;

pub const DEFAULT_API_URL: &str = "http://127.0.0.1:5001";
pub const DEFAULT_GATEWAY_URL: &str = "http://127.0.0.1:8080";
pub const DEFAULT_SHARE_GATEWAY_URL: &str = "https://ipfs.io";

/// Where the node lives and where downloads land.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// Base URL of the node's RPC API (without `/api/v0`).
    pub api_url: String,
    /// Gateway used for downloads of single files.
    pub gateway_url: String,
    /// Public gateway used in share links.
    pub share_gateway_url: String,
    pub download_dir: PathBuf,
    pub request_timeout_secs: u64,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            gateway_url: DEFAULT_GATEWAY_URL.to_string(),
            share_gateway_url: DEFAULT_SHARE_GATEWAY_URL.to_string(),
            download_dir: PathBuf::from("."),
            request_timeout_secs: 30,
        }
    }
}

impl NodeConfig {
    /// Reads a JSON config file. Missing keys take their defaults.
    pub fn load_from_file(path: impl AsRef<Path>) -> ServiceResult<Self> {
        let data = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&data)?)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("node.json");
        std::fs::write(&file, r#"{"api_url":"http://10.0.0.2:5001","request_timeout_secs":5}"#).unwrap();

        let config = NodeConfig::load_from_file(&file).unwrap();
        assert_eq!(config.api_url, "http://10.0.0.2:5001");
        assert_eq!(config.gateway_url, DEFAULT_GATEWAY_URL);
        assert_eq!(config.request_timeout(), Duration::from_secs(5));
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = NodeConfig::load_from_file("/definitely/not/here.json").unwrap_err();
        assert!(matches!(err, crate::ServiceError::Io(_)));
    }
}
