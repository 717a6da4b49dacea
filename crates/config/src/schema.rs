//! Config schema for the bridge server.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use apibridge_protocol::{DEFAULT_MESSAGES_PATH, DEFAULT_SSE_PATH, DELIVERY_TIMEOUT_MS};

/// Root configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Name reported in health responses and the MCP handshake.
    pub server_name: String,

    /// Bind address for the HTTP listener.
    pub bind: String,
    pub port: u16,

    /// Path serving the server-to-client event stream.
    pub sse_path: String,

    /// Path accepting client-to-server message posts.
    pub messages_path: String,

    /// OpenAPI document to bridge. May also be given on the command line,
    /// which takes precedence.
    pub spec_path: Option<PathBuf>,

    /// Upstream base URL override. `APIBRIDGE_BASE_URL` in the environment
    /// takes precedence over this value.
    pub base_url: Option<String>,

    /// Bound on a single inbound delivery before it is reported failed.
    pub delivery_timeout_ms: u64,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            server_name: "apibridge".into(),
            bind: "127.0.0.1".into(),
            port: 8080,
            sse_path: DEFAULT_SSE_PATH.into(),
            messages_path: DEFAULT_MESSAGES_PATH.into(),
            spec_path: None,
            base_url: None,
            delivery_timeout_ms: DELIVERY_TIMEOUT_MS,
        }
    }
}

impl BridgeConfig {
    /// Upstream base URL after applying the environment override.
    pub fn effective_base_url(&self) -> Option<String> {
        std::env::var("APIBRIDGE_BASE_URL")
            .ok()
            .filter(|v| !v.is_empty())
            .or_else(|| self.base_url.clone())
    }
}
