use std::{sync::Arc, time::Duration};

use tracing::info;

use apibridge_config::BridgeConfig;

use crate::{registry::SessionRegistry, services::BridgeFactory};

// ── Gateway state ────────────────────────────────────────────────────────────

/// Shared gateway runtime state, wrapped in Arc for use across async tasks.
pub struct GatewayState {
    /// All live sessions, keyed by session id.
    pub registry: SessionRegistry,
    /// Backend attached to each new session.
    pub bridge: Arc<dyn BridgeFactory>,
    /// Name reported in health responses.
    pub server_name: String,
    /// Server version string.
    pub version: String,
    /// Path accepting message posts, echoed in the handshake event.
    pub messages_path: String,
    /// Path serving the event stream.
    pub sse_path: String,
    /// Bound on a single inbound delivery.
    pub delivery_timeout: Duration,
}

impl GatewayState {
    pub fn new(config: &BridgeConfig, bridge: Arc<dyn BridgeFactory>) -> Arc<Self> {
        Arc::new(Self {
            registry: SessionRegistry::new(),
            bridge,
            server_name: config.server_name.clone(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            messages_path: config.messages_path.clone(),
            sse_path: config.sse_path.clone(),
            delivery_timeout: Duration::from_millis(config.delivery_timeout_ms),
        })
    }

    /// Tear down a session: deregister and release its channel.
    ///
    /// Every teardown trigger (client disconnect, write failure, shutdown)
    /// converges here; the atomic removal guarantees the release runs at
    /// most once. Returns whether this call performed the teardown.
    pub fn close_session(&self, id: &str) -> bool {
        match self.registry.remove(id) {
            Some(session) => {
                session.channel.close();
                info!(session = %id, "session closed");
                true
            },
            None => false,
        }
    }

    /// Number of live sessions.
    pub fn session_count(&self) -> usize {
        self.registry.len()
    }
}
