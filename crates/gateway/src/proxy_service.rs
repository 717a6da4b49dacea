//! Live bridge backed by the OpenAPI proxy: each session gets a handle that
//! parses inbound JSON-RPC frames, runs them through the proxy, and writes
//! replies back onto the session's stream.

use std::sync::Arc;

use {
    anyhow::Context,
    async_trait::async_trait,
    tracing::{debug, warn},
};

use {apibridge_protocol::InboundFrame, apibridge_proxy::McpProxy};

use crate::{
    channel::{ServerEvent, SseChannel},
    services::{BridgeFactory, BridgeHandle},
};

/// Factory handing each session a handle onto the shared proxy.
pub struct ProxyBridge {
    proxy: Arc<McpProxy>,
}

impl ProxyBridge {
    pub fn new(proxy: Arc<McpProxy>) -> Self {
        Self { proxy }
    }
}

#[async_trait]
impl BridgeFactory for ProxyBridge {
    async fn attach(
        &self,
        session_id: &str,
        channel: Arc<SseChannel>,
    ) -> anyhow::Result<Arc<dyn BridgeHandle>> {
        debug!(session = %session_id, "bridge attached");
        Ok(Arc::new(ProxySession {
            proxy: Arc::clone(&self.proxy),
            channel,
            session_id: session_id.to_string(),
        }))
    }
}

/// One session's view of the proxy.
struct ProxySession {
    proxy: Arc<McpProxy>,
    channel: Arc<SseChannel>,
    session_id: String,
}

#[async_trait]
impl BridgeHandle for ProxySession {
    async fn deliver(&self, payload: &[u8]) -> anyhow::Result<()> {
        let frame = InboundFrame::parse(payload).context("malformed JSON-RPC payload")?;

        match frame {
            InboundFrame::Request(req) => {
                let response = self.proxy.handle(&req).await;
                let data =
                    serde_json::to_string(&response).context("serialize JSON-RPC response")?;
                // A closed channel here is the disconnect race, not a
                // delivery failure: the message was handled, the reply just
                // has nowhere to go.
                if self.channel.send(ServerEvent::message(data)).is_err() {
                    warn!(
                        session = %self.session_id,
                        method = %req.method,
                        "response dropped: channel closed"
                    );
                }
                Ok(())
            },
            InboundFrame::Notification(note) => {
                debug!(session = %self.session_id, method = %note.method, "notification");
                Ok(())
            },
        }
    }
}
