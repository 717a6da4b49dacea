//! Service traits at the seam between the transport core and the backend
//! engine. The core never names a concrete backend; tests inject their own.

use std::sync::Arc;

use async_trait::async_trait;

use crate::channel::SseChannel;

/// Attaches a backend engine to a newly opened session.
#[async_trait]
pub trait BridgeFactory: Send + Sync {
    /// Called once per session when its stream opens. `channel` is where the
    /// engine writes server-to-client messages; the returned handle receives
    /// the session's inbound messages. An error here aborts the stream
    /// before the session is registered.
    async fn attach(
        &self,
        session_id: &str,
        channel: Arc<SseChannel>,
    ) -> anyhow::Result<Arc<dyn BridgeHandle>>;
}

/// Inbound half of an attached backend engine.
#[async_trait]
pub trait BridgeHandle: Send + Sync {
    /// Deliver one client-to-server payload.
    async fn deliver(&self, payload: &[u8]) -> anyhow::Result<()>;
}

/// Backend that accepts every session and drops every message. Used by
/// tests that only exercise transport behavior.
pub struct NoopBridge;

#[async_trait]
impl BridgeFactory for NoopBridge {
    async fn attach(
        &self,
        _session_id: &str,
        _channel: Arc<SseChannel>,
    ) -> anyhow::Result<Arc<dyn BridgeHandle>> {
        Ok(Arc::new(NoopHandle))
    }
}

pub struct NoopHandle;

#[async_trait]
impl BridgeHandle for NoopHandle {
    async fn deliver(&self, _payload: &[u8]) -> anyhow::Result<()> {
        Ok(())
    }
}
