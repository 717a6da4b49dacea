//! Inbound message router: validates the caller-supplied session id, looks
//! it up, and forwards the payload to that session's bridge.
//!
//! The router only ever reads the registry; registration and teardown
//! belong to the connection lifecycle in `server.rs` and `state.rs`.

use std::time::Duration;

use {axum::http::StatusCode, thiserror::Error};

use crate::registry::SessionRegistry;

#[derive(Debug, Error)]
pub enum RouteError {
    /// Caller omitted the required correlation id.
    #[error("missing sessionId query parameter")]
    MissingSession,

    /// Id refers to a session that never existed or already closed. An
    /// expected race between disconnect and an in-flight post.
    #[error("no active session found for sessionId {0}")]
    UnknownSession(String),

    /// The bridge raised an error or ran past the delivery bound. The
    /// session stays open.
    #[error("failed to deliver message to session {id}: {reason}")]
    DeliveryFailed { id: String, reason: String },
}

impl RouteError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::MissingSession => StatusCode::BAD_REQUEST,
            Self::UnknownSession(_) => StatusCode::NOT_FOUND,
            Self::DeliveryFailed { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Route one inbound payload to the session named by `session_id`.
///
/// Delivery runs under `timeout` so a slow bridge cannot stall the caller
/// indefinitely; unrelated sessions are never blocked either way.
pub async fn route(
    registry: &SessionRegistry,
    session_id: Option<&str>,
    payload: &[u8],
    timeout: Duration,
) -> Result<(), RouteError> {
    let id = session_id
        .filter(|s| !s.is_empty())
        .ok_or(RouteError::MissingSession)?;

    let session = registry
        .get(id)
        .ok_or_else(|| RouteError::UnknownSession(id.into()))?;

    match tokio::time::timeout(timeout, session.bridge.deliver(payload)).await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(RouteError::DeliveryFailed {
            id: id.into(),
            reason: e.to_string(),
        }),
        Err(_) => Err(RouteError::DeliveryFailed {
            id: id.into(),
            reason: format!("delivery timed out after {}ms", timeout.as_millis()),
        }),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    };

    use async_trait::async_trait;

    use super::*;
    use crate::{
        channel::SseChannel,
        registry::Session,
        services::BridgeHandle,
    };

    const TIMEOUT: Duration = Duration::from_millis(200);

    struct RecordingHandle {
        delivered: AtomicUsize,
    }

    #[async_trait]
    impl BridgeHandle for RecordingHandle {
        async fn deliver(&self, _payload: &[u8]) -> anyhow::Result<()> {
            self.delivered.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct FailingHandle;

    #[async_trait]
    impl BridgeHandle for FailingHandle {
        async fn deliver(&self, _payload: &[u8]) -> anyhow::Result<()> {
            anyhow::bail!("backend fault")
        }
    }

    struct StuckHandle;

    #[async_trait]
    impl BridgeHandle for StuckHandle {
        async fn deliver(&self, _payload: &[u8]) -> anyhow::Result<()> {
            std::future::pending::<()>().await;
            Ok(())
        }
    }

    fn register(registry: &SessionRegistry, bridge: Arc<dyn BridgeHandle>) -> String {
        let (channel, _rx) = SseChannel::new();
        let id = registry.allocate();
        registry
            .insert(Session::new(id.clone(), channel, bridge))
            .unwrap();
        id
    }

    #[tokio::test]
    async fn missing_id_is_distinct_from_unknown() {
        let registry = SessionRegistry::new();

        let missing = route(&registry, None, b"{}", TIMEOUT).await.unwrap_err();
        assert!(matches!(missing, RouteError::MissingSession));
        assert_eq!(missing.status(), StatusCode::BAD_REQUEST);

        let empty = route(&registry, Some(""), b"{}", TIMEOUT).await.unwrap_err();
        assert!(matches!(empty, RouteError::MissingSession));

        let unknown = route(&registry, Some("doesnotexist"), b"{}", TIMEOUT)
            .await
            .unwrap_err();
        assert!(matches!(unknown, RouteError::UnknownSession(_)));
        assert_eq!(unknown.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn forwards_to_the_matching_bridge() {
        let registry = SessionRegistry::new();
        let handle = Arc::new(RecordingHandle {
            delivered: AtomicUsize::new(0),
        });
        let id = register(&registry, Arc::clone(&handle) as Arc<dyn BridgeHandle>);

        route(&registry, Some(&id), b"ping", TIMEOUT).await.unwrap();
        assert_eq!(handle.delivered.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn bridge_fault_maps_to_delivery_failed() {
        let registry = SessionRegistry::new();
        let id = register(&registry, Arc::new(FailingHandle));

        let err = route(&registry, Some(&id), b"ping", TIMEOUT).await.unwrap_err();
        assert!(matches!(err, RouteError::DeliveryFailed { .. }));
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        // The session survives a failed delivery.
        assert!(registry.get(&id).is_some());
    }

    #[tokio::test]
    async fn stuck_bridge_hits_the_delivery_bound() {
        let registry = SessionRegistry::new();
        let id = register(&registry, Arc::new(StuckHandle));

        let err = route(&registry, Some(&id), b"ping", Duration::from_millis(20))
            .await
            .unwrap_err();
        match err {
            RouteError::DeliveryFailed { reason, .. } => {
                assert!(reason.contains("timed out"));
            },
            other => panic!("expected DeliveryFailed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn closed_session_id_becomes_unknown() {
        let registry = SessionRegistry::new();
        let handle = Arc::new(RecordingHandle {
            delivered: AtomicUsize::new(0),
        });
        let id = register(&registry, handle as Arc<dyn BridgeHandle>);

        route(&registry, Some(&id), b"one", TIMEOUT).await.unwrap();
        registry.remove(&id);

        let err = route(&registry, Some(&id), b"two", TIMEOUT).await.unwrap_err();
        assert!(matches!(err, RouteError::UnknownSession(_)));
    }
}
