//! End-to-end transport scenarios against a real bound listener: handshake,
//! routing, cross-session isolation, and the disconnect/post race.

use std::{net::SocketAddr, sync::Arc, time::Duration};

use {
    async_trait::async_trait,
    futures::{Stream, StreamExt},
    tokio::time::timeout,
};

use {
    apibridge_config::BridgeConfig,
    apibridge_gateway::{
        channel::{ServerEvent, SseChannel},
        server::build_gateway_app,
        services::{BridgeFactory, BridgeHandle},
        state::GatewayState,
    },
};

/// Bridge that echoes every inbound request back over the session's stream,
/// tagged with the session id so tests can assert isolation.
struct EchoBridge;

#[async_trait]
impl BridgeFactory for EchoBridge {
    async fn attach(
        &self,
        session_id: &str,
        channel: Arc<SseChannel>,
    ) -> anyhow::Result<Arc<dyn BridgeHandle>> {
        Ok(Arc::new(EchoHandle {
            session_id: session_id.to_string(),
            channel,
        }))
    }
}

struct EchoHandle {
    session_id: String,
    channel: Arc<SseChannel>,
}

#[async_trait]
impl BridgeHandle for EchoHandle {
    async fn deliver(&self, payload: &[u8]) -> anyhow::Result<()> {
        let value: serde_json::Value = serde_json::from_slice(payload)?;
        let reply = serde_json::json!({ "session": self.session_id, "echo": value });
        let _ = self.channel.send(ServerEvent::message(reply.to_string()));
        Ok(())
    }
}

async fn spawn_gateway(bridge: Arc<dyn BridgeFactory>) -> (SocketAddr, Arc<GatewayState>) {
    let state = GatewayState::new(&BridgeConfig::default(), bridge);
    let app = build_gateway_app(Arc::clone(&state));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (addr, state)
}

/// A connected SSE client: the byte stream plus a reassembly buffer.
struct SseClient {
    stream: std::pin::Pin<Box<dyn Stream<Item = Result<bytes::Bytes, reqwest::Error>> + Send>>,
    buf: String,
}

impl SseClient {
    async fn connect(addr: SocketAddr) -> Self {
        let resp = reqwest::get(format!("http://{addr}/sse")).await.unwrap();
        assert_eq!(resp.status(), 200);
        assert!(
            resp.headers()["content-type"]
                .to_str()
                .unwrap()
                .starts_with("text/event-stream")
        );
        assert_eq!(resp.headers()["cache-control"], "no-cache");
        Self {
            stream: Box::pin(resp.bytes_stream()),
            buf: String::new(),
        }
    }

    /// Next (event name, data) pair, skipping keep-alive comments.
    async fn next_event(&mut self) -> Option<(String, String)> {
        loop {
            if let Some(pos) = self.buf.find("\n\n") {
                let raw: String = self.buf.drain(..pos + 2).collect();
                let mut event = String::new();
                let mut data = String::new();
                for line in raw.lines() {
                    if let Some(v) = line.strip_prefix("event:") {
                        event = v.trim_start().to_string();
                    } else if let Some(v) = line.strip_prefix("data:") {
                        data.push_str(v.trim_start());
                    }
                }
                if event.is_empty() && data.is_empty() {
                    continue; // keep-alive comment block
                }
                return Some((event, data));
            }
            let chunk = self.stream.next().await?.ok()?;
            self.buf.push_str(std::str::from_utf8(&chunk).ok()?);
        }
    }

    /// Read the handshake event and extract the session id from its URL.
    async fn handshake(&mut self) -> String {
        let (event, data) = timeout(Duration::from_secs(5), self.next_event())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(event, "endpoint");
        let (path, id) = data.split_once("sessionId=").unwrap();
        assert!(path.starts_with("/api/messages"));
        id.to_string()
    }
}

async fn post_message(addr: SocketAddr, query: &str, body: &str) -> (u16, String) {
    let client = reqwest::Client::new();
    let resp = client
        .post(format!("http://{addr}/api/messages{query}"))
        .body(body.to_string())
        .send()
        .await
        .unwrap();
    let status = resp.status().as_u16();
    (status, resp.text().await.unwrap())
}

#[tokio::test]
async fn handshake_assigns_distinct_sessions() {
    let (addr, state) = spawn_gateway(Arc::new(EchoBridge)).await;

    let mut c1 = SseClient::connect(addr).await;
    let mut c2 = SseClient::connect(addr).await;
    let s1 = c1.handshake().await;
    let s2 = c2.handshake().await;

    assert_ne!(s1, s2);
    assert_eq!(state.session_count(), 2);
}

#[tokio::test]
async fn messages_route_to_their_own_stream() {
    let (addr, _state) = spawn_gateway(Arc::new(EchoBridge)).await;

    let mut c1 = SseClient::connect(addr).await;
    let mut c2 = SseClient::connect(addr).await;
    let s1 = c1.handshake().await;
    let s2 = c2.handshake().await;

    let (status, _) = post_message(addr, &format!("?sessionId={s1}"), r#"{"msg":"ping1"}"#).await;
    assert_eq!(status, 202);
    let (status, _) = post_message(addr, &format!("?sessionId={s2}"), r#"{"msg":"ping2"}"#).await;
    assert_eq!(status, 202);

    let (event, data) = timeout(Duration::from_secs(5), c1.next_event())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(event, "message");
    let reply: serde_json::Value = serde_json::from_str(&data).unwrap();
    assert_eq!(reply["session"], s1.as_str());
    assert_eq!(reply["echo"]["msg"], "ping1");

    let (_, data) = timeout(Duration::from_secs(5), c2.next_event())
        .await
        .unwrap()
        .unwrap();
    let reply: serde_json::Value = serde_json::from_str(&data).unwrap();
    assert_eq!(reply["session"], s2.as_str());
    assert_eq!(reply["echo"]["msg"], "ping2");
}

#[tokio::test]
async fn per_channel_order_is_preserved() {
    let (addr, _state) = spawn_gateway(Arc::new(EchoBridge)).await;

    let mut client = SseClient::connect(addr).await;
    let session = client.handshake().await;

    for i in 0..5 {
        let (status, _) = post_message(
            addr,
            &format!("?sessionId={session}"),
            &format!(r#"{{"seq":{i}}}"#),
        )
        .await;
        assert_eq!(status, 202);
    }

    for i in 0..5 {
        let (_, data) = timeout(Duration::from_secs(5), client.next_event())
            .await
            .unwrap()
            .unwrap();
        let reply: serde_json::Value = serde_json::from_str(&data).unwrap();
        assert_eq!(reply["echo"]["seq"], i);
    }
}

#[tokio::test]
async fn missing_session_id_is_400_without_registry_change() {
    let (addr, state) = spawn_gateway(Arc::new(EchoBridge)).await;
    let mut client = SseClient::connect(addr).await;
    client.handshake().await;

    let (status, body) = post_message(addr, "", r#"{"msg":"x"}"#).await;
    assert_eq!(status, 400);
    assert!(body.contains("sessionId"));
    assert_eq!(state.session_count(), 1);
}

#[tokio::test]
async fn unknown_session_id_is_404_without_registry_change() {
    let (addr, state) = spawn_gateway(Arc::new(EchoBridge)).await;
    let mut client = SseClient::connect(addr).await;
    client.handshake().await;

    let (status, body) = post_message(addr, "?sessionId=doesnotexist", r#"{"msg":"x"}"#).await;
    assert_eq!(status, 404);
    assert!(body.contains("doesnotexist"));
    assert_eq!(state.session_count(), 1);
}

#[tokio::test]
async fn post_after_disconnect_is_404() {
    let (addr, state) = spawn_gateway(Arc::new(EchoBridge)).await;

    let session = {
        let mut client = SseClient::connect(addr).await;
        client.handshake().await
        // Dropping the client here closes the connection.
    };

    // Wait for the server to observe the disconnect and deregister.
    for _ in 0..100 {
        if state.session_count() == 0 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(state.session_count(), 0);

    let (status, _) = post_message(addr, &format!("?sessionId={session}"), r#"{"msg":"x"}"#).await;
    assert_eq!(status, 404);
}

#[tokio::test]
async fn failing_bridge_maps_to_500_and_session_survives() {
    struct FailingBridge;
    struct FailingHandle;

    #[async_trait]
    impl BridgeFactory for FailingBridge {
        async fn attach(
            &self,
            _session_id: &str,
            _channel: Arc<SseChannel>,
        ) -> anyhow::Result<Arc<dyn BridgeHandle>> {
            Ok(Arc::new(FailingHandle))
        }
    }

    #[async_trait]
    impl BridgeHandle for FailingHandle {
        async fn deliver(&self, _payload: &[u8]) -> anyhow::Result<()> {
            anyhow::bail!("backend fault")
        }
    }

    let (addr, state) = spawn_gateway(Arc::new(FailingBridge)).await;
    let mut client = SseClient::connect(addr).await;
    let session = client.handshake().await;

    let (status, body) = post_message(addr, &format!("?sessionId={session}"), "{}").await;
    assert_eq!(status, 500);
    assert!(body.contains("backend fault"));
    assert_eq!(state.session_count(), 1);
}

#[tokio::test]
async fn health_is_static_and_session_independent() {
    let (addr, _state) = spawn_gateway(Arc::new(EchoBridge)).await;

    for path in ["/health", "/"] {
        let resp = reqwest::get(format!("http://{addr}{path}")).await.unwrap();
        assert_eq!(resp.status(), 200);
        let body: serde_json::Value = resp.json().await.unwrap();
        assert_eq!(body["status"], "ok");
        assert_eq!(body["server"], "apibridge");
        assert!(body["version"].is_string());
    }
}
