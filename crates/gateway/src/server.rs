use std::{
    convert::Infallible,
    net::SocketAddr,
    pin::Pin,
    sync::Arc,
    task::{Context, Poll},
};

use {
    axum::{
        Router,
        body::Bytes,
        extract::{Query, State},
        http::{StatusCode, header},
        response::{
            IntoResponse, Json,
            sse::{Event, KeepAlive, Sse},
        },
        routing::{get, post},
    },
    futures::Stream,
    tokio_stream::wrappers::UnboundedReceiverStream,
    tower_http::cors::{Any, CorsLayer},
    tracing::{debug, error, info, warn},
};

use {
    apibridge_config::BridgeConfig,
    apibridge_protocol::SESSION_ID_PARAM,
    apibridge_proxy::McpProxy,
};

use crate::{
    channel::{ServerEvent, SseChannel},
    proxy_service::ProxyBridge,
    registry::Session,
    router::{RouteError, route},
    state::GatewayState,
};

// ── Shared app state ─────────────────────────────────────────────────────────

#[derive(Clone)]
struct AppState {
    gateway: Arc<GatewayState>,
}

// ── Server startup ───────────────────────────────────────────────────────────

/// Build the gateway router (shared between production startup and tests).
pub fn build_gateway_app(state: Arc<GatewayState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let sse_path = state.sse_path.clone();
    let messages_path = state.messages_path.clone();

    Router::new()
        .route("/health", get(health_handler))
        .route("/", get(health_handler))
        .route(&sse_path, get(sse_handler))
        .route(&messages_path, post(messages_handler))
        .layer(cors)
        .with_state(AppState { gateway: state })
}

/// Initialize the backend proxy and run the gateway HTTP server.
///
/// An invalid OpenAPI document fails here, before the listener binds; the
/// error carries the full list of validation problems.
pub async fn start_gateway(config: BridgeConfig, spec_path: &std::path::Path) -> anyhow::Result<()> {
    let base_url = config.effective_base_url();
    let proxy = Arc::new(McpProxy::init(spec_path, base_url.as_deref())?);
    let upstream = proxy.server_info().name.clone();
    let tool_count = proxy.tools().len();

    let state = GatewayState::new(&config, Arc::new(ProxyBridge::new(proxy)));
    let app = build_gateway_app(Arc::clone(&state));

    let addr: SocketAddr = format!("{}:{}", config.bind, config.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;

    // Startup banner.
    let lines = [
        format!("{} v{}", state.server_name, state.version),
        format!("bridging {upstream} ({tool_count} tools)"),
        format!("sse:      http://{addr}{}", state.sse_path),
        format!(
            "messages: http://{addr}{}?{}=<id>",
            state.messages_path, SESSION_ID_PARAM
        ),
    ];
    let width = lines.iter().map(|l| l.len()).max().unwrap_or(0) + 4;
    info!("┌{}┐", "─".repeat(width));
    for line in &lines {
        info!("│  {:<w$}│", line, w = width - 2);
    }
    info!("└{}┘", "─".repeat(width));

    axum::serve(listener, app).await?;
    Ok(())
}

// ── Handlers ─────────────────────────────────────────────────────────────────

async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "server": state.gateway.server_name,
        "version": state.gateway.version,
    }))
}

/// Open a stream: allocate a session, attach the bridge, register, and hand
/// the client its message-post endpoint as the first event.
///
/// Everything fallible happens before registration, so a failed open leaves
/// no registry entry behind.
async fn sse_handler(
    State(state): State<AppState>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let gateway = state.gateway;

    let (channel, rx) = SseChannel::new();
    let session_id = gateway.registry.allocate();

    let bridge = gateway
        .bridge
        .attach(&session_id, Arc::clone(&channel))
        .await
        .map_err(|e| {
            error!(session = %session_id, error = %e, "bridge attach failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "failed to attach backend".to_string(),
            )
        })?;

    let session = Session::new(session_id.clone(), Arc::clone(&channel), bridge);
    if let Err(e) = gateway.registry.insert(session) {
        channel.close();
        error!(session = %session_id, error = %e, "session registration failed");
        return Err((StatusCode::INTERNAL_SERVER_ERROR, e.to_string()));
    }

    info!(session = %session_id, "stream established");

    // Handshake: the client learns its session id from this event's URL.
    let endpoint = format!(
        "{}?{}={}",
        gateway.messages_path, SESSION_ID_PARAM, session_id
    );
    if channel.send(ServerEvent::endpoint(endpoint)).is_err() {
        gateway.close_session(&session_id);
        return Err((
            StatusCode::INTERNAL_SERVER_ERROR,
            "stream closed during handshake".to_string(),
        ));
    }

    let stream = SessionStream {
        rx: UnboundedReceiverStream::new(rx),
        _guard: SessionGuard {
            gateway: Arc::clone(&gateway),
            session_id,
        },
    };

    Ok((
        [
            (header::CACHE_CONTROL, "no-cache"),
            (header::CONNECTION, "keep-alive"),
        ],
        Sse::new(stream).keep_alive(KeepAlive::default()),
    ))
}

/// Route one posted message to the session named in the query string.
async fn messages_handler(
    State(state): State<AppState>,
    Query(params): Query<std::collections::HashMap<String, String>>,
    body: Bytes,
) -> impl IntoResponse {
    let session_id = params.get(SESSION_ID_PARAM).map(String::as_str);

    match route(
        &state.gateway.registry,
        session_id,
        &body,
        state.gateway.delivery_timeout,
    )
    .await
    {
        Ok(()) => (StatusCode::ACCEPTED, "Accepted".to_string()),
        Err(e) => {
            match &e {
                // Expected race between disconnect and an in-flight post.
                RouteError::UnknownSession(id) => {
                    debug!(session = %id, "post for unknown session")
                },
                RouteError::MissingSession => debug!("post without session id"),
                RouteError::DeliveryFailed { id, reason } => {
                    warn!(session = %id, reason = %reason, "delivery failed")
                },
            }
            (e.status(), e.to_string())
        },
    }
}

// ── Stream lifecycle ─────────────────────────────────────────────────────────

/// Tears the session down when the response stream is dropped, which is how
/// a client disconnect surfaces.
struct SessionGuard {
    gateway: Arc<GatewayState>,
    session_id: String,
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        if self.gateway.close_session(&self.session_id) {
            debug!(session = %self.session_id, "stream disconnected");
        }
    }
}

/// The SSE body: drains the session's channel, holding the guard for its
/// lifetime.
struct SessionStream {
    rx: UnboundedReceiverStream<ServerEvent>,
    _guard: SessionGuard,
}

impl Stream for SessionStream {
    type Item = Result<Event, Infallible>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        match Pin::new(&mut this.rx).poll_next(cx) {
            Poll::Ready(Some(ev)) => {
                let mut out = Event::default().data(ev.data);
                if let Some(name) = ev.event {
                    out = out.event(name);
                }
                Poll::Ready(Some(Ok(out)))
            },
            Poll::Ready(None) => Poll::Ready(None),
            Poll::Pending => Poll::Pending,
        }
    }
}
