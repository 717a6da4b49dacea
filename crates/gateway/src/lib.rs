//! Gateway: session-multiplexed SSE transport over HTTP.
//!
//! Lifecycle per client:
//! 1. `GET /sse` opens the server-to-client stream; a session is allocated,
//!    registered, and its backend bridge attached
//! 2. The first stream event tells the client where to POST messages and
//!    with which session id
//! 3. `POST /api/messages?sessionId=<id>` routes each message to the
//!    matching session's bridge; replies travel back over the stream
//! 4. Disconnect, write failure, and shutdown all converge on one
//!    deregistration path
//!
//! The backend engine (OpenAPI proxy) lives in `apibridge-proxy` and is
//! attached through the service traits in `services.rs`.

pub mod channel;
pub mod proxy_service;
pub mod registry;
pub mod router;
pub mod server;
pub mod services;
pub mod state;
