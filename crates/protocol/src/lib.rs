//! Wire-level protocol types shared across the workspace: JSON-RPC 2.0
//! framing, the MCP handshake/tool surface, and SSE event names.

pub mod jsonrpc;
pub mod mcp;

pub use jsonrpc::{InboundFrame, JsonRpcError, JsonRpcNotification, JsonRpcRequest, JsonRpcResponse};

/// MCP protocol revision spoken by the bridge.
pub const PROTOCOL_VERSION: &str = "2024-11-05";

/// SSE event name for the handshake event carrying the message-post URL.
pub const ENDPOINT_EVENT: &str = "endpoint";

/// SSE event name for ordinary protocol messages.
pub const MESSAGE_EVENT: &str = "message";

/// Default path for the server-to-client event stream.
pub const DEFAULT_SSE_PATH: &str = "/sse";

/// Default path for client-to-server message posts.
pub const DEFAULT_MESSAGES_PATH: &str = "/api/messages";

/// Query parameter carrying the session correlation id.
pub const SESSION_ID_PARAM: &str = "sessionId";

/// Default bound on a single inbound delivery before it is reported failed.
pub const DELIVERY_TIMEOUT_MS: u64 = 30_000;
