//! Backend proxy: loads an OpenAPI document, exposes its operations as MCP
//! tools, and forwards tool calls to the upstream HTTP API.
//!
//! The gateway treats this crate as an opaque peer attached to each session;
//! nothing here knows about sessions or streams.

pub mod error;
pub mod proxy;
pub mod spec;

pub use {
    error::{ProxyError, ValidationError},
    proxy::McpProxy,
    spec::OpenApiSpec,
};
