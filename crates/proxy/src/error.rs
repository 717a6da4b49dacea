//! Proxy error types. `ValidationError` is the one fatal startup class:
//! it carries every problem found in the OpenAPI document, not just the
//! first, so the operator can fix them in one pass.

use thiserror::Error;

/// An OpenAPI document that failed validation.
#[derive(Debug, Error)]
#[error("invalid OpenAPI document ({} problem{})", problems.len(), if problems.len() == 1 { "" } else { "s" })]
pub struct ValidationError {
    pub problems: Vec<String>,
}

#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("failed to read OpenAPI document {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse OpenAPI document {path}: {message}")]
    Parse { path: String, message: String },

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("no upstream base URL: the document has no servers entry and no override was given")]
    MissingBaseUrl,

    #[error("invalid upstream base URL {url}: {source}")]
    BadBaseUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },
}
