//! Minimal OpenAPI 3.x document model: just enough structure to validate a
//! document and derive tool definitions from its operations.

use std::{collections::BTreeMap, path::Path};

use serde::Deserialize;

use crate::error::{ProxyError, ValidationError};

/// HTTP methods an operation can be keyed under.
pub const METHODS: &[&str] = &["get", "put", "post", "delete", "patch", "head", "options"];

#[derive(Debug, Clone, Deserialize)]
pub struct OpenApiSpec {
    #[serde(default)]
    pub openapi: Option<String>,
    #[serde(default)]
    pub info: Option<Info>,
    #[serde(default)]
    pub servers: Vec<Server>,
    /// Path template → path item. Items are kept raw because they mix
    /// method keys with path-level keys (`parameters`, `summary`).
    #[serde(default)]
    pub paths: BTreeMap<String, BTreeMap<String, serde_json::Value>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Info {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub version: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Server {
    pub url: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Operation {
    #[serde(default)]
    pub operation_id: Option<String>,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub parameters: Vec<Parameter>,
    #[serde(default)]
    pub request_body: Option<RequestBody>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Parameter {
    pub name: String,
    /// Location: "path", "query", or "header".
    #[serde(rename = "in")]
    pub location: String,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub schema: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RequestBody {
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub content: BTreeMap<String, MediaType>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MediaType {
    #[serde(default)]
    pub schema: Option<serde_json::Value>,
}

impl OpenApiSpec {
    /// Iterate the document's operations: `(path, method, parse result)`,
    /// covering only recognized HTTP method keys.
    pub fn operations(
        &self,
    ) -> impl Iterator<Item = (&str, &str, Result<Operation, serde_json::Error>)> {
        self.paths.iter().flat_map(|(path, item)| {
            item.iter()
                .filter(|(method, _)| METHODS.contains(&method.as_str()))
                .map(move |(method, raw)| {
                    (
                        path.as_str(),
                        method.as_str(),
                        serde_json::from_value(raw.clone()),
                    )
                })
        })
    }

    /// Load a document from disk. JSON or YAML, chosen by extension.
    pub fn load(path: &Path) -> Result<Self, ProxyError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ProxyError::Read {
            path: path.display().to_string(),
            source,
        })?;

        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("json");
        let parsed = match ext {
            "yaml" | "yml" => serde_yaml::from_str(&raw).map_err(|e| e.to_string()),
            _ => serde_json::from_str(&raw).map_err(|e| e.to_string()),
        };

        parsed.map_err(|message| ProxyError::Parse {
            path: path.display().to_string(),
            message,
        })
    }

    /// Validate the document, collecting every problem found.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut problems = Vec::new();

        match &self.openapi {
            None => problems.push("missing required field: openapi".into()),
            Some(v) if !v.starts_with("3.") => {
                problems.push(format!("unsupported OpenAPI version {v}, expected 3.x"));
            },
            Some(_) => {},
        }

        match &self.info {
            None => problems.push("missing required field: info".into()),
            Some(info) => {
                if info.title.is_empty() {
                    problems.push("info.title must not be empty".into());
                }
                if info.version.is_empty() {
                    problems.push("info.version must not be empty".into());
                }
            },
        }

        if self.paths.is_empty() {
            problems.push("document defines no paths".into());
        }

        let mut seen_ids = std::collections::HashSet::new();
        for (path, method, parsed) in self.operations() {
            let op = match parsed {
                Ok(op) => op,
                Err(e) => {
                    problems.push(format!("{method} {path}: malformed operation: {e}"));
                    continue;
                },
            };
            match &op.operation_id {
                None => problems.push(format!("{method} {path}: missing operationId")),
                Some(id) => {
                    if !seen_ids.insert(id.clone()) {
                        problems.push(format!("{method} {path}: duplicate operationId {id}"));
                    }
                },
            }
            for param in &op.parameters {
                if param.location == "path" && !param.required {
                    problems.push(format!(
                        "{method} {path}: path parameter {} must be required",
                        param.name
                    ));
                }
            }
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(ValidationError { problems })
        }
    }

    /// Title/version pair for the MCP handshake, if present.
    pub fn identity(&self) -> (String, String) {
        match &self.info {
            Some(info) => (info.title.clone(), info.version.clone()),
            None => ("unnamed".into(), "0.0.0".into()),
        }
    }
}
