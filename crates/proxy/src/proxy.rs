//! The proxy engine: OpenAPI operations exposed as MCP tools, with tool
//! calls forwarded to the upstream API.

use std::collections::HashMap;

use {
    reqwest::Method,
    tracing::{debug, warn},
    url::Url,
};

use apibridge_protocol::{
    JsonRpcRequest, JsonRpcResponse, PROTOCOL_VERSION,
    jsonrpc::error_codes,
    mcp::{
        InitializeResult, ServerCapabilities, ServerInfo, ToolDef, ToolsCallParams,
        ToolsCallResult, ToolsListResult,
    },
};

use crate::{
    error::ProxyError,
    spec::{OpenApiSpec, Operation, Parameter},
};

/// An OpenAPI operation bound to a tool name.
struct BoundOperation {
    method: Method,
    /// Path template, e.g. `/pets/{petId}`.
    path: String,
    params: Vec<Parameter>,
    has_body: bool,
}

/// Proxy for one OpenAPI document. Shared across all sessions; holds no
/// per-session state.
pub struct McpProxy {
    server_info: ServerInfo,
    base_url: Url,
    tools: Vec<ToolDef>,
    ops: HashMap<String, BoundOperation>,
    http: reqwest::Client,
}

impl McpProxy {
    /// Load and validate the document at `spec_path`, then build the tool
    /// surface. `base_url` overrides the document's first servers entry.
    pub fn init(spec_path: &std::path::Path, base_url: Option<&str>) -> Result<Self, ProxyError> {
        let spec = OpenApiSpec::load(spec_path)?;
        spec.validate()?;
        Self::from_spec(&spec, base_url)
    }

    /// Build a proxy from an already-validated document.
    pub fn from_spec(spec: &OpenApiSpec, base_url: Option<&str>) -> Result<Self, ProxyError> {
        let raw_base = match base_url {
            Some(url) => url.to_string(),
            None => spec
                .servers
                .first()
                .map(|s| s.url.clone())
                .ok_or(ProxyError::MissingBaseUrl)?,
        };
        let base_url = Url::parse(&raw_base).map_err(|source| ProxyError::BadBaseUrl {
            url: raw_base,
            source,
        })?;

        let mut tools = Vec::new();
        let mut ops = HashMap::new();
        for (path, method, parsed) in spec.operations() {
            let Ok(op) = parsed else {
                continue;
            };
            let Some(name) = op.operation_id.clone() else {
                continue;
            };
            let Ok(method) = Method::from_bytes(method.to_uppercase().as_bytes()) else {
                continue;
            };
            tools.push(tool_def(&name, &op));
            ops.insert(name, BoundOperation {
                method,
                path: path.to_string(),
                params: op.parameters,
                has_body: op.request_body.is_some(),
            });
        }

        let (name, version) = spec.identity();
        debug!(server = %name, tools = tools.len(), base = %base_url, "proxy initialized");

        Ok(Self {
            server_info: ServerInfo { name, version },
            base_url,
            tools,
            ops,
            http: reqwest::Client::new(),
        })
    }

    pub fn server_info(&self) -> &ServerInfo {
        &self.server_info
    }

    pub fn tools(&self) -> &[ToolDef] {
        &self.tools
    }

    /// Serve one JSON-RPC request.
    pub async fn handle(&self, req: &JsonRpcRequest) -> JsonRpcResponse {
        let id = req.id.clone();
        match req.method.as_str() {
            "initialize" => {
                let result = InitializeResult {
                    protocol_version: PROTOCOL_VERSION.into(),
                    capabilities: ServerCapabilities {
                        tools: Some(serde_json::json!({})),
                    },
                    server_info: self.server_info.clone(),
                };
                match serde_json::to_value(result) {
                    Ok(v) => JsonRpcResponse::success(id, v),
                    Err(e) => {
                        JsonRpcResponse::failure(id, error_codes::INTERNAL_ERROR, e.to_string())
                    },
                }
            },
            "ping" => JsonRpcResponse::success(id, serde_json::json!({})),
            "tools/list" => {
                let result = ToolsListResult {
                    tools: self.tools.clone(),
                };
                match serde_json::to_value(result) {
                    Ok(v) => JsonRpcResponse::success(id, v),
                    Err(e) => {
                        JsonRpcResponse::failure(id, error_codes::INTERNAL_ERROR, e.to_string())
                    },
                }
            },
            "tools/call" => {
                let params: ToolsCallParams =
                    match serde_json::from_value(req.params.clone().unwrap_or_default()) {
                        Ok(p) => p,
                        Err(e) => {
                            return JsonRpcResponse::failure(
                                id,
                                error_codes::INVALID_PARAMS,
                                format!("invalid tools/call params: {e}"),
                            );
                        },
                    };
                let result = self.call_tool(&params).await;
                match serde_json::to_value(result) {
                    Ok(v) => JsonRpcResponse::success(id, v),
                    Err(e) => {
                        JsonRpcResponse::failure(id, error_codes::INTERNAL_ERROR, e.to_string())
                    },
                }
            },
            other => JsonRpcResponse::failure(
                id,
                error_codes::METHOD_NOT_FOUND,
                format!("unknown method: {other}"),
            ),
        }
    }

    /// Execute one tool call against the upstream.
    ///
    /// Upstream failures (non-2xx, network errors) are tool-level errors in
    /// the result, not protocol errors.
    async fn call_tool(&self, params: &ToolsCallParams) -> ToolsCallResult {
        let Some(op) = self.ops.get(&params.name) else {
            return ToolsCallResult::error(format!("unknown tool: {}", params.name));
        };

        let args = params.arguments.as_object().cloned().unwrap_or_default();

        // Fill path template.
        let mut path = op.path.clone();
        for param in &op.params {
            if param.location != "path" {
                continue;
            }
            let Some(value) = args.get(&param.name) else {
                return ToolsCallResult::error(format!(
                    "missing required path parameter: {}",
                    param.name
                ));
            };
            path = path.replace(&format!("{{{}}}", param.name), &plain_string(value));
        }

        let url = format!("{}{}", self.base_url.as_str().trim_end_matches('/'), path);
        let mut request = self.http.request(op.method.clone(), &url);

        for param in &op.params {
            match param.location.as_str() {
                "query" => {
                    if let Some(value) = args.get(&param.name) {
                        request = request.query(&[(&param.name, plain_string(value))]);
                    } else if param.required {
                        return ToolsCallResult::error(format!(
                            "missing required query parameter: {}",
                            param.name
                        ));
                    }
                },
                "header" => {
                    if let Some(value) = args.get(&param.name) {
                        request = request.header(&param.name, plain_string(value));
                    }
                },
                _ => {},
            }
        }

        if op.has_body {
            if let Some(body) = args.get("body") {
                request = request.json(body);
            }
        }

        debug!(tool = %params.name, url = %url, "proxying tool call");

        let response = match request.send().await {
            Ok(r) => r,
            Err(e) => {
                warn!(tool = %params.name, error = %e, "upstream request failed");
                return ToolsCallResult::error(format!("upstream request failed: {e}"));
            },
        };

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        if status.is_success() {
            ToolsCallResult::text(body)
        } else {
            ToolsCallResult::error(format!("upstream returned {status}: {body}"))
        }
    }
}

/// Render a JSON value as a bare parameter string (no quotes on strings).
fn plain_string(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Derive the tool definition for one operation.
fn tool_def(name: &str, op: &Operation) -> ToolDef {
    let mut properties = serde_json::Map::new();
    let mut required = Vec::new();

    for param in &op.parameters {
        let mut schema = param
            .schema
            .clone()
            .unwrap_or_else(|| serde_json::json!({"type": "string"}));
        if let (Some(desc), Some(obj)) = (&param.description, schema.as_object_mut()) {
            obj.entry("description")
                .or_insert_with(|| desc.clone().into());
        }
        properties.insert(param.name.clone(), schema);
        if param.required {
            required.push(serde_json::Value::from(param.name.clone()));
        }
    }

    if let Some(body) = &op.request_body {
        let schema = body
            .content
            .get("application/json")
            .and_then(|m| m.schema.clone())
            .unwrap_or_else(|| serde_json::json!({"type": "object"}));
        properties.insert("body".into(), schema);
        if body.required {
            required.push("body".into());
        }
    }

    let mut input_schema = serde_json::json!({
        "type": "object",
        "properties": properties,
    });
    if !required.is_empty() {
        input_schema["required"] = serde_json::Value::Array(required);
    }

    ToolDef {
        name: name.into(),
        description: op.summary.clone().or_else(|| op.description.clone()),
        input_schema,
    }
}
