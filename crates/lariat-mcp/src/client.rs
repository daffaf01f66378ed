//! JSON-RPC client for MCP servers
//!
//! Speaks MCP over two transports: a child process with newline-delimited
//! JSON-RPC on stdin/stdout, and streamable HTTP where each request is a
//! POST and the response arrives as JSON or a single SSE event.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, Command};
use tokio::sync::{oneshot, Mutex as AsyncMutex};

use crate::config::ServerConfig;
use crate::error::{Error, Result};

const PROTOCOL_VERSION: &str = "2024-11-05";
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// A tool advertised by an MCP server
#[derive(Debug, Clone, Deserialize)]
pub struct ToolDescriptor {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "inputSchema", default = "empty_object_schema")]
    pub input_schema: Value,
}

fn empty_object_schema() -> Value {
    json!({"type": "object", "properties": {}})
}

/// JSON-RPC error body
#[derive(Debug, Clone, Deserialize)]
struct RpcErrorBody {
    code: i64,
    message: String,
}

type PendingMap = Arc<Mutex<HashMap<u64, oneshot::Sender<std::result::Result<Value, RpcErrorBody>>>>>;

/// Client connection to a single MCP server
pub struct McpClient {
    server_name: String,
    wire: Wire,
    request_timeout: Duration,
}

enum Wire {
    Stdio(StdioWire),
    Http(HttpWire),
}

impl McpClient {
    /// Connect to a server and run the initialize handshake
    pub async fn connect(name: &str, config: &ServerConfig) -> Result<Self> {
        let wire = match config {
            ServerConfig::Stdio { command, args, env } => {
                Wire::Stdio(StdioWire::spawn(name, command, args, env)?)
            }
            ServerConfig::StreamableHttp { url, headers } => {
                Wire::Http(HttpWire::new(url, headers))
            }
            ServerConfig::Sse { .. } => {
                return Err(Error::UnsupportedTransport("sse".to_string()));
            }
        };

        let client = Self {
            server_name: name.to_string(),
            wire,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        };
        client.initialize().await?;
        Ok(client)
    }

    /// Server name from the manifest
    pub fn server_name(&self) -> &str {
        &self.server_name
    }

    async fn initialize(&self) -> Result<()> {
        let result = self
            .request(
                "initialize",
                json!({
                    "protocolVersion": PROTOCOL_VERSION,
                    "capabilities": {},
                    "clientInfo": {
                        "name": "lariat",
                        "version": env!("CARGO_PKG_VERSION"),
                    },
                }),
            )
            .await?;

        if let Some(version) = result.get("protocolVersion").and_then(Value::as_str) {
            tracing::debug!(server = %self.server_name, %version, "mcp server initialized");
        }
        self.notify("notifications/initialized", json!({})).await
    }

    /// List the tools the server advertises
    pub async fn list_tools(&self) -> Result<Vec<ToolDescriptor>> {
        let result = self.request("tools/list", json!({})).await?;
        let tools = result
            .get("tools")
            .cloned()
            .ok_or_else(|| Error::Protocol("tools/list response missing 'tools'".to_string()))?;
        Ok(serde_json::from_value(tools)
            .map_err(|e| Error::Protocol(format!("invalid tool listing: {}", e)))?)
    }

    /// Invoke a tool. Returns the text content and whether the server
    /// flagged the result as an error.
    pub async fn call_tool(&self, name: &str, arguments: Value) -> Result<(String, bool)> {
        let result = self
            .request("tools/call", json!({"name": name, "arguments": arguments}))
            .await?;
        Ok(extract_call_result(&result))
    }

    async fn request(&self, method: &str, params: Value) -> Result<Value> {
        match &self.wire {
            Wire::Stdio(wire) => wire.request(method, params, self.request_timeout).await,
            Wire::Http(wire) => wire.request(method, params).await,
        }
    }

    async fn notify(&self, method: &str, params: Value) -> Result<()> {
        match &self.wire {
            Wire::Stdio(wire) => wire.notify(method, params).await,
            Wire::Http(wire) => wire.notify(method, params).await,
        }
    }
}

/// Child process transport. The reader task owns stdout and routes
/// responses to pending requests by id; the child is killed on drop.
struct StdioWire {
    _child: Child,
    stdin: AsyncMutex<ChildStdin>,
    pending: PendingMap,
    next_id: AtomicU64,
}

impl StdioWire {
    fn spawn(
        server_name: &str,
        command: &str,
        args: &[String],
        env: &BTreeMap<String, String>,
    ) -> Result<Self> {
        let mut child = Command::new(command)
            .args(args)
            .envs(env)
            .stdin(std::process::Stdio::piped())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| Error::Protocol("child stdin not captured".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| Error::Protocol("child stdout not captured".to_string()))?;

        let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));

        // Forward stderr to logs so server diagnostics are not lost
        if let Some(stderr) = child.stderr.take() {
            let name = server_name.to_string();
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    tracing::debug!(server = %name, "{}", line);
                }
            });
        }

        let reader_pending = pending.clone();
        let name = server_name.to_string();
        tokio::spawn(async move {
            let mut lines = BufReader::new(stdout).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                if line.trim().is_empty() {
                    continue;
                }
                match parse_rpc_line(&line) {
                    Some((id, outcome)) => {
                        if let Some(tx) = reader_pending.lock().remove(&id) {
                            let _ = tx.send(outcome);
                        }
                    }
                    None => {
                        tracing::trace!(server = %name, "ignoring non-response message");
                    }
                }
            }
            // EOF: dropping senders fails all in-flight requests
            reader_pending.lock().clear();
        });

        Ok(Self {
            _child: child,
            stdin: AsyncMutex::new(stdin),
            pending,
            next_id: AtomicU64::new(1),
        })
    }

    async fn request(&self, method: &str, params: Value, timeout: Duration) -> Result<Value> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        self.pending.lock().insert(id, tx);

        let payload = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });
        if let Err(e) = self.write_line(&payload).await {
            self.pending.lock().remove(&id);
            return Err(e);
        }

        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(Ok(result))) => Ok(result),
            Ok(Ok(Err(e))) => Err(Error::Rpc {
                code: e.code,
                message: e.message,
            }),
            Ok(Err(_)) => Err(Error::Closed),
            Err(_) => {
                self.pending.lock().remove(&id);
                Err(Error::Timeout(timeout))
            }
        }
    }

    async fn notify(&self, method: &str, params: Value) -> Result<()> {
        let payload = json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params,
        });
        self.write_line(&payload).await
    }

    async fn write_line(&self, payload: &Value) -> Result<()> {
        let mut line = serde_json::to_string(payload)
            .map_err(|e| Error::Protocol(format!("failed to encode request: {}", e)))?;
        line.push('\n');
        let mut stdin = self.stdin.lock().await;
        stdin.write_all(line.as_bytes()).await?;
        stdin.flush().await?;
        Ok(())
    }
}

/// Streamable HTTP transport. Each call is a POST; the server may answer
/// with plain JSON or a short SSE stream carrying one response event.
struct HttpWire {
    client: reqwest::Client,
    url: String,
    headers: BTreeMap<String, String>,
    session: Mutex<Option<String>>,
    next_id: AtomicU64,
}

impl HttpWire {
    fn new(url: &str, headers: &BTreeMap<String, String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.to_string(),
            headers: headers.clone(),
            session: Mutex::new(None),
            next_id: AtomicU64::new(1),
        }
    }

    async fn request(&self, method: &str, params: Value) -> Result<Value> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let payload = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });

        let response = self.post(&payload).await?;
        if let Some(session) = response
            .headers()
            .get("mcp-session-id")
            .and_then(|v| v.to_str().ok())
        {
            *self.session.lock() = Some(session.to_string());
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();
        let body = response.text().await?;

        let message = if content_type.starts_with("text/event-stream") {
            extract_sse_response(&body, id)
                .ok_or_else(|| Error::Protocol("no response event in SSE body".to_string()))?
        } else {
            body
        };

        match parse_rpc_line(&message) {
            Some((_, Ok(result))) => Ok(result),
            Some((_, Err(e))) => Err(Error::Rpc {
                code: e.code,
                message: e.message,
            }),
            None => Err(Error::Protocol("response is not valid JSON-RPC".to_string())),
        }
    }

    async fn notify(&self, method: &str, params: Value) -> Result<()> {
        let payload = json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params,
        });
        self.post(&payload).await?;
        Ok(())
    }

    async fn post(&self, payload: &Value) -> Result<reqwest::Response> {
        let mut request = self
            .client
            .post(&self.url)
            .header(reqwest::header::ACCEPT, "application/json, text/event-stream")
            .json(payload);
        for (key, value) in &self.headers {
            request = request.header(key.as_str(), value.as_str());
        }
        if let Some(session) = self.session.lock().clone() {
            request = request.header("mcp-session-id", session);
        }
        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(Error::Protocol(format!(
                "server returned HTTP {}",
                response.status()
            )));
        }
        Ok(response)
    }
}

/// Parse one JSON-RPC message. Returns the request id and the result or
/// error it carries; `None` for notifications and unparseable lines.
fn parse_rpc_line(line: &str) -> Option<(u64, std::result::Result<Value, RpcErrorBody>)> {
    let value: Value = serde_json::from_str(line).ok()?;
    let id = value.get("id")?.as_u64()?;
    if let Some(error) = value.get("error") {
        let body: RpcErrorBody = serde_json::from_value(error.clone()).ok()?;
        return Some((id, Err(body)));
    }
    let result = value.get("result")?.clone();
    Some((id, Ok(result)))
}

/// Pull the JSON-RPC response with the given id out of an SSE body
fn extract_sse_response(body: &str, id: u64) -> Option<String> {
    for line in body.lines() {
        let Some(data) = line.strip_prefix("data:") else {
            continue;
        };
        let data = data.trim();
        if let Ok(value) = serde_json::from_str::<Value>(data) {
            if value.get("id").and_then(Value::as_u64) == Some(id) {
                return Some(data.to_string());
            }
        }
    }
    None
}

/// Render a tools/call result to text plus the server's error flag
fn extract_call_result(result: &Value) -> (String, bool) {
    let is_error = result
        .get("isError")
        .and_then(Value::as_bool)
        .unwrap_or(false);

    let text = match result.get("content").and_then(Value::as_array) {
        Some(blocks) => blocks
            .iter()
            .filter_map(|block| match block.get("type").and_then(Value::as_str) {
                Some("text") => block
                    .get("text")
                    .and_then(Value::as_str)
                    .map(str::to_string),
                // Non-text blocks are passed through as JSON
                _ => serde_json::to_string(block).ok(),
            })
            .collect::<Vec<_>>()
            .join("\n"),
        None => String::new(),
    };

    (text, is_error)
}
