//! Local agent RPC tool
//!
//! Talks to a desktop automation agent over a local socket with a
//! newline-delimited JSON protocol: one hello handshake, then exactly one
//! request and one reply per connection. Addresses take the forms
//! `unix:<path>`, `tcp:<host>:<port>`, or a bare path (treated as unix).

use serde_json::{json, Value};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
#[cfg(unix)]
use tokio::net::UnixStream;

use crate::error::ToolError;
use crate::exec::ExecContext;
use crate::params::{duration_param, int_param, required_str};
use crate::result::ToolResult;
use crate::tools::{BoxFuture, Tool};

const DEFAULT_DEADLINE: Duration = Duration::from_secs(10);

/// Parsed socket address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum AgentAddr {
    Tcp(String),
    Unix(String),
}

pub(crate) fn parse_addr(raw: &str) -> Result<AgentAddr, ToolError> {
    if let Some(rest) = raw.strip_prefix("unix:") {
        if rest.is_empty() {
            return Err(ToolError::InvalidParams("empty unix socket path".into()));
        }
        return Ok(AgentAddr::Unix(rest.to_string()));
    }
    if let Some(rest) = raw.strip_prefix("tcp:") {
        if !rest.contains(':') {
            return Err(ToolError::InvalidParams(format!(
                "tcp address needs host:port, got {}",
                rest
            )));
        }
        return Ok(AgentAddr::Tcp(rest.to_string()));
    }
    if raw.trim().is_empty() {
        return Err(ToolError::InvalidParams("socket is required".into()));
    }
    Ok(AgentAddr::Unix(raw.to_string()))
}

enum AgentStream {
    Tcp(TcpStream),
    #[cfg(unix)]
    Unix(UnixStream),
}

impl AgentStream {
    async fn connect(addr: &AgentAddr) -> Result<Self, ToolError> {
        match addr {
            AgentAddr::Tcp(hostport) => Ok(AgentStream::Tcp(
                TcpStream::connect(hostport)
                    .await
                    .map_err(|e| ToolError::ExecutionFailed(format!("connect {}: {}", hostport, e)))?,
            )),
            AgentAddr::Unix(path) => {
                #[cfg(unix)]
                {
                    Ok(AgentStream::Unix(UnixStream::connect(path).await.map_err(
                        |e| ToolError::ExecutionFailed(format!("connect {}: {}", path, e)),
                    )?))
                }
                #[cfg(not(unix))]
                {
                    let _ = path;
                    Err(ToolError::ExecutionFailed(
                        "unix sockets are not supported on this platform".into(),
                    ))
                }
            }
        }
    }

    async fn round_trip(self, hello: &Value, request: &Value) -> Result<Value, ToolError> {
        match self {
            AgentStream::Tcp(stream) => exchange(stream, hello, request).await,
            #[cfg(unix)]
            AgentStream::Unix(stream) => exchange(stream, hello, request).await,
        }
    }
}

async fn exchange<S>(stream: S, hello: &Value, request: &Value) -> Result<Value, ToolError>
where
    S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin,
{
    let (read_half, mut write_half) = tokio::io::split(stream);
    let mut reader = BufReader::new(read_half);

    write_half
        .write_all(format!("{}\n", hello).as_bytes())
        .await
        .map_err(ToolError::Io)?;

    let mut line = String::new();
    reader.read_line(&mut line).await.map_err(ToolError::Io)?;
    let ack: Value = serde_json::from_str(line.trim())
        .map_err(|e| ToolError::ParseError(format!("hello reply: {}", e)))?;
    if ack["ok"] != json!(true) {
        return Err(ToolError::ExecutionFailed(format!(
            "agent refused hello: {}",
            line.trim()
        )));
    }

    write_half
        .write_all(format!("{}\n", request).as_bytes())
        .await
        .map_err(ToolError::Io)?;

    let mut reply = String::new();
    reader.read_line(&mut reply).await.map_err(ToolError::Io)?;
    serde_json::from_str(reply.trim())
        .map_err(|e| ToolError::ParseError(format!("agent reply: {}", e)))
}

/// Tool driving a local desktop agent over its socket protocol
#[derive(Default)]
pub struct FluffyAgent;

impl FluffyAgent {
    pub fn new() -> Self {
        Self
    }
}

impl Tool for FluffyAgent {
    fn name(&self) -> &str {
        "fluffy_agent"
    }

    fn description(&self) -> &str {
        "Send one command to a local desktop agent over its socket. \
         Actions: snapshot, text, key, mouse."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "socket": {
                    "type": "string",
                    "description": "Agent address: unix:<path>, tcp:<host>:<port>, or a bare path"
                },
                "action": {
                    "type": "string",
                    "description": "Command to send",
                    "enum": ["snapshot", "text", "key", "mouse"]
                },
                "text": {
                    "type": "string",
                    "description": "Text to type (text action)"
                },
                "key": {
                    "type": "string",
                    "description": "Key chord to press (key action)"
                },
                "x": {
                    "type": "integer",
                    "description": "Pointer x coordinate (mouse action)"
                },
                "y": {
                    "type": "integer",
                    "description": "Pointer y coordinate (mouse action)"
                },
                "timeout_ms": {
                    "type": "integer",
                    "description": "Connection deadline in milliseconds (default 10000)",
                    "default": 10000
                }
            },
            "required": ["socket", "action"]
        })
    }

    fn execute_with_context(
        &self,
        _ctx: ExecContext,
        params: Value,
    ) -> BoxFuture<'_, Result<ToolResult, ToolError>> {
        Box::pin(async move {
            let socket = required_str(&params, "socket")?;
            let action = required_str(&params, "action")?;
            let deadline = duration_param(&params, "timeout_ms", DEFAULT_DEADLINE);

            let request = match action {
                "snapshot" => json!({"type": "snapshot"}),
                "text" => {
                    let text = required_str(&params, "text")?;
                    json!({"type": "text", "text": text})
                }
                "key" => {
                    let key = required_str(&params, "key")?;
                    json!({"type": "key", "key": key})
                }
                "mouse" => {
                    let x = int_param(&params, "x", -1);
                    let y = int_param(&params, "y", -1);
                    if x < 0 || y < 0 {
                        return Err(ToolError::InvalidParams(
                            "mouse action needs non-negative x and y".into(),
                        ));
                    }
                    json!({"type": "mouse", "x": x, "y": y})
                }
                other => {
                    return Err(ToolError::InvalidParams(format!(
                        "unknown action: {}",
                        other
                    )))
                }
            };

            let addr = parse_addr(socket)?;
            let reply = tokio::time::timeout(deadline, async {
                let stream = AgentStream::connect(&addr).await?;
                stream.round_trip(&json!({"type": "hello"}), &request).await
            })
            .await
            .map_err(|_| ToolError::Timeout(format!("agent at {}", socket)))??;

            Ok(ToolResult::ok()
                .with("action", action)
                .with("reply", reply))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[test]
    fn test_parse_addr() {
        assert_eq!(
            parse_addr("unix:/tmp/agent.sock").unwrap(),
            AgentAddr::Unix("/tmp/agent.sock".into())
        );
        assert_eq!(
            parse_addr("tcp:127.0.0.1:7000").unwrap(),
            AgentAddr::Tcp("127.0.0.1:7000".into())
        );
        assert_eq!(
            parse_addr("/tmp/agent.sock").unwrap(),
            AgentAddr::Unix("/tmp/agent.sock".into())
        );
        assert!(parse_addr("tcp:nohost").is_err());
        assert!(parse_addr("unix:").is_err());
        assert!(parse_addr("  ").is_err());
    }

    async fn spawn_mock_agent() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let (read_half, mut write_half) = tokio::io::split(stream);
            let mut reader = BufReader::new(read_half);

            let mut hello = String::new();
            reader.read_line(&mut hello).await.unwrap();
            assert!(hello.contains("\"hello\""));
            write_half
                .write_all(b"{\"ok\": true, \"agent\": \"mock\"}\n")
                .await
                .unwrap();

            let mut request = String::new();
            reader.read_line(&mut request).await.unwrap();
            let parsed: Value = serde_json::from_str(request.trim()).unwrap();
            let reply = json!({"ok": true, "echo": parsed["type"]});
            write_half
                .write_all(format!("{}\n", reply).as_bytes())
                .await
                .unwrap();
        });
        format!("tcp:{}", addr)
    }

    #[tokio::test]
    async fn test_snapshot_round_trip() {
        let socket = spawn_mock_agent().await;
        let result = FluffyAgent::new()
            .execute(json!({"socket": socket, "action": "snapshot"}))
            .await
            .unwrap();
        assert!(result.success);
        assert_eq!(result.data["reply"]["echo"], json!("snapshot"));
    }

    #[tokio::test]
    async fn test_text_requires_payload() {
        let err = FluffyAgent::new()
            .execute(json!({"socket": "tcp:127.0.0.1:1", "action": "text"}))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("text is required"));
    }

    #[tokio::test]
    async fn test_mouse_coordinates_validated() {
        let err = FluffyAgent::new()
            .execute(json!({"socket": "tcp:127.0.0.1:1", "action": "mouse", "x": 5}))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("x and y"));
    }

    #[tokio::test]
    async fn test_connection_failure_reported() {
        // Port 9 on localhost is almost certainly closed.
        let err = FluffyAgent::new()
            .execute(json!({"socket": "tcp:127.0.0.1:9", "action": "snapshot", "timeout_ms": 2000}))
            .await
            .unwrap_err();
        let message = err.to_string();
        assert!(message.contains("connect") || message.contains("timed out"));
    }
}
