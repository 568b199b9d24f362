//! Wire types of the gateway's WebSocket protocol.
//!
//! Every frame is one JSON object tagged by `type`:
//!
//! | Client → gateway | Gateway → client |
//! |---|---|
//! | `initialize` | `initialized` (manifest and server info) |
//! | `tool_call` | `tool_result` |
//! | anything else | `error` |

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Server name reported in `initialized`.
pub const SERVER_NAME: &str = "file-operations-mcp";

/// Server version reported in `initialized`.
pub const SERVER_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Messages a client sends.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    Initialize {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<Value>,
    },
    ToolCall {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<Value>,
        name: String,
        #[serde(default)]
        arguments: Value,
    },
    /// A message whose `type` is not recognized. Never sent.
    #[serde(skip)]
    Unknown { kind: String },
}

impl ClientMessage {
    /// Parse a frame.
    ///
    /// Unrecognized `type` values parse to [`ClientMessage::Unknown`]; only
    /// malformed JSON or a known type with bad fields is an error.
    pub fn parse(text: &str) -> Result<Self, serde_json::Error> {
        let value: Value = serde_json::from_str(text)?;
        match value.get("type") {
            Some(Value::String(kind)) if kind == "initialize" || kind == "tool_call" => {
                serde_json::from_value(value)
            }
            Some(Value::String(kind)) => Ok(ClientMessage::Unknown { kind: kind.clone() }),
            Some(other) => Ok(ClientMessage::Unknown {
                kind: other.to_string(),
            }),
            None => Ok(ClientMessage::Unknown {
                kind: "undefined".to_string(),
            }),
        }
    }
}

/// Messages the gateway sends.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    Initialized {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<Value>,
        manifest: Manifest,
        #[serde(rename = "serverInfo")]
        server_info: ServerInfo,
    },
    ToolResult {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<Value>,
        result: ToolResult,
    },
    Error { error: String },
}

impl ServerMessage {
    pub fn error(message: impl Into<String>) -> Self {
        ServerMessage::Error {
            error: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerInfo {
    pub name: String,
    pub version: String,
}

impl Default for ServerInfo {
    fn default() -> Self {
        Self {
            name: SERVER_NAME.to_string(),
            version: SERVER_VERSION.to_string(),
        }
    }
}

/// Tool catalogue sent on `initialized`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    pub name: String,
    pub version: String,
    pub description: String,
    pub tools: Vec<ToolDescriptor>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    /// Scope a caller must hold to invoke the tool.
    pub required_scope: String,
    /// JSON Schema of the `arguments` object.
    pub input_schema: Value,
}

/// Outcome of one tool call.
///
/// Serializes as `{success, ...payload}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    pub success: bool,
    #[serde(flatten)]
    pub payload: ToolPayload,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ToolPayload {
    Files { files: Vec<FileEntry> },
    Content { content: String, path: String },
    Failure { error: String },
}

impl ToolResult {
    pub fn files(files: Vec<FileEntry>) -> Self {
        Self {
            success: true,
            payload: ToolPayload::Files { files },
        }
    }

    pub fn content(content: String, path: impl Into<String>) -> Self {
        Self {
            success: true,
            payload: ToolPayload::Content {
                content,
                path: path.into(),
            },
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            payload: ToolPayload::Failure {
                error: error.into(),
            },
        }
    }

    /// The failure message, if this is a failure.
    pub fn error(&self) -> Option<&str> {
        match &self.payload {
            ToolPayload::Failure { error } => Some(error),
            _ => None,
        }
    }
}

/// One directory entry returned by `list-files`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEntry {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: FileKind,
    /// Path relative to the sandbox root, as the caller would pass it back.
    pub path: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileKind {
    File,
    Directory,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_initialize() {
        assert_eq!(
            ClientMessage::parse(r#"{"type":"initialize","id":1}"#).unwrap(),
            ClientMessage::Initialize { id: Some(json!(1)) }
        );
        assert_eq!(
            ClientMessage::parse(r#"{"type":"initialize"}"#).unwrap(),
            ClientMessage::Initialize { id: None }
        );
    }

    #[test]
    fn test_parse_tool_call() {
        let msg = ClientMessage::parse(
            r#"{"type":"tool_call","id":"a","name":"read-file","arguments":{"filePath":"x.txt"}}"#,
        )
        .unwrap();
        assert_eq!(
            msg,
            ClientMessage::ToolCall {
                id: Some(json!("a")),
                name: "read-file".to_string(),
                arguments: json!({"filePath": "x.txt"}),
            }
        );
    }

    #[test]
    fn test_parse_unknown_type() {
        assert_eq!(
            ClientMessage::parse(r#"{"type":"ping"}"#).unwrap(),
            ClientMessage::Unknown {
                kind: "ping".to_string()
            }
        );
        assert_eq!(
            ClientMessage::parse(r#"{"id":3}"#).unwrap(),
            ClientMessage::Unknown {
                kind: "undefined".to_string()
            }
        );
    }

    #[test]
    fn test_parse_errors() {
        assert!(ClientMessage::parse("{not json").is_err());
        // Known type, missing required field
        assert!(ClientMessage::parse(r#"{"type":"tool_call"}"#).is_err());
    }

    #[test]
    fn test_tool_result_wire_shape() {
        let result = ToolResult::files(vec![FileEntry {
            name: "a.txt".into(),
            kind: FileKind::File,
            path: "a.txt".into(),
        }]);
        assert_eq!(
            serde_json::to_value(&result).unwrap(),
            json!({"success": true, "files": [{"name": "a.txt", "type": "file", "path": "a.txt"}]})
        );

        let result = ToolResult::failure("nope");
        assert_eq!(
            serde_json::to_value(&result).unwrap(),
            json!({"success": false, "error": "nope"})
        );
        assert_eq!(result.error(), Some("nope"));
    }

    #[test]
    fn test_server_message_shapes() {
        let msg = ServerMessage::ToolResult {
            id: Some(json!(2)),
            result: ToolResult::content("hi".into(), "a.txt"),
        };
        assert_eq!(
            serde_json::to_value(&msg).unwrap(),
            json!({"type": "tool_result", "id": 2, "result": {"success": true, "content": "hi", "path": "a.txt"}})
        );
        assert_eq!(
            serde_json::to_value(ServerMessage::error("Unknown message type: ping")).unwrap(),
            json!({"type": "error", "error": "Unknown message type: ping"})
        );
    }

    #[test]
    fn test_server_message_decodes() {
        let text = r#"{"type":"tool_result","id":1,"result":{"success":false,"error":"Unknown tool: x"}}"#;
        let msg: ServerMessage = serde_json::from_str(text).unwrap();
        match msg {
            ServerMessage::ToolResult { result, .. } => {
                assert!(!result.success);
                assert_eq!(result.error(), Some("Unknown tool: x"));
            }
            other => panic!("unexpected message: {other:?}"),
        }
    }
}
