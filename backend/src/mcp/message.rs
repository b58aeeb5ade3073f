//! Typed view of inbound JSON-RPC messages.
//!
//! Every POST body is converted into a [`ClientMessage`] before it reaches a
//! session, so the transport matches on variants instead of probing fields.

use serde_json::Value;
use thais_types::jsonrpc::JSONRPC_VERSION;
use thais_types::{CallToolParams, InitializeParams, JsonRpcRequest, RequestId};

/// A message sent by an MCP client.
#[derive(Debug, Clone)]
pub enum ClientMessage {
    /// The handshake that turns a fresh session into an active one.
    Initialize {
        id: RequestId,
        params: InitializeParams,
    },
    /// A request that expects a response.
    Request { id: RequestId, request: ClientRequest },
    /// A notification; no response is produced.
    Notification(ClientNotification),
}

#[derive(Debug, Clone)]
pub enum ClientRequest {
    Ping,
    ListTools,
    CallTool(CallToolParams),
    /// Anything else; answered with `-32601`.
    Unknown(String),
}

#[derive(Debug, Clone)]
pub enum ClientNotification {
    Initialized,
    Cancelled {
        request_id: Option<RequestId>,
        reason: Option<String>,
    },
    Other(String),
}

/// Why a JSON-RPC request could not be turned into a [`ClientMessage`].
#[derive(Debug, Clone, thiserror::Error)]
pub enum MessageError {
    /// The envelope itself is unusable.
    #[error("{0}")]
    InvalidRequest(String),

    /// The envelope is fine but the params of a request are not.
    #[error("Invalid params: {message}")]
    InvalidParams { id: RequestId, message: String },
}

impl ClientMessage {
    /// Method name, for logging.
    pub fn method(&self) -> &str {
        match self {
            ClientMessage::Initialize { .. } => "initialize",
            ClientMessage::Request { request, .. } => match request {
                ClientRequest::Ping => "ping",
                ClientRequest::ListTools => "tools/list",
                ClientRequest::CallTool(_) => "tools/call",
                ClientRequest::Unknown(method) => method,
            },
            ClientMessage::Notification(notification) => match notification {
                ClientNotification::Initialized => "notifications/initialized",
                ClientNotification::Cancelled { .. } => "notifications/cancelled",
                ClientNotification::Other(method) => method,
            },
        }
    }
}

impl TryFrom<JsonRpcRequest> for ClientMessage {
    type Error = MessageError;

    fn try_from(request: JsonRpcRequest) -> Result<Self, Self::Error> {
        if request.jsonrpc != JSONRPC_VERSION {
            return Err(MessageError::InvalidRequest(format!(
                "Unsupported jsonrpc version '{}'",
                request.jsonrpc
            )));
        }

        let Some(id) = request.id else {
            return Ok(ClientMessage::Notification(parse_notification(
                request.method,
                request.params,
            )));
        };

        match request.method.as_str() {
            "initialize" => {
                let params = request.params.ok_or_else(|| {
                    MessageError::InvalidRequest("initialize requires params".to_string())
                })?;
                let params: InitializeParams = serde_json::from_value(params).map_err(|e| {
                    MessageError::InvalidRequest(format!("Malformed initialize params: {}", e))
                })?;
                Ok(ClientMessage::Initialize { id, params })
            }
            "ping" => Ok(ClientMessage::Request {
                id,
                request: ClientRequest::Ping,
            }),
            "tools/list" => Ok(ClientMessage::Request {
                id,
                request: ClientRequest::ListTools,
            }),
            "tools/call" => {
                let params = request.params.unwrap_or(Value::Null);
                match serde_json::from_value::<CallToolParams>(params) {
                    Ok(params) => Ok(ClientMessage::Request {
                        id,
                        request: ClientRequest::CallTool(params),
                    }),
                    Err(e) => Err(MessageError::InvalidParams {
                        id,
                        message: e.to_string(),
                    }),
                }
            }
            _ => Ok(ClientMessage::Request {
                id,
                request: ClientRequest::Unknown(request.method),
            }),
        }
    }
}

fn parse_notification(method: String, params: Option<Value>) -> ClientNotification {
    match method.as_str() {
        "notifications/initialized" | "initialized" => ClientNotification::Initialized,
        "notifications/cancelled" => {
            let params = params.unwrap_or(Value::Null);
            ClientNotification::Cancelled {
                request_id: params
                    .get("requestId")
                    .and_then(|v| serde_json::from_value(v.clone()).ok()),
                reason: params
                    .get("reason")
                    .and_then(Value::as_str)
                    .map(str::to_string),
            }
        }
        _ => ClientNotification::Other(method),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse(value: Value) -> Result<ClientMessage, MessageError> {
        let request: JsonRpcRequest = serde_json::from_value(value).unwrap();
        ClientMessage::try_from(request)
    }

    #[test]
    fn test_initialize() {
        let message = parse(json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "initialize",
            "params": {
                "protocolVersion": "2025-03-26",
                "capabilities": {},
                "clientInfo": {"name": "test", "version": "1.0"}
            }
        }))
        .unwrap();

        assert!(matches!(message, ClientMessage::Initialize { .. }));
    }

    #[test]
    fn test_initialize_without_client_info_is_invalid() {
        let err = parse(json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "initialize",
            "params": {"protocolVersion": "2025-03-26"}
        }))
        .unwrap_err();

        assert!(matches!(err, MessageError::InvalidRequest(_)));
    }

    #[test]
    fn test_initialize_as_notification_is_not_a_handshake() {
        let message = parse(json!({"jsonrpc": "2.0", "method": "initialize"})).unwrap();
        assert!(!matches!(message, ClientMessage::Initialize { .. }));
    }

    #[test]
    fn test_wrong_jsonrpc_version() {
        let err = parse(json!({"jsonrpc": "1.0", "id": 1, "method": "ping"})).unwrap_err();
        assert!(matches!(err, MessageError::InvalidRequest(_)));
    }

    #[test]
    fn test_tools_call() {
        let message = parse(json!({
            "jsonrpc": "2.0",
            "id": "call-1",
            "method": "tools/call",
            "params": {"name": "thais_list_room_types"}
        }))
        .unwrap();

        match message {
            ClientMessage::Request {
                id,
                request: ClientRequest::CallTool(params),
            } => {
                assert_eq!(id, RequestId::from("call-1"));
                assert_eq!(params.name, "thais_list_room_types");
                assert!(params.arguments.is_none());
            }
            other => panic!("unexpected message: {:?}", other),
        }
    }

    #[test]
    fn test_tools_call_without_name_is_invalid_params() {
        let err = parse(json!({
            "jsonrpc": "2.0",
            "id": 4,
            "method": "tools/call",
            "params": {"arguments": {}}
        }))
        .unwrap_err();

        assert!(matches!(err, MessageError::InvalidParams { id, .. } if id == RequestId::Number(4)));
    }

    #[test]
    fn test_notifications() {
        let initialized =
            parse(json!({"jsonrpc": "2.0", "method": "notifications/initialized"})).unwrap();
        assert_eq!(initialized.method(), "notifications/initialized");

        let cancelled = parse(json!({
            "jsonrpc": "2.0",
            "method": "notifications/cancelled",
            "params": {"requestId": 3, "reason": "user aborted"}
        }))
        .unwrap();
        match cancelled {
            ClientMessage::Notification(ClientNotification::Cancelled { request_id, reason }) => {
                assert_eq!(request_id, Some(RequestId::Number(3)));
                assert_eq!(reason.as_deref(), Some("user aborted"));
            }
            other => panic!("unexpected message: {:?}", other),
        }
    }

    #[test]
    fn test_unknown_method_is_kept() {
        let message = parse(json!({"jsonrpc": "2.0", "id": 2, "method": "resources/list"})).unwrap();
        assert_eq!(message.method(), "resources/list");
    }
}
