//! Per-session protocol engine.
//!
//! A [`Transport`] owns the handshake state of exactly one session and the
//! sending half of its push channel. State transitions happen inside a
//! short synchronous critical section; tool invocations run on their own
//! tasks so a dropped HTTP connection never cancels an upstream call
//! half-way.

use super::error::ProtocolError;
use super::message::{ClientMessage, ClientNotification, ClientRequest};
use super::session::SessionId;
use crate::tools::ToolRegistry;
use axum::response::sse::Event;
use futures::Stream;
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::json;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use thais_types::jsonrpc::{INTERNAL_ERROR, INVALID_PARAMS, METHOD_NOT_FOUND};
use thais_types::mcp::{
    negotiate_protocol_version, LoggingLevel, LoggingMessageParams, ServerCapabilities,
    ToolsCapability,
};
use thais_types::{
    CallToolParams, CallToolResult, Implementation, InitializeParams, InitializeResult,
    JsonRpcRequest, JsonRpcResponse, ListToolsResult, RequestId,
};
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;
use tracing::{debug, error, info, warn};

/// Name reported in `serverInfo`.
pub const SERVER_NAME: &str = "thais_mcp_server";

/// Buffered push messages per session before a slow stream starts lagging.
const PUSH_BUFFER: usize = 100;

/// Handshake state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportState {
    Uninitialized,
    Active,
    Terminated,
}

/// Messages pushed to the client over the SSE stream.
#[derive(Clone, Debug)]
pub enum McpEvent {
    /// A serialized JSON-RPC message.
    JsonRpc(String),
}

impl McpEvent {
    pub fn into_sse_event(self) -> Event {
        match self {
            McpEvent::JsonRpc(json) => Event::default().event("message").data(json),
        }
    }
}

struct TransportInner {
    state: TransportState,
    /// Dropped on termination, which ends any open stream.
    events: Option<broadcast::Sender<McpEvent>>,
    client_info: Option<Implementation>,
}

/// Protocol state machine for one session.
pub struct Transport {
    session_id: SessionId,
    tools: ToolRegistry,
    inner: Mutex<TransportInner>,
    stream_bound: Arc<AtomicBool>,
    next_invocation: AtomicU64,
}

impl Transport {
    pub fn new(session_id: SessionId, tools: ToolRegistry) -> Self {
        let (events, _) = broadcast::channel(PUSH_BUFFER);
        Self {
            session_id,
            tools,
            inner: Mutex::new(TransportInner {
                state: TransportState::Uninitialized,
                events: Some(events),
                client_info: None,
            }),
            stream_bound: Arc::new(AtomicBool::new(false)),
            next_invocation: AtomicU64::new(0),
        }
    }

    pub fn state(&self) -> TransportState {
        self.inner.lock().state
    }

    /// Client implementation that completed the handshake.
    pub fn client_info(&self) -> Option<Implementation> {
        self.inner.lock().client_info.clone()
    }

    pub fn has_stream(&self) -> bool {
        self.stream_bound.load(Ordering::SeqCst)
    }

    /// Run the handshake: `Uninitialized → Active`.
    pub fn initialize(
        &self,
        id: RequestId,
        params: InitializeParams,
    ) -> Result<JsonRpcResponse, ProtocolError> {
        let version = negotiate_protocol_version(&params.protocol_version);
        {
            let mut inner = self.inner.lock();
            match inner.state {
                TransportState::Uninitialized => {}
                TransportState::Active => return Err(ProtocolError::AlreadyInitialized),
                TransportState::Terminated => return Err(ProtocolError::SessionTerminated),
            }
            inner.state = TransportState::Active;
            inner.client_info = Some(params.client_info.clone());
        }

        info!(
            "MCP: Session {} initialized by {} {} (protocol {})",
            self.session_id, params.client_info.name, params.client_info.version, version
        );

        let result = InitializeResult {
            protocol_version: version.to_string(),
            capabilities: ServerCapabilities {
                tools: Some(ToolsCapability {
                    list_changed: false,
                }),
                logging: Some(json!({})),
            },
            server_info: Implementation {
                name: SERVER_NAME.to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
            },
            instructions: Some(
                "Use get_room_availability to check free rooms for a date range and \
                 thais_list_room_types to translate room type ids into names."
                    .to_string(),
            ),
        };
        Ok(success_response(id, &result))
    }

    /// Handle one inbound message.
    ///
    /// Returns `Ok(None)` for notifications. Protocol errors leave the state untouched.
    pub async fn handle(
        &self,
        message: ClientMessage,
    ) -> Result<Option<JsonRpcResponse>, ProtocolError> {
        debug!("MCP: Session {} <- {}", self.session_id, message.method());
        match message {
            ClientMessage::Initialize { id, params } => self.initialize(id, params).map(Some),
            ClientMessage::Request { id, request } => {
                self.ensure_active()?;
                Ok(Some(self.handle_request(id, request).await))
            }
            ClientMessage::Notification(notification) => {
                self.ensure_active()?;
                self.handle_notification(notification);
                Ok(None)
            }
        }
    }

    fn ensure_active(&self) -> Result<(), ProtocolError> {
        match self.state() {
            TransportState::Active => Ok(()),
            TransportState::Uninitialized => Err(ProtocolError::Uninitialized),
            TransportState::Terminated => Err(ProtocolError::SessionTerminated),
        }
    }

    async fn handle_request(&self, id: RequestId, request: ClientRequest) -> JsonRpcResponse {
        match request {
            ClientRequest::Ping => JsonRpcResponse::success(Some(id), json!({})),
            ClientRequest::ListTools => success_response(
                id,
                &ListToolsResult {
                    tools: self.tools.list(),
                },
            ),
            ClientRequest::CallTool(params) => self.call_tool(id, params).await,
            ClientRequest::Unknown(method) => JsonRpcResponse::error(
                Some(id),
                METHOD_NOT_FOUND,
                format!("Method not found: {}", method),
            ),
        }
    }

    async fn call_tool(&self, id: RequestId, params: CallToolParams) -> JsonRpcResponse {
        let invocation = self.next_invocation.fetch_add(1, Ordering::SeqCst);
        let name = params.name.clone();
        debug!(
            "MCP: Session {} invocation #{} -> {}",
            self.session_id, invocation, name
        );

        // Runs to completion even if this future is dropped; the result is then discarded.
        let tools = self.tools.clone();
        let handle =
            tokio::spawn(async move { tools.call(&params.name, params.arguments).await });

        let result = match handle.await {
            Ok(Ok(result)) => result,
            Ok(Err(unknown)) => {
                return JsonRpcResponse::error(Some(id), INVALID_PARAMS, unknown.to_string());
            }
            Err(e) => {
                error!(
                    "MCP: Tool {} crashed in session {}: {}",
                    name, self.session_id, e
                );
                CallToolResult::error(format!("Tool {} failed unexpectedly", name))
            }
        };

        self.notify_tool_finished(invocation, &name, &result);
        success_response(id, &result)
    }

    fn handle_notification(&self, notification: ClientNotification) {
        match notification {
            ClientNotification::Initialized => {
                debug!("MCP: Client confirmed initialization of {}", self.session_id);
            }
            ClientNotification::Cancelled { request_id, reason } => {
                // In-flight invocations finish on their own; nothing to abort.
                debug!(
                    "MCP: Client cancelled request {:?} in {}: {:?}",
                    request_id.map(|id| id.to_string()),
                    self.session_id,
                    reason
                );
            }
            ClientNotification::Other(method) => {
                debug!("MCP: Ignoring notification {}", method);
            }
        }
    }

    fn notify_tool_finished(&self, invocation: u64, tool: &str, result: &CallToolResult) {
        let params = LoggingMessageParams {
            level: if result.is_error() {
                LoggingLevel::Warning
            } else {
                LoggingLevel::Info
            },
            logger: Some(SERVER_NAME.to_string()),
            data: json!({
                "tool": tool,
                "invocation": invocation,
                "isError": result.is_error(),
            }),
        };
        match serde_json::to_value(&params) {
            Ok(params) => {
                self.notify("notifications/message", params);
            }
            Err(e) => warn!("Failed to serialize log notification: {}", e),
        }
    }

    /// Push a server notification to the bound stream, if any.
    ///
    /// Returns whether a stream received it.
    pub fn notify(&self, method: &str, params: serde_json::Value) -> bool {
        let inner = self.inner.lock();
        let Some(events) = inner.events.as_ref() else {
            return false;
        };
        if events.receiver_count() == 0 {
            return false;
        }

        let notification = JsonRpcRequest::notification(method, Some(params));
        match serde_json::to_string(&notification) {
            Ok(json) => events.send(McpEvent::JsonRpc(json)).is_ok(),
            Err(e) => {
                warn!("Failed to serialize notification {}: {}", method, e);
                false
            }
        }
    }

    /// Bind a push channel to this session.
    ///
    /// The returned stream ends when the session is terminated; dropping it
    /// (client disconnect) releases the binding.
    pub fn open_stream(
        &self,
    ) -> Result<impl Stream<Item = McpEvent> + Send + 'static, ProtocolError> {
        let inner = self.inner.lock();
        match inner.state {
            TransportState::Active => {}
            TransportState::Uninitialized => return Err(ProtocolError::Uninitialized),
            TransportState::Terminated => return Err(ProtocolError::SessionTerminated),
        }
        let events = inner
            .events
            .as_ref()
            .ok_or(ProtocolError::SessionTerminated)?;

        if self
            .stream_bound
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(ProtocolError::StreamConflict);
        }

        let receiver = events.subscribe();
        let binding = StreamBinding {
            session_id: self.session_id,
            bound: self.stream_bound.clone(),
        };

        Ok(BroadcastStream::new(receiver).filter_map(move |result| {
            // Capture the whole guard; dropping it releases the slot.
            let binding = &binding;
            match result {
                Ok(event) => Some(event),
                Err(e) => {
                    warn!(
                        "MCP: Stream for {} lagging, skipping events: {}",
                        binding.session_id, e
                    );
                    None
                }
            }
        }))
    }

    /// `Active | Uninitialized → Terminated`. Returns false if already terminated.
    pub fn terminate(&self) -> bool {
        let mut inner = self.inner.lock();
        if inner.state == TransportState::Terminated {
            return false;
        }
        inner.state = TransportState::Terminated;
        inner.events = None;
        true
    }
}

/// Marks the session's stream slot as taken until dropped.
struct StreamBinding {
    session_id: SessionId,
    bound: Arc<AtomicBool>,
}

impl Drop for StreamBinding {
    fn drop(&mut self) {
        self.bound.store(false, Ordering::SeqCst);
        info!("MCP: SSE stream closed for session {}", self.session_id);
    }
}

fn success_response<T: Serialize>(id: RequestId, result: &T) -> JsonRpcResponse {
    match serde_json::to_value(result) {
        Ok(value) => JsonRpcResponse::success(Some(id), value),
        Err(e) => {
            error!("Failed to serialize result: {}", e);
            JsonRpcResponse::error(Some(id), INTERNAL_ERROR, "Internal error")
        }
    }
}
