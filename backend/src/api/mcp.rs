//! MCP Streamable HTTP endpoint handlers.
//!
//! ## Endpoints
//!
//! - `POST /mcp` - Send JSON-RPC requests and notifications
//! - `GET /mcp` - Open SSE stream for server-initiated messages
//! - `DELETE /mcp` - Terminate a session

use axum::{
    body::Bytes,
    extract::State,
    http::{header, HeaderMap, HeaderName, HeaderValue, StatusCode},
    response::{
        sse::{KeepAlive, Sse},
        IntoResponse, Response,
    },
    Json,
};
use serde_json::Value;
use std::convert::Infallible;
use std::sync::Arc;
use thais_types::jsonrpc::INVALID_PARAMS;
use thais_types::{JsonRpcRequest, JsonRpcResponse, MCP_SESSION_ID_HEADER};
use tokio_stream::StreamExt;
use tracing::{debug, info, warn};

use super::error::ApiError;
use crate::mcp::{ClientMessage, MessageError, ProtocolError, Session, SessionId};
use crate::state::AppState;

/// Validate Origin header for DNS rebinding protection.
///
/// Requests without an Origin (non-browser clients) are accepted, as are
/// loopback origins and any origin listed in `server.allowed_origins`.
pub fn validate_origin(headers: &HeaderMap, allowed: &[String]) -> bool {
    let Some(origin) = headers.get(header::ORIGIN) else {
        return true;
    };
    let Ok(origin_str) = origin.to_str() else {
        warn!("Rejecting MCP request with non-ASCII origin");
        return false;
    };

    if allowed
        .iter()
        .any(|o| o.trim_end_matches('/') == origin_str.trim_end_matches('/'))
    {
        return true;
    }

    let is_loopback = reqwest::Url::parse(origin_str)
        .ok()
        .and_then(|url| url.host_str().map(str::to_owned))
        .is_some_and(|host| matches!(host.as_str(), "localhost" | "127.0.0.1" | "[::1]"));
    if !is_loopback {
        warn!("Rejecting MCP request from origin: {}", origin_str);
    }
    is_loopback
}

/// Extract session ID from headers.
fn get_session_id(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(MCP_SESSION_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

fn resolve_session(state: &AppState, headers: &HeaderMap) -> Result<Arc<Session>, ApiError> {
    get_session_id(headers)
        .and_then(|id| state.sessions().get_str(id))
        .ok_or_else(|| ProtocolError::unknown_session().into())
}

fn with_session_header(mut response: Response, session: &Session) -> Response {
    if let Ok(hv) = HeaderValue::from_str(&session.id.to_string()) {
        response
            .headers_mut()
            .insert(HeaderName::from_static(MCP_SESSION_ID_HEADER), hv);
    }
    response
}

/// Decode a POST body into a JSON-RPC request.
fn decode_request(body: &[u8]) -> Result<JsonRpcRequest, ApiError> {
    let value: Value = serde_json::from_slice(body).map_err(|e| ApiError::Parse(e.to_string()))?;
    if value.is_array() {
        return Err(MessageError::InvalidRequest(
            "Batch requests are not supported".to_string(),
        )
        .into());
    }
    serde_json::from_value(value)
        .map_err(|e| MessageError::InvalidRequest(format!("Malformed JSON-RPC message: {}", e)).into())
}

/// POST /mcp - Handle JSON-RPC requests.
///
/// Without a session header only `initialize` is accepted; it creates a
/// session whose id is returned in the `mcp-session-id` response header.
#[utoipa::path(
    post,
    path = "/mcp",
    tag = "mcp",
    request_body = JsonRpcRequest,
    params(
        ("mcp-session-id" = Option<String>, Header, description = "Session id, omitted only on initialize")
    ),
    responses(
        (status = 200, description = "JSON-RPC response", body = JsonRpcResponse),
        (status = 202, description = "Notification accepted"),
        (status = 400, description = "Parse error, invalid request or unknown session", body = JsonRpcResponse),
        (status = 403, description = "Origin not allowed", body = JsonRpcResponse),
        (status = 500, description = "Internal error", body = JsonRpcResponse)
    )
)]
pub async fn mcp_post(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ApiError> {
    if !validate_origin(&headers, state.allowed_origins()) {
        return Err(ApiError::InvalidOrigin);
    }

    let request = decode_request(&body)?;
    let session_id = get_session_id(&headers);
    debug!("MCP POST: method={}, session={:?}", request.method, session_id);

    let message = ClientMessage::try_from(request);

    if session_id.is_none() {
        return match message {
            Ok(ClientMessage::Initialize { id, params }) => {
                let session = state.sessions().create();
                match session.transport.initialize(id, params) {
                    Ok(response) => {
                        info!("MCP: New session initialized: {}", session.id);
                        Ok(with_session_header(Json(response).into_response(), &session))
                    }
                    Err(e) => {
                        state.sessions().remove(&session.id);
                        Err(e.into())
                    }
                }
            }
            Err(e @ MessageError::InvalidRequest(_)) => Err(e.into()),
            _ => Err(ProtocolError::unknown_session().into()),
        };
    }

    let session = resolve_session(&state, &headers)?;
    let message = match message {
        Ok(message) => message,
        Err(MessageError::InvalidParams { id, message }) => {
            let response = JsonRpcResponse::error(
                Some(id),
                INVALID_PARAMS,
                format!("Invalid params: {}", message),
            );
            return Ok(with_session_header(Json(response).into_response(), &session));
        }
        Err(e) => return Err(e.into()),
    };

    let response = match session.transport.handle(message).await? {
        Some(response) => Json(response).into_response(),
        None => StatusCode::ACCEPTED.into_response(),
    };
    Ok(with_session_header(response, &session))
}

/// GET /mcp - Open SSE stream for server-initiated messages.
///
/// At most one stream may be open per session.
#[utoipa::path(
    get,
    path = "/mcp",
    tag = "mcp",
    params(
        ("mcp-session-id" = String, Header, description = "Session id returned by initialize")
    ),
    responses(
        (status = 200, description = "Event stream of JSON-RPC messages", body = String, content_type = "text/event-stream"),
        (status = 400, description = "Missing or unknown session", body = JsonRpcResponse),
        (status = 403, description = "Origin not allowed", body = JsonRpcResponse),
        (status = 409, description = "A stream is already open for this session", body = JsonRpcResponse)
    )
)]
pub async fn mcp_get(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    if !validate_origin(&headers, state.allowed_origins()) {
        return Err(ApiError::InvalidOrigin);
    }

    let session = resolve_session(&state, &headers)?;
    let events = session.transport.open_stream()?;
    info!("MCP: SSE stream opened for session {}", session.id);

    let stream = events.map(|event| Ok::<_, Infallible>(event.into_sse_event()));
    let response = match state.stream_keep_alive() {
        Some(interval) => Sse::new(stream)
            .keep_alive(KeepAlive::new().interval(interval))
            .into_response(),
        None => Sse::new(stream).into_response(),
    };

    Ok(with_session_header(response, &session))
}

/// DELETE /mcp - Terminate a session.
///
/// Always succeeds; unknown ids are ignored.
#[utoipa::path(
    delete,
    path = "/mcp",
    tag = "mcp",
    params(
        ("mcp-session-id" = Option<String>, Header, description = "Session to terminate")
    ),
    responses(
        (status = 200, description = "Session terminated (or did not exist)"),
        (status = 403, description = "Origin not allowed", body = JsonRpcResponse)
    )
)]
pub async fn mcp_delete(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<StatusCode, ApiError> {
    if !validate_origin(&headers, state.allowed_origins()) {
        return Err(ApiError::InvalidOrigin);
    }

    match get_session_id(&headers).and_then(|id| id.parse::<SessionId>().ok()) {
        Some(id) => {
            if !state.sessions().remove(&id) {
                debug!("MCP: DELETE for unknown session {}", id);
            }
        }
        None => debug!("MCP: DELETE without a valid session id"),
    }
    Ok(StatusCode::OK)
}
