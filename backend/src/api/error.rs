//! HTTP rendering of request failures.
//!
//! Every failure is written as a JSON-RPC error envelope with `"id": null`,
//! so clients can parse error bodies the same way as ordinary responses.

use crate::mcp::{MessageError, ProtocolError};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thais_types::jsonrpc::{INVALID_PARAMS, INVALID_REQUEST, PARSE_ERROR};
use thais_types::JsonRpcResponse;
use tracing::warn;

/// Errors produced by the `/mcp` handlers.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Body was not valid JSON.
    #[error("Parse error: {0}")]
    Parse(String),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    Message(#[from] MessageError),

    #[error("Forbidden: Invalid origin")]
    InvalidOrigin,
}

impl ApiError {
    /// HTTP status and JSON-RPC code for this error.
    pub fn status_and_code(&self) -> (StatusCode, i32) {
        match self {
            ApiError::Parse(_) => (StatusCode::BAD_REQUEST, PARSE_ERROR),
            ApiError::Protocol(ProtocolError::StreamConflict) => {
                (StatusCode::CONFLICT, INVALID_REQUEST)
            }
            ApiError::Protocol(_) => (StatusCode::BAD_REQUEST, INVALID_REQUEST),
            ApiError::Message(MessageError::InvalidRequest(_)) => {
                (StatusCode::BAD_REQUEST, INVALID_REQUEST)
            }
            ApiError::Message(MessageError::InvalidParams { .. }) => {
                (StatusCode::BAD_REQUEST, INVALID_PARAMS)
            }
            ApiError::InvalidOrigin => (StatusCode::FORBIDDEN, INVALID_REQUEST),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        let (id, message) = match &self {
            ApiError::Message(MessageError::InvalidParams { id, message }) => {
                warn!("MCP: Rejected request: invalid params: {}", message);
                (Some(id.clone()), format!("Invalid params: {}", message))
            }
            ApiError::Message(MessageError::InvalidRequest(reason)) => {
                warn!("MCP: Rejected request: {}", reason);
                (None, format!("Invalid Request: {}", reason))
            }
            other => {
                warn!("MCP: Rejected request: {}", other);
                (None, other.to_string())
            }
        };
        (status, Json(JsonRpcResponse::error(id, code, message))).into_response()
    }
}
