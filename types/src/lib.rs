//! Shared types for the Thais MCP server.
//!
//! This crate contains the JSON-RPC envelopes, MCP protocol payloads and
//! upstream booking API models shared between the server and its tests.

/// Default port for the MCP endpoint.
pub const DEFAULT_PORT: u16 = 3000;

/// Default bind address. The server only listens on loopback unless told otherwise.
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Header carrying the MCP session identifier in both directions.
pub const MCP_SESSION_ID_HEADER: &str = "mcp-session-id";

pub mod booking;
pub mod jsonrpc;
pub mod mcp;

// Re-export commonly used types
pub use booking::{Availability, LoginRequest, LoginResponse, RoomType};
pub use jsonrpc::{JsonRpcError, JsonRpcRequest, JsonRpcResponse, RequestId};
pub use mcp::{
    CallToolParams, CallToolResult, Content, Implementation, InitializeParams, InitializeResult,
    ListToolsResult, Tool,
};
