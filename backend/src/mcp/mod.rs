//! MCP (Model Context Protocol) Streamable HTTP support.
//!
//! Implements the server side of the Streamable HTTP transport so MCP
//! clients can query Thais room availability through a single endpoint.
//!
//! ## Endpoints
//!
//! - `POST /mcp` - Send JSON-RPC requests and notifications
//! - `GET /mcp` - Open the SSE stream for server-initiated messages
//! - `DELETE /mcp` - Terminate a session
//!
//! ## Session Management
//!
//! Sessions are identified by the `mcp-session-id` header, assigned in the
//! response to `initialize` and required on every later request. Each
//! session owns a [`Transport`] which enforces the
//! `Uninitialized → Active → Terminated` lifecycle.

pub mod error;
pub mod message;
pub mod session;
pub mod transport;

pub use error::ProtocolError;
pub use message::{ClientMessage, ClientNotification, ClientRequest, MessageError};
pub use session::{InvalidSessionId, Session, SessionId, SessionStore};
pub use transport::{McpEvent, Transport, TransportState, SERVER_NAME};
