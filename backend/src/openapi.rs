//! OpenAPI documentation configuration.

use crate::api::health::HealthResponse;
use thais_types::{JsonRpcError, JsonRpcRequest, JsonRpcResponse, RequestId};
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::api::mcp::mcp_post,
        crate::api::mcp::mcp_get,
        crate::api::mcp::mcp_delete,
        crate::api::health::health,
    ),
    components(
        schemas(
            JsonRpcRequest,
            JsonRpcResponse,
            JsonRpcError,
            RequestId,
            HealthResponse,
        )
    ),
    tags(
        (name = "mcp", description = "MCP Streamable HTTP transport"),
        (name = "System", description = "System information endpoints")
    ),
    info(
        title = "Thais MCP Server",
        version = "0.1.0",
        description = "Model Context Protocol server exposing Thais hotel room availability",
        license(
            name = "MIT OR Apache-2.0"
        )
    )
)]
pub struct ApiDoc;
