//! MCP tools backed by the booking API.
//!
//! Each tool declares a JSON schema for `tools/list`, validates its
//! arguments with `garde` and turns every failure into an error-shaped
//! [`CallToolResult`] so a broken upstream never breaks the session.

mod availability;
mod room_types;

pub use availability::{AvailabilityArgs, RoomAvailabilityTool};
pub use room_types::RoomTypesTool;

use crate::upstream::{BookingApi, UpstreamError};
use async_trait::async_trait;
use garde::Validate;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use thais_types::{CallToolResult, Tool};
use tracing::warn;

/// Error type for tool execution.
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("Invalid arguments: {0}")]
    Validation(String),

    #[error("Error connecting to Thais API: {0}")]
    Upstream(#[from] UpstreamError),
}

/// Requested tool is not registered.
#[derive(Debug, thiserror::Error)]
#[error("Tool {0} not found")]
pub struct UnknownTool(pub String);

/// A named, schema-validated operation exposed to MCP clients.
#[async_trait]
pub trait ToolHandler: Send + Sync {
    /// Definition returned by `tools/list`.
    fn definition(&self) -> Tool;

    /// Run the tool with raw JSON arguments.
    async fn call(&self, arguments: Value) -> Result<CallToolResult, ToolError>;
}

/// Deserialize and validate tool arguments.
pub(crate) fn parse_arguments<T>(arguments: Value) -> Result<T, ToolError>
where
    T: DeserializeOwned + Validate,
    T::Context: Default,
{
    let args: T =
        serde_json::from_value(arguments).map_err(|e| ToolError::Validation(e.to_string()))?;
    args.validate()
        .map_err(|report| ToolError::Validation(report.to_string().trim().to_string()))?;
    Ok(args)
}

/// Name → handler lookup shared by every session.
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: Arc<HashMap<String, Arc<dyn ToolHandler>>>,
}

impl ToolRegistry {
    /// Create a registry from a set of handlers.
    pub fn new(handlers: Vec<Arc<dyn ToolHandler>>) -> Self {
        let tools = handlers
            .into_iter()
            .map(|handler| (handler.definition().name, handler))
            .collect();
        Self {
            tools: Arc::new(tools),
        }
    }

    /// The two booking tools on top of the given API.
    pub fn with_booking_api(api: Arc<dyn BookingApi>) -> Self {
        Self::new(vec![
            Arc::new(RoomAvailabilityTool::new(api.clone())),
            Arc::new(RoomTypesTool::new(api)),
        ])
    }

    /// All tool definitions, sorted by name.
    pub fn list(&self) -> Vec<Tool> {
        let mut tools: Vec<Tool> = self.tools.values().map(|t| t.definition()).collect();
        tools.sort_by(|a, b| a.name.cmp(&b.name));
        tools
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Invoke a tool. Handler failures come back as error-shaped results.
    pub async fn call(
        &self,
        name: &str,
        arguments: Option<Value>,
    ) -> Result<CallToolResult, UnknownTool> {
        let handler = self
            .tools
            .get(name)
            .cloned()
            .ok_or_else(|| UnknownTool(name.to_string()))?;

        let arguments = arguments.unwrap_or_else(|| json!({}));
        match handler.call(arguments).await {
            Ok(result) => Ok(result),
            Err(e) => {
                warn!("Tool {} failed: {}", name, e);
                Ok(CallToolResult::error(e.to_string()))
            }
        }
    }
}
