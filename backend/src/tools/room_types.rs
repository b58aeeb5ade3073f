use super::{ToolError, ToolHandler};
use crate::upstream::BookingApi;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;
use thais_types::{CallToolResult, RoomType, Tool};
use tracing::info;

pub const NAME: &str = "thais_list_room_types";

/// Lookup of room type ids to their labels.
pub struct RoomTypesTool {
    api: Arc<dyn BookingApi>,
}

impl RoomTypesTool {
    pub fn new(api: Arc<dyn BookingApi>) -> Self {
        Self { api }
    }
}

#[async_trait]
impl ToolHandler for RoomTypesTool {
    fn definition(&self) -> Tool {
        Tool {
            name: NAME.to_string(),
            description: "Lookup tool to convert room_type_ids into human-readable names \
                          (e.g., discovering that ID 5 is a \"Deluxe Suite\"). Call this if you \
                          see IDs but don't know the room names."
                .to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {}
            }),
        }
    }

    // Takes no arguments; whatever the client sends is ignored.
    async fn call(&self, _arguments: Value) -> Result<CallToolResult, ToolError> {
        info!("MCP: Listing room types");

        let token = self.api.authenticate().await?;
        let room_types = self.api.fetch_room_types(&token).await?;

        Ok(CallToolResult::text(format_room_types(&room_types)))
    }
}

pub fn format_room_types(room_types: &[RoomType]) -> String {
    if room_types.is_empty() {
        return "No room types found.".to_string();
    }

    let lines: Vec<String> = room_types
        .iter()
        .map(|room| format!(" Type ID {} = {}", room.id, room.label))
        .collect();

    format!("Room type by id\n{}", lines.join("\n"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_room_types() {
        let text = format_room_types(&[
            RoomType {
                id: 5,
                label: "Deluxe Suite".to_string(),
            },
            RoomType {
                id: 6,
                label: "Dorm".to_string(),
            },
        ]);

        assert_eq!(text, "Room type by id\n Type ID 5 = Deluxe Suite\n Type ID 6 = Dorm");
    }

    #[test]
    fn test_format_empty_catalog() {
        assert_eq!(format_room_types(&[]), "No room types found.");
    }
}
