use super::{parse_arguments, ToolError, ToolHandler};
use crate::upstream::BookingApi;
use async_trait::async_trait;
use chrono::NaiveDate;
use garde::Validate;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use thais_types::{Availability, CallToolResult, Tool};
use tracing::info;

pub const NAME: &str = "get_room_availability";

/// Arguments of `get_room_availability`.
#[derive(Debug, Deserialize, Validate)]
pub struct AvailabilityArgs {
    /// Check-in date
    #[garde(pattern(r"^\d{4}-\d{2}-\d{2}$"), custom(is_calendar_date))]
    pub from: String,
    /// Check-out date
    #[garde(pattern(r"^\d{4}-\d{2}-\d{2}$"), custom(is_calendar_date))]
    pub to: String,
}

// The pattern alone lets through dates like 2025-13-40.
fn is_calendar_date(value: &str, _context: &()) -> garde::Result {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map(|_| ())
        .map_err(|_| garde::Error::new("not a valid calendar date"))
}

/// Check if rooms are available for a date range.
pub struct RoomAvailabilityTool {
    api: Arc<dyn BookingApi>,
}

impl RoomAvailabilityTool {
    pub fn new(api: Arc<dyn BookingApi>) -> Self {
        Self { api }
    }
}

#[async_trait]
impl ToolHandler for RoomAvailabilityTool {
    fn definition(&self) -> Tool {
        Tool {
            name: NAME.to_string(),
            description: "Check if rooms are available at the hostel for specific dates"
                .to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "from": {
                        "type": "string",
                        "pattern": r"^\d{4}-\d{2}-\d{2}$",
                        "description": "Check-in date in YYYY-MM-DD format (e.g., '2025-03-15')"
                    },
                    "to": {
                        "type": "string",
                        "pattern": r"^\d{4}-\d{2}-\d{2}$",
                        "description": "Check-out date in YYYY-MM-DD format (e.g., '2025-03-25')"
                    }
                },
                "required": ["from", "to"]
            }),
        }
    }

    async fn call(&self, arguments: Value) -> Result<CallToolResult, ToolError> {
        let args: AvailabilityArgs = parse_arguments(arguments)?;
        info!("MCP: Checking availability from {} to {}", args.from, args.to);

        let token = self.api.authenticate().await?;
        let rooms = self
            .api
            .fetch_availability(&args.from, &args.to, &token)
            .await?;

        Ok(CallToolResult::text(format_availability(
            &args.from, &args.to, &rooms,
        )))
    }
}

/// Human-readable summary of the rooms that still have availability.
pub fn format_availability(from: &str, to: &str, rooms: &[Availability]) -> String {
    if rooms.is_empty() {
        return "No availability data found for these dates.".to_string();
    }

    let summary: Vec<String> = rooms
        .iter()
        .filter(|r| r.is_available())
        .map(|r| {
            format!(
                "- Room Type ID {}: {} rooms left (ID: {})",
                r.room_type_id, r.availability, r.id
            )
        })
        .collect();

    if summary.is_empty() {
        return "Sorry, there is no availability for the requested dates.".to_string();
    }

    format!(
        "Availability found from {} to {}:\n{}",
        from,
        to,
        summary.join("\n")
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn room(room_type_id: i64, availability: i64, id: i64) -> Availability {
        Availability {
            room_type_id,
            availability,
            id,
        }
    }

    #[test]
    fn test_format_no_data() {
        assert_eq!(
            format_availability("2025-03-15", "2025-03-25", &[]),
            "No availability data found for these dates."
        );
    }

    #[test]
    fn test_format_fully_booked() {
        assert_eq!(
            format_availability("2025-03-15", "2025-03-25", &[room(1, 0, 10), room(2, 0, 11)]),
            "Sorry, there is no availability for the requested dates."
        );
    }

    #[test]
    fn test_format_lists_only_available_rooms() {
        let text = format_availability(
            "2025-03-15",
            "2025-03-25",
            &[room(1, 3, 10), room(2, 0, 11), room(5, 1, 12)],
        );

        assert_eq!(
            text,
            "Availability found from 2025-03-15 to 2025-03-25:\n\
             - Room Type ID 1: 3 rooms left (ID: 10)\n\
             - Room Type ID 5: 1 rooms left (ID: 12)"
        );
    }

    #[test]
    fn test_args_validation() {
        assert!(parse_arguments::<AvailabilityArgs>(
            json!({"from": "2025-03-15", "to": "2025-03-25"})
        )
        .is_ok());
        assert!(parse_arguments::<AvailabilityArgs>(json!({"from": "2025-03-15"})).is_err());
        assert!(
            parse_arguments::<AvailabilityArgs>(json!({"from": "2025-3-15", "to": "2025-03-25"}))
                .is_err()
        );
        assert!(
            parse_arguments::<AvailabilityArgs>(json!({"from": "2025-02-30", "to": "2025-03-25"}))
                .is_err()
        );
    }
}
