//! Models of the Thais partner API.

use serde::{Deserialize, Serialize};

/// Body of `POST /login`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// Response of `POST /login`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginResponse {
    pub token: String,
}

/// One entry of `GET /hotel/apr/availabilities/currents`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Availability {
    pub room_type_id: i64,
    pub availability: i64,
    pub id: i64,
}

impl Availability {
    /// Whether at least one room of this type is still free.
    pub fn is_available(&self) -> bool {
        self.availability > 0
    }
}

/// One entry of `GET /hotel/room-types`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomType {
    pub id: i64,
    pub label: String,
}
