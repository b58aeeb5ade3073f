//! Upstream Thais partner API.
//!
//! The tools only see the [`BookingApi`] trait; [`ThaisClient`] is the
//! reqwest-backed implementation used by the server.

mod client;

pub use client::ThaisClient;

use async_trait::async_trait;
use reqwest::StatusCode;
use thais_types::{Availability, RoomType};

/// Error type for upstream calls.
#[derive(Debug, thiserror::Error)]
pub enum UpstreamError {
    #[error("Upstream credentials are not configured")]
    MissingCredentials,

    #[error("Can't get access token (HTTP {0})")]
    AuthRejected(StatusCode),

    #[error("Can't get room availability (HTTP {0})")]
    Availability(StatusCode),

    #[error("Can't get room types (HTTP {0})")]
    RoomTypes(StatusCode),

    #[error("Invalid upstream URL: {0}")]
    InvalidUrl(String),

    #[error("Upstream request failed: {0}")]
    Request(#[from] reqwest::Error),
}

pub type Result<T> = std::result::Result<T, UpstreamError>;

/// Authenticated access to the booking API.
#[async_trait]
pub trait BookingApi: Send + Sync {
    /// Log in and return a bearer token.
    async fn authenticate(&self) -> Result<String>;

    /// Current availabilities between two `YYYY-MM-DD` dates.
    async fn fetch_availability(
        &self,
        from: &str,
        to: &str,
        token: &str,
    ) -> Result<Vec<Availability>>;

    /// The hotel's room type catalog.
    async fn fetch_room_types(&self, token: &str) -> Result<Vec<RoomType>>;
}
