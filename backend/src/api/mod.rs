//! API handlers.

pub mod error;
pub mod health;
pub mod mcp;

pub use error::ApiError;
