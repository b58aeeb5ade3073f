//! Protocol-level failures of a session.

/// A message that the session cannot accept in its current state.
///
/// These are surfaced to the client as `-32600` envelopes and never
/// change the session state.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    #[error("Bad Request: Server not initialized")]
    Uninitialized,

    #[error("Bad Request: Session has been terminated")]
    SessionTerminated,

    #[error("Invalid Request: Server already initialized")]
    AlreadyInitialized,

    #[error("Conflict: Only one SSE stream is allowed per session")]
    StreamConflict,

    #[error("Invalid Request: {0}")]
    InvalidRequest(String),
}

impl ProtocolError {
    /// The rejection used for unknown, missing or unresolvable session ids.
    pub fn unknown_session() -> Self {
        ProtocolError::InvalidRequest("Missing or invalid session ID".to_string())
    }
}
