//! Application state management.

use crate::config::{Config, SessionConfig};
use crate::mcp::SessionStore;
use crate::tools::ToolRegistry;
use crate::upstream::ThaisClient;
use std::sync::Arc;
use std::time::Duration;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    /// Live MCP sessions
    sessions: SessionStore,
    /// Tools exposed to every session
    tools: ToolRegistry,
    /// SSE keep-alive interval (none means no heartbeat)
    stream_keep_alive: Option<Duration>,
    /// Extra browser origins accepted besides localhost
    allowed_origins: Vec<String>,
}

impl AppState {
    pub fn new(tools: ToolRegistry, session: &SessionConfig, allowed_origins: Vec<String>) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                sessions: SessionStore::new(tools.clone()),
                tools,
                stream_keep_alive: session.stream_keep_alive(),
                allowed_origins,
            }),
        }
    }

    /// Build state backed by the real Thais client.
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let client = ThaisClient::new(&config.upstream)?;
        Ok(Self::new(
            ToolRegistry::with_booking_api(Arc::new(client)),
            &config.session,
            config.server.allowed_origins.clone(),
        ))
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.inner.sessions
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.inner.tools
    }

    pub fn stream_keep_alive(&self) -> Option<Duration> {
        self.inner.stream_keep_alive
    }

    pub fn allowed_origins(&self) -> &[String] {
        &self.inner.allowed_origins
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_config_registers_tools() {
        let state = AppState::from_config(&Config::default()).unwrap();
        assert_eq!(state.tools().len(), 2);
        assert!(state.sessions().is_empty());
        assert!(state.stream_keep_alive().is_none());
    }

    #[test]
    fn test_keep_alive_from_session_config() {
        let session = SessionConfig {
            stream_keep_alive_secs: Some(15),
            ..Default::default()
        };
        let state = AppState::new(ToolRegistry::default(), &session, Vec::new());
        assert_eq!(state.stream_keep_alive(), Some(Duration::from_secs(15)));
    }
}
