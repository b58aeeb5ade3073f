//! Configuration management.

use anyhow::Context;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::net::{SocketAddr, ToSocketAddrs};
use std::path::PathBuf;
use std::time::Duration;

/// Default upstream endpoint (the Thais demo hub).
pub const DEFAULT_UPSTREAM_URL: &str = "https://demo.thais-hotel.com/hub/api/partner";

/// Default timeout for a single upstream HTTP request.
pub const DEFAULT_UPSTREAM_TIMEOUT_SECS: u64 = 30;

/// Configuration structure that matches the TOML file format.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    server: ServerConfig,
    #[serde(default)]
    upstream: UpstreamConfig,
    #[serde(default)]
    session: SessionConfig,
    #[serde(default)]
    logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Browser origins accepted in addition to localhost.
    #[serde(default)]
    pub allowed_origins: Vec<String>,
}

impl ServerConfig {
    /// Resolve `host:port`. Accepts IPv4, IPv6 (bare or bracketed) and host names.
    pub fn socket_addrs(&self) -> anyhow::Result<Vec<SocketAddr>> {
        let host = self.host.trim_start_matches('[').trim_end_matches(']');
        let addrs: Vec<SocketAddr> = (host, self.port)
            .to_socket_addrs()
            .with_context(|| format!("Invalid bind address {}", self.host))?
            .collect();
        if addrs.is_empty() {
            anyhow::bail!("Bind address {} did not resolve", self.host);
        }
        Ok(addrs)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            allowed_origins: Vec::new(),
        }
    }
}

/// Connection settings for the Thais partner API.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct UpstreamConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    pub username: Option<String>,
    pub password: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            username: None,
            password: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

// Keeps the password out of logs.
impl std::fmt::Debug for UpstreamConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpstreamConfig")
            .field("base_url", &self.base_url)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Expire sessions idle for this long. Unset means sessions live until DELETE.
    pub idle_timeout_secs: Option<u64>,
    /// SSE keep-alive comment interval. Unset means no heartbeat.
    pub stream_keep_alive_secs: Option<u64>,
}

impl SessionConfig {
    pub fn idle_timeout(&self) -> Option<Duration> {
        self.idle_timeout_secs
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
    }

    pub fn stream_keep_alive(&self) -> Option<Duration> {
        self.stream_keep_alive_secs
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Path to log file (if set, logs will be written to file in addition to stdout)
    pub log_file: Option<PathBuf>,
    /// Log level (trace, debug, info, warn, error)
    /// If not set, uses RUST_LOG environment variable or defaults to "info"
    pub log_level: Option<String>,
}

fn default_host() -> String {
    thais_types::DEFAULT_HOST.to_string()
}

fn default_port() -> u16 {
    thais_types::DEFAULT_PORT
}

fn default_base_url() -> String {
    DEFAULT_UPSTREAM_URL.to_string()
}

fn default_timeout_secs() -> u64 {
    DEFAULT_UPSTREAM_TIMEOUT_SECS
}

/// Values given on the command line. These win over every other source.
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub upstream_url: Option<String>,
    pub log_level: Option<String>,
    pub log_file: Option<PathBuf>,
}

/// Application configuration.
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub server: ServerConfig,
    pub upstream: UpstreamConfig,
    pub session: SessionConfig,
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration with full priority chain: CLI args > env vars > config files > defaults.
    ///
    /// Config files are searched in this order:
    /// 1. `.thais-mcp.toml` in current directory
    /// 2. `config.toml` in user config directory (~/.config/thais-mcp/ on Linux)
    pub fn from_figment(cli: CliOverrides) -> anyhow::Result<Self> {
        let local_config = std::env::current_dir()
            .ok()
            .map(|d| d.join(".thais-mcp.toml"));
        let user_config = directories::ProjectDirs::from("", "", "thais-mcp")
            .map(|dirs| dirs.config_dir().join("config.toml"));

        // defaults < user config < local config < env vars < CLI args
        let mut figment = Figment::new().merge(Serialized::defaults(ConfigFile::default()));

        if let Some(ref path) = user_config {
            if path.exists() {
                figment = figment.merge(Toml::file(path));
            }
        }

        if let Some(ref path) = local_config {
            if path.exists() {
                figment = figment.merge(Toml::file(path));
            }
        }

        // THAIS_UPSTREAM_BASE_URL -> upstream.base_url
        figment = figment.merge(
            Env::prefixed("THAIS_").map(|key| key.as_str().replacen('_', ".", 1).into()),
        );

        if let Some(ref host) = cli.host {
            figment = figment.merge(Serialized::default("server.host", host));
        }
        if let Some(port) = cli.port {
            figment = figment.merge(Serialized::default("server.port", port));
        }
        if let Some(ref url) = cli.upstream_url {
            figment = figment.merge(Serialized::default("upstream.base_url", url));
        }
        if let Some(ref level) = cli.log_level {
            figment = figment.merge(Serialized::default("logging.log_level", level));
        }
        if let Some(ref file) = cli.log_file {
            figment = figment.merge(Serialized::default("logging.log_file", file));
        }

        let config_file: ConfigFile = figment.extract()?;

        Ok(Self {
            server: config_file.server,
            upstream: config_file.upstream,
            session: config_file.session,
            logging: config_file.logging,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::fs;
    use tempfile::TempDir;

    const VARS: &[&str] = &[
        "THAIS_SERVER_PORT",
        "THAIS_SERVER_HOST",
        "THAIS_UPSTREAM_BASE_URL",
        "THAIS_UPSTREAM_USERNAME",
        "THAIS_UPSTREAM_PASSWORD",
        "THAIS_SESSION_IDLE_TIMEOUT_SECS",
    ];

    /// Load config from inside `dir` with a clean `THAIS_*` environment.
    fn load_in(dir: &TempDir, env: &[(&str, &str)], cli: CliOverrides) -> Config {
        for var in VARS {
            std::env::remove_var(var);
        }
        for (key, value) in env {
            std::env::set_var(key, value);
        }

        let original_dir = std::env::current_dir().unwrap();
        std::env::set_current_dir(dir).unwrap();

        let config = Config::from_figment(cli);

        // Restore (restore dir before temp_dir is dropped, ignore errors)
        let _ = std::env::set_current_dir(&original_dir);
        for (key, _) in env {
            std::env::remove_var(key);
        }

        config.unwrap()
    }

    #[test]
    #[serial]
    fn test_from_figment_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let config = load_in(&temp_dir, &[], CliOverrides::default());

        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.upstream.base_url, DEFAULT_UPSTREAM_URL);
        assert_eq!(config.upstream.timeout_secs, 30);
        assert!(config.upstream.username.is_none());
        assert!(config.session.idle_timeout().is_none());
        assert!(config.session.stream_keep_alive().is_none());
    }

    #[test]
    #[serial]
    fn test_from_figment_config_file() {
        let temp_dir = TempDir::new().unwrap();
        let config_content = r#"
[server]
port = 7777
allowed_origins = ["https://chat.example.com"]

[upstream]
base_url = "http://localhost:9999/api"
username = "frontdesk"

[session]
idle_timeout_secs = 600
"#;
        fs::write(temp_dir.path().join(".thais-mcp.toml"), config_content).unwrap();

        let config = load_in(&temp_dir, &[], CliOverrides::default());

        assert_eq!(config.server.port, 7777);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.allowed_origins, vec!["https://chat.example.com"]);
        assert_eq!(config.upstream.base_url, "http://localhost:9999/api");
        assert_eq!(config.upstream.username.as_deref(), Some("frontdesk"));
        assert_eq!(config.session.idle_timeout(), Some(Duration::from_secs(600)));
    }

    #[test]
    #[serial]
    fn test_from_figment_env_vars_override_config_file() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join(".thais-mcp.toml"), "[server]\nport = 7777").unwrap();

        let config = load_in(
            &temp_dir,
            &[
                ("THAIS_SERVER_PORT", "8888"),
                ("THAIS_UPSTREAM_BASE_URL", "http://upstream.test"),
                ("THAIS_UPSTREAM_PASSWORD", "secret"),
            ],
            CliOverrides::default(),
        );

        assert_eq!(config.server.port, 8888);
        assert_eq!(config.upstream.base_url, "http://upstream.test");
        assert_eq!(config.upstream.password.as_deref(), Some("secret"));
    }

    #[test]
    #[serial]
    fn test_from_figment_cli_overrides_env_and_config() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join(".thais-mcp.toml"), "[server]\nport = 7777").unwrap();

        let config = load_in(
            &temp_dir,
            &[("THAIS_SERVER_PORT", "8888")],
            CliOverrides {
                port: Some(9999),
                host: Some("0.0.0.0".to_string()),
                log_level: Some("debug".to_string()),
                ..Default::default()
            },
        );

        assert_eq!(config.server.port, 9999);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.logging.log_level.as_deref(), Some("debug"));
    }

    #[test]
    fn test_socket_addrs_accepts_loopback_forms() {
        let server = |host: &str| ServerConfig {
            host: host.to_string(),
            port: 3000,
            allowed_origins: Vec::new(),
        };

        assert_eq!(
            server("127.0.0.1").socket_addrs().unwrap(),
            vec!["127.0.0.1:3000".parse::<SocketAddr>().unwrap()]
        );
        assert_eq!(
            server("::1").socket_addrs().unwrap(),
            vec!["[::1]:3000".parse::<SocketAddr>().unwrap()]
        );
        assert_eq!(
            server("[::1]").socket_addrs().unwrap(),
            vec!["[::1]:3000".parse::<SocketAddr>().unwrap()]
        );

        let localhost = server("localhost").socket_addrs().unwrap();
        assert!(localhost
            .iter()
            .all(|addr| addr.ip().is_loopback() && addr.port() == 3000));

        assert!(server("not a host").socket_addrs().is_err());
    }

    #[test]
    fn test_zero_durations_mean_disabled() {
        let session = SessionConfig {
            idle_timeout_secs: Some(0),
            stream_keep_alive_secs: Some(0),
        };
        assert!(session.idle_timeout().is_none());
        assert!(session.stream_keep_alive().is_none());
    }

    #[test]
    fn test_debug_hides_password() {
        let upstream = UpstreamConfig {
            password: Some("hunter2".to_string()),
            ..Default::default()
        };
        assert!(!format!("{:?}", upstream).contains("hunter2"));
    }
}
