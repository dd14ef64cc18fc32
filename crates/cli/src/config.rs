//! Configuration loading from mcp-probe.toml.

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use mcp::{ClientInfo, PROTOCOL_VERSION, ServerConfig, Timings};
use serde::Deserialize;

/// Top-level configuration.
#[derive(Debug, Deserialize)]
pub struct Config {
    /// Server process to launch.
    #[serde(default)]
    pub server: ServerSection,

    /// Settle delays and timeouts.
    #[serde(default)]
    pub timing: TimingConfig,

    /// Identity announced in `initialize`.
    #[serde(default)]
    pub client: ClientSection,
}

/// Server launch configuration.
#[derive(Debug, Deserialize)]
pub struct ServerSection {
    /// Executable name or path.
    #[serde(default = "default_command")]
    pub command: String,

    #[serde(default)]
    pub args: Vec<String>,

    /// Extra environment variables for the server.
    #[serde(default)]
    pub env: HashMap<String, String>,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            command: default_command(),
            args: Vec::new(),
            env: HashMap::new(),
        }
    }
}

/// Timing knobs. Milliseconds unless the name says otherwise.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    pub start_settle_ms: u64,
    pub notify_settle_ms: u64,
    pub shutdown_settle_ms: u64,
    pub kill_timeout_ms: u64,
    /// Per-response timeout of the exec harness.
    pub response_timeout_secs: u64,
    /// Per-response timeout of the smoke harness.
    pub smoke_timeout_secs: u64,
    /// Timeout for a `tools/call` that runs code.
    pub call_timeout_secs: u64,
    /// Pause between the bundled examples.
    pub example_pause_ms: u64,
    /// Pause after printing an execution result.
    pub result_pause_ms: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            start_settle_ms: 500,
            notify_settle_ms: 500,
            shutdown_settle_ms: 500,
            kill_timeout_ms: 2000,
            response_timeout_secs: 10,
            smoke_timeout_secs: 2,
            call_timeout_secs: 30,
            example_pause_ms: 1000,
            result_pause_ms: 500,
        }
    }
}

impl TimingConfig {
    /// Client timings with the given per-response timeout.
    pub fn timings(&self, response_timeout: Duration) -> Timings {
        Timings {
            start_settle: Duration::from_millis(self.start_settle_ms),
            notify_settle: Duration::from_millis(self.notify_settle_ms),
            shutdown_settle: Duration::from_millis(self.shutdown_settle_ms),
            kill_timeout: Duration::from_millis(self.kill_timeout_ms),
            response_timeout,
        }
    }

    pub fn response_timeout(&self) -> Duration {
        Duration::from_secs(self.response_timeout_secs)
    }

    pub fn smoke_timeout(&self) -> Duration {
        Duration::from_secs(self.smoke_timeout_secs)
    }

    pub fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.call_timeout_secs)
    }

    pub fn example_pause(&self) -> Duration {
        Duration::from_millis(self.example_pause_ms)
    }

    pub fn result_pause(&self) -> Duration {
        Duration::from_millis(self.result_pause_ms)
    }
}

/// Client identity configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ClientSection {
    pub name: String,
    pub version: String,
    pub protocol_version: String,
}

impl Default for ClientSection {
    fn default() -> Self {
        let info = ClientInfo::default();
        Self {
            name: info.name,
            version: info.version,
            protocol_version: PROTOCOL_VERSION.to_string(),
        }
    }
}

fn default_command() -> String {
    "python-mcp-server".to_string()
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::parse(&content)
    }

    /// Parse configuration from TOML string.
    pub fn parse(toml: &str) -> Result<Self, ConfigError> {
        toml::from_str(toml).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Create a default configuration.
    pub fn default_config() -> Self {
        Self {
            server: ServerSection::default(),
            timing: TimingConfig::default(),
            client: ClientSection::default(),
        }
    }

    /// Reject values no session can work with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.command.trim().is_empty() {
            return Err(ConfigError::Invalid("server.command is empty".to_string()));
        }
        let timeouts = [
            ("timing.kill_timeout_ms", self.timing.kill_timeout_ms),
            ("timing.response_timeout_secs", self.timing.response_timeout_secs),
            ("timing.smoke_timeout_secs", self.timing.smoke_timeout_secs),
            ("timing.call_timeout_secs", self.timing.call_timeout_secs),
        ];
        if let Some((name, _)) = timeouts.iter().find(|(_, value)| *value == 0) {
            return Err(ConfigError::Invalid(format!("{name} must be positive")));
        }
        if self.client.name.trim().is_empty() {
            return Err(ConfigError::Invalid("client.name is empty".to_string()));
        }
        Ok(())
    }

    /// Launch configuration for the MCP client.
    pub fn server_config(&self) -> ServerConfig {
        ServerConfig {
            name: self.server.command.clone(),
            command: self.server.command.clone(),
            args: self.server.args.clone(),
            env: self.server.env.clone(),
        }
    }

    pub fn client_info(&self) -> ClientInfo {
        ClientInfo {
            name: self.client.name.clone(),
            version: self.client.version.clone(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(String),

    #[error("invalid config: {0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_uses_defaults() {
        let config = Config::parse("").unwrap();
        assert_eq!(config.server.command, "python-mcp-server");
        assert!(config.server.args.is_empty());
        assert_eq!(config.timing.smoke_timeout(), Duration::from_secs(2));
        assert_eq!(config.timing.call_timeout(), Duration::from_secs(30));
        assert_eq!(config.timing.result_pause(), Duration::from_millis(500));
        assert_eq!(config.client.protocol_version, "0.1.0");
        config.validate().unwrap();
    }

    #[test]
    fn parse_full_config() {
        let config = Config::parse(
            r#"
            [server]
            command = "/opt/bin/python-mcp-server"
            args = ["--verbose"]
            env = { PYTHONUNBUFFERED = "1" }

            [timing]
            start_settle_ms = 100
            response_timeout_secs = 5

            [client]
            name = "python-exec-tester"
            version = "1.0.0"
            "#,
        )
        .unwrap();

        assert_eq!(config.server.args, vec!["--verbose"]);
        assert_eq!(config.server.env["PYTHONUNBUFFERED"], "1");
        assert_eq!(config.timing.start_settle_ms, 100);
        assert_eq!(config.timing.notify_settle_ms, 500);
        assert_eq!(config.timing.response_timeout(), Duration::from_secs(5));

        let info = config.client_info();
        assert_eq!(info.name, "python-exec-tester");
        assert_eq!(info.version, "1.0.0");
        assert_eq!(config.client.protocol_version, "0.1.0");

        let server = config.server_config();
        assert_eq!(server.command, "/opt/bin/python-mcp-server");
    }

    #[test]
    fn timings_carry_the_requested_timeout() {
        let timing = TimingConfig::default();
        let timings = timing.timings(Duration::from_secs(2));
        assert_eq!(timings.start_settle, Duration::from_millis(500));
        assert_eq!(timings.kill_timeout, Duration::from_secs(2));
        assert_eq!(timings.response_timeout, Duration::from_secs(2));
    }

    #[test]
    fn rejects_empty_command() {
        let config = Config::parse("[server]\ncommand = \"  \"\n").unwrap();
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn rejects_zero_timeout() {
        let config = Config::parse("[timing]\ncall_timeout_secs = 0\n").unwrap();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("timing.call_timeout_secs"));
    }

    #[test]
    fn unknown_types_fail_to_parse() {
        let err = Config::parse("[timing]\nstart_settle_ms = \"soon\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = Config::load("/nonexistent/mcp-probe.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
