//! Operator configuration loaded from `screeps-multimeter.toml`.
//!
//! ```toml
//! server = "127.0.0.1:21027"
//! token = "0123abcd"
//! shard = "shard3"
//! plugins = ["./macros.toml"]
//!
//! [reconnect]
//! initial_ms = 500
//! max_ms = 30000
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::{MultimeterError, Result};

/// Default file name looked up when no path is given.
pub const DEFAULT_CONFIG_FILE: &str = "screeps-multimeter.toml";

/// Top-level multimeter configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct MultimeterConfig {
    /// Relay address (`host:port`).
    #[serde(default = "default_server")]
    pub server: String,
    /// Auth token forwarded to the relay.
    #[serde(default)]
    pub token: Option<String>,
    /// Shard attached to every forwarded console command.
    #[serde(default)]
    pub shard: Option<String>,
    /// Operator plugins: catalog names or paths relative to this file.
    #[serde(default)]
    pub plugins: Vec<String>,
    /// History file handed to the terminal layer.
    #[serde(default = "default_history_file")]
    pub history_file: PathBuf,
    /// Reconnect backoff for the transport.
    #[serde(default)]
    pub reconnect: ReconnectConfig,
    /// Path the configuration was read from, if any.
    #[serde(skip)]
    pub source: Option<PathBuf>,
}

/// Exponential reconnect backoff bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct ReconnectConfig {
    #[serde(default = "default_initial_ms")]
    pub initial_ms: u64,
    #[serde(default = "default_max_ms")]
    pub max_ms: u64,
}

fn default_server() -> String {
    "127.0.0.1:21027".to_string()
}
fn default_history_file() -> PathBuf {
    PathBuf::from(".screeps-multimeter.history")
}
fn default_initial_ms() -> u64 {
    500
}
fn default_max_ms() -> u64 {
    30_000
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_ms: default_initial_ms(),
            max_ms: default_max_ms(),
        }
    }
}

impl ReconnectConfig {
    pub fn initial(&self) -> Duration {
        Duration::from_millis(self.initial_ms)
    }

    pub fn max(&self) -> Duration {
        Duration::from_millis(self.max_ms.max(self.initial_ms))
    }
}

impl Default for MultimeterConfig {
    fn default() -> Self {
        Self {
            server: default_server(),
            token: None,
            shard: None,
            plugins: Vec::new(),
            history_file: default_history_file(),
            reconnect: ReconnectConfig::default(),
            source: None,
        }
    }
}

impl MultimeterConfig {
    /// Parse a configuration from TOML text.
    pub fn from_toml(text: &str) -> Result<Self> {
        toml::from_str(text)
            .map_err(|e| MultimeterError::Config(format!("{DEFAULT_CONFIG_FILE}: {e}")))
    }

    /// Read a configuration file, remembering its location.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| MultimeterError::Config(format!("{}: {e}", path.display())))?;
        let mut config: Self = toml::from_str(&text)
            .map_err(|e| MultimeterError::Config(format!("{}: {e}", path.display())))?;
        config.source = Some(path.to_path_buf());
        Ok(config)
    }

    /// Load `path` if it exists, otherwise fall back to defaults.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            log::info!("{} not found, using default configuration", path.display());
            Ok(Self {
                source: Some(path.to_path_buf()),
                ..Self::default()
            })
        }
    }

    /// Directory that relative plugin paths are resolved against.
    pub fn base_dir(&self) -> PathBuf {
        self.source
            .as_deref()
            .and_then(Path::parent)
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."))
    }

    /// Resolve a plugin path relative to the configuration file.
    pub fn resolve_relative(&self, name: &str) -> PathBuf {
        let path = Path::new(name);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir().join(path)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_toml_uses_defaults() {
        let config = MultimeterConfig::from_toml("").unwrap();
        assert_eq!(config.server, "127.0.0.1:21027");
        assert!(config.token.is_none());
        assert!(config.shard.is_none());
        assert!(config.plugins.is_empty());
        assert_eq!(config.history_file, PathBuf::from(".screeps-multimeter.history"));
        assert_eq!(config.reconnect, ReconnectConfig::default());
    }

    #[test]
    fn full_toml() {
        let config = MultimeterConfig::from_toml(
            r#"
            server = "relay.local:9000"
            token = "abc"
            shard = "shard3"
            plugins = ["macros.toml", "extra"]
            history_file = "/tmp/hist"

            [reconnect]
            initial_ms = 100
            max_ms = 800
            "#,
        )
        .unwrap();
        assert_eq!(config.server, "relay.local:9000");
        assert_eq!(config.token.as_deref(), Some("abc"));
        assert_eq!(config.shard.as_deref(), Some("shard3"));
        assert_eq!(config.plugins, vec!["macros.toml", "extra"]);
        assert_eq!(config.reconnect.initial(), Duration::from_millis(100));
        assert_eq!(config.reconnect.max(), Duration::from_millis(800));
    }

    #[test]
    fn reconnect_max_never_below_initial() {
        let r = ReconnectConfig {
            initial_ms: 1000,
            max_ms: 10,
        };
        assert_eq!(r.max(), Duration::from_millis(1000));
    }

    #[test]
    fn malformed_toml_is_config_error() {
        let err = MultimeterConfig::from_toml("plugins = 3").unwrap_err();
        assert!(matches!(err, MultimeterError::Config(_)));
    }

    #[test]
    fn load_remembers_source_and_resolves_relative() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("screeps-multimeter.toml");
        std::fs::write(&path, "shard = \"shard0\"\n").unwrap();

        let config = MultimeterConfig::load(&path).unwrap();
        assert_eq!(config.source.as_deref(), Some(path.as_path()));
        assert_eq!(config.base_dir(), dir.path());
        assert_eq!(config.resolve_relative("macros.toml"), dir.path().join("macros.toml"));
    }

    #[test]
    fn absolute_plugin_path_is_kept() {
        let config = MultimeterConfig::default();
        let abs = if cfg!(windows) { "C:\\plugins\\x.toml" } else { "/plugins/x.toml" };
        assert_eq!(config.resolve_relative(abs), PathBuf::from(abs));
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.toml");
        let config = MultimeterConfig::load_or_default(&path).unwrap();
        assert_eq!(config.server, default_server());
        assert_eq!(config.base_dir(), dir.path());
    }

    #[test]
    fn load_missing_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(MultimeterConfig::load(&dir.path().join("absent.toml")).is_err());
    }

    #[test]
    fn default_base_dir_is_cwd() {
        assert_eq!(MultimeterConfig::default().base_dir(), PathBuf::from("."));
    }
}
