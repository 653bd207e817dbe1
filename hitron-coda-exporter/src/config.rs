//! Device configuration and the store that serves it to scrapes.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use hitron_coda::Credentials;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Config file not found: {}", path.display())]
    NotFound { path: PathBuf },
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config: {0}")]
    Parse(#[from] json5::Error),
    #[error("Failed to render config: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Connection settings for the modem.
///
/// Every field defaults to the empty string, so an empty document is a valid
/// (if useless) configuration.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    /// Address or base URL of the modem.
    pub host: String,
    pub username: String,
    pub password: String,
}

impl fmt::Debug for DeviceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceConfig")
            .field("host", &self.host)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

impl DeviceConfig {
    /// Load configuration from a JSON5 file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => ConfigError::NotFound {
                path: path.to_path_buf(),
            },
            _ => ConfigError::Io(e),
        })?;
        Self::parse(&content)
    }

    /// Parse configuration from a JSON5 string.
    ///
    /// A document holding only whitespace and comments yields the default
    /// config.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        if is_blank_document(content) {
            return Ok(Self::default());
        }
        Ok(json5::from_str(content)?)
    }

    /// Render as a document [`DeviceConfig::parse`] accepts.
    pub fn render(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Borrow the settings as device credentials.
    pub fn credentials(&self) -> Credentials<'_> {
        Credentials {
            host: &self.host,
            username: &self.username,
            password: &self.password,
        }
    }
}

/// Holder of the active [`DeviceConfig`].
///
/// Readers get an `Arc` snapshot and never see a partially replaced value.
/// The write lock is held only for the pointer swap.
#[derive(Debug, Default)]
pub struct ConfigStore {
    current: RwLock<Arc<DeviceConfig>>,
}

impl ConfigStore {
    pub fn new(config: DeviceConfig) -> Self {
        Self {
            current: RwLock::new(Arc::new(config)),
        }
    }

    /// Create a store from a config file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        DeviceConfig::load(path).map(Self::new)
    }

    /// Snapshot of the active configuration.
    pub fn get(&self) -> Arc<DeviceConfig> {
        Arc::clone(&self.current.read())
    }

    /// Swap in a new configuration.
    pub fn replace(&self, config: DeviceConfig) {
        *self.current.write() = Arc::new(config);
    }

    /// Re-read `path`. On error the active configuration is left untouched.
    pub fn reload<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let config = DeviceConfig::load(path)?;
        self.replace(config);
        Ok(())
    }
}

/// Whether `content` has nothing but whitespace and JSON5 comments.
fn is_blank_document(content: &str) -> bool {
    let mut rest = content.trim_start();
    while !rest.is_empty() {
        if let Some(line) = rest.strip_prefix("//") {
            rest = line.split_once('\n').map_or("", |(_, next)| next);
        } else if let Some(block) = rest.strip_prefix("/*") {
            match block.split_once("*/") {
                Some((_, next)) => rest = next,
                // unterminated comment, let the parser report it
                None => return false,
            }
        } else {
            return false;
        }
        rest = rest.trim_start();
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn sample() -> DeviceConfig {
        DeviceConfig {
            host: "192.168.0.1".to_string(),
            username: "cusadmin".to_string(),
            password: "s3cret".to_string(),
        }
    }

    #[test]
    fn test_parse_full_config() {
        let json5 = r#"
        {
            // modem web interface
            host: "192.168.0.1",
            username: "cusadmin",
            password: "s3cret",
        }
        "#;

        let config = DeviceConfig::parse(json5).unwrap();
        assert_eq!(config, sample());
    }

    #[test]
    fn test_parse_empty_config() {
        assert_eq!(DeviceConfig::parse("").unwrap(), DeviceConfig::default());
        assert_eq!(
            DeviceConfig::parse("  \n\t ").unwrap(),
            DeviceConfig::default()
        );
        assert_eq!(DeviceConfig::parse("{}").unwrap(), DeviceConfig::default());
    }

    #[test]
    fn test_parse_comment_only_config() {
        assert_eq!(
            DeviceConfig::parse("// host: \"192.168.0.1\"\n").unwrap(),
            DeviceConfig::default()
        );
        assert_eq!(
            DeviceConfig::parse("/* disabled\n  username: \"cusadmin\" */\n// trailing").unwrap(),
            DeviceConfig::default()
        );
        assert!(matches!(
            DeviceConfig::parse("/* unterminated"),
            Err(ConfigError::Parse(_))
        ));
        // comments around a real document are still parsed
        let config = DeviceConfig::parse("// modem\n{ host: \"modem.lan\" } // end").unwrap();
        assert_eq!(config.host, "modem.lan");
    }

    #[test]
    fn test_parse_partial_config() {
        let config = DeviceConfig::parse(r#"{ host: "modem.lan" }"#).unwrap();
        assert_eq!(config.host, "modem.lan");
        assert_eq!(config.username, "");
        assert_eq!(config.password, "");
    }

    #[test]
    fn test_parse_malformed() {
        let result = DeviceConfig::parse("{ host: ");
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_render_round_trip() {
        for config in [
            sample(),
            DeviceConfig::default(),
            DeviceConfig {
                host: "https://[2001:db8::1]:8443".to_string(),
                username: "user \"quoted\"".to_string(),
                password: "pa\\ss\nword".to_string(),
            },
        ] {
            let rendered = config.render().unwrap();
            assert_eq!(DeviceConfig::parse(&rendered).unwrap(), config);
        }
    }

    #[test]
    fn test_debug_redacts_password() {
        let out = format!("{:?}", sample());
        assert!(out.contains("cusadmin"));
        assert!(!out.contains("s3cret"));
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let result = DeviceConfig::load(dir.path().join("absent.json5"));
        assert!(matches!(result, Err(ConfigError::NotFound { .. })));
    }

    #[test]
    fn test_store_reload_swaps_on_success() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ host: "10.0.0.1" }}"#).unwrap();

        let store = ConfigStore::new(sample());
        let before = store.get();
        store.reload(file.path()).unwrap();

        assert_eq!(store.get().host, "10.0.0.1");
        // Earlier snapshots are unaffected.
        assert_eq!(before.host, "192.168.0.1");
    }

    #[test]
    fn test_store_reload_keeps_config_on_failure() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{ host: ").unwrap();

        let store = ConfigStore::new(sample());
        assert!(store.reload(file.path()).is_err());
        assert_eq!(*store.get(), sample());

        assert!(matches!(
            store.reload("/nonexistent/hitron_coda.json5"),
            Err(ConfigError::NotFound { .. })
        ));
        assert_eq!(*store.get(), sample());
    }

    #[test]
    fn test_credentials_borrow_config() {
        let config = sample();
        let creds = config.credentials();
        assert_eq!(creds.host, "192.168.0.1");
        assert_eq!(creds.password, "s3cret");
    }
}
