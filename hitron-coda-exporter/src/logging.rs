//! Tracing setup.

use clap::{Args, ValueEnum};
use tracing_subscriber::EnvFilter;

/// HTTP client crates that log every connection at debug.
const QUIET_TARGETS: &[&str] = &["hyper", "hyper_util", "reqwest", "rustls"];

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    /// Human-readable text format (default).
    #[default]
    Text,
    /// Structured JSON format.
    Json,
}

/// Logging flags.
#[derive(Args, Debug, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[arg(long = "log-level", default_value = "info")]
    pub level: String,

    /// Log output format.
    #[arg(long = "log-format", value_enum, default_value_t = LogFormat::Text)]
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::default(),
        }
    }
}

impl LoggingConfig {
    /// Filter directives for `level`.
    ///
    /// The HTTP client stack stays at `warn` unless the level is `trace`, so
    /// `--log-level debug` shows scrape phases without per-connection noise.
    pub fn directives(&self) -> String {
        let level = self.level.trim().to_ascii_lowercase();
        if level == "trace" {
            return level;
        }
        QUIET_TARGETS
            .iter()
            .fold(level, |acc, target| format!("{acc},{target}=warn"))
    }
}

/// Initialize tracing with the given configuration.
///
/// `RUST_LOG`, when set, takes precedence over the flags.
pub fn init_tracing(config: &LoggingConfig) -> anyhow::Result<()> {
    use tracing_subscriber::{fmt, prelude::*};

    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(config.directives())
            .map_err(|e| anyhow::anyhow!("Invalid log level {:?}: {}", config.level, e))?,
    };

    match config.format {
        LogFormat::Text => tracing_subscriber::registry()
            .with(fmt::layer())
            .with(filter)
            .try_init(),
        LogFormat::Json => tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(filter)
            .try_init(),
    }
    .map_err(|e| anyhow::anyhow!("Failed to initialize tracing: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct Cli {
        #[command(flatten)]
        logging: LoggingConfig,
    }

    #[test]
    fn test_logging_defaults() {
        let cli = Cli::parse_from(["exporter"]);
        assert_eq!(cli.logging, LoggingConfig::default());
        assert_eq!(cli.logging.format, LogFormat::Text);
    }

    #[test]
    fn test_logging_flags() {
        let cli = Cli::parse_from(["hce", "--log-level", "debug", "--log-format", "json"]);
        assert_eq!(cli.logging.level, "debug");
        assert_eq!(cli.logging.format, LogFormat::Json);

        assert!(Cli::try_parse_from(["exporter", "--log-format", "xml"]).is_err());
    }

    #[test]
    fn test_directives_quiet_http_client() {
        let config = LoggingConfig {
            level: "DEBUG".to_string(),
            format: LogFormat::Text,
        };
        assert_eq!(
            config.directives(),
            "debug,hyper=warn,hyper_util=warn,reqwest=warn,rustls=warn"
        );
        assert!(EnvFilter::try_new(config.directives()).is_ok());

        let trace = LoggingConfig {
            level: "trace".to_string(),
            format: LogFormat::Text,
        };
        assert_eq!(trace.directives(), "trace");
    }
}
