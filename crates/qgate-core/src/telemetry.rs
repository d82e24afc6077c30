//! Subscriber setup for hosts embedding the gate.
//!
//! [`LoggingConfig`] is the `[logging]` section of the gate configuration.
//! [`init_tracing`] turns it into a global subscriber whose filter scopes
//! the configured level to the qgate crates and keeps everything else at
//! `warn`. A `RUST_LOG` in the environment replaces that filter entirely.
//!
//! Only the first call installs a subscriber; later calls return `false`.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt as fmt_layer, EnvFilter};

use crate::domain::{QgateError, Result};

/// Crates whose events follow the configured level.
const QGATE_TARGETS: [&str; 2] = ["qgate_core", "qgate_state"];

/// Line format of emitted events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    /// Newline-delimited JSON.
    Json,
}

impl FromStr for LogFormat {
    type Err = QgateError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            other => Err(QgateError::InvalidConfig(format!(
                "unknown log format {other:?}, expected \"text\" or \"json\""
            ))),
        }
    }
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogFormat::Text => f.write_str("text"),
            LogFormat::Json => f.write_str("json"),
        }
    }
}

/// `[logging]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `trace`, `debug`, `info`, `warn` or `error`.
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Text,
        }
    }
}

impl LoggingConfig {
    /// Parsed verbosity.
    pub fn level(&self) -> Result<Level> {
        self.level.trim().parse().map_err(|_| {
            QgateError::InvalidConfig(format!("logging.level {:?} is not a level", self.level))
        })
    }

    /// Filter directives used when `RUST_LOG` is unset.
    pub fn filter_directives(&self) -> Result<String> {
        let level = self.level()?.as_str().to_ascii_lowercase();
        let mut directives = vec!["warn".to_string()];
        directives.extend(QGATE_TARGETS.iter().map(|t| format!("{t}={level}")));
        Ok(directives.join(","))
    }
}

/// Install the global subscriber described by `config`.
///
/// Returns `true` when this call installed it.
pub fn init_tracing(config: &LoggingConfig) -> Result<bool> {
    let directives = config.filter_directives()?;
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directives));

    let installed = match config.format {
        LogFormat::Json => tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer::layer().with_target(false).json())
            .try_init()
            .is_ok(),
        LogFormat::Text => tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer::layer().with_target(false))
            .try_init()
            .is_ok(),
    };
    Ok(installed)
}
