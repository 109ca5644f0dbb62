//! Logging setup shared by the docqa binaries.
//!
//! Log lines go to stderr so that command output on stdout stays clean.
//! `RUST_LOG` selects what is logged (default `info`) and
//! `DOCQA_LOG_FORMAT=json` switches to one JSON object per line.

use std::fmt;
use std::str::FromStr;

use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Environment variable selecting the [`LogFormat`].
pub const LOG_FORMAT_ENV: &str = "DOCQA_LOG_FORMAT";

/// Filter used when `RUST_LOG` is unset or invalid.
pub const DEFAULT_FILTER: &str = "info";

/// Output format for log lines.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable single-line output.
    #[default]
    Text,
    /// Newline-delimited JSON.
    Json,
}

impl LogFormat {
    /// Read [`LOG_FORMAT_ENV`], falling back to [`LogFormat::Text`].
    pub fn from_env() -> Self {
        std::env::var(LOG_FORMAT_ENV).ok().and_then(|v| v.parse().ok()).unwrap_or_default()
    }
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" | "pretty" | "" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            other => Err(format!("unknown log format '{other}' (expected 'text' or 'json')")),
        }
    }
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text => f.write_str("text"),
            Self::Json => f.write_str("json"),
        }
    }
}

/// Install the global subscriber using [`LogFormat::from_env`].
///
/// Calling this more than once is harmless; only the first call installs.
pub fn init_telemetry(service_name: &str) {
    init_with_format(service_name, LogFormat::from_env());
}

/// Install the global subscriber with an explicit format.
pub fn init_with_format(service_name: &str, format: LogFormat) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let registry = tracing_subscriber::registry().with(filter);

    let installed = match format {
        LogFormat::Text => registry
            .with(tracing_subscriber::fmt::layer().with_target(false).with_writer(std::io::stderr))
            .try_init(),
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .try_init(),
    };

    match installed {
        Ok(()) => tracing::info!(service = service_name, log_format = %format, "telemetry initialized"),
        Err(_) => tracing::debug!(service = service_name, "global subscriber already installed"),
    }
}
