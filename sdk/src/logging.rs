//! Structured logging setup and shared log helpers.
//!
//! The library only emits `tracing` events; installing a subscriber is left to
//! the embedding application, which can call [`init_logging`]:
//!
//! ```rust,ignore
//! use fairai_sdk::logging::{init_logging, LogConfig};
//!
//! init_logging(&LogConfig::default())?;      // text
//! init_logging(&LogConfig::production())?;   // JSON for log aggregation
//! ```

use crate::config::LoggingSection;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Level directive used when `RUST_LOG` is unset
    pub level: String,
    pub format: LogFormat,
    pub timestamps: bool,
    /// Include file and line
    pub source_location: bool,
    /// Emit span enter/exit events
    pub span_events: bool,
    /// ANSI colors (text format only)
    pub ansi_colors: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Text,
            timestamps: true,
            source_location: false,
            span_events: false,
            ansi_colors: true,
        }
    }
}

impl LogConfig {
    pub fn json() -> Self {
        Self {
            format: LogFormat::Json,
            source_location: true,
            ansi_colors: false,
            ..Default::default()
        }
    }

    pub fn production() -> Self {
        Self {
            level: "info,fairai_sdk=info".to_string(),
            ..Self::json()
        }
    }

    pub fn development() -> Self {
        Self {
            level: "debug".to_string(),
            source_location: true,
            span_events: true,
            ..Default::default()
        }
    }

    /// Build from the `[logging]` config section; an unknown format falls back to text
    pub fn from_section(section: &LoggingSection) -> Self {
        let format = section.format.parse().unwrap_or(LogFormat::Text);
        let base = match format {
            LogFormat::Json => Self::json(),
            LogFormat::Text => Self::default(),
        };
        base.with_level(section.level.clone())
    }

    pub fn with_level(mut self, level: impl Into<String>) -> Self {
        self.level = level.into();
        self
    }

    pub fn with_json(mut self) -> Self {
        self.format = LogFormat::Json;
        self.ansi_colors = false;
        self
    }

    pub fn without_timestamps(mut self) -> Self {
        self.timestamps = false;
        self
    }

    fn span_events(&self) -> FmtSpan {
        if self.span_events {
            FmtSpan::NEW | FmtSpan::CLOSE
        } else {
            FmtSpan::NONE
        }
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LogFormat {
    Text,
    Json,
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" | "plain" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            _ => Err(format!("Unknown log format: {}. Use 'text' or 'json'", s)),
        }
    }
}

/// Install a global subscriber. Fails if one is already installed.
pub fn init_logging(config: &LogConfig) -> anyhow::Result<()> {
    let filter =
        EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(&config.level))?;

    let registry = tracing_subscriber::registry().with(filter);

    match config.format {
        LogFormat::Json => registry
            .with(
                fmt::layer()
                    .json()
                    .with_span_events(config.span_events())
                    .with_file(config.source_location)
                    .with_line_number(config.source_location)
                    .with_current_span(true),
            )
            .try_init()?,
        LogFormat::Text if config.timestamps => registry
            .with(
                fmt::layer()
                    .with_ansi(config.ansi_colors)
                    .with_span_events(config.span_events())
                    .with_file(config.source_location)
                    .with_line_number(config.source_location),
            )
            .try_init()?,
        LogFormat::Text => registry
            .with(
                fmt::layer()
                    .without_time()
                    .with_ansi(config.ansi_colors)
                    .with_span_events(config.span_events())
                    .with_file(config.source_location)
                    .with_line_number(config.source_location),
            )
            .try_init()?,
    }

    Ok(())
}

/// Helpers for events logged from more than one place
pub mod helpers {
    use tracing::{debug, info};

    /// A registration dropped out of discovery
    pub fn log_candidate_skipped(registration: &str, operator: &str, reason: &dyn std::fmt::Display) {
        debug!(
            registration = %registration,
            operator = %operator,
            reason = %reason,
            "Operator candidate skipped"
        );
    }

    /// A ledger query returned
    pub fn log_ledger_query(operation: &str, results: usize) {
        debug!(operation = %operation, results, "Ledger query completed");
    }

    /// A payment left the connected wallet
    pub fn log_payment_sent(target: &str, amount: &str, memo: &str, tx_hash: &str) {
        info!(
            target = %target,
            amount = %amount,
            memo = %memo,
            tx_hash = %tx_hash,
            "Stablecoin payment sent"
        );
    }
}
