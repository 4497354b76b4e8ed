//! Structured logging setup
//!
//! Logs go to stderr so stdout stays clean for detection output and the path of the
//! written build file.
//!
//! Level resolution, highest priority first: `--log-level`, `-v`/`-q`,
//! `STACKPACK_LOG_LEVEL`, then `info`. `RUST_LOG` adds per-target directives on top.
//! `STACKPACK_LOG_JSON=true` switches to JSON lines.
//!
//! ```no_run
//! use stackpack::util::logging;
//!
//! logging::init_from_env();
//! tracing::info!(repo = "demo", "Analyzing repository");
//! ```

use std::env;
use std::sync::Once;
use tracing::Level;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

static INIT: Once = Once::new();

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    pub level: Level,
    pub use_json: bool,
    /// Include the module target (e.g. `stackpack::pipeline`) in each line
    pub include_target: bool,
    pub include_location: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            use_json: false,
            include_target: true,
            include_location: false,
        }
    }
}

impl LoggingConfig {
    pub fn with_level(level: Level) -> Self {
        Self {
            level,
            ..Default::default()
        }
    }

    /// Resolve the configuration from command-line flags and the environment.
    pub fn resolve(log_level: Option<&str>, verbose: bool, quiet: bool) -> Self {
        let level = if let Some(level) = log_level.and_then(parse_level) {
            level
        } else if verbose {
            Level::DEBUG
        } else if quiet {
            Level::ERROR
        } else {
            env::var("STACKPACK_LOG_LEVEL")
                .ok()
                .and_then(|l| parse_level(&l))
                .unwrap_or(Level::INFO)
        };

        let use_json = env::var("STACKPACK_LOG_JSON")
            .ok()
            .and_then(|v| v.parse::<bool>().ok())
            .unwrap_or(false);

        Self {
            level,
            use_json,
            include_location: level == Level::TRACE,
            ..Default::default()
        }
    }
}

/// Case-insensitive level name, `None` for anything else.
///
/// ```
/// use stackpack::util::logging::parse_level;
/// use tracing::Level;
///
/// assert_eq!(parse_level("DEBUG"), Some(Level::DEBUG));
/// assert_eq!(parse_level("loud"), None);
/// ```
pub fn parse_level(level_str: &str) -> Option<Level> {
    match level_str.trim().to_lowercase().as_str() {
        "trace" => Some(Level::TRACE),
        "debug" => Some(Level::DEBUG),
        "info" => Some(Level::INFO),
        "warn" | "warning" => Some(Level::WARN),
        "error" => Some(Level::ERROR),
        _ => None,
    }
}

/// Install the global subscriber. Only the first call has an effect.
pub fn init_logging(config: LoggingConfig) {
    INIT.call_once(|| {
        let mut filter = EnvFilter::from_default_env();
        if let Ok(directive) = format!("stackpack={}", config.level).parse() {
            filter = filter.add_directive(directive);
        }

        if env::var("RUST_LOG").is_err() {
            for quiet in ["h2=warn", "hyper=warn", "reqwest=warn", "bollard=warn"] {
                if let Ok(directive) = quiet.parse() {
                    filter = filter.add_directive(directive);
                }
            }
        }

        let layer = fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(config.include_target)
            .with_file(config.include_location)
            .with_line_number(config.include_location);

        if config.use_json {
            tracing_subscriber::registry()
                .with(filter)
                .with(layer.json())
                .init();
        } else {
            tracing_subscriber::registry().with(filter).with(layer).init();
        }
    });
}

/// Initialise from `STACKPACK_LOG_LEVEL`, `STACKPACK_LOG_JSON` and `RUST_LOG` only.
pub fn init_from_env() {
    init_logging(LoggingConfig::resolve(None, false, false));
}
