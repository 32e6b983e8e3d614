// Structured Logging for the Setup Scanner
// tracing + tracing-subscriber, initialised once per process

use std::sync::Once;
use tracing::Level;
use tracing_subscriber::EnvFilter;

use crate::core::config::MonitoringConfig;

static INIT: Once = Once::new();

/// Map a textual level to a tracing level, defaulting to INFO
pub fn parse_level(log_level: &str) -> Level {
    match log_level.to_uppercase().as_str() {
        "TRACE" => Level::TRACE,
        "DEBUG" => Level::DEBUG,
        "INFO" => Level::INFO,
        "WARN" | "WARNING" => Level::WARN,
        "ERROR" => Level::ERROR,
        _ => Level::INFO,
    }
}

/// Setup structured logging for the entire application.
///
/// `RUST_LOG` directives are honoured on top of the configured level.
/// Logs go to stderr so stdout stays free for the event stream.
pub fn setup_logging(log_level: Option<&str>, json_format: Option<bool>) {
    let log_level_str = log_level.unwrap_or("INFO");
    let json_format = json_format.unwrap_or(false);
    let level = parse_level(log_level_str);

    INIT.call_once(|| {
        let filter = EnvFilter::from_default_env().add_directive(level.into());

        let initialised = if json_format {
            tracing_subscriber::fmt()
                .json()
                .with_target(true)
                .with_thread_ids(true)
                .with_writer(std::io::stderr)
                .with_env_filter(filter)
                .try_init()
        } else {
            tracing_subscriber::fmt()
                .with_target(true)
                .with_writer(std::io::stderr)
                .with_env_filter(filter)
                .try_init()
        };

        if initialised.is_ok() {
            tracing::info!(
                log_level = %log_level_str,
                json = json_format,
                "Logging initialized"
            );
        }
    });
}

/// Setup logging from the monitoring section of the config
pub fn setup_logging_from(config: &MonitoringConfig) {
    setup_logging(Some(&config.log_level), Some(config.json_logs));
}
