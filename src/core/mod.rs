// Core Module - Foundational types, config, logging, events

pub mod types;
pub mod config;
pub mod logger;
pub mod events;

// Re-export commonly used items for convenience
pub use types::{Candle, FlatSide, SeriesKey, Timeframe};
pub use config::{
    ScannerConfig, SignalThresholds, MonitoringConfig,
    ConfigManager, ConfigSummary, ConfigError,
};
pub use logger::{setup_logging, setup_logging_from};
pub use events::{Event, EventPriority, EventBus, EventBusStatsSnapshot};
