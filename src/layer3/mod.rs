// Layer 3 - Setup Detection
// Turns closed candles into debounced setup events

// Common utilities (moving averages, event names)
pub mod common;

// Flats, compression, magnets, MA touches, alerts
pub mod setup;

pub use setup::{SetupAggregator, SetupAggregatorStats, SignalEvent};
