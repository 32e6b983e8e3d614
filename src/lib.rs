// Setup Scanner
// Per-symbol, per-timeframe candle buffers and the detectors that turn
// closed candles into flat-run, compression, magnet, MA and alert events

pub mod core;
pub mod layer2;
pub mod layer3;

pub use crate::core::{Candle, EventBus, FlatSide, SeriesKey, Timeframe};
pub use crate::core::{ConfigManager, ScannerConfig, SignalThresholds};
pub use layer2::{CandleStore, KlineParser, ParsedKline};
pub use layer3::{SetupAggregator, SignalEvent};
