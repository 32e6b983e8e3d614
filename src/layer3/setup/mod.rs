// Setup Module - Stateful setup detectors and their orchestrator

pub mod flat_tracker;
pub mod compression_tracker;
pub mod magnet_tracker;
pub mod ma_touch_tracker;
pub mod trigger_manager;
pub mod setup_aggregator;

pub use flat_tracker::{FlatRating, FlatRunDetector, FlatStats};
pub use compression_tracker::{CompressionDetector, CompressionResult, Regime};
pub use magnet_tracker::{Magnet, MagnetStore, MagnetTracker, NearestMagnets};
pub use ma_touch_tracker::{MaCross, MaTouch, MaTouchDetector};
pub use trigger_manager::TriggerManager;
pub use setup_aggregator::{SetupAggregator, SetupAggregatorStats, SignalEvent};
