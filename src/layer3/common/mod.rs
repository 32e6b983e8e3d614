// Layer3 Common Module - Shared utilities for setup detectors

pub mod event_types;
pub mod moving_average;

pub use event_types::*;
pub use moving_average::{all_moving_averages, ema, sma, smma, MaName, MovingAverages};
