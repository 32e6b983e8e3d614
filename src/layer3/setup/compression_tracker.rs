// Compression Tracker - EMA100 vs SMA100/SMA200 convergence
// Band width, active flag and the regime the squeeze followed

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::core::config::SignalThresholds;
use crate::core::types::Candle;
use crate::layer3::common::moving_average::{ema, sma};

/// Trend the compression formed after
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Regime {
    PostUptrend,
    PostDowntrend,
    Unknown,
    None,
}

impl fmt::Display for Regime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Regime::PostUptrend => "post-uptrend",
            Regime::PostDowntrend => "post-downtrend",
            Regime::Unknown => "unknown",
            Regime::None => "none",
        };
        f.write_str(s)
    }
}

/// `ma1` is EMA100, `ma2` the SMA baseline (100 or 200)
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CompressionResult {
    pub active: bool,
    pub regime: Regime,
    pub band_pct: Option<f64>,
    pub ma1: Option<f64>,
    pub ma2: Option<f64>,
}

impl CompressionResult {
    pub fn inactive() -> Self {
        Self {
            active: false,
            regime: Regime::None,
            band_pct: None,
            ma1: None,
            ma2: None,
        }
    }
}

/// Compression evaluation parameters
#[derive(Debug, Clone, Copy)]
pub struct CompressionDetector {
    band_pct_threshold: f64,
    min_candles: usize,
    regime_lookback: usize,
}

impl CompressionDetector {
    pub fn new(band_pct_threshold: f64, min_candles: usize, regime_lookback: usize) -> Self {
        Self { band_pct_threshold, min_candles, regime_lookback }
    }

    pub fn from_thresholds(thresholds: &SignalThresholds) -> Self {
        Self::new(
            thresholds.compression_band_pct,
            thresholds.compression_min_candles,
            thresholds.regime_lookback,
        )
    }

    /// Evaluate one window. `use_extended_window` swaps the SMA100 baseline
    /// for SMA200 and requires 200 closes.
    pub fn evaluate(&self, closes: &[f64], candles: &[Candle], use_extended_window: bool) -> CompressionResult {
        let baseline_len = if use_extended_window { 200 } else { 100 };
        if closes.len() < baseline_len || candles.len() < self.min_candles {
            return CompressionResult::inactive();
        }

        let (ema100, baseline) = match (ema(closes, 100), sma(closes, baseline_len)) {
            (Some(e), Some(s)) => (e, s),
            _ => return CompressionResult::inactive(),
        };

        let upper = ema100.max(baseline);
        let lower = ema100.min(baseline);
        let band_pct = (upper - lower) / lower * 100.0;
        let active = band_pct < self.band_pct_threshold;

        let regime = if active {
            match sma(closes, self.regime_lookback.min(closes.len())) {
                Some(avg) if avg > upper => Regime::PostUptrend,
                Some(avg) if avg < lower => Regime::PostDowntrend,
                _ => Regime::Unknown,
            }
        } else {
            Regime::None
        };

        CompressionResult {
            active,
            regime,
            band_pct: Some(band_pct),
            ma1: Some(ema100),
            ma2: Some(baseline),
        }
    }
}

/// Pick between the 100- and 200-window results: both active → tighter band
/// (100-window on ties), one active → that one, neither → the 200-window
pub fn select_compression(c100: CompressionResult, c200: CompressionResult) -> CompressionResult {
    match (c100.active, c200.active, c100.band_pct, c200.band_pct) {
        (true, true, Some(b100), Some(b200)) => {
            if b100 <= b200 { c100 } else { c200 }
        }
        (true, _, _, _) => c100,
        _ => c200,
    }
}

/// Percent distance of price from the midpoint of the two MAs
pub fn compression_distance(price: f64, ma1: Option<f64>, ma2: Option<f64>) -> Option<f64> {
    let (a, b) = (ma1?, ma2?);
    let mid = (a.max(b) + a.min(b)) / 2.0;
    Some((price - mid) / mid * 100.0)
}
