// Moving Average Library
// Pure SMA / EMA / SMMA over an ordered close series.
// Every function returns None below its required sample count.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Arithmetic mean of the last `length` values
pub fn sma(values: &[f64], length: usize) -> Option<f64> {
    if length == 0 || values.len() < length {
        return None;
    }
    let window = &values[values.len() - length..];
    Some(window.iter().sum::<f64>() / length as f64)
}

/// EMA over the last `length` values, seeded with the oldest value of that
/// window (not an SMA seed), k = 2 / (length + 1)
pub fn ema(values: &[f64], length: usize) -> Option<f64> {
    if length == 0 || values.len() < length {
        return None;
    }
    let k = 2.0 / (length as f64 + 1.0);
    let window = &values[values.len() - length..];

    let mut e = window[0];
    for value in &window[1..] {
        e = value * k + e * (1.0 - k);
    }
    Some(e)
}

/// Wilder smoothing. Seeds with the SMA of the last `length` values when no
/// previous value is given, otherwise folds the newest value into `previous`.
pub fn smma(values: &[f64], length: usize, previous: Option<f64>) -> Option<f64> {
    if length == 0 || values.len() < length {
        return None;
    }
    match previous {
        None => sma(values, length),
        Some(prev) => {
            let newest = values[values.len() - 1];
            Some((prev * (length as f64 - 1.0) + newest) / length as f64)
        }
    }
}

// ============================================================================
// MA Snapshot
// ============================================================================

/// All MAs published per closed candle; `None` serializes as null
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MovingAverages {
    pub sma20: Option<f64>,
    pub sma100: Option<f64>,
    pub sma200: Option<f64>,
    pub sma300: Option<f64>,
    pub ema13: Option<f64>,
    pub ema21: Option<f64>,
    pub ema34: Option<f64>,
    pub ema55: Option<f64>,
    pub ema89: Option<f64>,
    pub ema100: Option<f64>,
    pub smma99: Option<f64>,
}

pub fn all_moving_averages(closes: &[f64]) -> MovingAverages {
    MovingAverages {
        sma20: sma(closes, 20),
        sma100: sma(closes, 100),
        sma200: sma(closes, 200),
        sma300: sma(closes, 300),
        ema13: ema(closes, 13),
        ema21: ema(closes, 21),
        ema34: ema(closes, 34),
        ema55: ema(closes, 55),
        ema89: ema(closes, 89),
        ema100: ema(closes, 100),
        smma99: smma(closes, 99, None),
    }
}

impl MovingAverages {
    pub fn get(&self, name: MaName) -> Option<f64> {
        match name {
            MaName::Ema100 => self.ema100,
            MaName::Sma100 => self.sma100,
            MaName::Sma200 => self.sma200,
            MaName::Sma300 => self.sma300,
            MaName::Ema13 => self.ema13,
            MaName::Ema21 => self.ema21,
            MaName::Ema34 => self.ema34,
        }
    }
}

// ============================================================================
// Named MAs for touch / cross detection
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum MaName {
    #[serde(rename = "EMA100")]
    Ema100,
    #[serde(rename = "SMA100")]
    Sma100,
    #[serde(rename = "SMA200")]
    Sma200,
    #[serde(rename = "SMA300")]
    Sma300,
    #[serde(rename = "EMA13")]
    Ema13,
    #[serde(rename = "EMA21")]
    Ema21,
    #[serde(rename = "EMA34")]
    Ema34,
}

impl MaName {
    /// MAs checked for price proximity
    pub const TOUCH: [MaName; 4] = [MaName::Ema100, MaName::Sma100, MaName::Sma200, MaName::Sma300];
    /// MAs checked for price crossing sides
    pub const TREND: [MaName; 3] = [MaName::Ema13, MaName::Ema21, MaName::Ema34];

    pub fn as_str(&self) -> &'static str {
        match self {
            MaName::Ema100 => "EMA100",
            MaName::Sma100 => "SMA100",
            MaName::Sma200 => "SMA200",
            MaName::Sma300 => "SMA300",
            MaName::Ema13 => "EMA13",
            MaName::Ema21 => "EMA21",
            MaName::Ema34 => "EMA34",
        }
    }
}

impl fmt::Display for MaName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
