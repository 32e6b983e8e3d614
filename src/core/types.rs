// Core Type Definitions for the Setup Scanner
// Candles, timeframes and the composite keys detector state is addressed by

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ============================================================================
// Timeframe
// ============================================================================

/// Kline interval as delivered by Binance streams.
///
/// Ordered from shortest to longest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Timeframe {
    #[serde(rename = "1m")]
    M1,
    #[serde(rename = "3m")]
    M3,
    #[serde(rename = "5m")]
    M5,
    #[serde(rename = "15m")]
    M15,
    #[serde(rename = "30m")]
    M30,
    #[serde(rename = "1h")]
    H1,
    #[serde(rename = "2h")]
    H2,
    #[serde(rename = "4h")]
    H4,
    #[serde(rename = "6h")]
    H6,
    #[serde(rename = "8h")]
    H8,
    #[serde(rename = "12h")]
    H12,
    #[serde(rename = "1d")]
    D1,
    #[serde(rename = "3d")]
    D3,
    #[serde(rename = "1w")]
    W1,
}

impl Timeframe {
    pub const ALL: [Timeframe; 14] = [
        Timeframe::M1,
        Timeframe::M3,
        Timeframe::M5,
        Timeframe::M15,
        Timeframe::M30,
        Timeframe::H1,
        Timeframe::H2,
        Timeframe::H4,
        Timeframe::H6,
        Timeframe::H8,
        Timeframe::H12,
        Timeframe::D1,
        Timeframe::D3,
        Timeframe::W1,
    ];

    /// Binance kline interval string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::M1 => "1m",
            Self::M3 => "3m",
            Self::M5 => "5m",
            Self::M15 => "15m",
            Self::M30 => "30m",
            Self::H1 => "1h",
            Self::H2 => "2h",
            Self::H4 => "4h",
            Self::H6 => "6h",
            Self::H8 => "8h",
            Self::H12 => "12h",
            Self::D1 => "1d",
            Self::D3 => "3d",
            Self::W1 => "1w",
        }
    }

    /// Parse from a Binance interval string.
    pub fn from_interval(s: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|tf| tf.as_str() == s)
    }

    /// Candle duration in milliseconds.
    pub fn duration_ms(&self) -> i64 {
        const MINUTE: i64 = 60_000;
        match self {
            Self::M1 => MINUTE,
            Self::M3 => 3 * MINUTE,
            Self::M5 => 5 * MINUTE,
            Self::M15 => 15 * MINUTE,
            Self::M30 => 30 * MINUTE,
            Self::H1 => 60 * MINUTE,
            Self::H2 => 120 * MINUTE,
            Self::H4 => 240 * MINUTE,
            Self::H6 => 360 * MINUTE,
            Self::H8 => 480 * MINUTE,
            Self::H12 => 720 * MINUTE,
            Self::D1 => 1_440 * MINUTE,
            Self::D3 => 4_320 * MINUTE,
            Self::W1 => 10_080 * MINUTE,
        }
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Timeframe {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_interval(s).ok_or_else(|| format!("Invalid Timeframe: '{}'", s))
    }
}

// ============================================================================
// Candle
// ============================================================================

/// OHLC candle. `time` is the open time in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub time: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume: Option<f64>,
    pub closed: bool,
}

impl Candle {
    pub fn new(time: i64, open: f64, high: f64, low: f64, close: f64, closed: bool) -> Self {
        Self { time, open, high, low, close, volume: None, closed }
    }

    pub fn with_volume(mut self, volume: f64) -> Self {
        self.volume = Some(volume);
        self
    }

    pub fn body_high(&self) -> f64 { self.open.max(self.close) }
    pub fn body_low(&self) -> f64 { self.open.min(self.close) }

    /// All price fields are finite numbers.
    pub fn is_finite(&self) -> bool {
        self.open.is_finite() && self.high.is_finite() && self.low.is_finite() && self.close.is_finite()
    }
}

impl fmt::Display for Candle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Candle(t={}, o={}, h={}, l={}, c={}, closed={})",
            self.time, self.open, self.high, self.low, self.close, self.closed
        )
    }
}

// ============================================================================
// Flat side
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FlatSide {
    Bullish,
    Bearish,
}

impl fmt::Display for FlatSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FlatSide::Bullish => write!(f, "BULLISH"),
            FlatSide::Bearish => write!(f, "BEARISH"),
        }
    }
}

// ============================================================================
// Composite keys
// ============================================================================

/// (symbol, timeframe) key for per-series state.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SeriesKey {
    pub symbol: String,
    pub tf: Timeframe,
}

impl SeriesKey {
    pub fn new(symbol: &str, tf: Timeframe) -> Self {
        Self { symbol: symbol.to_string(), tf }
    }
}

impl fmt::Display for SeriesKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.symbol, self.tf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeframe_roundtrip_strings() {
        for tf in Timeframe::ALL {
            assert_eq!(Timeframe::from_interval(tf.as_str()), Some(tf));
            assert_eq!(tf.to_string().parse::<Timeframe>(), Ok(tf));
        }
        assert!(Timeframe::from_interval("7m").is_none());
        assert!("".parse::<Timeframe>().is_err());
    }

    #[test]
    fn test_timeframe_serde_uses_interval_names() {
        assert_eq!(serde_json::to_string(&Timeframe::M15).unwrap(), "\"15m\"");
        let tf: Timeframe = serde_json::from_str("\"4h\"").unwrap();
        assert_eq!(tf, Timeframe::H4);
        assert_eq!(Timeframe::H4.duration_ms(), 14_400_000);
    }

    #[test]
    fn test_candle_body_and_finiteness() {
        let c = Candle::new(0, 10.0, 12.0, 9.0, 11.0, true);
        assert_eq!(c.body_high(), 11.0);
        assert_eq!(c.body_low(), 10.0);
        assert!(c.is_finite());

        let bad = Candle::new(0, f64::NAN, 12.0, 9.0, 11.0, true);
        assert!(!bad.is_finite());
    }

    #[test]
    fn test_flat_side_serializes_uppercase() {
        assert_eq!(serde_json::to_string(&FlatSide::Bullish).unwrap(), "\"BULLISH\"");
        assert_eq!(FlatSide::Bearish.to_string(), "BEARISH");
    }

    #[test]
    fn test_series_key_display() {
        let key = SeriesKey::new("BTCUSDT", Timeframe::H1);
        assert_eq!(key.to_string(), "BTCUSDT_1h");
    }
}
