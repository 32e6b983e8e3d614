// Flat Run Tracker - Bullish/bearish flat candles on the base timeframe
// Stats are recomputed from the bounded window on every call

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use crate::core::types::{Candle, FlatSide};

// ============================================================================
// Flat predicates
// ============================================================================

/// Relative float equality: |a - b| <= tolerance * max(1, |a|, |b|)
pub fn approx_eq(a: f64, b: f64, tolerance: f64) -> bool {
    let scale = 1.0_f64.max(a.abs()).max(b.abs());
    (a - b).abs() <= tolerance * scale
}

/// High equals the body top: no upper wick
pub fn is_bullish_flat(candle: &Candle, tolerance: f64) -> bool {
    approx_eq(candle.high, candle.body_high(), tolerance)
}

/// Low equals the body bottom: no lower wick
pub fn is_bearish_flat(candle: &Candle, tolerance: f64) -> bool {
    approx_eq(candle.body_low(), candle.low, tolerance)
}

/// Flat side of a candle; bullish wins when both predicates hold
pub fn flat_side(candle: &Candle, tolerance: f64) -> Option<FlatSide> {
    if is_bullish_flat(candle, tolerance) {
        Some(FlatSide::Bullish)
    } else if is_bearish_flat(candle, tolerance) {
        Some(FlatSide::Bearish)
    } else {
        None
    }
}

/// Longest run of consecutive `true` flags
pub fn best_consecutive(flags: &[bool]) -> u32 {
    let mut best = 0;
    let mut current = 0;
    for &flag in flags {
        if flag {
            current += 1;
            best = best.max(current);
        } else {
            current = 0;
        }
    }
    best
}

// ============================================================================
// Rating
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum FlatRating {
    #[serde(rename = "-")]
    None,
    #[serde(rename = "C")]
    C,
    #[serde(rename = "B")]
    B,
    #[serde(rename = "A")]
    A,
    #[serde(rename = "A+")]
    APlus,
}

impl FlatRating {
    pub fn as_str(&self) -> &'static str {
        match self {
            FlatRating::None => "-",
            FlatRating::C => "C",
            FlatRating::B => "B",
            FlatRating::A => "A",
            FlatRating::APlus => "A+",
        }
    }
}

impl fmt::Display for FlatRating {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A run of 3 dominates; otherwise the total flat count grades C/B/A
pub fn rating_from(up: u32, down: u32, best_cu: u32, best_cd: u32) -> FlatRating {
    let total = up + down;
    let best = best_cu.max(best_cd);

    if best >= 3 {
        FlatRating::APlus
    } else if total >= 4 {
        FlatRating::A
    } else if total >= 3 {
        FlatRating::B
    } else if total >= 2 {
        FlatRating::C
    } else {
        FlatRating::None
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FlatStats {
    pub up: u32,
    pub down: u32,
    pub best_cu: u32,
    pub best_cd: u32,
    pub rating: FlatRating,
}

impl FlatStats {
    pub fn best(&self) -> u32 {
        self.best_cu.max(self.best_cd)
    }

    fn from_window(window: &[Candle], tolerance: f64) -> Self {
        let up_flags: Vec<bool> = window.iter().map(|c| is_bullish_flat(c, tolerance)).collect();
        let down_flags: Vec<bool> = window.iter().map(|c| is_bearish_flat(c, tolerance)).collect();

        let up = up_flags.iter().filter(|&&f| f).count() as u32;
        let down = down_flags.iter().filter(|&&f| f).count() as u32;
        let best_cu = best_consecutive(&up_flags);
        let best_cd = best_consecutive(&down_flags);

        Self {
            up,
            down,
            best_cu,
            best_cd,
            rating: rating_from(up, down, best_cu, best_cd),
        }
    }
}

// ============================================================================
// Tracker
// ============================================================================

/// Per-symbol window of the most recent closed base-timeframe candles
pub struct FlatRunDetector {
    windows: HashMap<String, Vec<Candle>>,
    window_size: usize,
    tolerance: f64,

    // Statistics
    updates_processed: u64,
}

impl FlatRunDetector {
    pub fn new(window_size: usize, tolerance: f64) -> Self {
        Self {
            windows: HashMap::new(),
            window_size,
            tolerance,
            updates_processed: 0,
        }
    }

    /// Closed candles enter the window; unclosed ones only recompute
    pub fn update(&mut self, symbol: &str, candle: &Candle) -> FlatStats {
        if !candle.closed {
            return self.compute(symbol);
        }
        self.updates_processed += 1;

        let window = self.windows.entry(symbol.to_string()).or_default();
        window.push(*candle);
        while window.len() > self.window_size {
            window.remove(0);
        }

        self.compute(symbol)
    }

    pub fn compute(&self, symbol: &str) -> FlatStats {
        FlatStats::from_window(self.window(symbol), self.tolerance)
    }

    pub fn window(&self, symbol: &str) -> &[Candle] {
        self.windows.get(symbol).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn updates_processed(&self) -> u64 { self.updates_processed }
}
