// Candle Store - Rolling close/candle history per (symbol, timeframe)
// plus the latest live price per symbol

use std::collections::HashMap;
use std::fmt;

use crate::core::types::{Candle, SeriesKey, Timeframe};

// ============================================================================
// Candle Buffer
// ============================================================================

/// Bounded, time-ordered history for one series.
///
/// Closes and full candles are kept with separate capacities; the oldest
/// entry is evicted first. Gaps are neither detected nor repaired.
#[derive(Debug, Clone)]
pub struct CandleBuffer {
    closes: Vec<f64>,
    candles: Vec<Candle>,
    close_capacity: usize,
    candle_capacity: usize,
}

impl CandleBuffer {
    pub fn new(close_capacity: usize, candle_capacity: usize) -> Self {
        Self {
            closes: Vec::with_capacity(close_capacity),
            candles: Vec::with_capacity(candle_capacity),
            close_capacity,
            candle_capacity,
        }
    }

    /// Append a candle. An in-progress tail with the same open time is
    /// replaced in place instead of growing the history.
    pub fn push(&mut self, candle: Candle) {
        if let Some(tail) = self.candles.last_mut() {
            if !tail.closed && tail.time == candle.time {
                *tail = candle;
                if let Some(last_close) = self.closes.last_mut() {
                    *last_close = candle.close;
                }
                return;
            }
        }

        self.closes.push(candle.close);
        if self.closes.len() > self.close_capacity {
            self.closes.remove(0);
        }

        self.candles.push(candle);
        if self.candles.len() > self.candle_capacity {
            self.candles.remove(0);
        }
    }

    pub fn closes(&self) -> &[f64] {
        &self.closes
    }

    pub fn candles(&self) -> &[Candle] {
        &self.candles
    }

    pub fn last_candle(&self) -> Option<&Candle> {
        self.candles.last()
    }

    pub fn len(&self) -> usize {
        self.closes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.closes.is_empty()
    }
}

// ============================================================================
// Candle Store
// ============================================================================

#[derive(Debug, Clone)]
pub struct CandleStoreStats {
    pub series_count: usize,
    pub symbols_priced: usize,
    pub candles_appended: u64,
}

impl fmt::Display for CandleStoreStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "CandleStore(series={}, priced={}, appended={})",
            self.series_count, self.symbols_priced, self.candles_appended
        )
    }
}

/// Buffers keyed by (symbol, timeframe), created on first append
pub struct CandleStore {
    buffers: HashMap<SeriesKey, CandleBuffer>,
    live_prices: HashMap<String, f64>,
    close_capacity: usize,
    candle_capacity: usize,
    candles_appended: u64,
}

impl CandleStore {
    pub fn new(close_capacity: usize, candle_capacity: usize) -> Self {
        Self {
            buffers: HashMap::new(),
            live_prices: HashMap::new(),
            close_capacity,
            candle_capacity,
            candles_appended: 0,
        }
    }

    /// Record a candle for the series and update the symbol's live price.
    /// Never fails.
    pub fn append(&mut self, symbol: &str, tf: Timeframe, candle: Candle) {
        let (close_capacity, candle_capacity) = (self.close_capacity, self.candle_capacity);
        self.buffers
            .entry(SeriesKey::new(symbol, tf))
            .or_insert_with(|| CandleBuffer::new(close_capacity, candle_capacity))
            .push(candle);

        self.live_prices.insert(symbol.to_string(), candle.close);
        self.candles_appended += 1;
    }

    pub fn buffer(&self, symbol: &str, tf: Timeframe) -> Option<&CandleBuffer> {
        self.buffers.get(&SeriesKey::new(symbol, tf))
    }

    pub fn closes(&self, symbol: &str, tf: Timeframe) -> &[f64] {
        self.buffer(symbol, tf).map(CandleBuffer::closes).unwrap_or(&[])
    }

    pub fn candles(&self, symbol: &str, tf: Timeframe) -> &[Candle] {
        self.buffer(symbol, tf).map(CandleBuffer::candles).unwrap_or(&[])
    }

    /// Latest close seen on any timeframe, closed or in progress
    pub fn live_price(&self, symbol: &str) -> Option<f64> {
        self.live_prices.get(symbol).copied()
    }

    pub fn get_stats(&self) -> CandleStoreStats {
        CandleStoreStats {
            series_count: self.buffers.len(),
            symbols_priced: self.live_prices.len(),
            candles_appended: self.candles_appended,
        }
    }
}
