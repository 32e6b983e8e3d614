// HTF Magnet Tracker - Unfilled flat-candle opens on higher timeframes
// Magnets fill permanently when price comes within the fill band

use serde::Serialize;
use std::collections::HashMap;
use tracing::debug;

use crate::core::types::{Candle, FlatSide, SeriesKey, Timeframe};
use super::flat_tracker::flat_side;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Magnet {
    pub tf: Timeframe,
    pub side: FlatSide,
    pub level: f64,
    pub born_time: i64,
    pub filled: bool,
    pub filled_time: Option<i64>,
}

/// Magnets for one (symbol, timeframe), oldest first
#[derive(Debug, Clone)]
pub struct MagnetStore {
    pub tf: Timeframe,
    pub magnets: Vec<Magnet>,
    pub last_added: Option<Magnet>,
}

impl MagnetStore {
    fn new(tf: Timeframe) -> Self {
        Self { tf, magnets: Vec::new(), last_added: None }
    }

    pub fn unfilled(&self) -> impl Iterator<Item = &Magnet> {
        self.magnets.iter().filter(|m| !m.filled)
    }

    pub fn unfilled_count(&self) -> usize {
        self.unfilled().count()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct NearestMagnets {
    pub above: Option<Magnet>,
    pub below: Option<Magnet>,
    pub above_dist: Option<f64>,
    pub below_dist: Option<f64>,
}

pub struct MagnetTracker {
    stores: HashMap<SeriesKey, MagnetStore>,
    capacity: usize,
    fill_pct: f64,
    tolerance: f64,

    // Statistics
    magnets_created: u64,
    magnets_filled: u64,
}

impl MagnetTracker {
    pub fn new(capacity: usize, fill_pct: f64, tolerance: f64) -> Self {
        Self {
            stores: HashMap::new(),
            capacity,
            fill_pct,
            tolerance,
            magnets_created: 0,
            magnets_filled: 0,
        }
    }

    /// Add a magnet if the closed candle is flat, then fill every unfilled
    /// magnet within the fill band of `current_price`
    pub fn update(
        &mut self,
        symbol: &str,
        tf: Timeframe,
        candle: &Candle,
        current_price: f64,
        now_ms: i64,
    ) -> &MagnetStore {
        let store = self
            .stores
            .entry(SeriesKey::new(symbol, tf))
            .or_insert_with(|| MagnetStore::new(tf));

        if !candle.closed {
            return store;
        }

        if let Some(side) = flat_side(candle, self.tolerance) {
            let magnet = Magnet {
                tf,
                side,
                level: candle.open,
                born_time: candle.time,
                filled: false,
                filled_time: None,
            };
            store.magnets.push(magnet);
            while store.magnets.len() > self.capacity {
                store.magnets.remove(0);
            }
            store.last_added = Some(magnet);
            self.magnets_created += 1;
            debug!(symbol = %symbol, tf = %tf, side = %side, level = magnet.level, "Magnet added");
        }

        for magnet in store.magnets.iter_mut().filter(|m| !m.filled) {
            let pct_diff = (current_price - magnet.level).abs() / magnet.level;
            if pct_diff <= self.fill_pct {
                magnet.filled = true;
                magnet.filled_time = Some(now_ms);
                if store.last_added.is_some_and(|l| l.born_time == magnet.born_time && l.level == magnet.level) {
                    store.last_added = Some(*magnet);
                }
                self.magnets_filled += 1;
                debug!(symbol = %symbol, tf = %tf, level = magnet.level, "Magnet filled");
            }
        }

        store
    }

    /// Closest unfilled magnet strictly above and strictly below price
    pub fn nearest(&self, symbol: &str, tf: Timeframe, current_price: f64) -> NearestMagnets {
        let mut above: Option<Magnet> = None;
        let mut below: Option<Magnet> = None;

        if let Some(store) = self.store(symbol, tf) {
            for magnet in store.unfilled() {
                if magnet.level > current_price {
                    if above.map_or(true, |a| magnet.level < a.level) {
                        above = Some(*magnet);
                    }
                } else if magnet.level < current_price
                    && below.map_or(true, |b| magnet.level > b.level)
                {
                    below = Some(*magnet);
                }
            }
        }

        NearestMagnets {
            above,
            below,
            above_dist: above.map(|m| (m.level - current_price) / current_price * 100.0),
            below_dist: below.map(|m| (current_price - m.level) / current_price * 100.0),
        }
    }

    pub fn unfilled(&self, symbol: &str, tf: Timeframe) -> Vec<Magnet> {
        self.store(symbol, tf)
            .map(|s| s.unfilled().copied().collect())
            .unwrap_or_default()
    }

    pub fn store(&self, symbol: &str, tf: Timeframe) -> Option<&MagnetStore> {
        self.stores.get(&SeriesKey::new(symbol, tf))
    }

    pub fn magnets_created(&self) -> u64 { self.magnets_created }
    pub fn magnets_filled(&self) -> u64 { self.magnets_filled }
}
