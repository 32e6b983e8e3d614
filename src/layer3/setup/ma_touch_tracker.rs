// MA Touch Tracker - Price proximity to key MAs and trend-MA crosses
// Touches are cooldown-gated, crosses are edge-triggered then cooldown-gated

use serde::Serialize;
use std::collections::HashMap;
use tracing::debug;

use crate::core::types::Timeframe;
use crate::layer3::common::moving_average::{MaName, MovingAverages};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MaEventKind {
    Touch,
    Cross,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MaTouch {
    pub symbol: String,
    pub tf: Timeframe,
    pub ma_name: MaName,
    pub ma_value: f64,
    pub timestamp: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MaCross {
    pub symbol: String,
    pub tf: Timeframe,
    pub ma_name: MaName,
    pub ma_value: f64,
    pub crossed_above: bool,
    pub timestamp: i64,
}

type MaKey = (String, Timeframe, MaName);

pub struct MaTouchDetector {
    tracked_timeframes: Vec<Timeframe>,
    touch_pct: f64,
    cooldown_ms: i64,

    // Last "price above MA" per trend MA
    last_positions: HashMap<MaKey, bool>,
    // Event debouncing, independent per kind
    last_event_times: HashMap<(MaKey, MaEventKind), i64>,

    // Statistics
    touches_fired: u64,
    crosses_fired: u64,
}

impl MaTouchDetector {
    pub fn new(tracked_timeframes: Vec<Timeframe>, touch_pct: f64, cooldown_ms: i64) -> Self {
        Self {
            tracked_timeframes,
            touch_pct,
            cooldown_ms,
            last_positions: HashMap::new(),
            last_event_times: HashMap::new(),
            touches_fired: 0,
            crosses_fired: 0,
        }
    }

    /// Check touch and trend MAs against `price`. Unavailable or
    /// non-finite MA values are skipped.
    pub fn check(
        &mut self,
        symbol: &str,
        tf: Timeframe,
        price: f64,
        mas: &MovingAverages,
        now_ms: i64,
    ) -> (Vec<MaTouch>, Vec<MaCross>) {
        let mut touches = Vec::new();
        let mut crosses = Vec::new();

        if !self.tracked_timeframes.contains(&tf) {
            return (touches, crosses);
        }

        for ma_name in MaName::TOUCH {
            let ma_value = match mas.get(ma_name) {
                Some(v) if v.is_finite() => v,
                _ => continue,
            };

            let distance = (price - ma_value).abs() / ma_value;
            if distance <= self.touch_pct {
                let key = (symbol.to_string(), tf, ma_name);
                if self.should_fire(&key, MaEventKind::Touch, now_ms) {
                    self.record(key, MaEventKind::Touch, now_ms);
                    self.touches_fired += 1;
                    debug!(symbol = %symbol, tf = %tf, ma = %ma_name, ma_value, "MA touch");
                    touches.push(MaTouch {
                        symbol: symbol.to_string(),
                        tf,
                        ma_name,
                        ma_value,
                        timestamp: now_ms,
                    });
                }
            }
        }

        for ma_name in MaName::TREND {
            let ma_value = match mas.get(ma_name) {
                Some(v) if v.is_finite() => v,
                _ => continue,
            };

            let key = (symbol.to_string(), tf, ma_name);
            let is_above = price > ma_value;
            let was_above = self.last_positions.insert(key.clone(), is_above);

            if was_above.is_some_and(|was| was != is_above)
                && self.should_fire(&key, MaEventKind::Cross, now_ms)
            {
                self.record(key, MaEventKind::Cross, now_ms);
                self.crosses_fired += 1;
                debug!(symbol = %symbol, tf = %tf, ma = %ma_name, above = is_above, "MA cross");
                crosses.push(MaCross {
                    symbol: symbol.to_string(),
                    tf,
                    ma_name,
                    ma_value,
                    crossed_above: is_above,
                    timestamp: now_ms,
                });
            }
        }

        (touches, crosses)
    }

    /// Strictly more than the cooldown must have passed; never-fired keys
    /// are always eligible
    fn should_fire(&self, key: &MaKey, kind: MaEventKind, now_ms: i64) -> bool {
        match self.last_event_times.get(&(key.clone(), kind)) {
            Some(&last) => now_ms - last > self.cooldown_ms,
            None => true,
        }
    }

    fn record(&mut self, key: MaKey, kind: MaEventKind, now_ms: i64) {
        self.last_event_times.insert((key, kind), now_ms);
    }

    pub fn touches_fired(&self) -> u64 { self.touches_fired }
    pub fn crosses_fired(&self) -> u64 { self.crosses_fired }
}
