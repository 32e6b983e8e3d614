// Trigger Manager - Composite setup alert gate
// Confirmation counter + per-symbol cooldown; compression edges keyed per series

use std::collections::HashMap;
use tracing::info;

use crate::core::config::SignalThresholds;
use crate::core::types::{SeriesKey, Timeframe};

#[derive(Debug, Clone, Default)]
struct TriggerState {
    last_alert_time: Option<i64>,
    last_flat_count: u32,
    consecutive_closed_candles: u32,
}

pub struct TriggerManager {
    states: HashMap<String, TriggerState>,
    compression_states: HashMap<SeriesKey, bool>,

    cooldown_ms: i64,
    confirmation_candles: u32,
    min_bullish_flats: u32,

    // Statistics
    alerts_fired: u64,
}

impl TriggerManager {
    pub fn new(cooldown_ms: i64, confirmation_candles: u32, min_bullish_flats: u32) -> Self {
        Self {
            states: HashMap::new(),
            compression_states: HashMap::new(),
            cooldown_ms,
            confirmation_candles,
            min_bullish_flats,
            alerts_fired: 0,
        }
    }

    pub fn from_thresholds(thresholds: &SignalThresholds) -> Self {
        Self::new(
            thresholds.alert_cooldown_ms,
            thresholds.alert_confirmation_candles,
            thresholds.alert_min_bullish_flats,
        )
    }

    /// Fires once conditions have held for the confirmation count and the
    /// symbol's cooldown has elapsed. Unclosed candles never mutate state.
    pub fn should_fire_alert(
        &mut self,
        symbol: &str,
        compression_active: bool,
        bullish_flats: u32,
        is_closed: bool,
        now_ms: i64,
    ) -> bool {
        if !is_closed {
            return false;
        }

        let state = self.states.entry(symbol.to_string()).or_default();
        let conditions_met = compression_active && bullish_flats >= self.min_bullish_flats;

        if conditions_met {
            state.consecutive_closed_candles += 1;
        } else {
            state.consecutive_closed_candles = 0;
        }

        let cooldown_passed = state
            .last_alert_time
            .map_or(true, |last| now_ms - last >= self.cooldown_ms);

        if conditions_met && cooldown_passed && state.consecutive_closed_candles >= self.confirmation_candles {
            state.last_alert_time = Some(now_ms);
            state.last_flat_count = bullish_flats;
            self.alerts_fired += 1;
            info!(symbol = %symbol, bullish_flats, "Setup alert fired");
            return true;
        }

        false
    }

    /// True only when the stored flag for (symbol, tf) flips; starts false
    pub fn compression_changed(&mut self, symbol: &str, tf: Timeframe, active: bool) -> bool {
        let last = self
            .compression_states
            .entry(SeriesKey::new(symbol, tf))
            .or_insert(false);
        if *last != active {
            *last = active;
            return true;
        }
        false
    }

    pub fn flat_count_changed(&mut self, symbol: &str, count: u32) -> bool {
        let state = self.states.entry(symbol.to_string()).or_default();
        if state.last_flat_count != count {
            state.last_flat_count = count;
            return true;
        }
        false
    }

    /// Clear alert state for a symbol already being tracked
    pub fn reset(&mut self, symbol: &str) {
        if let Some(state) = self.states.get_mut(symbol) {
            *state = TriggerState::default();
        }
    }

    /// Milliseconds until the symbol may alert again; 0 when eligible
    pub fn time_until_next_alert(&self, symbol: &str, now_ms: i64) -> i64 {
        self.states
            .get(symbol)
            .and_then(|s| s.last_alert_time)
            .map_or(0, |last| (self.cooldown_ms - (now_ms - last)).max(0))
    }

    pub fn alerts_fired(&self) -> u64 { self.alerts_fired }
}

/// Dashboard title and body for a fired setup alert
pub fn alert_text(symbol: &str, bullish_flats: u32) -> (String, String) {
    (
        "A+ Setup Detected".to_string(),
        format!(
            "{}: 15m compression active with {} consecutive bullish flats on 5m",
            symbol, bullish_flats
        ),
    )
}
