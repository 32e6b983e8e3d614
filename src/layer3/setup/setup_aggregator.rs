// Setup Aggregator - Per-candle orchestration of all setup detectors
// Buffers → MAs → flats / touches / compression / alert / magnets → EventBus

use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::core::config::{ScannerConfig, SignalThresholds};
use crate::core::events::{Event, EventBus, EventPriority};
use crate::core::types::{Candle, SeriesKey, Timeframe};
use crate::layer2::candle_store::CandleStore;
use crate::layer3::common::event_types::*;
use crate::layer3::common::moving_average::{all_moving_averages, MovingAverages};

use super::compression_tracker::{compression_distance, select_compression, CompressionDetector, Regime};
use super::flat_tracker::{FlatRating, FlatRunDetector};
use super::ma_touch_tracker::{MaCross, MaTouch, MaTouchDetector};
use super::magnet_tracker::{Magnet, MagnetTracker};
use super::trigger_manager::{alert_text, TriggerManager};

const EVENT_SOURCE: &str = "setup_aggregator";

// ============================================================================
// Outbound events
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FlatSignalEvent {
    pub symbol: String,
    pub tf: Timeframe,
    pub up: u32,
    pub down: u32,
    #[serde(rename = "bestCU")]
    pub best_cu: u32,
    #[serde(rename = "bestCD")]
    pub best_cd: u32,
    pub best: u32,
    pub rating: FlatRating,
    pub timestamp: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MaDataEvent {
    pub symbol: String,
    pub tf: Timeframe,
    pub values: MovingAverages,
    pub timestamp: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompressionEvent {
    pub symbol: String,
    pub tf: Timeframe,
    pub on: bool,
    pub band_pct: Option<f64>,
    pub regime: Regime,
    pub ma1: Option<f64>,
    pub ma2: Option<f64>,
    pub timestamp: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompressionDataEvent {
    pub symbol: String,
    pub tf: Timeframe,
    pub distance: Option<f64>,
    pub timestamp: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HtfMagnetsEvent {
    pub symbol: String,
    pub tf: Timeframe,
    pub last_added: Option<Magnet>,
    pub nearest_above: Option<Magnet>,
    pub nearest_below: Option<Magnet>,
    pub above_dist: Option<f64>,
    pub below_dist: Option<f64>,
    pub unfilled_count: usize,
    pub timestamp: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlertEvent {
    pub symbol: String,
    pub title: String,
    pub body: String,
    #[serde(rename = "compression15m")]
    pub compression_15m: bool,
    #[serde(rename = "bullishFlats5m")]
    pub bullish_flats_5m: u32,
    pub grade: String,
    pub timestamp: i64,
}

/// Every message the pipeline emits, tagged with its wire name
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum SignalEvent {
    #[serde(rename = "flatSignal")]
    FlatSignal(FlatSignalEvent),
    #[serde(rename = "maData")]
    MaData(MaDataEvent),
    #[serde(rename = "maTouch")]
    MaTouch(MaTouch),
    #[serde(rename = "maCross")]
    MaCross(MaCross),
    #[serde(rename = "compression")]
    Compression(CompressionEvent),
    #[serde(rename = "compressionData")]
    CompressionData(CompressionDataEvent),
    #[serde(rename = "htfMagnets")]
    HtfMagnets(HtfMagnetsEvent),
    #[serde(rename = "alert")]
    Alert(AlertEvent),
}

impl SignalEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            SignalEvent::FlatSignal(_) => FLAT_SIGNAL,
            SignalEvent::MaData(_) => MA_DATA,
            SignalEvent::MaTouch(_) => MA_TOUCH,
            SignalEvent::MaCross(_) => MA_CROSS,
            SignalEvent::Compression(_) => COMPRESSION,
            SignalEvent::CompressionData(_) => COMPRESSION_DATA,
            SignalEvent::HtfMagnets(_) => HTF_MAGNETS,
            SignalEvent::Alert(_) => ALERT,
        }
    }

    pub fn priority(&self) -> EventPriority {
        match self {
            SignalEvent::Alert(_) => EventPriority::Critical,
            SignalEvent::Compression(_) | SignalEvent::MaCross(_) => EventPriority::High,
            SignalEvent::MaTouch(_) | SignalEvent::HtfMagnets(_) => EventPriority::Medium,
            SignalEvent::FlatSignal(_) => EventPriority::Low,
            SignalEvent::MaData(_) | SignalEvent::CompressionData(_) => EventPriority::Info,
        }
    }

    pub fn symbol(&self) -> &str {
        match self {
            SignalEvent::FlatSignal(e) => &e.symbol,
            SignalEvent::MaData(e) => &e.symbol,
            SignalEvent::MaTouch(e) => &e.symbol,
            SignalEvent::MaCross(e) => &e.symbol,
            SignalEvent::Compression(e) => &e.symbol,
            SignalEvent::CompressionData(e) => &e.symbol,
            SignalEvent::HtfMagnets(e) => &e.symbol,
            SignalEvent::Alert(e) => &e.symbol,
        }
    }

    pub fn timestamp(&self) -> i64 {
        match self {
            SignalEvent::FlatSignal(e) => e.timestamp,
            SignalEvent::MaData(e) => e.timestamp,
            SignalEvent::MaTouch(e) => e.timestamp,
            SignalEvent::MaCross(e) => e.timestamp,
            SignalEvent::Compression(e) => e.timestamp,
            SignalEvent::CompressionData(e) => e.timestamp,
            SignalEvent::HtfMagnets(e) => e.timestamp,
            SignalEvent::Alert(e) => e.timestamp,
        }
    }

    /// Bus event carrying the wire payload as its data map
    pub fn to_bus_event(&self) -> Result<Event, serde_json::Error> {
        let data = match serde_json::to_value(self)? {
            serde_json::Value::Object(map) => map.into_iter().collect(),
            _ => HashMap::new(),
        };
        Ok(Event::new(
            self.event_type().to_string(),
            self.timestamp(),
            data,
            EVENT_SOURCE.to_string(),
            self.priority(),
        ))
    }
}

// ============================================================================
// Statistics
// ============================================================================

#[derive(Debug, Clone, Default)]
pub struct SetupAggregatorStats {
    pub candles_received: u64,
    pub candles_skipped: u64,
    pub closed_candles_processed: u64,
    pub events_emitted: u64,
    pub alerts_fired: u64,
    pub magnets_created: u64,
    pub magnets_filled: u64,
    pub ma_touches: u64,
    pub ma_crosses: u64,
}

impl fmt::Display for SetupAggregatorStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Setup(candles={}, closed={}, skipped={}, events={}, alerts={}, magnets={}/{} filled)",
            self.candles_received, self.closed_candles_processed, self.candles_skipped,
            self.events_emitted, self.alerts_fired, self.magnets_created, self.magnets_filled
        )
    }
}

// ============================================================================
// Aggregator
// ============================================================================

/// Owns every detector and runs them per candle, in arrival order.
/// Takes `&mut self`; a multi-threaded host must serialize calls.
pub struct SetupAggregator {
    scanner: ScannerConfig,

    candles: CandleStore,
    flats: FlatRunDetector,
    compression: CompressionDetector,
    magnets: MagnetTracker,
    ma_touches: MaTouchDetector,
    triggers: TriggerManager,

    // Last selected compression flag per series
    compression_states: HashMap<SeriesKey, bool>,

    event_bus: Arc<EventBus>,

    candles_received: u64,
    candles_skipped: u64,
    closed_candles_processed: u64,
    events_emitted: u64,
}

impl SetupAggregator {
    pub fn new(scanner: ScannerConfig, thresholds: SignalThresholds, event_bus: Arc<EventBus>) -> Self {
        debug!(
            symbols = scanner.symbols.len(),
            base_tf = %scanner.base_timeframe,
            "Initializing SetupAggregator"
        );

        Self {
            candles: CandleStore::new(scanner.close_capacity, scanner.candle_capacity),
            flats: FlatRunDetector::new(thresholds.flat_window, thresholds.flat_tolerance),
            compression: CompressionDetector::from_thresholds(&thresholds),
            magnets: MagnetTracker::new(
                thresholds.magnet_capacity,
                thresholds.magnet_fill_pct,
                thresholds.flat_tolerance,
            ),
            ma_touches: MaTouchDetector::new(
                scanner.ma_event_timeframes.clone(),
                thresholds.ma_touch_pct,
                thresholds.ma_cooldown_ms,
            ),
            triggers: TriggerManager::from_thresholds(&thresholds),
            compression_states: HashMap::new(),
            event_bus,
            scanner,
            candles_received: 0,
            candles_skipped: 0,
            closed_candles_processed: 0,
            events_emitted: 0,
        }
    }

    /// Process one candle for (symbol, tf). Unclosed candles only update
    /// the buffer and live price. Returns the emitted events in order;
    /// each is also published on the event bus.
    pub fn on_candle(&mut self, symbol: &str, tf: Timeframe, candle: Candle, now_ms: i64) -> Vec<SignalEvent> {
        self.candles_received += 1;

        if !candle.is_finite() {
            self.candles_skipped += 1;
            warn!(symbol = %symbol, tf = %tf, candle = %candle, "Skipping candle with non-finite prices");
            return Vec::new();
        }

        self.candles.append(symbol, tf, candle);
        if !candle.closed {
            return Vec::new();
        }
        self.closed_candles_processed += 1;

        let mut events = Vec::new();

        if tf == self.scanner.base_timeframe {
            events.push(self.process_flats(symbol, tf, &candle, now_ms));
        }

        let mas = all_moving_averages(self.candles.closes(symbol, tf));
        events.push(SignalEvent::MaData(MaDataEvent {
            symbol: symbol.to_string(),
            tf,
            values: mas,
            timestamp: now_ms,
        }));

        let (touches, crosses) = self.ma_touches.check(symbol, tf, candle.close, &mas, now_ms);
        events.extend(touches.into_iter().map(SignalEvent::MaTouch));
        events.extend(crosses.into_iter().map(SignalEvent::MaCross));

        self.process_compression(symbol, tf, &candle, now_ms, &mut events);

        if tf == self.scanner.base_timeframe || tf == self.scanner.alert_compression_timeframe {
            if let Some(alert) = self.process_alert(symbol, candle.closed, now_ms) {
                events.push(alert);
            }
        }

        if self.scanner.magnet_timeframes.contains(&tf) {
            events.push(self.process_magnets(symbol, tf, &candle, now_ms));
        }

        self.publish(&events);
        events
    }

    fn process_flats(&mut self, symbol: &str, tf: Timeframe, candle: &Candle, now_ms: i64) -> SignalEvent {
        let stats = self.flats.update(symbol, candle);
        if stats.best_cu >= 2 || stats.best_cd >= 2 {
            info!(
                symbol = %symbol,
                bullish = stats.best_cu,
                bearish = stats.best_cd,
                rating = %stats.rating,
                "Flat run"
            );
        }

        SignalEvent::FlatSignal(FlatSignalEvent {
            symbol: symbol.to_string(),
            tf,
            up: stats.up,
            down: stats.down,
            best_cu: stats.best_cu,
            best_cd: stats.best_cd,
            best: stats.best(),
            rating: stats.rating,
            timestamp: now_ms,
        })
    }

    fn process_compression(
        &mut self,
        symbol: &str,
        tf: Timeframe,
        candle: &Candle,
        now_ms: i64,
        events: &mut Vec<SignalEvent>,
    ) {
        let closes = self.candles.closes(symbol, tf);
        let candles = self.candles.candles(symbol, tf);
        let selected = select_compression(
            self.compression.evaluate(closes, candles, false),
            self.compression.evaluate(closes, candles, true),
        );
        let distance = compression_distance(candle.close, selected.ma1, selected.ma2);

        if self.triggers.compression_changed(symbol, tf, selected.active) {
            if selected.active {
                info!(
                    symbol = %symbol,
                    tf = %tf,
                    band_pct = selected.band_pct.unwrap_or_default(),
                    regime = %selected.regime,
                    "Compression active"
                );
            }
            events.push(SignalEvent::Compression(CompressionEvent {
                symbol: symbol.to_string(),
                tf,
                on: selected.active,
                band_pct: selected.band_pct,
                regime: selected.regime,
                ma1: selected.ma1,
                ma2: selected.ma2,
                timestamp: now_ms,
            }));
        }

        events.push(SignalEvent::CompressionData(CompressionDataEvent {
            symbol: symbol.to_string(),
            tf,
            distance,
            timestamp: now_ms,
        }));

        self.compression_states.insert(SeriesKey::new(symbol, tf), selected.active);
    }

    fn process_alert(&mut self, symbol: &str, closed: bool, now_ms: i64) -> Option<SignalEvent> {
        let compression = self.compression_state(symbol, self.scanner.alert_compression_timeframe);
        let bullish_flats = self.flats.compute(symbol).best_cu;

        if !self.triggers.should_fire_alert(symbol, compression, bullish_flats, closed, now_ms) {
            return None;
        }

        let (title, body) = alert_text(symbol, bullish_flats);
        Some(SignalEvent::Alert(AlertEvent {
            symbol: symbol.to_string(),
            title,
            body,
            compression_15m: compression,
            bullish_flats_5m: bullish_flats,
            grade: FlatRating::APlus.to_string(),
            timestamp: now_ms,
        }))
    }

    fn process_magnets(&mut self, symbol: &str, tf: Timeframe, candle: &Candle, now_ms: i64) -> SignalEvent {
        let price = self.candles.live_price(symbol).unwrap_or(candle.close);
        let store = self.magnets.update(symbol, tf, candle, price, now_ms);
        let last_added = store.last_added;
        let unfilled_count = store.unfilled_count();
        let nearest = self.magnets.nearest(symbol, tf, price);

        SignalEvent::HtfMagnets(HtfMagnetsEvent {
            symbol: symbol.to_string(),
            tf,
            last_added,
            nearest_above: nearest.above,
            nearest_below: nearest.below,
            above_dist: nearest.above_dist,
            below_dist: nearest.below_dist,
            unfilled_count,
            timestamp: now_ms,
        })
    }

    fn publish(&mut self, events: &[SignalEvent]) {
        for event in events {
            match event.to_bus_event() {
                Ok(bus_event) => {
                    debug!(symbol = %event.symbol(), event = event.event_type(), "Setup event published");
                    self.event_bus.publish(bus_event);
                }
                Err(e) => warn!(event = event.event_type(), error = %e, "Failed to encode event"),
            }
        }
        self.events_emitted += events.len() as u64;
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    /// Last selected compression flag for the series, false if never evaluated
    pub fn compression_state(&self, symbol: &str, tf: Timeframe) -> bool {
        self.compression_states
            .get(&SeriesKey::new(symbol, tf))
            .copied()
            .unwrap_or(false)
    }

    pub fn reset_trigger(&mut self, symbol: &str) {
        self.triggers.reset(symbol);
    }

    pub fn time_until_next_alert(&self, symbol: &str, now_ms: i64) -> i64 {
        self.triggers.time_until_next_alert(symbol, now_ms)
    }

    pub fn candle_store(&self) -> &CandleStore { &self.candles }
    pub fn flat_detector(&self) -> &FlatRunDetector { &self.flats }
    pub fn magnet_tracker(&self) -> &MagnetTracker { &self.magnets }
    pub fn event_bus(&self) -> &Arc<EventBus> { &self.event_bus }
    pub fn scanner_config(&self) -> &ScannerConfig { &self.scanner }

    pub fn get_stats(&self) -> SetupAggregatorStats {
        SetupAggregatorStats {
            candles_received: self.candles_received,
            candles_skipped: self.candles_skipped,
            closed_candles_processed: self.closed_candles_processed,
            events_emitted: self.events_emitted,
            alerts_fired: self.triggers.alerts_fired(),
            magnets_created: self.magnets.magnets_created(),
            magnets_filled: self.magnets.magnets_filled(),
            ma_touches: self.ma_touches.touches_fired(),
            ma_crosses: self.ma_touches.crosses_fired(),
        }
    }
}
