// End-to-End Flow Tests for the Setup Scanner
//
// These tests drive the full pipeline without network connections:
//   Kline frames → Layer 2 (Parser → CandleStore) → Layer 3 (SetupAggregator) → EventBus
//
// Run with: cargo test --test setup_flow_test

use std::sync::{Arc, Mutex};

use setup_scanner::core::{Candle, EventBus, ScannerConfig, SignalThresholds, Timeframe};
use setup_scanner::layer2::KlineParser;
use setup_scanner::layer3::common::event_types::*;
use setup_scanner::layer3::setup::{FlatRating, SetupAggregator, SignalEvent};

// ============================================================================
// Helpers
// ============================================================================

fn new_aggregator() -> SetupAggregator {
    SetupAggregator::new(
        ScannerConfig::default(),
        SignalThresholds::default(),
        Arc::new(EventBus::new()),
    )
}

/// Candle with no upper wick
fn bullish_flat(time: i64, open: f64) -> Candle {
    Candle::new(time, open, open + 1.0, open - 1.0, open + 1.0, true)
}

/// Candle with wicks on both sides
fn wicky(time: i64, open: f64) -> Candle {
    Candle::new(time, open, open + 2.0, open - 1.0, open + 1.0, true)
}

fn constant(time: i64, price: f64) -> Candle {
    Candle::new(time, price, price, price, price, true)
}

fn of_type<'a>(events: &'a [SignalEvent], event_type: &str) -> Vec<&'a SignalEvent> {
    events.iter().filter(|e| e.event_type() == event_type).collect()
}

fn make_kline_json(symbol: &str, interval: &str, open_time: i64, o: f64, h: f64, l: f64, c: f64, closed: bool) -> String {
    format!(
        r#"{{"stream":"{stream}@kline_{interval}","data":{{"e":"kline","E":{et},"s":"{symbol}","k":{{"t":{t},"T":{ct},"s":"{symbol}","i":"{interval}","o":"{o}","c":"{c}","h":"{h}","l":"{l}","v":"10.0","n":5,"x":{x},"q":"0","V":"0","Q":"0","B":"0"}}}}}}"#,
        stream = symbol.to_lowercase(),
        interval = interval,
        symbol = symbol,
        et = open_time + 1,
        t = open_time,
        ct = open_time + 299_999,
        o = o,
        h = h,
        l = l,
        c = c,
        x = closed,
    )
}

// ============================================================================
// Flat runs
// ============================================================================

#[test]
fn test_twelve_candles_with_three_bullish_flats_rate_a_plus() {
    let mut agg = new_aggregator();
    let mut last = Vec::new();

    for i in 0..12 {
        let candle = if (2..5).contains(&i) { bullish_flat(i * 300_000, 100.0) } else { wicky(i * 300_000, 100.0) };
        last = agg.on_candle("BTCUSDT", Timeframe::M5, candle, i);
    }

    match of_type(&last, FLAT_SIGNAL).first() {
        Some(SignalEvent::FlatSignal(flat)) => {
            assert_eq!(flat.best_cu, 3);
            assert_eq!(flat.best_cd, 0);
            assert_eq!(flat.up, 3);
            assert_eq!(flat.rating, FlatRating::APlus);
            assert_eq!(flat.tf, Timeframe::M5);
        }
        other => panic!("expected flatSignal, got {:?}", other),
    }
}

#[test]
fn test_flats_only_on_base_timeframe() {
    let mut agg = new_aggregator();
    let events = agg.on_candle("BTCUSDT", Timeframe::M15, bullish_flat(0, 100.0), 0);

    assert!(of_type(&events, FLAT_SIGNAL).is_empty());
    assert!(agg.flat_detector().window("BTCUSDT").is_empty());
}

// ============================================================================
// Compression + composite alert
// ============================================================================

#[test]
fn test_compression_edge_then_alert_with_cooldown() {
    let mut agg = new_aggregator();

    // 100 identical 15m closes: EMA100 == SMA100, zero band
    let mut compression_events = 0;
    for i in 0..100 {
        let events = agg.on_candle("BTCUSDT", Timeframe::M15, constant(i * 900_000, 100.0), 0);
        compression_events += of_type(&events, COMPRESSION).len();
        assert_eq!(of_type(&events, COMPRESSION_DATA).len(), 1);
    }
    assert_eq!(compression_events, 1);
    assert!(agg.compression_state("BTCUSDT", Timeframe::M15));

    // First bullish flat: run of 1, no alert
    let events = agg.on_candle("BTCUSDT", Timeframe::M5, bullish_flat(0, 100.0), 1_000_000);
    assert!(of_type(&events, ALERT).is_empty());

    // Second: run of 2 with 15m compression active
    let events = agg.on_candle("BTCUSDT", Timeframe::M5, bullish_flat(300_000, 100.0), 1_010_000);
    match of_type(&events, ALERT).first() {
        Some(SignalEvent::Alert(alert)) => {
            assert_eq!(alert.title, "A+ Setup Detected");
            assert_eq!(alert.body, "BTCUSDT: 15m compression active with 2 consecutive bullish flats on 5m");
            assert!(alert.compression_15m);
            assert_eq!(alert.bullish_flats_5m, 2);
            assert_eq!(alert.grade, "A+");
        }
        other => panic!("expected alert, got {:?}", other),
    }

    // Still qualifying but inside the 60s cooldown
    let events = agg.on_candle("BTCUSDT", Timeframe::M5, bullish_flat(600_000, 100.0), 1_020_000);
    assert!(of_type(&events, ALERT).is_empty());
    assert_eq!(agg.time_until_next_alert("BTCUSDT", 1_020_000), 50_000);

    // Cooldown elapsed
    let events = agg.on_candle("BTCUSDT", Timeframe::M5, bullish_flat(900_000, 100.0), 1_070_000);
    assert_eq!(of_type(&events, ALERT).len(), 1);
    assert_eq!(agg.get_stats().alerts_fired, 2);
}

#[test]
fn test_no_alert_without_15m_compression() {
    let mut agg = new_aggregator();
    for i in 0..5 {
        let events = agg.on_candle("ETHUSDT", Timeframe::M5, bullish_flat(i * 300_000, 50.0), i * 120_000);
        assert!(of_type(&events, ALERT).is_empty());
    }
}

// ============================================================================
// MA touches
// ============================================================================

#[test]
fn test_ma_touch_fires_once_within_cooldown() {
    let mut agg = new_aggregator();
    let mut touches = Vec::new();

    for i in 0..105 {
        let events = agg.on_candle("SOLUSDT", Timeframe::H1, constant(i * 3_600_000, 100.0), i * 1_000);
        for event in events {
            if let SignalEvent::MaTouch(touch) = event {
                touches.push(touch);
            }
        }
    }

    // EMA100 and SMA100 become available on the 100th candle; SMA200/300 never do
    let names: Vec<String> = touches.iter().map(|t| t.ma_name.to_string()).collect();
    assert_eq!(names, vec!["EMA100".to_string(), "SMA100".to_string()]);
    assert!(touches.iter().all(|t| t.timestamp == 99_000));
}

#[test]
fn test_no_ma_events_on_base_timeframe() {
    let mut agg = new_aggregator();
    for i in 0..120 {
        let events = agg.on_candle("SOLUSDT", Timeframe::M5, constant(i * 300_000, 100.0), i);
        assert!(of_type(&events, MA_TOUCH).is_empty());
        assert!(of_type(&events, MA_CROSS).is_empty());
    }
}

// ============================================================================
// HTF magnets
// ============================================================================

#[test]
fn test_magnet_fills_when_price_returns() {
    let mut agg = new_aggregator();

    let events = agg.on_candle("BNBUSDT", Timeframe::H1, bullish_flat(0, 600.0), 10);
    match of_type(&events, HTF_MAGNETS).first() {
        Some(SignalEvent::HtfMagnets(m)) => {
            assert_eq!(m.last_added.map(|a| a.level), Some(600.0));
            assert_eq!(m.unfilled_count, 1);
            assert_eq!(m.nearest_below.map(|b| b.level), Some(600.0));
        }
        other => panic!("expected htfMagnets, got {:?}", other),
    }

    // An in-progress tick moves the live price but runs no detectors
    let tick = agg.on_candle("BNBUSDT", Timeframe::H1, Candle::new(3_600_000, 601.0, 606.0, 599.0, 605.0, false), 20);
    assert!(tick.is_empty());
    assert_eq!(agg.candle_store().live_price("BNBUSDT"), Some(605.0));
    assert_eq!(agg.magnet_tracker().unfilled("BNBUSDT", Timeframe::H1).len(), 1);

    // Non-flat close within 0.1% of the level
    let events = agg.on_candle("BNBUSDT", Timeframe::H1, Candle::new(3_600_000, 601.0, 606.0, 599.0, 600.2, true), 30);
    match of_type(&events, HTF_MAGNETS).first() {
        Some(SignalEvent::HtfMagnets(m)) => {
            assert_eq!(m.unfilled_count, 0);
            assert!(m.nearest_above.is_none() && m.nearest_below.is_none());
            // The last added magnet reports its fill
            assert_eq!(m.last_added.map(|a| a.filled), Some(true));
            assert_eq!(m.last_added.and_then(|a| a.filled_time), Some(30));
        }
        other => panic!("expected htfMagnets, got {:?}", other),
    }
    assert_eq!(agg.get_stats().magnets_filled, 1);
    assert_eq!(agg.candle_store().closes("BNBUSDT", Timeframe::H1).len(), 2);
}

// ============================================================================
// Parser → pipeline → bus
// ============================================================================

#[test]
fn test_frames_through_parser_and_bus() {
    let bus = Arc::new(EventBus::new());
    let received: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));

    let recv_clone = received.clone();
    bus.subscribe("*", move |evt| {
        recv_clone.lock().unwrap().push(evt.event_type);
    });
    let mut rx = bus.subscribe_channel();

    let mut agg = SetupAggregator::new(ScannerConfig::default(), SignalThresholds::default(), bus.clone());
    let mut parser = KlineParser::new();

    let frames = [
        make_kline_json("BTCUSDT", "5m", 0, 100.0, 101.5, 99.5, 101.0, false),
        make_kline_json("BTCUSDT", "5m", 0, 100.0, 101.5, 99.5, 101.5, true),
        make_kline_json("BTCUSDT", "5m", 300_000, 101.5, 102.0, 101.0, 101.8, false),
    ];

    let mut emitted = 0;
    for (i, frame) in frames.iter().enumerate() {
        let kline = parser.parse(frame).unwrap();
        emitted += agg.on_candle(&kline.symbol, kline.tf, kline.candle, i as i64).len();
    }

    // Only the closed frame produced work: flatSignal, maData, compressionData
    assert_eq!(emitted, 3);
    assert_eq!(
        *received.lock().unwrap(),
        vec![FLAT_SIGNAL.to_string(), MA_DATA.to_string(), COMPRESSION_DATA.to_string()]
    );
    assert_eq!(rx.try_recv().unwrap().event_type, FLAT_SIGNAL);

    // The closed candle superseded its in-progress snapshot
    let closes = agg.candle_store().closes("BTCUSDT", Timeframe::M5);
    assert_eq!(closes, &[101.5, 101.8]);
    assert_eq!(parser.stats.closed_klines, 1);
    assert_eq!(parser.stats.open_klines, 2);
}

#[test]
fn test_signal_event_json_lines() {
    let mut agg = new_aggregator();
    let events = agg.on_candle("XRPUSDT", Timeframe::H4, constant(0, 0.5), 42);

    let lines: Vec<serde_json::Value> = events
        .iter()
        .map(|e| serde_json::to_value(e).unwrap())
        .collect();

    assert_eq!(lines[0]["type"], "maData");
    assert!(lines[0]["values"]["sma20"].is_null());
    assert_eq!(lines[1]["type"], "compressionData");
    assert!(lines[1]["distance"].is_null());
    assert_eq!(lines[2]["type"], "htfMagnets");
    assert_eq!(lines[2]["tf"], "4h");
    assert_eq!(lines[2]["timestamp"], 42);
    assert!(lines[2]["lastAdded"]["bornTime"].is_number());
}
