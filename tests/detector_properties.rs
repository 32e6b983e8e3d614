//! Setup Detector Property Tests
//!
//! Properties that must hold for any input sequence: MA availability and
//! determinism, flat rating monotonicity, and magnet fill invariants.

use proptest::prelude::*;

use setup_scanner::core::{Candle, Timeframe};
use setup_scanner::layer3::common::moving_average::{ema, sma, smma};
use setup_scanner::layer3::setup::flat_tracker::{best_consecutive, rating_from};
use setup_scanner::layer3::setup::MagnetTracker;

fn prices(max_len: usize) -> impl Strategy<Value = Vec<f64>> {
    prop::collection::vec(1.0f64..100_000.0, 0..max_len)
}

proptest! {
    #[test]
    fn prop_ma_unavailable_below_length(values in prices(50), length in 1usize..60) {
        let available = values.len() >= length;
        prop_assert_eq!(sma(&values, length).is_some(), available);
        prop_assert_eq!(ema(&values, length).is_some(), available);
        prop_assert_eq!(smma(&values, length, None).is_some(), available);
    }

    #[test]
    fn prop_ma_deterministic(values in prices(120), length in 1usize..30) {
        prop_assert_eq!(ema(&values, length), ema(&values.clone(), length));
        prop_assert_eq!(smma(&values, length, Some(50.0)), smma(&values, length, Some(50.0)));
    }

    #[test]
    fn prop_ma_within_window_range(values in prices(80), length in 1usize..20) {
        if let (Some(s), Some(e)) = (sma(&values, length), ema(&values, length)) {
            let window = &values[values.len() - length..];
            let lo = window.iter().cloned().fold(f64::INFINITY, f64::min);
            let hi = window.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
            let eps = 1e-9 * hi;
            prop_assert!(s >= lo - eps && s <= hi + eps);
            prop_assert!(e >= lo - eps && e <= hi + eps);
        }
    }

    #[test]
    fn prop_rating_monotonic(up in 0u32..12, down in 0u32..12, cu in 0u32..6, cd in 0u32..6) {
        let base = rating_from(up, down, cu, cd);
        prop_assert!(rating_from(up, down, cu + 1, cd) >= base);
        prop_assert!(rating_from(up, down, cu, cd + 1) >= base);
        prop_assert!(rating_from(up + 1, down, cu, cd) >= base);
        prop_assert!(rating_from(up, down + 1, cu, cd) >= base);
    }

    #[test]
    fn prop_best_run_bounded_by_count(flags in prop::collection::vec(any::<bool>(), 0..24)) {
        let best = best_consecutive(&flags) as usize;
        prop_assert!(best <= flags.iter().filter(|&&f| f).count());
        prop_assert_eq!(best == 0, !flags.contains(&true));
    }

    #[test]
    fn prop_filled_magnets_never_reported(
        levels in prop::collection::vec(90.0f64..110.0, 1..40),
        price_path in prop::collection::vec(90.0f64..110.0, 1..40),
    ) {
        let mut tracker = MagnetTracker::new(20, 0.001, 1e-8);

        // Bullish flats at each level, then a wicky candle per price step
        for (i, level) in levels.iter().enumerate() {
            let flat = Candle::new(i as i64, *level, level + 1.0, level - 1.0, level + 1.0, true);
            tracker.update("BTCUSDT", Timeframe::H1, &flat, 200.0, 0);
        }
        let mut filled_before = 0;
        for (i, price) in price_path.iter().enumerate() {
            let step = Candle::new(1_000 + i as i64, 50.0, 60.0, 40.0, 55.0, true);
            let store = tracker.update("BTCUSDT", Timeframe::H1, &step, *price, i as i64);

            let filled_now = store.magnets.iter().filter(|m| m.filled).count();
            prop_assert!(filled_now >= filled_before);
            filled_before = filled_now;
            prop_assert!(store.magnets.len() <= 20);

            let nearest = tracker.nearest("BTCUSDT", Timeframe::H1, *price);
            if let Some(above) = nearest.above {
                prop_assert!(!above.filled && above.level > *price);
            }
            if let Some(below) = nearest.below {
                prop_assert!(!below.filled && below.level < *price);
            }
        }
    }
}
