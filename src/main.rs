//! Setup Scanner Entry Point
//!
//! Reads Binance kline frames line by line from stdin, runs the setup
//! pipeline and writes every emitted event as a JSON line to stdout.

use anyhow::{Context, Result};
use std::io::{self, BufRead, Write};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, info, warn};

use setup_scanner::core::{setup_logging_from, ConfigManager, EventBus};
use setup_scanner::layer2::KlineParser;
use setup_scanner::layer3::SetupAggregator;

fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or_default()
}

fn main() -> Result<()> {
    let config_path = std::env::var("SCANNER_CONFIG").ok();
    let config = ConfigManager::new(config_path.as_deref())
        .context("Failed to load scanner configuration")?;

    setup_logging_from(&config.monitoring());

    if !config.validate().context("Failed to validate configuration")? {
        anyhow::bail!("Invalid scanner configuration");
    }

    let summary = config.get_summary();
    info!(
        symbols = summary.symbols,
        base_tf = %summary.base_timeframe,
        band_pct = summary.compression_band_pct,
        "Starting setup scanner"
    );

    let scanner = config.scanner();
    let mut aggregator = SetupAggregator::new(scanner.clone(), config.thresholds(), Arc::new(EventBus::new()));
    let mut parser = KlineParser::new();

    let stdin = io::stdin();
    let stdout = io::stdout();
    let mut out = stdout.lock();

    for line in stdin.lock().lines() {
        let line = line.context("Failed to read from stdin")?;
        if line.trim().is_empty() {
            continue;
        }

        let kline = match parser.parse(&line) {
            Ok(kline) => kline,
            Err(e) => {
                warn!(error = %e, "Dropping frame");
                continue;
            }
        };

        if !scanner.symbols.contains(&kline.symbol) || !scanner.timeframes.contains(&kline.tf) {
            debug!(symbol = %kline.symbol, tf = %kline.tf, "Ignoring unconfigured series");
            continue;
        }

        for event in aggregator.on_candle(&kline.symbol, kline.tf, kline.candle, now_ms()) {
            serde_json::to_writer(&mut out, &event).context("Failed to encode event")?;
            out.write_all(b"\n").context("Failed to write event")?;
        }
        out.flush().context("Failed to flush stdout")?;
    }

    let stats = aggregator.get_stats();
    info!(
        parsed = parser.stats.messages_parsed,
        rejected = parser.stats.validation_failures + parser.stats.parse_errors,
        %stats,
        "Input closed, shutting down"
    );

    Ok(())
}
