// Configuration Management for the Setup Scanner
// JSON file sections plus environment overrides

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use parking_lot::RwLock;
use thiserror::Error;
use tracing::{info, warn};

use crate::core::types::Timeframe;

// ============================================================================
// Error Type
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Validation error: {0}")]
    Validation(String),
}

// ============================================================================
// Configuration Structures
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScannerConfig {
    pub symbols: Vec<String>,
    pub timeframes: Vec<Timeframe>,

    /// Timeframe flat runs are rated on
    pub base_timeframe: Timeframe,
    /// Timeframe whose compression flag gates the composite alert
    pub alert_compression_timeframe: Timeframe,
    /// Timeframes that feed the HTF magnet tracker
    pub magnet_timeframes: Vec<Timeframe>,
    /// Timeframes MA touches and crosses are reported on
    pub ma_event_timeframes: Vec<Timeframe>,

    // Candle buffer capacities
    pub close_capacity: usize,
    pub candle_capacity: usize,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            symbols: [
                "BTCUSDT", "ETHUSDT", "SOLUSDT", "BNBUSDT",
                "XRPUSDT", "HYPEUSDT", "ASTERUSDT", "PENGUUSDT",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            timeframes: vec![Timeframe::M5, Timeframe::M15, Timeframe::H1, Timeframe::H4],
            base_timeframe: Timeframe::M5,
            alert_compression_timeframe: Timeframe::M15,
            magnet_timeframes: vec![Timeframe::H1, Timeframe::H4],
            ma_event_timeframes: vec![Timeframe::M15, Timeframe::H1, Timeframe::H4],
            close_capacity: 300,
            candle_capacity: 100,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SignalThresholds {
    // Flat-run detector
    pub flat_tolerance: f64,              // Relative tolerance for high/low == body edge
    pub flat_window: usize,               // Base-timeframe candles kept per symbol

    // Compression detector
    pub compression_band_pct: f64,        // Band below which compression is active (%)
    pub compression_min_candles: usize,   // Full candles required before evaluating
    pub regime_lookback: usize,           // Closes averaged for regime classification

    // HTF magnets
    pub magnet_capacity: usize,           // Magnets kept per (symbol, timeframe)
    pub magnet_fill_pct: f64,             // Fraction of level counted as a fill

    // MA touch/cross
    pub ma_touch_pct: f64,                // Fraction of MA counted as a touch
    pub ma_cooldown_ms: i64,              // Per (symbol, tf, MA, kind) cooldown

    // Composite alert
    pub alert_cooldown_ms: i64,
    pub alert_confirmation_candles: u32,
    pub alert_min_bullish_flats: u32,
}

impl Default for SignalThresholds {
    fn default() -> Self {
        Self {
            flat_tolerance: 1e-8,
            flat_window: 12,
            compression_band_pct: 0.5,
            compression_min_candles: 20,
            regime_lookback: 10,
            magnet_capacity: 20,
            magnet_fill_pct: 0.001,
            ma_touch_pct: 0.002,
            ma_cooldown_ms: 300_000,
            alert_cooldown_ms: 60_000,
            alert_confirmation_candles: 1,
            alert_min_bullish_flats: 2,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitoringConfig {
    pub log_level: String,
    pub json_logs: bool,
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            log_level: "INFO".to_string(),
            json_logs: false,
        }
    }
}

// ============================================================================
// Configuration Summary
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct ConfigSummary {
    pub symbols: usize,
    pub timeframes: Vec<Timeframe>,
    pub base_timeframe: Timeframe,
    pub compression_band_pct: f64,
    pub alert_cooldown_ms: i64,
    pub log_level: String,
}

// ============================================================================
// Configuration Manager
// ============================================================================

pub struct ConfigManager {
    scanner: Arc<RwLock<ScannerConfig>>,
    thresholds: Arc<RwLock<SignalThresholds>>,
    monitoring: Arc<RwLock<MonitoringConfig>>,
}

impl ConfigManager {
    pub fn new(config_path: Option<&str>) -> Result<Self, ConfigError> {
        let mut manager = Self {
            scanner: Arc::new(RwLock::new(ScannerConfig::default())),
            thresholds: Arc::new(RwLock::new(SignalThresholds::default())),
            monitoring: Arc::new(RwLock::new(MonitoringConfig::default())),
        };

        if let Some(path) = config_path {
            manager.load_from_file(path)?;
        }

        manager.load_from_env();

        info!("Configuration initialized");
        Ok(manager)
    }

    /// Load configuration from a JSON file with optional
    /// `scanner`, `thresholds` and `monitoring` sections
    pub fn load_from_file(&mut self, config_path: &str) -> Result<(), ConfigError> {
        let path = Path::new(config_path);
        if !path.exists() {
            warn!(path = config_path, "Config file not found");
            return Ok(());
        }

        let content = fs::read_to_string(path)?;
        self.load_from_str(&content)?;

        info!(path = config_path, "Configuration loaded");
        Ok(())
    }

    /// Apply a JSON document. Unknown sections are ignored; a malformed
    /// section is an error rather than a silent fallback.
    pub fn load_from_str(&mut self, content: &str) -> Result<(), ConfigError> {
        let config_data: HashMap<String, serde_json::Value> = serde_json::from_str(content)?;

        if let Some(scanner_data) = config_data.get("scanner") {
            *self.scanner.write() = serde_json::from_value(scanner_data.clone())?;
        }

        if let Some(thresholds_data) = config_data.get("thresholds") {
            *self.thresholds.write() = serde_json::from_value(thresholds_data.clone())?;
        }

        if let Some(monitoring_data) = config_data.get("monitoring") {
            *self.monitoring.write() = serde_json::from_value(monitoring_data.clone())?;
        }

        Ok(())
    }

    /// Environment overrides
    pub fn load_from_env(&mut self) {
        if let Ok(symbols) = std::env::var("SCANNER_SYMBOLS") {
            self.apply_symbols(&symbols);
        }
        if let Ok(level) = std::env::var("SCANNER_LOG_LEVEL") {
            self.monitoring.write().log_level = level;
        }
        if let Ok(json) = std::env::var("SCANNER_LOG_JSON") {
            self.monitoring.write().json_logs = json.to_lowercase() == "true";
        }
    }

    /// Replace the symbol list from a comma separated string
    pub fn apply_symbols(&self, symbols: &str) {
        let parsed: Vec<String> = symbols
            .split(',')
            .map(|s| s.trim().to_uppercase())
            .filter(|s| !s.is_empty())
            .collect();
        if parsed.is_empty() {
            warn!(value = symbols, "Ignoring empty symbol override");
            return;
        }
        self.scanner.write().symbols = parsed;
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<bool, ConfigError> {
        let mut errors = Vec::new();
        let scanner = self.scanner.read();
        let thresholds = self.thresholds.read();

        if scanner.symbols.is_empty() {
            errors.push("at least one symbol is required".to_string());
        }
        if !scanner.timeframes.contains(&scanner.base_timeframe) {
            errors.push(format!("base timeframe {} is not streamed", scanner.base_timeframe));
        }
        if scanner.close_capacity < 200 {
            errors.push("close_capacity must hold at least 200 closes for SMA200".to_string());
        }
        if scanner.candle_capacity < thresholds.compression_min_candles {
            errors.push("candle_capacity is below compression_min_candles".to_string());
        }
        if thresholds.flat_window == 0 || thresholds.magnet_capacity == 0 {
            errors.push("flat_window and magnet_capacity must be positive".to_string());
        }
        if thresholds.compression_band_pct <= 0.0 {
            errors.push("compression_band_pct must be positive".to_string());
        }
        if thresholds.ma_cooldown_ms < 0 || thresholds.alert_cooldown_ms < 0 {
            errors.push("cooldowns must not be negative".to_string());
        }

        if !errors.is_empty() {
            for error in &errors {
                warn!(error = %error, "Config validation error");
            }
            return Ok(false);
        }

        info!("Configuration validated successfully");
        Ok(true)
    }

    pub fn get_summary(&self) -> ConfigSummary {
        let scanner = self.scanner.read();
        let thresholds = self.thresholds.read();
        let monitoring = self.monitoring.read();

        ConfigSummary {
            symbols: scanner.symbols.len(),
            timeframes: scanner.timeframes.clone(),
            base_timeframe: scanner.base_timeframe,
            compression_band_pct: thresholds.compression_band_pct,
            alert_cooldown_ms: thresholds.alert_cooldown_ms,
            log_level: monitoring.log_level.clone(),
        }
    }

    pub fn scanner(&self) -> ScannerConfig {
        self.scanner.read().clone()
    }

    pub fn thresholds(&self) -> SignalThresholds {
        self.thresholds.read().clone()
    }

    pub fn monitoring(&self) -> MonitoringConfig {
        self.monitoring.read().clone()
    }
}
