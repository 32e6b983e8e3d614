// Kline Frame Parser
// Binance kline messages (raw or combined-stream) into typed candles

use serde::Deserialize;
use thiserror::Error;
use tracing::warn;

use crate::core::types::{Candle, Timeframe};

// ============================================================================
// Errors
// ============================================================================

/// Parser error type
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("Invalid JSON: {0}")]
    InvalidJson(String),
    #[error("Unknown event type: {0}")]
    UnknownEventType(String),
    #[error("Unknown interval: {0}")]
    UnknownInterval(String),
    #[error("Validation failed: {0}")]
    ValidationFailed(String),
}

// ============================================================================
// Parsed Kline
// ============================================================================

/// Kline with symbol and timeframe resolved
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct ParsedKline {
    pub symbol: String,
    pub tf: Timeframe,
    pub candle: Candle,
    pub event_time: i64,
}

// ============================================================================
// Serde Structures (Raw Binance JSON)
// ============================================================================

/// Binance sends prices as strings; some relays send plain numbers
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawNumber {
    Num(f64),
    Str(String),
}

impl RawNumber {
    fn to_f64(&self, field_name: &str) -> Result<f64, ParseError> {
        let value = match self {
            RawNumber::Num(v) => *v,
            RawNumber::Str(s) => s.trim().parse::<f64>().map_err(|_| {
                ParseError::ValidationFailed(format!("Invalid {}: '{}'", field_name, s))
            })?,
        };
        if !value.is_finite() {
            return Err(ParseError::ValidationFailed(format!(
                "Non-finite {}: {}",
                field_name, value
            )));
        }
        Ok(value)
    }
}

#[derive(Debug, Deserialize)]
struct RawKlineData {
    #[serde(rename = "t")]
    open_time: i64,
    #[serde(rename = "s", default)]
    symbol: Option<String>,
    #[serde(rename = "i")]
    interval: String,
    #[serde(rename = "o")]
    open: RawNumber,
    #[serde(rename = "c")]
    close: RawNumber,
    #[serde(rename = "h")]
    high: RawNumber,
    #[serde(rename = "l")]
    low: RawNumber,
    #[serde(rename = "v", default)]
    volume: Option<RawNumber>,
    #[serde(rename = "x")]
    is_closed: bool,
}

#[derive(Debug, Deserialize)]
struct RawKline {
    #[serde(rename = "E", default)]
    event_time: i64,
    #[serde(rename = "s", default)]
    symbol: Option<String>,
    #[serde(rename = "k")]
    kline: RawKlineData,
}

// ============================================================================
// KlineParser - Stateful parser with stats
// ============================================================================

/// Parser statistics
#[derive(Debug, Clone, Default)]
pub struct ParserStats {
    pub messages_parsed: u64,
    pub parse_errors: u64,
    pub validation_failures: u64,
    pub closed_klines: u64,
    pub open_klines: u64,
}

impl ParserStats {
    pub fn error_rate(&self) -> f64 {
        let total = self.messages_parsed + self.parse_errors + self.validation_failures;
        if total > 0 {
            (self.parse_errors + self.validation_failures) as f64 / total as f64
        } else {
            0.0
        }
    }
}

#[derive(Debug, Default)]
pub struct KlineParser {
    pub stats: ParserStats,
}

impl KlineParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse one kline frame, updating stats on both success and failure
    pub fn parse(&mut self, raw_json: &str) -> Result<ParsedKline, ParseError> {
        let result = Self::parse_frame(raw_json);

        match &result {
            Ok(parsed) => {
                self.stats.messages_parsed += 1;
                if parsed.candle.closed {
                    self.stats.closed_klines += 1;
                } else {
                    self.stats.open_klines += 1;
                }
            }
            Err(ParseError::ValidationFailed(reason)) => {
                self.stats.validation_failures += 1;
                warn!(reason = %reason, "Kline rejected");
            }
            Err(_) => self.stats.parse_errors += 1,
        }

        result
    }

    pub fn reset_stats(&mut self) {
        self.stats = ParserStats::default();
    }

    fn parse_frame(raw_json: &str) -> Result<ParsedKline, ParseError> {
        let mut value: serde_json::Value = serde_json::from_str(raw_json)
            .map_err(|e| ParseError::InvalidJson(e.to_string()))?;

        // Unwrap combined stream format: {"stream": "...", "data": {...}}
        let data = if value.get("data").is_some() { value["data"].take() } else { value };

        let event_type = data
            .get("e")
            .and_then(|v| v.as_str())
            .ok_or_else(|| ParseError::InvalidJson("Missing event type 'e'".into()))?;
        if event_type != "kline" {
            return Err(ParseError::UnknownEventType(event_type.to_string()));
        }

        let raw: RawKline = serde_json::from_value(data)
            .map_err(|e| ParseError::InvalidJson(e.to_string()))?;
        let k = &raw.kline;

        let tf = Timeframe::from_interval(&k.interval)
            .ok_or_else(|| ParseError::UnknownInterval(k.interval.clone()))?;

        let symbol = k
            .symbol
            .as_ref()
            .or(raw.symbol.as_ref())
            .map(|s| s.to_uppercase())
            .ok_or_else(|| ParseError::InvalidJson("Missing symbol".into()))?;

        let mut candle = Candle::new(
            k.open_time,
            k.open.to_f64("kline.open")?,
            k.high.to_f64("kline.high")?,
            k.low.to_f64("kline.low")?,
            k.close.to_f64("kline.close")?,
            k.is_closed,
        );
        if let Some(volume) = &k.volume {
            candle = candle.with_volume(volume.to_f64("kline.volume")?);
        }

        Ok(ParsedKline {
            symbol,
            tf,
            candle,
            event_time: raw.event_time,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const KLINE: &str = r#"{"e":"kline","E":1700000000100,"s":"BTCUSDT","k":{"t":1700000000000,"T":1700000299999,"s":"BTCUSDT","i":"5m","f":1,"L":2,"o":"37000.10","c":"37010.00","h":"37010.00","l":"36990.50","v":"12.5","n":42,"x":true,"q":"1","V":"1","Q":"1","B":"0"}}"#;

    #[test]
    fn test_parse_raw_kline() {
        let mut parser = KlineParser::new();
        let parsed = parser.parse(KLINE).unwrap();

        assert_eq!(parsed.symbol, "BTCUSDT");
        assert_eq!(parsed.tf, Timeframe::M5);
        assert_eq!(parsed.event_time, 1700000000100);
        assert_eq!(parsed.candle.time, 1700000000000);
        assert_eq!(parsed.candle.open, 37000.10);
        assert_eq!(parsed.candle.high, 37010.00);
        assert_eq!(parsed.candle.volume, Some(12.5));
        assert!(parsed.candle.closed);
        assert_eq!(parser.stats.messages_parsed, 1);
        assert_eq!(parser.stats.closed_klines, 1);
    }

    #[test]
    fn test_parse_combined_stream_with_numeric_fields() {
        let frame = r#"{"stream":"ethusdt@kline_1h","data":{"e":"kline","E":5,"s":"ethusdt","k":{"t":3600000,"i":"1h","o":2000,"c":2001.5,"h":2002,"l":1999,"x":false}}}"#;
        let mut parser = KlineParser::new();
        let parsed = parser.parse(frame).unwrap();

        assert_eq!(parsed.symbol, "ETHUSDT");
        assert_eq!(parsed.tf, Timeframe::H1);
        assert_eq!(parsed.candle.close, 2001.5);
        assert_eq!(parsed.candle.volume, None);
        assert!(!parsed.candle.closed);
        assert_eq!(parser.stats.open_klines, 1);
    }

    #[test]
    fn test_rejects_non_finite_price() {
        let frame = KLINE.replace("\"37010.00\",\"h\"", "\"NaN\",\"h\"");
        let mut parser = KlineParser::new();
        let result = parser.parse(&frame);

        assert!(matches!(result, Err(ParseError::ValidationFailed(_))));
        assert_eq!(parser.stats.validation_failures, 1);
        assert_eq!(parser.stats.messages_parsed, 0);
    }

    #[test]
    fn test_rejects_unknown_interval_and_event() {
        let mut parser = KlineParser::new();

        let frame = KLINE.replace("\"i\":\"5m\"", "\"i\":\"7m\"");
        assert!(matches!(parser.parse(&frame), Err(ParseError::UnknownInterval(_))));

        let trade = r#"{"e":"aggTrade","s":"BTCUSDT","p":"1"}"#;
        assert!(matches!(parser.parse(trade), Err(ParseError::UnknownEventType(_))));

        assert!(matches!(parser.parse("not json"), Err(ParseError::InvalidJson(_))));
        assert_eq!(parser.stats.parse_errors, 3);
        assert!(parser.stats.error_rate() > 0.99);
    }
}
