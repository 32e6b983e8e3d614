// Layer 2 - Data Ingestion
// Kline frame parsing and per-series candle history

pub mod parser;
pub mod candle_store;

// Re-export commonly used items
pub use parser::{KlineParser, ParsedKline, ParseError, ParserStats};
pub use candle_store::{CandleBuffer, CandleStore, CandleStoreStats};
