// Event Type Constants - Outbound setup signal names
// Wire names as consumed by the dashboard

// ============================================================================
// Base timeframe
// ============================================================================

pub const FLAT_SIGNAL: &str = "flatSignal";

// ============================================================================
// Moving averages
// ============================================================================

pub const MA_DATA: &str = "maData";
pub const MA_TOUCH: &str = "maTouch";
pub const MA_CROSS: &str = "maCross";

// ============================================================================
// Compression
// ============================================================================

pub const COMPRESSION: &str = "compression";
pub const COMPRESSION_DATA: &str = "compressionData";

// ============================================================================
// Higher timeframes
// ============================================================================

pub const HTF_MAGNETS: &str = "htfMagnets";

// ============================================================================
// Composite
// ============================================================================

pub const ALERT: &str = "alert";

pub const ALL_EVENT_TYPES: [&str; 8] = [
    FLAT_SIGNAL,
    MA_DATA,
    MA_TOUCH,
    MA_CROSS,
    COMPRESSION,
    COMPRESSION_DATA,
    HTF_MAGNETS,
    ALERT,
];
