//! Domain types for signalwatch

pub mod alert_type;
pub mod candle;
pub mod timeframe;

pub use alert_type::{AlertType, AlertTypeParseError};
pub use candle::{closes, volumes, Candle, SymbolTimeframeKey};
pub use timeframe::{parse_timeframe_list, Timeframe, TimeframeParseError};

/// Symbol type alias
pub type Symbol = String;
