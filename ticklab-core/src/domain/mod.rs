//! Domain types for TickLab

pub mod candle;
pub mod month;
pub mod order;
pub mod position;
pub mod tick;
pub mod timeframe;

pub use candle::Candle;
pub use month::{Month, MonthParseError};
pub use order::{Direction, Order};
pub use position::{CloseReason, Position, PositionId, PositionStatus};
pub use tick::Tick;
pub use timeframe::Timeframe;

/// Symbol type alias
pub type Symbol = String;
