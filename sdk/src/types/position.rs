//! Position types.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A holding in the portfolio as reported by `GET /positions`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    /// Position identifier.
    pub id: i64,

    /// Instrument identifier.
    pub instrument_id: i64,

    /// Instrument symbol.
    pub symbol: String,

    /// Signed quantity held.
    pub quantity: Decimal,

    /// Average acquisition cost.
    pub average_cost: Decimal,

    /// Current market value.
    pub market_value: Decimal,

    /// Unrealized P&L.
    pub unrealized_pnl: Decimal,
}

impl Position {
    /// Returns true for short positions.
    #[must_use]
    pub fn is_short(&self) -> bool {
        self.quantity.is_sign_negative() && !self.quantity.is_zero()
    }
}
