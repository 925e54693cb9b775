//! Wire types for the riskdash API.
//!
//! Provides the payload types returned by the REST endpoints and carried by
//! the streaming channels.

pub mod pnl;
pub mod position;
pub mod report;
pub mod risk;
pub mod stream;

pub use pnl::{PnlContributor, PnlPoint, PnlSummary};
pub use position::Position;
pub use report::{Report, SummaryRequest, SummaryResponse};
pub use risk::{
    Exposure, VarMethod, VarParams, VarResult, DEFAULT_VAR_ALPHA, DEFAULT_VAR_LOOKBACK,
};
pub use stream::{AlertSeverity, PriceTick, RiskAlert};
