//! HTTP client for the riskdash REST API.
//!
//! This module provides the request/response client used to fetch
//! authoritative snapshots and run on-demand actions.
//!
//! # Example
//!
//! ```rust,ignore
//! use riskdash_sdk::client::{ApiClient, ClientConfig};
//! use riskdash_sdk::types::VarParams;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ClientConfig::new("http://localhost:8000/api").with_token("...");
//!     let client = ApiClient::new(config)?;
//!
//!     let summary = client.pnl_summary().await?;
//!     println!("Total P&L: {}", summary.total_pnl);
//!
//!     let var = client.risk_var(&VarParams::default()).await?;
//!     println!("VaR: {}", var.var_value);
//!
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod http;
pub mod query;

pub use config::ClientConfig;
pub use error::ClientError;
pub use http::ApiClient;
pub use query::{Query, QueryValue, RequestOptions};
