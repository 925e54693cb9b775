//! Riskdash SDK - real-time portfolio-state synchronization.
//!
//! This crate keeps a dashboard's view of portfolio state consistent with a
//! remote risk analytics backend. It fetches authoritative snapshots over
//! HTTP, receives incremental updates over a persistent WebSocket, and merges
//! the two so consumers never see state older than what they already saw,
//! across disconnects, out-of-order frames and failing requests.
//!
//! # Components
//!
//! - [`ApiClient`] — Request/response client for the REST API
//! - [`ChannelRegistry`] — Channel name to ordered subscriber handlers
//! - [`StreamConnection`] — Persistent stream with an explicit state machine
//! - [`SnapshotReconciler`] — Baseline and delta merge by recency marker
//! - [`Session`] — Owns one of each and wires them together
//! - [`LastGood`] — Keeps the last successful on-demand result
//!
//! # Example
//!
//! ```rust,ignore
//! use riskdash_sdk::{Domain, Session, SessionConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), riskdash_sdk::SdkError> {
//!     let session = Session::activate(SessionConfig::default()).await?;
//!
//!     let mut pnl = session.watch(Domain::Pnl).await;
//!     while pnl.changed().await.is_ok() {
//!         if let Some(snapshot) = pnl.borrow().as_ref() {
//!             println!("P&L at {}: {}", snapshot.marker, snapshot.data);
//!         }
//!     }
//!
//!     session.teardown().await;
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod client;
pub mod error;
pub mod reconcile;
pub mod registry;
pub mod session;
pub mod types;
pub mod ws;

#[cfg(test)]
pub(crate) mod testing;

pub use cache::LastGood;
pub use client::{ApiClient, ClientConfig, ClientError};
pub use error::SdkError;
pub use reconcile::{Delta, DeltaOutcome, Domain, RecencyMarker, Snapshot, SnapshotReconciler};
pub use registry::{ChannelPayload, ChannelRegistry, HandlerError, SubscriptionHandle};
pub use session::{Session, SessionConfig};
pub use ws::{ConnectionState, StreamConfig, StreamConnection, StreamError};
