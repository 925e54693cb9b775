//! Streaming connection to the riskdash backend.
//!
//! A [`StreamConnection`] keeps one WebSocket open to `/stream`, announces
//! the channels that have subscribers in the [`ChannelRegistry`], and routes
//! every data frame to them. Connection state changes are published through
//! a `watch` channel and on the synthetic `connectivity` channel.
//!
//! # Example
//!
//! ```rust,ignore
//! use riskdash_sdk::registry::{ChannelPayload, ChannelRegistry};
//! use riskdash_sdk::ws::{StreamConfig, StreamConnection};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let registry = ChannelRegistry::new();
//!     let _prices = registry
//!         .subscribe("prices", |payload: &ChannelPayload| {
//!             println!("ticks: {}", payload.data);
//!             Ok(())
//!         })
//!         .await;
//!
//!     let stream = StreamConnection::new(StreamConfig::default(), registry)?;
//!     let state = stream.open().await?;
//!     println!("stream is {}", state);
//!
//!     tokio::signal::ctrl_c().await?;
//!     stream.close().await;
//!     Ok(())
//! }
//! ```
//!
//! [`ChannelRegistry`]: crate::registry::ChannelRegistry

pub mod config;
pub mod connection;
pub mod error;
pub mod messages;
pub mod state;

pub use config::StreamConfig;
pub use connection::StreamConnection;
pub use error::StreamError;
pub use messages::{ClientMessage, Envelope, MessageKind, ALERTS_CHANNEL, PNL_CHANNEL, PRICES_CHANNEL};
pub use state::{ConnectionState, StateMachine};
