//! # exchange-adapter
//!
//! A market-data adapter for a single exchange: consumes raw one-sided
//! order book fragments from the upstream feed, reconciles them into
//! consistent two-sided books and best-bid/ask tick prices, suppresses
//! noise and duplicates, applies per-instrument publish-rate limits, and
//! republishes normalized data on a fixed cadence.
//!
//! ## Features
//!
//! - **Half-book reconciliation** - Merges buy/sell fragments per
//!   instrument, bootstrapping missing sides from a snapshot provider
//! - **Crossed-book handling** - Outdated candidates are dropped at
//!   ingestion; crossed cache states are suppressed with rate-limited
//!   diagnostics
//! - **Dedup + throttling** - Unchanged books and ticks are never resent;
//!   per-instrument rate ceilings bound output volume
//! - **Periodic publication** - A non-overlapping timer loop diffs the
//!   cache against last-sent snapshots, with a forced full resync (and a
//!   thinned secondary stream) once per minute
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use exchange_adapter::client::NoSnapshots;
//! use exchange_adapter::sink::{ChannelBookSink, ChannelTickSink};
//! use exchange_adapter::{Config, ExchangeAdapter};
//! use tokio::sync::mpsc;
//!
//! #[tokio::main]
//! async fn main() -> exchange_adapter::Result<()> {
//!     let config = Config::new("testex")
//!         .with_instruments(["BTCUSD", "ETHUSD"])
//!         .with_max_events_per_second(10);
//!
//!     let (book_tx, _book_rx) = mpsc::unbounded_channel();
//!     let (thinned_tx, _thinned_rx) = mpsc::unbounded_channel();
//!     let (tick_tx, _tick_rx) = mpsc::unbounded_channel();
//!
//!     let adapter = ExchangeAdapter::new(
//!         config,
//!         Arc::new(NoSnapshots),
//!         Arc::new(ChannelBookSink::new(book_tx, thinned_tx)),
//!         Arc::new(ChannelTickSink::new(tick_tx)),
//!     )?;
//!
//!     adapter.start();
//!     // wire the message bus subscription to adapter.handle_message(...)
//!     // and drain the receivers into the outbound transport
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! This crate is organized into several modules:
//!
//! - [`adapter`] - Top-level service wiring ingestion, cache and publisher
//! - [`connection`] - Lifecycle state machine gating ingestion
//! - [`pipeline`] - Consolidation, reconciliation, dedup, throttling and
//!   the periodic publisher
//! - [`orderbook`] - The full book and the per-instrument cache
//! - [`client`] - Snapshot provider used for bootstrap and refill
//! - [`sink`] - Outbound publish targets
//! - [`types`] - Domain and wire types
//! - [`config`] - Adapter configuration
//! - [`error`] - Error types for the crate
//!
//! ## Delivery semantics
//!
//! Publishes are fire-and-forget and at-most-once: failures are logged and
//! the event is dropped. Consumers are guaranteed the latest reconciled
//! state on a best-effort cadence, not every intermediate state; the forced
//! resync guarantees a full refresh once per interval regardless of change
//! detection.

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![deny(unsafe_code)]

pub mod adapter;
pub mod client;
pub mod config;
pub mod connection;
pub mod error;
pub mod orderbook;
pub mod pipeline;
pub mod sink;
pub mod types;

// Re-export main types at crate root for convenience
pub use adapter::ExchangeAdapter;
pub use config::Config;
pub use error::Error;

/// Result type alias using the crate's Error type
pub type Result<T> = std::result::Result<T, Error>;
