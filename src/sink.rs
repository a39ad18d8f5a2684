//! Outbound publish targets for normalized books and tick prices.
//!
//! Every publish is fire-and-forget from the pipeline's perspective: a
//! failure is logged by the caller and the event is dropped, never retried,
//! and never blocks subsequent publishes.

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::Error;
use crate::orderbook::OrderBook;
use crate::types::TickPrice;

/// Publish target for normalized full books.
///
/// The thinned stream is a secondary channel carrying only forced-resync
/// snapshots; regular incremental publishes never reach it.
#[async_trait]
pub trait OrderBookSink: Send + Sync {
    /// Publish a book to the regular stream.
    async fn publish(&self, book: &OrderBook) -> Result<(), Error>;

    /// Publish a book to the thinned full-resync stream.
    async fn publish_thinned(&self, book: &OrderBook) -> Result<(), Error>;
}

/// Publish target for derived tick prices.
#[async_trait]
pub trait TickPriceSink: Send + Sync {
    /// Publish a tick price.
    async fn publish(&self, tick: &TickPrice) -> Result<(), Error>;
}

/// Order book sink backed by in-process channels.
///
/// The transport binding drains the receivers and forwards events to the
/// message bus. Senders are unbounded so a slow consumer never stalls the
/// pipeline; a dropped receiver surfaces as a publish error.
pub struct ChannelBookSink {
    books: mpsc::UnboundedSender<OrderBook>,
    thinned: mpsc::UnboundedSender<OrderBook>,
    enabled: bool,
}

impl ChannelBookSink {
    /// Create a sink forwarding to the given channels.
    pub fn new(
        books: mpsc::UnboundedSender<OrderBook>,
        thinned: mpsc::UnboundedSender<OrderBook>,
    ) -> Self {
        Self {
            books,
            thinned,
            enabled: true,
        }
    }

    /// Enable or disable the stream; a disabled sink accepts and drops
    /// every event.
    #[must_use]
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }
}

#[async_trait]
impl OrderBookSink for ChannelBookSink {
    async fn publish(&self, book: &OrderBook) -> Result<(), Error> {
        if !self.enabled {
            return Ok(());
        }
        self.books
            .send(book.clone())
            .map_err(|_| Error::ChannelClosed("order books"))
    }

    async fn publish_thinned(&self, book: &OrderBook) -> Result<(), Error> {
        if !self.enabled {
            return Ok(());
        }
        self.thinned
            .send(book.clone())
            .map_err(|_| Error::ChannelClosed("thinned order books"))
    }
}

/// Tick price sink backed by an in-process channel.
pub struct ChannelTickSink {
    ticks: mpsc::UnboundedSender<TickPrice>,
    enabled: bool,
}

impl ChannelTickSink {
    /// Create a sink forwarding to the given channel.
    pub fn new(ticks: mpsc::UnboundedSender<TickPrice>) -> Self {
        Self {
            ticks,
            enabled: true,
        }
    }

    /// Enable or disable the stream.
    #[must_use]
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }
}

#[async_trait]
impl TickPriceSink for ChannelTickSink {
    async fn publish(&self, tick: &TickPrice) -> Result<(), Error> {
        if !self.enabled {
            return Ok(());
        }
        self.ticks
            .send(tick.clone())
            .map_err(|_| Error::ChannelClosed("tick prices"))
    }
}
