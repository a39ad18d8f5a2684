//! Two-sided order book for a single instrument.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use crate::types::{HalfBook, PriceLevel, Side, TickPrice};

/// Reconciled two-sided order book for one asset pair.
///
/// Bids and asks are maintained independently: applying an update for one
/// side never discards the other. A book with an empty side is valid; it
/// means that side has not been seen yet.
///
/// Levels are kept in the order produced by consolidation (ascending price);
/// best-of-book queries scan rather than assume a particular order, so a
/// book assembled from unconsolidated input still answers correctly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderBook {
    /// Exchange tag of the adapter that produced the book
    pub source: String,
    /// Asset pair symbol
    pub asset_pair: String,
    /// Timestamp of the newest contributing half book
    pub timestamp: DateTime<Utc>,
    /// Ask levels
    pub asks: Vec<PriceLevel>,
    /// Bid levels
    pub bids: Vec<PriceLevel>,
}

impl OrderBook {
    /// Create an empty book for the given pair.
    #[must_use]
    pub fn new(
        source: impl Into<String>,
        asset_pair: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            source: source.into(),
            asset_pair: asset_pair.into(),
            timestamp,
            asks: Vec::new(),
            bids: Vec::new(),
        }
    }

    /// Replace one side of the book and advance the timestamp.
    pub fn apply_half(&mut self, half: &HalfBook) {
        match half.side {
            Side::Buy => self.bids = half.levels.clone(),
            Side::Sell => self.asks = half.levels.clone(),
        }
        self.timestamp = half.timestamp;
    }

    /// Best (highest) bid price, or `None` if the bid side is empty.
    #[must_use]
    pub fn best_bid(&self) -> Option<Decimal> {
        self.bids.iter().map(|l| l.price).max()
    }

    /// Best (lowest) ask price, or `None` if the ask side is empty.
    #[must_use]
    pub fn best_ask(&self) -> Option<Decimal> {
        self.asks.iter().map(|l| l.price).min()
    }

    /// Whether both sides hold at least one level.
    #[must_use]
    pub fn has_both_sides(&self) -> bool {
        !self.bids.is_empty() && !self.asks.is_empty()
    }

    /// Whether the best ask is strictly below the best bid.
    ///
    /// A crossed book is a transient artifact of merging two half books
    /// captured at different times, not an error.
    #[must_use]
    pub fn is_crossed(&self) -> bool {
        match (self.best_bid(), self.best_ask()) {
            (Some(bid), Some(ask)) => ask < bid,
            _ => false,
        }
    }

    /// Derive a tick price from the book.
    ///
    /// Returns `None` unless both sides are present and the best ask is
    /// strictly above the best bid.
    #[must_use]
    pub fn tick_price(&self) -> Option<TickPrice> {
        let bid = self.best_bid()?;
        let ask = self.best_ask()?;
        if ask > bid {
            Some(TickPrice::new(
                self.source.clone(),
                self.asset_pair.clone(),
                self.timestamp,
                ask,
                bid,
            ))
        } else {
            None
        }
    }
}
