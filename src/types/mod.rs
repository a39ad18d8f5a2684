//! Domain types shared across the adapter pipeline.
//!
//! - [`messages`] - Wire types for the inbound feed and the snapshot provider
//! - [`Side`] - Which side of the book a raw update describes
//! - [`PriceLevel`] - A single (price, volume) entry
//! - [`HalfBook`] - One side of an instrument's book from a single update
//! - [`TickPrice`] - Best bid/ask snapshot for one instrument

pub mod messages;

pub use messages::{RawOrderBookMsg, RawPriceLevel};

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

/// Side of a one-sided order book update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    /// Bid side
    Buy,
    /// Ask side
    Sell,
}

impl Side {
    /// The opposite side of the book.
    #[must_use]
    pub const fn opposite(self) -> Self {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }

    /// Whether this is the bid side.
    #[must_use]
    pub const fn is_buy(self) -> bool {
        matches!(self, Side::Buy)
    }
}

impl From<bool> for Side {
    fn from(is_buy: bool) -> Self {
        if is_buy {
            Side::Buy
        } else {
            Side::Sell
        }
    }
}

/// A single price level.
///
/// Volume is stored as an absolute value; upstream feeds occasionally carry
/// signed volumes for the sell side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PriceLevel {
    /// Price of the level
    pub price: Decimal,
    /// Volume at the level, always non-negative
    pub volume: Decimal,
}

impl PriceLevel {
    /// Create a level, normalizing the volume to its absolute value.
    #[must_use]
    pub fn new(price: Decimal, volume: Decimal) -> Self {
        Self {
            price,
            volume: volume.abs(),
        }
    }
}

/// One side of an instrument's order book from a single upstream update.
///
/// Half books are ephemeral: each update replaces the previous half book for
/// that instrument and side wholesale.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HalfBook {
    /// Asset pair symbol
    pub asset_pair: String,
    /// Which side of the book this update describes
    pub side: Side,
    /// Upstream timestamp of the update
    pub timestamp: DateTime<Utc>,
    /// Price levels for this side
    pub levels: Vec<PriceLevel>,
}

impl HalfBook {
    /// An empty half book used to seed a side that has not been seen yet.
    ///
    /// Carries the minimum timestamp so any live update supersedes it.
    #[must_use]
    pub fn empty(asset_pair: impl Into<String>, side: Side) -> Self {
        Self {
            asset_pair: asset_pair.into(),
            side,
            timestamp: DateTime::<Utc>::MIN_UTC,
            levels: Vec::new(),
        }
    }
}

/// Best bid/ask snapshot for one instrument.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TickPrice {
    /// Exchange tag of the adapter that produced the tick
    pub source: String,
    /// Asset pair symbol
    pub asset: String,
    /// Timestamp of the book the tick was derived from
    pub timestamp: DateTime<Utc>,
    /// Best ask price
    pub ask: Decimal,
    /// Best bid price
    pub bid: Decimal,
}

impl TickPrice {
    /// Create a tick price.
    #[must_use]
    pub fn new(
        source: impl Into<String>,
        asset: impl Into<String>,
        timestamp: DateTime<Utc>,
        ask: Decimal,
        bid: Decimal,
    ) -> Self {
        Self {
            source: source.into(),
            asset: asset.into(),
            timestamp,
            ask,
            bid,
        }
    }
}
