//! Wire types for the inbound feed and the snapshot provider.
//!
//! The upstream matching engine publishes one-sided order book fragments as
//! self-describing JSON objects; the snapshot provider returns the same shape
//! for both sides of a pair. Both are deserialized into [`RawOrderBookMsg`]
//! and converted to [`HalfBook`] before entering the pipeline.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::{HalfBook, PriceLevel, Side};

/// A raw price level as carried on the wire.
///
/// Volume may be signed; normalization to an absolute value happens when the
/// message is converted into a [`HalfBook`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawPriceLevel {
    /// Price of the level
    pub price: Decimal,
    /// Volume at the level, possibly signed
    pub volume: Decimal,
}

/// One-sided order book fragment as delivered by the upstream feed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawOrderBookMsg {
    /// Asset pair symbol
    pub asset_pair: String,
    /// True for the bid side, false for the ask side
    pub is_buy: bool,
    /// Upstream timestamp of the update
    pub timestamp: DateTime<Utc>,
    /// Price levels for this side, possibly with duplicate prices
    pub prices: Vec<RawPriceLevel>,
}

impl From<RawOrderBookMsg> for HalfBook {
    fn from(msg: RawOrderBookMsg) -> Self {
        HalfBook {
            asset_pair: msg.asset_pair,
            side: Side::from(msg.is_buy),
            timestamp: msg.timestamp,
            levels: msg
                .prices
                .into_iter()
                .map(|p| PriceLevel::new(p.price, p.volume))
                .collect(),
        }
    }
}
