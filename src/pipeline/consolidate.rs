//! Consolidation of duplicate price levels within one raw update.
//!
//! Upstream ticks occasionally split one logical level across several
//! entries at the same price. Consolidation must run before any best-price
//! or volume-sum computation, otherwise those levels are double counted.

use std::collections::BTreeMap;

use rust_decimal::Decimal;

use crate::types::PriceLevel;

/// Merge duplicate price levels, summing their volumes.
///
/// The output carries exactly one entry per distinct price, ordered by
/// ascending price, so the result is deterministic for any permutation of
/// the input. Entries repeating a price are summed even when their volumes
/// are identical; exact repeats are distinct orders, not noise.
#[must_use]
pub fn consolidate_levels(levels: &[PriceLevel]) -> Vec<PriceLevel> {
    let mut merged: BTreeMap<Decimal, Decimal> = BTreeMap::new();
    for level in levels {
        *merged.entry(level.price).or_insert(Decimal::ZERO) += level.volume;
    }
    merged
        .into_iter()
        .map(|(price, volume)| PriceLevel { price, volume })
        .collect()
}
