//! Shared cache of the latest reconciled book per instrument.
//!
//! # Design
//!
//! The cache is the single owner of current book state: the reconciler and
//! the resync refill submit updates, every other component reads. A
//! `parking_lot::RwLock` over the map allows concurrent readers (the
//! periodic publisher and the query surface) while writes stay exclusive.
//! The lock is held only for the read-modify-write itself, never across a
//! publish call.

use parking_lot::RwLock;
use rust_decimal::Decimal;
use rustc_hash::FxHashMap;

use crate::types::{HalfBook, TickPrice};

use super::OrderBook;

/// Thread-safe store of the latest full book per asset pair.
///
/// Safe to share via `Arc<OrderBookCache>`. Readers receive cloned books so
/// no lock outlives a method call.
#[derive(Debug)]
pub struct OrderBookCache {
    source: String,
    books: RwLock<FxHashMap<String, OrderBook>>,
}

impl OrderBookCache {
    /// Create an empty cache stamping books with the given exchange tag.
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            books: RwLock::new(FxHashMap::default()),
        }
    }

    /// Exchange tag stamped on cached books.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Store a reconciled book as the current state for its pair.
    pub fn insert(&self, book: OrderBook) {
        let mut books = self.books.write();
        books.insert(book.asset_pair.clone(), book);
    }

    /// Apply a one-sided update directly to the cached book.
    ///
    /// Creates the book if the pair is unknown; the untouched side is
    /// preserved. Used by the resync refill, which receives half books from
    /// the snapshot provider.
    pub fn apply_half(&self, half: &HalfBook) {
        let mut books = self.books.write();
        let book = books.entry(half.asset_pair.clone()).or_insert_with(|| {
            OrderBook::new(self.source.clone(), half.asset_pair.clone(), half.timestamp)
        });
        book.apply_half(half);
    }

    /// Get the current book for a pair, or `None` if the pair is unknown.
    pub fn get(&self, asset_pair: &str) -> Option<OrderBook> {
        self.books.read().get(asset_pair).cloned()
    }

    /// Snapshot of all current books.
    pub fn books(&self) -> Vec<OrderBook> {
        self.books.read().values().cloned().collect()
    }

    /// All cached asset pairs.
    pub fn instruments(&self) -> Vec<String> {
        self.books.read().keys().cloned().collect()
    }

    /// Best bid/ask view per cached instrument.
    ///
    /// An absent side is reported as zero, matching the query surface
    /// contract for partially-seen books.
    pub fn tick_views(&self) -> Vec<TickPrice> {
        self.books
            .read()
            .values()
            .map(|book| {
                TickPrice::new(
                    book.source.clone(),
                    book.asset_pair.clone(),
                    book.timestamp,
                    book.best_ask().unwrap_or(Decimal::ZERO),
                    book.best_bid().unwrap_or(Decimal::ZERO),
                )
            })
            .collect()
    }

    /// Number of cached instruments.
    pub fn len(&self) -> usize {
        self.books.read().len()
    }

    /// Whether the cache holds no books.
    pub fn is_empty(&self) -> bool {
        self.books.read().is_empty()
    }
}
