//! Timer-driven publication of cached books and derived ticks.
//!
//! The publisher polls the cache on a fixed cadence and diffs each book
//! against the snapshot it last sent, instead of subscribing to change
//! notifications. The loop re-arms its timer only after a full iteration
//! over all instruments completes, so cycles never overlap and worst-case
//! latency is bounded by iteration cost.

use std::sync::Arc;
use std::time::Duration;

use rust_decimal::Decimal;
use rustc_hash::FxHashMap;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::client::SnapshotProvider;
use crate::orderbook::{OrderBook, OrderBookCache};
use crate::sink::{OrderBookSink, TickPriceSink};
use crate::types::HalfBook;

use super::consolidate::consolidate_levels;
use super::dedup::DedupCache;

/// Per-instrument floor between negative-spread diagnostics.
const NEGATIVE_SPREAD_LOG_INTERVAL: Duration = Duration::from_secs(60);

/// Aggregate fingerprint of a book used for change detection.
///
/// Two fingerprints are equal iff all six fields match exactly; any level
/// change that leaves all six untouched is considered not worth republishing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishSnapshot {
    sum_bid_volume: Decimal,
    sum_bid_quote_volume: Decimal,
    sum_ask_volume: Decimal,
    sum_ask_quote_volume: Decimal,
    best_bid: Decimal,
    best_ask: Decimal,
}

impl From<&OrderBook> for PublishSnapshot {
    fn from(book: &OrderBook) -> Self {
        let mut snapshot = Self {
            sum_bid_volume: Decimal::ZERO,
            sum_bid_quote_volume: Decimal::ZERO,
            sum_ask_volume: Decimal::ZERO,
            sum_ask_quote_volume: Decimal::ZERO,
            best_bid: Decimal::ZERO,
            best_ask: Decimal::ZERO,
        };

        for bid in &book.bids {
            snapshot.sum_bid_volume += bid.volume;
            snapshot.sum_bid_quote_volume += bid.volume * bid.price;
            if bid.price > snapshot.best_bid {
                snapshot.best_bid = bid.price;
            }
        }

        for ask in &book.asks {
            snapshot.sum_ask_volume += ask.volume;
            snapshot.sum_ask_quote_volume += ask.volume * ask.price;
            if ask.price < snapshot.best_ask || snapshot.best_ask <= Decimal::ZERO {
                snapshot.best_ask = ask.price;
            }
        }

        snapshot
    }
}

/// Periodic snapshot-diff publisher.
///
/// Owned by the task spawned from [`crate::ExchangeAdapter::start`]; all
/// mutable state is task-local, so cycles run without synchronization
/// beyond the cache reads.
pub struct PeriodicPublisher {
    cache: Arc<OrderBookCache>,
    provider: Arc<dyn SnapshotProvider>,
    books: Arc<dyn OrderBookSink>,
    ticks: Arc<dyn TickPriceSink>,
    book_dedup: DedupCache<PublishSnapshot>,
    tick_dedup: DedupCache<(Decimal, Decimal)>,
    interval: Duration,
    resync_interval: Duration,
    next_resync: Instant,
    negative_spread_logged: FxHashMap<String, Instant>,
    sent_books: u64,
    sent_ticks: u64,
}

impl PeriodicPublisher {
    /// Create a publisher reading from `cache` and writing to the sinks.
    pub fn new(
        cache: Arc<OrderBookCache>,
        provider: Arc<dyn SnapshotProvider>,
        books: Arc<dyn OrderBookSink>,
        ticks: Arc<dyn TickPriceSink>,
        interval: Duration,
        resync_interval: Duration,
    ) -> Self {
        Self {
            cache,
            provider,
            books,
            ticks,
            book_dedup: DedupCache::new(),
            tick_dedup: DedupCache::new(),
            interval,
            resync_interval,
            next_resync: Instant::now() + resync_interval,
            negative_spread_logged: FxHashMap::default(),
            sent_books: 0,
            sent_ticks: 0,
        }
    }

    /// Run the publish loop until `shutdown` fires.
    ///
    /// The next sleep is armed only after the previous cycle finished; an
    /// in-flight cycle completes before the loop exits.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        debug!(
            interval_ms = self.interval.as_millis() as u64,
            "periodic publisher started"
        );
        loop {
            tokio::select! {
                _ = shutdown.changed() => break,
                () = tokio::time::sleep(self.interval) => self.cycle().await,
            }
        }
        debug!("periodic publisher stopped");
    }

    /// One pass over every cached instrument.
    ///
    /// Failures while handling one instrument are logged and do not affect
    /// the others or the next cycle.
    async fn cycle(&mut self) {
        let now = Instant::now();
        let force = now >= self.next_resync;
        if force {
            self.next_resync = now + self.resync_interval;
        }

        for book in self.cache.books() {
            let tradable = matches!(
                (book.best_bid(), book.best_ask()),
                (Some(bid), Some(ask)) if ask > bid
            );

            if tradable {
                self.send_if_changed(&book, force).await;
                if force {
                    if let Err(error) = self.books.publish_thinned(&book).await {
                        warn!(%error, asset_pair = %book.asset_pair, "thinned book publish failed");
                    }
                }
            } else {
                // Forget the last-sent state so the next valid book is not
                // mistaken for a duplicate of what preceded the bad state.
                self.book_dedup.remove(&book.asset_pair);
                self.tick_dedup.remove(&book.asset_pair);
                if book.has_both_sides() {
                    self.log_negative_spread(&book, now);
                }
            }
        }

        if force {
            self.refill_missing_sides().await;
            info!(
                sent_books = self.sent_books,
                sent_ticks = self.sent_ticks,
                "order books and tick prices sent since last resync"
            );
            self.sent_books = 0;
            self.sent_ticks = 0;
        }
    }

    /// Publish the book and its tick unless unchanged since the last send.
    async fn send_if_changed(&mut self, book: &OrderBook, force: bool) {
        let snapshot = PublishSnapshot::from(book);
        let changed = self
            .book_dedup
            .update_and_check_changed(&book.asset_pair, snapshot);
        if !changed && !force {
            return;
        }

        match self.books.publish(book).await {
            Ok(()) => self.sent_books += 1,
            Err(error) => {
                warn!(%error, asset_pair = %book.asset_pair, "order book publish failed");
            }
        }

        let Some(tick) = book.tick_price() else { return };
        let tick_changed = self
            .tick_dedup
            .update_and_check_changed(&tick.asset, (tick.ask, tick.bid));
        if !tick_changed && !force {
            return;
        }

        match self.ticks.publish(&tick).await {
            Ok(()) => self.sent_ticks += 1,
            Err(error) => {
                warn!(%error, asset_pair = %tick.asset, "tick price publish failed");
            }
        }
    }

    /// Emit the negative-spread diagnostic, at most once per minute per
    /// instrument.
    fn log_negative_spread(&mut self, book: &OrderBook, now: Instant) {
        let due = self
            .negative_spread_logged
            .get(&book.asset_pair)
            .map_or(true, |last| {
                now.duration_since(*last) >= NEGATIVE_SPREAD_LOG_INTERVAL
            });
        if due {
            info!(
                asset_pair = %book.asset_pair,
                best_bid = ?book.best_bid(),
                best_ask = ?book.best_ask(),
                "negative spread detected"
            );
            self.negative_spread_logged
                .insert(book.asset_pair.clone(), now);
        }
    }

    /// Refill cached books still missing a side from the snapshot provider.
    async fn refill_missing_sides(&self) {
        let missing: Vec<String> = self
            .cache
            .books()
            .into_iter()
            .filter(|book| !book.has_both_sides())
            .map(|book| book.asset_pair)
            .collect();

        for asset_pair in missing {
            match self.provider.get_raw_book(&asset_pair).await {
                Ok(raws) => {
                    for raw in raws {
                        let mut half = HalfBook::from(raw);
                        half.levels = consolidate_levels(&half.levels);
                        self.cache.apply_half(&half);
                    }
                }
                Err(error) => {
                    debug!(%error, %asset_pair, "snapshot refill failed");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::NoSnapshots;
    use crate::error::Error;
    use crate::types::{PriceLevel, RawOrderBookMsg, RawPriceLevel, TickPrice};
    use async_trait::async_trait;
    use chrono::{DateTime, Utc};
    use parking_lot::Mutex;
    use rust_decimal_macros::dec;

    fn ts(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(secs, 0).unwrap()
    }

    fn book(
        pair: &str,
        bids: &[(Decimal, Decimal)],
        asks: &[(Decimal, Decimal)],
    ) -> OrderBook {
        let mut book = OrderBook::new("testex", pair, ts(1));
        book.bids = bids.iter().map(|&(p, v)| PriceLevel::new(p, v)).collect();
        book.asks = asks.iter().map(|&(p, v)| PriceLevel::new(p, v)).collect();
        book
    }

    #[derive(Default)]
    struct RecordingBookSink {
        books: Mutex<Vec<OrderBook>>,
        thinned: Mutex<Vec<OrderBook>>,
    }

    #[async_trait]
    impl OrderBookSink for RecordingBookSink {
        async fn publish(&self, book: &OrderBook) -> Result<(), Error> {
            self.books.lock().push(book.clone());
            Ok(())
        }

        async fn publish_thinned(&self, book: &OrderBook) -> Result<(), Error> {
            self.thinned.lock().push(book.clone());
            Ok(())
        }
    }

    #[derive(Default)]
    struct RecordingTickSink {
        ticks: Mutex<Vec<TickPrice>>,
    }

    #[async_trait]
    impl TickPriceSink for RecordingTickSink {
        async fn publish(&self, tick: &TickPrice) -> Result<(), Error> {
            self.ticks.lock().push(tick.clone());
            Ok(())
        }
    }

    struct Fixture {
        cache: Arc<OrderBookCache>,
        books: Arc<RecordingBookSink>,
        ticks: Arc<RecordingTickSink>,
        publisher: PeriodicPublisher,
    }

    fn fixture(provider: Arc<dyn SnapshotProvider>) -> Fixture {
        let cache = Arc::new(OrderBookCache::new("testex"));
        let books = Arc::new(RecordingBookSink::default());
        let ticks = Arc::new(RecordingTickSink::default());
        let publisher = PeriodicPublisher::new(
            Arc::clone(&cache),
            provider,
            Arc::clone(&books) as Arc<dyn OrderBookSink>,
            Arc::clone(&ticks) as Arc<dyn TickPriceSink>,
            Duration::from_millis(100),
            Duration::from_secs(60),
        );
        Fixture {
            cache,
            books,
            ticks,
            publisher,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_unchanged_snapshot_published_once() {
        let mut f = fixture(Arc::new(NoSnapshots));
        f.cache
            .insert(book("BTCUSD", &[(dec!(100), dec!(3))], &[(dec!(101), dec!(1))]));

        f.publisher.cycle().await;
        f.publisher.cycle().await;
        f.publisher.cycle().await;

        assert_eq!(f.books.books.lock().len(), 1);
        assert_eq!(f.ticks.ticks.lock().len(), 1);
        assert!(f.books.thinned.lock().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_changed_volume_republishes_book_but_not_tick() {
        let mut f = fixture(Arc::new(NoSnapshots));
        f.cache
            .insert(book("BTCUSD", &[(dec!(100), dec!(3))], &[(dec!(101), dec!(1))]));
        f.publisher.cycle().await;

        // same best prices, more ask volume
        f.cache
            .insert(book("BTCUSD", &[(dec!(100), dec!(3))], &[(dec!(101), dec!(5))]));
        f.publisher.cycle().await;

        assert_eq!(f.books.books.lock().len(), 2);
        assert_eq!(f.ticks.ticks.lock().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_forced_resync_republishes_unchanged_state() {
        let mut f = fixture(Arc::new(NoSnapshots));
        f.cache
            .insert(book("BTCUSD", &[(dec!(100), dec!(3))], &[(dec!(101), dec!(1))]));

        f.publisher.cycle().await;
        f.publisher.cycle().await;
        assert_eq!(f.books.books.lock().len(), 1);

        tokio::time::advance(Duration::from_secs(61)).await;
        f.publisher.cycle().await;

        assert_eq!(f.books.books.lock().len(), 2);
        assert_eq!(f.ticks.ticks.lock().len(), 2);
        // the thinned stream only carries forced snapshots
        assert_eq!(f.books.thinned.lock().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_crossed_book_is_suppressed_and_clears_dedup_state() {
        let mut f = fixture(Arc::new(NoSnapshots));
        let good = book("BTCUSD", &[(dec!(100), dec!(3))], &[(dec!(101), dec!(1))]);

        f.cache.insert(good.clone());
        f.publisher.cycle().await;
        assert_eq!(f.books.books.lock().len(), 1);

        f.cache
            .insert(book("BTCUSD", &[(dec!(10.5), dec!(1))], &[(dec!(10.0), dec!(1))]));
        f.publisher.cycle().await;
        assert_eq!(f.books.books.lock().len(), 1);

        // the same good book must not be treated as a duplicate after the
        // crossed interlude
        f.cache.insert(good);
        f.publisher.cycle().await;
        assert_eq!(f.books.books.lock().len(), 2);
        assert_eq!(f.ticks.ticks.lock().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_one_sided_book_is_not_published() {
        let mut f = fixture(Arc::new(NoSnapshots));
        f.cache.insert(book("BTCUSD", &[(dec!(100), dec!(3))], &[]));

        f.publisher.cycle().await;

        assert!(f.books.books.lock().is_empty());
        assert!(f.ticks.ticks.lock().is_empty());
    }

    struct StubProvider {
        raws: Vec<RawOrderBookMsg>,
    }

    #[async_trait]
    impl SnapshotProvider for StubProvider {
        async fn get_raw_book(&self, _asset_pair: &str) -> Result<Vec<RawOrderBookMsg>, Error> {
            Ok(self.raws.clone())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_resync_refills_missing_side_from_provider() {
        let provider = StubProvider {
            raws: vec![RawOrderBookMsg {
                asset_pair: "BTCUSD".to_string(),
                is_buy: false,
                timestamp: ts(2),
                prices: vec![RawPriceLevel {
                    price: dec!(101),
                    volume: dec!(1),
                }],
            }],
        };
        let mut f = fixture(Arc::new(provider));
        f.cache.insert(book("BTCUSD", &[(dec!(100), dec!(3))], &[]));

        tokio::time::advance(Duration::from_secs(61)).await;
        f.publisher.cycle().await;

        let refilled = f.cache.get("BTCUSD").unwrap();
        assert_eq!(refilled.best_ask(), Some(dec!(101)));
        assert_eq!(refilled.best_bid(), Some(dec!(100)));

        // the next cycle publishes the now-complete book
        f.publisher.cycle().await;
        assert_eq!(f.books.books.lock().len(), 1);
    }

    #[test]
    fn test_publish_snapshot_equality() {
        let a = PublishSnapshot::from(&book(
            "BTCUSD",
            &[(dec!(100), dec!(1)), (dec!(99), dec!(2))],
            &[(dec!(101), dec!(1))],
        ));
        let b = PublishSnapshot::from(&book(
            "BTCUSD",
            &[(dec!(99), dec!(2)), (dec!(100), dec!(1))],
            &[(dec!(101), dec!(1))],
        ));
        assert_eq!(a, b);

        let c = PublishSnapshot::from(&book(
            "BTCUSD",
            &[(dec!(100), dec!(1)), (dec!(99), dec!(3))],
            &[(dec!(101), dec!(1))],
        ));
        assert_ne!(a, c);
    }
}
