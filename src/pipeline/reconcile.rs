//! Reconciliation of one-sided updates into full books.
//!
//! The reconciler keeps the most recent half book per instrument and side,
//! and produces a candidate full book whenever a new half arrives, using the
//! opposite side's last known value. Unseen instruments are bootstrapped
//! from the snapshot provider; bootstrap is fail-open, so a provider outage
//! degrades to "no book known yet" and never blocks ingestion.

use std::sync::Arc;

use parking_lot::Mutex;
use rust_decimal::Decimal;
use rustc_hash::FxHashMap;
use tracing::{debug, info, warn};

use crate::client::SnapshotProvider;
use crate::orderbook::{OrderBook, OrderBookCache};
use crate::sink::TickPriceSink;
use crate::types::{HalfBook, Side};

use super::consolidate::consolidate_levels;
use super::dedup::DedupCache;
use super::throttle::RateLimiter;

type HalfKey = (String, Side);

fn half_key(asset_pair: &str, side: Side) -> HalfKey {
    (asset_pair.to_uppercase(), side)
}

/// Merges incoming half books with the opposite side's last known state.
///
/// The half-book map is shared mutable state: the upstream delivery
/// mechanism may invoke the ingestion path concurrently, so access is
/// locked rather than assumed serial. The lock is released across the
/// provider call and across publishes.
pub struct HalfBookReconciler {
    cache: Arc<OrderBookCache>,
    provider: Arc<dyn SnapshotProvider>,
    tick_sink: Arc<dyn TickPriceSink>,
    halves: Mutex<FxHashMap<HalfKey, HalfBook>>,
    book_limiter: RateLimiter,
    tick_limiter: RateLimiter,
    tick_dedup: DedupCache<(Decimal, Decimal)>,
}

impl HalfBookReconciler {
    /// Create a reconciler feeding the given cache and tick sink.
    ///
    /// `max_events_per_second` is the per-instrument ceiling applied
    /// independently to the book and tick streams; 0 disables throttling.
    pub fn new(
        cache: Arc<OrderBookCache>,
        provider: Arc<dyn SnapshotProvider>,
        tick_sink: Arc<dyn TickPriceSink>,
        max_events_per_second: u32,
    ) -> Self {
        Self {
            cache,
            provider,
            tick_sink,
            halves: Mutex::new(FxHashMap::default()),
            book_limiter: RateLimiter::new(max_events_per_second),
            tick_limiter: RateLimiter::new(max_events_per_second),
            tick_dedup: DedupCache::new(),
        }
    }

    /// Reconcile one incoming half book.
    ///
    /// Consolidates duplicate levels, merges with the opposite side, drops
    /// crossed candidates, and forwards the result to the cache and the
    /// tick stream. Failures are logged and isolated to this instrument.
    pub async fn submit(&self, half: HalfBook) {
        let mut half = half;
        half.levels = consolidate_levels(&half.levels);

        self.seed_if_unseen(&half).await;

        let other = {
            let mut halves = self.halves.lock();
            halves.insert(half_key(&half.asset_pair, half.side), half.clone());
            halves
                .get(&half_key(&half.asset_pair, half.side.opposite()))
                .cloned()
        }
        .unwrap_or_else(|| HalfBook::empty(half.asset_pair.clone(), half.side.opposite()));

        let timestamp = half.timestamp.max(other.timestamp);
        let mut book = OrderBook::new(self.cache.source(), half.asset_pair.clone(), timestamp);
        match half.side {
            Side::Buy => {
                book.bids = half.levels;
                book.asks = other.levels;
            }
            Side::Sell => {
                book.asks = half.levels;
                book.bids = other.levels;
            }
        }

        // Two halves captured at different times can momentarily cross; the
        // candidate is outdated input, not an error.
        if book.is_crossed() {
            debug!(asset_pair = %book.asset_pair, "dropping crossed candidate book");
            return;
        }

        let asset_pair = book.asset_pair.clone();
        let tick = book.tick_price();

        if self.book_limiter.should_throttle(&asset_pair) {
            debug!(%asset_pair, "order book update throttled");
        } else {
            self.cache.insert(book);
        }

        let Some(tick) = tick else { return };
        if self.tick_limiter.should_throttle(&asset_pair) {
            debug!(%asset_pair, "tick price throttled");
            return;
        }
        if self
            .tick_dedup
            .update_and_check_changed(&asset_pair, (tick.ask, tick.bid))
        {
            if let Err(error) = self.tick_sink.publish(&tick).await {
                warn!(%error, %asset_pair, "tick price publish failed");
            }
        }
    }

    /// Seed both sides of an instrument seen for the first time.
    ///
    /// Seeds from the snapshot provider when it answers, otherwise with
    /// empty sides at the minimum timestamp. Live updates that raced ahead
    /// win over seeds.
    async fn seed_if_unseen(&self, half: &HalfBook) {
        let buy_key = half_key(&half.asset_pair, Side::Buy);
        let sell_key = half_key(&half.asset_pair, Side::Sell);

        {
            let halves = self.halves.lock();
            if halves.contains_key(&buy_key) || halves.contains_key(&sell_key) {
                return;
            }
        }

        let (buy, sell) = match self.provider.get_raw_book(&half.asset_pair).await {
            Ok(raws) => {
                let pick = |is_buy: bool| {
                    raws.iter()
                        .find(|raw| raw.is_buy == is_buy)
                        .cloned()
                        .map(|raw| {
                            let mut seeded = HalfBook::from(raw);
                            seeded.levels = consolidate_levels(&seeded.levels);
                            seeded
                        })
                        .unwrap_or_else(|| {
                            HalfBook::empty(half.asset_pair.clone(), Side::from(is_buy))
                        })
                };
                (pick(true), pick(false))
            }
            Err(error) => {
                info!(
                    %error,
                    asset_pair = %half.asset_pair,
                    "order book bootstrap failed, starting from an empty book"
                );
                (
                    HalfBook::empty(half.asset_pair.clone(), Side::Buy),
                    HalfBook::empty(half.asset_pair.clone(), Side::Sell),
                )
            }
        };

        let mut halves = self.halves.lock();
        halves.entry(buy_key).or_insert(buy);
        halves.entry(sell_key).or_insert(sell);
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
    use rust_decimal_macros::dec;

    fn ts(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(secs, 0).unwrap()
    }

    fn half(pair: &str, side: Side, secs: i64, levels: &[(Decimal, Decimal)]) -> HalfBook {
        HalfBook {
            asset_pair: pair.to_string(),
            side,
            timestamp: ts(secs),
            levels: levels.iter().map(|&(p, v)| PriceLevel::new(p, v)).collect(),
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

    struct StubProvider {
        raws: Vec<RawOrderBookMsg>,
        fail: bool,
    }

    #[async_trait]
    impl SnapshotProvider for StubProvider {
        async fn get_raw_book(&self, asset_pair: &str) -> Result<Vec<RawOrderBookMsg>, Error> {
            if self.fail {
                return Err(Error::Provider(format!("no snapshot for {asset_pair}")));
            }
            Ok(self.raws.clone())
        }
    }

    fn reconciler(
        provider: Arc<dyn SnapshotProvider>,
        limit: u32,
    ) -> (HalfBookReconciler, Arc<OrderBookCache>, Arc<RecordingTickSink>) {
        let cache = Arc::new(OrderBookCache::new("testex"));
        let sink = Arc::new(RecordingTickSink::default());
        let r = HalfBookReconciler::new(
            Arc::clone(&cache),
            provider,
            Arc::clone(&sink) as Arc<dyn TickPriceSink>,
            limit,
        );
        (r, cache, sink)
    }

    #[test]
    fn test_buy_then_sell_builds_full_book_and_tick() {
        tokio_test::block_on(async {
            let (r, cache, sink) = reconciler(Arc::new(NoSnapshots), 0);

            r.submit(half(
                "BTCUSD",
                Side::Buy,
                1,
                &[(dec!(100), dec!(1)), (dec!(100), dec!(2))],
            ))
            .await;
            r.submit(half("BTCUSD", Side::Sell, 2, &[(dec!(101), dec!(1))]))
                .await;

            let book = cache.get("BTCUSD").unwrap();
            assert_eq!(book.bids, vec![PriceLevel::new(dec!(100), dec!(3))]);
            assert_eq!(book.asks, vec![PriceLevel::new(dec!(101), dec!(1))]);
            assert_eq!(book.timestamp, ts(2));

            let ticks = sink.ticks.lock();
            assert_eq!(ticks.len(), 1);
            assert_eq!(ticks[0].ask, dec!(101));
            assert_eq!(ticks[0].bid, dec!(100));
        });
    }

    #[tokio::test]
    async fn test_sides_stay_independent() {
        let (r, cache, _sink) = reconciler(Arc::new(NoSnapshots), 0);

        r.submit(half("BTCUSD", Side::Buy, 1, &[(dec!(100), dec!(1))]))
            .await;
        r.submit(half("BTCUSD", Side::Sell, 2, &[(dec!(101), dec!(1))]))
            .await;
        r.submit(half("BTCUSD", Side::Buy, 3, &[(dec!(99), dec!(2))]))
            .await;

        let book = cache.get("BTCUSD").unwrap();
        assert_eq!(book.best_bid(), Some(dec!(99)));
        assert_eq!(book.asks, vec![PriceLevel::new(dec!(101), dec!(1))]);
    }

    #[tokio::test]
    async fn test_crossed_candidate_never_reaches_cache_or_sink() {
        let (r, cache, sink) = reconciler(Arc::new(NoSnapshots), 0);

        r.submit(half("BTCUSD", Side::Buy, 1, &[(dec!(10.5), dec!(1))]))
            .await;
        r.submit(half("BTCUSD", Side::Sell, 2, &[(dec!(10.0), dec!(1))]))
            .await;

        // the buy-only book from the first submit is the latest valid state
        let book = cache.get("BTCUSD").unwrap();
        assert!(book.asks.is_empty());
        assert!(sink.ticks.lock().is_empty());
    }

    #[tokio::test]
    async fn test_bootstrap_seeds_opposite_side_from_provider() {
        let provider = StubProvider {
            raws: vec![
                RawOrderBookMsg {
                    asset_pair: "BTCUSD".to_string(),
                    is_buy: false,
                    timestamp: ts(5),
                    prices: vec![RawPriceLevel {
                        price: dec!(102),
                        volume: dec!(4),
                    }],
                },
                RawOrderBookMsg {
                    asset_pair: "BTCUSD".to_string(),
                    is_buy: true,
                    timestamp: ts(4),
                    prices: vec![RawPriceLevel {
                        price: dec!(98),
                        volume: dec!(1),
                    }],
                },
            ],
            fail: false,
        };
        let (r, cache, _sink) = reconciler(Arc::new(provider), 0);

        r.submit(half("BTCUSD", Side::Buy, 10, &[(dec!(100), dec!(1))]))
            .await;

        let book = cache.get("BTCUSD").unwrap();
        // live bid wins over the seeded one, asks come from the snapshot
        assert_eq!(book.best_bid(), Some(dec!(100)));
        assert_eq!(book.asks, vec![PriceLevel::new(dec!(102), dec!(4))]);
        assert_eq!(book.timestamp, ts(10));
    }

    #[tokio::test]
    async fn test_bootstrap_failure_degrades_to_empty_book() {
        let provider = StubProvider {
            raws: Vec::new(),
            fail: true,
        };
        let (r, cache, _sink) = reconciler(Arc::new(provider), 0);

        r.submit(half("BTCUSD", Side::Buy, 1, &[(dec!(100), dec!(1))]))
            .await;

        let book = cache.get("BTCUSD").unwrap();
        assert_eq!(book.best_bid(), Some(dec!(100)));
        assert!(book.asks.is_empty());
    }

    #[tokio::test]
    async fn test_identical_tick_emitted_once() {
        let (r, _cache, sink) = reconciler(Arc::new(NoSnapshots), 0);

        r.submit(half("BTCUSD", Side::Buy, 1, &[(dec!(100), dec!(1))]))
            .await;
        r.submit(half("BTCUSD", Side::Sell, 2, &[(dec!(101), dec!(1))]))
            .await;
        // same best prices, different volume: book changes, tick does not
        r.submit(half("BTCUSD", Side::Sell, 3, &[(dec!(101), dec!(9))]))
            .await;

        assert_eq!(sink.ticks.lock().len(), 1);
    }

    #[tokio::test]
    async fn test_throttled_updates_are_dropped() {
        let (r, cache, sink) = reconciler(Arc::new(NoSnapshots), 1);

        r.submit(half("BTCUSD", Side::Buy, 1, &[(dec!(100), dec!(1))]))
            .await;
        r.submit(half("BTCUSD", Side::Sell, 2, &[(dec!(101), dec!(1))]))
            .await;

        // the first submit spent the book budget for this window, so the
        // second book update is dropped; the tick window is independent
        let book = cache.get("BTCUSD").unwrap();
        assert!(book.asks.is_empty());
        assert_eq!(sink.ticks.lock().len(), 1);
    }
}
