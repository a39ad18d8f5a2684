//! Top-level adapter service wiring the pipeline together.

use std::sync::Arc;

use parking_lot::Mutex;
use rustc_hash::FxHashSet;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::client::SnapshotProvider;
use crate::config::Config;
use crate::connection::ConnectionStateMachine;
use crate::error::Error;
use crate::orderbook::OrderBookCache;
use crate::pipeline::{HalfBookReconciler, PeriodicPublisher};
use crate::sink::{OrderBookSink, TickPriceSink};
use crate::types::RawOrderBookMsg;

struct PublisherHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

/// The exchange market-data adapter.
///
/// Owns the connection lifecycle, the order book cache and the pipeline
/// stages. The external transport binding delivers raw updates through
/// [`ExchangeAdapter::handle_message`] and drains the sinks handed in at
/// construction.
///
/// # Example
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use exchange_adapter::client::NoSnapshots;
/// use exchange_adapter::sink::{ChannelBookSink, ChannelTickSink};
/// use exchange_adapter::{Config, ExchangeAdapter};
/// use tokio::sync::mpsc;
///
/// # async fn example() -> exchange_adapter::Result<()> {
/// let config = Config::new("testex").with_instruments(["BTCUSD"]);
///
/// let (book_tx, _book_rx) = mpsc::unbounded_channel();
/// let (thinned_tx, _thinned_rx) = mpsc::unbounded_channel();
/// let (tick_tx, _tick_rx) = mpsc::unbounded_channel();
///
/// let adapter = ExchangeAdapter::new(
///     config,
///     Arc::new(NoSnapshots),
///     Arc::new(ChannelBookSink::new(book_tx, thinned_tx)),
///     Arc::new(ChannelTickSink::new(tick_tx)),
/// )?;
///
/// adapter.start();
/// // feed raw updates via adapter.handle_message(...) from the transport
/// adapter.stop().await;
/// # Ok(())
/// # }
/// ```
pub struct ExchangeAdapter {
    config: Config,
    supported: FxHashSet<String>,
    connection: Arc<ConnectionStateMachine>,
    cache: Arc<OrderBookCache>,
    reconciler: HalfBookReconciler,
    provider: Arc<dyn SnapshotProvider>,
    book_sink: Arc<dyn OrderBookSink>,
    tick_sink: Arc<dyn TickPriceSink>,
    publisher: Mutex<Option<PublisherHandle>>,
}

impl ExchangeAdapter {
    /// Create an adapter with the given configuration and collaborators.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the configuration is invalid, e.g. the
    /// strict instrument filter is on but no instruments are listed.
    pub fn new(
        config: Config,
        provider: Arc<dyn SnapshotProvider>,
        book_sink: Arc<dyn OrderBookSink>,
        tick_sink: Arc<dyn TickPriceSink>,
    ) -> Result<Self, Error> {
        let connection = Arc::new(ConnectionStateMachine::new(&config)?);
        let cache = Arc::new(OrderBookCache::new(config.source()));
        let supported: FxHashSet<String> = config
            .instruments()
            .iter()
            .map(|i| i.to_uppercase())
            .collect();
        let reconciler = HalfBookReconciler::new(
            Arc::clone(&cache),
            Arc::clone(&provider),
            Arc::clone(&tick_sink),
            config.max_events_per_second(),
        );

        Ok(Self {
            config,
            supported,
            connection,
            cache,
            reconciler,
            provider,
            book_sink,
            tick_sink,
            publisher: Mutex::new(None),
        })
    }

    /// Start the adapter.
    ///
    /// Spawns the periodic publisher and opens ingestion. A no-op unless the
    /// connection is startable (initial, stopped or errored). Must be called
    /// from within a tokio runtime.
    pub fn start(&self) {
        if !self.connection.start() {
            return;
        }
        info!(source = %self.config.source(), "starting exchange adapter");

        let (shutdown, shutdown_rx) = watch::channel(false);
        let publisher = PeriodicPublisher::new(
            Arc::clone(&self.cache),
            Arc::clone(&self.provider),
            Arc::clone(&self.book_sink),
            Arc::clone(&self.tick_sink),
            self.config.publish_interval(),
            self.config.resync_interval(),
        );
        let task = tokio::spawn(publisher.run(shutdown_rx));
        *self.publisher.lock() = Some(PublisherHandle { shutdown, task });

        self.connection.mark_connected();
    }

    /// Ingest one raw half-book message from the transport.
    ///
    /// Drops the update unless the connection is active and the instrument
    /// passes the configured filter. Updates without price levels carry no
    /// information and are dropped as well.
    pub async fn handle_message(&self, raw: RawOrderBookMsg) {
        if !self.connection.is_connected() {
            debug!(asset_pair = %raw.asset_pair, "ignoring update while not connected");
            return;
        }
        if raw.prices.is_empty() {
            return;
        }
        if self.config.is_strict_filter() && !self.supported.contains(&raw.asset_pair.to_uppercase())
        {
            debug!(asset_pair = %raw.asset_pair, "dropping update for unsupported instrument");
            return;
        }

        self.reconciler.submit(raw.into()).await;
    }

    /// Stop the adapter.
    ///
    /// Closes ingestion, disarms the publisher timer and waits for an
    /// in-flight cycle to finish. No partial book state is flushed.
    /// Idempotent; the adapter can be started again afterwards.
    pub async fn stop(&self) {
        if !self.connection.stop() {
            return;
        }

        let handle = self.publisher.lock().take();
        if let Some(handle) = handle {
            let _ = handle.shutdown.send(true);
            if let Err(error) = handle.task.await {
                warn!(%error, "periodic publisher task ended abnormally");
            }
        }

        self.connection.mark_stopped();
    }

    /// The read-only query surface over the current cache.
    pub fn cache(&self) -> &OrderBookCache {
        &self.cache
    }

    /// The connection lifecycle state machine.
    pub fn connection(&self) -> &ConnectionStateMachine {
        &self.connection
    }

    /// The adapter configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }
}
