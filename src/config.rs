//! Configuration for the exchange adapter.
//!
//! This module provides the [`Config`] struct describing the adapter's
//! identity, the supported-instrument allow-list, and the publish-rate
//! settings shared by the throttlers and the periodic publisher.

use std::time::Duration;

use crate::error::Error;

/// Publisher interval used when no positive event rate is configured.
const DEFAULT_PUBLISH_INTERVAL: Duration = Duration::from_millis(100);

/// Default interval between forced full resyncs.
const DEFAULT_RESYNC_INTERVAL: Duration = Duration::from_secs(60);

/// Configuration for the exchange adapter
///
/// # Example
///
/// ```rust
/// use exchange_adapter::Config;
///
/// let config = Config::new("testex")
///     .with_instruments(["BTCUSD", "ETHUSD"])
///     .with_max_events_per_second(10);
///
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone)]
pub struct Config {
    /// Exchange tag stamped on outbound books and ticks
    source: String,

    /// Supported asset pairs, matched case-insensitively
    instruments: Vec<String>,

    /// When true, updates for unlisted instruments are dropped.
    /// When false, any instrument seen on the wire is accepted.
    strict_instrument_filter: bool,

    /// Per-instrument publish ceiling in events per second; 0 disables
    max_events_per_second: u32,

    /// Interval between forced full resyncs
    resync_interval: Duration,
}

impl Config {
    /// Create a configuration for the given exchange tag.
    ///
    /// Starts with an empty instrument list and the strict filter enabled;
    /// [`Config::validate`] rejects that combination, so callers must either
    /// supply instruments or disable the filter.
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            instruments: Vec::new(),
            strict_instrument_filter: true,
            max_events_per_second: 0,
            resync_interval: DEFAULT_RESYNC_INTERVAL,
        }
    }

    /// Set the supported instrument list
    #[must_use]
    pub fn with_instruments<I, S>(mut self, instruments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.instruments = instruments.into_iter().map(Into::into).collect();
        self
    }

    /// Enable or disable the strict instrument filter
    ///
    /// With the filter disabled the adapter accepts any instrument seen on
    /// the wire, and an empty instrument list is a valid configuration.
    #[must_use]
    pub fn with_strict_instrument_filter(mut self, strict: bool) -> Self {
        self.strict_instrument_filter = strict;
        self
    }

    /// Set the per-instrument publish ceiling (events per second, 0 disables)
    #[must_use]
    pub fn with_max_events_per_second(mut self, limit: u32) -> Self {
        self.max_events_per_second = limit;
        self
    }

    /// Set the interval between forced full resyncs
    #[must_use]
    pub fn with_resync_interval(mut self, interval: Duration) -> Self {
        self.resync_interval = interval;
        self
    }

    /// Get the exchange tag
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Get the supported instruments
    pub fn instruments(&self) -> &[String] {
        &self.instruments
    }

    /// Whether unlisted instruments are dropped
    pub fn is_strict_filter(&self) -> bool {
        self.strict_instrument_filter
    }

    /// Get the publish ceiling (0 = unlimited)
    pub fn max_events_per_second(&self) -> u32 {
        self.max_events_per_second
    }

    /// Get the forced-resync interval
    pub fn resync_interval(&self) -> Duration {
        self.resync_interval
    }

    /// Interval between periodic publisher cycles.
    ///
    /// `round(1000 / max_events_per_second)` milliseconds when a positive
    /// rate is configured, otherwise 100 ms.
    pub fn publish_interval(&self) -> Duration {
        if self.max_events_per_second > 0 {
            let millis = (1000.0 / f64::from(self.max_events_per_second)).round() as u64;
            Duration::from_millis(millis)
        } else {
            DEFAULT_PUBLISH_INTERVAL
        }
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the strict filter is enabled but the
    /// instrument list is empty.
    pub fn validate(&self) -> Result<(), Error> {
        if self.strict_instrument_filter && self.instruments.is_empty() {
            return Err(Error::Config(format!(
                "no instruments configured for the {} exchange",
                self.source
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::new("testex").with_instruments(["BTCUSD"]);
        assert_eq!(config.source(), "testex");
        assert_eq!(config.instruments(), ["BTCUSD"]);
        assert!(config.is_strict_filter());
        assert_eq!(config.max_events_per_second(), 0);
        assert_eq!(config.resync_interval(), Duration::from_secs(60));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_instruments_rejected_when_strict() {
        let config = Config::new("testex");
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_empty_instruments_allowed_in_pass_through_mode() {
        let config = Config::new("testex").with_strict_instrument_filter(false);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_publish_interval_from_rate() {
        let config = Config::new("testex").with_strict_instrument_filter(false);
        assert_eq!(config.publish_interval(), Duration::from_millis(100));

        let config = config.with_max_events_per_second(4);
        assert_eq!(config.publish_interval(), Duration::from_millis(250));

        let config = config.with_max_events_per_second(3);
        assert_eq!(config.publish_interval(), Duration::from_millis(333));
    }
}
