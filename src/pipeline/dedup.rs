//! Suppression of unchanged republishes.

use parking_lot::Mutex;
use rustc_hash::FxHashMap;

/// Last-sent-value cache deciding whether an event is worth republishing.
///
/// Keys are instrument symbols, matched case-insensitively. The map sits
/// behind a single lock across all keys; dedup decisions are cheap enough
/// that sharding would not pay for itself at moderate instrument counts,
/// and per-key ordering is what the callers rely on.
#[derive(Debug)]
pub struct DedupCache<V> {
    entries: Mutex<FxHashMap<String, V>>,
}

impl<V: PartialEq> DedupCache<V> {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(FxHashMap::default()),
        }
    }

    /// Store `value` for `key` and report whether it differs from the
    /// previous value.
    ///
    /// Returns `true` the first time a key is seen or whenever the value
    /// changed; returns `false` (leaving the stored value untouched) when
    /// the value is identical, in which case the caller suppresses the
    /// emission.
    pub fn update_and_check_changed(&self, key: &str, value: V) -> bool {
        let key = key.to_uppercase();
        let mut entries = self.entries.lock();
        match entries.get(&key) {
            Some(prev) if *prev == value => false,
            _ => {
                entries.insert(key, value);
                true
            }
        }
    }

    /// Forget the stored value for `key`.
    ///
    /// Used when an instrument's book becomes crossed or one-sided, so a
    /// later valid book is never mistaken for a duplicate of stale state.
    pub fn remove(&self, key: &str) {
        self.entries.lock().remove(&key.to_uppercase());
    }

    /// Number of keys with a stored value.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Whether no key has a stored value.
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl<V: PartialEq> Default for DedupCache<V> {
    fn default() -> Self {
        Self::new()
    }
}
