//! Time-indexed observation cache for one sensor channel.
//!
//! The decoder appends observations in timestamp order; the estimator asks,
//! once per epoch, whether something usable exists near its epoch time and
//! then loads it. Memory stays bounded because the availability check evicts
//! everything older than the tolerance window as it scans.
//!
//! # Thread Safety
//!
//! [`ObservationStore`] itself is not synchronized. Share it as a
//! [`SharedStore`] (`Arc<parking_lot::RwLock<_>>`): the decoder inserts under
//! the write lock through [`crate::sink::SinkSet`], and the estimator takes the
//! write lock for [`ObservationStore::try_consume_near`] and
//! [`ObservationStore::load`] (both mutate) and the read lock for time bounds.
//!
//! # Example
//!
//! ```
//! use nav_core::store::ObservationStore;
//!
//! let mut store = ObservationStore::new();
//! store.insert(10.0, 1.0);
//! store.insert(20.0, 2.0);
//! store.insert(30.0, 3.0);
//!
//! // Epoch at t=25 with a 3 s window: 10 and 20 are too old and get evicted,
//! // 30 is outside the window, so nothing is available yet.
//! assert!(!store.try_consume_near(25.0, 3.0));
//! assert_eq!(store.len(), 1);
//!
//! assert!(store.try_consume_near(29.0, 3.0));
//! assert_eq!(store.load(29.0, 3.0), Some(3.0));
//! ```

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

/// Scalar returned by callers that need a value even when [`ObservationStore::load`]
/// found nothing.
pub const NO_VALUE: f64 = -1e100;

/// Store shared between the decoder thread and the estimator.
pub type SharedStore = Arc<RwLock<ObservationStore>>;

/// Map key ordering timestamps with `f64::total_cmp`.
#[derive(Debug, Clone, Copy)]
struct TimeKey(f64);

impl TimeKey {
    /// Folds `-0.0` into `0.0`, which `total_cmp` would otherwise keep apart.
    fn new(timestamp: f64) -> Self {
        Self(if timestamp == 0.0 { 0.0 } else { timestamp })
    }
}

impl PartialEq for TimeKey {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for TimeKey {}

impl PartialOrd for TimeKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TimeKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

/// Ordered cache of scalar observations keyed by timestamp.
#[derive(Debug, Clone, Default)]
pub struct ObservationStore {
    entries: BTreeMap<TimeKey, f64>,
    last_value: f64,
    last_delta: f64,
}

impl ObservationStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty store wrapped for sharing across threads.
    #[must_use]
    pub fn shared() -> SharedStore {
        Arc::new(RwLock::new(Self::new()))
    }

    /// Number of held observations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if nothing is held.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Inserts an observation unless one already exists at exactly `timestamp`.
    ///
    /// First write wins; a duplicate timestamp is silently ignored.
    pub fn insert(&mut self, timestamp: f64, value: f64) {
        self.entries.entry(TimeKey::new(timestamp)).or_insert(value);
    }

    /// Sweep-and-evict availability check.
    ///
    /// Scans forward from the earliest entry while its timestamp is no later
    /// than `query_time + tolerance`. An entry inside the tolerance window
    /// ends the scan with `true` and stays in the store; an older entry is
    /// removed and the scan continues. Returns `false` once the window is
    /// exhausted.
    ///
    /// Eviction assumes `query_time` never decreases between calls. Querying
    /// an earlier time after a later one simply reports `false` for anything
    /// already evicted.
    pub fn try_consume_near(&mut self, query_time: f64, tolerance: f64) -> bool {
        let mut evicted = 0usize;
        let available = loop {
            let Some((&TimeKey(t), _)) = self.entries.first_key_value() else {
                break false;
            };
            if t - query_time > tolerance {
                break false;
            }
            if query_time - t <= tolerance {
                break true;
            }
            self.entries.pop_first();
            evicted += 1;
        };
        if evicted > 0 {
            tracing::trace!(query_time, tolerance, evicted, "evicted stale observations");
        }
        available
    }

    /// Loads the first observation at or after `query_time`.
    ///
    /// Succeeds only if that successor lies within `tolerance` of
    /// `query_time`; a closer predecessor is never considered. On success the
    /// tracked `last_delta` and `last_value` are updated. The key set is never
    /// modified.
    pub fn load(&mut self, query_time: f64, tolerance: f64) -> Option<f64> {
        let (&TimeKey(t), &value) = self.entries.range(TimeKey::new(query_time)..).next()?;
        if (t - query_time).abs() > tolerance {
            return None;
        }
        self.last_delta = value - self.last_value;
        self.last_value = value;
        Some(value)
    }

    /// Timestamp of the earliest held observation, or `0.0` if empty.
    #[must_use]
    pub fn earliest_time(&self) -> f64 {
        self.entries.keys().next().map_or(0.0, |k| k.0)
    }

    /// Timestamp of the latest held observation, or `0.0` if empty.
    #[must_use]
    pub fn latest_time(&self) -> f64 {
        self.entries.keys().next_back().map_or(0.0, |k| k.0)
    }

    /// Value returned by the most recent successful [`Self::load`].
    #[must_use]
    pub const fn last_value(&self) -> f64 {
        self.last_value
    }

    /// Difference between the two most recently loaded values.
    ///
    /// Callers use this for slip and bump heuristics; the store does not act
    /// on it.
    #[must_use]
    pub const fn last_delta(&self) -> f64 {
        self.last_delta
    }

    /// Iterates held observations in timestamp order.
    pub fn iter(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.entries.iter().map(|(k, v)| (k.0, *v))
    }

    /// Computes statistics about the store.
    #[must_use]
    pub fn stats(&self) -> StoreStats {
        StoreStats {
            count: self.len(),
            earliest: self.entries.keys().next().map(|k| k.0),
            latest: self.entries.keys().next_back().map(|k| k.0),
            last_value: self.last_value,
            last_delta: self.last_delta,
        }
    }
}

/// Statistics about an observation store.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StoreStats {
    /// Number of held observations.
    pub count: usize,
    /// Earliest held timestamp.
    pub earliest: Option<f64>,
    /// Latest held timestamp.
    pub latest: Option<f64>,
    /// Most recently loaded value.
    pub last_value: f64,
    /// Difference between the two most recently loaded values.
    pub last_delta: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_with(times: &[f64]) -> ObservationStore {
        let mut store = ObservationStore::new();
        for (i, t) in times.iter().enumerate() {
            store.insert(*t, i as f64);
        }
        store
    }

    fn keys(store: &ObservationStore) -> Vec<f64> {
        store.iter().map(|(t, _)| t).collect()
    }

    #[test]
    fn insert_keeps_first_value_for_duplicate_timestamp() {
        let mut store = ObservationStore::new();
        store.insert(100.0, 1.5);
        store.insert(100.0, -7.0);

        assert_eq!(store.len(), 1);
        assert_eq!(store.load(100.0, 0.0), Some(1.5));
    }

    #[test]
    fn signed_zero_timestamps_share_a_key() {
        let mut store = ObservationStore::new();
        store.insert(-0.0, 1.0);
        store.insert(0.0, 2.0);

        assert_eq!(store.len(), 1);
        assert_eq!(store.load(0.0, 0.0), Some(1.0));
        assert_eq!(store.load(-0.0, 0.0), Some(1.0));
        assert!(store.earliest_time().is_sign_positive());
    }

    #[test]
    fn insert_out_of_order_stays_sorted() {
        let store = store_with(&[30.0, 10.0, 20.0]);
        assert_eq!(keys(&store), vec![10.0, 20.0, 30.0]);
    }

    #[test]
    fn sweep_evicts_old_entries_and_stops_outside_window() {
        let mut store = store_with(&[10.0, 20.0, 30.0]);

        assert!(!store.try_consume_near(25.0, 3.0));
        assert_eq!(keys(&store), vec![30.0]);
    }

    #[test]
    fn sweep_finds_entry_in_window_without_removing_it() {
        let mut store = store_with(&[10.0, 20.0, 30.0]);

        assert!(store.try_consume_near(25.0, 5.0));
        // 20 is inside [20, 30] and ends the scan; only 10 was evicted.
        assert_eq!(keys(&store), vec![20.0, 30.0]);
    }

    #[test]
    fn sweep_window_edges_are_inclusive() {
        let mut store = store_with(&[7.0]);
        assert!(store.try_consume_near(10.0, 3.0));

        let mut store = store_with(&[13.0]);
        assert!(store.try_consume_near(10.0, 3.0));
    }

    #[test]
    fn sweep_on_empty_store() {
        let mut store = ObservationStore::new();
        assert!(!store.try_consume_near(10.0, 1.0));
    }

    #[test]
    fn sweep_drains_everything_older_than_window() {
        let mut store = store_with(&[1.0, 2.0, 3.0]);
        assert!(!store.try_consume_near(100.0, 1.0));
        assert!(store.is_empty());
    }

    #[test]
    fn sweep_after_later_query_does_not_resurrect() {
        let mut store = store_with(&[10.0, 20.0, 30.0]);
        assert!(store.try_consume_near(30.0, 1.0));

        // Going backwards in time finds nothing; 10 and 20 are gone.
        assert!(!store.try_consume_near(10.0, 1.0));
        assert_eq!(keys(&store), vec![30.0]);
    }

    #[test]
    fn load_uses_successor_only() {
        let mut store = ObservationStore::new();
        store.insert(9.99, 1.0);
        store.insert(10.5, 2.0);

        // 9.99 is closer to 10.0 but only the successor counts.
        assert_eq!(store.load(10.0, 0.6), Some(2.0));
        assert_eq!(store.load(10.0, 0.4), None);
    }

    #[test]
    fn load_exact_match() {
        let mut store = ObservationStore::new();
        store.insert(10.0, 4.0);
        assert_eq!(store.load(10.0, 0.0), Some(4.0));
    }

    #[test]
    fn load_without_successor() {
        let mut store = store_with(&[1.0, 2.0]);
        assert_eq!(store.load(3.0, 10.0), None);
        assert_eq!(store.load(3.0, 10.0).unwrap_or(NO_VALUE), NO_VALUE);
    }

    #[test]
    fn load_is_repeatable_and_keeps_keys() {
        let mut store = store_with(&[10.0, 20.0, 30.0]);
        let first = store.load(19.5, 1.0);
        let second = store.load(19.5, 1.0);

        assert_eq!(first, Some(1.0));
        assert_eq!(first, second);
        assert_eq!(keys(&store), vec![10.0, 20.0, 30.0]);
    }

    #[test]
    fn load_tracks_delta_between_loads() {
        let mut store = ObservationStore::new();
        store.insert(1.0, 5.0);
        store.insert(2.0, 8.0);

        store.load(1.0, 0.1);
        assert_eq!(store.last_value(), 5.0);
        assert_eq!(store.last_delta(), 5.0);

        store.load(2.0, 0.1);
        assert_eq!(store.last_value(), 8.0);
        assert_eq!(store.last_delta(), 3.0);
    }

    #[test]
    fn failed_load_leaves_tracking_alone() {
        let mut store = ObservationStore::new();
        store.insert(1.0, 5.0);
        store.load(1.0, 0.1);
        store.load(50.0, 0.1);

        assert_eq!(store.last_value(), 5.0);
        assert_eq!(store.last_delta(), 5.0);
    }

    #[test]
    fn time_bounds() {
        let store = ObservationStore::new();
        assert_eq!(store.earliest_time(), 0.0);
        assert_eq!(store.latest_time(), 0.0);

        let store = store_with(&[12.5, 3.25, 40.0]);
        assert_eq!(store.earliest_time(), 3.25);
        assert_eq!(store.latest_time(), 40.0);
    }

    #[test]
    fn stats_reports_bounds_and_tracking() {
        let mut store = store_with(&[1.0, 2.0]);
        store.load(2.0, 0.0);

        let stats = store.stats();
        assert_eq!(stats.count, 2);
        assert_eq!(stats.earliest, Some(1.0));
        assert_eq!(stats.latest, Some(2.0));
        assert_eq!(stats.last_value, 1.0);

        let empty = ObservationStore::new().stats();
        assert_eq!(empty.count, 0);
        assert!(empty.earliest.is_none());
        assert!(empty.latest.is_none());
    }
}
