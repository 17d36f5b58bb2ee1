//! Fan-out of decoded observations to registered stores.
//!
//! A decoder owns one [`SinkSet`]. Each registered [`Sink`] declares the
//! [`ObservationKind`] it accepts, and [`SinkSet::broadcast`] delivers an
//! observation to every sink of the matching kind.
//!
//! Broadcast is atomic with respect to readers: the write locks of all
//! matching stores are taken (in registration order) before any insert and
//! released together afterwards. A reader holding one store's lock therefore
//! sees either none or all of a broadcast timestamp.

use std::sync::Arc;

use parking_lot::RwLockWriteGuard;

use crate::observation::{Observation, ObservationKind};
use crate::store::{ObservationStore, SharedStore};

/// A store registered to receive observations of one kind.
#[derive(Debug, Clone)]
pub struct Sink {
    /// Observation kind this sink accepts.
    pub kind: ObservationKind,
    /// Destination store.
    pub store: SharedStore,
}

impl Sink {
    /// Creates a sink for `kind` backed by `store`.
    #[must_use]
    pub fn new(kind: ObservationKind, store: SharedStore) -> Self {
        Self { kind, store }
    }

    /// Returns true if this sink takes observations of `kind`.
    #[must_use]
    pub fn accepts(&self, kind: ObservationKind) -> bool {
        self.kind == kind
    }
}

/// Ordered set of sinks fed by one decoder.
#[derive(Debug, Clone, Default)]
pub struct SinkSet {
    sinks: Vec<Sink>,
}

impl SinkSet {
    /// Creates an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a sink. Broadcast visits sinks in registration order.
    pub fn register(&mut self, sink: Sink) {
        self.sinks.push(sink);
    }

    /// Builder-style [`Self::register`].
    #[must_use]
    pub fn with(mut self, kind: ObservationKind, store: SharedStore) -> Self {
        self.register(Sink::new(kind, store));
        self
    }

    /// Number of registered sinks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    /// Returns true if no sinks are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }

    /// Number of sinks accepting `kind`.
    #[must_use]
    pub fn count_accepting(&self, kind: ObservationKind) -> usize {
        self.sinks.iter().filter(|s| s.accepts(kind)).count()
    }

    /// Inserts `observation` into every sink accepting `kind`.
    ///
    /// Returns the number of distinct stores the observation was delivered to.
    pub fn broadcast(&self, kind: ObservationKind, observation: Observation) -> usize {
        let mut targets: Vec<&SharedStore> = Vec::with_capacity(self.sinks.len());
        for sink in self.sinks.iter().filter(|s| s.accepts(kind)) {
            // A store registered twice for the same kind is locked once.
            if !targets.iter().any(|t| Arc::ptr_eq(t, &sink.store)) {
                targets.push(&sink.store);
            }
        }

        let mut guards: Vec<RwLockWriteGuard<'_, ObservationStore>> =
            targets.into_iter().map(|store| store.write()).collect();

        for store in &mut guards {
            store.insert(observation.timestamp, observation.value);
        }
        guards.len()
    }
}
