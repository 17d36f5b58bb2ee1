//! `nav-core`
//!
//! Core types for ingesting asynchronous, multi-rate sensor streams into a
//! navigation pipeline.
//!
//! The pipeline has three stages:
//!
//! - **I/O driver**: pushes raw byte chunks of arbitrary size (see the
//!   `nav-driver-*` crates)
//! - **Decoder**: buffers bytes in a [`LineBuffer`], parses complete records
//!   and broadcasts calibrated scalars through a [`SinkSet`]
//! - **Estimator**: queries each [`ObservationStore`] once per epoch with
//!   [`ObservationStore::try_consume_near`] and [`ObservationStore::load`]
//!
//! ## Key Types
//!
//! - [`Observation`]: timestamped scalar
//! - [`ObservationStore`] / [`SharedStore`]: time-indexed cache with lazy eviction
//! - [`StreamDecoder`]: two-phase decode contract implemented by drivers
//! - [`NavError`]: error type for buffering, parsing and configuration
//!
//! ## Example
//!
//! ```rust
//! use nav_core::{Observation, ObservationKind, ObservationStore, SinkSet};
//!
//! let store = ObservationStore::shared();
//! let sinks = SinkSet::new().with(ObservationKind::Odometer, store.clone());
//!
//! sinks.broadcast(ObservationKind::Odometer, Observation::new(100.0, -3.2));
//!
//! let mut guard = store.write();
//! assert!(guard.try_consume_near(100.001, 0.005));
//! assert_eq!(guard.load(100.0, 0.005), Some(-3.2));
//! ```

pub mod config;
pub mod decode;
pub mod error;
pub mod limits;
pub mod line_buffer;
pub mod logging;
pub mod observation;
pub mod sink;
pub mod store;

pub use decode::{BodyStatus, DecoderFactory, DecoderPhase, HeaderStatus, StreamDecoder};
pub use error::{NavError, Result};
pub use line_buffer::LineBuffer;
pub use observation::{Observation, ObservationKind};
pub use sink::{Sink, SinkSet};
pub use store::{ObservationStore, SharedStore, StoreStats, NO_VALUE};
