//! External threat-intelligence signals consumed by the ranking engine:
//! KEV catalog membership, EPSS score/percentile, and PoC availability.
//!
//! Signals are owned by a provider constructed once per batch. KEV and EPSS
//! are prefetched synchronously before scoring starts; PoC lookups may be
//! resolved lazily behind an identifier-keyed cache whose writes are
//! idempotent, so concurrent scoring tasks can share the provider freely.

pub mod cve;
pub mod feeds;
pub mod model;

pub use cve::extract_cve_id;
pub use feeds::FeedSignals;
pub use model::{EpssScore, KevEntry, PocInfo, SignalProvider, SignalSet};
