//! 5Q subscore calculators and the coupling engine producing the final
//! Risk-Priority Index.
//!
//! Each calculator is a pure function of (record, classifier, signals);
//! `RpiCalculator` runs all five, applies the cross-signal gates and
//! penalties, and plugs into the core pipeline as its `RecordScorer`.

pub mod classifier;
pub mod coupling;
pub mod cwe;
pub mod q1;
pub mod q2;
pub mod q3;
pub mod q4;
pub mod q5;
pub mod signal;

pub use coupling::RpiCalculator;
pub use signal::SignalSummary;
