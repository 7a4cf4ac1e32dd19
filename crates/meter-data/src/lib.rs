//! Data layer for Meter Analyzer.
//!
//! Durable record logs and photo storage, plus the usage derivation,
//! period aggregation and appliance estimation that turn stored records
//! into reports.

pub mod aggregator;
pub mod analysis;
pub mod deriver;
pub mod estimator;
pub mod images;
pub mod store;

pub use meter_core as core;
