//! Runtime layer for Meter Analyzer.
//!
//! Wires the record stores and the analysis pipeline into a single
//! [`data_manager::DataManager`] used by the command-line front end.

pub mod data_manager;

pub use meter_core as core;
pub use meter_data as data;
