//! Shared building blocks for the meter analyzer.
//!
//! Domain models, the error type, timezone and calendar-period helpers,
//! text formatting, and the command-line settings.

pub mod error;
pub mod formatting;
pub mod models;
pub mod settings;
pub mod time_utils;

pub use error::{MeterError, Result};
