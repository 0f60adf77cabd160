//! # vidinject Diagnostics
//!
//! Debugging and diagnostic tools for vidinject.
//! Provides structured logging setup and a stats-recording pipeline that
//! reports, per track, the geometry of the frames it observed.

#![deny(missing_docs)]
#![warn(clippy::all)]

pub mod debug_logger;
pub mod stats;

// Re-export main types
pub use debug_logger::DebugLogger;
pub use stats::{StatsRecorder, StatsReport, TrackStatsEntry};
