//! # vidinject Core
//!
//! Shared foundation for the vidinject crates: the error taxonomy reported to
//! callers of a video source, and the stable identifiers handed out for
//! sources and tracks.

#![deny(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod id;

// Re-export main types
pub use error::{ErrorCategory, VidInjectError, VidInjectResult};
pub use id::{SourceId, TrackId};
