//! # vidinject - Synthetic Video Sources
//!
//! vidinject lets an application push its own raw I420 frames into a
//! real-time media pipeline. A [`VideoSource`] validates and copies each
//! frame, then broadcasts it to every live [`Track`] derived from it; each
//! track, clones included, has its own lifecycle and reports its frames to
//! the external pipeline under its own id.
//!
//! By default every track hands frames to the pipeline from its own
//! delivery thread, so one slow consumer never holds back the others.
//! [`DeliveryMode::Inline`] delivers on the caller's thread instead, which
//! makes counts exact as soon as `on_frame` returns.
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use vidinject::{RawFrame, StatsRecorder, VideoSource};
//!
//! let stats = Arc::new(StatsRecorder::new());
//! let source = VideoSource::builder()
//!     .inline()
//!     .pipeline(stats.clone())
//!     .build()?;
//!
//! let track = source.create_track();
//! let preview = track.clone();
//!
//! let frame = vec![0u8; 640 * 480 * 3 / 2];
//! source.on_frame(&RawFrame::new(640, 480, &frame))?;
//!
//! track.stop();
//! source.on_frame(&RawFrame::new(640, 480, &frame))?;
//!
//! assert_eq!(stats.frames_received(track.id()), 1);
//! assert_eq!(stats.frames_received(preview.id()), 2);
//! # Ok::<(), vidinject::VidInjectError>(())
//! ```

#![deny(missing_docs)]
#![warn(clippy::all)]

// Re-export core types for easy access
pub use vidinject_core::{ErrorCategory, SourceId, TrackId, VidInjectError, VidInjectResult};
pub use vidinject_media::{
    i420_buffer_size, FrameLayout, FrameValidator, MediaPipeline, NullPipeline,
    PlanarFrameBuffer, RawFrame, VideoResolution, VideoRotation,
};

#[cfg(feature = "diagnostics")]
pub use vidinject_diagnostics::{DebugLogger, StatsRecorder, StatsReport, TrackStatsEntry};

// Public API modules
pub mod config;
pub mod event;
mod sink;
pub mod source;
pub mod track;

// Re-export main API types
pub use config::{DeliveryMode, SourceConfig};
pub use event::{EventStream, SourceEvent};
pub use sink::TrackDeliveryStats;
pub use source::{BroadcastReport, VideoSource, VideoSourceBuilder, WeakVideoSource};
pub use track::{Track, TrackState};
