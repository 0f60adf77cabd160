//! Boundary towards the external media pipeline
//!
//! The encoder, packetizer and transport all live behind this trait. A
//! source calls into it once per accepted frame per track, and once when a
//! track ends.

use crate::frame::PlanarFrameBuffer;
use std::sync::Arc;
use vidinject_core::{TrackId, VidInjectResult};

/// External media pipeline consuming frames from tracks
pub trait MediaPipeline: Send + Sync {
    /// Hand one frame for `track_id` to the pipeline
    ///
    /// Fire-and-forget: implementations must not block on network I/O. An
    /// error only affects this track's copy of the frame.
    fn push_frame(&self, track_id: &TrackId, frame: PlanarFrameBuffer) -> VidInjectResult<()>;

    /// Called exactly once when `track_id` transitions to ended
    fn end_track(&self, track_id: &TrackId);
}

impl<P: MediaPipeline + ?Sized> MediaPipeline for Arc<P> {
    fn push_frame(&self, track_id: &TrackId, frame: PlanarFrameBuffer) -> VidInjectResult<()> {
        (**self).push_frame(track_id, frame)
    }

    fn end_track(&self, track_id: &TrackId) {
        (**self).end_track(track_id)
    }
}

/// Pipeline that discards everything
#[derive(Debug, Clone, Copy, Default)]
pub struct NullPipeline;

impl MediaPipeline for NullPipeline {
    fn push_frame(&self, track_id: &TrackId, frame: PlanarFrameBuffer) -> VidInjectResult<()> {
        tracing::trace!(
            "Discarding frame #{} for track {}",
            frame.sequence(),
            track_id
        );
        Ok(())
    }

    fn end_track(&self, _track_id: &TrackId) {}
}
