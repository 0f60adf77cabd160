//! Caller-facing track handles

use crate::sink::{TrackDeliveryStats, TrackSink};
use crate::source::VideoSource;
use std::sync::Arc;
use tracing::debug;
use vidinject_core::{SourceId, TrackId, VidInjectError, VidInjectResult};

/// Track state enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackState {
    /// Track forwards frames broadcast by its source
    Live,
    /// Track has ended; terminal
    Ended,
}

impl std::fmt::Display for TrackState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TrackState::Live => write!(f, "live"),
            TrackState::Ended => write!(f, "ended"),
        }
    }
}

/// A subscription to a [`VideoSource`]'s frames
///
/// Each track has its own live/ended state. Stopping one never affects the
/// source or any other track, clones included. Dropping the handle stops
/// the track.
///
/// `clone()` does not produce another handle to the same track: it creates
/// a new track, with its own id, subscribed to the same source. A clone of
/// an ended track is born ended.
pub struct Track {
    sink: Arc<TrackSink>,
}

impl Track {
    pub(crate) fn new(sink: Arc<TrackSink>) -> Self {
        Self { sink }
    }

    /// Get track ID
    pub fn id(&self) -> &TrackId {
        self.sink.id()
    }

    /// Whether the track has ended
    pub fn ended(&self) -> bool {
        self.sink.is_ended()
    }

    /// Get track state
    pub fn state(&self) -> TrackState {
        if self.ended() {
            TrackState::Ended
        } else {
            TrackState::Live
        }
    }

    /// Stop the track
    ///
    /// Unsubscribes it from its source and tells the pipeline the track
    /// ended. Stopping an ended track is a no-op.
    pub fn stop(&self) {
        if !self.sink.stop() {
            debug!("Track {} already ended", self.id());
        }
    }

    /// ID of the track this one was cloned from
    pub fn parent_id(&self) -> Option<&TrackId> {
        self.sink.parent()
    }

    /// IDs of the tracks cloned from this one
    pub fn clone_ids(&self) -> Vec<TrackId> {
        self.sink.children()
    }

    /// ID of the originating source
    pub fn source_id(&self) -> SourceId {
        self.sink.source_id()
    }

    /// Get the originating source
    ///
    /// Fails with [`VidInjectError::UseAfterDestroy`] once the source has
    /// been dropped.
    pub fn source(&self) -> VidInjectResult<VideoSource> {
        self.sink
            .source()
            .map(VideoSource::from_shared)
            .ok_or_else(|| {
                VidInjectError::use_after_destroy(format!("video source {}", self.source_id()))
            })
    }

    /// Whether the originating source is still around to send frames
    pub fn is_source_attached(&self) -> bool {
        self.sink.is_source_attached()
    }

    /// Delivery counters for this track
    pub fn stats(&self) -> TrackDeliveryStats {
        self.sink.stats()
    }
}

impl Clone for Track {
    fn clone(&self) -> Self {
        Self::new(self.sink.fork())
    }
}

impl Drop for Track {
    fn drop(&mut self) {
        self.sink.stop();
    }
}

impl std::fmt::Debug for Track {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Track")
            .field("id", self.id())
            .field("ended", &self.ended())
            .finish()
    }
}
