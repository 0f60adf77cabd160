//! Event system for source and track lifecycle

use tokio::sync::broadcast;
use tracing::warn;
use vidinject_core::{SourceId, TrackId};

/// Events emitted by a video source and the tracks derived from it
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceEvent {
    /// A track was created directly from the source
    TrackCreated {
        /// Originating source
        source_id: SourceId,
        /// The new track
        track_id: TrackId,
    },
    /// A track was cloned from another track
    TrackCloned {
        /// Originating source
        source_id: SourceId,
        /// Track the clone was made from
        parent_id: TrackId,
        /// The new track
        track_id: TrackId,
        /// Whether the clone started out ended
        ended: bool,
    },
    /// A track transitioned to ended
    TrackEnded {
        /// Originating source
        source_id: SourceId,
        /// The track that ended
        track_id: TrackId,
    },
    /// A frame was broadcast to the live tracks
    FrameBroadcast {
        /// Source that broadcast the frame
        source_id: SourceId,
        /// Frame sequence number
        sequence: u64,
        /// Frame width in pixels
        width: u32,
        /// Frame height in pixels
        height: u32,
        /// Number of tracks the frame was offered to
        recipients: usize,
    },
    /// A frame failed validation and was not broadcast
    FrameRejected {
        /// Source the frame was injected into
        source_id: SourceId,
        /// Validation error
        reason: String,
    },
    /// The source was dropped; attached tracks stay live but receive nothing
    SourceClosed {
        /// The source that went away
        source_id: SourceId,
        /// Tracks still attached at the time
        attached_tracks: usize,
    },
}

impl SourceEvent {
    /// Get the event type as a string
    pub fn event_type(&self) -> &'static str {
        match self {
            SourceEvent::TrackCreated { .. } => "track_created",
            SourceEvent::TrackCloned { .. } => "track_cloned",
            SourceEvent::TrackEnded { .. } => "track_ended",
            SourceEvent::FrameBroadcast { .. } => "frame_broadcast",
            SourceEvent::FrameRejected { .. } => "frame_rejected",
            SourceEvent::SourceClosed { .. } => "source_closed",
        }
    }

    /// Check if this is a track lifecycle event
    pub fn is_track_event(&self) -> bool {
        matches!(
            self,
            SourceEvent::TrackCreated { .. }
                | SourceEvent::TrackCloned { .. }
                | SourceEvent::TrackEnded { .. }
        )
    }

    /// Check if this is a per-frame event
    pub fn is_frame_event(&self) -> bool {
        matches!(
            self,
            SourceEvent::FrameBroadcast { .. } | SourceEvent::FrameRejected { .. }
        )
    }

    /// Track the event refers to, if any
    pub fn track_id(&self) -> Option<&TrackId> {
        match self {
            SourceEvent::TrackCreated { track_id, .. }
            | SourceEvent::TrackCloned { track_id, .. }
            | SourceEvent::TrackEnded { track_id, .. } => Some(track_id),
            _ => None,
        }
    }
}

/// Stream of source events for async iteration
///
/// Slow readers skip ahead rather than hold back the source: when the
/// buffer overflows the oldest events are lost and a warning is logged.
#[derive(Debug)]
pub struct EventStream {
    receiver: broadcast::Receiver<SourceEvent>,
}

impl EventStream {
    pub(crate) fn new(receiver: broadcast::Receiver<SourceEvent>) -> Self {
        Self { receiver }
    }

    /// Get the next event, `None` once the source and all its tracks are gone
    pub async fn next(&mut self) -> Option<SourceEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    warn!("Event stream lagged, {} events lost", missed);
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Try to get the next event without waiting
    pub fn try_next(&mut self) -> Option<SourceEvent> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => return Some(event),
                Err(broadcast::error::TryRecvError::Lagged(missed)) => {
                    warn!("Event stream lagged, {} events lost", missed);
                }
                Err(_) => return None,
            }
        }
    }

    /// Drain every event currently buffered
    pub fn drain(&mut self) -> Vec<SourceEvent> {
        std::iter::from_fn(|| self.try_next()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_type_classification() {
        let track_id = TrackId::from("t1");
        let created = SourceEvent::TrackCreated {
            source_id: SourceId::new(),
            track_id: track_id.clone(),
        };
        assert_eq!(created.event_type(), "track_created");
        assert!(created.is_track_event());
        assert!(!created.is_frame_event());
        assert_eq!(created.track_id(), Some(&track_id));

        let rejected = SourceEvent::FrameRejected {
            source_id: SourceId::new(),
            reason: "bad size".to_string(),
        };
        assert!(rejected.is_frame_event());
        assert!(rejected.track_id().is_none());
    }

    #[tokio::test]
    async fn test_event_stream_basic() {
        let (tx, rx) = broadcast::channel(4);
        let mut stream = EventStream::new(rx);

        tx.send(SourceEvent::SourceClosed {
            source_id: SourceId::new(),
            attached_tracks: 0,
        })
        .unwrap();

        let event = stream.next().await.unwrap();
        assert_eq!(event.event_type(), "source_closed");

        drop(tx);
        assert!(stream.next().await.is_none());
    }

    #[test]
    fn test_lagged_stream_skips_ahead() {
        let (tx, rx) = broadcast::channel(2);
        let mut stream = EventStream::new(rx);

        for sequence in 0..5 {
            tx.send(SourceEvent::FrameBroadcast {
                source_id: SourceId::new(),
                sequence,
                width: 2,
                height: 2,
                recipients: 0,
            })
            .unwrap();
        }

        let events = stream.drain();
        assert_eq!(events.len(), 2);
        assert!(matches!(
            events[0],
            SourceEvent::FrameBroadcast { sequence: 3, .. }
        ));
    }
}
