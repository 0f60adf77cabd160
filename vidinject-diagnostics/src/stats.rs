//! Per-track frame statistics
//!
//! [`StatsRecorder`] sits where the media pipeline would and records what
//! each track actually delivered downstream. Its report uses the field names
//! of a WebRTC outbound stats entry (`trackIdentifier`, `frameWidth`,
//! `frameHeight`), so the geometry a track reports can be checked against
//! the frames injected into its source.

use dashmap::DashMap;
use serde::Serialize;
use tracing::debug;
use vidinject_core::{TrackId, VidInjectResult};
use vidinject_media::{MediaPipeline, PlanarFrameBuffer};

/// Statistics observed for one track
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackStatsEntry {
    /// Track the entry belongs to
    pub track_identifier: TrackId,
    /// Width of the most recently received frame
    pub frame_width: u32,
    /// Height of the most recently received frame
    pub frame_height: u32,
    /// Number of frames received
    pub frames_received: u64,
    /// Total I420 bytes received
    pub bytes_received: u64,
    /// Source sequence number of the most recent frame
    pub last_sequence: Option<u64>,
    /// Whether the track has been ended
    pub ended: bool,
    /// How many times the pipeline was told the track ended
    pub end_calls: u32,
}

impl TrackStatsEntry {
    fn new(track_id: &TrackId) -> Self {
        Self {
            track_identifier: track_id.clone(),
            ..Default::default()
        }
    }
}

/// Snapshot of every track's statistics
#[derive(Debug, Clone, Default, Serialize)]
pub struct StatsReport {
    /// Entries ordered by track identifier
    pub tracks: Vec<TrackStatsEntry>,
}

impl StatsReport {
    /// Find the entry reported for `track_id`
    pub fn find(&self, track_id: &TrackId) -> Option<&TrackStatsEntry> {
        self.tracks
            .iter()
            .find(|entry| &entry.track_identifier == track_id)
    }

    /// Total frames received across all tracks
    pub fn total_frames(&self) -> u64 {
        self.tracks.iter().map(|entry| entry.frames_received).sum()
    }
}

/// Media pipeline that records per-track frame statistics
#[derive(Debug, Default)]
pub struct StatsRecorder {
    tracks: DashMap<TrackId, TrackStatsEntry>,
}

impl StatsRecorder {
    /// Create an empty recorder
    pub fn new() -> Self {
        Self::default()
    }

    /// Current statistics for one track
    pub fn get(&self, track_id: &TrackId) -> Option<TrackStatsEntry> {
        self.tracks.get(track_id).map(|entry| entry.value().clone())
    }

    /// Frames received for `track_id`, zero for unknown tracks
    pub fn frames_received(&self, track_id: &TrackId) -> u64 {
        self.tracks
            .get(track_id)
            .map_or(0, |entry| entry.frames_received)
    }

    /// Number of `end_track` calls seen for `track_id`
    pub fn end_calls(&self, track_id: &TrackId) -> u32 {
        self.tracks.get(track_id).map_or(0, |entry| entry.end_calls)
    }

    /// Snapshot all tracks
    pub fn report(&self) -> StatsReport {
        let mut tracks: Vec<TrackStatsEntry> = self
            .tracks
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        tracks.sort_by(|a, b| a.track_identifier.cmp(&b.track_identifier));
        StatsReport { tracks }
    }

    /// Snapshot all tracks as pretty-printed JSON
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(&self.report())
    }
}

impl MediaPipeline for StatsRecorder {
    fn push_frame(&self, track_id: &TrackId, frame: PlanarFrameBuffer) -> VidInjectResult<()> {
        let mut entry = self
            .tracks
            .entry(track_id.clone())
            .or_insert_with(|| TrackStatsEntry::new(track_id));

        entry.frame_width = frame.width();
        entry.frame_height = frame.height();
        entry.frames_received += 1;
        entry.bytes_received += frame.byte_len() as u64;
        entry.last_sequence = Some(frame.sequence());
        Ok(())
    }

    fn end_track(&self, track_id: &TrackId) {
        let mut entry = self
            .tracks
            .entry(track_id.clone())
            .or_insert_with(|| TrackStatsEntry::new(track_id));

        entry.ended = true;
        entry.end_calls += 1;
        debug!(
            "Track {} ended after {} frames",
            track_id, entry.frames_received
        );
    }
}
