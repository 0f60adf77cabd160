//! Synthetic video source and its track registry

use crate::config::{DeliveryMode, SourceConfig};
use crate::event::{EventStream, SourceEvent};
use crate::sink::{Delivery, SinkContext, TrackSink};
use crate::track::Track;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Instant;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};
use vidinject_core::{SourceId, TrackId, VidInjectError, VidInjectResult};
use vidinject_media::{MediaPipeline, NullPipeline, PlanarFrameBuffer, RawFrame};

/// Summary of one `on_frame` broadcast
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    /// Sequence number assigned to the frame
    pub sequence: u64,
    /// Live tracks the frame was offered to
    pub recipients: usize,
    /// Tracks that handed the frame to the pipeline inline
    pub forwarded: usize,
    /// Tracks that accepted the frame into their queue
    pub queued: usize,
    /// Tracks that lost the frame (full queue or pipeline error)
    pub dropped: usize,
    /// Tracks that ended between enumeration and delivery
    pub skipped: usize,
}

impl BroadcastReport {
    fn record(&mut self, delivery: Delivery) {
        match delivery {
            Delivery::Forwarded => self.forwarded += 1,
            Delivery::Queued => self.queued += 1,
            Delivery::Dropped => self.dropped += 1,
            Delivery::Skipped => self.skipped += 1,
        }
    }
}

pub(crate) struct SourceShared {
    id: SourceId,
    config: SourceConfig,
    pipeline: Arc<dyn MediaPipeline>,
    registry: Mutex<HashMap<TrackId, Arc<TrackSink>>>,
    sequence: AtomicU64,
    started_at: Instant,
    events: broadcast::Sender<SourceEvent>,
}

impl SourceShared {
    fn sink_context(self: &Arc<Self>) -> SinkContext {
        let queue = match self.config.delivery {
            DeliveryMode::Queued { capacity } => Some(capacity),
            DeliveryMode::Inline => None,
        };

        SinkContext {
            source_id: self.id,
            source: Arc::downgrade(self),
            pipeline: self.pipeline.clone(),
            events: self.events.clone(),
            queue,
        }
    }

    /// Create a live sink and register it for broadcasts
    pub(crate) fn attach(self: &Arc<Self>, parent: Option<TrackId>) -> Arc<TrackSink> {
        let sink = TrackSink::live(self.sink_context(), parent.clone());
        let count = {
            let mut registry = self.registry.lock();
            registry.insert(sink.id().clone(), sink.clone());
            registry.len()
        };

        debug!(
            "Source {} attached track {} ({} attached)",
            self.config.label,
            sink.id(),
            count
        );
        if parent.is_none() {
            let _ = self.events.send(SourceEvent::TrackCreated {
                source_id: self.id,
                track_id: sink.id().clone(),
            });
        }
        sink
    }

    /// Remove a sink from the broadcast set
    pub(crate) fn detach(&self, track_id: &TrackId) {
        let removed = self.registry.lock().remove(track_id);
        if removed.is_some() {
            debug!("Source {} detached track {}", self.config.label, track_id);
        }
    }

    fn on_frame(&self, frame: &RawFrame<'_>) -> VidInjectResult<BroadcastReport> {
        if let Err(e) = frame.validate() {
            warn!("Source {} rejected frame: {}", self.config.label, e);
            let _ = self.events.send(SourceEvent::FrameRejected {
                source_id: self.id,
                reason: e.to_string(),
            });
            return Err(e);
        }

        let timestamp_us = self.started_at.elapsed().as_micros() as u64;
        let sequence = self.sequence.fetch_add(1, Ordering::Relaxed);
        let buffer = PlanarFrameBuffer::from_raw(frame, sequence, timestamp_us)?;

        // the recipient set is fixed here; delivery happens without the lock
        let recipients: Vec<Arc<TrackSink>> = {
            let registry = self.registry.lock();
            registry
                .values()
                .filter(|sink| !sink.is_ended())
                .cloned()
                .collect()
        };

        let mut report = BroadcastReport {
            sequence,
            recipients: recipients.len(),
            ..Default::default()
        };
        for sink in &recipients {
            report.record(sink.offer(buffer.clone()));
        }

        debug!(
            "Source {} broadcast frame #{} ({}x{}) to {} tracks",
            self.config.label,
            sequence,
            buffer.width(),
            buffer.height(),
            report.recipients
        );
        let _ = self.events.send(SourceEvent::FrameBroadcast {
            source_id: self.id,
            sequence,
            width: buffer.width(),
            height: buffer.height(),
            recipients: report.recipients,
        });

        Ok(report)
    }
}

impl Drop for SourceShared {
    fn drop(&mut self) {
        let registry = std::mem::take(self.registry.get_mut());
        for sink in registry.values() {
            sink.mark_source_detached();
        }

        info!(
            "Video source {} closed with {} tracks attached",
            self.config.label,
            registry.len()
        );
        let _ = self.events.send(SourceEvent::SourceClosed {
            source_id: self.id,
            attached_tracks: registry.len(),
        });
    }
}

/// A video source fed with caller-produced I420 frames
///
/// Handles are cheap to clone and share one track registry. The source has
/// no ended state: it lives until the last handle is dropped, after which
/// its tracks stay live but receive no more frames.
///
/// # Example
/// ```rust
/// use vidinject::{RawFrame, VideoSource};
///
/// let source = VideoSource::new();
/// let track = source.create_track();
///
/// let data = vec![0u8; 640 * 480 * 3 / 2];
/// let report = source.on_frame(&RawFrame::new(640, 480, &data))?;
/// assert_eq!(report.recipients, 1);
///
/// track.stop();
/// assert!(track.ended());
/// # Ok::<(), vidinject::VidInjectError>(())
/// ```
#[derive(Clone)]
pub struct VideoSource {
    inner: Arc<SourceShared>,
}

impl VideoSource {
    /// Create a source with default settings that feeds a [`NullPipeline`]
    pub fn new() -> Self {
        Self::from_parts(SourceConfig::default(), Arc::new(NullPipeline))
    }

    /// Create a source with default settings that feeds `pipeline`
    pub fn with_pipeline(pipeline: Arc<dyn MediaPipeline>) -> Self {
        Self::from_parts(SourceConfig::default(), pipeline)
    }

    /// Create a source builder
    pub fn builder() -> VideoSourceBuilder {
        VideoSourceBuilder::new()
    }

    fn from_parts(config: SourceConfig, pipeline: Arc<dyn MediaPipeline>) -> Self {
        let (events, _) = broadcast::channel(config.event_capacity);
        let id = SourceId::new();
        info!("📹 Creating video source {} ({})", config.label, id);

        Self {
            inner: Arc::new(SourceShared {
                id,
                config,
                pipeline,
                registry: Mutex::new(HashMap::new()),
                sequence: AtomicU64::new(0),
                started_at: Instant::now(),
                events,
            }),
        }
    }

    pub(crate) fn from_shared(inner: Arc<SourceShared>) -> Self {
        Self { inner }
    }

    /// Inject one frame and broadcast it to every live track
    ///
    /// Validation runs before anything else; a rejected frame returns its
    /// error here and reaches no track. The caller's buffer is copied, so it
    /// may be reused as soon as this returns.
    pub fn on_frame(&self, frame: &RawFrame<'_>) -> VidInjectResult<BroadcastReport> {
        self.inner.on_frame(frame)
    }

    /// Create a new live track subscribed to this source
    pub fn create_track(&self) -> Track {
        let sink = self.inner.attach(None);
        info!(
            "Created track {} on source {}",
            sink.id(),
            self.inner.config.label
        );
        Track::new(sink)
    }

    /// Get source ID
    pub fn id(&self) -> SourceId {
        self.inner.id
    }

    /// Get source configuration
    pub fn config(&self) -> &SourceConfig {
        &self.inner.config
    }

    /// Whether the content is screen capture
    pub fn is_screencast(&self) -> bool {
        self.inner.config.is_screencast
    }

    /// Denoising hint passed on to the encoder
    pub fn needs_denoising(&self) -> Option<bool> {
        self.inner.config.needs_denoising
    }

    /// Number of tracks currently receiving broadcasts
    pub fn track_count(&self) -> usize {
        self.inner.registry.lock().len()
    }

    /// IDs of the tracks currently receiving broadcasts
    pub fn track_ids(&self) -> Vec<TrackId> {
        let mut ids: Vec<TrackId> = self.inner.registry.lock().keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Number of frames accepted so far
    pub fn frames_broadcast(&self) -> u64 {
        self.inner.sequence.load(Ordering::Relaxed)
    }

    /// Subscribe to source and track events
    pub fn events(&self) -> EventStream {
        EventStream::new(self.inner.events.subscribe())
    }

    /// Get a handle that does not keep the source alive
    pub fn downgrade(&self) -> WeakVideoSource {
        WeakVideoSource {
            id: self.inner.id,
            inner: Arc::downgrade(&self.inner),
        }
    }
}

impl Default for VideoSource {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for VideoSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VideoSource")
            .field("id", &self.inner.id)
            .field("label", &self.inner.config.label)
            .field("is_screencast", &self.inner.config.is_screencast)
            .field("needs_denoising", &self.inner.config.needs_denoising)
            .field("tracks", &self.track_count())
            .finish()
    }
}

/// Non-owning handle to a [`VideoSource`]
///
/// Every operation fails with [`VidInjectError::UseAfterDestroy`] once the
/// source has been dropped.
#[derive(Debug, Clone)]
pub struct WeakVideoSource {
    id: SourceId,
    inner: Weak<SourceShared>,
}

impl WeakVideoSource {
    /// ID of the source this handle points to
    pub fn id(&self) -> SourceId {
        self.id
    }

    /// Whether the source is still alive
    pub fn is_alive(&self) -> bool {
        self.inner.strong_count() > 0
    }

    /// Get an owning handle to the source
    pub fn upgrade(&self) -> VidInjectResult<VideoSource> {
        self.inner
            .upgrade()
            .map(VideoSource::from_shared)
            .ok_or_else(|| VidInjectError::use_after_destroy(format!("video source {}", self.id)))
    }

    /// Inject a frame into the source
    pub fn on_frame(&self, frame: &RawFrame<'_>) -> VidInjectResult<BroadcastReport> {
        self.upgrade()?.on_frame(frame)
    }

    /// Create a track on the source
    pub fn create_track(&self) -> VidInjectResult<Track> {
        Ok(self.upgrade()?.create_track())
    }
}

/// Fluent builder for source configuration
#[derive(Default)]
pub struct VideoSourceBuilder {
    config: SourceConfig,
    pipeline: Option<Arc<dyn MediaPipeline>>,
}

impl VideoSourceBuilder {
    /// Create a builder with default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the whole configuration
    pub fn config(mut self, config: SourceConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the source label
    pub fn label(mut self, label: &str) -> Self {
        self.config.label = label.to_string();
        self
    }

    /// Mark the content as screen capture
    pub fn screencast(mut self, is_screencast: bool) -> Self {
        self.config.is_screencast = is_screencast;
        self
    }

    /// Set the denoising hint
    pub fn needs_denoising(mut self, needs_denoising: bool) -> Self {
        self.config.needs_denoising = Some(needs_denoising);
        self
    }

    /// Deliver through per-track queues of `capacity` frames
    pub fn queued(mut self, capacity: usize) -> Self {
        self.config.delivery = DeliveryMode::Queued { capacity };
        self
    }

    /// Deliver on the `on_frame` thread; see [`DeliveryMode::Inline`]
    pub fn inline(mut self) -> Self {
        self.config.delivery = DeliveryMode::Inline;
        self
    }

    /// Set the pipeline frames are delivered to
    pub fn pipeline(mut self, pipeline: Arc<dyn MediaPipeline>) -> Self {
        self.pipeline = Some(pipeline);
        self
    }

    /// Validate the configuration and create the source
    pub fn build(self) -> VidInjectResult<VideoSource> {
        self.config.validate()?;

        let pipeline = self.pipeline.unwrap_or_else(|| Arc::new(NullPipeline));
        Ok(VideoSource::from_parts(self.config, pipeline))
    }
}
