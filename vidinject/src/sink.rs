//! Per-track delivery endpoint
//!
//! A [`TrackSink`] is what a video source actually broadcasts to. It owns
//! the track's live/ended gate and decides, per frame, whether the frame
//! reaches the media pipeline.
//!
//! In queued mode every sink drains its own bounded channel on a dedicated
//! thread, so `push_frame` never runs on the broadcasting thread or on an
//! async runtime worker.
//!
//! Two locks per sink. The gate guards state and is only held briefly, so
//! a pipeline that stalls on one track never blocks the broadcast loop.
//! The outlet is held across every pipeline call; `stop` flips the gate
//! first and then takes the outlet to call `end_track`, so `end_track` is
//! never followed by another `push_frame` for the same id.
//!
//! Lock order: a sink gate may be held while taking the source registry
//! lock (when forking a clone), never the other way round. The outlet is
//! never held together with either.

use crate::event::SourceEvent;
use crate::source::SourceShared;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::thread;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, trace, warn};
use vidinject_core::{SourceId, TrackId};
use vidinject_media::{MediaPipeline, PlanarFrameBuffer, VideoResolution};

/// Outcome of offering one frame to one sink
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Delivery {
    /// Handed to the pipeline on the caller's thread
    Forwarded,
    /// Accepted into the sink's queue
    Queued,
    /// Lost: queue full or the pipeline rejected it
    Dropped,
    /// Sink had already ended
    Skipped,
}

/// How frames travel from the broadcast loop to the pipeline
#[derive(Debug)]
pub(crate) enum Route {
    Inline,
    Queued(mpsc::Sender<PlanarFrameBuffer>),
}

/// Delivery counters for one track
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TrackDeliveryStats {
    /// Frames accepted by the pipeline
    pub frames_forwarded: u64,
    /// Frames lost to a full queue or a pipeline error
    pub frames_dropped: u64,
    /// Geometry of the last forwarded frame
    pub last_resolution: Option<VideoResolution>,
}

#[derive(Debug)]
struct Gate {
    ended: bool,
    route: Option<Route>,
    children: Vec<TrackId>,
}

pub(crate) struct TrackSink {
    id: TrackId,
    parent: Option<TrackId>,
    source_id: SourceId,
    source: Weak<SourceShared>,
    pipeline: Arc<dyn MediaPipeline>,
    events: broadcast::Sender<SourceEvent>,
    gate: Mutex<Gate>,
    outlet: Mutex<()>,
    // mirrors gate.ended; read under the outlet before every push
    ended: AtomicBool,
    source_detached: AtomicBool,
    frames_forwarded: AtomicU64,
    frames_dropped: AtomicU64,
    // width << 32 | height, zero until the first forwarded frame
    last_resolution: AtomicU64,
}

/// Everything a sink inherits from the source it is created for
#[derive(Clone)]
pub(crate) struct SinkContext {
    pub(crate) source_id: SourceId,
    pub(crate) source: Weak<SourceShared>,
    pub(crate) pipeline: Arc<dyn MediaPipeline>,
    pub(crate) events: broadcast::Sender<SourceEvent>,
    /// Per-sink queue capacity; `None` delivers inline
    pub(crate) queue: Option<usize>,
}

impl TrackSink {
    /// Create a live sink; with a queue configured, start its delivery thread
    pub(crate) fn live(context: SinkContext, parent: Option<TrackId>) -> Arc<Self> {
        let SinkContext {
            source_id,
            source,
            pipeline,
            events,
            queue,
        } = context;

        let (route, receiver) = match queue {
            Some(capacity) => {
                let (tx, rx) = mpsc::channel(capacity);
                (Route::Queued(tx), Some(rx))
            }
            None => (Route::Inline, None),
        };

        let sink = Arc::new(Self::with_gate(
            TrackId::new(),
            parent,
            source_id,
            source,
            pipeline,
            events,
            false,
            Some(route),
        ));

        if let Some(rx) = receiver {
            let weak = Arc::downgrade(&sink);
            let spawned = thread::Builder::new()
                .name("vidinject-sink".to_string())
                .spawn(move || drain_queue(weak, rx));

            if let Err(e) = spawned {
                warn!(
                    "Track {} could not start its delivery thread, delivering inline: {}",
                    sink.id, e
                );
                sink.gate.lock().route = Some(Route::Inline);
            }
        }

        sink
    }

    /// Create a sink that starts out ended and is never registered
    pub(crate) fn ended(context: SinkContext, parent: Option<TrackId>) -> Arc<Self> {
        Arc::new(Self::with_gate(
            TrackId::new(),
            parent,
            context.source_id,
            context.source,
            context.pipeline,
            context.events,
            true,
            None,
        ))
    }

    #[allow(clippy::too_many_arguments)]
    fn with_gate(
        id: TrackId,
        parent: Option<TrackId>,
        source_id: SourceId,
        source: Weak<SourceShared>,
        pipeline: Arc<dyn MediaPipeline>,
        events: broadcast::Sender<SourceEvent>,
        ended: bool,
        route: Option<Route>,
    ) -> Self {
        Self {
            id,
            parent,
            source_id,
            source,
            pipeline,
            events,
            gate: Mutex::new(Gate {
                ended,
                route,
                children: Vec::new(),
            }),
            outlet: Mutex::new(()),
            ended: AtomicBool::new(ended),
            source_detached: AtomicBool::new(false),
            frames_forwarded: AtomicU64::new(0),
            frames_dropped: AtomicU64::new(0),
            last_resolution: AtomicU64::new(0),
        }
    }

    pub(crate) fn id(&self) -> &TrackId {
        &self.id
    }

    pub(crate) fn parent(&self) -> Option<&TrackId> {
        self.parent.as_ref()
    }

    pub(crate) fn source_id(&self) -> SourceId {
        self.source_id
    }

    pub(crate) fn source(&self) -> Option<Arc<SourceShared>> {
        self.source.upgrade()
    }

    pub(crate) fn is_ended(&self) -> bool {
        self.ended.load(Ordering::Acquire)
    }

    pub(crate) fn is_source_attached(&self) -> bool {
        !self.source_detached.load(Ordering::Acquire) && self.source.strong_count() > 0
    }

    pub(crate) fn children(&self) -> Vec<TrackId> {
        self.gate.lock().children.clone()
    }

    pub(crate) fn stats(&self) -> TrackDeliveryStats {
        let packed = self.last_resolution.load(Ordering::Relaxed);
        let last_resolution = (packed != 0).then(|| {
            VideoResolution::new((packed >> 32) as u32, (packed & 0xffff_ffff) as u32)
        });
        TrackDeliveryStats {
            frames_forwarded: self.frames_forwarded.load(Ordering::Relaxed),
            frames_dropped: self.frames_dropped.load(Ordering::Relaxed),
            last_resolution,
        }
    }

    /// Offer one broadcast frame to this sink
    pub(crate) fn offer(&self, frame: PlanarFrameBuffer) -> Delivery {
        {
            let gate = self.gate.lock();
            if gate.ended {
                trace!("Track {} ended, skipping frame #{}", self.id, frame.sequence());
                return Delivery::Skipped;
            }

            match &gate.route {
                Some(Route::Queued(tx)) => {
                    return match tx.try_send(frame) {
                        Ok(()) => Delivery::Queued,
                        Err(mpsc::error::TrySendError::Full(frame)) => {
                            self.frames_dropped.fetch_add(1, Ordering::Relaxed);
                            warn!(
                                "Track {} queue full, dropping frame #{}",
                                self.id,
                                frame.sequence()
                            );
                            Delivery::Dropped
                        }
                        Err(mpsc::error::TrySendError::Closed(_)) => Delivery::Skipped,
                    };
                }
                Some(Route::Inline) => {}
                None => return Delivery::Skipped,
            }
        }

        self.forward(frame)
    }

    /// Hand a frame to the pipeline unless the sink ended in the meantime
    fn forward(&self, frame: PlanarFrameBuffer) -> Delivery {
        let _outlet = self.outlet.lock();
        if self.is_ended() {
            trace!(
                "Track {} ended, discarding frame #{}",
                self.id,
                frame.sequence()
            );
            return Delivery::Skipped;
        }

        let sequence = frame.sequence();
        let resolution = frame.resolution();

        match self.pipeline.push_frame(&self.id, frame) {
            Ok(()) => {
                self.frames_forwarded.fetch_add(1, Ordering::Relaxed);
                self.last_resolution.store(
                    (u64::from(resolution.width) << 32) | u64::from(resolution.height),
                    Ordering::Relaxed,
                );
                trace!("Track {} forwarded frame #{}", self.id, sequence);
                Delivery::Forwarded
            }
            Err(e) => {
                self.frames_dropped.fetch_add(1, Ordering::Relaxed);
                warn!("Track {} failed to forward frame #{}: {}", self.id, sequence, e);
                Delivery::Dropped
            }
        }
    }

    /// Transition to ended; returns false if the sink had already ended
    pub(crate) fn stop(&self) -> bool {
        {
            let mut gate = self.gate.lock();
            if gate.ended {
                return false;
            }
            gate.ended = true;
            // closes the queue; its thread discards what is left and exits
            gate.route = None;
            self.ended.store(true, Ordering::Release);
        }

        {
            // waits out a push already in flight
            let _outlet = self.outlet.lock();
            self.pipeline.end_track(&self.id);
        }

        if let Some(source) = self.source.upgrade() {
            source.detach(&self.id);
        }

        info!("Track {} ended", self.id);
        let _ = self.events.send(SourceEvent::TrackEnded {
            source_id: self.source_id,
            track_id: self.id.clone(),
        });
        true
    }

    /// Create an independent sink with this sink's state at the instant of cloning
    pub(crate) fn fork(&self) -> Arc<TrackSink> {
        let mut gate = self.gate.lock();

        let context = SinkContext {
            source_id: self.source_id,
            source: self.source.clone(),
            pipeline: self.pipeline.clone(),
            events: self.events.clone(),
            queue: None,
        };

        let child = if gate.ended {
            TrackSink::ended(context, Some(self.id.clone()))
        } else if let Some(source) = self.source.upgrade() {
            source.attach(Some(self.id.clone()))
        } else {
            debug!(
                "Source {} gone, clone of track {} will receive no frames",
                self.source_id, self.id
            );
            let child = TrackSink::live(context, Some(self.id.clone()));
            child.mark_source_detached();
            child
        };

        gate.children.push(child.id.clone());
        drop(gate);

        info!(
            "Track {} cloned into {} (ended: {})",
            self.id,
            child.id,
            child.is_ended()
        );
        let _ = self.events.send(SourceEvent::TrackCloned {
            source_id: self.source_id,
            parent_id: self.id.clone(),
            track_id: child.id.clone(),
            ended: child.is_ended(),
        });

        child
    }

    /// Called when the originating source goes away
    pub(crate) fn mark_source_detached(&self) {
        if !self.source_detached.swap(true, Ordering::AcqRel) {
            debug!(
                "Track {} detached from source {}, no further frames will arrive",
                self.id, self.source_id
            );
        }
    }
}

impl std::fmt::Debug for TrackSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrackSink")
            .field("id", &self.id)
            .field("ended", &self.is_ended())
            .field("source_id", &self.source_id)
            .finish()
    }
}

/// Delivery thread body; exits once the sink stops or is dropped
fn drain_queue(sink: Weak<TrackSink>, mut rx: mpsc::Receiver<PlanarFrameBuffer>) {
    while let Some(frame) = rx.blocking_recv() {
        let Some(sink) = sink.upgrade() else {
            break;
        };
        sink.forward(frame);
    }
}
