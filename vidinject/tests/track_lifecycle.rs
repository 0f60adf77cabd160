//! Integration tests for video source fan-out and track lifecycle
//!
//! These tests drive a source the way an application would: create tracks,
//! clone and stop them between frames, and check what the pipeline saw for
//! each track id. Sources deliver inline so counts are exact as soon as
//! `on_frame` returns; threaded delivery is covered in `queued_delivery.rs`.

use std::sync::Arc;
use tokio_test::{assert_err, assert_ok};
use vidinject::*;

const WIDTH: u32 = 640;
const HEIGHT: u32 = 480;

fn vga_frame() -> Vec<u8> {
    vec![0u8; i420_buffer_size(WIDTH, HEIGHT).unwrap()]
}

fn inline_source(pipeline: Arc<dyn MediaPipeline>) -> VideoSource {
    VideoSource::builder()
        .inline()
        .pipeline(pipeline)
        .build()
        .unwrap()
}

fn source_with_stats() -> (VideoSource, Arc<StatsRecorder>) {
    let stats = Arc::new(StatsRecorder::new());
    (inline_source(stats.clone()), stats)
}

// ============================================================================
// FRAME INJECTION TESTS
// ============================================================================

#[test]
fn test_frame_before_any_track_is_accepted() {
    let source = VideoSource::new();
    let data = vga_frame();

    let report = assert_ok!(source.on_frame(&RawFrame::new(WIDTH, HEIGHT, &data)));
    assert_eq!(report.recipients, 0);
    assert_eq!(source.frames_broadcast(), 1);
}

#[test]
fn test_single_track_receives_one_frame_with_matching_geometry() {
    let (source, stats) = source_with_stats();
    let track = source.create_track();
    let data = vga_frame();

    let report = source
        .on_frame(&RawFrame::new(WIDTH, HEIGHT, &data))
        .unwrap();
    assert_eq!(report.recipients, 1);
    assert_eq!(report.forwarded, 1);

    let entry = stats.get(track.id()).unwrap();
    assert_eq!(entry.frames_received, 1);
    assert_eq!(entry.frame_width, WIDTH);
    assert_eq!(entry.frame_height, HEIGHT);

    let delivered = track.stats();
    assert_eq!(delivered.frames_forwarded, 1);
    assert_eq!(
        delivered.last_resolution,
        Some(VideoResolution::new(WIDTH, HEIGHT))
    );
}

#[test]
fn test_invalid_frames_rejected_without_broadcast() {
    let (source, stats) = source_with_stats();
    let track = source.create_track();

    let short = vec![0u8; 460_799];
    let err = assert_err!(source.on_frame(&RawFrame::new(WIDTH, HEIGHT, &short)));
    assert!(matches!(
        err,
        VidInjectError::BufferSizeMismatch {
            expected: 460_800,
            actual: 460_799,
            ..
        }
    ));

    let err = assert_err!(source.on_frame(&RawFrame::new(0, HEIGHT, &short)));
    assert!(matches!(err, VidInjectError::InvalidDimensions { .. }));

    assert_eq!(stats.frames_received(track.id()), 0);
    assert_eq!(source.frames_broadcast(), 0);
}

#[test]
fn test_caller_buffer_can_be_reused_after_on_frame() {
    let (source, _stats) = source_with_stats();
    let _track = source.create_track();

    let mut data = vga_frame();
    source
        .on_frame(&RawFrame::new(WIDTH, HEIGHT, &data))
        .unwrap();
    data.iter_mut().for_each(|b| *b = 0xff);
    data.truncate(10);

    assert!(source.on_frame(&RawFrame::new(WIDTH, HEIGHT, &data)).is_err());
}

// ============================================================================
// CLONE AND STOP TESTS
// ============================================================================

#[test]
fn test_clone_and_original_count_frames_independently() {
    let (source, stats) = source_with_stats();
    let data = vga_frame();
    let frame = RawFrame::new(WIDTH, HEIGHT, &data);

    let track = source.create_track();
    let cloned = track.clone();

    source.on_frame(&frame).unwrap();
    source.on_frame(&frame).unwrap();

    assert_eq!(stats.frames_received(track.id()), 2);
    assert_eq!(stats.frames_received(cloned.id()), 2);
}

#[test]
fn test_stopping_original_leaves_clone_live() {
    let (source, stats) = source_with_stats();
    let data = vga_frame();
    let frame = RawFrame::new(WIDTH, HEIGHT, &data);

    let track = source.create_track();
    let cloned = track.clone();

    track.stop();
    assert!(track.ended());
    assert!(!cloned.ended());

    let report = source.on_frame(&frame).unwrap();
    assert_eq!(report.recipients, 1);

    assert_eq!(stats.frames_received(track.id()), 0);
    assert_eq!(stats.frames_received(cloned.id()), 1);
}

#[test]
fn test_double_stop_ends_track_once() {
    let (source, stats) = source_with_stats();
    let track = source.create_track();

    track.stop();
    track.stop();

    assert!(track.ended());
    assert_eq!(track.state(), TrackState::Ended);
    assert_eq!(stats.end_calls(track.id()), 1);
    assert_eq!(source.track_count(), 0);
}

#[test]
fn test_clone_of_stopped_track_is_born_ended() {
    let (source, stats) = source_with_stats();
    let data = vga_frame();
    let frame = RawFrame::new(WIDTH, HEIGHT, &data);

    let track = source.create_track();
    track.stop();

    let cloned = track.clone();
    assert!(cloned.ended());
    assert_eq!(source.track_count(), 0);

    source.on_frame(&frame).unwrap();
    source.on_frame(&frame).unwrap();
    assert_eq!(stats.frames_received(cloned.id()), 0);

    // never transitioned, so the pipeline is never told it ended
    let cloned_id = cloned.id().clone();
    cloned.stop();
    drop(cloned);
    assert_eq!(stats.end_calls(&cloned_id), 0);
    assert_eq!(stats.end_calls(track.id()), 1);
}

#[test]
fn test_clone_of_clone_subscribes_to_source() {
    let (source, stats) = source_with_stats();
    let data = vga_frame();

    let track = source.create_track();
    let child = track.clone();
    let grandchild = child.clone();
    child.stop();

    source
        .on_frame(&RawFrame::new(WIDTH, HEIGHT, &data))
        .unwrap();

    assert_eq!(grandchild.parent_id(), Some(child.id()));
    assert_eq!(stats.frames_received(grandchild.id()), 1);
    assert_eq!(stats.frames_received(track.id()), 1);
}

#[test]
fn test_frame_sequence_over_full_lifecycle() {
    let (source, stats) = source_with_stats();
    let data = vga_frame();
    let frame = RawFrame::new(WIDTH, HEIGHT, &data);

    source.on_frame(&frame).unwrap();

    let track = source.create_track();
    let cloned = track.clone();
    source.on_frame(&frame).unwrap();

    track.stop();
    source.on_frame(&frame).unwrap();

    cloned.stop();
    let report = source.on_frame(&frame).unwrap();
    assert_eq!(report.recipients, 0);

    assert_eq!(stats.frames_received(track.id()), 1);
    assert_eq!(stats.frames_received(cloned.id()), 2);
    assert_eq!(stats.end_calls(track.id()), 1);
    assert_eq!(stats.end_calls(cloned.id()), 1);
    assert_eq!(source.frames_broadcast(), 4);
}

// ============================================================================
// SOURCE TEARDOWN TESTS
// ============================================================================

#[test]
fn test_dropping_source_does_not_end_tracks() {
    let (source, stats) = source_with_stats();
    let track = source.create_track();
    let cloned = track.clone();

    drop(source);

    assert!(!track.ended());
    assert!(!cloned.ended());
    assert!(!track.is_source_attached());
    assert_eq!(stats.end_calls(track.id()), 0);

    track.stop();
    assert!(track.ended());
    assert_eq!(stats.end_calls(track.id()), 1);
}

#[test]
fn test_clone_after_source_dropped_stays_live() {
    let (source, _stats) = source_with_stats();
    let track = source.create_track();
    drop(source);

    let cloned = track.clone();
    assert!(!cloned.ended());
    assert!(!cloned.is_source_attached());
}

#[test]
fn test_weak_source_fails_fast_after_drop() {
    let source = VideoSource::new();
    let weak = source.downgrade();
    let data = vga_frame();

    assert!(weak.is_alive());
    assert_ok!(weak.on_frame(&RawFrame::new(WIDTH, HEIGHT, &data)));
    let track = assert_ok!(weak.create_track());
    assert_eq!(source.track_count(), 1);

    drop(source);

    assert!(!weak.is_alive());
    assert!(matches!(
        weak.on_frame(&RawFrame::new(WIDTH, HEIGHT, &data)),
        Err(VidInjectError::UseAfterDestroy { .. })
    ));
    assert!(matches!(
        weak.create_track(),
        Err(VidInjectError::UseAfterDestroy { .. })
    ));
    assert!(!track.ended());
}

#[test]
fn test_source_handles_share_registry() {
    let source = VideoSource::new();
    let other = source.clone();
    let track = source.create_track();

    assert_eq!(other.track_ids(), vec![track.id().clone()]);
    drop(source);
    assert!(track.is_source_attached());
}

// ============================================================================
// PIPELINE ISOLATION TESTS
// ============================================================================

/// Pipeline that refuses frames for one track and records the rest
struct RejectingPipeline {
    rejected: parking_lot::Mutex<Option<TrackId>>,
    inner: StatsRecorder,
}

impl MediaPipeline for RejectingPipeline {
    fn push_frame(&self, track_id: &TrackId, frame: PlanarFrameBuffer) -> VidInjectResult<()> {
        if self.rejected.lock().as_ref() == Some(track_id) {
            return Err(VidInjectError::Pipeline {
                track_id: track_id.to_string(),
                reason: "encoder unavailable".to_string(),
            });
        }
        self.inner.push_frame(track_id, frame)
    }

    fn end_track(&self, track_id: &TrackId) {
        self.inner.end_track(track_id)
    }
}

#[test]
fn test_pipeline_failure_on_one_track_spares_siblings() {
    let pipeline = Arc::new(RejectingPipeline {
        rejected: parking_lot::Mutex::new(None),
        inner: StatsRecorder::new(),
    });
    let source = inline_source(pipeline.clone());
    let data = vga_frame();

    let failing = source.create_track();
    let healthy = failing.clone();
    *pipeline.rejected.lock() = Some(failing.id().clone());

    let report = source
        .on_frame(&RawFrame::new(WIDTH, HEIGHT, &data))
        .unwrap();

    assert_eq!(report.recipients, 2);
    assert_eq!(report.forwarded, 1);
    assert_eq!(report.dropped, 1);
    assert_eq!(failing.stats().frames_dropped, 1);
    assert!(!failing.ended());
    assert_eq!(pipeline.inner.frames_received(healthy.id()), 1);
}

#[test]
fn test_frames_share_one_pixel_allocation() {
    struct Capture(parking_lot::Mutex<Vec<PlanarFrameBuffer>>);

    impl MediaPipeline for Capture {
        fn push_frame(&self, _track_id: &TrackId, frame: PlanarFrameBuffer) -> VidInjectResult<()> {
            self.0.lock().push(frame);
            Ok(())
        }

        fn end_track(&self, _track_id: &TrackId) {}
    }

    let capture = Arc::new(Capture(parking_lot::Mutex::new(Vec::new())));
    let source = inline_source(capture.clone());
    let track = source.create_track();
    let _cloned = track.clone();

    let mut data = vga_frame();
    data[0] = 16;
    data[460_799] = 240;
    source
        .on_frame(&RawFrame::new(WIDTH, HEIGHT, &data))
        .unwrap();

    let frames = capture.0.lock();
    assert_eq!(frames.len(), 2);
    assert_eq!(frames[0].y().as_ptr(), frames[1].y().as_ptr());
    assert_eq!(frames[0].y()[0], 16);
    assert_eq!(frames[0].v()[frames[0].v().len() - 1], 240);
    assert_eq!(frames[0].sequence(), 0);
}

#[test]
fn test_concurrent_stop_and_broadcast_never_forward_after_end() {
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicBool, Ordering};

    /// Flags any frame that arrives after its track ended
    struct OrderCheck {
        ended: parking_lot::Mutex<HashSet<TrackId>>,
        violated: AtomicBool,
    }

    impl MediaPipeline for OrderCheck {
        fn push_frame(&self, track_id: &TrackId, _frame: PlanarFrameBuffer) -> VidInjectResult<()> {
            if self.ended.lock().contains(track_id) {
                self.violated.store(true, Ordering::SeqCst);
            }
            Ok(())
        }

        fn end_track(&self, track_id: &TrackId) {
            self.ended.lock().insert(track_id.clone());
        }
    }

    let pipeline = Arc::new(OrderCheck {
        ended: Default::default(),
        violated: AtomicBool::new(false),
    });
    let source = inline_source(pipeline.clone());
    let tracks: Vec<Track> = (0..16).map(|_| source.create_track()).collect();

    let producer = {
        let source = source.clone();
        std::thread::spawn(move || {
            let data = vec![0u8; i420_buffer_size(16, 16).unwrap()];
            for _ in 0..500 {
                source.on_frame(&RawFrame::new(16, 16, &data)).unwrap();
            }
        })
    };

    for track in &tracks {
        track.stop();
        std::thread::yield_now();
    }
    producer.join().unwrap();

    assert!(!pipeline.violated.load(Ordering::SeqCst));
    assert_eq!(source.track_count(), 0);
}
