//! Synthetic video source demo
//!
//! Generates a moving gradient, injects it into a video source with two
//! tracks, stops one of them half way, and prints the pipeline statistics.
//!
//! Run with `RUST_LOG=vidinject=debug` to see track lifecycle logs.

use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use vidinject::{
    i420_buffer_size, DebugLogger, RawFrame, SourceConfig, StatsRecorder, VideoResolution,
    VideoSource,
};

const FRAMES: u32 = 30;

/// Fill an I420 buffer with a diagonal luma gradient shifted by `offset`
fn gradient_frame(resolution: VideoResolution, offset: u32) -> Result<Vec<u8>> {
    let VideoResolution { width, height } = resolution;
    let size = i420_buffer_size(width, height)
        .ok_or_else(|| anyhow::anyhow!("invalid resolution {}x{}", width, height))?;

    let mut data = vec![128u8; size];
    let y_len = (width * height) as usize;
    for row in 0..height {
        for col in 0..width {
            let luma = (row + col + offset) % 256;
            data[(row * width + col) as usize] = luma as u8;
        }
    }
    // neutral chroma
    data[y_len..].fill(128);
    Ok(data)
}

#[tokio::main]
async fn main() -> Result<()> {
    DebugLogger::init_logging("vidinject=info");

    let stats = Arc::new(StatsRecorder::new());
    let source = VideoSource::builder()
        .config(SourceConfig {
            label: "gradient".to_string(),
            ..SourceConfig::default()
        })
        .pipeline(stats.clone())
        .build()?;

    let mut events = source.events();
    let preview = source.create_track();
    let recording = preview.clone();
    println!("📹 Source {} with tracks {} and {}", source.id(), preview.id(), recording.id());

    let resolution = VideoResolution::VGA;
    let mut interval = tokio::time::interval(Duration::from_millis(33));
    for n in 0..FRAMES {
        interval.tick().await;
        let data = gradient_frame(resolution, n * 4)?;
        let report = source.on_frame(&RawFrame::new(resolution.width, resolution.height, &data))?;

        if n == FRAMES / 2 {
            println!("⏹️  Stopping preview after frame #{}", report.sequence);
            preview.stop();
        }
    }

    // A short buffer is rejected without touching any track
    if let Err(e) = source.on_frame(&RawFrame::new(640, 480, &[0u8; 16])) {
        println!("⚠️  Rejected frame: {}", e);
    }

    // let the delivery threads catch up before reading the stats
    tokio::time::sleep(Duration::from_millis(100)).await;

    for event in events.drain() {
        if !event.is_frame_event() {
            println!("📣 {:?}", event);
        }
    }

    println!("📊 {}", stats.to_json()?);
    Ok(())
}
