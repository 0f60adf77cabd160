//! Raw and planar video frame types

use crate::validator::{FrameLayout, FrameValidator};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use vidinject_core::{VidInjectError, VidInjectResult};

/// Video resolution information
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VideoResolution {
    pub width: u32,
    pub height: u32,
}

impl VideoResolution {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub const HD: Self = Self::new(1280, 720);
    pub const FULL_HD: Self = Self::new(1920, 1080);
    pub const VGA: Self = Self::new(640, 480);

    pub fn pixel_count(&self) -> u64 {
        self.width as u64 * self.height as u64
    }
}

/// Clockwise rotation the receiver should apply when rendering a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum VideoRotation {
    #[default]
    Deg0,
    Deg90,
    Deg180,
    Deg270,
}

impl VideoRotation {
    pub fn degrees(&self) -> u32 {
        match self {
            VideoRotation::Deg0 => 0,
            VideoRotation::Deg90 => 90,
            VideoRotation::Deg180 => 180,
            VideoRotation::Deg270 => 270,
        }
    }
}

impl TryFrom<u32> for VideoRotation {
    type Error = VidInjectError;

    fn try_from(degrees: u32) -> Result<Self, Self::Error> {
        match degrees {
            0 => Ok(VideoRotation::Deg0),
            90 => Ok(VideoRotation::Deg90),
            180 => Ok(VideoRotation::Deg180),
            270 => Ok(VideoRotation::Deg270),
            _ => Err(VidInjectError::InvalidRotation { degrees }),
        }
    }
}

/// Caller-supplied I420 frame
///
/// Borrows the caller's pixel buffer only for the duration of a single
/// `on_frame` call; everything that outlives the call is copied out into a
/// [`PlanarFrameBuffer`].
#[derive(Debug, Clone, Copy)]
pub struct RawFrame<'a> {
    /// Frame width in pixels
    pub width: u32,
    /// Frame height in pixels
    pub height: u32,
    /// Y plane followed by the U and V planes
    pub data: &'a [u8],
    /// Rendering rotation
    pub rotation: VideoRotation,
    /// Capture timestamp in microseconds, assigned by the source when absent
    pub timestamp_us: Option<u64>,
}

impl<'a> RawFrame<'a> {
    /// Create an unrotated frame without a caller timestamp
    pub fn new(width: u32, height: u32, data: &'a [u8]) -> Self {
        Self {
            width,
            height,
            data,
            rotation: VideoRotation::Deg0,
            timestamp_us: None,
        }
    }

    pub fn with_rotation(mut self, rotation: VideoRotation) -> Self {
        self.rotation = rotation;
        self
    }

    pub fn with_timestamp_us(mut self, timestamp_us: u64) -> Self {
        self.timestamp_us = Some(timestamp_us);
        self
    }

    /// Validate geometry against the buffer length
    pub fn validate(&self) -> VidInjectResult<FrameLayout> {
        FrameValidator::validate(self.width, self.height, self.data.len())
    }
}

/// Owned, immutable I420 frame shared by every track it is broadcast to
///
/// The pixels live in one reference-counted allocation and each plane is a
/// [`Bytes`] view into it, so cloning a buffer for another track never
/// copies pixel data.
#[derive(Debug, Clone)]
pub struct PlanarFrameBuffer {
    layout: FrameLayout,
    data: Bytes,
    y: Bytes,
    u: Bytes,
    v: Bytes,
    rotation: VideoRotation,
    timestamp_us: u64,
    sequence: u64,
}

impl PlanarFrameBuffer {
    /// Validate and copy an I420 buffer into an owned planar frame
    pub fn build(width: u32, height: u32, data: &[u8]) -> VidInjectResult<Self> {
        let layout = FrameValidator::validate(width, height, data.len())?;
        Ok(Self::from_validated(
            layout,
            data,
            VideoRotation::Deg0,
            0,
            0,
        ))
    }

    /// Build from a caller frame, stamping it with the source's sequence number
    ///
    /// The caller timestamp wins over `timestamp_us` when the frame has one.
    pub fn from_raw(frame: &RawFrame<'_>, sequence: u64, timestamp_us: u64) -> VidInjectResult<Self> {
        let layout = frame.validate()?;
        Ok(Self::from_validated(
            layout,
            frame.data,
            frame.rotation,
            frame.timestamp_us.unwrap_or(timestamp_us),
            sequence,
        ))
    }

    fn from_validated(
        layout: FrameLayout,
        data: &[u8],
        rotation: VideoRotation,
        timestamp_us: u64,
        sequence: u64,
    ) -> Self {
        let data = Bytes::copy_from_slice(data);
        let y = data.slice(..layout.u_offset());
        let u = data.slice(layout.u_offset()..layout.v_offset());
        let v = data.slice(layout.v_offset()..);

        Self {
            layout,
            data,
            y,
            u,
            v,
            rotation,
            timestamp_us,
            sequence,
        }
    }

    pub fn width(&self) -> u32 {
        self.layout.width
    }

    pub fn height(&self) -> u32 {
        self.layout.height
    }

    pub fn resolution(&self) -> VideoResolution {
        VideoResolution::new(self.layout.width, self.layout.height)
    }

    pub fn layout(&self) -> &FrameLayout {
        &self.layout
    }

    /// Luma plane
    pub fn y(&self) -> &Bytes {
        &self.y
    }

    /// Cb plane
    pub fn u(&self) -> &Bytes {
        &self.u
    }

    /// Cr plane
    pub fn v(&self) -> &Bytes {
        &self.v
    }

    pub fn stride_y(&self) -> u32 {
        self.layout.width
    }

    pub fn stride_uv(&self) -> u32 {
        self.layout.chroma_width
    }

    pub fn chroma_width(&self) -> u32 {
        self.layout.chroma_width
    }

    pub fn chroma_height(&self) -> u32 {
        self.layout.chroma_height
    }

    pub fn byte_len(&self) -> usize {
        self.data.len()
    }

    /// The whole frame as one contiguous I420 buffer
    pub fn as_i420(&self) -> Bytes {
        self.data.clone()
    }

    pub fn rotation(&self) -> VideoRotation {
        self.rotation
    }

    pub fn timestamp_us(&self) -> u64 {
        self.timestamp_us
    }

    /// Position of this frame in its source's broadcast order
    pub fn sequence(&self) -> u64 {
        self.sequence
    }
}
