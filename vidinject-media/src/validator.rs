//! I420 frame geometry validation
//!
//! A 4:2:0 planar frame is one full-resolution luma plane followed by two
//! chroma planes subsampled by two in each direction. Odd dimensions round
//! the chroma plane up, so a 3x3 frame carries 2x2 chroma samples.

use vidinject_core::{VidInjectError, VidInjectResult};

/// Plane geometry of a validated I420 frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameLayout {
    /// Frame width in pixels
    pub width: u32,
    /// Frame height in pixels
    pub height: u32,
    /// Chroma plane width, `ceil(width / 2)`
    pub chroma_width: u32,
    /// Chroma plane height, `ceil(height / 2)`
    pub chroma_height: u32,
    /// Luma plane length in bytes
    pub y_len: usize,
    /// Length of each chroma plane in bytes
    pub uv_len: usize,
}

impl FrameLayout {
    /// Compute the layout for the given geometry
    pub fn for_dimensions(width: u32, height: u32) -> VidInjectResult<Self> {
        let invalid = || VidInjectError::InvalidDimensions { width, height };

        if width == 0 || height == 0 {
            return Err(invalid());
        }

        let chroma_width = width.div_ceil(2);
        let chroma_height = height.div_ceil(2);

        let y_len = (width as usize)
            .checked_mul(height as usize)
            .ok_or_else(invalid)?;
        let uv_len = (chroma_width as usize)
            .checked_mul(chroma_height as usize)
            .ok_or_else(invalid)?;

        // total length must stay addressable
        uv_len
            .checked_mul(2)
            .and_then(|chroma| chroma.checked_add(y_len))
            .ok_or_else(invalid)?;

        Ok(Self {
            width,
            height,
            chroma_width,
            chroma_height,
            y_len,
            uv_len,
        })
    }

    /// Total byte length of the frame
    pub fn total_len(&self) -> usize {
        self.y_len + 2 * self.uv_len
    }

    /// Byte offset of the U plane
    pub fn u_offset(&self) -> usize {
        self.y_len
    }

    /// Byte offset of the V plane
    pub fn v_offset(&self) -> usize {
        self.y_len + self.uv_len
    }
}

/// Required byte length of an I420 buffer, `None` for unrepresentable geometry
pub fn i420_buffer_size(width: u32, height: u32) -> Option<usize> {
    FrameLayout::for_dimensions(width, height)
        .ok()
        .map(|layout| layout.total_len())
}

/// Validates caller-supplied frame geometry against its buffer length
#[derive(Debug, Clone, Copy, Default)]
pub struct FrameValidator;

impl FrameValidator {
    /// Check that `data_len` bytes form a complete I420 frame of the given size
    ///
    /// Pure: nothing is allocated or mutated, so a rejected frame leaves no
    /// trace downstream.
    pub fn validate(width: u32, height: u32, data_len: usize) -> VidInjectResult<FrameLayout> {
        let layout = FrameLayout::for_dimensions(width, height)?;
        let expected = layout.total_len();

        if data_len != expected {
            return Err(VidInjectError::BufferSizeMismatch {
                width,
                height,
                expected,
                actual: data_len,
            });
        }

        Ok(layout)
    }
}
