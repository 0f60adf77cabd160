//! # vidinject Media
//!
//! Frame handling for synthetic video sources: validation of caller-supplied
//! I420 buffers, the owned planar representation that gets broadcast to
//! tracks, and the boundary trait towards the external media pipeline.

#![warn(clippy::all)]

pub mod frame;
pub mod pipeline;
pub mod validator;

// Re-export main types
pub use frame::{PlanarFrameBuffer, RawFrame, VideoResolution, VideoRotation};
pub use pipeline::{MediaPipeline, NullPipeline};
pub use validator::{i420_buffer_size, FrameLayout, FrameValidator};
