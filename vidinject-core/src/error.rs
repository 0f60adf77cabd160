//! Error types for vidinject
//!
//! Every failure is scoped to the single call that produced it: a rejected
//! frame is dropped, never queued for retry, and no error here is fatal to
//! the process.

use thiserror::Error;

/// Main error type for video source and track operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VidInjectError {
    /// Frame width or height is zero, or too large to address
    #[error("Invalid frame dimensions: {width}x{height}")]
    InvalidDimensions {
        /// Declared frame width in pixels
        width: u32,
        /// Declared frame height in pixels
        height: u32,
    },

    /// Buffer length does not match the 4:2:0 planar layout for the geometry
    #[error("Buffer size mismatch for {width}x{height} I420 frame: expected {expected} bytes, got {actual}")]
    BufferSizeMismatch {
        /// Declared frame width in pixels
        width: u32,
        /// Declared frame height in pixels
        height: u32,
        /// Byte length required by the geometry
        expected: usize,
        /// Byte length actually supplied
        actual: usize,
    },

    /// Operation on a source or track whose underlying resource is gone
    #[error("Use after destroy: {resource}")]
    UseAfterDestroy {
        /// Description of the destroyed resource
        resource: String,
    },

    /// Frame rotation is not a multiple of 90 degrees
    #[error("Invalid rotation: {degrees} degrees")]
    InvalidRotation {
        /// Rotation supplied by the caller
        degrees: u32,
    },

    /// Invalid configuration provided
    #[error("Invalid configuration: {message}")]
    InvalidConfiguration {
        /// Error message
        message: String,
    },

    /// The external pipeline refused a frame for one track
    #[error("Pipeline rejected frame for track {track_id}: {reason}")]
    Pipeline {
        /// Track the frame was addressed to
        track_id: String,
        /// Failure reason reported by the pipeline
        reason: String,
    },
}

/// Result type alias for vidinject operations
pub type VidInjectResult<T> = Result<T, VidInjectError>;

impl VidInjectError {
    /// Convenience constructor for [`VidInjectError::UseAfterDestroy`]
    pub fn use_after_destroy(resource: impl Into<String>) -> Self {
        VidInjectError::UseAfterDestroy {
            resource: resource.into(),
        }
    }

    /// Check if the caller can reasonably try again with corrected input
    pub fn is_recoverable(&self) -> bool {
        match self {
            VidInjectError::InvalidDimensions { .. } => true,
            VidInjectError::BufferSizeMismatch { .. } => true,
            VidInjectError::InvalidRotation { .. } => true,
            VidInjectError::Pipeline { .. } => true,
            VidInjectError::InvalidConfiguration { .. } => false,
            VidInjectError::UseAfterDestroy { .. } => false,
        }
    }

    /// Get error category
    pub fn category(&self) -> ErrorCategory {
        match self {
            VidInjectError::InvalidDimensions { .. } => ErrorCategory::Validation,
            VidInjectError::BufferSizeMismatch { .. } => ErrorCategory::Validation,
            VidInjectError::InvalidRotation { .. } => ErrorCategory::Validation,
            VidInjectError::UseAfterDestroy { .. } => ErrorCategory::Lifecycle,
            VidInjectError::InvalidConfiguration { .. } => ErrorCategory::Configuration,
            VidInjectError::Pipeline { .. } => ErrorCategory::Pipeline,
        }
    }
}

/// Error categories for classification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Frame geometry or layout errors
    Validation,
    /// Source/track lifetime misuse
    Lifecycle,
    /// Configuration and parameter errors
    Configuration,
    /// Errors surfaced by the external media pipeline
    Pipeline,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_categories() {
        let dims = VidInjectError::InvalidDimensions {
            width: 0,
            height: 480,
        };
        assert_eq!(dims.category(), ErrorCategory::Validation);
        assert!(dims.is_recoverable());

        let gone = VidInjectError::use_after_destroy("video source");
        assert_eq!(gone.category(), ErrorCategory::Lifecycle);
        assert!(!gone.is_recoverable());

        let config = VidInjectError::InvalidConfiguration {
            message: "queue capacity must be > 0".to_string(),
        };
        assert_eq!(config.category(), ErrorCategory::Configuration);
    }

    #[test]
    fn test_error_display() {
        let error = VidInjectError::BufferSizeMismatch {
            width: 640,
            height: 480,
            expected: 460800,
            actual: 460799,
        };
        assert_eq!(
            error.to_string(),
            "Buffer size mismatch for 640x480 I420 frame: expected 460800 bytes, got 460799"
        );

        let gone = VidInjectError::use_after_destroy("video source");
        assert_eq!(gone.to_string(), "Use after destroy: video source");
    }
}
