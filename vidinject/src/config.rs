//! Configuration types and defaults

use serde::{Deserialize, Serialize};
use vidinject_core::{VidInjectError, VidInjectResult};

/// Frames buffered per track by default
pub const DEFAULT_QUEUE_CAPACITY: usize = 8;

/// Largest accepted per-track queue
pub const MAX_QUEUE_CAPACITY: usize = 1024;

/// Largest accepted event buffer
pub const MAX_EVENT_CAPACITY: usize = 1 << 16;

/// How a source hands frames to the pipeline for each track
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum DeliveryMode {
    /// Per-track bounded queue drained by a dedicated delivery thread. A
    /// slow or stalled pipeline only holds back its own track, and a full
    /// queue drops the frame for that track only.
    Queued {
        /// Frames buffered per track
        capacity: usize,
    },
    /// Call the pipeline on the `on_frame` thread, one track after another
    ///
    /// Counts are settled as soon as `on_frame` returns, but a pipeline
    /// that blocks on one track delays every track after it and `on_frame`
    /// itself. Only use with a pipeline that never blocks.
    Inline,
}

impl Default for DeliveryMode {
    fn default() -> Self {
        DeliveryMode::Queued {
            capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }
}

/// Video source configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// Human-readable label, used in logs
    pub label: String,
    /// Content is screen capture rather than camera video
    pub is_screencast: bool,
    /// Hint for the encoder; `None` leaves the choice to the pipeline
    pub needs_denoising: Option<bool>,
    /// Frame delivery strategy
    pub delivery: DeliveryMode,
    /// Buffered events per subscriber
    pub event_capacity: usize,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            label: "synthetic".to_string(),
            is_screencast: false,
            needs_denoising: None,
            delivery: DeliveryMode::default(),
            event_capacity: 64,
        }
    }
}

impl SourceConfig {
    /// Defaults for screen content
    pub fn screencast() -> Self {
        Self {
            label: "screencast".to_string(),
            is_screencast: true,
            needs_denoising: Some(false),
            ..Self::default()
        }
    }

    /// Parse and validate a JSON configuration
    pub fn from_json(json: &str) -> VidInjectResult<Self> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| VidInjectError::InvalidConfiguration {
                message: format!("Malformed source configuration: {}", e),
            })?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> VidInjectResult<()> {
        if self.event_capacity == 0 || self.event_capacity > MAX_EVENT_CAPACITY {
            return Err(VidInjectError::InvalidConfiguration {
                message: format!(
                    "Event capacity must be between 1 and {}, got {}",
                    MAX_EVENT_CAPACITY, self.event_capacity
                ),
            });
        }

        if let DeliveryMode::Queued { capacity } = self.delivery {
            if capacity == 0 || capacity > MAX_QUEUE_CAPACITY {
                return Err(VidInjectError::InvalidConfiguration {
                    message: format!(
                        "Queue capacity must be between 1 and {}, got {}",
                        MAX_QUEUE_CAPACITY, capacity
                    ),
                });
            }
        }

        Ok(())
    }
}
