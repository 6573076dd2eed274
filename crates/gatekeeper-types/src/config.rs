//! Store construction parameters.

use std::path::PathBuf;
use std::time::Duration;

/// Everything the store needs at construction time.
///
/// Rotation and flushing are governed by two independent knobs: a segment is
/// rotated when its size reaches `max_segment_size`, and the active segment
/// is flushed to durable storage whenever `sync_interval` has elapsed since
/// the last flush. Neither implies the other.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Directory holding the segment files. Created if missing.
    pub dir: PathBuf,
    /// Size threshold (bytes) at which the active segment is rotated.
    pub max_segment_size: u64,
    /// Maximum time between durability flushes of the active segment.
    pub sync_interval: Duration,
}

impl StoreConfig {
    /// Default rotation threshold: 10 MiB.
    pub const DEFAULT_MAX_SEGMENT_SIZE: u64 = 10 * 1024 * 1024;
    /// Default flush cadence: one minute.
    pub const DEFAULT_SYNC_INTERVAL: Duration = Duration::from_secs(60);

    /// Configuration with default thresholds for the given directory.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            max_segment_size: Self::DEFAULT_MAX_SEGMENT_SIZE,
            sync_interval: Self::DEFAULT_SYNC_INTERVAL,
        }
    }

    /// Override the rotation threshold.
    #[must_use]
    pub fn with_max_segment_size(mut self, bytes: u64) -> Self {
        self.max_segment_size = bytes;
        self
    }

    /// Override the flush cadence.
    #[must_use]
    pub fn with_sync_interval(mut self, interval: Duration) -> Self {
        self.sync_interval = interval;
        self
    }
}
