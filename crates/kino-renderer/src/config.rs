//! Build request configuration

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use url::Url;

/// Default allocator segment size in bytes
pub const DEFAULT_SEGMENT_SIZE: usize = 64 * 1024;
/// Default number of segments buffered for video, audio and metadata
pub const DEFAULT_SEGMENT_COUNT: usize = 256;
/// Default number of segments buffered for manifest subtitles
pub const DEFAULT_TEXT_SEGMENT_COUNT: usize = 2;
/// Bitrate ceiling meaning "no limit"
pub const UNLIMITED_BITRATE: u64 = u64::MAX;

/// Everything needed to attempt one playback build
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildRequest {
    /// Playlist URL
    pub url: Url,
    /// User agent sent with every request
    pub user_agent: String,
    /// Allocator segment size in bytes
    pub segment_size: usize,
    /// Segments buffered for the primary (video/audio/metadata) stream
    pub segment_count: usize,
    /// Segments buffered for manifest subtitles
    pub text_segment_count: usize,
    /// Initial bitrate ceiling in bps
    pub bitrate_ceiling: Option<u64>,
}

impl BuildRequest {
    /// Create a request with default buffer sizing
    pub fn new(url: Url, user_agent: impl Into<String>) -> Self {
        Self {
            url,
            user_agent: user_agent.into(),
            segment_size: DEFAULT_SEGMENT_SIZE,
            segment_count: DEFAULT_SEGMENT_COUNT,
            text_segment_count: DEFAULT_TEXT_SEGMENT_COUNT,
            bitrate_ceiling: None,
        }
    }

    pub fn with_buffer_segments(mut self, segment_size: usize, segment_count: usize) -> Self {
        self.segment_size = segment_size;
        self.segment_count = segment_count;
        self
    }

    pub fn with_text_segments(mut self, text_segment_count: usize) -> Self {
        self.text_segment_count = text_segment_count;
        self
    }

    pub fn with_bitrate_ceiling(mut self, bitrate: u64) -> Self {
        self.bitrate_ceiling = Some(bitrate);
        self
    }

    /// Budget shared by the video, audio and metadata renderers
    pub fn primary_budget(&self) -> BufferBudget {
        BufferBudget::new(self.segment_size, self.segment_count)
    }

    /// Budget for the manifest subtitle pipeline
    pub fn text_budget(&self) -> BufferBudget {
        BufferBudget::new(self.segment_size, self.text_segment_count)
    }

    /// Check sizing before any work is scheduled
    pub fn validate(&self) -> Result<()> {
        if self.user_agent.trim().is_empty() {
            return Err(Error::InvalidConfig("user agent must not be empty".to_string()));
        }
        self.primary_budget().bytes()?;
        self.text_budget().bytes()?;
        Ok(())
    }
}

/// Buffer sizing for one sample source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BufferBudget {
    pub segment_size: usize,
    pub segment_count: usize,
}

impl BufferBudget {
    pub fn new(segment_size: usize, segment_count: usize) -> Self {
        Self {
            segment_size,
            segment_count,
        }
    }

    /// Total bytes, rejecting empty or overflowing budgets
    pub fn bytes(&self) -> Result<usize> {
        if self.segment_size == 0 || self.segment_count == 0 {
            return Err(Error::InvalidConfig(format!(
                "buffer budget {}x{} is empty",
                self.segment_size, self.segment_count
            )));
        }
        self.segment_size
            .checked_mul(self.segment_count)
            .ok_or_else(|| {
                Error::InvalidConfig(format!(
                    "buffer budget {}x{} overflows",
                    self.segment_size, self.segment_count
                ))
            })
    }
}
