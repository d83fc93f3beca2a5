//! Parsed playlist model and the manifest transport boundary

#[cfg(feature = "hls")]
mod hls;

#[cfg(feature = "hls")]
pub use hls::{parse_playlist, HlsManifestFetcher};

use crate::{types::*, Result};
use async_trait::async_trait;
use std::time::Duration;
use url::Url;

/// Multivariant playlist
#[derive(Debug, Clone)]
pub struct MasterPlaylist {
    /// URL the playlist was loaded from
    pub base_url: Url,
    /// Variants in playlist order
    pub variants: Vec<Variant>,
    /// Declared subtitle renditions
    pub subtitles: Vec<SubtitleTrack>,
}

/// Single-variant media playlist
#[derive(Debug, Clone)]
pub struct MediaPlaylist {
    /// URL the playlist was loaded from
    pub base_url: Url,
    /// Segments in playback order
    pub segments: Vec<Segment>,
    /// Target segment duration
    pub target_duration: Duration,
    /// Is this a live stream
    pub is_live: bool,
}

/// Parsed manifest data
#[derive(Debug, Clone)]
pub enum Manifest {
    SingleVariant(MediaPlaylist),
    Master(MasterPlaylist),
}

impl Manifest {
    pub fn is_master(&self) -> bool {
        matches!(self, Manifest::Master(_))
    }

    pub fn base_url(&self) -> &Url {
        match self {
            Manifest::SingleVariant(media) => &media.base_url,
            Manifest::Master(master) => &master.base_url,
        }
    }

    /// Variants of a master playlist; empty for a single-variant one
    pub fn variants(&self) -> &[Variant] {
        match self {
            Manifest::Master(master) => &master.variants,
            Manifest::SingleVariant(_) => &[],
        }
    }

    /// Subtitle renditions of a master playlist; empty for a single-variant one
    pub fn subtitles(&self) -> &[SubtitleTrack] {
        match self {
            Manifest::Master(master) => &master.subtitles,
            Manifest::SingleVariant(_) => &[],
        }
    }
}

/// Loads and parses a manifest in one shot.
///
/// Dropping the returned future abandons the request.
#[async_trait]
pub trait ManifestFetcher: Send + Sync {
    async fn fetch(&self, url: &Url, user_agent: &str) -> Result<Manifest>;
}
