//! Core types for Kino Renderer

use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;
use uuid::Uuid;

/// Unique identifier for one renderer build
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BuildId(pub Uuid);

impl BuildId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for BuildId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for BuildId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Video codec types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VideoCodec {
    H264,
    H265,
    Vp9,
    Av1,
}

impl VideoCodec {
    /// Detect a video codec from an HLS `CODECS` attribute
    pub fn from_codecs(codecs: &str) -> Option<Self> {
        let codecs = codecs.to_lowercase();
        if codecs.contains("avc1") || codecs.contains("avc3") {
            Some(VideoCodec::H264)
        } else if codecs.contains("hvc1") || codecs.contains("hev1") {
            Some(VideoCodec::H265)
        } else if codecs.contains("vp09") || codecs.contains("vp9") {
            Some(VideoCodec::Vp9)
        } else if codecs.contains("av01") {
            Some(VideoCodec::Av1)
        } else {
            None
        }
    }
}

impl std::fmt::Display for VideoCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VideoCodec::H264 => write!(f, "H.264/AVC"),
            VideoCodec::H265 => write!(f, "H.265/HEVC"),
            VideoCodec::Vp9 => write!(f, "VP9"),
            VideoCodec::Av1 => write!(f, "AV1"),
        }
    }
}

/// Audio codec types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AudioCodec {
    Aac,
    Ac3,
    Eac3,
    Opus,
    Flac,
}

impl AudioCodec {
    /// Detect an audio codec from an HLS `CODECS` attribute
    pub fn from_codecs(codecs: &str) -> Option<Self> {
        let codecs = codecs.to_lowercase();
        if codecs.contains("mp4a.40") {
            Some(AudioCodec::Aac)
        } else if codecs.contains("ac-3") || codecs.contains("ac3") {
            Some(AudioCodec::Ac3)
        } else if codecs.contains("ec-3") || codecs.contains("ec3") {
            Some(AudioCodec::Eac3)
        } else if codecs.contains("opus") {
            Some(AudioCodec::Opus)
        } else if codecs.contains("flac") {
            Some(AudioCodec::Flac)
        } else {
            None
        }
    }
}

impl std::fmt::Display for AudioCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AudioCodec::Aac => write!(f, "AAC"),
            AudioCodec::Ac3 => write!(f, "AC-3"),
            AudioCodec::Eac3 => write!(f, "E-AC-3"),
            AudioCodec::Opus => write!(f, "Opus"),
            AudioCodec::Flac => write!(f, "FLAC"),
        }
    }
}

/// Video resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Total pixel count
    pub fn pixels(&self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }

    /// Returns quality tier name
    pub fn quality_name(&self) -> &'static str {
        match self.height {
            0..=240 => "240p",
            241..=360 => "360p",
            361..=480 => "480p",
            481..=720 => "720p",
            721..=1080 => "1080p",
            1081..=1440 => "1440p",
            _ => "4K",
        }
    }

    pub const FHD_1080P: Resolution = Resolution { width: 1920, height: 1080 };
}

impl std::fmt::Display for Resolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// One selectable bitrate/resolution rendition from a master playlist
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Variant {
    /// Position of this variant in the master playlist
    pub index: usize,
    /// Peak bandwidth in bits per second
    pub bandwidth: u64,
    /// Video resolution, when declared
    pub resolution: Option<Resolution>,
    /// Frame rate, when declared
    pub frame_rate: Option<f32>,
    /// Raw `CODECS` attribute
    pub codecs: Option<String>,
    /// URI of the media playlist for this variant
    pub uri: Url,
}

impl Variant {
    pub fn video_codec(&self) -> Option<VideoCodec> {
        self.codecs.as_deref().and_then(VideoCodec::from_codecs)
    }

    pub fn audio_codec(&self) -> Option<AudioCodec> {
        self.codecs.as_deref().and_then(AudioCodec::from_codecs)
    }
}

/// A subtitle rendition declared by a master playlist
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubtitleTrack {
    /// Rendition group this track belongs to
    pub group_id: String,
    /// Human-readable name
    pub name: String,
    /// BCP-47 language code
    pub language: Option<String>,
    /// URI of the subtitle media playlist
    pub uri: Option<Url>,
    /// `DEFAULT=YES`
    pub is_default: bool,
    /// `FORCED=YES`
    pub is_forced: bool,
}

/// Media segment from a media playlist
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Segment {
    /// Media sequence number
    pub number: u64,
    /// URI to fetch the segment
    pub uri: Url,
    /// Duration of this segment
    pub duration: Duration,
    /// Discontinuity sequence number
    pub discontinuity_sequence: u64,
}

/// Track types produced by a renderer build.
///
/// The discriminant is the renderer's slot in a [`crate::RendererSet`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TrackType {
    Video = 0,
    Audio = 1,
    Text = 2,
    Metadata = 3,
}

/// Number of renderers in every delivered set
pub const RENDERER_COUNT: usize = 4;

impl TrackType {
    /// All track types in slot order
    pub const ALL: [TrackType; RENDERER_COUNT] =
        [TrackType::Video, TrackType::Audio, TrackType::Text, TrackType::Metadata];

    pub fn index(self) -> usize {
        self as usize
    }
}

impl std::fmt::Display for TrackType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TrackType::Video => write!(f, "video"),
            TrackType::Audio => write!(f, "audio"),
            TrackType::Text => write!(f, "text"),
            TrackType::Metadata => write!(f, "metadata"),
        }
    }
}

/// Text track format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TextTrackFormat {
    /// WebVTT format
    WebVtt,
    /// CEA-608 embedded captions
    Cea608,
}

impl TextTrackFormat {
    /// Get MIME type for format
    pub fn mime_type(&self) -> &'static str {
        match self {
            TextTrackFormat::WebVtt => "text/vtt",
            TextTrackFormat::Cea608 => "application/cea-608",
        }
    }
}
