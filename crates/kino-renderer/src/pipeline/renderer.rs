//! Renderers handed to the playback engine

use super::{factory::TrackPipeline, sample_source::SampleSource};
use crate::{
    types::{TextTrackFormat, TrackType, RENDERER_COUNT},
    Error, Result, TextMode,
};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

/// How decoded frames are fitted to the output surface
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VideoScaling {
    ScaleToFit,
}

/// Audio output stream category
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioStream {
    Music,
}

/// Timed metadata payload format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetadataFormat {
    Id3,
}

#[derive(Debug, Clone)]
pub struct VideoRenderer {
    pub source: Arc<SampleSource>,
    pub scaling: VideoScaling,
    /// How long to keep rendering old frames while joining a new stream
    pub allowed_joining_time: Duration,
    /// Dropped frames accumulated before they are reported
    pub max_dropped_frames_to_notify: u32,
}

impl VideoRenderer {
    pub fn new(source: Arc<SampleSource>) -> Self {
        Self {
            source,
            scaling: VideoScaling::ScaleToFit,
            allowed_joining_time: Duration::from_millis(5000),
            max_dropped_frames_to_notify: 50,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AudioRenderer {
    pub source: Arc<SampleSource>,
    pub stream: AudioStream,
}

#[derive(Debug, Clone)]
pub struct MetadataRenderer {
    pub source: Arc<SampleSource>,
    pub format: MetadataFormat,
}

/// Text output, either from manifest subtitles or embedded captions
#[derive(Debug, Clone)]
pub enum TextRenderer {
    /// Timed text segments from a dedicated subtitle source
    Subtitles {
        source: Arc<SampleSource>,
        format: TextTrackFormat,
    },
    /// Captions carried inside the primary audio/video stream
    EmbeddedCaptions {
        source: Arc<SampleSource>,
        format: TextTrackFormat,
    },
}

impl TextRenderer {
    pub fn mode(&self) -> TextMode {
        match self {
            TextRenderer::Subtitles { .. } => TextMode::ManifestSubtitles,
            TextRenderer::EmbeddedCaptions { .. } => TextMode::EmbeddedCaptions,
        }
    }

    pub fn format(&self) -> TextTrackFormat {
        match self {
            TextRenderer::Subtitles { format, .. } | TextRenderer::EmbeddedCaptions { format, .. } => {
                *format
            }
        }
    }
}

/// One renderer of a build
#[derive(Debug, Clone)]
pub enum Renderer {
    Video(VideoRenderer),
    Audio(AudioRenderer),
    Metadata(MetadataRenderer),
    Text(TextRenderer),
}

impl Renderer {
    pub fn track_type(&self) -> TrackType {
        match self {
            Renderer::Video(_) => TrackType::Video,
            Renderer::Audio(_) => TrackType::Audio,
            Renderer::Metadata(_) => TrackType::Metadata,
            Renderer::Text(_) => TrackType::Text,
        }
    }

    pub fn sample_source(&self) -> &Arc<SampleSource> {
        match self {
            Renderer::Video(r) => &r.source,
            Renderer::Audio(r) => &r.source,
            Renderer::Metadata(r) => &r.source,
            Renderer::Text(TextRenderer::Subtitles { source, .. })
            | Renderer::Text(TextRenderer::EmbeddedCaptions { source, .. }) => source,
        }
    }
}

/// The renderers of one successful build, indexed by [`TrackType`]
#[derive(Debug, Clone)]
pub struct RendererSet {
    renderers: [Renderer; RENDERER_COUNT],
}

impl RendererSet {
    pub fn new(
        video: VideoRenderer,
        audio: AudioRenderer,
        metadata: MetadataRenderer,
        text: TextRenderer,
    ) -> Self {
        Self {
            renderers: [
                Renderer::Video(video),
                Renderer::Audio(audio),
                Renderer::Text(text),
                Renderer::Metadata(metadata),
            ],
        }
    }

    /// Assemble from built pipelines, checking each lands in its own slot
    pub fn from_pipelines(
        video: TrackPipeline,
        audio: TrackPipeline,
        metadata: TrackPipeline,
        text: TrackPipeline,
    ) -> Result<Self> {
        match (video.renderer, audio.renderer, metadata.renderer, text.renderer) {
            (
                Renderer::Video(video),
                Renderer::Audio(audio),
                Renderer::Metadata(metadata),
                Renderer::Text(text),
            ) => Ok(Self::new(video, audio, metadata, text)),
            _ => Err(Error::construction("renderer does not match its track slot")),
        }
    }

    pub fn get(&self, track_type: TrackType) -> &Renderer {
        &self.renderers[track_type.index()]
    }

    pub fn iter(&self) -> impl Iterator<Item = &Renderer> {
        self.renderers.iter()
    }

    pub fn into_array(self) -> [Renderer; RENDERER_COUNT] {
        self.renderers
    }

    pub fn video(&self) -> &VideoRenderer {
        match self.get(TrackType::Video) {
            Renderer::Video(r) => r,
            _ => unreachable!("slot {} holds the video renderer", TrackType::Video.index()),
        }
    }

    pub fn text(&self) -> &TextRenderer {
        match self.get(TrackType::Text) {
            Renderer::Text(r) => r,
            _ => unreachable!("slot {} holds the text renderer", TrackType::Text.index()),
        }
    }

    pub fn text_mode(&self) -> TextMode {
        self.text().mode()
    }

    /// Serializable description of the assembled pipelines
    pub fn summary(&self) -> BuildSummary {
        let video_source = &self.video().source;
        let chunk_source = video_source.chunk_source();
        let text_source = self.get(TrackType::Text).sample_source();

        BuildSummary {
            master: chunk_source.manifest().is_master(),
            enabled_variants: chunk_source.enabled_variants(),
            initial_variant: chunk_source.select_variant(),
            text_mode: self.text_mode(),
            text_format: self.text().format().mime_type().to_string(),
            primary_buffer_bytes: video_source.buffer_budget(),
            text_buffer_bytes: if Arc::ptr_eq(text_source, video_source) {
                0
            } else {
                text_source.buffer_budget()
            },
            bitrate_ceiling: chunk_source.bandwidth().bitrate_ceiling(),
        }
    }
}

/// Snapshot of a delivered renderer set
#[derive(Debug, Clone, Serialize)]
pub struct BuildSummary {
    pub master: bool,
    pub enabled_variants: Vec<usize>,
    pub initial_variant: Option<usize>,
    pub text_mode: TextMode,
    pub text_format: String,
    pub primary_buffer_bytes: usize,
    /// Zero when text shares the primary buffer
    pub text_buffer_bytes: usize,
    pub bitrate_ceiling: u64,
}

impl BuildSummary {
    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|_| "{}".to_string())
    }
}
