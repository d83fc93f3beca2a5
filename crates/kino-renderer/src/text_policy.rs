//! Text track policy
//!
//! Manifest subtitles carry language and format metadata, so they win
//! whenever a master playlist declares any. Otherwise captions embedded in
//! the primary stream are used, so a text renderer always exists.

use crate::{
    config::BufferBudget,
    manifest::Manifest,
    pipeline::{ChunkSourceConfig, SampleSource, TrackPipeline, TrackPipelineFactory},
    types::TrackType,
    Result,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

/// Where text samples come from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextMode {
    /// Separate subtitle playlist with its own chunk and sample source
    ManifestSubtitles,
    /// Captions extracted from the primary sample stream
    EmbeddedCaptions,
}

impl TextMode {
    /// Decide once per build
    pub fn for_manifest(manifest: &Manifest) -> Self {
        match manifest {
            Manifest::Master(master) if !master.subtitles.is_empty() => TextMode::ManifestSubtitles,
            Manifest::Master(_) | Manifest::SingleVariant(_) => TextMode::EmbeddedCaptions,
        }
    }

    /// Build the text pipeline for this mode.
    ///
    /// `primary` is the sample source shared by video, audio and metadata;
    /// embedded captions read from it, manifest subtitles get their own
    /// source sized by `text_budget`.
    pub fn build_pipeline(
        self,
        factory: &TrackPipelineFactory,
        manifest: &Arc<Manifest>,
        user_agent: &str,
        primary: &Arc<SampleSource>,
        text_budget: BufferBudget,
    ) -> Result<TrackPipeline> {
        debug!(mode = ?self, "Building text pipeline");
        match self {
            TextMode::ManifestSubtitles => factory.build(
                TrackType::Text,
                ChunkSourceConfig::subtitles(Arc::clone(manifest), user_agent),
                text_budget,
            ),
            TextMode::EmbeddedCaptions => factory.attach(TrackType::Text, primary),
        }
    }
}

impl std::fmt::Display for TextMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TextMode::ManifestSubtitles => write!(f, "manifest-subtitles"),
            TextMode::EmbeddedCaptions => write!(f, "embedded-captions"),
        }
    }
}
