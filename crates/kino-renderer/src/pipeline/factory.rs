//! Track pipeline construction
//!
//! Wires chunk source -> sample source -> renderer for one track type.
//! Nothing here performs I/O.

use super::{
    chunk_source::{ChunkSourceConfig, ChunkSourceFactory, TrackSelector},
    load_control::LoadControl,
    renderer::{
        AudioRenderer, AudioStream, MetadataFormat, MetadataRenderer, Renderer, TextRenderer,
        VideoRenderer,
    },
    sample_source::SampleSource,
    timestamp::TimestampAdjusterProvider,
};
use crate::{
    bandwidth::BandwidthEstimator, config::BufferBudget, types::TextTrackFormat,
    types::TrackType, Error, Result,
};
use std::sync::Arc;
use tracing::debug;

/// One assembled (chunk source, sample source, renderer) triple.
///
/// The chunk source is owned by the sample source.
#[derive(Debug, Clone)]
pub struct TrackPipeline {
    pub track_type: TrackType,
    pub sample_source: Arc<SampleSource>,
    pub renderer: Renderer,
}

/// Builds track pipelines that share one estimator, one timestamp
/// provider and one load control
pub struct TrackPipelineFactory {
    bandwidth: Arc<BandwidthEstimator>,
    timestamps: Arc<TimestampAdjusterProvider>,
    load_control: Arc<LoadControl>,
    chunk_sources: Arc<dyn ChunkSourceFactory>,
}

impl TrackPipelineFactory {
    pub fn new(
        bandwidth: Arc<BandwidthEstimator>,
        timestamps: Arc<TimestampAdjusterProvider>,
        load_control: Arc<LoadControl>,
        chunk_sources: Arc<dyn ChunkSourceFactory>,
    ) -> Self {
        Self {
            bandwidth,
            timestamps,
            load_control,
            chunk_sources,
        }
    }

    pub fn bandwidth(&self) -> &Arc<BandwidthEstimator> {
        &self.bandwidth
    }

    /// Build a fresh pipeline for `track_type` with its own sample source
    pub fn build(
        &self,
        track_type: TrackType,
        config: ChunkSourceConfig,
        budget: BufferBudget,
    ) -> Result<TrackPipeline> {
        let bytes = budget.bytes().map_err(|e| {
            Error::construction(format!("{} buffer: {}", track_type, e))
        })?;

        let chunk_source = self
            .chunk_sources
            .create(
                config,
                Arc::clone(&self.bandwidth),
                Arc::clone(&self.timestamps),
            )
            .map_err(|e| match e {
                Error::Construction(_) => e,
                other => Error::construction(format!("{} chunk source: {}", track_type, other)),
            })?;

        let sample_source = Arc::new(SampleSource::new(
            chunk_source,
            Arc::clone(&self.load_control),
            bytes,
            track_type,
        ));

        debug!(track = %track_type, buffer_bytes = bytes, "Track pipeline built");

        self.attach(track_type, &sample_source)
    }

    /// Build a renderer for `track_type` reading an existing sample source
    pub fn attach(
        &self,
        track_type: TrackType,
        sample_source: &Arc<SampleSource>,
    ) -> Result<TrackPipeline> {
        let renderer = renderer_for(track_type, Arc::clone(sample_source));
        debug!(
            track = %track_type,
            event_source = %sample_source.event_source(),
            "Renderer attached"
        );
        Ok(TrackPipeline {
            track_type,
            sample_source: Arc::clone(sample_source),
            renderer,
        })
    }
}

fn renderer_for(track_type: TrackType, source: Arc<SampleSource>) -> Renderer {
    match track_type {
        TrackType::Video => Renderer::Video(VideoRenderer::new(source)),
        TrackType::Audio => Renderer::Audio(AudioRenderer {
            source,
            stream: AudioStream::Music,
        }),
        TrackType::Metadata => Renderer::Metadata(MetadataRenderer {
            source,
            format: MetadataFormat::Id3,
        }),
        TrackType::Text => match source.chunk_source().selector() {
            TrackSelector::Subtitles => Renderer::Text(TextRenderer::Subtitles {
                source,
                format: TextTrackFormat::WebVtt,
            }),
            TrackSelector::Variants(_) => Renderer::Text(TextRenderer::EmbeddedCaptions {
                source,
                format: TextTrackFormat::Cea608,
            }),
        },
    }
}
