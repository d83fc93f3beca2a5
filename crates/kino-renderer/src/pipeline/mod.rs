//! Per-track decode pipelines
//!
//! ```text
//!   primary ChunkSource ──► SampleSource ──┬─► VideoRenderer
//!                           (Arc, shared)  ├─► AudioRenderer
//!                                          ├─► MetadataRenderer
//!                                          └─► TextRenderer::EmbeddedCaptions
//!
//!   subtitle ChunkSource ─► SampleSource ────► TextRenderer::Subtitles
//! ```

mod chunk_source;
mod factory;
mod load_control;
mod renderer;
mod sample_source;
mod timestamp;

pub use chunk_source::{
    AdaptiveMode, ChunkSource, ChunkSourceConfig, ChunkSourceFactory, DefaultChunkSourceFactory,
    TrackSelector,
};
pub use factory::{TrackPipeline, TrackPipelineFactory};
pub use load_control::{LoadControl, LoaderId};
pub use renderer::{
    AudioRenderer, AudioStream, BuildSummary, MetadataFormat, MetadataRenderer, Renderer,
    RendererSet, TextRenderer, VideoRenderer, VideoScaling,
};
pub use sample_source::SampleSource;
pub use timestamp::{pts_to_us, us_to_pts, TimestampAdjuster, TimestampAdjusterProvider};
