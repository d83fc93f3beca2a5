//! Kino Renderer - HLS renderer assembly for Kino
//!
//! This crate turns a stream URL into the set of renderers a playback
//! engine drives:
//! - HLS manifest fetching and parsing
//! - Device capability based variant selection
//! - Shared bandwidth estimation with a live bitrate ceiling
//! - Chunk source, sample source and renderer wiring per track
//! - Manifest subtitles or embedded captions for text
//! - Cancellable asynchronous builds with a single result callback
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                      Kino Renderer                              │
//! ├─────────────────────────────────────────────────────────────────┤
//! │                                                                 │
//! │  ┌──────────────┐  ┌──────────────┐  ┌──────────────┐          │
//! │  │   Manifest   │  │   Variant    │  │  Bandwidth   │          │
//! │  │   Fetcher    │  │   Selector   │  │  Estimator   │          │
//! │  └──────┬───────┘  └──────┬───────┘  └──────┬───────┘          │
//! │         │                 │                 │                   │
//! │         └─────────────────┼─────────────────┘                   │
//! │                           │                                     │
//! │                    ┌──────┴──────┐                              │
//! │                    │  Renderer   │                              │
//! │                    │   Builder   │                              │
//! │                    └──────┬──────┘                              │
//! │                           │                                     │
//! │  ┌──────────────┐  ┌──────┴──────┐  ┌──────────────┐           │
//! │  │    Text      │  │   Track     │  │    Event     │           │
//! │  │   Policy     │  │  Pipelines  │  │     Bus      │           │
//! │  └──────────────┘  └─────────────┘  └──────────────┘           │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

pub mod error;
pub mod types;
pub mod config;
pub mod events;
pub mod bandwidth;
pub mod manifest;
pub mod selector;
pub mod pipeline;
pub mod text_policy;
pub mod builder;

pub use error::{Error, ErrorKind, Result};
pub use types::*;
pub use config::{BufferBudget, BuildRequest, UNLIMITED_BITRATE};
pub use events::{EventBus, PipelineEvent};
pub use bandwidth::{BandwidthEstimator, BandwidthMeasurement};
pub use manifest::{Manifest, ManifestFetcher, MasterPlaylist, MediaPlaylist};
#[cfg(feature = "hls")]
pub use manifest::{parse_playlist, HlsManifestFetcher};
pub use selector::{
    select_variants, CapabilityQuery, DeviceCapabilities, DisplayContext, SelectionResult,
};
pub use pipeline::{BuildSummary, ChunkSourceFactory, Renderer, RendererSet, TextRenderer};
pub use text_policy::TextMode;
pub use builder::{BuildCallback, BuildHandle, BuildOutcome, BuildPhase, RendererBuilder};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize the renderer library with default configuration
pub fn init() {
    tracing::info!(version = VERSION, "Kino Renderer initialized");
}
