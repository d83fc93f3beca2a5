//! Chunk sources: which manifest segment a track loads next
//!
//! Construction only records parameters. Segment I/O belongs to the
//! playback engine that later drives the source.

use super::timestamp::{TimestampAdjuster, TimestampAdjusterProvider};
use crate::{
    bandwidth::BandwidthEstimator, config::UNLIMITED_BITRATE, manifest::Manifest,
    selector::SelectionResult, Result,
};
use std::sync::Arc;
use url::Url;

/// Share of measured throughput a variant may use
const BANDWIDTH_FRACTION: f64 = 0.8;

/// How a source switches between variants
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdaptiveMode {
    /// Re-load the overlapping segment of the new variant and splice
    Splice,
}

/// Tracks a source loads
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrackSelector {
    /// Adaptive video/audio variants, optionally restricted
    Variants(Option<SelectionResult>),
    /// Subtitle renditions only
    Subtitles,
}

/// Parameters for building a chunk source
#[derive(Debug, Clone)]
pub struct ChunkSourceConfig {
    pub manifest: Arc<Manifest>,
    pub user_agent: String,
    pub selector: TrackSelector,
    pub adaptive_mode: AdaptiveMode,
    /// The primary source owns timestamp adjuster creation
    pub is_primary: bool,
}

impl ChunkSourceConfig {
    /// Video/audio/metadata source restricted to `selection`
    pub fn primary(
        manifest: Arc<Manifest>,
        user_agent: impl Into<String>,
        selection: Option<SelectionResult>,
    ) -> Self {
        Self {
            manifest,
            user_agent: user_agent.into(),
            selector: TrackSelector::Variants(selection),
            adaptive_mode: AdaptiveMode::Splice,
            is_primary: true,
        }
    }

    /// Subtitle-only source
    pub fn subtitles(manifest: Arc<Manifest>, user_agent: impl Into<String>) -> Self {
        Self {
            manifest,
            user_agent: user_agent.into(),
            selector: TrackSelector::Subtitles,
            adaptive_mode: AdaptiveMode::Splice,
            is_primary: false,
        }
    }
}

/// A parameterized chunk source
#[derive(Debug)]
pub struct ChunkSource {
    config: ChunkSourceConfig,
    bandwidth: Arc<BandwidthEstimator>,
    timestamps: Arc<TimestampAdjusterProvider>,
}

impl ChunkSource {
    pub fn new(
        config: ChunkSourceConfig,
        bandwidth: Arc<BandwidthEstimator>,
        timestamps: Arc<TimestampAdjusterProvider>,
    ) -> Self {
        Self {
            config,
            bandwidth,
            timestamps,
        }
    }

    pub fn manifest(&self) -> &Arc<Manifest> {
        &self.config.manifest
    }

    pub fn base_url(&self) -> &Url {
        self.config.manifest.base_url()
    }

    pub fn user_agent(&self) -> &str {
        &self.config.user_agent
    }

    pub fn selector(&self) -> &TrackSelector {
        &self.config.selector
    }

    pub fn adaptive_mode(&self) -> AdaptiveMode {
        self.config.adaptive_mode
    }

    pub fn is_primary(&self) -> bool {
        self.config.is_primary
    }

    pub fn bandwidth(&self) -> &Arc<BandwidthEstimator> {
        &self.bandwidth
    }

    pub fn timestamps(&self) -> &Arc<TimestampAdjusterProvider> {
        &self.timestamps
    }

    /// Adjuster for segments in `discontinuity_sequence`
    pub fn timestamp_adjuster(
        &self,
        discontinuity_sequence: u64,
        start_time_us: i64,
    ) -> Option<Arc<TimestampAdjuster>> {
        self.timestamps
            .adjuster(self.config.is_primary, discontinuity_sequence, start_time_us)
    }

    /// Indices this source may load, in manifest order.
    ///
    /// For variants, an absent or empty selection enables every variant.
    pub fn enabled_variants(&self) -> Vec<usize> {
        let manifest = &self.config.manifest;
        match (&self.config.selector, manifest.as_ref()) {
            (TrackSelector::Subtitles, _) => manifest
                .subtitles()
                .iter()
                .enumerate()
                .filter(|(_, track)| track.uri.is_some())
                .map(|(i, _)| i)
                .collect(),
            (TrackSelector::Variants(_), Manifest::SingleVariant(_)) => vec![0],
            (TrackSelector::Variants(Some(selection)), Manifest::Master(_))
                if !selection.is_empty() =>
            {
                selection.indices().to_vec()
            }
            (TrackSelector::Variants(_), Manifest::Master(master)) => {
                (0..master.variants.len()).collect()
            }
        }
    }

    /// Variant (or subtitle rendition) to load next.
    ///
    /// Reads the shared estimator on every call, so ceiling changes apply
    /// to sources that already exist.
    pub fn select_variant(&self) -> Option<usize> {
        let enabled = self.enabled_variants();

        let variants = match (&self.config.selector, self.config.manifest.as_ref()) {
            (TrackSelector::Subtitles, manifest) => {
                let subtitles = manifest.subtitles();
                return enabled
                    .iter()
                    .copied()
                    .find(|&i| subtitles[i].is_default)
                    .or_else(|| enabled.first().copied());
            }
            (TrackSelector::Variants(_), Manifest::SingleVariant(_)) => return Some(0),
            (TrackSelector::Variants(_), Manifest::Master(master)) => &master.variants,
        };

        let Some(budget) = self.bitrate_budget() else {
            return enabled.first().copied();
        };

        enabled
            .iter()
            .copied()
            .filter(|&i| variants[i].bandwidth <= budget)
            .max_by_key(|&i| variants[i].bandwidth)
            .or_else(|| {
                enabled
                    .iter()
                    .copied()
                    .min_by_key(|&i| variants[i].bandwidth)
            })
    }

    fn bitrate_budget(&self) -> Option<u64> {
        let ceiling = self.bandwidth.bitrate_ceiling();
        let measured = self
            .bandwidth
            .measured_bitrate()
            .map(|bps| (bps as f64 * BANDWIDTH_FRACTION) as u64);

        match measured {
            Some(bps) => Some(bps.min(ceiling)),
            None if ceiling != UNLIMITED_BITRATE => Some(ceiling),
            None => None,
        }
    }
}

/// Creates chunk sources; replace it to customize how segments are chosen
pub trait ChunkSourceFactory: Send + Sync {
    fn create(
        &self,
        config: ChunkSourceConfig,
        bandwidth: Arc<BandwidthEstimator>,
        timestamps: Arc<TimestampAdjusterProvider>,
    ) -> Result<ChunkSource>;
}

/// Builds stock chunk sources
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultChunkSourceFactory;

impl ChunkSourceFactory for DefaultChunkSourceFactory {
    fn create(
        &self,
        config: ChunkSourceConfig,
        bandwidth: Arc<BandwidthEstimator>,
        timestamps: Arc<TimestampAdjusterProvider>,
    ) -> Result<ChunkSource> {
        Ok(ChunkSource::new(config, bandwidth, timestamps))
    }
}
