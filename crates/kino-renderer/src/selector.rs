//! Device-aware variant selection
//!
//! Decides which master playlist variants are eligible for adaptive
//! playback. Single-variant manifests produce no selection at all, which
//! chunk sources read as "no restriction".

use crate::{manifest::Manifest, types::*, Error, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

/// Fraction of the viewport a variant must fill to count as full screen
const FRACTION_TO_CONSIDER_FULLSCREEN: f64 = 0.98;

/// Size of the surface video will be shown on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayContext {
    pub width: u32,
    pub height: u32,
    /// The device may rotate, so either orientation can be shown
    pub orientation_may_change: bool,
}

impl DisplayContext {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            orientation_may_change: true,
        }
    }
}

impl Default for DisplayContext {
    fn default() -> Self {
        Self::new(1920, 1080)
    }
}

/// Reports which variants the device can decode
pub trait CapabilityQuery: Send + Sync {
    /// Indices into `variants` the device can play on `display`.
    ///
    /// Failures must be [`Error::CapabilityQuery`].
    fn decodable_variants(&self, variants: &[Variant], display: &DisplayContext)
        -> Result<Vec<usize>>;
}

/// Indices of the variants enabled for adaptive playback, ascending.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectionResult {
    indices: Vec<usize>,
}

impl SelectionResult {
    /// Keep in-range indices, in playlist order, without duplicates
    pub fn new(mut indices: Vec<usize>, variant_count: usize) -> Self {
        indices.retain(|&i| i < variant_count);
        indices.sort_unstable();
        indices.dedup();
        Self { indices }
    }

    pub fn indices(&self) -> &[usize] {
        &self.indices
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    pub fn contains(&self, index: usize) -> bool {
        self.indices.binary_search(&index).is_ok()
    }
}

/// Run capability-aware selection for `manifest`.
///
/// Returns `Ok(None)` for single-variant manifests without consulting
/// `query`.
#[instrument(skip_all, fields(master = manifest.is_master()))]
pub fn select_variants(
    manifest: &Manifest,
    query: &dyn CapabilityQuery,
    display: &DisplayContext,
) -> Result<Option<SelectionResult>> {
    let Manifest::Master(master) = manifest else {
        return Ok(None);
    };

    let decodable = query.decodable_variants(&master.variants, display)?;
    let selection = SelectionResult::new(decodable, master.variants.len());

    debug!(
        variants = master.variants.len(),
        selected = ?selection.indices(),
        "Variant selection complete"
    );

    Ok(Some(selection))
}

/// Static description of a device's decoders
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceCapabilities {
    /// Decodable video codecs; empty means the decoder list is unavailable
    pub video_codecs: Vec<VideoCodec>,
    /// Decodable audio codecs
    pub audio_codecs: Vec<AudioCodec>,
    /// Largest frame the video decoder accepts
    pub max_decode_resolution: Resolution,
}

impl Default for DeviceCapabilities {
    fn default() -> Self {
        Self {
            video_codecs: vec![VideoCodec::H264, VideoCodec::H265],
            audio_codecs: vec![AudioCodec::Aac, AudioCodec::Ac3, AudioCodec::Eac3],
            max_decode_resolution: Resolution::FHD_1080P,
        }
    }
}

impl DeviceCapabilities {
    fn is_playable(&self, variant: &Variant) -> bool {
        if let Some(codec) = variant.video_codec() {
            if !self.video_codecs.contains(&codec) {
                return false;
            }
        }
        if let Some(codec) = variant.audio_codec() {
            if !self.audio_codecs.contains(&codec) {
                return false;
            }
        }
        match variant.resolution {
            Some(res) => res.pixels() <= self.max_decode_resolution.pixels(),
            None => true,
        }
    }
}

impl CapabilityQuery for DeviceCapabilities {
    fn decodable_variants(
        &self,
        variants: &[Variant],
        display: &DisplayContext,
    ) -> Result<Vec<usize>> {
        if self.video_codecs.is_empty() {
            return Err(Error::capability("no video decoders reported"));
        }

        let mut selected = Vec::new();
        let mut max_pixels_to_retain = u64::MAX;

        for (index, variant) in variants.iter().enumerate() {
            if !self.is_playable(variant) {
                continue;
            }
            selected.push(index);

            // Track the smallest playable variant that still fills the viewport.
            if let Some(res) = variant.resolution.filter(|r| r.width > 0 && r.height > 0) {
                if display.width == 0 || display.height == 0 {
                    continue;
                }
                let (fit_w, fit_h) = max_size_in_viewport(display, res);
                let fills_width = f64::from(res.width) >= (fit_w as f64 * FRACTION_TO_CONSIDER_FULLSCREEN).floor();
                let fills_height = f64::from(res.height) >= (fit_h as f64 * FRACTION_TO_CONSIDER_FULLSCREEN).floor();
                if fills_width && fills_height && res.pixels() < max_pixels_to_retain {
                    max_pixels_to_retain = res.pixels();
                }
            }
        }

        if selected.is_empty() && !variants.is_empty() {
            return Err(Error::capability("no variant is decodable on this device"));
        }

        if max_pixels_to_retain != u64::MAX {
            selected.retain(|&index| match variants[index].resolution {
                Some(res) if res.width > 0 && res.height > 0 => res.pixels() <= max_pixels_to_retain,
                _ => true,
            });
        }

        Ok(selected)
    }
}

/// Largest size with the video's aspect ratio that fits the viewport
fn max_size_in_viewport(display: &DisplayContext, video: Resolution) -> (u64, u64) {
    let (mut vw, mut vh) = (u64::from(display.width), u64::from(display.height));
    let (w, h) = (u64::from(video.width), u64::from(video.height));

    if display.orientation_may_change && (w > h) != (vw > vh) {
        std::mem::swap(&mut vw, &mut vh);
    }

    if w * vh >= h * vw {
        (vw, (vw * h).div_ceil(w))
    } else {
        ((vh * w).div_ceil(h), vh)
    }
}
