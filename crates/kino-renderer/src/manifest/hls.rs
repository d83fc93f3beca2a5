//! HLS playlist transport
//!
//! Fetches a playlist over HTTP and parses either shape:
//! - Master playlists (variants + SUBTITLES renditions)
//! - Media playlists (segments with discontinuity sequences)

use super::{Manifest, ManifestFetcher, MasterPlaylist, MediaPlaylist};
use crate::{error::Error, types::*, Result};
use async_trait::async_trait;
use bytes::Bytes;
use m3u8_rs::{AlternativeMediaType, Playlist};
use reqwest::{header::USER_AGENT, Client};
use std::time::Duration;
use tracing::{debug, instrument};
use url::Url;

/// HLS manifest fetcher
pub struct HlsManifestFetcher {
    client: Client,
}

impl HlsManifestFetcher {
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self { client })
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ManifestFetcher for HlsManifestFetcher {
    #[instrument(skip(self))]
    async fn fetch(&self, url: &Url, user_agent: &str) -> Result<Manifest> {
        debug!("Fetching HLS playlist: {}", url);

        let response = self
            .client
            .get(url.clone())
            .header(USER_AGENT, user_agent)
            .send()
            .await
            .map_err(|e| Error::ManifestFetch(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::ManifestFetch(format!("{} returned {}", url, status)));
        }

        let body: Bytes = response
            .bytes()
            .await
            .map_err(|e| Error::ManifestFetch(e.to_string()))?;

        parse_playlist(&body, url)
    }
}

/// Parse playlist bytes loaded from `base_url`
pub fn parse_playlist(data: &[u8], base_url: &Url) -> Result<Manifest> {
    let playlist = m3u8_rs::parse_playlist_res(data)
        .map_err(|e| Error::ManifestParse(format!("Failed to parse HLS playlist: {:?}", e)))?;

    match playlist {
        Playlist::MasterPlaylist(master) => parse_master(&master, base_url),
        Playlist::MediaPlaylist(media) => parse_media(&media, base_url),
    }
}

fn parse_master(master: &m3u8_rs::MasterPlaylist, base_url: &Url) -> Result<Manifest> {
    // Playlist order is kept; selection results index into it.
    let mut variants = Vec::new();
    for variant in master.variants.iter().filter(|v| !v.is_i_frame) {
        let resolution = variant
            .resolution
            .map(|r| -> Result<Resolution> {
                Ok(Resolution {
                    width: dimension(r.width)?,
                    height: dimension(r.height)?,
                })
            })
            .transpose()?;
        variants.push(Variant {
            index: variants.len(),
            bandwidth: variant.bandwidth,
            resolution,
            frame_rate: variant.frame_rate.map(|f| f as f32),
            codecs: variant.codecs.clone(),
            uri: resolve_uri(base_url, &variant.uri)?,
        });
    }

    let mut subtitles = Vec::new();
    for media in master
        .alternatives
        .iter()
        .filter(|m| matches!(m.media_type, AlternativeMediaType::Subtitles))
    {
        subtitles.push(SubtitleTrack {
            group_id: media.group_id.clone(),
            name: media.name.clone(),
            language: media.language.clone(),
            uri: media
                .uri
                .as_deref()
                .map(|u| resolve_uri(base_url, u))
                .transpose()?,
            is_default: media.default,
            is_forced: media.forced,
        });
    }

    debug!(
        variants = variants.len(),
        subtitles = subtitles.len(),
        "Parsed HLS master playlist"
    );

    Ok(Manifest::Master(MasterPlaylist {
        base_url: base_url.clone(),
        variants,
        subtitles,
    }))
}

fn parse_media(media: &m3u8_rs::MediaPlaylist, base_url: &Url) -> Result<Manifest> {
    let mut segments = Vec::with_capacity(media.segments.len());
    let mut discontinuity_sequence = media.discontinuity_sequence;

    for (idx, seg) in media.segments.iter().enumerate() {
        if seg.discontinuity {
            discontinuity_sequence += 1;
        }
        segments.push(Segment {
            number: media.media_sequence + idx as u64,
            uri: resolve_uri(base_url, &seg.uri)?,
            duration: segment_duration(seg.duration)?,
            discontinuity_sequence,
        });
    }

    Ok(Manifest::SingleVariant(MediaPlaylist {
        base_url: base_url.clone(),
        segments,
        target_duration: Duration::from_secs(media.target_duration as u64),
        is_live: !media.end_list,
    }))
}

fn dimension(value: u64) -> Result<u32> {
    u32::try_from(value)
        .map_err(|_| Error::ManifestParse(format!("RESOLUTION dimension {} out of range", value)))
}

fn segment_duration(seconds: f32) -> Result<Duration> {
    if seconds.is_sign_negative() {
        return Err(Error::ManifestParse(format!("Negative EXTINF duration {}", seconds)));
    }
    Duration::try_from_secs_f32(seconds)
        .map_err(|e| Error::ManifestParse(format!("Invalid EXTINF duration {}: {}", seconds, e)))
}

/// Resolve relative URI against base URL
fn resolve_uri(base: &Url, relative: &str) -> Result<Url> {
    base.join(relative)
        .map_err(|e| Error::ManifestParse(format!("Invalid URI '{}': {}", relative, e)))
}
