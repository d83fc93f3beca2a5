//! Integration tests for Kino Renderer

use async_trait::async_trait;
use kino_renderer::{
    parse_playlist, pipeline::ChunkSource, pipeline::ChunkSourceConfig,
    pipeline::TimestampAdjusterProvider, pipeline::TrackSelector, BandwidthEstimator, BuildCallback,
    BuildOutcome, BuildPhase, BuildRequest, CapabilityQuery, ChunkSourceFactory, DeviceCapabilities,
    DisplayContext, Error, ErrorKind, Manifest, ManifestFetcher, PipelineEvent, RendererBuilder, RendererSet,
    Result, TextMode, TrackType, Variant,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot::error::TryRecvError;
use tokio::sync::{oneshot, Notify};
use url::Url;

const MASTER: &str = r#"#EXTM3U
#EXT-X-MEDIA:TYPE=SUBTITLES,GROUP-ID="subs",NAME="English",LANGUAGE="en",DEFAULT=YES,URI="subs/en.m3u8"
#EXT-X-STREAM-INF:BANDWIDTH=800000,RESOLUTION=640x360,CODECS="avc1.4d401e,mp4a.40.2",SUBTITLES="subs"
low/index.m3u8
#EXT-X-STREAM-INF:BANDWIDTH=2500000,RESOLUTION=1280x720,CODECS="avc1.4d401f,mp4a.40.2",SUBTITLES="subs"
high/index.m3u8
"#;

const MASTER_NO_SUBTITLES: &str = r#"#EXTM3U
#EXT-X-STREAM-INF:BANDWIDTH=800000,RESOLUTION=640x360,CODECS="avc1.4d401e,mp4a.40.2"
low/index.m3u8
#EXT-X-STREAM-INF:BANDWIDTH=2500000,RESOLUTION=1280x720,CODECS="avc1.4d401f,mp4a.40.2"
high/index.m3u8
"#;

const MEDIA: &str = r#"#EXTM3U
#EXT-X-VERSION:3
#EXT-X-TARGETDURATION:6
#EXT-X-MEDIA-SEQUENCE:0
#EXTINF:6.0,
seg0.ts
#EXTINF:6.0,
seg1.ts
#EXT-X-ENDLIST
"#;

const MASTER_MIXED_CODECS: &str = r#"#EXTM3U
#EXT-X-STREAM-INF:BANDWIDTH=3000000,RESOLUTION=1280x720,CODECS="av01.0.05M.08,mp4a.40.2"
av1/index.m3u8
#EXT-X-STREAM-INF:BANDWIDTH=5000000,RESOLUTION=1920x1080,CODECS="avc1.640028,mp4a.40.2"
avc/index.m3u8
"#;

const MASTER_AV1_ONLY: &str = r#"#EXTM3U
#EXT-X-STREAM-INF:BANDWIDTH=3000000,RESOLUTION=1280x720,CODECS="av01.0.05M.08,mp4a.40.2"
720p/index.m3u8
#EXT-X-STREAM-INF:BANDWIDTH=800000,RESOLUTION=640x360,CODECS="av01.0.04M.08,mp4a.40.2"
360p/index.m3u8
"#;

const MEDIA_HUGE_EXTINF: &str = r#"#EXTM3U
#EXT-X-TARGETDURATION:6
#EXTINF:10000000000000000000000000000000000000000,
seg0.ts
#EXT-X-ENDLIST
"#;

// =============================================================================
// Test collaborators
// =============================================================================

struct ScriptedFetcher {
    playlist: &'static str,
    fail: bool,
    /// When set, fetches wait for a permit before resolving
    gate: Option<Arc<Notify>>,
    started: Arc<Notify>,
    calls: AtomicUsize,
}

impl ScriptedFetcher {
    fn new(playlist: &'static str) -> Self {
        Self {
            playlist,
            fail: false,
            gate: None,
            started: Arc::new(Notify::new()),
            calls: AtomicUsize::new(0),
        }
    }

    fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new(MEDIA)
        }
    }

    fn gated(playlist: &'static str, gate: Arc<Notify>) -> Self {
        Self {
            gate: Some(gate),
            ..Self::new(playlist)
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ManifestFetcher for ScriptedFetcher {
    async fn fetch(&self, url: &Url, _user_agent: &str) -> Result<Manifest> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.started.notify_one();
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        if self.fail {
            return Err(Error::ManifestFetch("HTTP 503 Service Unavailable".to_string()));
        }
        parse_playlist(self.playlist.as_bytes(), url)
    }
}

struct ScriptedCapabilities {
    /// `None` makes every query fail
    indices: Option<Vec<usize>>,
    calls: AtomicUsize,
}

impl ScriptedCapabilities {
    fn returning(indices: Vec<usize>) -> Self {
        Self {
            indices: Some(indices),
            calls: AtomicUsize::new(0),
        }
    }

    fn failing() -> Self {
        Self {
            indices: None,
            calls: AtomicUsize::new(0),
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl CapabilityQuery for ScriptedCapabilities {
    fn decodable_variants(&self, _: &[Variant], _: &DisplayContext) -> Result<Vec<usize>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.indices
            .clone()
            .ok_or_else(|| Error::capability("decoder query failed"))
    }
}

struct FailingChunkSources;

impl ChunkSourceFactory for FailingChunkSources {
    fn create(
        &self,
        _: ChunkSourceConfig,
        _: Arc<BandwidthEstimator>,
        _: Arc<TimestampAdjusterProvider>,
    ) -> Result<ChunkSource> {
        Err(Error::construction("segment loader pool exhausted"))
    }
}

struct PanickingChunkSources;

impl ChunkSourceFactory for PanickingChunkSources {
    fn create(
        &self,
        _: ChunkSourceConfig,
        _: Arc<BandwidthEstimator>,
        _: Arc<TimestampAdjusterProvider>,
    ) -> Result<ChunkSource> {
        panic!("segment loader thread died")
    }
}

struct PanickingFetcher;

#[async_trait]
impl ManifestFetcher for PanickingFetcher {
    async fn fetch(&self, _: &Url, _: &str) -> Result<Manifest> {
        panic!("tls session unwound")
    }
}

/// Counts every callback invocation
#[derive(Clone, Default)]
struct CountingCallback {
    renderers: Arc<AtomicUsize>,
    errors: Arc<AtomicUsize>,
    done: Arc<Notify>,
}

impl BuildCallback for CountingCallback {
    fn on_renderers(self, _: RendererSet, _: Arc<BandwidthEstimator>) {
        self.renderers.fetch_add(1, Ordering::SeqCst);
        self.done.notify_one();
    }

    fn on_error(self, _: Error) {
        self.errors.fetch_add(1, Ordering::SeqCst);
        self.done.notify_one();
    }
}

fn request() -> BuildRequest {
    BuildRequest::new(
        Url::parse("https://cdn.example.com/live/master.m3u8").unwrap(),
        "kino-test/1.0",
    )
}

fn builder(fetcher: Arc<ScriptedFetcher>, capabilities: Arc<ScriptedCapabilities>) -> RendererBuilder {
    RendererBuilder::new(fetcher, capabilities).unwrap()
}

async fn outcome(rx: oneshot::Receiver<BuildOutcome>) -> BuildOutcome {
    tokio::time::timeout(Duration::from_secs(5), rx)
        .await
        .expect("build timed out")
        .expect("callback dropped without firing")
}

fn delivered(outcome: BuildOutcome) -> (RendererSet, Arc<BandwidthEstimator>) {
    match outcome {
        BuildOutcome::Delivered {
            renderers,
            bandwidth,
        } => (renderers, bandwidth),
        BuildOutcome::Failed(e) => panic!("build failed: {}", e),
    }
}

fn failed(outcome: BuildOutcome) -> Error {
    match outcome {
        BuildOutcome::Failed(e) => e,
        BuildOutcome::Delivered { .. } => panic!("build unexpectedly delivered"),
    }
}

// =============================================================================
// Delivery Tests
// =============================================================================

#[tokio::test]
async fn test_single_variant_delivers_embedded_captions() {
    let fetcher = Arc::new(ScriptedFetcher::new(MEDIA));
    let capabilities = Arc::new(ScriptedCapabilities::returning(vec![0]));
    let builder = builder(fetcher.clone(), capabilities.clone());

    let (tx, rx) = oneshot::channel();
    let handle = builder.start_build(request(), tx);
    let (renderers, _) = delivered(outcome(rx).await);

    let tracks: Vec<TrackType> = renderers.iter().map(|r| r.track_type()).collect();
    assert_eq!(
        tracks,
        vec![TrackType::Video, TrackType::Audio, TrackType::Text, TrackType::Metadata]
    );
    assert_eq!(renderers.text_mode(), TextMode::EmbeddedCaptions);
    assert_eq!(capabilities.calls(), 0);
    assert_eq!(fetcher.calls(), 1);
    assert_eq!(handle.phase(), BuildPhase::Delivered);

    // One buffered source feeds all four renderers.
    let video_source = renderers.get(TrackType::Video).sample_source();
    for renderer in renderers.iter() {
        assert!(Arc::ptr_eq(renderer.sample_source(), video_source));
    }
    assert_eq!(video_source.chunk_source().enabled_variants(), vec![0]);
}

#[tokio::test]
async fn test_master_selection_restricts_variants() {
    let fetcher = Arc::new(ScriptedFetcher::new(MASTER));
    let capabilities = Arc::new(ScriptedCapabilities::returning(vec![0]));
    let builder = builder(fetcher, capabilities.clone());

    let (tx, rx) = oneshot::channel();
    builder.start_build(request(), tx);
    let (renderers, _) = delivered(outcome(rx).await);

    assert_eq!(capabilities.calls(), 1);

    let video_source = &renderers.video().source;
    let chunk_source = video_source.chunk_source();
    assert!(chunk_source.is_primary());
    assert_eq!(chunk_source.enabled_variants(), vec![0]);
    match chunk_source.selector() {
        TrackSelector::Variants(Some(selection)) => assert_eq!(selection.indices(), &[0]),
        other => panic!("unexpected selector {:?}", other),
    }

    assert_eq!(renderers.text_mode(), TextMode::ManifestSubtitles);
    let text_source = renderers.get(TrackType::Text).sample_source();
    assert!(!Arc::ptr_eq(text_source, video_source));
    assert!(!text_source.chunk_source().is_primary());
    assert_eq!(text_source.buffer_budget(), 64 * 1024 * 2);
    assert_eq!(video_source.buffer_budget(), 64 * 1024 * 256);
    assert_eq!(video_source.load_control().loader_count(), 2);

    // Both chunk sources share one estimator and one timestamp provider.
    assert!(Arc::ptr_eq(
        chunk_source.bandwidth(),
        text_source.chunk_source().bandwidth()
    ));
    assert!(Arc::ptr_eq(
        chunk_source.timestamps(),
        text_source.chunk_source().timestamps()
    ));
}

#[tokio::test]
async fn test_master_without_subtitles_uses_captions() {
    let fetcher = Arc::new(ScriptedFetcher::new(MASTER_NO_SUBTITLES));
    let capabilities = Arc::new(ScriptedCapabilities::returning(vec![0, 1]));
    let builder = builder(fetcher, capabilities);

    let (tx, rx) = oneshot::channel();
    builder.start_build(request(), tx);
    let (renderers, _) = delivered(outcome(rx).await);

    assert_eq!(renderers.text_mode(), TextMode::EmbeddedCaptions);
    assert_eq!(renderers.summary().text_buffer_bytes, 0);
}

#[tokio::test]
async fn test_empty_selection_enables_all_variants() {
    let fetcher = Arc::new(ScriptedFetcher::new(MASTER));
    let capabilities = Arc::new(ScriptedCapabilities::returning(Vec::new()));
    let builder = builder(fetcher, capabilities);

    let (tx, rx) = oneshot::channel();
    builder.start_build(request(), tx);
    let (renderers, _) = delivered(outcome(rx).await);

    assert_eq!(
        renderers.video().source.chunk_source().enabled_variants(),
        vec![0, 1]
    );
}

#[tokio::test]
async fn test_default_capabilities_skip_undecodable_variants() {
    let fetcher = Arc::new(ScriptedFetcher::new(MASTER_MIXED_CODECS));
    let builder = RendererBuilder::new(fetcher, Arc::new(DeviceCapabilities::default()))
        .unwrap()
        .with_display(DisplayContext::new(1280, 720));

    let (tx, rx) = oneshot::channel();
    builder.start_build(request(), tx);
    let (renderers, _) = delivered(outcome(rx).await);

    // The AV1 rendition fills the viewport but cannot narrow the set.
    let chunk_source = renderers.video().source.chunk_source();
    assert_eq!(chunk_source.enabled_variants(), vec![1]);
    match chunk_source.selector() {
        TrackSelector::Variants(Some(selection)) => assert_eq!(selection.indices(), &[1]),
        other => panic!("unexpected selector {:?}", other),
    }
}

// =============================================================================
// Failure Tests
// =============================================================================

#[tokio::test]
async fn test_capability_failure_reported() {
    let fetcher = Arc::new(ScriptedFetcher::new(MASTER));
    let capabilities = Arc::new(ScriptedCapabilities::failing());
    let builder = builder(fetcher, capabilities);

    let (tx, rx) = oneshot::channel();
    let handle = builder.start_build(request(), tx);
    let error = failed(outcome(rx).await);

    assert!(matches!(error, Error::CapabilityQuery(_)));
    assert_eq!(error.kind(), ErrorKind::CapabilityQuery);
    assert_eq!(handle.phase(), BuildPhase::Failed);
    assert!(builder.current_build().is_none());
}

#[tokio::test]
async fn test_transport_failure_fires_once() {
    let fetcher = Arc::new(ScriptedFetcher::failing());
    let capabilities = Arc::new(ScriptedCapabilities::returning(vec![0]));
    let builder = builder(fetcher, capabilities);
    let mut events = builder.subscribe();

    let callback = CountingCallback::default();
    builder.start_build(request(), callback.clone());
    tokio::time::timeout(Duration::from_secs(5), callback.done.notified())
        .await
        .unwrap();

    assert_eq!(callback.errors.load(Ordering::SeqCst), 1);
    assert_eq!(callback.renderers.load(Ordering::SeqCst), 0);

    let mut failures = Vec::new();
    while let Ok(event) = events.try_recv() {
        if let PipelineEvent::BuildFailed { code, .. } = event {
            failures.push(code);
        }
    }
    assert_eq!(failures, vec!["MANIFEST_FETCH".to_string()]);
}

#[tokio::test]
async fn test_transport_error_kind() {
    let fetcher = Arc::new(ScriptedFetcher::failing());
    let capabilities = Arc::new(ScriptedCapabilities::returning(vec![0]));
    let builder = builder(fetcher, capabilities);

    let (tx, rx) = oneshot::channel();
    builder.start_build(request(), tx);
    let error = failed(outcome(rx).await);

    assert_eq!(error.kind(), ErrorKind::Transport);
    assert!(error.is_recoverable());
}

#[tokio::test]
async fn test_chunk_source_failure_is_construction_error() {
    let fetcher = Arc::new(ScriptedFetcher::new(MASTER));
    let capabilities = Arc::new(ScriptedCapabilities::returning(vec![0, 1]));
    let builder = builder(fetcher, capabilities).with_chunk_source_factory(Arc::new(FailingChunkSources));

    let (tx, rx) = oneshot::channel();
    builder.start_build(request(), tx);
    let error = failed(outcome(rx).await);

    assert_eq!(error.kind(), ErrorKind::Construction);
    assert!(!error.is_recoverable());
}

#[tokio::test]
async fn test_invalid_request_never_fetches() {
    let fetcher = Arc::new(ScriptedFetcher::new(MEDIA));
    let capabilities = Arc::new(ScriptedCapabilities::returning(vec![0]));
    let builder = builder(fetcher.clone(), capabilities);

    let (tx, rx) = oneshot::channel();
    builder.start_build(request().with_buffer_segments(64 * 1024, 0), tx);
    let error = failed(outcome(rx).await);

    assert_eq!(error.kind(), ErrorKind::Construction);
    assert_eq!(fetcher.calls(), 0);
}

#[tokio::test]
async fn test_default_capabilities_reject_undecodable_master() {
    let fetcher = Arc::new(ScriptedFetcher::new(MASTER_AV1_ONLY));
    let builder = RendererBuilder::new(fetcher, Arc::new(DeviceCapabilities::default())).unwrap();

    let (tx, rx) = oneshot::channel();
    let handle = builder.start_build(request(), tx);
    let error = failed(outcome(rx).await);

    // Never falls back to enabling every variant.
    assert!(matches!(error, Error::CapabilityQuery(_)));
    assert_eq!(handle.phase(), BuildPhase::Failed);
}

#[tokio::test]
async fn test_unrepresentable_segment_duration_is_transport_error() {
    let fetcher = Arc::new(ScriptedFetcher::new(MEDIA_HUGE_EXTINF));
    let capabilities = Arc::new(ScriptedCapabilities::returning(vec![0]));
    let builder = builder(fetcher, capabilities);

    let (tx, rx) = oneshot::channel();
    let handle = builder.start_build(request(), tx);
    let error = failed(outcome(rx).await);

    assert!(matches!(error, Error::ManifestParse(_)));
    assert_eq!(error.kind(), ErrorKind::Transport);
    assert_eq!(handle.phase(), BuildPhase::Failed);
}

#[tokio::test]
async fn test_panicking_chunk_source_fails_build() {
    let fetcher = Arc::new(ScriptedFetcher::new(MASTER));
    let capabilities = Arc::new(ScriptedCapabilities::returning(vec![0, 1]));
    let builder =
        builder(fetcher, capabilities).with_chunk_source_factory(Arc::new(PanickingChunkSources));
    let mut events = builder.subscribe();

    let (tx, rx) = oneshot::channel();
    let handle = builder.start_build(request(), tx);
    let error = failed(outcome(rx).await);

    assert!(matches!(error, Error::Construction(_)));
    assert_eq!(error.kind(), ErrorKind::Construction);
    assert!(error.to_string().contains("segment loader thread died"));
    assert_eq!(handle.phase(), BuildPhase::Failed);
    assert!(builder.current_build().is_none());

    let mut failures = Vec::new();
    while let Ok(event) = events.try_recv() {
        if let PipelineEvent::BuildFailed { build, code, .. } = event {
            assert_eq!(build, handle.id());
            failures.push(code);
        }
    }
    assert_eq!(failures, vec!["CONSTRUCTION".to_string()]);

    // The builder keeps working after the unwind.
    let (tx, rx) = oneshot::channel();
    let second = builder.start_build(request(), tx);
    assert!(matches!(failed(outcome(rx).await), Error::Construction(_)));
    assert_eq!(second.phase(), BuildPhase::Failed);
}

#[tokio::test]
async fn test_panicking_fetcher_fails_build() {
    let capabilities = Arc::new(ScriptedCapabilities::returning(vec![0]));
    let builder = RendererBuilder::new(Arc::new(PanickingFetcher), capabilities.clone()).unwrap();

    let callback = CountingCallback::default();
    let handle = builder.start_build(request(), callback.clone());
    tokio::time::timeout(Duration::from_secs(5), callback.done.notified())
        .await
        .unwrap();

    assert_eq!(callback.errors.load(Ordering::SeqCst), 1);
    assert_eq!(callback.renderers.load(Ordering::SeqCst), 0);
    assert_eq!(handle.phase(), BuildPhase::Failed);
    assert!(builder.current_build().is_none());
    assert_eq!(capabilities.calls(), 0);
}

// =============================================================================
// Cancellation Tests
// =============================================================================

#[tokio::test]
async fn test_cancel_before_manifest_is_silent() {
    let gate = Arc::new(Notify::new());
    let fetcher = Arc::new(ScriptedFetcher::gated(MASTER, gate.clone()));
    let capabilities = Arc::new(ScriptedCapabilities::returning(vec![0]));
    let builder = builder(fetcher.clone(), capabilities.clone());
    let mut events = builder.subscribe();

    let (tx, rx) = oneshot::channel();
    let handle = builder.start_build(request(), tx);
    fetcher.started.notified().await;

    let mut rx = rx;
    assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));

    builder.cancel_build(&handle);
    builder.cancel_build(&handle);
    gate.notify_one();

    // The callback is dropped unused, closing the channel.
    let result = tokio::time::timeout(Duration::from_secs(5), rx).await.unwrap();
    tokio_test::assert_err!(result);
    assert_eq!(handle.phase(), BuildPhase::Cancelled);
    assert_eq!(capabilities.calls(), 0);
    assert!(builder.bandwidth_estimator().is_none());

    let mut cancelled = 0;
    while let Ok(event) = events.try_recv() {
        match event {
            PipelineEvent::BuildCancelled { build } => {
                assert_eq!(build, handle.id());
                cancelled += 1;
            }
            PipelineEvent::ManifestLoaded { .. }
            | PipelineEvent::RenderersDelivered { .. }
            | PipelineEvent::BuildFailed { .. } => panic!("unexpected event {:?}", event),
            _ => {}
        }
    }
    assert_eq!(cancelled, 1);
}

#[tokio::test]
async fn test_cancel_immediately_after_start() {
    let fetcher = Arc::new(ScriptedFetcher::new(MEDIA));
    let capabilities = Arc::new(ScriptedCapabilities::returning(vec![0]));
    let builder = builder(fetcher, capabilities);

    let callback = CountingCallback::default();
    let handle = builder.start_build(request(), callback.clone());
    builder.cancel();

    tokio::time::sleep(Duration::from_millis(50)).await;
    let mut done = tokio_test::task::spawn(callback.done.notified());
    tokio_test::assert_pending!(done.poll());
    assert!(handle.is_cancelled());
    assert_eq!(callback.renderers.load(Ordering::SeqCst), 0);
    assert_eq!(callback.errors.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_new_build_supersedes_previous() {
    let gate = Arc::new(Notify::new());
    let slow = Arc::new(ScriptedFetcher::gated(MEDIA, gate.clone()));
    let capabilities = Arc::new(ScriptedCapabilities::returning(vec![0]));
    let builder = builder(slow.clone(), capabilities);

    let (first_tx, first_rx) = oneshot::channel();
    let first = builder.start_build(request(), first_tx);
    slow.started.notified().await;

    let (second_tx, second_rx) = oneshot::channel();
    let second = builder.start_build(request(), second_tx);
    assert_eq!(first.phase(), BuildPhase::Cancelled);
    assert_ne!(first.id(), second.id());
    assert_eq!(builder.current_build().map(|h| h.id()), Some(second.id()));

    slow.started.notified().await;
    gate.notify_one();
    let (renderers, _) = delivered(outcome(second_rx).await);
    assert_eq!(renderers.text_mode(), TextMode::EmbeddedCaptions);

    let first_result = tokio::time::timeout(Duration::from_secs(5), first_rx)
        .await
        .unwrap();
    tokio_test::assert_err!(first_result);
    assert_eq!(second.phase(), BuildPhase::Delivered);
}

#[tokio::test]
async fn test_cancel_after_delivery_is_noop() {
    let fetcher = Arc::new(ScriptedFetcher::new(MEDIA));
    let capabilities = Arc::new(ScriptedCapabilities::returning(vec![0]));
    let builder = builder(fetcher, capabilities);

    let (tx, rx) = oneshot::channel();
    let handle = builder.start_build(request(), tx);
    delivered(outcome(rx).await);

    builder.cancel_build(&handle);
    assert_eq!(handle.phase(), BuildPhase::Delivered);
    assert!(!handle.cancel());
}

// =============================================================================
// Bitrate Ceiling Tests
// =============================================================================

#[tokio::test]
async fn test_ceiling_before_build_is_reported() {
    let fetcher = Arc::new(ScriptedFetcher::new(MASTER));
    let capabilities = Arc::new(ScriptedCapabilities::returning(vec![0, 1]));
    let builder = builder(fetcher, capabilities);
    builder.set_bitrate_ceiling(1_000_000);

    let (tx, rx) = oneshot::channel();
    builder.start_build(request(), tx);
    let (renderers, bandwidth) = delivered(outcome(rx).await);

    assert_eq!(bandwidth.bitrate_ceiling(), 1_000_000);
    assert!(Arc::ptr_eq(&bandwidth, &builder.bandwidth_estimator().unwrap()));
    assert_eq!(renderers.summary().bitrate_ceiling, 1_000_000);
    // No measurement yet, so the ceiling alone picks the variant.
    assert_eq!(renderers.video().source.chunk_source().select_variant(), Some(0));
}

#[tokio::test]
async fn test_request_ceiling_applies_without_builder_ceiling() {
    let fetcher = Arc::new(ScriptedFetcher::new(MEDIA));
    let capabilities = Arc::new(ScriptedCapabilities::returning(vec![0]));
    let builder = builder(fetcher, capabilities);

    let (tx, rx) = oneshot::channel();
    builder.start_build(request().with_bitrate_ceiling(500_000), tx);
    let (_, bandwidth) = delivered(outcome(rx).await);

    assert_eq!(bandwidth.bitrate_ceiling(), 500_000);
}

#[tokio::test]
async fn test_ceiling_after_delivery_propagates_live() {
    let fetcher = Arc::new(ScriptedFetcher::new(MASTER));
    let capabilities = Arc::new(ScriptedCapabilities::returning(vec![0, 1]));
    let builder = builder(fetcher, capabilities);
    let mut events = builder.subscribe();

    let (tx, rx) = oneshot::channel();
    builder.start_build(request(), tx);
    let (renderers, bandwidth) = delivered(outcome(rx).await);
    let chunk_source = renderers.video().source.chunk_source();

    // 80 Mbps measured, both variants fit.
    bandwidth.record_transfer(10_000_000, Duration::from_secs(1));
    assert_eq!(chunk_source.select_variant(), Some(1));

    builder.set_bitrate_ceiling(1_000_000);
    assert_eq!(bandwidth.bitrate_ceiling(), 1_000_000);
    assert_eq!(chunk_source.select_variant(), Some(0));

    let mut ceilings = Vec::new();
    while let Ok(event) = events.try_recv() {
        if let PipelineEvent::BitrateCeilingChanged { ceiling } = event {
            ceilings.push(ceiling);
        }
    }
    assert_eq!(ceilings.last(), Some(&1_000_000));
}

#[tokio::test]
async fn test_estimator_reused_across_builds() {
    let fetcher = Arc::new(ScriptedFetcher::new(MEDIA));
    let capabilities = Arc::new(ScriptedCapabilities::returning(vec![0]));
    let builder = builder(fetcher, capabilities);

    let (tx, rx) = oneshot::channel();
    builder.start_build(request(), tx);
    let (_, first) = delivered(outcome(rx).await);
    first.record_transfer(1_000_000, Duration::from_secs(1));

    let (tx, rx) = oneshot::channel();
    builder.start_build(request(), tx);
    let (_, second) = delivered(outcome(rx).await);

    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(second.sample_count(), 1);
}

// =============================================================================
// Event Tests
// =============================================================================

#[tokio::test]
async fn test_event_sequence_for_master_build() {
    let fetcher = Arc::new(ScriptedFetcher::new(MASTER));
    let capabilities = Arc::new(ScriptedCapabilities::returning(vec![1]));
    let builder = builder(fetcher, capabilities);
    let mut events = builder.subscribe();

    let (tx, rx) = oneshot::channel();
    let handle = builder.start_build(request(), tx);
    delivered(outcome(rx).await);

    let mut names = Vec::new();
    while let Ok(event) = events.try_recv() {
        match event {
            PipelineEvent::BuildStarted { build, .. } => {
                assert_eq!(build, handle.id());
                names.push("started");
            }
            PipelineEvent::ManifestLoaded {
                master,
                variants,
                subtitles,
                ..
            } => {
                assert!(master);
                assert_eq!((variants, subtitles), (2, 1));
                names.push("loaded");
            }
            PipelineEvent::VariantsSelected { indices, .. } => {
                assert_eq!(indices, vec![1]);
                names.push("selected");
            }
            PipelineEvent::RenderersDelivered { text_mode, .. } => {
                assert_eq!(text_mode, TextMode::ManifestSubtitles);
                names.push("delivered");
            }
            _ => {}
        }
    }
    assert_eq!(names, vec!["started", "loaded", "selected", "delivered"]);
}

#[test]
fn test_builder_requires_runtime() {
    let fetcher = Arc::new(ScriptedFetcher::new(MEDIA));
    let capabilities = Arc::new(ScriptedCapabilities::returning(vec![0]));
    let result = RendererBuilder::new(fetcher, capabilities);
    assert!(matches!(result, Err(Error::Internal(_))));
}
