//! Renderer Builder - asynchronous assembly of a playback renderer set
//!
//! Coordinates:
//! - Manifest fetching (the only suspension point)
//! - Device-aware variant selection
//! - Bandwidth estimator and timestamp provider sharing
//! - Track pipeline construction and text policy
//! - Single delivery of the result, or none after cancellation

use crate::{
    bandwidth::BandwidthEstimator,
    config::{BuildRequest, UNLIMITED_BITRATE},
    events::{EventBus, PipelineEvent},
    manifest::{Manifest, ManifestFetcher},
    pipeline::{
        ChunkSourceConfig, ChunkSourceFactory, DefaultChunkSourceFactory, LoadControl, RendererSet,
        TimestampAdjusterProvider, TrackPipelineFactory,
    },
    selector::{select_variants, CapabilityQuery, DisplayContext},
    types::{BuildId, TrackType},
    Error, Result, TextMode,
};
use parking_lot::Mutex;
use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span, instrument, warn, Instrument};

/// Lifecycle of one build
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BuildPhase {
    /// Waiting for the manifest or assembling
    Pending,
    /// Renderers were handed to the callback
    Delivered,
    /// The error callback fired
    Failed,
    /// Dropped without any callback
    Cancelled,
}

#[derive(Debug)]
struct Ticket {
    id: BuildId,
    phase: Mutex<BuildPhase>,
    cancel: CancellationToken,
}

/// Handle to one in-flight build.
///
/// Leaving `Pending` happens exactly once, under a lock, so a cancel that
/// races a delivery either suppresses the callback or is a no-op.
#[derive(Debug, Clone)]
pub struct BuildHandle {
    ticket: Arc<Ticket>,
}

impl BuildHandle {
    fn new() -> Self {
        Self {
            ticket: Arc::new(Ticket {
                id: BuildId::new(),
                phase: Mutex::new(BuildPhase::Pending),
                cancel: CancellationToken::new(),
            }),
        }
    }

    pub fn id(&self) -> BuildId {
        self.ticket.id
    }

    pub fn phase(&self) -> BuildPhase {
        *self.ticket.phase.lock()
    }

    pub fn is_cancelled(&self) -> bool {
        self.phase() == BuildPhase::Cancelled
    }

    /// Cancel the build; returns false if it had already settled
    pub fn cancel(&self) -> bool {
        if self.settle(BuildPhase::Cancelled) {
            self.ticket.cancel.cancel();
            true
        } else {
            false
        }
    }

    fn settle(&self, outcome: BuildPhase) -> bool {
        let mut phase = self.ticket.phase.lock();
        if *phase == BuildPhase::Pending {
            *phase = outcome;
            true
        } else {
            false
        }
    }

    fn same_build(&self, other: &BuildHandle) -> bool {
        Arc::ptr_eq(&self.ticket, &other.ticket)
    }
}

/// Receives the result of a build.
///
/// Both methods consume the callback, so at most one of them can run.
pub trait BuildCallback: Send + 'static {
    fn on_renderers(self, renderers: RendererSet, bandwidth: Arc<BandwidthEstimator>);
    fn on_error(self, error: Error);
}

/// Result of a build, for channel-based callers
#[derive(Debug)]
pub enum BuildOutcome {
    Delivered {
        renderers: RendererSet,
        bandwidth: Arc<BandwidthEstimator>,
    },
    Failed(Error),
}

impl BuildCallback for oneshot::Sender<BuildOutcome> {
    fn on_renderers(self, renderers: RendererSet, bandwidth: Arc<BandwidthEstimator>) {
        let _ = self.send(BuildOutcome::Delivered {
            renderers,
            bandwidth,
        });
    }

    fn on_error(self, error: Error) {
        let _ = self.send(BuildOutcome::Failed(error));
    }
}

#[derive(Debug, Default)]
struct BuilderState {
    current: Option<BuildHandle>,
    bitrate_ceiling: Option<u64>,
    bandwidth: Option<Arc<BandwidthEstimator>>,
}

/// Builds renderer sets for adaptive HLS playback
pub struct RendererBuilder {
    fetcher: Arc<dyn ManifestFetcher>,
    capabilities: Arc<dyn CapabilityQuery>,
    chunk_sources: Arc<dyn ChunkSourceFactory>,
    display: DisplayContext,
    runtime: Handle,
    events: EventBus,
    state: Arc<Mutex<BuilderState>>,
}

impl RendererBuilder {
    /// Create a builder that runs builds on the current tokio runtime
    pub fn new(
        fetcher: Arc<dyn ManifestFetcher>,
        capabilities: Arc<dyn CapabilityQuery>,
    ) -> Result<Self> {
        let runtime = Handle::try_current()
            .map_err(|e| Error::Internal(format!("no tokio runtime: {}", e)))?;

        Ok(Self {
            fetcher,
            capabilities,
            chunk_sources: Arc::new(DefaultChunkSourceFactory),
            display: DisplayContext::default(),
            runtime,
            events: EventBus::default(),
            state: Arc::new(Mutex::new(BuilderState::default())),
        })
    }

    pub fn with_display(mut self, display: DisplayContext) -> Self {
        self.display = display;
        self
    }

    pub fn with_chunk_source_factory(mut self, factory: Arc<dyn ChunkSourceFactory>) -> Self {
        self.chunk_sources = factory;
        self
    }

    pub fn with_event_bus(mut self, events: EventBus) -> Self {
        self.events = events;
        self
    }

    /// Run builds and callbacks on `runtime` instead
    pub fn with_runtime(mut self, runtime: Handle) -> Self {
        self.runtime = runtime;
        self
    }

    /// Subscribe to build and bandwidth events
    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<PipelineEvent> {
        self.events.subscribe()
    }

    /// The estimator of the most recent build, once one has assembled
    pub fn bandwidth_estimator(&self) -> Option<Arc<BandwidthEstimator>> {
        self.state.lock().bandwidth.clone()
    }

    /// Handle of the build currently in flight, if any
    pub fn current_build(&self) -> Option<BuildHandle> {
        self.state
            .lock()
            .current
            .clone()
            .filter(|h| h.phase() == BuildPhase::Pending)
    }

    /// Cap the selectable bitrate.
    ///
    /// Applies to the live estimator immediately and is remembered for
    /// later builds.
    pub fn set_bitrate_ceiling(&self, bitrate: u64) {
        let mut state = self.state.lock();
        state.bitrate_ceiling = Some(bitrate);
        match &state.bandwidth {
            Some(bandwidth) => bandwidth.set_bitrate_ceiling(bitrate),
            None => debug!(ceiling = bitrate, "Bitrate ceiling stored for next build"),
        }
    }

    /// Start a build, cancelling any build still in flight
    #[instrument(skip(self, request, callback), fields(url = %request.url))]
    pub fn start_build<C: BuildCallback>(&self, request: BuildRequest, callback: C) -> BuildHandle {
        let handle = BuildHandle::new();

        let previous = self.state.lock().current.replace(handle.clone());
        if let Some(previous) = previous {
            self.cancel_build(&previous);
        }

        info!(build = %handle.id(), "Starting renderer build");
        self.events.publish(PipelineEvent::BuildStarted {
            build: handle.id(),
            url: request.url.clone(),
        });

        let task = BuildTask {
            handle: handle.clone(),
            request,
            fetcher: Arc::clone(&self.fetcher),
            capabilities: Arc::clone(&self.capabilities),
            chunk_sources: Arc::clone(&self.chunk_sources),
            display: self.display,
            events: self.events.clone(),
            state: Arc::clone(&self.state),
        };
        let span = info_span!("renderer_build", build = %handle.id());
        self.runtime.spawn(task.run(callback).instrument(span));

        handle
    }

    /// Cancel `handle`; idempotent, and a no-op once it has settled
    pub fn cancel_build(&self, handle: &BuildHandle) {
        if handle.cancel() {
            warn!(build = %handle.id(), "Renderer build cancelled");
            self.events
                .publish(PipelineEvent::BuildCancelled { build: handle.id() });
        }

        let mut state = self.state.lock();
        if state.current.as_ref().is_some_and(|c| c.same_build(handle)) {
            state.current = None;
        }
    }

    /// Cancel whatever build is in flight
    pub fn cancel(&self) {
        let current = self.state.lock().current.take();
        if let Some(current) = current {
            self.cancel_build(&current);
        }
    }
}

impl Drop for RendererBuilder {
    fn drop(&mut self) {
        self.cancel();
    }
}

struct BuildTask {
    handle: BuildHandle,
    request: BuildRequest,
    fetcher: Arc<dyn ManifestFetcher>,
    capabilities: Arc<dyn CapabilityQuery>,
    chunk_sources: Arc<dyn ChunkSourceFactory>,
    display: DisplayContext,
    events: EventBus,
    state: Arc<Mutex<BuilderState>>,
}

impl BuildTask {
    async fn run<C: BuildCallback>(self, callback: C) {
        if let Err(e) = self.request.validate() {
            self.fail(callback, e);
            return;
        }

        // The fetch runs as its own task so a panicking fetcher surfaces
        // as a join error instead of unwinding through this one.
        let fetcher = Arc::clone(&self.fetcher);
        let url = self.request.url.clone();
        let user_agent = self.request.user_agent.clone();
        let mut fetch = tokio::spawn(
            async move { fetcher.fetch(&url, &user_agent).await }.in_current_span(),
        );

        let fetched = tokio::select! {
            biased;
            _ = self.handle.ticket.cancel.cancelled() => {
                fetch.abort();
                debug!("Build cancelled before manifest arrived");
                return;
            }
            joined = &mut fetch => match joined {
                Ok(result) => result,
                Err(e) if e.is_panic() => Err(Error::construction(format!(
                    "manifest fetcher panicked: {}",
                    panic_message(e.into_panic().as_ref())
                ))),
                Err(e) => Err(Error::Internal(format!("manifest fetch task ended: {}", e))),
            },
        };

        // Everything below runs without suspending.
        let manifest = match fetched {
            Ok(manifest) => Arc::new(manifest),
            Err(e) => {
                self.fail(callback, e);
                return;
            }
        };

        if self.handle.is_cancelled() {
            debug!("Manifest arrived for a cancelled build");
            return;
        }

        info!(
            master = manifest.is_master(),
            variants = manifest.variants().len(),
            subtitles = manifest.subtitles().len(),
            "Manifest loaded"
        );
        self.events.publish(PipelineEvent::ManifestLoaded {
            build: self.handle.id(),
            master: manifest.is_master(),
            variants: manifest.variants().len(),
            subtitles: manifest.subtitles().len(),
        });

        // Shared state is behind parking_lot locks, which do not poison.
        let assembled = catch_unwind(AssertUnwindSafe(|| self.assemble(manifest)))
            .unwrap_or_else(|payload| {
                Err(Error::construction(format!(
                    "renderer assembly panicked: {}",
                    panic_message(payload.as_ref())
                )))
            });

        match assembled {
            Ok((renderers, bandwidth)) => self.deliver(callback, renderers, bandwidth),
            Err(e) => self.fail(callback, e),
        }
    }

    fn assemble(&self, manifest: Arc<Manifest>) -> Result<(RendererSet, Arc<BandwidthEstimator>)> {
        let selection = select_variants(&manifest, self.capabilities.as_ref(), &self.display)?;
        if let Some(selection) = &selection {
            self.events.publish(PipelineEvent::VariantsSelected {
                build: self.handle.id(),
                indices: selection.indices().to_vec(),
            });
        }

        let bandwidth = self.bandwidth_estimator();
        let timestamps = Arc::new(TimestampAdjusterProvider::new());
        let load_control = Arc::new(LoadControl::new(self.request.segment_size));
        let factory = TrackPipelineFactory::new(
            Arc::clone(&bandwidth),
            timestamps,
            load_control,
            Arc::clone(&self.chunk_sources),
        );

        let user_agent = self.request.user_agent.as_str();

        // Video, audio and metadata multiplex one segment stream.
        let video = factory.build(
            TrackType::Video,
            ChunkSourceConfig::primary(Arc::clone(&manifest), user_agent, selection),
            self.request.primary_budget(),
        )?;
        let audio = factory.attach(TrackType::Audio, &video.sample_source)?;
        let metadata = factory.attach(TrackType::Metadata, &video.sample_source)?;

        let text_mode = TextMode::for_manifest(&manifest);
        let text = text_mode.build_pipeline(
            &factory,
            &manifest,
            user_agent,
            &video.sample_source,
            self.request.text_budget(),
        )?;

        let renderers = RendererSet::from_pipelines(video, audio, metadata, text)?;
        Ok((renderers, bandwidth))
    }

    /// Reuse the builder's estimator, seeded with the current ceiling
    fn bandwidth_estimator(&self) -> Arc<BandwidthEstimator> {
        let mut state = self.state.lock();
        let ceiling = state
            .bitrate_ceiling
            .or(self.request.bitrate_ceiling)
            .unwrap_or(UNLIMITED_BITRATE);
        let events = self.events.clone();
        let bandwidth = state
            .bandwidth
            .get_or_insert_with(|| Arc::new(BandwidthEstimator::with_events(events)));
        bandwidth.set_bitrate_ceiling(ceiling);
        Arc::clone(bandwidth)
    }

    fn deliver<C: BuildCallback>(
        &self,
        callback: C,
        renderers: RendererSet,
        bandwidth: Arc<BandwidthEstimator>,
    ) {
        if !self.handle.settle(BuildPhase::Delivered) {
            debug!("Dropping renderers of a cancelled build");
            return;
        }
        self.release_slot();

        let text_mode = renderers.text_mode();
        info!(text_mode = %text_mode, "Renderers delivered");
        self.events.publish(PipelineEvent::RenderersDelivered {
            build: self.handle.id(),
            text_mode,
        });
        callback.on_renderers(renderers, bandwidth);
    }

    fn fail<C: BuildCallback>(&self, callback: C, error: Error) {
        if !self.handle.settle(BuildPhase::Failed) {
            debug!(error = %error, "Dropping error of a cancelled build");
            return;
        }
        self.release_slot();

        warn!(code = error.error_code(), error = %error, "Renderer build failed");
        self.events.publish(PipelineEvent::BuildFailed {
            build: self.handle.id(),
            code: error.error_code().to_string(),
            message: error.to_string(),
        });
        callback.on_error(error);
    }

    fn release_slot(&self) {
        let mut state = self.state.lock();
        if state
            .current
            .as_ref()
            .is_some_and(|c| c.same_build(&self.handle))
        {
            state.current = None;
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string panic payload")
}
