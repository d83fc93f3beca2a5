//! Build and bandwidth event emission
//!
//! Every component publishes onto a cloned [`EventBus`]; subscribers see
//! the events of all builds run by one [`crate::RendererBuilder`].

use crate::{types::BuildId, TextMode};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use url::Url;

/// Default event channel capacity
pub const DEFAULT_EVENT_CAPACITY: usize = 64;

/// Pipeline event types
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum PipelineEvent {
    /// A build was scheduled
    BuildStarted {
        build: BuildId,
        url: Url,
    },

    /// The manifest arrived and the build was still current
    ManifestLoaded {
        build: BuildId,
        master: bool,
        variants: usize,
        subtitles: usize,
    },

    /// Device-aware variant selection finished
    VariantsSelected {
        build: BuildId,
        indices: Vec<usize>,
    },

    /// The renderer set was handed to the caller
    RenderersDelivered {
        build: BuildId,
        text_mode: TextMode,
    },

    /// The build failed and the error callback fired
    BuildFailed {
        build: BuildId,
        code: String,
        message: String,
    },

    /// The build was dropped without a callback
    BuildCancelled {
        build: BuildId,
    },

    /// A transfer finished and the estimate was updated
    BandwidthSample {
        elapsed_ms: u64,
        bytes: u64,
        bitrate_estimate: Option<u64>,
    },

    /// The caller changed the bitrate ceiling
    BitrateCeilingChanged {
        ceiling: u64,
    },
}

/// Broadcast bus for [`PipelineEvent`]s.
///
/// Publishing is a sync call and silently drops events when nobody listens.
#[derive(Clone, Debug)]
pub struct EventBus {
    tx: broadcast::Sender<PipelineEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn publish(&self, event: PipelineEvent) {
        let _ = self.tx.send(event);
    }

    /// Subscribe to all future events
    pub fn subscribe(&self) -> broadcast::Receiver<PipelineEvent> {
        self.tx.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_CAPACITY)
    }
}
