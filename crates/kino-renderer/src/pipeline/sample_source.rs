//! Buffered sample sources
//!
//! A sample source queues samples loaded by its chunk source ahead of the
//! renderers reading them. Several renderers may share one source through
//! an `Arc`; its buffer reservation is released when the last one drops.

use super::{
    chunk_source::ChunkSource,
    load_control::{LoadControl, LoaderId},
};
use crate::types::TrackType;
use std::sync::Arc;

/// Buffered sample source over one chunk source
#[derive(Debug)]
pub struct SampleSource {
    /// Track type reported in load events
    event_source: TrackType,
    chunk_source: ChunkSource,
    load_control: Arc<LoadControl>,
    buffer_budget: usize,
    loader: LoaderId,
}

impl SampleSource {
    /// Wrap `chunk_source`, reserving `buffer_budget` bytes
    pub fn new(
        chunk_source: ChunkSource,
        load_control: Arc<LoadControl>,
        buffer_budget: usize,
        event_source: TrackType,
    ) -> Self {
        let loader = load_control.register(buffer_budget);
        Self {
            event_source,
            chunk_source,
            load_control,
            buffer_budget,
            loader,
        }
    }

    pub fn chunk_source(&self) -> &ChunkSource {
        &self.chunk_source
    }

    pub fn load_control(&self) -> &Arc<LoadControl> {
        &self.load_control
    }

    /// Bytes this source may buffer
    pub fn buffer_budget(&self) -> usize {
        self.buffer_budget
    }

    pub fn event_source(&self) -> TrackType {
        self.event_source
    }
}

impl Drop for SampleSource {
    fn drop(&mut self) {
        self.load_control.unregister(self.loader);
    }
}
