//! Test utilities shared across the crate.
//!
//! This module is only compiled during tests (`#[cfg(test)]`).

use std::sync::{Arc, Mutex};

use crate::core::message::{ContentRenderer, LineTone, Message, RenderedLine};
use crate::core::queue::UpdateQueue;
use crate::core::state::App;
use crate::core::streaming::StreamingSession;
use crate::inference::{
    GenerationBackend, GenerationError, GenerationParams, GenerationRequest, StreamHandle,
    StreamSignal, StreamSink,
};

/// A backend that keeps every sink it is handed so tests can drive the
/// stream by hand. Handles are the sink's position in that list.
#[derive(Default)]
pub struct ManualBackend {
    sinks: Mutex<Vec<StreamSink>>,
    requests: Mutex<Vec<GenerationRequest>>,
    cancelled: Mutex<Vec<StreamHandle>>,
    resets: Mutex<usize>,
    refuse: bool,
}

impl ManualBackend {
    /// A backend whose `start_stream` always fails.
    pub fn refusing() -> Self {
        Self {
            refuse: true,
            ..Default::default()
        }
    }

    /// Sends `signal` to the most recent stream.
    pub fn emit(&self, signal: StreamSignal) {
        let mut sinks = self.sinks.lock().unwrap();
        let sink = sinks.last_mut().expect("no stream started");
        sink(signal);
    }

    pub fn emit_to(&self, index: usize, signal: StreamSignal) {
        let mut sinks = self.sinks.lock().unwrap();
        (sinks[index])(signal);
    }

    pub fn requests(&self) -> Vec<GenerationRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn cancelled(&self) -> Vec<StreamHandle> {
        self.cancelled.lock().unwrap().clone()
    }

    pub fn resets(&self) -> usize {
        *self.resets.lock().unwrap()
    }
}

impl GenerationBackend for ManualBackend {
    fn name(&self) -> &str {
        "manual"
    }

    fn start_stream(
        &self,
        request: GenerationRequest,
        sink: StreamSink,
    ) -> Result<StreamHandle, GenerationError> {
        if self.refuse {
            return Err(GenerationError::Config("refused by test backend".into()));
        }
        self.requests.lock().unwrap().push(request);
        let mut sinks = self.sinks.lock().unwrap();
        sinks.push(sink);
        Ok(StreamHandle(sinks.len() as u64 - 1))
    }

    fn cancel(&self, handle: StreamHandle) -> bool {
        self.cancelled.lock().unwrap().push(handle);
        true
    }

    fn reset(&self) {
        *self.resets.lock().unwrap() += 1;
    }
}

/// Counts render passes; lines are the content split on newlines.
#[derive(Default)]
pub struct CountingRenderer {
    pub full: usize,
    pub refreshes: usize,
}

impl ContentRenderer for CountingRenderer {
    fn render(&mut self, message: &mut Message) {
        self.full += 1;
        message.content_lines = message
            .content
            .split('\n')
            .map(|line| RenderedLine::new(line, LineTone::Plain))
            .collect();
        message.lines = message.content_lines.clone();
    }

    fn refresh(&mut self, message: &mut Message) {
        self.refreshes += 1;
        message.lines = message.content_lines.clone();
    }
}

/// Creates a test App around a [`ManualBackend`], returning both.
pub fn test_app() -> (App, Arc<ManualBackend>) {
    let backend = Arc::new(ManualBackend::default());
    let queue = Arc::new(UpdateQueue::new());
    let session = Arc::new(StreamingSession::new(Arc::clone(&queue)));
    let params = GenerationParams {
        model: "test-model".to_string(),
        ..Default::default()
    };
    let app = App::new(backend.clone(), queue, session, params);
    (app, backend)
}
