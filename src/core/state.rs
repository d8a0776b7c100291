//! # Application State
//!
//! Core business state for rill. This module contains domain logic only -
//! no TUI-specific types. Presentation state lives in the `tui` module.
//!
//! ```text
//! App
//! ├── store: MessageStore               // the transcript (UI thread only)
//! ├── queue: Arc<UpdateQueue>           // producer → UI thread mutations
//! ├── session: Arc<StreamingSession>    // the in-flight request, if any
//! ├── backend: Arc<dyn GenerationBackend>
//! ├── params / defaults: GenerationParams
//! ├── status_message: String            // sidebar status line
//! ├── show_sidebar: bool
//! └── frame_rate: f32                   // smoothed FPS, reported by the TUI
//! ```
//!
//! State changes go through `update(app, action)` in action.rs.

use log::info;
use std::sync::Arc;

use super::message::{MessageId, MessageKind, MessageStore};
use super::queue::UpdateQueue;
use super::streaming::{SessionError, StreamingSession};
use crate::inference::{GenerationBackend, GenerationParams, GenerationRequest};

pub const CANCELLED_NOTICE: &str = "Generation cancelled by user";

pub struct App {
    pub store: MessageStore,
    pub queue: Arc<UpdateQueue>,
    pub session: Arc<StreamingSession>,
    pub backend: Arc<dyn GenerationBackend>,
    pub params: GenerationParams,
    /// What `/new` restores.
    pub defaults: GenerationParams,
    pub tool_count: usize,
    pub status_message: String,
    pub show_sidebar: bool,
    pub frame_rate: f32,
}

impl App {
    pub fn new(
        backend: Arc<dyn GenerationBackend>,
        queue: Arc<UpdateQueue>,
        session: Arc<StreamingSession>,
        params: GenerationParams,
    ) -> Self {
        Self {
            store: MessageStore::new(),
            queue,
            session,
            backend,
            defaults: params.clone(),
            params,
            tool_count: 0,
            status_message: String::from("Ready"),
            show_sidebar: true,
            frame_rate: 0.0,
        }
    }

    pub fn add_message(&mut self, kind: MessageKind, content: impl Into<String>) -> MessageId {
        self.store.create(kind, content)
    }

    pub fn add_system(&mut self, content: impl Into<String>) -> MessageId {
        self.store.create(MessageKind::System, content)
    }

    pub fn is_streaming(&self) -> bool {
        self.session.is_active()
    }

    /// Starts a stream for `prompt` with the current parameters, plus an
    /// optional structured-output schema for this turn only.
    pub fn start_generation(
        &mut self,
        prompt: String,
        schema: Option<serde_json::Value>,
    ) -> Result<MessageId, SessionError> {
        let mut params = self.params.clone();
        params.schema = schema;
        let request = GenerationRequest { prompt, params };
        let result = self
            .session
            .start(&mut self.store, self.backend.as_ref(), request);
        self.status_message = match &result {
            Ok(_) => String::from("Generating"),
            Err(_) => String::from("Error"),
        };
        result
    }

    /// Requests cancellation and notes it in the transcript.
    pub fn cancel_generation(&mut self) -> bool {
        if !self.session.is_active() {
            return false;
        }
        let acknowledged = self.session.cancel(self.backend.as_ref());
        self.add_system(CANCELLED_NOTICE);
        self.status_message = String::from("Cancelled");
        acknowledged
    }

    /// Drops the transcript and the backend's history. A running stream is
    /// cancelled and detached from its (now gone) message.
    pub fn clear_transcript(&mut self) {
        if self.session.is_active() {
            self.session.cancel(self.backend.as_ref());
        }
        self.session.invalidate_target();
        self.store.clear();
        self.backend.reset();
        info!("Transcript cleared");
    }

    /// Called once per frame after the queue is drained.
    pub fn sync_status(&mut self) {
        if !self.session.is_active() && self.status_message == "Generating" {
            self.status_message = String::from("Ready");
        }
    }
}
