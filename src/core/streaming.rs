//! # Streaming Session
//!
//! Tracks the single in-flight generation request.
//!
//! ```text
//!            start()                first chunk
//!   Idle ───────────────▶ Active{waiting} ──────────▶ Active{receiving}
//!    ▲                         │                             │
//!    │      on_terminal()      │  cancel() sets cancelling   │
//!    └─────────────────────────┴─────────────────────────────┘
//! ```
//!
//! Backend threads feed chunks in through the sink handed out by `start`.
//! Every chunk re-sends the whole accumulated text to the update queue, so
//! the message on screen is always a complete snapshot. Each `start` bumps
//! an epoch; signals carrying an older epoch are ignored.

use log::{debug, info, warn};
use std::fmt;
use std::mem;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::message::{MessageId, MessageKind, MessageStore, ToolExecution};
use super::queue::{PendingUpdate, UpdateQueue};
use crate::inference::{
    GenerationBackend, GenerationError, GenerationRequest, StreamHandle, StreamSignal,
    StreamSink, StreamStatus,
};

pub const START_FAILURE_TEXT: &str = "● Error: Failed to start generation";

#[derive(Debug)]
pub enum SessionError {
    /// A stream is already active.
    Busy,
    /// The backend refused to start a stream.
    Backend(GenerationError),
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionError::Busy => write!(f, "a response is already being generated"),
            SessionError::Backend(e) => write!(f, "failed to start generation: {e}"),
        }
    }
}

impl std::error::Error for SessionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SessionError::Backend(e) => Some(e),
            SessionError::Busy => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StreamPhase {
    #[default]
    Idle,
    Active {
        /// No chunk has arrived yet.
        waiting: bool,
        cancelling: bool,
        handle: Option<StreamHandle>,
    },
}

#[derive(Debug, Default)]
struct StreamingState {
    phase: StreamPhase,
    epoch: u64,
    target: Option<MessageId>,
    accumulated: String,
    tool_executions: Vec<ToolExecution>,
}

impl StreamingState {
    fn is_current(&self, epoch: u64) -> bool {
        self.epoch == epoch && matches!(self.phase, StreamPhase::Active { .. })
    }
}

/// A tool execution recorded during one stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ToolSlot {
    epoch: u64,
    index: usize,
}

#[derive(Debug)]
pub struct StreamingSession {
    state: Mutex<StreamingState>,
    queue: Arc<UpdateQueue>,
}

impl StreamingSession {
    pub fn new(queue: Arc<UpdateQueue>) -> Self {
        Self {
            state: Mutex::new(StreamingState::default()),
            queue,
        }
    }

    fn lock(&self) -> MutexGuard<'_, StreamingState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn phase(&self) -> StreamPhase {
        self.lock().phase
    }

    pub fn is_active(&self) -> bool {
        matches!(self.phase(), StreamPhase::Active { .. })
    }

    pub fn is_waiting(&self) -> bool {
        matches!(self.phase(), StreamPhase::Active { waiting: true, .. })
    }

    pub fn target(&self) -> Option<MessageId> {
        self.lock().target
    }

    /// Creates the assistant placeholder and asks `backend` for a stream.
    pub fn start(
        self: &Arc<Self>,
        store: &mut MessageStore,
        backend: &dyn GenerationBackend,
        request: GenerationRequest,
    ) -> Result<MessageId, SessionError> {
        let (epoch, target) = {
            let mut state = self.lock();
            if state.phase != StreamPhase::Idle {
                return Err(SessionError::Busy);
            }
            state.accumulated.clear();
            state.tool_executions.clear();
            state.epoch += 1;

            let target = store.create(MessageKind::Assistant, "");
            if let Some(message) = store.get_mut(target) {
                message.is_streaming = true;
            }
            state.target = Some(target);
            state.phase = StreamPhase::Active {
                waiting: true,
                cancelling: false,
                handle: None,
            };
            (state.epoch, target)
        };

        // The lock is released here: a backend may deliver signals before
        // start_stream returns.
        let session = Arc::clone(self);
        let sink: StreamSink = Box::new(move |signal| session.deliver(epoch, signal));

        match backend.start_stream(request, sink) {
            Ok(handle) => {
                let mut state = self.lock();
                if state.epoch == epoch
                    && let StreamPhase::Active { handle: slot, .. } = &mut state.phase
                {
                    *slot = Some(handle);
                }
                info!("Stream {:?} started on {}", handle, backend.name());
                Ok(target)
            }
            Err(e) => {
                warn!("Backend {} failed to start a stream: {}", backend.name(), e);
                {
                    let mut state = self.lock();
                    if state.epoch == epoch {
                        state.phase = StreamPhase::Idle;
                        state.target = None;
                    }
                }
                if let Some(message) = store.get_mut(target) {
                    message.content = START_FAILURE_TEXT.to_string();
                    message.is_streaming = false;
                    message.needs_style_pass = true;
                }
                Err(SessionError::Backend(e))
            }
        }
    }

    fn deliver(&self, epoch: u64, signal: StreamSignal) {
        match signal {
            StreamSignal::Chunk(text) => self.chunk_for(epoch, &text),
            StreamSignal::Finished(status) => self.terminal_for(epoch, status),
        }
    }

    /// Feeds a chunk into the current stream.
    pub fn on_chunk(&self, text: &str) {
        let epoch = self.lock().epoch;
        self.chunk_for(epoch, text);
    }

    /// Ends the current stream.
    pub fn on_terminal(&self, status: StreamStatus) {
        let epoch = self.lock().epoch;
        self.terminal_for(epoch, status);
    }

    fn chunk_for(&self, epoch: u64, text: &str) {
        let mut state = self.lock();
        if !state.is_current(epoch) {
            debug!("Ignoring chunk for inactive stream (epoch {epoch})");
            return;
        }
        if let StreamPhase::Active { waiting, .. } = &mut state.phase {
            *waiting = false;
        }
        if let Err(e) = state.accumulated.try_reserve(text.len()) {
            warn!("Dropping {}-byte chunk: {}", text.len(), e);
            return;
        }
        state.accumulated.push_str(text);

        // Enqueued under the state lock so queue order matches accumulation order
        if let Some(target) = state.target {
            self.queue
                .enqueue(PendingUpdate::content(target, state.accumulated.clone(), true));
        }
    }

    fn terminal_for(&self, epoch: u64, status: StreamStatus) {
        let mut state = self.lock();
        if !state.is_current(epoch) {
            debug!("Ignoring terminal signal for inactive stream (epoch {epoch})");
            return;
        }

        let mut text = mem::take(&mut state.accumulated);
        if let StreamStatus::Failed(reason) = &status {
            if !text.is_empty() {
                text.push_str("\n\n");
            }
            text.push_str(&format!("● Error: {reason}"));
        }

        if let Some(target) = state.target.take() {
            self.queue.enqueue(PendingUpdate::content(target, text, false));
        }
        state.tool_executions.clear();
        state.phase = StreamPhase::Idle;
        info!("Stream finished: {:?}", status);
    }

    /// Asks the backend to stop the current stream. Returns the backend's
    /// acknowledgment; the terminal signal still arrives on its own.
    pub fn cancel(&self, backend: &dyn GenerationBackend) -> bool {
        let handle = {
            let mut state = self.lock();
            match &mut state.phase {
                StreamPhase::Active {
                    cancelling, handle, ..
                } => {
                    *cancelling = true;
                    *handle
                }
                StreamPhase::Idle => return false,
            }
        };
        match handle {
            Some(handle) => {
                let acknowledged = backend.cancel(handle);
                info!("Cancel requested for {:?} (acknowledged: {})", handle, acknowledged);
                acknowledged
            }
            None => false,
        }
    }

    /// Detaches the stream from its message after the transcript was cleared.
    /// The stream itself keeps running until its terminal signal.
    pub fn invalidate_target(&self) {
        self.lock().target = None;
    }

    /// Records a tool call that just started. Returns its slot, or `None`
    /// when no stream is active.
    pub fn record_tool_started(&self, tool_name: &str, parameters: &str) -> Option<ToolSlot> {
        let mut state = self.lock();
        if !matches!(state.phase, StreamPhase::Active { .. }) {
            return None;
        }
        state
            .tool_executions
            .push(ToolExecution::started(tool_name, parameters));
        let slot = ToolSlot {
            epoch: state.epoch,
            index: state.tool_executions.len() - 1,
        };
        if let Some(target) = state.target {
            self.queue
                .enqueue(PendingUpdate::tools(target, &state.tool_executions));
        }
        Some(slot)
    }

    /// Fills in the response for `slot`. Ignored once the stream that
    /// recorded it has ended.
    pub fn record_tool_finished(&self, slot: ToolSlot, response: &str) {
        let mut state = self.lock();
        if !state.is_current(slot.epoch) {
            debug!("Ignoring tool result for inactive stream (epoch {})", slot.epoch);
            return;
        }
        let Some(execution) = state.tool_executions.get_mut(slot.index) else {
            debug!("Tool slot {} no longer exists", slot.index);
            return;
        };
        execution.response = Some(response.to_string());
        if let Some(target) = state.target {
            self.queue
                .enqueue(PendingUpdate::tools(target, &state.tool_executions));
        }
    }
}
