//! Offline backend that streams canned replies word by word.
//!
//! Used by `--provider offline` and by the pipeline tests. Each stream runs
//! on its own OS thread, which exercises the same cross-thread path as the
//! network backends without needing a server.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::Duration;

use log::debug;

use crate::inference::{
    GenerationBackend, GenerationError, GenerationRequest, StreamHandle, StreamSignal, StreamSink,
    StreamStatus,
};

const DEFAULT_CHUNK_DELAY: Duration = Duration::from_millis(30);

/// One queued reply: either chunks streamed verbatim, or a failure.
#[derive(Debug, Clone)]
enum Script {
    Chunks(Vec<String>),
    Fail(String),
}

#[derive(Default)]
pub struct ScriptedBackend {
    scripts: Mutex<VecDeque<Script>>,
    delay: Option<Duration>,
    next_handle: AtomicU64,
    active: Arc<Mutex<HashMap<u64, Arc<AtomicBool>>>>,
    resets: AtomicU64,
}

impl ScriptedBackend {
    /// Echoes each prompt back ("You said: ...").
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a reply streamed as exactly these chunks.
    pub fn with_reply<S: Into<String>>(self, chunks: impl IntoIterator<Item = S>) -> Self {
        self.lock_scripts()
            .push_back(Script::Chunks(chunks.into_iter().map(Into::into).collect()));
        self
    }

    /// Queues a reply that ends in `Failed(reason)` without any chunks.
    pub fn with_failure(self, reason: impl Into<String>) -> Self {
        self.lock_scripts().push_back(Script::Fail(reason.into()));
        self
    }

    /// Pause between chunks. Defaults to 30ms.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn resets(&self) -> u64 {
        self.resets.load(Ordering::Relaxed)
    }

    fn lock_scripts(&self) -> MutexGuard<'_, VecDeque<Script>> {
        self.scripts.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn next_script(&self, prompt: &str) -> Script {
        self.lock_scripts().pop_front().unwrap_or_else(|| {
            let reply = format!("You said: {prompt}");
            Script::Chunks(reply.split_inclusive(' ').map(str::to_string).collect())
        })
    }
}

impl GenerationBackend for ScriptedBackend {
    fn name(&self) -> &str {
        "offline"
    }

    fn start_stream(
        &self,
        request: GenerationRequest,
        mut sink: StreamSink,
    ) -> Result<StreamHandle, GenerationError> {
        let script = self.next_script(&request.prompt);
        let delay = self.delay.unwrap_or(DEFAULT_CHUNK_DELAY);
        let id = self.next_handle.fetch_add(1, Ordering::Relaxed);
        let cancelled = Arc::new(AtomicBool::new(false));

        self.active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, Arc::clone(&cancelled));
        let active = Arc::clone(&self.active);

        let spawned = thread::Builder::new()
            .name(format!("scripted-{id}"))
            .spawn(move || {
                let status = match script {
                    Script::Fail(reason) => StreamStatus::Failed(reason),
                    Script::Chunks(chunks) => {
                        let mut status = StreamStatus::Completed;
                        for chunk in chunks {
                            if cancelled.load(Ordering::Acquire) {
                                status = StreamStatus::Cancelled;
                                break;
                            }
                            sink(StreamSignal::Chunk(chunk));
                            thread::sleep(delay);
                        }
                        if cancelled.load(Ordering::Acquire) {
                            status = StreamStatus::Cancelled;
                        }
                        status
                    }
                };
                active
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .remove(&id);
                debug!("Scripted stream {} finished: {:?}", id, status);
                sink(StreamSignal::Finished(status));
            });

        match spawned {
            Ok(_) => Ok(StreamHandle(id)),
            Err(e) => {
                self.active
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .remove(&id);
                Err(GenerationError::Config(format!(
                    "could not spawn stream thread: {e}"
                )))
            }
        }
    }

    fn cancel(&self, handle: StreamHandle) -> bool {
        match self
            .active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&handle.0)
        {
            Some(flag) => {
                flag.store(true, Ordering::Release);
                true
            }
            None => false,
        }
    }

    fn reset(&self) {
        self.resets.fetch_add(1, Ordering::Relaxed);
    }
}
