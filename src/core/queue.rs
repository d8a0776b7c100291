//! # Update Queue
//!
//! Carries mutations from producer threads (the generation task, tool calls)
//! to the message store, which only the UI thread touches.
//!
//! Producers `enqueue` under a short mutex. The UI thread calls `drain` once
//! per frame: the pending list is swapped out with `mem::take`, the lock is
//! released, and updates are applied without holding it, so a slow render
//! pass never stalls a producer.

use log::{debug, warn};
use std::mem;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use super::message::{ContentRenderer, MessageId, MessageStore, ToolExecution};

/// A queued mutation. Owns copies of everything it carries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingUpdate {
    pub target: MessageId,
    pub content: Option<String>,
    pub streaming: bool,
    pub tool_executions: Option<Vec<ToolExecution>>,
    pub needs_style_pass: bool,
}

impl PendingUpdate {
    /// Replaces the target's content and schedules the full render pass.
    pub fn content(target: MessageId, content: impl Into<String>, streaming: bool) -> Self {
        Self {
            target,
            content: Some(content.into()),
            streaming,
            tool_executions: None,
            needs_style_pass: true,
        }
    }

    /// Replaces the target's tool list, leaving its content alone.
    pub fn tools(target: MessageId, executions: &[ToolExecution]) -> Self {
        Self {
            target,
            content: None,
            streaming: true,
            tool_executions: Some(executions.to_vec()),
            needs_style_pass: false,
        }
    }
}

#[derive(Debug, Default)]
pub struct UpdateQueue {
    pending: Mutex<Vec<PendingUpdate>>,
    ready: Condvar,
}

impl UpdateQueue {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<PendingUpdate>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn enqueue(&self, update: PendingUpdate) {
        self.lock().push(update);
        self.ready.notify_one();
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Detaches everything queued so far, in FIFO order.
    pub fn take_pending(&self) -> Vec<PendingUpdate> {
        mem::take(&mut *self.lock())
    }

    /// Applies every pending update to `store`. Returns the number applied;
    /// updates whose target no longer resolves are dropped and not counted.
    pub fn drain<R: ContentRenderer + ?Sized>(
        &self,
        store: &mut MessageStore,
        renderer: &mut R,
    ) -> usize {
        let batch = self.take_pending();
        if batch.is_empty() {
            return 0;
        }
        debug!("Draining {} pending update(s)", batch.len());
        let mut applied = 0;
        for update in batch {
            if apply(update, store, renderer) {
                applied += 1;
            }
        }
        applied
    }

    /// Sleeps until something is enqueued or `timeout` passes. Returns true
    /// if updates are waiting. Wakeups are advisory; callers drain either way.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let guard = self.lock();
        if !guard.is_empty() {
            return true;
        }
        let (guard, _) = self
            .ready
            .wait_timeout(guard, timeout)
            .unwrap_or_else(PoisonError::into_inner);
        !guard.is_empty()
    }
}

fn apply<R: ContentRenderer + ?Sized>(
    update: PendingUpdate,
    store: &mut MessageStore,
    renderer: &mut R,
) -> bool {
    let Some(message) = store.get_mut(update.target) else {
        warn!(
            "Dropping update for stale message #{}",
            update.target.index()
        );
        return false;
    };

    if let Some(content) = update.content {
        message.content = content;
    }
    if let Some(executions) = update.tool_executions {
        message.tool_executions = executions;
    }
    message.is_streaming = update.streaming;

    if update.needs_style_pass {
        renderer.render(message);
        message.needs_style_pass = false;
        message.dirty = false;
    } else {
        message.dirty = true;
    }
    true
}
