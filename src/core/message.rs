//! # Transcript Data Model
//!
//! The ordered transcript and everything a single entry carries.
//!
//! ```text
//! MessageStore
//! ├── generation: u32              // bumped on clear(), invalidates old ids
//! └── messages: Vec<Message>
//!     ├── kind / content / timestamp
//!     ├── tool_executions          // append-only while streaming
//!     ├── content_lines            // cached output of the content pass
//!     ├── lines                    // tool summaries + content + decoration
//!     └── dirty / needs_style_pass // render bookkeeping
//! ```
//!
//! Messages are created and mutated on the UI thread only. Background work
//! reaches them through the update queue (see `core::queue`), never directly.

use chrono::{DateTime, Local};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageKind {
    User,
    Assistant,
    System,
    ToolCall { tool_name: String },
    ToolResponse { tool_name: String },
}

impl MessageKind {
    pub fn label(&self) -> &'static str {
        match self {
            MessageKind::User => "YOU",
            MessageKind::Assistant => "ASSISTANT",
            MessageKind::System => "SYSTEM",
            MessageKind::ToolCall { .. } => "TOOL",
            MessageKind::ToolResponse { .. } => "RESPONSE",
        }
    }

    pub fn icon(&self) -> &'static str {
        match self {
            MessageKind::User => "▶",
            MessageKind::Assistant => "◆",
            MessageKind::System => "●",
            MessageKind::ToolCall { .. } => "⚡",
            MessageKind::ToolResponse { .. } => "⚙",
        }
    }

    pub fn tool_name(&self) -> Option<&str> {
        match self {
            MessageKind::ToolCall { tool_name } | MessageKind::ToolResponse { tool_name } => {
                Some(tool_name)
            }
            _ => None,
        }
    }
}

/// One tool invocation made during a streaming turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolExecution {
    pub tool_name: String,
    /// Raw argument text as the model produced it.
    pub parameters: String,
    /// `None` until the tool completes.
    pub response: Option<String>,
}

impl ToolExecution {
    pub fn started(tool_name: impl Into<String>, parameters: impl Into<String>) -> Self {
        Self {
            tool_name: tool_name.into(),
            parameters: parameters.into(),
            response: None,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.response.is_some()
    }
}

/// Base colour role of a rendered line. The TUI maps each tone to a style;
/// escapes embedded in the text are layered on top of it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineTone {
    /// Markdown output, styled by its own escapes.
    Body,
    /// Fallback text shown when markdown conversion failed.
    Plain,
    ToolPending,
    ToolDone,
    Spinner,
    Cursor,
    JsonHeader,
    JsonKey,
    JsonValue,
    JsonPunct,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedLine {
    pub text: String,
    pub tone: LineTone,
}

impl RenderedLine {
    pub fn new(text: impl Into<String>, tone: LineTone) -> Self {
        Self {
            text: text.into(),
            tone,
        }
    }
}

/// Generation-checked handle to a message in a [`MessageStore`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MessageId {
    index: u32,
    generation: u32,
}

impl MessageId {
    pub fn index(&self) -> usize {
        self.index as usize
    }
}

#[derive(Debug, Clone)]
pub struct Message {
    pub kind: MessageKind,
    /// Replaced wholesale by updates, never patched in place.
    pub content: String,
    pub timestamp: DateTime<Local>,
    pub is_streaming: bool,
    pub tool_executions: Vec<ToolExecution>,
    /// Lines derived from `content` by the last full render pass.
    pub content_lines: Vec<RenderedLine>,
    /// Everything the view draws for this message, in order.
    pub lines: Vec<RenderedLine>,
    /// Decoration or tool summaries changed; `content_lines` are still valid.
    pub dirty: bool,
    /// Content changed; the full pass must run before the next draw.
    pub needs_style_pass: bool,
    version: u64,
}

impl Message {
    pub fn new(kind: MessageKind, content: impl Into<String>) -> Self {
        Self {
            kind,
            content: content.into(),
            timestamp: Local::now(),
            is_streaming: false,
            tool_executions: Vec::new(),
            content_lines: Vec::new(),
            lines: Vec::new(),
            dirty: false,
            needs_style_pass: true,
            version: 0,
        }
    }

    /// Bumped on every mutable access. Layout caches compare against it.
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn needs_render(&self) -> bool {
        self.dirty || self.needs_style_pass
    }
}

/// Turns message state into display lines.
///
/// `render` is the full pass (content conversion plus assembly). `refresh`
/// reassembles tool summaries and decoration around the cached
/// `content_lines` and is cheap enough to run on every animation tick.
pub trait ContentRenderer {
    fn render(&mut self, message: &mut Message);
    fn refresh(&mut self, message: &mut Message);
}

#[derive(Debug, Default)]
pub struct MessageStore {
    messages: Vec<Message>,
    generation: u32,
}

impl MessageStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(&mut self, kind: MessageKind, content: impl Into<String>) -> MessageId {
        let index = self.messages.len() as u32;
        self.messages.push(Message::new(kind, content));
        MessageId {
            index,
            generation: self.generation,
        }
    }

    pub fn get(&self, id: MessageId) -> Option<&Message> {
        if id.generation != self.generation {
            return None;
        }
        self.messages.get(id.index())
    }

    pub fn get_mut(&mut self, id: MessageId) -> Option<&mut Message> {
        if id.generation != self.generation {
            return None;
        }
        let message = self.messages.get_mut(id.index())?;
        message.version = message.version.wrapping_add(1);
        Some(message)
    }

    pub fn last_id(&self) -> Option<MessageId> {
        let index = self.messages.len().checked_sub(1)?;
        Some(MessageId {
            index: index as u32,
            generation: self.generation,
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = &Message> {
        self.messages.iter()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn generation(&self) -> u32 {
        self.generation
    }

    /// Drops every message. Ids minted before the call stop resolving.
    pub fn clear(&mut self) {
        self.messages.clear();
        self.generation = self.generation.wrapping_add(1);
    }

    /// Marks every streaming message dirty so its decoration is rebuilt.
    pub fn mark_streaming_dirty(&mut self) {
        for message in self.messages.iter_mut().filter(|m| m.is_streaming) {
            message.dirty = true;
            message.version = message.version.wrapping_add(1);
        }
    }

    /// Runs the render passes that are due and returns how many messages
    /// were touched.
    pub fn render_pending<R: ContentRenderer + ?Sized>(&mut self, renderer: &mut R) -> usize {
        let mut rendered = 0;
        for message in self.messages.iter_mut().filter(|m| m.needs_render()) {
            if message.needs_style_pass {
                renderer.render(message);
            } else {
                renderer.refresh(message);
            }
            message.needs_style_pass = false;
            message.dirty = false;
            message.version = message.version.wrapping_add(1);
            rendered += 1;
        }
        rendered
    }
}
