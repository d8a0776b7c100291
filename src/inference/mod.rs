pub mod provider;
pub mod providers;
pub mod types;

pub use provider::{GenerationBackend, GenerationError, StreamSink, ToolHandler};
pub use providers::{ResponsesBackend, ScriptedBackend};
pub use types::{
    Context, ContextItem, ContextSegment, GenerationParams, GenerationRequest, Source,
    StreamHandle, StreamSignal, StreamStatus, ToolCall, ToolDefinition, ToolResult,
};
