use std::fmt;

use async_trait::async_trait;

use super::types::{GenerationRequest, StreamHandle, StreamSignal, ToolDefinition};

/// Errors that can occur while talking to a generation backend.
#[derive(Debug)]
pub enum GenerationError {
    /// Backend misconfigured (missing API key, bad URL).
    Config(String),
    /// Network-level failure (timeout, DNS, connection refused).
    Network(String),
    /// API returned an error response.
    Api { status: u16, message: String },
    /// Failed to parse the backend's response.
    Parse(String),
    /// A stream is already running and the backend serves one at a time.
    Busy,
}

impl fmt::Display for GenerationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GenerationError::Config(msg) => write!(f, "config error: {msg}"),
            GenerationError::Network(msg) => write!(f, "network error: {msg}"),
            GenerationError::Api { status, message } => {
                write!(f, "API error (HTTP {status}): {message}")
            }
            GenerationError::Parse(msg) => write!(f, "parse error: {msg}"),
            GenerationError::Busy => write!(f, "a stream is already running"),
        }
    }
}

impl std::error::Error for GenerationError {}

/// Receives the signals of one stream, on whatever thread the backend uses.
pub type StreamSink = Box<dyn FnMut(StreamSignal) + Send + 'static>;

pub trait GenerationBackend: Send + Sync {
    fn name(&self) -> &str;

    /// Starts streaming a reply to `request`. On `Ok`, the sink later sees
    /// zero or more chunks followed by exactly one `Finished`. On `Err`, the
    /// sink is dropped without being called.
    fn start_stream(
        &self,
        request: GenerationRequest,
        sink: StreamSink,
    ) -> Result<StreamHandle, GenerationError>;

    /// Best-effort. The stream still ends with a `Finished` signal.
    fn cancel(&self, handle: StreamHandle) -> bool;

    /// Forgets the conversation history.
    fn reset(&self);
}

/// Executes tool calls on behalf of a backend.
#[async_trait]
pub trait ToolHandler: Send + Sync {
    fn definitions(&self) -> Vec<ToolDefinition>;

    /// Runs the named tool and returns its output (JSON text, errors included).
    async fn invoke(&self, name: &str, arguments: &str) -> String;
}
