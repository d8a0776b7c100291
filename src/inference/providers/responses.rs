//! Streaming backend for the OpenAI-compatible Responses API (OpenRouter,
//! LM Studio).
//!
//! This module uses Responses API terminology:
//! - "input" (array of messages, function calls and their outputs)
//! - "role" (not "source")
//! - SSE events: response.output_text.delta, response.output_item.added,
//!   response.function_call_arguments.done, response.completed
//!
//! Each stream runs as a tokio task on the runtime handle the backend was
//! built with. The task owns the sink; when the model asks for tools it
//! runs them through the [`ToolHandler`] and sends a follow-up request, up
//! to [`MAX_TOOL_ROUNDS`] times. Cancellation races a oneshot against the
//! whole turn, so the task always ends by sending exactly one `Finished`.

use std::collections::HashMap;
use std::mem;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures::StreamExt;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use tokio::runtime::Handle;
use tokio::sync::oneshot;

use crate::inference::{
    Context, ContextItem, GenerationBackend, GenerationError, GenerationParams,
    GenerationRequest, Source, StreamHandle, StreamSignal, StreamSink, StreamStatus, ToolCall,
    ToolDefinition, ToolHandler, ToolResult,
};

/// Follow-up requests allowed per turn while the model keeps calling tools.
pub const MAX_TOOL_ROUNDS: usize = 8;

// ============================================================================
// Responses API Types
// ============================================================================

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "lowercase")]
enum Role {
    System,
    User,
    Assistant,
}

/// Polymorphic input item for the Responses API input array.
/// Messages, function calls, and function call outputs are peers at the same level.
#[derive(Serialize, Debug, Clone)]
#[serde(tag = "type")]
enum InputItem {
    #[serde(rename = "message")]
    Message { role: Role, content: String },
    #[serde(rename = "function_call")]
    FunctionCall {
        id: String,
        call_id: String,
        name: String,
        arguments: String,
    },
    #[serde(rename = "function_call_output")]
    FunctionCallOutput {
        id: String,
        call_id: String,
        output: String,
    },
}

#[derive(Serialize, Debug)]
struct ApiToolDefinition {
    #[serde(rename = "type")]
    tool_type: &'static str, // always "function"
    name: String,
    description: String,
    parameters: serde_json::Value,
}

/// Structured-output settings (`text.format`).
#[derive(Serialize, Debug)]
struct TextConfig {
    format: TextFormat,
}

#[derive(Serialize, Debug)]
struct TextFormat {
    #[serde(rename = "type")]
    format_type: &'static str, // always "json_schema"
    name: &'static str,
    schema: serde_json::Value,
}

#[derive(Serialize, Debug)]
struct ResponsesRequest {
    model: String,
    input: Vec<InputItem>,
    stream: bool,
    temperature: f32,
    max_output_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<ApiToolDefinition>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<TextConfig>,
}

#[derive(Deserialize, Debug)]
struct TypeOnly {
    #[serde(rename = "type")]
    event_type: String,
}

#[derive(Deserialize, Debug)]
struct TextDeltaEvent {
    #[serde(default)]
    delta: String,
}

#[derive(Deserialize, Debug)]
struct OutputItemAddedEvent {
    item: OutputItemData,
}

#[derive(Deserialize, Debug)]
struct OutputItemData {
    #[serde(rename = "type")]
    item_type: String,
    #[serde(default)]
    id: String,
    #[serde(default)]
    call_id: String,
}

/// The `item_id` correlates back to the `output_item.added` event's `item.id`.
#[derive(Deserialize, Debug)]
struct FunctionCallArgsDoneEvent {
    item_id: String,
    #[serde(default)]
    name: String,
    arguments: String,
}

// ============================================================================
// SSE Decoding
// ============================================================================

/// The stream events this backend acts on.
#[derive(Debug, Clone, PartialEq)]
enum ResponseEvent {
    TextDelta(String),
    ToolCallStarted { item_id: String, call_id: String },
    ToolCallReady {
        item_id: String,
        name: String,
        arguments: String,
    },
    Completed,
    Failed(String),
}

/// Splits a byte stream into SSE lines and decodes the events we care about.
/// Bytes are buffered until a full line arrives, so a multi-byte character
/// split across network chunks is decoded intact.
#[derive(Default)]
struct SseDecoder {
    buffer: Vec<u8>,
    event_type: Option<String>,
}

impl SseDecoder {
    fn push(&mut self, bytes: &[u8]) -> Vec<ResponseEvent> {
        self.buffer.extend_from_slice(bytes);
        let mut events = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            if let Some(event) = self.line(&String::from_utf8_lossy(&line)) {
                events.push(event);
            }
        }
        events
    }

    /// Flushes a trailing line that had no newline.
    fn finish(&mut self) -> Option<ResponseEvent> {
        let rest = mem::take(&mut self.buffer);
        self.line(&String::from_utf8_lossy(&rest))
    }

    fn line(&mut self, raw: &str) -> Option<ResponseEvent> {
        let line = raw.trim();
        if line.is_empty() {
            self.event_type = None;
            return None;
        }
        if let Some(event_type) = line.strip_prefix("event:") {
            self.event_type = Some(event_type.trim().to_string());
            return None;
        }
        let data = line.strip_prefix("data:")?.trim_start();
        if data == "[DONE]" {
            return None;
        }

        // OpenRouter embeds the type in the JSON; LM Studio also sends event: lines
        let event_type = self.event_type.take().or_else(|| {
            serde_json::from_str::<TypeOnly>(data)
                .ok()
                .map(|e| e.event_type)
        })?;
        parse_event(&event_type, data)
    }
}

fn parse_event(event_type: &str, data: &str) -> Option<ResponseEvent> {
    match event_type {
        "response.output_text.delta" => serde_json::from_str::<TextDeltaEvent>(data)
            .ok()
            .filter(|e| !e.delta.is_empty())
            .map(|e| ResponseEvent::TextDelta(e.delta)),
        "response.output_item.added" => serde_json::from_str::<OutputItemAddedEvent>(data)
            .ok()
            .filter(|e| e.item.item_type == "function_call")
            .map(|e| ResponseEvent::ToolCallStarted {
                item_id: e.item.id,
                call_id: e.item.call_id,
            }),
        "response.function_call_arguments.done" => {
            serde_json::from_str::<FunctionCallArgsDoneEvent>(data)
                .ok()
                .map(|e| ResponseEvent::ToolCallReady {
                    item_id: e.item_id,
                    name: e.name,
                    arguments: e.arguments,
                })
        }
        "response.completed" => Some(ResponseEvent::Completed),
        "response.failed" | "error" => Some(ResponseEvent::Failed(error_message(data))),
        other => {
            debug!("Ignoring event type '{}': {} bytes", other, data.len());
            None
        }
    }
}

fn error_message(data: &str) -> String {
    let Ok(value) = serde_json::from_str::<serde_json::Value>(data) else {
        return data.to_string();
    };
    ["/response/error/message", "/error/message", "/message"]
        .iter()
        .find_map(|pointer| value.pointer(pointer).and_then(|v| v.as_str()))
        .map(str::to_string)
        .unwrap_or_else(|| String::from("the model reported an unspecified error"))
}

// ============================================================================
// Translation Layer
// ============================================================================

fn context_to_input(items: &[ContextItem]) -> Vec<InputItem> {
    let mut fco_counter = 0usize;
    items
        .iter()
        .map(|item| match item {
            ContextItem::Message(seg) => InputItem::Message {
                role: match seg.source {
                    Source::Directive => Role::System,
                    Source::User => Role::User,
                    Source::Model => Role::Assistant,
                },
                content: seg.content.clone(),
            },
            ContextItem::ToolCall(tc) => InputItem::FunctionCall {
                id: tc.id.clone(),
                call_id: tc.call_id.clone(),
                name: tc.name.clone(),
                arguments: tc.arguments.clone(),
            },
            ContextItem::ToolResult(tr) => {
                fco_counter += 1;
                InputItem::FunctionCallOutput {
                    id: format!("fco_{fco_counter}"),
                    call_id: tr.call_id.clone(),
                    output: tr.output.clone(),
                }
            }
        })
        .collect()
}

/// Returns None if empty (omitted from JSON).
fn tools_to_api(tools: &[ToolDefinition]) -> Option<Vec<ApiToolDefinition>> {
    if tools.is_empty() {
        return None;
    }
    Some(
        tools
            .iter()
            .map(|t| ApiToolDefinition {
                tool_type: "function",
                name: t.name.clone(),
                description: t.description.clone(),
                parameters: t.parameters.clone(),
            })
            .collect(),
    )
}

fn build_request(
    params: &GenerationParams,
    history: &Context,
    tools: &[ToolDefinition],
) -> ResponsesRequest {
    ResponsesRequest {
        model: params.model.clone(),
        input: context_to_input(&history.items),
        stream: true,
        temperature: params.temperature,
        max_output_tokens: params.max_tokens,
        tools: tools_to_api(tools),
        text: params.schema.clone().map(|schema| TextConfig {
            format: TextFormat {
                format_type: "json_schema",
                name: "response",
                schema,
            },
        }),
    }
}

// ============================================================================
// Backend
// ============================================================================

/// Where and how to reach a Responses endpoint.
#[derive(Debug, Clone)]
pub struct ResponsesConfig {
    /// Shown in the sidebar and logs ("openrouter", "lmstudio").
    pub name: String,
    pub base_url: String,
    pub api_key: Option<String>,
    pub system_prompt: String,
}

struct Shared {
    name: String,
    base_url: String,
    api_key: Option<String>,
    client: reqwest::Client,
    history: Mutex<Context>,
}

impl Shared {
    fn history(&self) -> MutexGuard<'_, Context> {
        self.history.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

type CancelMap = Mutex<HashMap<u64, oneshot::Sender<()>>>;

pub struct ResponsesBackend {
    shared: Arc<Shared>,
    tools: Option<Arc<dyn ToolHandler>>,
    runtime: Handle,
    next_handle: AtomicU64,
    active: Arc<CancelMap>,
}

impl ResponsesBackend {
    pub fn new(config: ResponsesConfig, runtime: Handle) -> Self {
        let base_url = config.base_url.trim_end_matches('/').to_string();
        Self {
            shared: Arc::new(Shared {
                name: config.name,
                base_url,
                api_key: config.api_key,
                client: reqwest::Client::new(),
                history: Mutex::new(Context::new(config.system_prompt)),
            }),
            tools: None,
            runtime,
            next_handle: AtomicU64::new(1),
            active: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn with_tools(mut self, tools: Arc<dyn ToolHandler>) -> Self {
        self.tools = Some(tools);
        self
    }

    /// Snapshot of the conversation history.
    pub fn history(&self) -> Context {
        self.shared.history().clone()
    }

    fn active(&self) -> MutexGuard<'_, HashMap<u64, oneshot::Sender<()>>> {
        self.active.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl GenerationBackend for ResponsesBackend {
    fn name(&self) -> &str {
        &self.shared.name
    }

    fn start_stream(
        &self,
        request: GenerationRequest,
        mut sink: StreamSink,
    ) -> Result<StreamHandle, GenerationError> {
        if self.shared.base_url.is_empty() {
            return Err(GenerationError::Config("base URL is empty".into()));
        }

        let (cancel_tx, cancel_rx) = oneshot::channel();
        let id = {
            let mut active = self.active();
            if !active.is_empty() {
                return Err(GenerationError::Busy);
            }
            let id = self.next_handle.fetch_add(1, Ordering::Relaxed);
            active.insert(id, cancel_tx);
            id
        };

        self.shared.history().add_user_message(request.prompt.clone());
        info!(
            "Starting stream {} on {}: model={}, prompt_len={}",
            id,
            self.shared.name,
            request.params.model,
            request.prompt.len()
        );

        let turn = Turn {
            shared: Arc::clone(&self.shared),
            tools: if request.params.tools_enabled {
                self.tools.clone()
            } else {
                None
            },
            params: request.params,
        };
        let active = Arc::clone(&self.active);

        self.runtime.spawn(async move {
            let mut partial = String::new();
            let status = tokio::select! {
                status = turn.run(&mut sink, &mut partial) => status,
                Ok(()) = cancel_rx => {
                    info!("Stream {} cancelled", id);
                    StreamStatus::Cancelled
                }
            };
            turn.commit(&mut partial);
            active
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .remove(&id);
            sink(StreamSignal::Finished(status));
        });

        Ok(StreamHandle(id))
    }

    fn cancel(&self, handle: StreamHandle) -> bool {
        match self.active().remove(&handle.0) {
            Some(cancel) => cancel.send(()).is_ok(),
            None => false,
        }
    }

    fn reset(&self) {
        self.shared.history().reset();
        info!("{} history reset", self.shared.name);
    }
}

/// One user turn: the initial request plus any tool follow-ups.
struct Turn {
    shared: Arc<Shared>,
    tools: Option<Arc<dyn ToolHandler>>,
    params: GenerationParams,
}

impl Turn {
    async fn run(&self, sink: &mut StreamSink, partial: &mut String) -> StreamStatus {
        let definitions = self
            .tools
            .as_ref()
            .map(|t| t.definitions())
            .unwrap_or_default();

        for round in 0..MAX_TOOL_ROUNDS {
            let body = {
                let history = self.shared.history();
                build_request(&self.params, &history, &definitions)
            };

            let calls = match self.round(&body, sink, partial).await {
                Ok(calls) => calls,
                Err(reason) => return StreamStatus::Failed(reason),
            };
            self.commit(partial);

            if calls.is_empty() {
                return StreamStatus::Completed;
            }
            let Some(tools) = &self.tools else {
                warn!("Model requested {} tool call(s) with tools disabled", calls.len());
                return StreamStatus::Completed;
            };

            debug!("Round {}: running {} tool call(s)", round, calls.len());
            for call in calls {
                let output = tools.invoke(&call.name, &call.arguments).await;
                let mut history = self.shared.history();
                let call_id = call.call_id.clone();
                history.add_tool_call(call);
                history.add_tool_result(ToolResult { call_id, output });
            }
        }

        warn!("Stopped after {} tool rounds", MAX_TOOL_ROUNDS);
        StreamStatus::Completed
    }

    /// Moves streamed text into the history.
    fn commit(&self, partial: &mut String) {
        if !partial.is_empty() {
            self.shared
                .history()
                .append_to_last_model_message(&mem::take(partial));
        }
    }

    async fn round(
        &self,
        body: &ResponsesRequest,
        sink: &mut StreamSink,
        partial: &mut String,
    ) -> Result<Vec<ToolCall>, String> {
        let response = self.send_request(body).await.map_err(|e| e.to_string())?;

        let mut decoder = SseDecoder::default();
        let mut round = RoundState::default();
        let mut stream = response.bytes_stream();

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| GenerationError::Network(e.to_string()).to_string())?;
            for event in decoder.push(&chunk) {
                if round.apply(event, sink, partial)? {
                    return Ok(round.calls);
                }
            }
        }
        if let Some(event) = decoder.finish() {
            round.apply(event, sink, partial)?;
        }

        debug!("Stream closed without response.completed");
        Ok(round.calls)
    }

    async fn send_request(
        &self,
        body: &ResponsesRequest,
    ) -> Result<reqwest::Response, GenerationError> {
        let json_body = serde_json::to_string(body)
            .map_err(|e| GenerationError::Parse(format!("Request serialization failed: {e}")))?;
        debug!("Responses request: {}", json_body);

        let mut builder = self
            .shared
            .client
            .post(format!("{}/responses", self.shared.base_url))
            .header("Content-Type", "application/json");
        if let Some(key) = &self.shared.api_key {
            builder = builder.header("Authorization", format!("Bearer {key}"));
        }

        let response = builder
            .body(json_body)
            .send()
            .await
            .map_err(|e| GenerationError::Network(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            warn!("{} API error: {} - {}", self.shared.name, status, message);
            return Err(GenerationError::Api { status, message });
        }
        Ok(response)
    }
}

/// Tool calls seen so far in one response. Calls are tracked by item id
/// from `output_item.added` until their arguments are complete.
#[derive(Default)]
struct RoundState {
    pending: HashMap<String, String>, // item_id -> call_id
    calls: Vec<ToolCall>,
}

impl RoundState {
    /// Returns `Ok(true)` once the response is complete.
    fn apply(
        &mut self,
        event: ResponseEvent,
        sink: &mut StreamSink,
        partial: &mut String,
    ) -> Result<bool, String> {
        match event {
            ResponseEvent::TextDelta(text) => {
                partial.push_str(&text);
                sink(StreamSignal::Chunk(text));
            }
            ResponseEvent::ToolCallStarted { item_id, call_id } => {
                self.pending.insert(item_id, call_id);
            }
            ResponseEvent::ToolCallReady {
                item_id,
                name,
                arguments,
            } => match self.pending.remove(&item_id) {
                Some(call_id) => self.calls.push(ToolCall {
                    id: item_id,
                    call_id,
                    name,
                    arguments,
                }),
                None => warn!("arguments.done for unknown item_id: {}, skipping", item_id),
            },
            ResponseEvent::Completed => return Ok(true),
            ResponseEvent::Failed(reason) => return Err(reason),
        }
        Ok(false)
    }
}
