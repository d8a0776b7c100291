use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone)]
pub enum Source {
    #[serde(rename = "user")]
    User,
    #[serde(rename = "assistant")]
    Model,
    #[serde(rename = "system")]
    Directive,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ContextSegment {
    #[serde(rename = "role")]
    pub source: Source,
    pub content: String,
}

/// Replaces typographic characters with ASCII equivalents so the history
/// sent back to the model stays plain.
fn replace_typography(text: &str) -> String {
    text.replace(['‘', '’'], "'")
        .replace(['“', '”'], "\"")
        .replace('—', "--")
        .replace('…', "...")
}

/// One entry of the conversation history sent with each request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum ContextItem {
    Message(ContextSegment),
    ToolCall(ToolCall),
    ToolResult(ToolResult),
}

/// Conversation history kept by a backend between turns.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct Context {
    pub items: Vec<ContextItem>,
}

impl Context {
    pub fn new(directive: impl Into<String>) -> Self {
        Context {
            items: vec![ContextItem::Message(ContextSegment {
                source: Source::Directive,
                content: directive.into(),
            })],
        }
    }

    /// Drops everything except the leading directive.
    pub fn reset(&mut self) {
        self.items.truncate(1);
    }

    pub fn add_user_message(&mut self, content: impl Into<String>) {
        self.items.push(ContextItem::Message(ContextSegment {
            source: Source::User,
            content: content.into(),
        }));
    }

    /// Appends to the trailing model message, or starts one.
    pub fn append_to_last_model_message(&mut self, content: &str) {
        let normalized = replace_typography(content);

        if let Some(ContextItem::Message(seg)) = self.items.last_mut()
            && seg.source == Source::Model
        {
            seg.content.push_str(&normalized);
            return;
        }

        self.items.push(ContextItem::Message(ContextSegment {
            source: Source::Model,
            content: normalized,
        }));
    }

    pub fn add_tool_call(&mut self, tc: ToolCall) {
        self.items.push(ContextItem::ToolCall(tc));
    }

    pub fn add_tool_result(&mut self, tr: ToolResult) {
        self.items.push(ContextItem::ToolResult(tr));
    }
}

/// A tool the model can call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value, // JSON Schema
}

/// A completed tool call from the model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolCall {
    pub id: String,      // API object ID, echoed back in the next request
    pub call_id: String, // links the call to its result
    pub name: String,
    pub arguments: String, // JSON string
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolResult {
    pub call_id: String,
    pub output: String,
}

/// Identifies one in-flight stream for cancellation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StreamHandle(pub u64);

/// How a stream ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamStatus {
    Completed,
    Cancelled,
    Failed(String),
}

/// What a backend delivers to its sink: zero or more chunks, then exactly
/// one `Finished`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamSignal {
    Chunk(String),
    Finished(StreamStatus),
}

#[derive(Debug, Clone, PartialEq)]
pub struct GenerationParams {
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub tools_enabled: bool,
    /// JSON schema for structured output, if the prompt asked for one.
    pub schema: Option<serde_json::Value>,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            model: String::from("local-model"),
            temperature: 0.7,
            max_tokens: 2048,
            tools_enabled: true,
            schema: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub prompt: String,
    pub params: GenerationParams,
}
