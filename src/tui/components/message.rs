//! # Message Rendering
//!
//! [`TranscriptRenderer`] is the TUI's [`ContentRenderer`]: it turns a
//! message's content into display lines once per content change, and
//! re-assembles tool summaries and the streaming decoration around those
//! cached lines on every animation tick.
//!
//! ```text
//! ⚡ calculate({"expression":"2 * 3"}) ✓     ← one per ToolExecution
//!                                           ← blank, only if content follows
//! The answer is **6**.                       ← markdown / JSON / plain
//!   ▋                                        ← only while streaming
//! ```
//!
//! Lines are not wrapped here. The compositor wraps at draw time, so the
//! same lines serve every terminal width.

use log::debug;

use crate::core::message::{ContentRenderer, LineTone, Message, RenderedLine};
use crate::tui::animation::SPINNER;
use crate::tui::components::tool_message::{json_view, parse_json_document, summary_line};
use crate::tui::compositor::visible_width;
use crate::tui::markdown::{self, MarkdownError};
use crate::tui::theme::{self, paint};

pub type MarkdownFn = fn(&str) -> Result<String, MarkdownError>;

pub const THINKING_LABEL: &str = "Thinking...";
pub const CURSOR_BLOCK: &str = "▋";

/// Animation state the decoration line is drawn from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Indicator {
    /// The stream has produced no chunk yet.
    pub waiting: bool,
    pub spinner_frame: usize,
    pub cursor_visible: bool,
}

pub struct TranscriptRenderer {
    markdown: MarkdownFn,
    pub indicator: Indicator,
}

impl Default for TranscriptRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl TranscriptRenderer {
    pub fn new() -> Self {
        Self::with_markdown(markdown::render)
    }

    /// Uses `markdown` in place of the pulldown-cmark writer.
    pub fn with_markdown(markdown: MarkdownFn) -> Self {
        Self {
            markdown,
            indicator: Indicator::default(),
        }
    }

    fn content_lines(&self, content: &str) -> Vec<RenderedLine> {
        if content.is_empty() {
            return Vec::new();
        }
        if let Some(value) = parse_json_document(content) {
            return json_view(&value);
        }
        match (self.markdown)(content) {
            Ok(text) => text
                .split('\n')
                .map(|line| RenderedLine::new(line, LineTone::Body))
                .collect(),
            Err(e) => {
                debug!("Markdown failed, showing plain text: {}", e);
                content
                    .split('\n')
                    .map(|line| RenderedLine::new(strip_controls(line), LineTone::Plain))
                    .collect()
            }
        }
    }

    fn decoration(&self) -> RenderedLine {
        let Indicator {
            waiting,
            spinner_frame,
            cursor_visible,
        } = self.indicator;
        if waiting {
            let frame = SPINNER[spinner_frame % SPINNER.len()];
            RenderedLine::new(format!("  {frame} {THINKING_LABEL}"), LineTone::Spinner)
        } else if cursor_visible {
            RenderedLine::new(format!("  {CURSOR_BLOCK}"), LineTone::Cursor)
        } else {
            RenderedLine::new("", LineTone::Cursor)
        }
    }

    fn assemble(&self, message: &mut Message) {
        let mut lines: Vec<RenderedLine> =
            message.tool_executions.iter().map(summary_line).collect();
        if !lines.is_empty() && !message.content_lines.is_empty() {
            lines.push(RenderedLine::new("", LineTone::Plain));
        }
        lines.extend(message.content_lines.iter().cloned());
        if message.is_streaming {
            lines.push(self.decoration());
        }
        message.lines = lines;
    }
}

impl ContentRenderer for TranscriptRenderer {
    fn render(&mut self, message: &mut Message) {
        message.content_lines = self.content_lines(&message.content);
        self.assemble(message);
    }

    fn refresh(&mut self, message: &mut Message) {
        self.assemble(message);
    }
}

fn strip_controls(line: &str) -> String {
    line.chars()
        .filter(|c| *c == '\t' || !c.is_control())
        .collect()
}

/// Header text for a message: icon and label on the left, time on the
/// right. When the width cannot fit both with room to spare, the time
/// moves to a second row.
pub fn header_text(message: &Message, width: u16) -> String {
    let kind = &message.kind;
    let label = match kind.tool_name() {
        Some(name) => format!("{} {} · {}", kind.icon(), kind.label(), name),
        None => format!("{} {}", kind.icon(), kind.label()),
    };
    let time = message.timestamp.format("%H:%M:%S").to_string();

    let label_width = visible_width(&label);
    let time_width = visible_width(&time);
    let left = format!("\x1b[1m{}", paint(&label, theme::label_color(kind)));
    let right = paint(&time, theme::TIMESTAMP);

    if (width as usize) <= label_width + time_width + 5 {
        format!("{left}\n{right}")
    } else {
        let gap = width as usize - label_width - time_width;
        format!("{left}{}{right}", " ".repeat(gap))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::message::{MessageKind, ToolExecution};
    use crate::tui::compositor::measure;

    fn failing_markdown(_: &str) -> Result<String, MarkdownError> {
        Err(MarkdownError::Highlight("boom".into()))
    }

    fn texts(message: &Message) -> Vec<&str> {
        message.lines.iter().map(|l| l.text.as_str()).collect()
    }

    #[test]
    fn test_markdown_lines() {
        let mut renderer = TranscriptRenderer::new();
        let mut message = Message::new(MessageKind::Assistant, "**bold** text\nline2");
        renderer.render(&mut message);
        assert_eq!(message.lines.len(), 2);
        assert!(message.lines[0].text.contains("\x1b[1mbold"));
        assert_eq!(message.lines[1].text, "line2");
        assert!(message.lines.iter().all(|l| l.tone == LineTone::Body));
    }

    #[test]
    fn test_markdown_failure_falls_back_to_plain() {
        let mut renderer = TranscriptRenderer::with_markdown(failing_markdown);
        let mut message = Message::new(MessageKind::Assistant, "a\x07b\nc\td");
        renderer.render(&mut message);
        assert_eq!(texts(&message), vec!["ab", "c\td"]);
        assert!(message.lines.iter().all(|l| l.tone == LineTone::Plain));
    }

    #[test]
    fn test_json_content_gets_json_view() {
        let mut renderer = TranscriptRenderer::with_markdown(failing_markdown);
        let mut message = Message::new(MessageKind::Assistant, r#"{"a": 1}"#);
        renderer.render(&mut message);
        assert_eq!(message.lines[0].tone, LineTone::JsonHeader);
        assert_eq!(message.lines.len(), 4);
    }

    #[test]
    fn test_tool_summaries_precede_content() {
        let mut renderer = TranscriptRenderer::new();
        let mut message = Message::new(MessageKind::Assistant, "done");
        message.tool_executions = vec![
            ToolExecution {
                response: Some("{}".into()),
                ..ToolExecution::started("get_current_time", "")
            },
            ToolExecution::started("calculate", r#"{"expression":"1 + 1"}"#),
        ];
        renderer.render(&mut message);
        assert_eq!(
            texts(&message),
            vec![
                "⚡ get_current_time() ✓",
                r#"⚡ calculate({"expression":"1 + 1"}) …"#,
                "",
                "done"
            ]
        );
    }

    #[test]
    fn test_no_blank_without_content() {
        let mut renderer = TranscriptRenderer::new();
        let mut message = Message::new(MessageKind::Assistant, "");
        message.tool_executions = vec![ToolExecution::started("calculate", "{}")];
        renderer.render(&mut message);
        assert_eq!(message.lines.len(), 1);
    }

    #[test]
    fn test_streaming_decoration_follows_indicator() {
        let mut renderer = TranscriptRenderer::new();
        let mut message = Message::new(MessageKind::Assistant, "");
        message.is_streaming = true;

        renderer.indicator = Indicator {
            waiting: true,
            spinner_frame: 1,
            cursor_visible: true,
        };
        renderer.render(&mut message);
        assert_eq!(texts(&message), vec!["  ⠙ Thinking..."]);

        message.content = String::from("Hi");
        renderer.render(&mut message);
        renderer.indicator.waiting = false;
        renderer.refresh(&mut message);
        assert_eq!(texts(&message), vec!["Hi", "  ▋"]);

        renderer.indicator.cursor_visible = false;
        renderer.refresh(&mut message);
        assert_eq!(texts(&message), vec!["Hi", ""]);

        message.is_streaming = false;
        renderer.refresh(&mut message);
        assert_eq!(texts(&message), vec!["Hi"]);
    }

    #[test]
    fn test_refresh_keeps_cached_content() {
        let mut renderer = TranscriptRenderer::new();
        let mut message = Message::new(MessageKind::User, "first");
        renderer.render(&mut message);
        // Content replaced without a style pass: refresh must not pick it up
        message.content = String::from("second");
        renderer.refresh(&mut message);
        assert_eq!(texts(&message), vec!["first"]);
    }

    #[test]
    fn test_header_one_or_two_rows() {
        let message = Message::new(MessageKind::User, "x");
        // "▶ YOU" is 5 wide, the time 8
        assert_eq!(measure(header_text(&message, 80), 80), 1);
        assert_eq!(visible_width(header_text(&message, 80)), 80);
        assert_eq!(measure(header_text(&message, 18), 18), 2);
        assert_eq!(measure(header_text(&message, 19), 19), 1);
    }

    #[test]
    fn test_header_names_the_tool() {
        let message = Message::new(
            MessageKind::ToolCall {
                tool_name: "calculate".into(),
            },
            "",
        );
        assert!(header_text(&message, 80).contains("TOOL · calculate"));
    }
}
