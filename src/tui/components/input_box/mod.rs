//! # InputBox Component
//!
//! Prompt editor at the bottom of the screen.
//!
//! ## Responsibilities
//!
//! - Capture text input, newlines and bracketed paste
//! - Handle editing (backspace, delete, cursor movement)
//! - Handle submission (Enter)
//! - While a reply streams, show the generating notice instead of the editor
//!
//! ## State Management
//!
//! The buffer and cursor are internal state. `busy_frame` is a prop set by
//! the parent each frame: the loading spinner frame while generating.

mod text_wrap;

use ratatui::Frame;
use ratatui::layout::Rect;
use ratatui::style::{Modifier, Style};
use ratatui::text::Line;
use ratatui::widgets::{
    Block, BorderType, Padding, Paragraph, Scrollbar, ScrollbarOrientation, ScrollbarState,
};

use crate::tui::component::{Component, EventHandler};
use crate::tui::event::TuiEvent;
use crate::tui::theme;

use text_wrap::{
    MAX_VISIBLE_LINES, TEXT_OFFSET, VERTICAL_OVERHEAD, cursor_row_col, inner_width, line_end,
    line_start, next_char_boundary, prev_char_boundary, wrap_line_count, wrapped_lines,
};

pub const GENERATING_TEXT: &str = "Generating response...";
pub const CANCEL_HINT: &str = "Press ESC to cancel generation";

/// High-level events emitted by the InputBox
#[derive(Debug, Clone, PartialEq)]
pub enum InputEvent {
    /// User submitted the text (Enter pressed)
    Submit(String),
    ContentChanged,
}

/// Text input component.
///
/// # Props
///
/// - `busy_frame`: spinner frame while a reply streams, `None` when idle
///
/// # State
///
/// - `buffer`: current text being typed
/// - `cursor`: byte offset into `buffer`
pub struct InputBox {
    pub buffer: String,
    pub busy_frame: Option<&'static str>,
    cursor: usize,
}

impl Default for InputBox {
    fn default() -> Self {
        Self::new()
    }
}

impl InputBox {
    pub fn new() -> Self {
        Self {
            buffer: String::new(),
            busy_frame: None,
            cursor: 0,
        }
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Height for the current content, between one and
    /// `MAX_VISIBLE_LINES` text rows plus borders.
    pub fn calculate_height(&self, content_width: u16) -> u16 {
        if self.busy_frame.is_some() {
            return 2 + VERTICAL_OVERHEAD;
        }
        let lines = wrap_line_count(&self.buffer, inner_width(content_width));
        lines.min(MAX_VISIBLE_LINES) + VERTICAL_OVERHEAD
    }

    fn insert(&mut self, text: &str) -> Option<InputEvent> {
        self.buffer.insert_str(self.cursor, text);
        self.cursor += text.len();
        Some(InputEvent::ContentChanged)
    }

    fn move_to(&mut self, pos: usize) -> Option<InputEvent> {
        (pos != self.cursor).then(|| {
            self.cursor = pos;
            InputEvent::ContentChanged
        })
    }

    fn render_busy(&self, frame: &mut Frame, area: Rect, spinner: &str) {
        let block = Block::bordered()
            .border_type(BorderType::Rounded)
            .border_style(Style::default().fg(theme::BORDER))
            .padding(Padding::horizontal(1));
        let lines = vec![
            Line::styled(
                format!("{spinner} {GENERATING_TEXT}"),
                Style::default().fg(theme::ACCENT),
            ),
            Line::styled(
                CANCEL_HINT,
                Style::default().fg(theme::DIM).add_modifier(Modifier::ITALIC),
            ),
        ];
        frame.render_widget(Paragraph::new(lines).block(block), area);
    }

    fn render_editor(&self, frame: &mut Frame, area: Rect) {
        let width = inner_width(area.width);
        let lines = wrapped_lines(&self.buffer, width);
        let (row, col) = cursor_row_col(&self.buffer, self.cursor, width);
        let scroll = row.saturating_sub(MAX_VISIBLE_LINES - 1);

        let visible: Vec<Line> = lines
            .iter()
            .skip(scroll as usize)
            .take(MAX_VISIBLE_LINES as usize)
            .map(|l| Line::raw(l.as_str()))
            .collect();

        let block = Block::bordered()
            .border_type(BorderType::Rounded)
            .border_style(Style::default().fg(theme::ACCENT))
            .title(" Message ")
            .padding(Padding::horizontal(1));
        frame.render_widget(
            Paragraph::new(visible)
                .block(block)
                .style(Style::default().fg(theme::FG)),
            area,
        );

        let total = lines.len() as u16;
        if total > MAX_VISIBLE_LINES {
            let max_scroll = total - MAX_VISIBLE_LINES;
            let mut scrollbar_state = ScrollbarState::new(max_scroll as usize + 1)
                .position(scroll as usize);
            let scrollbar_area = Rect {
                x: area.x + area.width.saturating_sub(1),
                y: area.y + 1,
                width: 1,
                height: area.height.saturating_sub(VERTICAL_OVERHEAD),
            };
            frame.render_stateful_widget(
                Scrollbar::new(ScrollbarOrientation::VerticalRight),
                scrollbar_area,
                &mut scrollbar_state,
            );
        }

        frame.set_cursor_position((area.x + TEXT_OFFSET + col, area.y + 1 + row - scroll));
    }
}

impl Component for InputBox {
    fn render(&mut self, frame: &mut Frame, area: Rect) {
        match self.busy_frame {
            Some(spinner) => self.render_busy(frame, area, spinner),
            None => self.render_editor(frame, area),
        }
    }
}

impl EventHandler for InputBox {
    type Event = InputEvent;

    fn handle_event(&mut self, event: &TuiEvent) -> Option<Self::Event> {
        match event {
            TuiEvent::InputChar(c) => self.insert(c.encode_utf8(&mut [0; 4])),
            TuiEvent::Newline => self.insert("\n"),
            TuiEvent::Paste(text) => {
                // Terminals send CR line endings in bracketed paste
                let text = text.replace("\r\n", "\n").replace('\r', "\n");
                self.insert(&text)
            }
            TuiEvent::Backspace => {
                if self.cursor == 0 {
                    return None;
                }
                let prev = prev_char_boundary(&self.buffer, self.cursor);
                self.buffer.drain(prev..self.cursor);
                self.cursor = prev;
                Some(InputEvent::ContentChanged)
            }
            TuiEvent::Delete => {
                if self.cursor >= self.buffer.len() {
                    return None;
                }
                let next = next_char_boundary(&self.buffer, self.cursor);
                self.buffer.drain(self.cursor..next);
                Some(InputEvent::ContentChanged)
            }
            TuiEvent::CursorLeft if self.cursor > 0 => {
                self.move_to(prev_char_boundary(&self.buffer, self.cursor))
            }
            TuiEvent::CursorRight if self.cursor < self.buffer.len() => {
                self.move_to(next_char_boundary(&self.buffer, self.cursor))
            }
            TuiEvent::CursorHome => self.move_to(line_start(&self.buffer, self.cursor)),
            TuiEvent::CursorEnd => self.move_to(line_end(&self.buffer, self.cursor)),
            TuiEvent::Submit => {
                if self.buffer.trim().is_empty() {
                    return None;
                }
                let text = std::mem::take(&mut self.buffer);
                self.cursor = 0;
                Some(InputEvent::Submit(text))
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ratatui::Terminal;
    use ratatui::backend::TestBackend;

    fn type_text(input: &mut InputBox, text: &str) {
        for c in text.chars() {
            input.handle_event(&TuiEvent::InputChar(c));
        }
    }

    fn screen(terminal: &Terminal<TestBackend>) -> String {
        terminal
            .backend()
            .buffer()
            .content()
            .iter()
            .map(|c| c.symbol())
            .collect()
    }

    #[test]
    fn test_typing_and_backspace() {
        let mut input = InputBox::new();
        type_text(&mut input, "héllo");
        assert_eq!(input.buffer, "héllo");
        assert_eq!(input.cursor(), "héllo".len());

        let res = input.handle_event(&TuiEvent::Backspace);
        assert_eq!(res, Some(InputEvent::ContentChanged));
        assert_eq!(input.buffer, "héll");
    }

    #[test]
    fn test_cursor_movement_and_insert() {
        let mut input = InputBox::new();
        type_text(&mut input, "ac");
        input.handle_event(&TuiEvent::CursorLeft);
        type_text(&mut input, "b");
        assert_eq!(input.buffer, "abc");

        assert_eq!(input.handle_event(&TuiEvent::CursorHome), Some(InputEvent::ContentChanged));
        assert_eq!(input.cursor(), 0);
        assert_eq!(input.handle_event(&TuiEvent::CursorLeft), None);
        input.handle_event(&TuiEvent::Delete);
        assert_eq!(input.buffer, "bc");
        input.handle_event(&TuiEvent::CursorEnd);
        assert_eq!(input.cursor(), 2);
    }

    #[test]
    fn test_newline_and_paste() {
        let mut input = InputBox::new();
        type_text(&mut input, "one");
        input.handle_event(&TuiEvent::Newline);
        input.handle_event(&TuiEvent::Paste("two\r\nthree".into()));
        assert_eq!(input.buffer, "one\ntwo\nthree");

        input.handle_event(&TuiEvent::CursorHome);
        assert_eq!(input.cursor(), "one\ntwo\n".len());
    }

    #[test]
    fn test_submit_takes_buffer() {
        let mut input = InputBox::new();
        type_text(&mut input, "hello");
        match input.handle_event(&TuiEvent::Submit) {
            Some(InputEvent::Submit(text)) => assert_eq!(text, "hello"),
            other => panic!("Expected Submit event, got {other:?}"),
        }
        assert!(input.buffer.is_empty());
        assert_eq!(input.cursor(), 0);
    }

    #[test]
    fn test_blank_submit_is_ignored() {
        let mut input = InputBox::new();
        type_text(&mut input, "   ");
        assert_eq!(input.handle_event(&TuiEvent::Submit), None);
        assert_eq!(input.buffer, "   ");
    }

    #[test]
    fn test_height_grows_then_caps() {
        let mut input = InputBox::new();
        assert_eq!(input.calculate_height(40), 3);
        input.buffer = "a\nb\nc".into();
        assert_eq!(input.calculate_height(40), 5);
        input.buffer = "a\n".repeat(20);
        assert_eq!(input.calculate_height(40), MAX_VISIBLE_LINES + VERTICAL_OVERHEAD);
        input.busy_frame = Some("⠋");
        assert_eq!(input.calculate_height(40), 4);
    }

    #[test]
    fn test_render_busy_notice() {
        let mut terminal = Terminal::new(TestBackend::new(40, 4)).unwrap();
        let mut input = InputBox::new();
        input.busy_frame = Some("⠋");
        terminal.draw(|f| input.render(f, f.area())).unwrap();

        let text = screen(&terminal);
        assert!(text.contains("⠋ Generating response..."));
        assert!(text.contains(CANCEL_HINT));
    }

    #[test]
    fn test_render_editor_text() {
        let mut terminal = Terminal::new(TestBackend::new(40, 3)).unwrap();
        let mut input = InputBox::new();
        type_text(&mut input, "draft");
        terminal.draw(|f| input.render(f, f.area())).unwrap();
        assert!(screen(&terminal).contains("draft"));
    }
}
