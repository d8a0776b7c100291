//! # Sidebar Component
//!
//! Right-hand panel with generation status, session settings, statistics
//! and key bindings.
//!
//! ## Design
//!
//! Stateless: every field is a prop filled from `App` and the TUI state
//! each frame, so the panel is trivial to test.
//!
//! ```text
//! ╭ Status ────────────────╮
//! │ ⠋ Generating           │
//! │ Settings               │
//! │  Provider  lmstudio    │
//! │  ...                   │
//! ```

use ratatui::Frame;
use ratatui::layout::Rect;
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, BorderType, Borders, Padding, Paragraph};

use crate::core::state::App;
use crate::tui::component::Component;
use crate::tui::theme;

pub const SIDEBAR_WIDTH: u16 = 32;

const CONTROLS: [(&str, &str); 7] = [
    ("Enter", "send"),
    ("Alt+Enter", "newline"),
    ("Esc", "cancel"),
    ("PgUp/PgDn", "scroll"),
    ("Ctrl+End", "follow"),
    ("F1", "sidebar"),
    ("Ctrl+C", "quit"),
];

pub struct Sidebar<'a> {
    pub status: &'a str,
    /// Spinner frame while a reply streams.
    pub spinner: Option<&'static str>,
    pub provider: &'a str,
    pub model: &'a str,
    pub temperature: f32,
    pub max_tokens: u32,
    pub tools_enabled: bool,
    pub tool_count: usize,
    pub messages: usize,
    pub display_items: usize,
    pub fps: f32,
}

impl<'a> Sidebar<'a> {
    pub fn from_app(app: &'a App, display_items: usize, spinner: Option<&'static str>) -> Self {
        Self {
            status: &app.status_message,
            spinner,
            provider: app.backend.name(),
            model: &app.params.model,
            temperature: app.params.temperature,
            max_tokens: app.params.max_tokens,
            tools_enabled: app.params.tools_enabled,
            tool_count: app.tool_count,
            messages: app.store.len(),
            display_items,
            fps: app.frame_rate,
        }
    }

    fn lines(&self) -> Vec<Line<'static>> {
        let heading = |text: &str| {
            Line::styled(
                text.to_string(),
                Style::default()
                    .fg(theme::ACCENT)
                    .add_modifier(Modifier::BOLD),
            )
        };
        let row = |key: &str, value: String| {
            Line::from(vec![
                Span::styled(format!(" {key:<10}"), Style::default().fg(theme::DIM)),
                Span::styled(value, Style::default().fg(theme::FG)),
            ])
        };

        let status = match self.spinner {
            Some(frame) => Line::styled(
                format!("{frame} {}", self.status),
                Style::default().fg(theme::ACCENT),
            ),
            None => Line::styled(
                format!("● {}", self.status),
                Style::default().fg(theme::SUCCESS),
            ),
        };

        let tools = if self.tools_enabled {
            format!("on ({})", self.tool_count)
        } else {
            String::from("off")
        };

        let mut lines = vec![
            heading("Status"),
            status,
            Line::default(),
            heading("Settings"),
            row("Provider", self.provider.to_string()),
            row("Model", self.model.to_string()),
            row("Temp", format!("{:.1}", self.temperature)),
            row("Tokens", self.max_tokens.to_string()),
            row("Tools", tools),
            Line::default(),
            heading("Stats"),
            row("Messages", self.messages.to_string()),
            row("Items", self.display_items.to_string()),
            row("FPS", format!("{:.1}", self.fps)),
            Line::default(),
            heading("Controls"),
        ];
        lines.extend(CONTROLS.iter().map(|(key, action)| row(key, action.to_string())));
        lines
    }
}

impl Component for Sidebar<'_> {
    fn render(&mut self, frame: &mut Frame, area: Rect) {
        let block = Block::default()
            .borders(Borders::LEFT)
            .border_type(BorderType::Rounded)
            .border_style(Style::default().fg(theme::BORDER))
            .padding(Padding::horizontal(1));
        frame.render_widget(Paragraph::new(self.lines()).block(block), area);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ratatui::Terminal;
    use ratatui::backend::TestBackend;

    fn sidebar() -> Sidebar<'static> {
        Sidebar {
            status: "Ready",
            spinner: None,
            provider: "offline",
            model: "local-model",
            temperature: 0.7,
            max_tokens: 2048,
            tools_enabled: true,
            tool_count: 2,
            messages: 3,
            display_items: 11,
            fps: 59.94,
        }
    }

    fn render(mut sidebar: Sidebar<'_>) -> String {
        let mut terminal = Terminal::new(TestBackend::new(SIDEBAR_WIDTH, 30)).unwrap();
        terminal.draw(|f| sidebar.render(f, f.area())).unwrap();
        terminal
            .backend()
            .buffer()
            .content()
            .iter()
            .map(|c| c.symbol())
            .collect()
    }

    #[test]
    fn test_shows_settings_and_stats() {
        let text = render(sidebar());
        assert!(text.contains("● Ready"));
        assert!(text.contains("offline"));
        assert!(text.contains("local-model"));
        assert!(text.contains("0.7"));
        assert!(text.contains("on (2)"));
        assert!(text.contains("11"));
        assert!(text.contains("59.9"));
    }

    #[test]
    fn test_spinner_while_generating() {
        let text = render(Sidebar {
            status: "Generating",
            spinner: Some("⠙"),
            tools_enabled: false,
            ..sidebar()
        });
        assert!(text.contains("⠙ Generating"));
        assert!(text.contains("off"));
    }

    #[test]
    fn test_from_app() {
        let (app, _) = crate::test_support::test_app();
        let sidebar = Sidebar::from_app(&app, 0, None);
        assert_eq!(sidebar.model, "test-model");
        assert_eq!(sidebar.status, "Ready");
        assert_eq!(sidebar.messages, 0);
    }
}
