//! # Welcome Component
//!
//! Shown in the chat pane while the transcript is empty.

use ratatui::Frame;
use ratatui::layout::{Alignment, Constraint, Flex, Layout, Rect};
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::Paragraph;

use crate::tui::component::Component;
use crate::tui::theme;

const COMMANDS: [(&str, &str); 8] = [
    ("/help", "all commands and keys"),
    ("/clear", "clear the chat"),
    ("/new", "fresh session"),
    ("/tools", "toggle tool calling"),
    ("/temp <t>", "sampling temperature"),
    ("/tokens <n>", "response token limit"),
    ("/schema <path>", "structured reply"),
    ("/exit", "quit"),
];

pub struct Welcome {
    pub fps: f32,
}

impl Welcome {
    pub fn new(fps: f32) -> Self {
        Self { fps }
    }

    fn lines(&self) -> Vec<Line<'static>> {
        let mut lines = vec![
            Line::styled(
                "◆ rill",
                Style::default()
                    .fg(theme::ACCENT)
                    .add_modifier(Modifier::BOLD),
            ),
            Line::styled(
                format!("v{}", env!("CARGO_PKG_VERSION")),
                Style::default().fg(theme::DIM),
            ),
            Line::default(),
        ];
        lines.extend(COMMANDS.iter().map(|(command, help)| {
            Line::from(vec![
                Span::styled(format!("{command:<16}"), Style::default().fg(theme::USER_LABEL)),
                Span::styled(format!("{help:<22}"), Style::default().fg(theme::FG)),
            ])
        }));
        lines.push(Line::default());
        lines.push(Line::styled(
            format!("{:.0} FPS", self.fps),
            Style::default().fg(theme::DIM),
        ));
        lines
    }
}

impl Component for Welcome {
    fn render(&mut self, frame: &mut Frame, area: Rect) {
        let lines = self.lines();
        let [centered] = Layout::vertical([Constraint::Length(lines.len() as u16)])
            .flex(Flex::Center)
            .areas(area);
        frame.render_widget(
            Paragraph::new(lines).alignment(Alignment::Center),
            centered,
        );
    }
}
