use ratatui::Frame;
use ratatui::layout::{Constraint, Layout, Rect};

use crate::core::state::App;
use crate::tui::TuiState;
use crate::tui::component::Component;
use crate::tui::components::{MessageList, SIDEBAR_WIDTH, Sidebar, Welcome};

/// Narrowest chat pane that still gets a sidebar next to it.
const MIN_CHAT_WIDTH: u16 = 40;

/// Chat pane, optional sidebar, and the input bar below both.
pub fn draw_ui(frame: &mut Frame, app: &App, tui: &mut TuiState) {
    let streaming = app.is_streaming();
    tui.input_box.busy_frame = streaming.then(|| tui.animation.loading());

    let input_height = tui.input_box.calculate_height(frame.area().width);
    let [body, input_area] =
        Layout::vertical([Constraint::Min(1), Constraint::Length(input_height)])
            .areas(frame.area());
    let (chat_area, sidebar_area) = split_body(body, app.show_sidebar);

    if app.store.is_empty() {
        Welcome::new(app.frame_rate).render(frame, chat_area);
    } else {
        MessageList::new(&mut tui.message_list, &app.store).render(frame, chat_area);
    }

    if let Some(area) = sidebar_area {
        let spinner = streaming.then(|| tui.animation.spinner());
        Sidebar::from_app(app, tui.message_list.total_items(), spinner).render(frame, area);
    }

    tui.input_box.render(frame, input_area);
}

fn split_body(body: Rect, show_sidebar: bool) -> (Rect, Option<Rect>) {
    if !show_sidebar || body.width < MIN_CHAT_WIDTH + SIDEBAR_WIDTH {
        return (body, None);
    }
    let [chat, sidebar] =
        Layout::horizontal([Constraint::Min(MIN_CHAT_WIDTH), Constraint::Length(SIDEBAR_WIDTH)])
            .areas(body);
    (chat, Some(sidebar))
}
