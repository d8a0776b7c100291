//! # MessageList Component
//!
//! Scrollable view of the transcript.
//!
//! ## Responsibilities
//!
//! - Flatten messages into display items (header, rendered lines, separator)
//! - Measure item heights with the line compositor at the current width
//! - Keep the scroll position in items from the bottom, with auto-scroll
//! - Draw the visible window bottom-anchored, clipping the topmost item
//!
//! ## Architecture
//!
//! `MessageList` is a transient component (created each frame) that wraps
//! `&'a mut MessageListState` (persistent state) and the `MessageStore`
//! (props). Per-message display items are cached keyed by the message's
//! version and the width, so an idle transcript costs one comparison per
//! message per frame.

use ratatui::Frame;
use ratatui::buffer::Buffer;
use ratatui::layout::Rect;
use ratatui::style::Style;
use ratatui::widgets::{Scrollbar, ScrollbarOrientation, ScrollbarState, StatefulWidget};

use crate::core::message::{Message, MessageStore};
use crate::tui::component::Component;
use crate::tui::components::message::header_text;
use crate::tui::compositor::{draw_line, measure};
use crate::tui::theme::{self, tone_style};

/// Separators never grow past this many columns.
pub const MAX_SEPARATOR_WIDTH: usize = 200;

/// Items per mouse wheel notch.
pub const WHEEL_STEP: isize = 3;

/// One row group in the flattened transcript.
#[derive(Debug, Clone, PartialEq)]
struct DisplayItem {
    text: String,
    style: Style,
    height: u16,
}

impl DisplayItem {
    fn new(text: String, style: Style, width: u16) -> Self {
        let height = measure(&text, width);
        Self {
            text,
            style,
            height,
        }
    }
}

#[derive(Debug)]
struct CachedMessage {
    version: u64,
    width: u16,
    items: Vec<DisplayItem>,
}

fn build_items(message: &Message, width: u16) -> Vec<DisplayItem> {
    let mut items = Vec::with_capacity(message.lines.len() + 2);
    items.push(DisplayItem::new(
        header_text(message, width),
        Style::default(),
        width,
    ));
    items.extend(
        message
            .lines
            .iter()
            .map(|line| DisplayItem::new(line.text.clone(), tone_style(line.tone), width)),
    );
    items.push(DisplayItem::new(
        "─".repeat((width as usize).min(MAX_SEPARATOR_WIDTH)),
        Style::default().fg(theme::DIVIDER),
        width,
    ));
    items
}

/// Display items per message, rebuilt only for messages whose version or
/// width changed since the last frame.
#[derive(Debug, Default)]
struct LayoutCache {
    generation: Option<u32>,
    messages: Vec<CachedMessage>,
}

impl LayoutCache {
    /// Brings the cache up to date. Returns true if the store was cleared
    /// since the last sync.
    fn sync(&mut self, store: &MessageStore, width: u16) -> bool {
        let cleared = self
            .generation
            .is_some_and(|generation| generation != store.generation());
        if self.generation != Some(store.generation()) {
            self.messages.clear();
            self.generation = Some(store.generation());
        }

        self.messages.truncate(store.len());
        for (i, message) in store.iter().enumerate() {
            let fresh = self
                .messages
                .get(i)
                .is_some_and(|c| c.version == message.version() && c.width == width);
            if fresh {
                continue;
            }
            let cached = CachedMessage {
                version: message.version(),
                width,
                items: build_items(message, width),
            };
            match self.messages.get_mut(i) {
                Some(slot) => *slot = cached,
                None => self.messages.push(cached),
            }
        }
        cleared
    }

    fn items(&self) -> impl Iterator<Item = &DisplayItem> {
        self.messages.iter().flat_map(|m| m.items.iter())
    }
}

/// Layout and scroll state for the message list.
/// Must be persisted in the parent TuiState.
#[derive(Debug)]
pub struct MessageListState {
    /// Items between the bottom of the transcript and the bottom of the pane.
    scroll_offset: usize,
    /// When true, pinned to the newest content.
    auto_scroll: bool,
    total_items: usize,
    visible_items: usize,
    pane_width: u16,
    layout: LayoutCache,
}

impl Default for MessageListState {
    fn default() -> Self {
        Self::new()
    }
}

impl MessageListState {
    pub fn new() -> Self {
        Self {
            scroll_offset: 0,
            auto_scroll: true,
            total_items: 0,
            visible_items: 0,
            pane_width: 0,
            layout: LayoutCache::default(),
        }
    }

    pub fn scroll_offset(&self) -> usize {
        self.scroll_offset
    }

    pub fn auto_scroll(&self) -> bool {
        self.auto_scroll
    }

    pub fn total_items(&self) -> usize {
        self.total_items
    }

    pub fn visible_items(&self) -> usize {
        self.visible_items
    }

    fn max_offset(&self) -> usize {
        self.total_items.saturating_sub(self.visible_items)
    }

    fn clamp(&mut self) {
        self.scroll_offset = self.scroll_offset.min(self.max_offset());
    }

    /// Positive `delta` moves towards older content.
    pub fn scroll(&mut self, delta: isize) {
        self.scroll_offset = if delta >= 0 {
            self.scroll_offset.saturating_add(delta.unsigned_abs())
        } else {
            self.scroll_offset.saturating_sub(delta.unsigned_abs())
        };
        self.clamp();
        self.auto_scroll = self.scroll_offset == 0;
    }

    fn half_page(&self) -> isize {
        (self.visible_items / 2).max(1) as isize
    }

    pub fn page_up(&mut self) {
        self.scroll(self.half_page());
    }

    pub fn page_down(&mut self) {
        self.scroll(-self.half_page());
    }

    pub fn scroll_to_top(&mut self) {
        self.scroll_offset = self.max_offset();
        self.auto_scroll = false;
    }

    pub fn scroll_to_bottom(&mut self) {
        self.scroll_offset = 0;
        self.auto_scroll = true;
    }

    /// Forgets scroll position and cached layout (after a transcript clear).
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// Records this frame's item counts. With auto-scroll the view stays
    /// pinned; without it, items appended below push the offset up by the
    /// same amount so the viewed content stays put.
    pub fn set_metrics(&mut self, total_items: usize, visible_items: usize, width: u16) {
        let appended = total_items.saturating_sub(self.total_items);
        if self.auto_scroll {
            self.scroll_offset = 0;
        } else if width == self.pane_width {
            self.scroll_offset = self.scroll_offset.saturating_add(appended);
        }
        self.total_items = total_items;
        self.visible_items = visible_items;
        self.pane_width = width;
        self.clamp();
    }

    /// Lays out `store` and draws the visible window into `area`; the
    /// rightmost column holds the scrollbar.
    pub fn draw(&mut self, store: &MessageStore, buf: &mut Buffer, area: Rect) {
        if area.width < 2 || area.height == 0 {
            return;
        }
        let text_width = area.width - 1;

        if self.layout.sync(store, text_width) {
            let layout = std::mem::take(&mut self.layout);
            self.reset();
            self.layout = layout;
        }

        let heights: Vec<u16> = self.layout.items().map(|item| item.height).collect();
        let mut fitting = 0;
        let mut used: u32 = 0;
        for &height in heights.iter().rev() {
            used += height as u32;
            if used > area.height as u32 {
                break;
            }
            fitting += 1;
        }
        let visible = if heights.is_empty() { 0 } else { fitting.max(1) };
        self.set_metrics(heights.len(), visible, text_width);

        if heights.is_empty() {
            return;
        }

        let items: Vec<&DisplayItem> = self.layout.items().collect();
        let content_height: u32 = heights.iter().map(|&h| h as u32).sum();
        if content_height <= area.height as u32 {
            // Short transcript: top-aligned
            let mut y = area.y;
            for item in &items {
                let rect = Rect::new(area.x, y, text_width, item.height);
                draw_line(buf, rect, 0, &item.text, item.style);
                y += item.height;
            }
            return;
        }

        let last = items.len() - 1 - self.scroll_offset;
        let mut bottom = area.bottom();
        for item in items[..=last].iter().rev() {
            let room = bottom - area.y;
            if room == 0 {
                break;
            }
            if item.height <= room {
                bottom -= item.height;
                let rect = Rect::new(area.x, bottom, text_width, item.height);
                draw_line(buf, rect, 0, &item.text, item.style);
            } else {
                let rect = Rect::new(area.x, area.y, text_width, room);
                draw_line(buf, rect, item.height - room, &item.text, item.style);
                break;
            }
        }

        let max_offset = self.max_offset();
        if max_offset > 0 {
            let mut scrollbar_state = ScrollbarState::new(max_offset + 1)
                .position(max_offset - self.scroll_offset)
                .viewport_content_length(self.visible_items);
            Scrollbar::new(ScrollbarOrientation::VerticalRight)
                .begin_symbol(None)
                .end_symbol(None)
                .style(Style::default().fg(theme::BORDER))
                .render(area, buf, &mut scrollbar_state);
        }
    }
}

/// Scrollable conversation view component.
/// Created fresh each frame with references to state and data.
pub struct MessageList<'a> {
    pub state: &'a mut MessageListState,
    pub store: &'a MessageStore,
}

impl<'a> MessageList<'a> {
    pub fn new(state: &'a mut MessageListState, store: &'a MessageStore) -> Self {
        Self { state, store }
    }
}

impl Component for MessageList<'_> {
    fn render(&mut self, frame: &mut Frame, area: Rect) {
        self.state.draw(self.store, frame.buffer_mut(), area);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::message::MessageKind;
    use crate::tui::components::message::TranscriptRenderer;

    /// Text columns of row `y`; the last column belongs to the scrollbar.
    fn row(buf: &Buffer, y: u16) -> String {
        (0..buf.area.width - 1)
            .map(|x| buf[(x, y)].symbol().to_string())
            .collect::<String>()
            .trim_end()
            .to_string()
    }

    fn store_with(contents: &[&str]) -> MessageStore {
        let mut store = MessageStore::new();
        for content in contents {
            store.create(MessageKind::Assistant, *content);
        }
        store.render_pending(&mut TranscriptRenderer::new());
        store
    }

    fn state_with(total: usize, visible: usize) -> MessageListState {
        let mut state = MessageListState::new();
        state.set_metrics(total, visible, 40);
        state
    }

    #[test]
    fn test_scroll_stays_in_bounds() {
        let mut state = state_with(50, 10);
        state.scroll(isize::MAX);
        assert_eq!(state.scroll_offset(), 40);
        assert!(!state.auto_scroll());
        state.scroll(isize::MIN);
        assert_eq!(state.scroll_offset(), 0);
        assert!(state.auto_scroll());
    }

    #[test]
    fn test_scroll_when_everything_fits() {
        let mut state = state_with(5, 5);
        state.scroll(3);
        assert_eq!(state.scroll_offset(), 0);
        assert!(state.auto_scroll());
    }

    #[test]
    fn test_manual_scroll_disables_auto() {
        let mut state = state_with(50, 10);
        state.scroll(2);
        assert_eq!(state.scroll_offset(), 2);
        assert!(!state.auto_scroll());
        state.scroll(-2);
        assert!(state.auto_scroll());
    }

    #[test]
    fn test_pages_are_half_the_visible_items() {
        let mut state = state_with(50, 10);
        state.page_up();
        assert_eq!(state.scroll_offset(), 5);
        state.page_down();
        assert_eq!(state.scroll_offset(), 0);
    }

    #[test]
    fn test_top_and_bottom() {
        let mut state = state_with(50, 10);
        state.scroll_to_top();
        assert_eq!(state.scroll_offset(), 40);
        assert!(!state.auto_scroll());
        state.scroll_to_bottom();
        assert_eq!(state.scroll_offset(), 0);
        assert!(state.auto_scroll());
    }

    #[test]
    fn test_append_with_auto_scroll_stays_pinned() {
        let mut state = state_with(50, 10);
        state.set_metrics(53, 10, 40);
        assert_eq!(state.scroll_offset(), 0);
    }

    #[test]
    fn test_append_without_auto_scroll_keeps_view() {
        let mut state = state_with(50, 10);
        state.scroll(4);
        state.set_metrics(53, 10, 40);
        assert_eq!(state.scroll_offset(), 7);
        // A width change re-measures everything: no compensation, just clamp
        state.set_metrics(20, 10, 30);
        assert_eq!(state.scroll_offset(), 7);
        state.set_metrics(12, 10, 30);
        assert_eq!(state.scroll_offset(), 2);
    }

    #[test]
    fn test_reset() {
        let mut state = state_with(50, 10);
        state.scroll(4);
        state.reset();
        assert_eq!(state.scroll_offset(), 0);
        assert!(state.auto_scroll());
        assert_eq!(state.total_items(), 0);
    }

    #[test]
    fn test_short_transcript_draws_from_top() {
        let store = store_with(&["hello"]);
        let area = Rect::new(0, 0, 40, 10);
        let mut buf = Buffer::empty(area);
        let mut state = MessageListState::new();
        state.draw(&store, &mut buf, area);

        assert!(row(&buf, 0).starts_with("◆ ASSISTANT"));
        assert_eq!(row(&buf, 1), "hello");
        assert_eq!(row(&buf, 2), "─".repeat(39));
        assert_eq!(row(&buf, 3), "");
        assert_eq!(state.total_items(), 3);
    }

    #[test]
    fn test_long_transcript_is_bottom_anchored() {
        let contents: Vec<String> = (0..10).map(|i| format!("message {i}")).collect();
        let refs: Vec<&str> = contents.iter().map(String::as_str).collect();
        let store = store_with(&refs);
        let area = Rect::new(0, 0, 40, 8);
        let mut buf = Buffer::empty(area);
        let mut state = MessageListState::new();
        state.draw(&store, &mut buf, area);

        assert_eq!(state.total_items(), 30);
        assert_eq!(state.visible_items(), 8);
        assert_eq!(row(&buf, 7), "─".repeat(39));
        assert_eq!(row(&buf, 6), "message 9");
        // Pinned to the bottom: the thumb sits in the last row of the scrollbar
        assert_eq!(buf[(39, 7)].symbol(), "█");
        assert_ne!(buf[(39, 0)].symbol(), " ");

        // One item up: the newest separator leaves the pane
        state.scroll(1);
        let mut buf = Buffer::empty(area);
        state.draw(&store, &mut buf, area);
        assert_eq!(row(&buf, 7), "message 9");
    }

    #[test]
    fn test_tall_top_item_is_clipped() {
        let store = store_with(&["one two three four five six seven"]);
        // Width 10 (9 for text): the body wraps to 4 rows
        let area = Rect::new(0, 0, 10, 3);
        let mut buf = Buffer::empty(area);
        let mut state = MessageListState::new();
        state.draw(&store, &mut buf, area);

        // Rows: "one two", "three", "four five", "six seven". Bottom-anchored,
        // only the last two body rows fit above the separator
        assert_eq!(row(&buf, 2), "─".repeat(9));
        assert_eq!(row(&buf, 1), "six seven");
        assert_eq!(row(&buf, 0), "four five");
        assert_ne!(buf[(9, 2)].symbol(), " ");
    }

    #[test]
    fn test_no_scrollbar_when_everything_fits() {
        let store = store_with(&["hello"]);
        let area = Rect::new(0, 0, 20, 10);
        let mut buf = Buffer::empty(area);
        let mut state = MessageListState::new();
        state.draw(&store, &mut buf, area);

        assert!((0..10).all(|y| buf[(19, y)].symbol() == " "));
    }

    #[test]
    fn test_clear_resets_scroll() {
        let mut store = store_with(&["a", "b", "c", "d", "e"]);
        let area = Rect::new(0, 0, 20, 4);
        let mut buf = Buffer::empty(area);
        let mut state = MessageListState::new();
        state.draw(&store, &mut buf, area);
        state.scroll(3);
        assert!(!state.auto_scroll());

        store.clear();
        state.draw(&store, &mut buf, area);
        assert!(state.auto_scroll());
        assert_eq!(state.total_items(), 0);
    }

    #[test]
    fn test_cache_follows_versions() {
        let mut store = store_with(&["a"]);
        let area = Rect::new(0, 0, 20, 10);
        let mut state = MessageListState::new();
        state.draw(&store, &mut Buffer::empty(area), area);
        assert_eq!(state.total_items(), 3);

        let id = store.last_id().unwrap();
        store.get_mut(id).unwrap().content = String::from("a\nb");
        store.get_mut(id).unwrap().needs_style_pass = true;
        store.render_pending(&mut TranscriptRenderer::new());
        state.draw(&store, &mut Buffer::empty(area), area);
        assert_eq!(state.total_items(), 4);
    }
}
