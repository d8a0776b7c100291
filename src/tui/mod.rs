//! # TUI Adapter
//!
//! The ratatui-specific layer. Handles terminal I/O, renders the UI,
//! and translates keyboard events into core::Action values.
//!
//! This is the only module that knows about ratatui and crossterm.
//!
//! ## Frame Loop
//!
//! One thread, one cooperative loop at the target frame rate:
//!
//! 1. poll input for whatever is left of the frame budget
//! 2. [`tick`]: drain the update queue, advance animations, run due render
//!    passes, refresh status and FPS
//! 3. lay out and draw
//!
//! Producers never touch the store; they enqueue, and step 2 applies. The
//! loop never blocks on a producer.
//!
//! A `SteadyBlock` cursor style is used instead of a blinking cursor because
//! ratatui's `set_cursor_position` resets the terminal's blink timer on every
//! `draw()` call, making blinking cursors appear erratic during continuous redraws.

pub mod animation;
pub mod component;
pub mod components;
pub mod compositor;
pub mod event;
pub mod markdown;
pub mod theme;
mod ui;

use log::{debug, info, warn};
use std::io::{self, stdout};
use std::time::Instant;

use crossterm::cursor::{SetCursorStyle, Show};
use crossterm::event::{
    DisableBracketedPaste, DisableMouseCapture, EnableBracketedPaste, EnableMouseCapture,
    KeyboardEnhancementFlags, PopKeyboardEnhancementFlags, PushKeyboardEnhancementFlags,
};
use crossterm::execute;
use ratatui::DefaultTerminal;

use crate::core::action::{Action, Effect, update};
use crate::core::state::App;
use crate::tui::animation::{Animation, FrameClock};
use crate::tui::component::EventHandler;
use crate::tui::components::{
    Indicator, InputBox, InputEvent, MessageListState, TranscriptRenderer, WHEEL_STEP,
};
use crate::tui::event::{TuiEvent, poll_event};

/// TUI-specific presentation state (not part of core business logic)
pub struct TuiState {
    pub message_list: MessageListState,
    pub input_box: InputBox,
    pub renderer: TranscriptRenderer,
    pub animation: Animation,
    pub clock: FrameClock,
}

impl TuiState {
    pub fn new(target_fps: u32, now: Instant) -> Self {
        Self {
            message_list: MessageListState::new(),
            input_box: InputBox::new(),
            renderer: TranscriptRenderer::new(),
            animation: Animation::new(now),
            clock: FrameClock::new(target_fps, now),
        }
    }
}

/// Everything a frame does between input and drawing.
pub fn tick(app: &mut App, tui: &mut TuiState, now: Instant) {
    let animated = tui.animation.advance(now);
    tui.renderer.indicator = Indicator {
        waiting: app.session.is_waiting(),
        spinner_frame: tui.animation.ticks() as usize,
        cursor_visible: tui.animation.cursor_visible(),
    };

    let applied = app.queue.drain(&mut app.store, &mut tui.renderer);
    if applied > 0 {
        debug!("Applied {} update(s)", applied);
    }
    if animated {
        app.store.mark_streaming_dirty();
    }
    app.store.render_pending(&mut tui.renderer);

    app.sync_status();
    app.frame_rate = tui.clock.fps();
}

/// Applies one input event. Editing is ignored while a reply streams; the
/// input bar shows the generating notice instead.
pub fn handle_event(app: &mut App, tui: &mut TuiState, event: TuiEvent) -> Effect {
    let list = &mut tui.message_list;
    let effect = match event {
        TuiEvent::Quit => update(app, Action::Quit),
        TuiEvent::Cancel if app.is_streaming() => update(app, Action::CancelGeneration),
        TuiEvent::Cancel | TuiEvent::Resize => Effect::None,
        TuiEvent::ToggleSidebar => update(app, Action::ToggleSidebar),
        TuiEvent::ScrollUp => scrolled(|| list.scroll(1)),
        TuiEvent::ScrollDown => scrolled(|| list.scroll(-1)),
        TuiEvent::WheelUp => scrolled(|| list.scroll(WHEEL_STEP)),
        TuiEvent::WheelDown => scrolled(|| list.scroll(-WHEEL_STEP)),
        TuiEvent::ScrollPageUp => scrolled(|| list.page_up()),
        TuiEvent::ScrollPageDown => scrolled(|| list.page_down()),
        TuiEvent::ScrollToTop => scrolled(|| list.scroll_to_top()),
        TuiEvent::ScrollToBottom => scrolled(|| list.scroll_to_bottom()),
        _ if app.is_streaming() => Effect::None,
        editing => match tui.input_box.handle_event(&editing) {
            Some(InputEvent::Submit(text)) => update(app, Action::Submit(text)),
            Some(InputEvent::ContentChanged) | None => Effect::None,
        },
    };
    if effect == Effect::ResetView {
        tui.message_list.reset();
    }
    effect
}

fn scrolled(scroll: impl FnOnce()) -> Effect {
    scroll();
    Effect::None
}

struct TerminalModeGuard;

impl TerminalModeGuard {
    fn new() -> io::Result<Self> {
        // The keyboard protocol is ignored by terminals that don't support it
        execute!(
            stdout(),
            EnableMouseCapture,
            EnableBracketedPaste,
            Show,
            SetCursorStyle::SteadyBlock,
            PushKeyboardEnhancementFlags(
                KeyboardEnhancementFlags::DISAMBIGUATE_ESCAPE_CODES
                    | KeyboardEnhancementFlags::REPORT_EVENT_TYPES
            )
        )?;
        info!(
            "Terminal modes enabled (mouse, bracketed paste, steady block cursor, keyboard enhancement)"
        );
        Ok(Self)
    }
}

impl Drop for TerminalModeGuard {
    fn drop(&mut self) {
        let _ = execute!(
            stdout(),
            PopKeyboardEnhancementFlags,
            DisableMouseCapture,
            DisableBracketedPaste,
            SetCursorStyle::DefaultUserShape
        );
    }
}

/// Runs the TUI until the user quits. The terminal is restored on every
/// exit path.
pub fn run(mut app: App, target_fps: u32) -> io::Result<()> {
    let mut terminal = ratatui::try_init()?;
    let guard = match TerminalModeGuard::new() {
        Ok(guard) => Some(guard),
        Err(e) => {
            warn!("Terminal modes unavailable: {}", e);
            None
        }
    };

    let result = frame_loop(&mut terminal, &mut app, target_fps);

    drop(guard);
    ratatui::restore();
    if app.is_streaming() {
        app.cancel_generation();
    }
    info!("TUI exited");
    result
}

fn frame_loop(terminal: &mut DefaultTerminal, app: &mut App, target_fps: u32) -> io::Result<()> {
    let mut tui = TuiState::new(target_fps, Instant::now());
    info!("Frame loop started at {} FPS target", target_fps);

    loop {
        tui.clock.begin_frame(Instant::now());

        // Input for the rest of the frame budget; at least one poll per frame
        loop {
            let budget = tui.clock.remaining(Instant::now());
            if let Some(event) = poll_event(budget)?
                && handle_event(app, &mut tui, event) == Effect::Quit
            {
                return Ok(());
            }
            if tui.clock.remaining(Instant::now()).is_zero() {
                break;
            }
        }

        tick(app, &mut tui, Instant::now());
        terminal.draw(|f| ui::draw_ui(f, app, &mut tui))?;
    }
}
