//! End-to-end: backend thread → session → queue → store → renderer →
//! compositor, driven the way the frame loop drives it.

use ratatui::buffer::Buffer;
use ratatui::layout::Rect;
use ratatui::style::{Modifier, Style};
use rill::core::message::{MessageId, MessageKind, MessageStore};
use rill::core::queue::{PendingUpdate, UpdateQueue};
use rill::core::state::App;
use rill::core::streaming::StreamingSession;
use rill::inference::{GenerationParams, ScriptedBackend};
use rill::tui::components::TranscriptRenderer;
use rill::tui::compositor::draw_line;
use rill::tui::{TuiState, tick};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

fn app_with(backend: ScriptedBackend) -> App {
    let queue = Arc::new(UpdateQueue::new());
    let session = Arc::new(StreamingSession::new(Arc::clone(&queue)));
    App::new(
        Arc::new(backend),
        queue,
        session,
        GenerationParams::default(),
    )
}

/// Ticks until the target message stops streaming.
fn run_until_finished(app: &mut App, tui: &mut TuiState, target: MessageId) {
    let deadline = Instant::now() + Duration::from_secs(5);
    loop {
        app.queue.wait_timeout(Duration::from_millis(10));
        tick(app, tui, Instant::now());
        if app.store.get(target).is_some_and(|m| !m.is_streaming) {
            return;
        }
        assert!(Instant::now() < deadline, "stream did not finish in time");
    }
}

#[test]
fn test_chunks_accumulate_into_final_message() {
    let mut app = app_with(
        ScriptedBackend::new()
            .with_reply(["Hel", "lo"])
            .with_delay(Duration::ZERO),
    );
    let mut tui = TuiState::new(60, Instant::now());

    let target = app.start_generation(String::from("Hi"), None).unwrap();
    run_until_finished(&mut app, &mut tui, target);

    let assistant: Vec<_> = app
        .store
        .iter()
        .filter(|m| m.kind == MessageKind::Assistant)
        .collect();
    assert_eq!(assistant.len(), 1);
    assert_eq!(assistant[0].content, "Hello");
    assert!(!assistant[0].is_streaming);
    let lines: Vec<&str> = assistant[0].lines.iter().map(|l| l.text.as_str()).collect();
    assert_eq!(lines, vec!["Hello"]);
    assert!(!app.is_streaming());
    assert_eq!(app.status_message, "Ready");
}

#[test]
fn test_echo_reply_streams_word_by_word() {
    let mut app = app_with(ScriptedBackend::new().with_delay(Duration::from_millis(1)));
    let mut tui = TuiState::new(60, Instant::now());

    let target = app
        .start_generation(String::from("testing the pipe"), None)
        .unwrap();
    run_until_finished(&mut app, &mut tui, target);

    let message = app.store.get(target).unwrap();
    assert_eq!(message.content, "You said: testing the pipe");
}

#[test]
fn test_failure_shows_reason() {
    let mut app = app_with(
        ScriptedBackend::new()
            .with_failure("model unavailable")
            .with_delay(Duration::ZERO),
    );
    let mut tui = TuiState::new(60, Instant::now());

    let target = app.start_generation(String::from("Hi"), None).unwrap();
    run_until_finished(&mut app, &mut tui, target);

    let message = app.store.get(target).unwrap();
    assert_eq!(message.content, "● Error: model unavailable");
}

#[test]
fn test_cancel_keeps_partial_reply() {
    let chunks: Vec<String> = (0..200).map(|i| format!("w{i} ")).collect();
    let mut app = app_with(
        ScriptedBackend::new()
            .with_reply(chunks)
            .with_delay(Duration::from_millis(5)),
    );
    let mut tui = TuiState::new(60, Instant::now());
    let target = app.start_generation(String::from("Hi"), None).unwrap();

    // Let a few chunks through, then cancel
    let deadline = Instant::now() + Duration::from_secs(5);
    while app.store.get(target).is_some_and(|m| m.content.is_empty()) {
        assert!(Instant::now() < deadline, "no chunk arrived");
        app.queue.wait_timeout(Duration::from_millis(10));
        tick(&mut app, &mut tui, Instant::now());
    }
    assert!(app.cancel_generation());
    run_until_finished(&mut app, &mut tui, target);

    let message = app.store.get(target).unwrap();
    assert!(message.content.starts_with("w0 "));
    assert!(!message.content.contains("w199"));
    assert!(
        app.store
            .iter()
            .any(|m| m.content == rill::core::state::CANCELLED_NOTICE)
    );
}

#[test]
fn test_concurrent_producers_apply_every_update() {
    const PRODUCERS: usize = 4;
    const PER_PRODUCER: usize = 500;

    let queue = Arc::new(UpdateQueue::new());
    let mut store = MessageStore::new();
    let targets: Vec<MessageId> = (0..PRODUCERS)
        .map(|_| store.create(MessageKind::Assistant, ""))
        .collect();

    let handles: Vec<_> = targets
        .iter()
        .map(|&target| {
            let queue = Arc::clone(&queue);
            thread::spawn(move || {
                for i in 0..PER_PRODUCER {
                    queue.enqueue(PendingUpdate::content(target, format!("update {i}"), true));
                }
            })
        })
        .collect();

    let mut renderer = TranscriptRenderer::new();
    let mut applied = 0;
    let deadline = Instant::now() + Duration::from_secs(10);
    while applied < PRODUCERS * PER_PRODUCER {
        queue.wait_timeout(Duration::from_millis(5));
        applied += queue.drain(&mut store, &mut renderer);
        assert!(Instant::now() < deadline, "only {applied} updates applied");
    }
    for handle in handles {
        handle.join().unwrap();
    }
    applied += queue.drain(&mut store, &mut renderer);

    assert_eq!(applied, PRODUCERS * PER_PRODUCER);
    for target in targets {
        // Per-producer order is preserved: the last write wins
        assert_eq!(store.get(target).unwrap().content, "update 499");
    }
}

#[test]
fn test_rendered_markdown_reaches_the_cells() {
    let mut store = MessageStore::new();
    let id = store.create(MessageKind::Assistant, "**bold** text\nline2");
    store.render_pending(&mut TranscriptRenderer::new());
    let message = store.get(id).unwrap();
    assert_eq!(message.lines.len(), 2);

    let area = Rect::new(0, 0, 20, 2);
    let mut buf = Buffer::empty(area);
    for (y, line) in message.lines.iter().enumerate() {
        let row = Rect::new(0, y as u16, 20, 1);
        draw_line(&mut buf, row, 0, &line.text, Style::default());
    }

    let first: String = (0..9).map(|x| buf[(x, 0)].symbol().to_string()).collect();
    assert_eq!(first, "bold text");
    for x in 0..4 {
        assert!(buf[(x, 0)].modifier.contains(Modifier::BOLD));
    }
    assert!(!buf[(5, 0)].modifier.contains(Modifier::BOLD));
    assert_eq!(buf[(0, 1)].symbol(), "l");
}
