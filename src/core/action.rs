//! # Actions
//!
//! Everything the user can make happen becomes an `Action`. Pressing Enter
//! on a line of text is `Action::Submit(text)`; pressing Esc while a reply
//! streams is `Action::CancelGeneration`.
//!
//! `update()` applies an action to the [`App`] and returns an [`Effect`]
//! for the adapter (the TUI) to carry out: quitting, resetting the scroll
//! view after a clear, toggling the sidebar.
//!
//! ```text
//! App + Action  →  update()  →  Effect
//! ```
//!
//! Slash commands are parsed into [`Command`] first, so parsing can be
//! tested without an `App`.

use log::{info, warn};
use std::fs;

use super::config::{MAX_TOKENS_RANGE, TEMPERATURE_RANGE};
use super::message::MessageKind;
use super::state::App;

pub const SCHEMA_NOTE: &str = "\n⚡ [Using structured schema]";
pub const SCHEMA_LOAD_FAILED: &str = "● Failed to load schema file";

pub const HELP_TEXT: &str = "◆ COMMANDS\n\
    ▶ /help              Show this help\n\
    ▶ /clear             Clear the chat history\n\
    ▶ /new               Start a fresh session with default settings\n\
    ▶ /tools             Toggle tool calling\n\
    ▶ /sidebar           Toggle the sidebar (F1)\n\
    ▶ /status            Show session status\n\
    ▶ /temp <0.0-2.0>    Set the sampling temperature\n\
    ▶ /tokens <1-65536>  Set the response token limit\n\
    ▶ /exit              Quit\n\
    \n\
    ◆ PROMPTS\n\
    ▶ /schema <path>     Anywhere in a message: answer with the JSON schema in <path>\n\
    \n\
    ◆ KEYS\n\
    ▶ Enter send · Alt+Enter newline · Esc cancel · PgUp/PgDn scroll · Ctrl+C quit";

#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    /// A line submitted from the input box: a command or a prompt.
    Submit(String),
    CancelGeneration,
    ToggleSidebar,
    Quit,
}

/// What the adapter must do after an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    None,
    Quit,
    /// The transcript was cleared; the scroll view must start over.
    ResetView,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Help,
    Clear,
    New,
    Tools,
    Sidebar,
    Status,
    /// `Err` holds the raw argument when it is not a valid temperature.
    Temperature(Result<f32, String>),
    Tokens(Result<u32, String>),
    Exit,
    Unknown(String),
}

impl Command {
    /// Parses a `/command`. Returns `None` for text that is not a command.
    pub fn parse(input: &str) -> Option<Command> {
        let trimmed = input.trim();
        let rest = trimmed.strip_prefix('/')?;
        let (name, arg) = match rest.split_once(char::is_whitespace) {
            Some((name, arg)) => (name, arg.trim()),
            None => (rest, ""),
        };

        let command = match name {
            "help" => Command::Help,
            "clear" => Command::Clear,
            "new" => Command::New,
            "tools" => Command::Tools,
            "sidebar" => Command::Sidebar,
            "status" => Command::Status,
            "exit" | "quit" => Command::Exit,
            "temp" => Command::Temperature(
                arg.parse::<f32>()
                    .ok()
                    .filter(|t| TEMPERATURE_RANGE.contains(t))
                    .ok_or_else(|| arg.to_string()),
            ),
            "tokens" => Command::Tokens(
                arg.parse::<u32>()
                    .ok()
                    .filter(|n| MAX_TOKENS_RANGE.contains(n))
                    .ok_or_else(|| arg.to_string()),
            ),
            _ => Command::Unknown(trimmed.to_string()),
        };
        Some(command)
    }
}

/// A prompt with an optional `/schema <path>` directive pulled out.
#[derive(Debug, Clone, PartialEq)]
pub struct SchemaDirective {
    /// The prompt with the directive removed.
    pub prompt: String,
    pub path: String,
}

/// Finds `/schema <path>` anywhere in `input`.
pub fn parse_schema_directive(input: &str) -> Option<SchemaDirective> {
    let start = input.find("/schema ")?;
    let after = &input[start + "/schema ".len()..];
    let after = after.trim_start();
    let path_len = after.find(char::is_whitespace).unwrap_or(after.len());
    let path = &after[..path_len];
    if path.is_empty() {
        return None;
    }
    let end = input.len() - after.len() + path_len;

    let prompt = format!("{}{}", &input[..start], &input[end..]);
    let prompt = prompt.split_whitespace().collect::<Vec<_>>().join(" ");
    Some(SchemaDirective {
        prompt,
        path: path.to_string(),
    })
}

pub fn update(app: &mut App, action: Action) -> Effect {
    match action {
        Action::Submit(text) => submit(app, text),
        Action::CancelGeneration => {
            app.cancel_generation();
            Effect::None
        }
        Action::ToggleSidebar => {
            toggle_sidebar(app);
            Effect::None
        }
        Action::Quit => Effect::Quit,
    }
}

fn submit(app: &mut App, text: String) -> Effect {
    let text = text.trim().to_string();
    if text.is_empty() {
        return Effect::None;
    }

    if !text.contains("/schema ")
        && let Some(command) = Command::parse(&text)
    {
        return run_command(app, command);
    }

    if app.is_streaming() {
        app.status_message = String::from("Busy");
        return Effect::None;
    }

    let (prompt, schema) = match parse_schema_directive(&text) {
        Some(directive) => match load_schema(&directive.path) {
            Some(schema) => (directive.prompt, Some(schema)),
            None => {
                app.add_system(SCHEMA_LOAD_FAILED);
                return Effect::None;
            }
        },
        None => (text, None),
    };

    let shown = if schema.is_some() {
        format!("{prompt}{SCHEMA_NOTE}")
    } else {
        prompt.clone()
    };
    app.add_message(MessageKind::User, shown);

    if let Err(e) = app.start_generation(prompt, schema) {
        warn!("Generation did not start: {}", e);
        app.add_system(format!("● Error: {e}"));
    }
    Effect::None
}

fn load_schema(path: &str) -> Option<serde_json::Value> {
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) => {
            warn!("Failed to read schema file {}: {}", path, e);
            return None;
        }
    };
    match serde_json::from_str(&contents) {
        Ok(schema) => {
            info!("Loaded structured output schema from {}", path);
            Some(schema)
        }
        Err(e) => {
            warn!("Schema file {} is not valid JSON: {}", path, e);
            None
        }
    }
}

fn toggle_sidebar(app: &mut App) {
    app.show_sidebar = !app.show_sidebar;
    app.status_message = if app.show_sidebar {
        String::from("Sidebar shown")
    } else {
        String::from("Sidebar hidden")
    };
}

fn run_command(app: &mut App, command: Command) -> Effect {
    info!("Command: {:?}", command);
    match command {
        Command::Help => {
            app.add_system(HELP_TEXT);
        }
        Command::Clear => {
            app.clear_transcript();
            app.add_system("◆ Chat history cleared successfully");
            return Effect::ResetView;
        }
        Command::New => {
            app.clear_transcript();
            app.params = app.defaults.clone();
            app.add_system("◆ New session started successfully");
            return Effect::ResetView;
        }
        Command::Tools => {
            app.params.tools_enabled = !app.params.tools_enabled;
            app.add_system(if app.params.tools_enabled {
                "⚡ Tools enabled"
            } else {
                "⚡ Tools disabled"
            });
        }
        Command::Sidebar => toggle_sidebar(app),
        Command::Status => {
            let status = status_report(app);
            app.add_system(status);
        }
        Command::Temperature(Ok(value)) => {
            app.params.temperature = value;
            app.add_system(format!("▶ Temperature set to {value:.1}"));
        }
        Command::Temperature(Err(_)) => {
            app.add_system("● Temperature must be 0.0-2.0");
        }
        Command::Tokens(Ok(value)) => {
            app.params.max_tokens = value;
            app.add_system(format!("▶ Max tokens set to {value}"));
        }
        Command::Tokens(Err(_)) => {
            app.add_system("● Tokens must be 1-65536");
        }
        Command::Exit => return Effect::Quit,
        Command::Unknown(input) => {
            app.add_system(format!("● Unknown command: {input}"));
        }
    }
    Effect::None
}

fn status_report(app: &App) -> String {
    let streaming = if app.is_streaming() { "Active" } else { "Idle" };
    let tools = if app.params.tools_enabled {
        format!("Enabled ({} available)", app.tool_count)
    } else {
        String::from("Disabled")
    };
    format!(
        "◆ SYSTEM STATUS\n\
         ▶ Backend: {}\n\
         ▶ Model: {}\n\
         ▶ Temperature: {:.1}\n\
         ▶ Max tokens: {}\n\
         ▶ Tools: {}\n\
         ▶ Streaming: {}\n\
         ▶ Messages: {}\n\
         ▶ FPS: {:.0}",
        app.backend.name(),
        app.params.model,
        app.params.temperature,
        app.params.max_tokens,
        tools,
        streaming,
        app.store.len(),
        app.frame_rate,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::test_app;

    fn last_content(app: &App) -> String {
        app.store.iter().last().map(|m| m.content.clone()).unwrap_or_default()
    }

    #[test]
    fn test_parse_commands() {
        assert_eq!(Command::parse("/help"), Some(Command::Help));
        assert_eq!(Command::parse("  /clear  "), Some(Command::Clear));
        assert_eq!(Command::parse("/temp 0.5"), Some(Command::Temperature(Ok(0.5))));
        assert_eq!(
            Command::parse("/temp 3"),
            Some(Command::Temperature(Err("3".into())))
        );
        assert_eq!(Command::parse("/tokens 100"), Some(Command::Tokens(Ok(100))));
        assert_eq!(
            Command::parse("/tokens 0"),
            Some(Command::Tokens(Err("0".into())))
        );
        assert_eq!(
            Command::parse("/bogus arg"),
            Some(Command::Unknown("/bogus arg".into()))
        );
        assert_eq!(Command::parse("hello"), None);
    }

    #[test]
    fn test_parse_schema_directive() {
        let directive = parse_schema_directive("List fruits /schema fruit.json please").unwrap();
        assert_eq!(directive.path, "fruit.json");
        assert_eq!(directive.prompt, "List fruits please");

        let leading = parse_schema_directive("/schema out.json name three colors").unwrap();
        assert_eq!(leading.path, "out.json");
        assert_eq!(leading.prompt, "name three colors");

        assert_eq!(parse_schema_directive("no directive here"), None);
        assert_eq!(parse_schema_directive("dangling /schema "), None);
    }

    #[test]
    fn test_submit_starts_generation() {
        let (mut app, backend) = test_app();
        assert_eq!(update(&mut app, Action::Submit("Hi".into())), Effect::None);

        let kinds: Vec<_> = app.store.iter().map(|m| m.kind.clone()).collect();
        assert_eq!(kinds, vec![MessageKind::User, MessageKind::Assistant]);
        assert!(app.is_streaming());
        assert_eq!(backend.requests()[0].prompt, "Hi");
    }

    #[test]
    fn test_submit_while_streaming_is_ignored() {
        let (mut app, backend) = test_app();
        update(&mut app, Action::Submit("one".into()));
        update(&mut app, Action::Submit("two".into()));
        assert_eq!(backend.requests().len(), 1);
        assert_eq!(app.store.len(), 2);
    }

    #[test]
    fn test_start_failure_adds_notice() {
        let (mut app, _) = test_app();
        app.backend = std::sync::Arc::new(crate::test_support::ManualBackend::refusing());
        update(&mut app, Action::Submit("Hi".into()));
        assert!(!app.is_streaming());
        assert!(last_content(&app).starts_with("● Error:"));
    }

    #[test]
    fn test_clear_resets_view() {
        let (mut app, _) = test_app();
        app.add_message(MessageKind::User, "old");
        assert_eq!(update(&mut app, Action::Submit("/clear".into())), Effect::ResetView);
        assert_eq!(app.store.len(), 1);
        assert_eq!(last_content(&app), "◆ Chat history cleared successfully");
    }

    #[test]
    fn test_new_restores_default_params() {
        let (mut app, _) = test_app();
        update(&mut app, Action::Submit("/temp 1.5".into()));
        assert_eq!(last_content(&app), "▶ Temperature set to 1.5");
        assert_eq!(app.params.temperature, 1.5);

        assert_eq!(update(&mut app, Action::Submit("/new".into())), Effect::ResetView);
        assert_eq!(app.params.temperature, app.defaults.temperature);
        assert_eq!(last_content(&app), "◆ New session started successfully");
    }

    #[test]
    fn test_invalid_settings_are_rejected() {
        let (mut app, _) = test_app();
        let before = app.params.clone();
        update(&mut app, Action::Submit("/temp hot".into()));
        assert_eq!(last_content(&app), "● Temperature must be 0.0-2.0");
        update(&mut app, Action::Submit("/tokens 70000".into()));
        assert_eq!(last_content(&app), "● Tokens must be 1-65536");
        assert_eq!(app.params, before);
    }

    #[test]
    fn test_tools_toggle() {
        let (mut app, _) = test_app();
        update(&mut app, Action::Submit("/tools".into()));
        assert_eq!(last_content(&app), "⚡ Tools disabled");
        assert!(!app.params.tools_enabled);
        update(&mut app, Action::Submit("/tools".into()));
        assert_eq!(last_content(&app), "⚡ Tools enabled");
    }

    #[test]
    fn test_unknown_command() {
        let (mut app, _) = test_app();
        update(&mut app, Action::Submit("/frobnicate".into()));
        assert_eq!(last_content(&app), "● Unknown command: /frobnicate");
    }

    #[test]
    fn test_status_report() {
        let (mut app, _) = test_app();
        update(&mut app, Action::Submit("/status".into()));
        let status = last_content(&app);
        assert!(status.starts_with("◆ SYSTEM STATUS"));
        assert!(status.contains("▶ Model: test-model"));
        assert!(status.contains("▶ Streaming: Idle"));
    }

    #[test]
    fn test_exit_and_sidebar() {
        let (mut app, _) = test_app();
        assert_eq!(update(&mut app, Action::Submit("/exit".into())), Effect::Quit);
        assert!(app.show_sidebar);
        update(&mut app, Action::Submit("/sidebar".into()));
        assert!(!app.show_sidebar);
        update(&mut app, Action::ToggleSidebar);
        assert!(app.show_sidebar);
    }

    #[test]
    fn test_missing_schema_file() {
        let (mut app, backend) = test_app();
        update(
            &mut app,
            Action::Submit("colors /schema /definitely/not/here.json".into()),
        );
        assert_eq!(last_content(&app), SCHEMA_LOAD_FAILED);
        assert!(backend.requests().is_empty());
    }

    #[test]
    fn test_schema_directive_loads_file() {
        let path = std::env::temp_dir().join(format!("rill-schema-{}.json", std::process::id()));
        fs::write(&path, r#"{"type":"object","properties":{"name":{"type":"string"}}}"#).unwrap();

        let (mut app, backend) = test_app();
        update(
            &mut app,
            Action::Submit(format!("Pick a name /schema {}", path.display())),
        );
        fs::remove_file(&path).ok();

        let user = app.store.iter().next().unwrap();
        assert_eq!(user.content, format!("Pick a name{SCHEMA_NOTE}"));
        let request = &backend.requests()[0];
        assert_eq!(request.prompt, "Pick a name");
        assert_eq!(request.params.schema.as_ref().unwrap()["type"], "object");
    }
}
