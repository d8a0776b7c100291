//! Colour palette shared by every component.

use ratatui::style::{Color, Modifier, Style};

use crate::core::message::{LineTone, MessageKind};

const fn hex(value: u32) -> Color {
    Color::Rgb((value >> 16) as u8, (value >> 8) as u8, value as u8)
}

pub const FG: Color = hex(0xE8E8E8);
pub const ACCENT: Color = hex(0x00AAFF);
pub const TIMESTAMP: Color = hex(0x666666);
pub const DIM: Color = hex(0x888888);
pub const DIVIDER: Color = hex(0x2D2D2D);
pub const BORDER: Color = hex(0x404040);

pub const USER_LABEL: Color = hex(0x5DADE2);
pub const ASSISTANT_LABEL: Color = hex(0x58D68D);
pub const SYSTEM_LABEL: Color = hex(0xF39C12);
pub const TOOL_LABEL: Color = hex(0xE74C3C);
pub const RESPONSE_LABEL: Color = hex(0x9B59B6);

pub const JSON_KEY: Color = hex(0x66D9EF);
pub const JSON_STRING: Color = hex(0xA6E22E);
pub const JSON_NUMBER: Color = hex(0xAE81FF);
pub const JSON_BOOLEAN: Color = hex(0xF92672);
pub const JSON_NULL: Color = hex(0x75715E);
pub const JSON_BRACE: Color = hex(0xF8F8F2);

pub const TOOL: Color = hex(0xBD10E0);
pub const ERROR: Color = hex(0xD0021B);
pub const SUCCESS: Color = hex(0x50E3C2);

pub fn label_color(kind: &MessageKind) -> Color {
    match kind {
        MessageKind::User => USER_LABEL,
        MessageKind::Assistant => ASSISTANT_LABEL,
        MessageKind::System => SYSTEM_LABEL,
        MessageKind::ToolCall { .. } => TOOL_LABEL,
        MessageKind::ToolResponse { .. } => RESPONSE_LABEL,
    }
}

/// Base style a line starts from before its embedded escapes apply.
pub fn tone_style(tone: LineTone) -> Style {
    let style = Style::default();
    match tone {
        LineTone::Body | LineTone::Plain => style.fg(FG),
        LineTone::ToolPending => style.fg(TOOL),
        LineTone::ToolDone => style.fg(SUCCESS),
        LineTone::Spinner | LineTone::Cursor => style.fg(ACCENT),
        LineTone::JsonHeader => style.fg(ACCENT).add_modifier(Modifier::BOLD),
        LineTone::JsonKey => style.fg(JSON_KEY),
        LineTone::JsonValue => style.fg(JSON_STRING),
        LineTone::JsonPunct => style.fg(JSON_BRACE),
    }
}

/// SGR parameters selecting `color` as foreground (`layer` 38) or
/// background (48). Only RGB and indexed colours have a form here.
pub fn sgr_color(color: Color, layer: u8) -> Option<String> {
    match color {
        Color::Rgb(r, g, b) => Some(format!("{layer};2;{r};{g};{b}")),
        Color::Indexed(n) => Some(format!("{layer};5;{n}")),
        _ => None,
    }
}

/// Wraps `text` in a foreground colour escape followed by a reset.
pub fn paint(text: &str, color: Color) -> String {
    match sgr_color(color, 38) {
        Some(code) => format!("\x1b[{code}m{text}\x1b[0m"),
        None => text.to_string(),
    }
}
