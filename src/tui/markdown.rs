//! Markdown → ANSI text renderer.
//!
//! Thin wrapper around `pulldown_cmark` that writes markdown events as text
//! carrying SGR escapes, one output line per display line. The line
//! compositor interprets the escapes at draw time, so the result can be
//! cached per message and re-wrapped at any width. Headings, bold, italic,
//! strikethrough, inline code, fenced code blocks (syntect highlighted),
//! lists, task markers, blockquotes, rules and links.

use std::fmt;
use std::sync::LazyLock;

use pulldown_cmark::{CodeBlockKind, CowStr, Event, HeadingLevel, Options, Parser, Tag, TagEnd};
use ratatui::style::Color;
use syntect::easy::HighlightLines;
use syntect::highlighting::ThemeSet;
use syntect::parsing::SyntaxSet;
use syntect::util::{LinesWithEndings, as_24_bit_terminal_escaped};

use super::theme;

static SYNTAX_SET: LazyLock<SyntaxSet> = LazyLock::new(SyntaxSet::load_defaults_newlines);
static THEME_SET: LazyLock<ThemeSet> = LazyLock::new(ThemeSet::load_defaults);

const CODE_THEME: &str = "base16-ocean.dark";
const RESET: &str = "\x1b[0m";

#[derive(Debug)]
pub enum MarkdownError {
    /// syntect failed on a fenced code block.
    Highlight(String),
}

impl fmt::Display for MarkdownError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MarkdownError::Highlight(msg) => write!(f, "highlighting failed: {msg}"),
        }
    }
}

impl std::error::Error for MarkdownError {}

/// Converts markdown to ANSI-escaped text. Lines are separated by `\n`.
pub fn render(content: &str) -> Result<String, MarkdownError> {
    let mut opts = Options::empty();
    opts.insert(Options::ENABLE_STRIKETHROUGH);
    opts.insert(Options::ENABLE_TASKLISTS);

    let mut w = Writer::default();
    for event in Parser::new_ext(content, opts) {
        w.handle(event)?;
    }
    Ok(w.lines.join("\n"))
}

// ── Inline style ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct Sgr {
    fg: Option<Color>,
    bg: Option<Color>,
    bold: bool,
    dim: bool,
    italic: bool,
    underline: bool,
    strike: bool,
}

impl Sgr {
    fn fg(color: Color) -> Self {
        Self {
            fg: Some(color),
            ..Self::default()
        }
    }

    /// Layers `overlay` on top: its colours win, flags accumulate.
    fn patch(self, overlay: Sgr) -> Sgr {
        Sgr {
            fg: overlay.fg.or(self.fg),
            bg: overlay.bg.or(self.bg),
            bold: self.bold || overlay.bold,
            dim: self.dim || overlay.dim,
            italic: self.italic || overlay.italic,
            underline: self.underline || overlay.underline,
            strike: self.strike || overlay.strike,
        }
    }

    fn codes(&self) -> Vec<String> {
        let mut codes = Vec::new();
        for (on, code) in [
            (self.bold, "1"),
            (self.dim, "2"),
            (self.italic, "3"),
            (self.underline, "4"),
            (self.strike, "9"),
        ] {
            if on {
                codes.push(code.to_string());
            }
        }
        codes.extend(self.fg.and_then(|c| theme::sgr_color(c, 38)));
        codes.extend(self.bg.and_then(|c| theme::sgr_color(c, 48)));
        codes
    }

    fn paint(&self, text: &str) -> String {
        let codes = self.codes();
        if codes.is_empty() {
            text.to_string()
        } else {
            format!("\x1b[{}m{text}{RESET}", codes.join(";"))
        }
    }
}

// ── Writer ──────────────────────────────────────────────────────────────────

#[derive(Default)]
struct Writer {
    lines: Vec<String>,
    /// Inline style stack; nested bold+italic composes via `patch`.
    styles: Vec<Sgr>,
    /// Per-line prefixes (blockquote and code block `│`).
    line_prefixes: Vec<String>,
    /// List nesting: None = unordered, Some(n) = ordered at index n.
    list_indices: Vec<Option<u64>>,
    highlighter: Option<HighlightLines<'static>>,
    in_plain_code: bool,
    link_url: Option<String>,
    needs_newline: bool,
    /// A list marker was just written; the item's first paragraph
    /// continues on the marker's line.
    item_open: bool,
}

impl Writer {
    fn style(&self) -> Sgr {
        self.styles.last().copied().unwrap_or_default()
    }

    fn push_style(&mut self, overlay: Sgr) {
        self.styles.push(self.style().patch(overlay));
    }

    fn pop_style(&mut self) {
        self.styles.pop();
    }

    fn push_line(&mut self, content: &str) {
        let mut line = self.line_prefixes.concat();
        line.push_str(content);
        self.lines.push(line);
    }

    fn push_text(&mut self, text: &str) {
        match self.lines.last_mut() {
            Some(line) => line.push_str(text),
            None => self.push_line(text),
        }
    }

    fn blank_line_if_needed(&mut self) {
        if self.needs_newline {
            self.push_line("");
            self.needs_newline = false;
        }
    }

    fn handle(&mut self, event: Event<'_>) -> Result<(), MarkdownError> {
        match event {
            Event::Start(tag) => self.open(tag),
            Event::End(tag) => self.close(tag),
            Event::Text(t) => self.text(t)?,
            Event::Code(c) => {
                let code = Sgr {
                    bg: Some(theme::DIVIDER),
                    ..Sgr::fg(theme::ACCENT)
                };
                self.push_text(&code.paint(&c));
            }
            // Author line breaks are kept
            Event::SoftBreak | Event::HardBreak => self.push_line(""),
            Event::Rule => {
                self.blank_line_if_needed();
                self.push_line(&theme::paint(&"─".repeat(40), theme::BORDER));
                self.needs_newline = true;
            }
            Event::TaskListMarker(checked) => {
                self.push_text(if checked { "[x] " } else { "[ ] " });
            }
            _ => {} // HTML, footnotes, math: skip
        }
        Ok(())
    }

    fn open(&mut self, tag: Tag<'_>) {
        match tag {
            Tag::Paragraph => {
                if self.item_open {
                    self.item_open = false;
                } else {
                    self.blank_line_if_needed();
                    self.push_line("");
                }
            }
            Tag::Heading { level, .. } => {
                self.blank_line_if_needed();
                let hs = heading_style(level);
                let marker = format!("{} ", "#".repeat(heading_depth(level)));
                self.push_line(&hs.paint(&marker));
                self.push_style(hs);
            }
            Tag::BlockQuote(_) => {
                self.blank_line_if_needed();
                self.line_prefixes.push(theme::paint("│ ", theme::DIM));
                self.push_style(Sgr {
                    dim: true,
                    italic: true,
                    ..Sgr::default()
                });
            }
            Tag::CodeBlock(kind) => {
                self.blank_line_if_needed();
                let lang = match &kind {
                    CodeBlockKind::Fenced(l) => l.to_string(),
                    CodeBlockKind::Indented => String::new(),
                };
                let top = if lang.is_empty() {
                    String::from("╭──")
                } else {
                    format!("╭── {lang} ──")
                };
                self.push_line(&theme::paint(&top, theme::DIM));
                self.line_prefixes.push(theme::paint("│ ", theme::DIM));

                if !lang.is_empty()
                    && let Some(syntax) = SYNTAX_SET.find_syntax_by_token(&lang)
                    && let Some(code_theme) = THEME_SET.themes.get(CODE_THEME)
                {
                    self.highlighter = Some(HighlightLines::new(syntax, code_theme));
                }
                self.in_plain_code = self.highlighter.is_none();
            }
            Tag::List(start) => {
                if self.list_indices.is_empty() {
                    self.blank_line_if_needed();
                }
                self.list_indices.push(start);
            }
            Tag::Item => {
                let depth = self.list_indices.len().saturating_sub(1);
                let indent = "  ".repeat(depth);
                let marker = match self.list_indices.last_mut() {
                    Some(Some(n)) => {
                        let marker = format!("{indent}{n}. ");
                        *n += 1;
                        marker
                    }
                    _ => format!("{indent}• "),
                };
                self.push_line(&theme::paint(&marker, theme::DIM));
                self.needs_newline = false;
                self.item_open = true;
            }
            Tag::Emphasis => self.push_style(Sgr {
                italic: true,
                ..Sgr::default()
            }),
            Tag::Strong => self.push_style(Sgr {
                bold: true,
                ..Sgr::default()
            }),
            Tag::Strikethrough => self.push_style(Sgr {
                strike: true,
                ..Sgr::default()
            }),
            Tag::Link { dest_url, .. } => {
                // OSC 8 hyperlink around the text; the URL is repeated after
                // it for terminals that ignore OSC 8
                self.push_text(&format!("\x1b]8;;{dest_url}\x1b\\"));
                self.link_url = Some(dest_url.to_string());
                self.push_style(Sgr {
                    underline: true,
                    ..Sgr::fg(theme::ACCENT)
                });
            }
            _ => {} // Tables, images, definitions: skip
        }
    }

    fn close(&mut self, tag: TagEnd) {
        match tag {
            TagEnd::Paragraph => self.needs_newline = true,
            TagEnd::Heading(_) => {
                self.pop_style();
                self.needs_newline = true;
            }
            TagEnd::BlockQuote(_) => {
                self.line_prefixes.pop();
                self.pop_style();
                self.needs_newline = true;
            }
            TagEnd::CodeBlock => {
                self.highlighter = None;
                self.in_plain_code = false;
                self.line_prefixes.pop();
                self.push_line(&theme::paint("╰──", theme::DIM));
                self.needs_newline = true;
            }
            TagEnd::List(_) => {
                self.list_indices.pop();
                self.needs_newline = true;
            }
            TagEnd::Emphasis | TagEnd::Strong | TagEnd::Strikethrough => self.pop_style(),
            TagEnd::Link => {
                self.pop_style();
                self.push_text("\x1b]8;;\x1b\\");
                if let Some(url) = self.link_url.take() {
                    self.push_text(&theme::paint(&format!(" ({url})"), theme::DIM));
                }
            }
            _ => {}
        }
    }

    fn text(&mut self, cow: CowStr<'_>) -> Result<(), MarkdownError> {
        self.item_open = false;
        if let Some(mut hl) = self.highlighter.take() {
            let result = self.highlight(&mut hl, &cow);
            self.highlighter = Some(hl);
            return result;
        }

        if self.in_plain_code {
            let code = Sgr::fg(theme::FG);
            for line in cow.lines() {
                self.push_line(&code.paint(line));
            }
            return Ok(());
        }

        // Normal text inherits the current style (heading, bold, etc.)
        let painted = self.style().paint(&cow);
        self.push_text(&painted);
        Ok(())
    }

    fn highlight(
        &mut self,
        hl: &mut HighlightLines<'static>,
        code: &str,
    ) -> Result<(), MarkdownError> {
        for line in LinesWithEndings::from(code) {
            let ranges = hl
                .highlight_line(line, &SYNTAX_SET)
                .map_err(|e| MarkdownError::Highlight(e.to_string()))?;
            let escaped = as_24_bit_terminal_escaped(&ranges[..], false);
            let trimmed = escaped.trim_end_matches(['\n', '\r']);
            self.push_line(&format!("{trimmed}{RESET}"));
        }
        Ok(())
    }
}

fn heading_depth(level: HeadingLevel) -> usize {
    match level {
        HeadingLevel::H1 => 1,
        HeadingLevel::H2 => 2,
        HeadingLevel::H3 => 3,
        HeadingLevel::H4 => 4,
        HeadingLevel::H5 => 5,
        HeadingLevel::H6 => 6,
    }
}

fn heading_style(level: HeadingLevel) -> Sgr {
    let bold = Sgr {
        bold: true,
        ..Sgr::fg(theme::ACCENT)
    };
    match level {
        HeadingLevel::H1 => Sgr {
            underline: true,
            ..bold
        },
        HeadingLevel::H2 => bold,
        _ => Sgr {
            italic: true,
            ..bold
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(md: &str) -> Vec<String> {
        render(md).unwrap().split('\n').map(str::to_string).collect()
    }

    #[test]
    fn test_bold_and_soft_break_give_two_lines() {
        let out = lines("**bold** text\nline2");
        assert_eq!(out.len(), 2);
        assert_eq!(out[0], "\x1b[1mbold\x1b[0m text");
        assert_eq!(out[1], "line2");
    }

    #[test]
    fn test_heading_text_inherits_heading_style() {
        let out = lines("## Hello");
        assert_eq!(out.len(), 1);
        // Both the marker and the text are bold
        assert_eq!(out[0].matches("\x1b[1;").count(), 2);
        assert!(out[0].contains("Hello"));
    }

    #[test]
    fn test_nested_emphasis_composes() {
        let out = lines("***both***");
        assert!(out[0].starts_with("\x1b[1;3m") || out[0].starts_with("\x1b[1;3;"));
    }

    #[test]
    fn test_plain_text_has_no_escapes() {
        assert_eq!(render("hello").unwrap(), "hello");
    }

    #[test]
    fn test_paragraphs_are_separated_by_blank_line() {
        assert_eq!(lines("one\n\ntwo"), vec!["one", "", "two"]);
    }

    #[test]
    fn test_code_block_has_border_structure() {
        let out = lines("```\nline1\nline2\n```");
        assert!(out[0].contains('╭'));
        assert!(out[1].contains("│ ") && out[1].contains("line1"));
        assert!(out[2].contains("line2"));
        assert!(out.last().unwrap().contains('╰'));
    }

    #[test]
    fn test_fenced_code_is_highlighted_in_24_bit() {
        let out = render("```rust\nfn main() {}\n```").unwrap();
        assert!(out.contains("╭── rust ──"));
        assert!(out.contains("\x1b[38;2;"));
        assert!(out.contains("main"));
    }

    #[test]
    fn test_link_uses_osc8_and_shows_url() {
        let out = render("[site](https://example.com)").unwrap();
        assert!(out.contains("\x1b]8;;https://example.com\x1b\\"));
        assert!(out.contains(" (https://example.com)"));
    }

    #[test]
    fn test_lists_and_tasks() {
        let out = lines("- a\n- [x] b\n\n1. one\n2. two");
        assert!(out[0].contains("• ") && out[0].ends_with('a'));
        assert!(out[1].contains("[x] b"));
        assert!(out.iter().any(|l| l.contains("2. ") && l.ends_with("two")));
    }

    #[test]
    fn test_blockquote_and_rule() {
        let out = lines("> quoted\n\n---");
        assert!(out[0].contains("│ ") && out[0].contains("quoted"));
        assert!(out.last().unwrap().contains("────"));
    }
}
