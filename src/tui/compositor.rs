//! ANSI-aware line compositor.
//!
//! Turns one logical line of text (which may carry SGR escapes, OSC
//! sequences, raw newlines and arbitrary bytes) into terminal cells:
//!
//! ```text
//! bytes ──▶ tokenize ──▶ Glyph { ch, width, style, boundary } ──▶ wrap ──▶ CellSink
//!            │  CSI m   → StyleState
//!            │  OSC     → dropped
//!            └─ bad byte → skipped, resync on the next byte
//! ```
//!
//! Wrapping prefers word boundaries but never leaves a row shorter than a
//! quarter of the width just to find one; past that it hard-breaks.

use ratatui::buffer::Buffer;
use ratatui::layout::Rect;
use ratatui::style::{Color, Modifier, Style};
use unicode_width::UnicodeWidthChar;

const ESC: u8 = 0x1B;
const BEL: u8 = 0x07;

/// Stands in for a wide glyph that cannot fit the row at all.
const TOO_WIDE: char = '?';

/// Anything cells can be written into. Writes outside `area()` are the
/// compositor's job to avoid, but implementations may also ignore them.
pub trait CellSink {
    fn area(&self) -> Rect;
    fn set_cell(&mut self, x: u16, y: u16, ch: char, style: Style);
}

impl CellSink for Buffer {
    fn area(&self) -> Rect {
        self.area
    }

    fn set_cell(&mut self, x: u16, y: u16, ch: char, style: Style) {
        if let Some(cell) = self.cell_mut((x, y)) {
            cell.set_char(ch).set_style(style);
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Glyph {
    ch: char,
    width: u16,
    style: Style,
    /// Came from a space or tab.
    space: bool,
    boundary: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Token {
    Glyph(Glyph),
    Newline,
}

fn is_boundary(ch: char) -> bool {
    ch.is_whitespace()
        || matches!(
            ch,
            '.' | ','
                | ';'
                | ':'
                | '!'
                | '?'
                | '-'
                | '_'
                | '('
                | ')'
                | '['
                | ']'
                | '{'
                | '}'
                | '"'
                | '\''
                | '/'
                | '\\'
                | '|'
        )
}

/// Maps an xterm 256-colour index to a ratatui colour. The first sixteen
/// use the terminal's own palette; the rest are fixed RGB values.
pub fn indexed_color(n: u8) -> Color {
    const NAMED: [Color; 16] = [
        Color::Black,
        Color::Red,
        Color::Green,
        Color::Yellow,
        Color::Blue,
        Color::Magenta,
        Color::Cyan,
        Color::Gray,
        Color::DarkGray,
        Color::LightRed,
        Color::LightGreen,
        Color::LightYellow,
        Color::LightBlue,
        Color::LightMagenta,
        Color::LightCyan,
        Color::White,
    ];
    match n {
        0..=15 => NAMED[n as usize],
        16..=231 => {
            let i = n - 16;
            let level = |v: u8| if v == 0 { 0 } else { 55 + 40 * v };
            Color::Rgb(level(i / 36), level((i / 6) % 6), level(i % 6))
        }
        _ => {
            let gray = 8 + 10 * (n - 232);
            Color::Rgb(gray, gray, gray)
        }
    }
}

/// Running SGR state for one line.
struct StyleState {
    base: Style,
    current: Style,
}

impl StyleState {
    fn new(base: Style) -> Self {
        Self {
            base,
            current: base,
        }
    }

    fn apply_sgr(&mut self, params: &[u8]) {
        let codes: Vec<u16> = params
            .split(|&b| b == b';' || b == b':')
            .map(|p| {
                std::str::from_utf8(p)
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(0)
            })
            .collect();

        let mut i = 0;
        while i < codes.len() {
            let s = &mut self.current;
            match codes[i] {
                0 => *s = self.base,
                1 => *s = s.add_modifier(Modifier::BOLD),
                2 => *s = s.add_modifier(Modifier::DIM),
                3 => *s = s.add_modifier(Modifier::ITALIC),
                4 => *s = s.add_modifier(Modifier::UNDERLINED),
                7 => *s = s.add_modifier(Modifier::REVERSED),
                9 => *s = s.add_modifier(Modifier::CROSSED_OUT),
                21 | 22 => *s = s.remove_modifier(Modifier::BOLD | Modifier::DIM),
                23 => *s = s.remove_modifier(Modifier::ITALIC),
                24 => *s = s.remove_modifier(Modifier::UNDERLINED),
                27 => *s = s.remove_modifier(Modifier::REVERSED),
                29 => *s = s.remove_modifier(Modifier::CROSSED_OUT),
                n @ 30..=37 => s.fg = Some(indexed_color((n - 30) as u8)),
                n @ 90..=97 => s.fg = Some(indexed_color((n - 90 + 8) as u8)),
                n @ 40..=47 => s.bg = Some(indexed_color((n - 40) as u8)),
                n @ 100..=107 => s.bg = Some(indexed_color((n - 100 + 8) as u8)),
                39 => s.fg = self.base.fg,
                49 => s.bg = self.base.bg,
                layer @ (38 | 48) => {
                    let (color, used) = extended_color(&codes[i + 1..]);
                    if let Some(color) = color {
                        if layer == 38 {
                            s.fg = Some(color);
                        } else {
                            s.bg = Some(color);
                        }
                    }
                    i += used;
                }
                _ => {}
            }
            i += 1;
        }
    }
}

/// Reads `5;n` or `2;r;g;b` and reports how many codes it consumed.
fn extended_color(rest: &[u16]) -> (Option<Color>, usize) {
    let byte = |v: u16| u8::try_from(v).unwrap_or(u8::MAX);
    match rest {
        [5, n, ..] => (Some(indexed_color(byte(*n))), 2),
        [2, r, g, b, ..] => (Some(Color::Rgb(byte(*r), byte(*g), byte(*b))), 4),
        [5] => (None, 1),
        [2, ..] => (None, rest.len()),
        _ => (None, 0),
    }
}

/// Decodes one UTF-8 sequence at the start of `bytes`.
fn decode_utf8(bytes: &[u8]) -> Option<(char, usize)> {
    let len = match bytes.first()? {
        0x00..=0x7F => 1,
        0xC2..=0xDF => 2,
        0xE0..=0xEF => 3,
        0xF0..=0xF4 => 4,
        _ => return None,
    };
    let seq = bytes.get(..len)?;
    let ch = std::str::from_utf8(seq).ok()?.chars().next()?;
    Some((ch, len))
}

/// Skips an escape sequence starting at `bytes[start] == ESC` and returns
/// the index to resume at.
fn skip_escape(bytes: &[u8], start: usize, styles: &mut StyleState) -> usize {
    match bytes.get(start + 1) {
        None => bytes.len(),
        Some(b'[') => {
            let params_start = start + 2;
            let mut j = params_start;
            while let Some(&b) = bytes.get(j)
                && (0x20..=0x3F).contains(&b)
            {
                j += 1;
            }
            match bytes.get(j) {
                Some(&final_byte) if (0x40..=0x7E).contains(&final_byte) => {
                    if final_byte == b'm' {
                        styles.apply_sgr(&bytes[params_start..j]);
                    }
                    j + 1
                }
                // Malformed: drop what was read and resume at the odd byte
                _ => j,
            }
        }
        Some(b']') => {
            let mut j = start + 2;
            while j < bytes.len() {
                match bytes[j] {
                    BEL => return j + 1,
                    ESC if bytes.get(j + 1) == Some(&b'\\') => return j + 2,
                    _ => j += 1,
                }
            }
            bytes.len()
        }
        Some(_) => start + 2,
    }
}

fn tokenize(bytes: &[u8], base: Style) -> Vec<Token> {
    let mut styles = StyleState::new(base);
    let mut tokens = Vec::with_capacity(bytes.len());
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            ESC => {
                i = skip_escape(bytes, i, &mut styles);
                continue;
            }
            b'\n' => tokens.push(Token::Newline),
            b'\t' => tokens.push(Token::Glyph(Glyph {
                ch: ' ',
                width: 1,
                style: styles.current,
                space: true,
                boundary: true,
            })),
            _ => {
                if let Some((ch, len)) = decode_utf8(&bytes[i..]) {
                    i += len;
                    // Zero-width and combining marks are dropped
                    let width = ch.width().unwrap_or(0) as u16;
                    if !ch.is_control() && width > 0 {
                        tokens.push(Token::Glyph(Glyph {
                            ch,
                            width,
                            style: styles.current,
                            space: ch == ' ',
                            boundary: is_boundary(ch),
                        }));
                    }
                    continue;
                }
            }
        }
        i += 1;
    }
    tokens
}

/// Wraps glyphs into rows of at most `width` columns, handing each
/// finished row to `emit` with its index. Returns the row count.
fn layout(tokens: &[Token], width: u16, mut emit: impl FnMut(u16, &[Glyph])) -> u16 {
    let width = width.max(1);
    let min_break = width / 4;
    let mut rows: u16 = 0;
    let mut row: Vec<Glyph> = Vec::new();

    let row_width = |row: &[Glyph]| row.iter().map(|g| g.width).sum::<u16>();
    let mut finish = |row: &mut Vec<Glyph>, rows: &mut u16| {
        emit(*rows, row.as_slice());
        row.clear();
        *rows = rows.saturating_add(1);
    };

    for token in tokens {
        let glyph = match token {
            Token::Newline => {
                finish(&mut row, &mut rows);
                continue;
            }
            Token::Glyph(glyph) => *glyph,
        };

        loop {
            let used = row_width(&row);
            if used + glyph.width <= width || row.is_empty() {
                row.push(glyph);
                break;
            }
            if glyph.space {
                finish(&mut row, &mut rows);
                break;
            }

            // Last boundary that leaves at least a quarter row behind
            let mut column = 0;
            let mut split = None;
            for (k, g) in row.iter().enumerate() {
                if g.boundary && column >= min_break {
                    split = Some(k + 1);
                }
                column += g.width;
            }

            match split {
                Some(at) => {
                    let mut rest = row.split_off(at);
                    finish(&mut row, &mut rows);
                    if rest.first().is_some_and(|g| g.space) {
                        rest.remove(0);
                    }
                    row = rest;
                }
                None => finish(&mut row, &mut rows),
            }
        }
    }
    finish(&mut row, &mut rows);
    rows
}

/// Draws `text` into `area` on `sink`, skipping the first `skip_rows`
/// wrapped rows. Returns the total number of rows the text wraps to,
/// drawn or not.
pub fn draw_line<S: CellSink + ?Sized>(
    sink: &mut S,
    area: Rect,
    skip_rows: u16,
    text: impl AsRef<[u8]>,
    base: Style,
) -> u16 {
    let area = area.intersection(sink.area());
    let tokens = tokenize(text.as_ref(), base);
    layout(&tokens, area.width, |index, row| {
        let Some(y) = index.checked_sub(skip_rows) else {
            return;
        };
        if y >= area.height {
            return;
        }
        let mut x = 0u16;
        for glyph in row {
            if x + glyph.width > area.width {
                // A wide glyph alone on a one-column row still leaves a mark
                if x == 0 {
                    sink.set_cell(area.x, area.y + y, TOO_WIDE, glyph.style);
                }
                break;
            }
            sink.set_cell(area.x + x, area.y + y, glyph.ch, glyph.style);
            if glyph.width == 2 {
                sink.set_cell(area.x + x + 1, area.y + y, ' ', glyph.style);
            }
            x += glyph.width;
        }
    })
}

/// Rows `text` wraps to at `width` columns.
pub fn measure(text: impl AsRef<[u8]>, width: u16) -> u16 {
    let tokens = tokenize(text.as_ref(), Style::default());
    layout(&tokens, width, |_, _| {})
}

/// Visible glyph count of `text` with escapes removed.
pub fn visible_width(text: impl AsRef<[u8]>) -> usize {
    tokenize(text.as_ref(), Style::default())
        .iter()
        .map(|t| match t {
            Token::Glyph(g) => g.width as usize,
            Token::Newline => 0,
        })
        .sum()
}
