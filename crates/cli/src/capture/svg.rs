// Terminal buffer -> SVG screenshot
//
// Each buffer row becomes a run-length list of background rects and text
// spans; identical adjacent styles are merged.

use std::fmt::Write as _;

use ratatui::buffer::Buffer;
use ratatui::style::{Color, Modifier};
use unicode_width::UnicodeWidthStr;

const CELL_W: u32 = 9;
const CELL_H: u32 = 18;
const FONT_SIZE: u32 = 14;
const DEFAULT_FG: &str = "#d4d4d4";
const DEFAULT_BG: &str = "#1e1e1e";

fn color_hex(color: Color, default: &'static str) -> String {
    let named = match color {
        Color::Reset => default,
        Color::Black => "#000000",
        Color::Red => "#cd3131",
        Color::Green => "#0dbc79",
        Color::Yellow => "#e5e510",
        Color::Blue => "#2472c8",
        Color::Magenta => "#bc3fbc",
        Color::Cyan => "#11a8cd",
        Color::Gray => "#cccccc",
        Color::DarkGray => "#666666",
        Color::LightRed => "#f14c4c",
        Color::LightGreen => "#23d18b",
        Color::LightYellow => "#f5f543",
        Color::LightBlue => "#3b8eea",
        Color::LightMagenta => "#d670d6",
        Color::LightCyan => "#29b8db",
        Color::White => "#ffffff",
        Color::Rgb(r, g, b) => return format!("#{:02x}{:02x}{:02x}", r, g, b),
        Color::Indexed(i) => return indexed_hex(i),
    };
    named.to_string()
}

const ANSI_16: [&str; 16] = [
    "#000000", "#cd3131", "#0dbc79", "#e5e510", "#2472c8", "#bc3fbc", "#11a8cd", "#cccccc",
    "#666666", "#f14c4c", "#23d18b", "#f5f543", "#3b8eea", "#d670d6", "#29b8db", "#ffffff",
];

/// xterm 256-colour palette: 16 ANSI colours, a 6x6x6 cube, 24 greys.
fn indexed_hex(i: u8) -> String {
    match i {
        0..=15 => ANSI_16[i as usize].to_string(),
        16..=231 => {
            let level = |v: u8| if v == 0 { 0 } else { 55 + 40 * v };
            let n = i - 16;
            format!("#{:02x}{:02x}{:02x}", level(n / 36), level((n / 6) % 6), level(n % 6))
        }
        _ => {
            let grey = 8 + 10 * (i - 232);
            format!("#{:02x}{:02x}{:02x}", grey, grey, grey)
        }
    }
}

fn xml_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

#[derive(PartialEq)]
struct RunStyle {
    fg: Color,
    bg: Color,
    modifier: Modifier,
}

/// Render `buffer` as a standalone SVG document. `title` goes into `<title>`.
pub fn render(buffer: &Buffer, title: &str) -> String {
    let area = buffer.area;
    let width = area.width as u32 * CELL_W;
    let height = area.height as u32 * CELL_H;

    let mut out = String::new();
    let _ = writeln!(
        out,
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{w}" height="{h}" viewBox="0 0 {w} {h}">"#,
        w = width,
        h = height
    );
    let _ = writeln!(out, "<title>{}</title>", xml_escape(title));
    let _ = writeln!(out, r#"<rect width="100%" height="100%" fill="{}"/>"#, DEFAULT_BG);
    let _ = writeln!(
        out,
        r#"<g font-family="DejaVu Sans Mono, Menlo, Consolas, monospace" font-size="{}" xml:space="preserve">"#,
        FONT_SIZE
    );

    for y in 0..area.height {
        let mut x = 0u16;
        while x < area.width {
            let Some(cell) = buffer.cell((area.x + x, area.y + y)) else {
                x += 1;
                continue;
            };
            let style = RunStyle { fg: cell.fg, bg: cell.bg, modifier: cell.modifier };
            let start = x;
            let mut text = String::new();
            let mut wide = false;
            while x < area.width {
                let Some(c) = buffer.cell((area.x + x, area.y + y)) else { break };
                if (RunStyle { fg: c.fg, bg: c.bg, modifier: c.modifier }) != style {
                    break;
                }
                text.push_str(c.symbol());
                // A wide glyph is followed by blank continuation cells.
                let w = c.symbol().width().max(1) as u16;
                wide |= w > 1;
                x = x.saturating_add(w).min(area.width);
            }
            write_run(&mut out, start, y, x - start, &style, &text, wide);
        }
    }

    out.push_str("</g>\n</svg>\n");
    out
}

fn write_run(out: &mut String, x: u16, y: u16, len: u16, style: &RunStyle, text: &str, wide: bool) {
    let px = x as u32 * CELL_W;
    let py = y as u32 * CELL_H;

    let reversed = style.modifier.contains(Modifier::REVERSED);
    let (fg, bg) = if reversed {
        (color_hex(style.bg, DEFAULT_BG), color_hex(style.fg, DEFAULT_FG))
    } else {
        (color_hex(style.fg, DEFAULT_FG), color_hex(style.bg, DEFAULT_BG))
    };

    if style.bg != Color::Reset || reversed {
        let _ = writeln!(
            out,
            r#"<rect x="{}" y="{}" width="{}" height="{}" fill="{}"/>"#,
            px,
            py,
            len as u32 * CELL_W,
            CELL_H,
            bg
        );
    }

    if text.trim().is_empty() {
        return;
    }

    let mut attrs = String::new();
    if style.modifier.contains(Modifier::BOLD) {
        attrs.push_str(r#" font-weight="bold""#);
    }
    if style.modifier.contains(Modifier::ITALIC) {
        attrs.push_str(r#" font-style="italic""#);
    }
    if style.modifier.contains(Modifier::UNDERLINED) {
        attrs.push_str(r#" text-decoration="underline""#);
    }
    if wide {
        let _ = write!(attrs, r#" textLength="{}" lengthAdjust="spacingAndGlyphs""#, len as u32 * CELL_W);
    }
    let _ = writeln!(
        out,
        r#"<text x="{}" y="{}" fill="{}"{}>{}</text>"#,
        px,
        py + CELL_H - 5,
        fg,
        attrs,
        xml_escape(text)
    );
}
