use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

/// Display width of a string, accounting for CJK double-width, emoji, etc.
pub fn display_width(s: &str) -> usize {
    UnicodeWidthStr::width(s)
}

/// Truncate a string to fit within `width` display columns, adding ".." if truncated.
pub fn truncate_display(s: &str, width: usize) -> String {
    if width < 3 {
        for ch in s.chars() {
            if ch.width().unwrap_or(0) <= width {
                return ch.to_string();
            }
        }
        return String::new();
    }

    if display_width(s) <= width {
        return s.to_string();
    }

    // Stop at width - 2 to leave room for ".."
    let budget = width - 2;
    let mut used = 0;
    let mut end_byte = 0;
    for (i, ch) in s.char_indices() {
        let cw = ch.width().unwrap_or(0);
        if used + cw > budget {
            end_byte = i;
            break;
        }
        used += cw;
        end_byte = i + ch.len_utf8();
    }

    format!("{}..", &s[..end_byte])
}

/// Pad or truncate a string to exactly `width` display columns.
pub fn pad_right(s: &str, width: usize) -> String {
    let sw = display_width(s);
    if sw > width {
        let t = truncate_display(s, width);
        let tw = display_width(&t);
        format!("{}{}", t, " ".repeat(width.saturating_sub(tw)))
    } else {
        format!("{}{}", s, " ".repeat(width - sw))
    }
}

/// Widest display width among `header` and `values`, clamped to [3, 40].
pub fn column_width<'a>(header: &str, values: impl Iterator<Item = &'a str>) -> usize {
    values
        .map(display_width)
        .chain(std::iter::once(display_width(header)))
        .max()
        .unwrap_or(0)
        .clamp(3, 40)
}

/// Digits needed for the row-number gutter (at least 3).
pub fn gutter_width(max_row: usize) -> usize {
    max_row.to_string().len().max(3)
}

/// Plural suffix helper for status lines.
pub fn plural(n: usize, one: &str, many: &str) -> String {
    format!("{} {}", n, if n == 1 { one } else { many })
}
