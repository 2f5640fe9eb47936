//! Drawing of a [`ReviewSession`] onto a ratatui frame.
//!
//! Shared by the interactive reviewer and the headless capture surface so a
//! screenshot shows exactly what a reviewer would see. `draw` reports which
//! regions it laid out; the capture pipeline checks those against the
//! surface contract.

use auditgrid_engine::events::ReviewEvent;
use auditgrid_engine::highlight::{CellMark, Severity};
use auditgrid_engine::issue::{Issue, Level};
use auditgrid_engine::review::ReviewSession;
use auditgrid_engine::workbook::RenderedSheet;
use ratatui::{
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph},
    Frame,
};

use crate::util;

/// Attachment point for the grid panel.
pub const ATTACH_SPREADSHEET: &str = "spreadsheet";
/// Attachment point for the issue list panel.
pub const ATTACH_ISSUES: &str = "issues";
pub const TOGGLE_ERRORS: &str = "errors";
pub const TOGGLE_WARNINGS: &str = "warnings";

pub const EMPTY_STATE: &str = "No issues match the current filters";

/// Title, sheet tabs, filter bar and status line.
pub const CHROME_ROWS: u16 = 4;
/// Header row of the grid panel.
pub const GRID_HEADER_ROWS: u16 = 1;
/// Top and bottom border of the issue panel.
pub const ISSUE_PANEL_BORDER: u16 = 2;

/// Presentation state that is not review state: scrolling and cursors of
/// the list and rule bar.
#[derive(Debug, Clone, Default)]
pub struct ViewState {
    pub file_name: String,
    /// Unicode-aware widths of the rendered sheet's columns.
    pub col_widths: Vec<usize>,
    pub scroll_row: usize,
    pub scroll_col: usize,
    /// Position in the filtered view under the list cursor.
    pub list_cursor: usize,
    pub list_scroll: usize,
    /// Index into the sorted rule list.
    pub rule_cursor: usize,
    /// Whether list and rule cursors are drawn (interactive only).
    pub interactive: bool,
    pub show_help: bool,
}

impl ViewState {
    pub fn new(file_name: impl Into<String>) -> Self {
        Self {
            file_name: file_name.into(),
            ..Default::default()
        }
    }

    /// Recompute column widths for the session's current grid and reset
    /// grid scrolling.
    pub fn sync_grid(&mut self, session: &ReviewSession) {
        self.col_widths = session.grid().map(grid_widths).unwrap_or_default();
        self.scroll_row = 0;
        self.scroll_col = 0;
    }

    fn col_width(&self, c: usize) -> usize {
        self.col_widths.get(c).copied().unwrap_or(3)
    }
}

/// Regions laid out by the last [`draw`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Regions {
    pub spreadsheet: Option<Rect>,
    pub issues: Option<Rect>,
    /// Severity toggles that were fully drawn, with their area.
    pub toggles: Vec<(&'static str, Rect)>,
}

impl Regions {
    pub fn has_attachment(&self, name: &str) -> bool {
        match name {
            ATTACH_SPREADSHEET => self.spreadsheet.is_some(),
            ATTACH_ISSUES => self.issues.is_some(),
            _ => false,
        }
    }

    pub fn has_toggle(&self, name: &str) -> bool {
        self.toggles.iter().any(|(t, _)| *t == name)
    }
}

pub fn grid_widths(grid: &RenderedSheet) -> Vec<usize> {
    (0..grid.num_cols)
        .map(|c| {
            let header = grid.col_names.get(c).map(|s| s.as_str()).unwrap_or("");
            util::column_width(header, grid.rows.iter().map(|r| r[c].as_str()))
        })
        .collect()
}

/// Width of the row-number gutter for `grid`.
pub fn gutter(grid: Option<&RenderedSheet>) -> usize {
    let max_row = grid.map(|g| g.file_row(g.num_rows().saturating_sub(1))).unwrap_or(0);
    util::gutter_width(max_row) + 1
}

/// Terminal height that shows `grid_rows` data rows and `list_rows` issue
/// lines without scrolling.
pub fn page_height(grid_rows: usize, list_rows: usize) -> u16 {
    let grid = (GRID_HEADER_ROWS as usize).saturating_add(grid_rows.max(1));
    let list = list_rows.max(1).saturating_add(ISSUE_PANEL_BORDER as usize);
    let total = (CHROME_ROWS as usize).saturating_add(grid).saturating_add(list);
    u16::try_from(total).unwrap_or(u16::MAX)
}

/// Scroll the grid so the active issue's cell lies inside a window of
/// `grid_rows` data rows and `width` terminal columns.
pub fn scroll_into_view(state: &mut ViewState, session: &ReviewSession, grid_rows: usize, width: u16) {
    let (Some((row, col)), Some(grid)) = (session.highlight().scroll_target(), session.grid()) else {
        return;
    };

    if row < state.scroll_row {
        state.scroll_row = row;
    }
    if grid_rows > 0 && row >= state.scroll_row + grid_rows {
        state.scroll_row = row + 1 - grid_rows;
    }

    let available = (width as usize).saturating_sub(gutter(Some(grid)) + 1);
    if col < state.scroll_col {
        state.scroll_col = col;
    }
    while state.scroll_col < col {
        let cols = visible_columns(state, grid.num_cols, state.scroll_col, available);
        if cols.last().map(|&last| last >= col).unwrap_or(true) {
            break;
        }
        state.scroll_col += 1;
    }
}

/// Fold session notifications into presentation state. Returns the
/// generation of the last highlight pass among `events`.
pub fn apply_events(state: &mut ViewState, session: &ReviewSession, events: &[ReviewEvent]) -> Option<u64> {
    let mut ready = None;
    for event in events {
        match event {
            ReviewEvent::SheetRendered { .. } => state.sync_grid(session),
            ReviewEvent::FilterChanged { .. } => {
                state.list_cursor = 0;
                state.list_scroll = 0;
            }
            ReviewEvent::IssueSelected { position, .. } => state.list_cursor = *position,
            ReviewEvent::HighlightApplied { generation, .. } => ready = Some(*generation),
        }
    }
    ready
}

/// Draw the whole review screen. `list_rows` is the number of issue lines
/// the issue panel gets.
pub fn draw(frame: &mut Frame, session: &ReviewSession, state: &ViewState, list_rows: u16) -> Regions {
    let area = frame.area();
    let chunks = Layout::vertical([
        Constraint::Length(1),
        Constraint::Length(1),
        Constraint::Length(1),
        Constraint::Min(GRID_HEADER_ROWS + 1),
        Constraint::Length(list_rows.max(1).saturating_add(ISSUE_PANEL_BORDER)),
        Constraint::Length(1),
    ])
    .split(area);

    let mut regions = Regions::default();

    draw_title(frame, chunks[0], session, state);
    draw_tab_bar(frame, chunks[1], session);
    regions.toggles = draw_filter_bar(frame, chunks[2], session, state);

    if chunks[3].height > 0 && chunks[3].width > 0 {
        draw_grid(frame, chunks[3], session, state);
        regions.spreadsheet = Some(chunks[3]);
    }
    if chunks[4].height > 0 && chunks[4].width > 0 {
        draw_issue_list(frame, chunks[4], session, state);
        regions.issues = Some(chunks[4]);
    }
    draw_status(frame, chunks[5], session, state);

    if state.show_help {
        draw_help(frame, area);
    }

    regions
}

fn draw_title(frame: &mut Frame, area: Rect, session: &ReviewSession, state: &ViewState) {
    let shape = match session.grid() {
        Some(g) => format!("{} rows x {} cols", g.num_rows(), g.num_cols),
        None => "no sheet".to_string(),
    };
    let sheets = session.sheet_selector().len();
    let title = format!(
        " agrid: {} | {} | {} ",
        state.file_name,
        shape,
        util::plural(sheets, "sheet", "sheets")
    );
    let para = Paragraph::new(Line::from(vec![Span::styled(
        title,
        Style::default()
            .fg(Color::Black)
            .bg(Color::Cyan)
            .add_modifier(Modifier::BOLD),
    )]))
    .style(Style::default().bg(Color::Cyan));
    frame.render_widget(para, area);
}

fn draw_tab_bar(frame: &mut Frame, area: Rect, session: &ReviewSession) {
    let active = session.active_sheet_index();
    let mut spans = Vec::new();
    for (i, name) in session.sheet_selector().iter().enumerate() {
        let label = format!(" {} ", name);
        if Some(i) == active {
            spans.push(Span::styled(
                label,
                Style::default()
                    .fg(Color::Black)
                    .bg(Color::White)
                    .add_modifier(Modifier::BOLD),
            ));
        } else {
            spans.push(Span::styled(label, Style::default().fg(Color::Gray).bg(Color::DarkGray)));
        }
        spans.push(Span::styled(" ", Style::default().bg(Color::Black)));
    }
    let para = Paragraph::new(Line::from(spans)).style(Style::default().bg(Color::Black));
    frame.render_widget(para, area);
}

fn checkbox(on: bool) -> &'static str {
    if on {
        "[x]"
    } else {
        "[ ]"
    }
}

/// Severity toggles then rule checkboxes. Returns the toggles that fit.
fn draw_filter_bar(
    frame: &mut Frame,
    area: Rect,
    session: &ReviewSession,
    state: &ViewState,
) -> Vec<(&'static str, Rect)> {
    let store = session.store();
    let filter = store.state();
    let counts = store.counts();

    let mut spans = Vec::new();
    let mut toggles = Vec::new();
    let mut x = 0usize;
    let width = area.width as usize;

    let mut push = |spans: &mut Vec<Span<'static>>, text: String, style: Style| -> (usize, usize) {
        let start = x;
        x += util::display_width(&text);
        spans.push(Span::styled(text, style));
        (start, x)
    };

    push(&mut spans, " Filters ".to_string(), Style::default().fg(Color::Gray));

    let toggle_defs = [
        (TOGGLE_ERRORS, "Errors", filter.show_errors, counts.errors, Color::Red),
        (TOGGLE_WARNINGS, "Warnings", filter.show_warnings, counts.warnings, Color::Yellow),
    ];
    for (name, label, on, count, color) in toggle_defs {
        let text = format!(" {} {} ({}) ", checkbox(on), label, count);
        let style = if on {
            Style::default().fg(color).add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(Color::DarkGray)
        };
        let (start, end) = push(&mut spans, text, style);
        if end <= width {
            toggles.push((
                name,
                Rect::new(area.x + start as u16, area.y, (end - start) as u16, 1),
            ));
        }
    }

    let rules = store.rule_checkboxes();
    if !rules.is_empty() {
        push(&mut spans, " | Rules ".to_string(), Style::default().fg(Color::Gray));
        for (i, (rule, on)) in rules.iter().enumerate() {
            let text = format!(" {} {} ", checkbox(*on), rule);
            let mut style = if *on {
                Style::default().fg(Color::White)
            } else {
                Style::default().fg(Color::DarkGray)
            };
            if state.interactive && i == state.rule_cursor {
                style = style.add_modifier(Modifier::REVERSED);
            }
            push(&mut spans, text, style);
        }
    }

    let para = Paragraph::new(Line::from(spans)).style(Style::default().bg(Color::Black));
    frame.render_widget(para, area);
    toggles
}

fn mark_style(mark: Option<CellMark>) -> Option<Style> {
    let mark = mark?;
    let base = match mark.severity {
        Severity::Error => Style::default().fg(Color::White).bg(Color::Red),
        Severity::Warning => Style::default().fg(Color::Black).bg(Color::Yellow),
    };
    Some(if mark.active {
        base.add_modifier(Modifier::BOLD | Modifier::UNDERLINED)
    } else {
        base
    })
}

/// Columns starting at `start_col` that fit into `available` display columns.
pub fn visible_columns(state: &ViewState, num_cols: usize, start_col: usize, available: usize) -> Vec<usize> {
    let mut cols = Vec::new();
    let mut used = 0usize;
    for c in start_col..num_cols {
        let w = state.col_width(c) + 1;
        if used + w > available && !cols.is_empty() {
            break;
        }
        used += w;
        cols.push(c);
    }
    cols
}

fn draw_grid(frame: &mut Frame, area: Rect, session: &ReviewSession, state: &ViewState) {
    let Some(grid) = session.grid() else {
        let msg = Paragraph::new("(no sheet)").style(Style::default().fg(Color::DarkGray));
        frame.render_widget(msg, area);
        return;
    };
    if grid.num_cols == 0 {
        let msg = Paragraph::new("(empty)").style(Style::default().fg(Color::DarkGray));
        frame.render_widget(msg, area);
        return;
    }

    let highlight = session.highlight();
    let target = highlight.scroll_target();
    let gutter = gutter(Some(grid));
    let available = (area.width as usize).saturating_sub(gutter + 1);
    let cols = visible_columns(state, grid.num_cols, state.scroll_col, available);

    let mut header = vec![Span::styled(
        format!("{} ", " ".repeat(gutter)),
        Style::default().fg(Color::DarkGray),
    )];
    for &c in &cols {
        let w = state.col_width(c);
        let style = if target.map(|(_, tc)| tc) == Some(c) {
            Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)
        };
        header.push(Span::styled(format!("{} ", util::pad_right(&grid.col_names[c], w)), style));
    }

    let data_height = area.height.saturating_sub(GRID_HEADER_ROWS) as usize;
    let end_row = (state.scroll_row + data_height).min(grid.num_rows());

    let mut lines: Vec<Line> = Vec::with_capacity(data_height + 1);
    lines.push(Line::from(header));

    for r in state.scroll_row..end_row {
        let is_target_row = target.map(|(tr, _)| tr) == Some(r);
        let gutter_style = if is_target_row {
            Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(Color::DarkGray)
        };
        let mut spans = vec![Span::styled(
            format!("{:>width$} ", grid.file_row(r), width = gutter),
            gutter_style,
        )];
        for &c in &cols {
            let w = state.col_width(c);
            let text = util::pad_right(grid.value(r, c), w);
            let style = mark_style(highlight.mark(r, c)).unwrap_or_else(|| Style::default().fg(Color::Gray));
            spans.push(Span::styled(text, style));
            spans.push(Span::raw(" "));
        }
        lines.push(Line::from(spans));
    }

    if grid.num_rows() == 0 && data_height > 0 {
        lines.push(Line::from(Span::styled("(no data rows)", Style::default().fg(Color::DarkGray))));
    }

    frame.render_widget(Paragraph::new(lines), area);
}

fn level_style(level: &Level) -> Style {
    match level {
        Level::Error => Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
        Level::Warning => Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
        Level::Other(_) => Style::default().fg(Color::Gray),
    }
}

/// One issue list line (without the marker column).
pub fn issue_line_text(issue: &Issue) -> String {
    format!("{:<7} {:<12} {:<16} {}", issue.level.as_str(), issue.rule, issue.address().to_string(), issue.message)
}

fn draw_issue_list(frame: &mut Frame, area: Rect, session: &ReviewSession, state: &ViewState) {
    let store = session.store();
    let view = store.view();
    let title = format!(" Issues ({}/{}) ", view.len(), store.issues().len());
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray))
        .title(title)
        .title_style(Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD));

    if view.is_empty() {
        let para = Paragraph::new(Line::from(Span::styled(
            EMPTY_STATE,
            Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
        )))
        .block(block);
        frame.render_widget(para, area);
        return;
    }

    let active = session.highlight().active();
    let rows = area.height.saturating_sub(ISSUE_PANEL_BORDER) as usize;
    let end = (state.list_scroll + rows).min(view.len());

    let mut lines = Vec::with_capacity(rows);
    for position in state.list_scroll..end {
        let Some(issue) = store.issue(view[position]) else { continue };
        let marker = if Some(position) == active { "> " } else { "  " };
        let mut text_style = Style::default().fg(Color::White);
        if state.interactive && position == state.list_cursor {
            text_style = text_style.bg(Color::DarkGray);
        }
        if Some(position) == active {
            text_style = text_style.add_modifier(Modifier::BOLD);
        }
        lines.push(Line::from(vec![
            Span::styled(marker, Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)),
            Span::styled(format!("{:<7} ", issue.level.as_str()), level_style(&issue.level)),
            Span::styled(
                format!("{:<12} {:<16} {}", issue.rule, issue.address().to_string(), issue.message),
                text_style,
            ),
        ]));
    }

    frame.render_widget(Paragraph::new(lines).block(block), area);
}

fn draw_status(frame: &mut Frame, area: Rect, session: &ReviewSession, state: &ViewState) {
    let store = session.store();
    let counts = store.counts();
    let highlight = session.highlight();
    let sheet = session.active_sheet().unwrap_or("-");

    let mut left = format!(
        " {} | {} shown of {} | {}E {}W",
        sheet,
        store.view().len(),
        counts.total,
        counts.errors,
        counts.warnings
    );
    let unresolved = highlight.unresolved().len();
    if unresolved > 0 {
        left.push_str(&format!(" | {} unresolved", unresolved));
    }

    let position = match highlight.active() {
        Some(p) => format!("issue {}/{}", p + 1, store.view().len()),
        None => "no issue".to_string(),
    };
    let right = if state.interactive {
        format!("{}  n/p: next/prev  ?: help ", position)
    } else {
        format!("{} ", position)
    };

    let padding = (area.width as usize).saturating_sub(util::display_width(&left) + util::display_width(&right));
    let status = format!("{}{:pad$}{}", left, "", right, pad = padding);

    let para = Paragraph::new(Line::from(vec![Span::styled(
        status,
        Style::default().fg(Color::Black).bg(Color::DarkGray),
    )]))
    .style(Style::default().bg(Color::DarkGray));
    frame.render_widget(para, area);
}

fn draw_help(frame: &mut Frame, area: Rect) {
    let help_lines = [
        "",
        "  Filters",
        "  -------",
        "  e / w             Toggle errors / warnings",
        "  Left / Right      Move rule cursor",
        "  r                 Toggle rule under cursor",
        "  a                 Enable all rules",
        "",
        "  Issues",
        "  ------",
        "  n / ]             Next issue",
        "  p / [             Previous issue",
        "  Up / Down         Move list cursor",
        "  Enter             Select issue under cursor",
        "",
        "  Sheets",
        "  ------",
        "  Tab / Shift+Tab   Next/prev sheet",
        "",
        "  General",
        "  -------",
        "  q / Esc           Quit",
        "  ?                 Toggle this help",
        "",
    ];
    let help_width: u16 = 48;
    let help_height: u16 = help_lines.len() as u16 + 2;

    let x = area.width.saturating_sub(help_width) / 2;
    let y = area.height.saturating_sub(help_height) / 2;
    let popup = Rect::new(
        area.x + x,
        area.y + y,
        help_width.min(area.width),
        help_height.min(area.height),
    );

    let lines: Vec<Line> = help_lines
        .iter()
        .map(|s| Line::from(Span::styled(*s, Style::default().fg(Color::White))))
        .collect();

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan))
        .title(" Keybindings ")
        .title_style(Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD))
        .style(Style::default().bg(Color::Black));

    frame.render_widget(Clear, popup);
    frame.render_widget(Paragraph::new(lines).block(block), popup);
}
