//! Rendering surfaces driven by the capture pipeline.

use std::cell::RefCell;
use std::rc::Rc;

use auditgrid_engine::events::EventCollector;
use auditgrid_engine::issue::Issue;
use auditgrid_engine::review::ReviewSession;
use auditgrid_engine::workbook::Workbook;
use ratatui::{backend::TestBackend, Terminal};

use super::svg;
use crate::tui::view::{self, Regions, ViewState};

/// Attachment points and toggles a surface currently exposes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Controls {
    pub attachments: Vec<String>,
    pub toggles: Vec<String>,
}

impl Controls {
    pub const REQUIRED_ATTACHMENTS: [&'static str; 2] = [view::ATTACH_SPREADSHEET, view::ATTACH_ISSUES];
    pub const REQUIRED_TOGGLES: [&'static str; 2] = [view::TOGGLE_ERRORS, view::TOGGLE_WARNINGS];

    fn from_regions(regions: &Regions) -> Self {
        let attachments = Self::REQUIRED_ATTACHMENTS
            .iter()
            .filter(|name| regions.has_attachment(name))
            .map(|s| s.to_string())
            .collect();
        let toggles = regions.toggles.iter().map(|(name, _)| name.to_string()).collect();
        Self { attachments, toggles }
    }

    /// Required controls this surface lacks, as `attachment:<name>` /
    /// `toggle:<name>`.
    pub fn missing(&self) -> Vec<String> {
        let mut missing = Vec::new();
        for name in Self::REQUIRED_ATTACHMENTS {
            if !self.attachments.iter().any(|a| a == name) {
                missing.push(format!("attachment:{}", name));
            }
        }
        for name in Self::REQUIRED_TOGGLES {
            if !self.toggles.iter().any(|t| t == name) {
                missing.push(format!("toggle:{}", name));
            }
        }
        missing
    }
}

/// Something the capture pipeline can load, filter and photograph.
pub trait RenderSurface {
    fn name(&self) -> &str;

    fn open(&mut self) -> Result<(), String>;

    /// Load the spreadsheet and the merged issue list.
    fn attach(&mut self, source_name: &str, workbook: Workbook, issues: Vec<Issue>) -> Result<(), String>;

    /// Controls laid out by the most recent render.
    fn controls(&self) -> Controls;

    /// Completed highlight passes; advances after every filter or selection change.
    fn generation(&self) -> u64;

    fn has_warnings(&self) -> bool;

    fn apply_filter(&mut self, errors: bool, warnings: bool) -> Result<(), String>;

    /// Select the first visible issue. `Ok(false)` when nothing is visible.
    fn select_first(&mut self) -> Result<bool, String>;

    /// Screenshot of the full page as SVG.
    fn capture(&mut self, title: &str) -> Result<Vec<u8>, String>;
}

/// Issue lines a screenshot shows; the panel title still counts them all.
pub const MAX_LIST_ROWS: usize = 2_000;

/// Off-screen surface: the reviewer's view drawn into a ratatui
/// `TestBackend` tall enough for every grid row and issue line.
///
/// View state follows the session through its event stream; `generation`
/// reports the last highlight pass the surface has observed.
pub struct HeadlessSurface {
    width: u16,
    max_rows: usize,
    session: ReviewSession,
    state: ViewState,
    regions: Regions,
    events: Rc<RefCell<EventCollector>>,
    ready_generation: u64,
    opened: bool,
}

impl HeadlessSurface {
    pub fn new(width: u16, max_rows: usize) -> Self {
        let mut session = ReviewSession::new();
        let events = Rc::new(RefCell::new(EventCollector::new()));
        let sink = Rc::clone(&events);
        session.subscribe(Box::new(move |e| sink.borrow_mut().push(e.clone())));

        Self {
            width,
            max_rows,
            session,
            state: ViewState::new(""),
            regions: Regions::default(),
            events,
            ready_generation: 0,
            opened: false,
        }
    }

    pub fn session(&self) -> &ReviewSession {
        &self.session
    }

    pub fn view_state(&self) -> &ViewState {
        &self.state
    }

    /// Fold pending session events into the view state.
    fn pump(&mut self) {
        let events = self.events.borrow_mut().take();
        if let Some(generation) = view::apply_events(&mut self.state, &self.session, &events) {
            self.ready_generation = generation;
        }
    }

    fn grid_rows(&self) -> usize {
        self.session.grid().map(|g| g.num_rows()).unwrap_or(0).min(self.max_rows)
    }

    fn list_rows(&self) -> usize {
        let visible = self.session.store().view().len();
        if visible > MAX_LIST_ROWS {
            log::debug!("issue panel shows {} of {} issues", MAX_LIST_ROWS, visible);
        }
        visible.min(MAX_LIST_ROWS)
    }

    /// Draw the current state; keeps the laid-out regions for `controls`.
    fn render(&mut self) -> Result<ratatui::buffer::Buffer, String> {
        if !self.opened {
            return Err("surface is not open".to_string());
        }
        let grid_rows = self.grid_rows();
        let list_rows = self.list_rows();
        let height = view::page_height(grid_rows, list_rows);
        let panel_rows = u16::try_from(list_rows.max(1)).unwrap_or(u16::MAX);

        // Smallest scroll that shows the active cell.
        self.state.scroll_row = 0;
        self.state.scroll_col = 0;
        view::scroll_into_view(&mut self.state, &self.session, grid_rows, self.width);
        if self.state.list_cursor >= list_rows {
            self.state.list_scroll = self.state.list_cursor + 1 - list_rows.max(1);
        } else {
            self.state.list_scroll = 0;
        }

        let mut terminal =
            Terminal::new(TestBackend::new(self.width, height)).map_err(|e| format!("headless terminal: {}", e))?;

        let mut regions = Regions::default();
        terminal
            .draw(|frame| {
                regions = view::draw(frame, &self.session, &self.state, panel_rows);
            })
            .map_err(|e| format!("headless draw: {}", e))?;
        self.regions = regions;
        Ok(terminal.backend().buffer().clone())
    }
}

impl RenderSurface for HeadlessSurface {
    fn name(&self) -> &str {
        "headless"
    }

    fn open(&mut self) -> Result<(), String> {
        if self.width == 0 {
            return Err("capture width must be at least 1 column".to_string());
        }
        self.opened = true;
        Ok(())
    }

    fn attach(&mut self, source_name: &str, workbook: Workbook, issues: Vec<Issue>) -> Result<(), String> {
        self.state = ViewState::new(source_name);
        self.session.load_workbook(workbook);
        self.session.load_issues(issues);
        self.session.set_all_rules(true);
        self.pump();
        self.render()?;
        Ok(())
    }

    fn controls(&self) -> Controls {
        Controls::from_regions(&self.regions)
    }

    fn generation(&self) -> u64 {
        self.ready_generation
    }

    fn has_warnings(&self) -> bool {
        self.session.store().has_warnings()
    }

    fn apply_filter(&mut self, errors: bool, warnings: bool) -> Result<(), String> {
        self.session.set_show_errors(errors);
        self.session.set_show_warnings(warnings);
        self.pump();
        Ok(())
    }

    fn select_first(&mut self) -> Result<bool, String> {
        let selected = self.session.select_first();
        self.pump();
        Ok(selected)
    }

    fn capture(&mut self, title: &str) -> Result<Vec<u8>, String> {
        let buffer = self.render()?;
        Ok(svg::render(&buffer, title).into_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use auditgrid_engine::issue::Level;
    use auditgrid_engine::workbook::Sheet;

    fn workbook() -> Workbook {
        Workbook::new(vec![Sheet::new(
            "Prices",
            vec![
                vec!["Name".into(), "Price".into()],
                vec!["Aspirin".into(), "12".into()],
            ],
        )])
    }

    #[test]
    fn wide_surface_satisfies_contract() {
        let mut s = HeadlessSurface::new(120, 100);
        s.open().unwrap();
        s.attach("prices.xlsx", workbook(), vec![Issue::new("R1", Level::Error, 2, "Price", "x")])
            .unwrap();
        assert!(s.controls().missing().is_empty(), "{:?}", s.controls());
        assert!(s.generation() >= 1);
    }

    #[test]
    fn narrow_surface_lacks_toggles() {
        let mut s = HeadlessSurface::new(20, 100);
        s.open().unwrap();
        s.attach("prices.xlsx", workbook(), Vec::new()).unwrap();
        let missing = s.controls().missing();
        assert!(missing.contains(&"toggle:warnings".to_string()));
    }

    #[test]
    fn capture_requires_open() {
        let mut s = HeadlessSurface::new(80, 10);
        assert!(s.capture("x").is_err());
    }

    #[test]
    fn filter_advances_generation() {
        let mut s = HeadlessSurface::new(120, 100);
        s.open().unwrap();
        s.attach("p", workbook(), vec![Issue::new("R1", Level::Warning, 2, "Name", "x")]).unwrap();
        let before = s.generation();
        s.apply_filter(true, false).unwrap();
        assert!(s.generation() > before);
        assert!(!s.select_first().unwrap());
        let svg = String::from_utf8(s.capture("errors only").unwrap()).unwrap();
        assert!(svg.contains("No issues match the current filters"));
    }

    /// Lines of the SVG that paint an error-marked cell background.
    fn error_rects(svg: &str) -> usize {
        svg.lines()
            .filter(|l| l.starts_with("<rect x=") && l.contains(r##"fill="#cd3131""##))
            .count()
    }

    fn capture_all_issues(s: &mut HeadlessSurface) -> String {
        s.apply_filter(true, true).unwrap();
        assert!(s.select_first().unwrap());
        String::from_utf8(s.capture("all issues").unwrap()).unwrap()
    }

    #[test]
    fn far_right_cell_scrolled_into_screenshot() {
        let header: Vec<String> = (0..40).map(|c| format!("Col{}", c)).collect();
        let values: Vec<String> = (0..40).map(|c| format!("value{}", c)).collect();
        let mut s = HeadlessSurface::new(160, 500);
        s.open().unwrap();
        s.attach(
            "wide.csv",
            Workbook::new(vec![Sheet::new("Wide", vec![header, values])]),
            vec![Issue::new("R1", Level::Error, 2, "Col39", "far right")],
        )
        .unwrap();

        let svg = capture_all_issues(&mut s);
        assert_eq!(s.session().highlight().scroll_target(), Some((0, 39)));
        assert!(s.view_state().scroll_col > 0);
        assert!(svg.contains("Col39"));
        assert_eq!(error_rects(&svg), 1);
    }

    #[test]
    fn row_past_max_rows_scrolled_into_screenshot() {
        let mut rows = vec![vec!["Name".to_string(), "Price".to_string()]];
        for i in 0..700 {
            rows.push(vec![format!("item{}", i), i.to_string()]);
        }
        let mut s = HeadlessSurface::new(160, 500);
        s.open().unwrap();
        s.attach(
            "long.csv",
            Workbook::new(vec![Sheet::new("Long", rows)]),
            vec![Issue::new("R1", Level::Error, 650, "Price", "deep")],
        )
        .unwrap();

        let svg = capture_all_issues(&mut s);
        assert_eq!(s.session().highlight().scroll_target(), Some((648, 1)));
        let scroll = s.view_state().scroll_row;
        assert!(scroll <= 648 && 648 < scroll + 500, "scroll_row {}", scroll);
        assert_eq!(error_rects(&svg), 1);
    }

    #[test]
    fn generation_follows_highlight_events() {
        let mut s = HeadlessSurface::new(120, 100);
        s.open().unwrap();
        assert_eq!(s.generation(), 0);
        s.attach("p", workbook(), vec![Issue::new("R1", Level::Error, 2, "Price", "x")]).unwrap();
        assert_eq!(s.generation(), s.session().generation());
        s.select_first().unwrap();
        assert_eq!(s.generation(), s.session().generation());
    }

    #[test]
    fn huge_issue_list_keeps_issue_panel() {
        let issues = vec![Issue::new("R1", Level::Error, 2, "Price", "x"); 65_534];
        let mut s = HeadlessSurface::new(20, 500);
        s.open().unwrap();
        s.attach("prices.xlsx", workbook(), issues).unwrap();

        let controls = s.controls();
        assert!(controls.attachments.iter().any(|a| a == view::ATTACH_ISSUES));
        assert!(controls.attachments.iter().any(|a| a == view::ATTACH_SPREADSHEET));
        assert!(s.capture("all issues").is_ok());
    }
}
