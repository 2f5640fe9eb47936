pub mod view;

use std::cell::RefCell;
use std::io::stdout;
use std::rc::Rc;
use std::time::Duration;

use auditgrid_engine::events::EventCollector;
use auditgrid_engine::review::ReviewSession;
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    terminal::{self, EnterAlternateScreen, LeaveAlternateScreen},
    ExecutableCommand,
};
use ratatui::{backend::CrosstermBackend, layout::Rect, Terminal};

use view::ViewState;

/// Issue lines shown in the interactive issue panel.
const LIST_ROWS: u16 = 8;

/// Interactive reviewer: a [`ReviewSession`] plus presentation state.
pub struct ReviewApp {
    session: ReviewSession,
    view: ViewState,
    /// Session notifications not yet folded into `view`.
    events: Rc<RefCell<EventCollector>>,
    should_quit: bool,
}

impl ReviewApp {
    pub fn new(mut session: ReviewSession, file_name: impl Into<String>) -> Self {
        let mut view = ViewState::new(file_name);
        view.interactive = true;
        view.sync_grid(&session);
        if let Some(position) = session.highlight().active() {
            view.list_cursor = position;
        }

        let events = Rc::new(RefCell::new(EventCollector::new()));
        let sink = Rc::clone(&events);
        session.subscribe(Box::new(move |e| sink.borrow_mut().push(e.clone())));

        Self {
            session,
            view,
            events,
            should_quit: false,
        }
    }

    pub fn session(&self) -> &ReviewSession {
        &self.session
    }

    pub fn view(&self) -> &ViewState {
        &self.view
    }

    pub fn should_quit(&self) -> bool {
        self.should_quit
    }

    pub fn handle_key(&mut self, key: KeyEvent) {
        self.dispatch(key);
        let events = self.events.borrow_mut().take();
        view::apply_events(&mut self.view, &self.session, &events);
        let last = self.session.store().rules().len().saturating_sub(1);
        self.view.rule_cursor = self.view.rule_cursor.min(last);
    }

    fn dispatch(&mut self, key: KeyEvent) {
        if self.view.show_help {
            // Any key dismisses help
            self.view.show_help = false;
            return;
        }

        match key.code {
            KeyCode::Char('q') | KeyCode::Esc => self.should_quit = true,
            KeyCode::Char('?') => self.view.show_help = true,
            KeyCode::Char('e') => {
                let on = !self.session.store().state().show_errors;
                self.session.set_show_errors(on);
            }
            KeyCode::Char('w') => {
                let on = !self.session.store().state().show_warnings;
                self.session.set_show_warnings(on);
            }
            KeyCode::Char('r') => {
                let rules = self.session.store().rule_checkboxes();
                if let Some((rule, on)) = rules.get(self.view.rule_cursor).cloned() {
                    self.session.set_rule_enabled(&rule, !on);
                }
            }
            KeyCode::Char('a') => {
                self.session.set_all_rules(true);
            }
            KeyCode::Left => {
                self.view.rule_cursor = self.view.rule_cursor.saturating_sub(1);
            }
            KeyCode::Right => {
                let last = self.session.store().rules().len().saturating_sub(1);
                self.view.rule_cursor = (self.view.rule_cursor + 1).min(last);
            }
            KeyCode::Char('n') | KeyCode::Char(']') => {
                if self.session.highlight().can_next() {
                    self.session.move_active(1);
                }
            }
            KeyCode::Char('p') | KeyCode::Char('[') => {
                if self.session.highlight().can_prev() {
                    self.session.move_active(-1);
                }
            }
            KeyCode::Up => {
                self.view.list_cursor = self.view.list_cursor.saturating_sub(1);
            }
            KeyCode::Down => {
                let last = self.session.store().view().len().saturating_sub(1);
                self.view.list_cursor = (self.view.list_cursor + 1).min(last);
            }
            KeyCode::Enter => {
                if !self.session.store().view().is_empty() {
                    self.session.select_issue(self.view.list_cursor);
                }
            }
            KeyCode::Tab if key.modifiers.contains(KeyModifiers::SHIFT) => self.switch_sheet(-1),
            KeyCode::Tab => self.switch_sheet(1),
            KeyCode::BackTab => self.switch_sheet(-1),
            _ => {}
        }
    }

    fn switch_sheet(&mut self, delta: isize) {
        let names = self.session.sheet_selector();
        if names.len() < 2 {
            return;
        }
        let current = self.session.active_sheet_index().unwrap_or(0) as isize;
        let len = names.len() as isize;
        let next = (current + delta).rem_euclid(len) as usize;
        let name = names[next].clone();
        self.session.render_sheet(&name);
    }

    /// Scroll grid and list so the active cell and list cursor are visible.
    pub fn ensure_visible(&mut self, area: Rect) {
        let grid_rows = area
            .height
            .saturating_sub(view::CHROME_ROWS + view::GRID_HEADER_ROWS + LIST_ROWS + view::ISSUE_PANEL_BORDER)
            as usize;

        view::scroll_into_view(&mut self.view, &self.session, grid_rows, area.width);

        let list_rows = LIST_ROWS as usize;
        if self.view.list_cursor < self.view.list_scroll {
            self.view.list_scroll = self.view.list_cursor;
        }
        if self.view.list_cursor >= self.view.list_scroll + list_rows {
            self.view.list_scroll = self.view.list_cursor + 1 - list_rows;
        }
    }
}

/// Run the interactive reviewer until the user quits.
pub fn run(session: ReviewSession, file_name: String) -> Result<(), String> {
    let mut app = ReviewApp::new(session, file_name);

    terminal::enable_raw_mode().map_err(|e| format!("failed to enable raw mode: {}", e))?;
    stdout()
        .execute(EnterAlternateScreen)
        .map_err(|e| format!("failed to enter alternate screen: {}", e))?;

    // Log lines would corrupt the alternate screen
    let previous_level = log::max_level();
    crate::logging::set_level(log::LevelFilter::Error);

    struct Cleanup(log::LevelFilter);
    impl Drop for Cleanup {
        fn drop(&mut self) {
            let _ = stdout().execute(LeaveAlternateScreen);
            let _ = terminal::disable_raw_mode();
            crate::logging::set_level(self.0);
        }
    }
    let _cleanup = Cleanup(previous_level);

    let backend = CrosstermBackend::new(stdout());
    let mut terminal = Terminal::new(backend).map_err(|e| format!("failed to create terminal: {}", e))?;

    loop {
        let size = terminal
            .size()
            .map(|s| Rect::new(0, 0, s.width, s.height))
            .unwrap_or_default();
        app.ensure_visible(size);

        terminal
            .draw(|frame| {
                view::draw(frame, &app.session, &app.view, LIST_ROWS);
            })
            .map_err(|e| format!("draw error: {}", e))?;

        if event::poll(Duration::from_millis(100)).map_err(|e| format!("event poll error: {}", e))? {
            if let Event::Key(key) = event::read().map_err(|e| format!("event read error: {}", e))? {
                if key.kind == KeyEventKind::Press {
                    app.handle_key(key);
                }
            }
        }

        if app.should_quit {
            break;
        }
    }

    Ok(())
}
