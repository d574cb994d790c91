//! `invctl browse`: the keyboard grid in a terminal.
//!
//! [`Browser`] holds all interaction state and renders to plain lines, so
//! it can be driven by synthetic key events in tests. [`run_browse`] owns
//! the terminal: raw mode, the alternate screen, and an event loop whose
//! poll timeout is the announcer's next deadline. The bottom status line is
//! the live region.
//!
//! | Key | Action |
//! |-----|--------|
//! | arrows, Home/End | move focus (Ctrl+Home/End for corners) |
//! | Enter/Space | toggle selection, or open details on a data cell |
//! | `/` | edit the query (Enter applies, Esc cancels) |
//! | `s` | cycle sort on the focused column |
//! | `a` / `A` | select all / clear selection |
//! | `c` | clear query and filters |
//! | `d` | delete the selection (confirm with `y`) |
//! | `q` | quit |

use std::io::{self, Write};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use crossterm::cursor::{Hide, MoveTo, Show};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::style::{Attribute, Print, SetAttribute};
use crossterm::terminal::{
    self, disable_raw_mode, enable_raw_mode, Clear, ClearType, EnterAlternateScreen,
    LeaveAlternateScreen,
};
use crossterm::{execute, queue};
use parking_lot::Mutex;

use infra_console_core::announcer::{
    Announcement, Announcer, LiveRegion, LiveRegionError, Priority, SystemClock,
};
use infra_console_core::columns::ColumnKind;
use infra_console_core::focus_trap::{FocusTrap, ReleaseReason};
use infra_console_core::grid::{GridContext, GridEvent, GridFocus, GridKey, KeyInput};
use infra_console_core::models::{Record, RecordKind};
use infra_console_core::selection::BulkOperation;
use infra_console_core::sort::SortDirection;
use infra_console_core::store::InventoryStore;
use infra_console_core::view::ListView;

use crate::config::Config;
use crate::db;
use crate::sqlite_store::SqliteStore;

const MAX_CELL_WIDTH: usize = 28;
const IDLE_POLL: Duration = Duration::from_millis(500);
/// Title, header, help and status lines.
const CHROME_LINES: usize = 4;

/// Live region shown as the bottom status line.
#[derive(Debug, Clone, Default)]
pub struct StatusLine {
    text: Arc<Mutex<String>>,
}

impl StatusLine {
    pub fn text(&self) -> String {
        self.text.lock().clone()
    }
}

impl LiveRegion for StatusLine {
    fn deliver(&mut self, announcement: &Announcement) -> Result<(), LiveRegionError> {
        *self.text.lock() = match announcement.priority {
            Priority::Assertive => format!("! {}", announcement.text),
            Priority::Polite => announcement.text.clone(),
        };
        Ok(())
    }
}

#[derive(Debug)]
enum Mode {
    Grid,
    /// Editing the query; holds the draft text.
    Query(String),
    Detail(FocusTrap<GridFocus>),
    ConfirmDelete(Vec<String>),
}

/// What the event loop must do after a key press.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    None,
    Quit,
    Delete(Vec<String>),
}

/// One rendered line. `focus` is the char range drawn in reverse video.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Line {
    pub text: String,
    pub focus: Option<(usize, usize)>,
}

impl Line {
    fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            focus: None,
        }
    }
}

#[derive(Debug)]
pub struct Browser {
    view: ListView,
    mode: Mode,
    status: StatusLine,
}

impl Browser {
    pub fn new(view: ListView, status: StatusLine) -> Self {
        Self {
            view,
            mode: Mode::Grid,
            status,
        }
    }

    pub fn view(&self) -> &ListView {
        &self.view
    }

    pub fn announcer(&self) -> Arc<Announcer> {
        self.view.grid().announcer().clone()
    }

    pub fn is_detail_open(&self) -> bool {
        matches!(self.mode, Mode::Detail(_))
    }

    pub fn handle_key(&mut self, key: KeyEvent) -> Action {
        if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
            return Action::Quit;
        }

        match std::mem::replace(&mut self.mode, Mode::Grid) {
            Mode::Grid => self.grid_key(key),
            Mode::Query(draft) => {
                self.query_key(key, draft);
                Action::None
            }
            Mode::Detail(trap) => {
                self.detail_key(key, trap);
                Action::None
            }
            Mode::ConfirmDelete(ids) => match key.code {
                KeyCode::Char('y') | KeyCode::Char('Y') => Action::Delete(ids),
                _ => {
                    self.announcer().polite("Delete cancelled");
                    Action::None
                }
            },
        }
    }

    fn grid_key(&mut self, key: KeyEvent) -> Action {
        match key.code {
            KeyCode::Char('q') => return Action::Quit,
            KeyCode::Char('/') => {
                let draft = self.view.criteria().query.clone().unwrap_or_default();
                self.mode = Mode::Query(draft);
            }
            KeyCode::Char('s') => {
                let column = self.view.grid().focus().column;
                if self.view.toggle_sort(column).is_none() {
                    self.announcer().polite("Column is not sortable");
                }
            }
            KeyCode::Char('a') => self.view.grid_mut().select_all(),
            KeyCode::Char('A') => self.view.grid_mut().clear_selection(),
            KeyCode::Char('c') => self.view.clear_filters(),
            KeyCode::Char('d') => {
                let ids = self.view.selected_ids();
                if ids.is_empty() {
                    self.announcer().polite("No rows selected");
                } else {
                    self.announcer().assertive(format!(
                        "Delete {}? Press y to confirm",
                        count_noun(ids.len(), self.view.kind())
                    ));
                    self.mode = Mode::ConfirmDelete(ids);
                }
            }
            _ => {
                if let Some(input) = grid_input(key) {
                    let outcome = self.view.grid_mut().handle_key(input);
                    if let Some(GridEvent::Activated { row, column }) = outcome.event {
                        self.open_detail(row, column);
                    }
                }
            }
        }
        Action::None
    }

    fn query_key(&mut self, key: KeyEvent, mut draft: String) {
        match key.code {
            KeyCode::Enter => self.view.set_query(draft),
            KeyCode::Esc => {}
            KeyCode::Backspace => {
                draft.pop();
                self.mode = Mode::Query(draft);
            }
            KeyCode::Char(c) => {
                draft.push(c);
                self.mode = Mode::Query(draft);
            }
            _ => self.mode = Mode::Query(draft),
        }
    }

    fn detail_key(&mut self, key: KeyEvent, mut trap: FocusTrap<GridFocus>) {
        let reason = match key.code {
            KeyCode::Esc => ReleaseReason::Escape,
            KeyCode::Enter => ReleaseReason::Completed,
            KeyCode::Tab => {
                trap.cycle(true);
                self.mode = Mode::Detail(trap);
                return;
            }
            KeyCode::BackTab => {
                trap.cycle(false);
                self.mode = Mode::Detail(trap);
                return;
            }
            _ => {
                self.mode = Mode::Detail(trap);
                return;
            }
        };
        if let Some(focus) = trap.release(reason) {
            self.view.grid_mut().focus_cell(focus.row, focus.column);
        }
    }

    fn open_detail(&mut self, row: usize, column: usize) {
        let Some(record) = self.view.record_at(row) else {
            return;
        };
        self.announcer()
            .polite(format!("Details for {}. Press Escape to close", record.name()));
        self.mode = Mode::Detail(FocusTrap::engage(GridFocus { row, column }, 1));
    }

    /// Drop deleted records from the view after the store confirmed.
    pub fn apply_deleted(&mut self, ids: &[String], affected: usize) {
        for id in ids {
            self.view.remove_record(id);
        }
        self.announcer().assertive(format!(
            "Deleted {}",
            count_noun(affected, self.view.kind())
        ));
    }

    /// Render the whole screen as `height` lines at most.
    pub fn render(&self, height: usize) -> Vec<Line> {
        let mut lines = vec![Line::plain(self.title())];
        let body_height = height.saturating_sub(CHROME_LINES).max(1);

        match &self.mode {
            Mode::Detail(trap) => {
                lines.push(Line::plain(""));
                if let Some(record) = trap.return_to().and_then(|f| self.view.record_at(f.row)) {
                    lines.extend(detail_lines(record).into_iter().map(Line::plain));
                }
                let close = "[ Close ]";
                lines.push(Line {
                    text: format!("  {}", close),
                    focus: Some((2, close.chars().count())),
                });
            }
            _ => {
                let widths = self.column_widths();
                lines.push(Line::plain(self.header_line(&widths)));
                if let Some(empty) = self.view.empty_state() {
                    lines.push(Line::plain(format!("  {}", empty.title)));
                    lines.push(Line::plain(format!("  {}", empty.description)));
                } else {
                    let focus = self.view.grid().focus();
                    let offset = (focus.row + 1).saturating_sub(body_height);
                    for row in offset..(offset + body_height).min(self.view.rendered().len()) {
                        lines.push(self.row_line(row, &widths, focus));
                    }
                }
            }
        }

        lines.truncate(height.saturating_sub(2).max(1));
        lines.push(Line::plain(
            "arrows move  Enter open  / search  s sort  a/A select  c clear  d delete  q quit",
        ));
        lines.push(Line::plain(match &self.mode {
            Mode::Query(draft) => format!("/{}", draft),
            _ => self.status.text(),
        }));
        lines
    }

    fn title(&self) -> String {
        let mut title = format!(
            "{} | {} | {} selected",
            self.view.kind().plural(),
            self.view.result_count_message(),
            self.view.grid().selection().count()
        );
        if let Some(q) = self.view.criteria().query_text() {
            title.push_str(&format!(" | query: {}", q));
        }
        title
    }

    fn cell_text(&self, row: usize, column: usize) -> String {
        let grid = self.view.grid();
        let Some(col) = grid.columns().get(column) else {
            return String::new();
        };
        if col.kind == ColumnKind::Selection {
            return if grid.selection().is_selected(row) {
                "[x]".to_string()
            } else {
                "[ ]".to_string()
            };
        }
        self.view
            .record_at(row)
            .map(|r| truncate(&col.key.display(r), MAX_CELL_WIDTH))
            .unwrap_or_default()
    }

    fn header_label(&self, column: usize) -> String {
        let grid = self.view.grid();
        let col = &grid.columns()[column];
        if col.kind == ColumnKind::Selection {
            return if grid.selection().all_selected() {
                "[x]".to_string()
            } else {
                "[ ]".to_string()
            };
        }
        match grid.sort_state().direction_of(column) {
            Some(SortDirection::Ascending) => format!("{} ^", col.label),
            Some(SortDirection::Descending) => format!("{} v", col.label),
            None => col.label.to_string(),
        }
    }

    fn column_widths(&self) -> Vec<usize> {
        (0..self.view.grid().column_count())
            .map(|c| {
                (0..self.view.rendered().len())
                    .map(|r| self.cell_text(r, c).chars().count())
                    .chain(std::iter::once(self.header_label(c).chars().count()))
                    .max()
                    .unwrap_or(0)
            })
            .collect()
    }

    fn header_line(&self, widths: &[usize]) -> String {
        let cells: Vec<String> = widths
            .iter()
            .enumerate()
            .map(|(c, w)| pad(&self.header_label(c), *w))
            .collect();
        format!("  {}", cells.join("  ")).trim_end().to_string()
    }

    fn row_line(&self, row: usize, widths: &[usize], focus: GridFocus) -> Line {
        let mut text = if row == focus.row { "> " } else { "  " }.to_string();
        let mut span = None;
        for (c, w) in widths.iter().enumerate() {
            if c > 0 {
                text.push_str("  ");
            }
            if row == focus.row && c == focus.column {
                span = Some((text.chars().count(), *w));
            }
            text.push_str(&pad(&self.cell_text(row, c), *w));
        }
        Line { text, focus: span }
    }
}

fn grid_input(key: KeyEvent) -> Option<KeyInput> {
    let grid_key = match key.code {
        KeyCode::Up => GridKey::Up,
        KeyCode::Down => GridKey::Down,
        KeyCode::Left => GridKey::Left,
        KeyCode::Right => GridKey::Right,
        KeyCode::Home => GridKey::Home,
        KeyCode::End => GridKey::End,
        KeyCode::Enter => GridKey::Enter,
        KeyCode::Char(' ') => GridKey::Space,
        _ => return None,
    };
    Some(if key.modifiers.contains(KeyModifiers::CONTROL) {
        KeyInput::with_modifier(grid_key)
    } else {
        KeyInput::plain(grid_key)
    })
}

fn count_noun(n: usize, kind: RecordKind) -> String {
    let noun = if n == 1 { kind.singular() } else { kind.plural() };
    format!("{} {}", n, noun)
}

fn pad(text: &str, width: usize) -> String {
    format!("{:<width$}", text, width = width)
}

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let mut out: String = text.chars().take(max.saturating_sub(1)).collect();
    out.push('~');
    out
}

fn detail_lines(record: &Record) -> Vec<String> {
    let mut lines = vec![format!("  {}", record.name()), format!("  id: {}", record.id())];
    match record {
        Record::Service(s) => {
            lines.push(format!("  type: {}", s.category));
            lines.push(format!("  ips: {}", s.ips.join(", ")));
            let ports: Vec<String> = s.ports.iter().map(u16::to_string).collect();
            lines.push(format!("  ports: {}", ports.join(", ")));
            if let Some(vlan) = s.vlan {
                lines.push(format!("  vlan: {}", vlan));
            }
            if let Some(domain) = &s.domain {
                lines.push(format!("  domain: {}", domain));
            }
            if let Some(group) = &s.group {
                lines.push(format!("  group: {}", group.name));
            }
        }
        Record::Group(g) => {
            if let Some(description) = &g.description {
                lines.push(format!("  description: {}", description));
            }
            lines.push(format!("  services: {}", g.service_count));
        }
    }
    lines.push(String::new());
    lines
}

fn draw(out: &mut impl Write, browser: &Browser) -> Result<()> {
    let (width, height) = terminal::size().context("read terminal size")?;
    let width = width as usize;
    queue!(out, MoveTo(0, 0), Clear(ClearType::All))?;
    for (i, line) in browser.render(height as usize).iter().enumerate() {
        queue!(out, MoveTo(0, i as u16))?;
        let chars: Vec<char> = line.text.chars().take(width).collect();
        match line.focus {
            Some((start, len)) if start < chars.len() => {
                let end = (start + len).min(chars.len());
                let before: String = chars[..start].iter().collect();
                let span: String = chars[start..end].iter().collect();
                let after: String = chars[end..].iter().collect();
                queue!(
                    out,
                    Print(before),
                    SetAttribute(Attribute::Reverse),
                    Print(span),
                    SetAttribute(Attribute::Reset),
                    Print(after)
                )?;
            }
            _ => queue!(out, Print(chars.into_iter().collect::<String>()))?,
        }
    }
    out.flush()?;
    Ok(())
}

async fn event_loop(
    out: &mut impl Write,
    browser: &mut Browser,
    store: &dyn InventoryStore,
) -> Result<()> {
    let announcer = browser.announcer();
    loop {
        announcer.flush();
        draw(out, browser)?;

        let timeout = announcer
            .next_deadline()
            .map(|due| due.saturating_duration_since(Instant::now()))
            .unwrap_or(IDLE_POLL);
        if !event::poll(timeout).context("poll event")? {
            continue;
        }

        match event::read().context("read event")? {
            Event::Key(key) if key.kind == KeyEventKind::Press => match browser.handle_key(key) {
                Action::Quit => return Ok(()),
                Action::Delete(ids) => {
                    match store.execute_bulk(BulkOperation::Delete, &ids, None).await {
                        Ok(outcome) => browser.apply_deleted(&ids, outcome.affected),
                        Err(e) => {
                            tracing::warn!(error = %e, "bulk delete failed");
                            announcer.assertive(format!("Delete failed: {}", e));
                        }
                    }
                }
                Action::None => {}
            },
            _ => {}
        }
    }
}

/// Run the interactive browser over every record of `kind`.
pub async fn run_browse(config: &Config, kind: RecordKind) -> Result<()> {
    let store = SqliteStore::new(db::connect(config).await?);

    let status = StatusLine::default();
    let announcer = Arc::new(Announcer::new(
        config.announcer.to_announcer_config(),
        Arc::new(SystemClock),
        Box::new(status.clone()),
    ));
    let mut view = ListView::new(kind, GridContext::new(announcer, config.grid.to_grid_config()));
    view.set_records(store.list_records(kind).await?);
    let mut browser = Browser::new(view, status);

    enable_raw_mode().context("enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, Hide).context("enter alternate screen")?;

    let result = event_loop(&mut stdout, &mut browser, &store).await;

    disable_raw_mode().context("disable raw mode")?;
    execute!(stdout, Show, LeaveAlternateScreen).context("leave alternate screen")?;
    store.pool().close().await;
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use infra_console_core::announcer::{AnnouncerConfig, ManualClock};
    use infra_console_core::grid::GridConfig;
    use infra_console_core::models::{Category, Service};

    fn service(id: &str, name: &str, category: Category) -> Record {
        let now = Utc::now();
        Record::Service(Service {
            id: id.to_string(),
            name: name.to_string(),
            category,
            ips: vec!["10.0.0.1".to_string()],
            ports: vec![443],
            vlan: None,
            domain: None,
            group: None,
            created_at: now,
            updated_at: now,
        })
    }

    fn browser() -> (Browser, Arc<ManualClock>, StatusLine) {
        let clock = Arc::new(ManualClock::new());
        let status = StatusLine::default();
        let announcer = Arc::new(Announcer::new(
            AnnouncerConfig::default(),
            clock.clone(),
            Box::new(status.clone()),
        ));
        let view = ListView::with_records(
            RecordKind::Service,
            GridContext::new(announcer, GridConfig::default()),
            vec![
                service("s1", "web-server-01", Category::Web),
                service("s2", "db-01", Category::Database),
            ],
        );
        (Browser::new(view, status.clone()), clock, status)
    }

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn settle(browser: &Browser, clock: &ManualClock) {
        clock.advance(Duration::from_millis(500));
        browser.announcer().flush();
    }

    #[test]
    fn test_enter_on_data_cell_opens_trapped_detail() {
        let (mut b, _, _) = browser();
        b.handle_key(key(KeyCode::Right));
        b.handle_key(key(KeyCode::Down));
        b.handle_key(key(KeyCode::Enter));
        assert!(b.is_detail_open());

        // Arrow keys stay inside the dialog.
        b.handle_key(key(KeyCode::Up));
        assert!(b.is_detail_open());

        b.handle_key(key(KeyCode::Esc));
        assert!(!b.is_detail_open());
        assert_eq!(b.view().grid().focus(), GridFocus { row: 1, column: 1 });
    }

    #[test]
    fn test_space_on_checkbox_toggles_selection() {
        let (mut b, clock, status) = browser();
        b.handle_key(key(KeyCode::Char(' ')));
        assert!(b.view().grid().selection().is_selected(0));
        settle(&b, &clock);
        assert_eq!(status.text(), "Row 1 selected");
    }

    #[test]
    fn test_query_mode_applies_on_enter() {
        let (mut b, clock, status) = browser();
        b.handle_key(key(KeyCode::Char('/')));
        for c in "web".chars() {
            b.handle_key(key(KeyCode::Char(c)));
        }
        assert_eq!(b.render(20).last().unwrap().text, "/web");
        assert_eq!(b.view().rendered().len(), 2);

        b.handle_key(key(KeyCode::Enter));
        assert_eq!(b.view().rendered().len(), 1);
        assert_eq!(b.view().total(), 2);
        settle(&b, &clock);
        assert_eq!(status.text(), "1 service");
    }

    #[test]
    fn test_query_mode_escape_discards_draft() {
        let (mut b, _, _) = browser();
        b.handle_key(key(KeyCode::Char('/')));
        b.handle_key(key(KeyCode::Char('x')));
        b.handle_key(key(KeyCode::Esc));
        assert_eq!(b.view().rendered().len(), 2);
        assert_eq!(b.handle_key(key(KeyCode::Char('q'))), Action::Quit);
    }

    #[test]
    fn test_bulk_delete_requires_confirmation() {
        let (mut b, clock, status) = browser();
        assert_eq!(b.handle_key(key(KeyCode::Char('d'))), Action::None);

        b.handle_key(key(KeyCode::Char('a')));
        settle(&b, &clock);
        assert_eq!(status.text(), "All 2 rows selected");
        assert_eq!(b.handle_key(key(KeyCode::Char('d'))), Action::None);
        let action = b.handle_key(key(KeyCode::Char('y')));
        let Action::Delete(ids) = action else {
            panic!("expected delete, got {:?}", action);
        };
        assert_eq!(ids.len(), 2);

        b.apply_deleted(&ids[..1], 1);
        assert_eq!(b.view().rendered().len(), 1);
        settle(&b, &clock);
        assert_eq!(status.text(), "! Deleted 1 service");
    }

    #[test]
    fn test_sort_key_cycles_focused_column() {
        let (mut b, _, _) = browser();
        b.handle_key(key(KeyCode::Right));
        b.handle_key(key(KeyCode::Char('s')));
        let names: Vec<&str> = b.view().rendered().iter().map(|r| r.name()).collect();
        assert_eq!(names, vec!["db-01", "web-server-01"]);
        assert!(b.render(20)[1].text.contains("Name ^"));
    }

    #[test]
    fn test_render_draws_only_rendered_rows_after_query() {
        let (mut b, _, _) = browser();
        b.handle_key(key(KeyCode::Char('/')));
        for c in "web".chars() {
            b.handle_key(key(KeyCode::Char(c)));
        }
        b.handle_key(key(KeyCode::Enter));
        assert_eq!(b.view().rendered().len(), 1);

        let lines = b.render(20);
        // title, header, rows, help, status
        let rows: Vec<&str> = lines[2..lines.len() - 2].iter().map(|l| l.text.as_str()).collect();
        assert_eq!(rows.len(), 1, "rows: {:?}", rows);
        assert!(rows[0].contains("web-server-01"));
    }

    #[test]
    fn test_render_marks_focused_cell() {
        let (mut b, _, _) = browser();
        b.handle_key(key(KeyCode::Down));
        let lines = b.render(20);
        let row = &lines[3];
        assert!(row.text.starts_with("> [ ]"));
        assert_eq!(row.focus, Some((2, 3)));
        assert!(lines[2].focus.is_none());
    }

    #[test]
    fn test_ctrl_c_quits_from_any_mode() {
        let (mut b, _, _) = browser();
        b.handle_key(key(KeyCode::Char('/')));
        let ctrl_c = KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL);
        assert_eq!(b.handle_key(ctrl_c), Action::Quit);
    }

    #[test]
    fn test_truncate_marks_cut() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("abcdefghij", 5), "abcd~");
    }
}
