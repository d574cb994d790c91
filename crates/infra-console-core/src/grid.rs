//! Keyboard focus and navigation for a two-dimensional data grid.
//!
//! [`GridEngine`] owns the single focused cell, the row selection, and the
//! sort controller for one rendered list. It never touches a terminal or a
//! DOM: callers translate their input into [`KeyInput`], feed it to
//! [`GridEngine::handle_key`], and act on the returned [`KeyOutcome`].
//!
//! Focus is stored as one `(row, column)` pair, so at most one cell can be
//! active. Every dimension change clamps it back into the grid.

use std::sync::Arc;

use serde::Serialize;

use crate::announcer::Announcer;
use crate::columns::{Column, ColumnKind};
use crate::selection::SelectionModel;
use crate::sort::{SortController, SortDirection, SortState};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GridKey {
    Up,
    Down,
    Left,
    Right,
    Home,
    End,
    Enter,
    Space,
    Other,
}

/// One key press. `modifier` is Ctrl (or Cmd) held down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyInput {
    pub key: GridKey,
    pub modifier: bool,
}

impl KeyInput {
    pub fn plain(key: GridKey) -> Self {
        Self {
            key,
            modifier: false,
        }
    }

    pub fn with_modifier(key: GridKey) -> Self {
        Self {
            key,
            modifier: true,
        }
    }
}

/// A cell position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct GridFocus {
    pub row: usize,
    pub column: usize,
}

/// Where keyboard focus lands for a cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FocusTarget {
    /// The checkbox or link hosted in the cell.
    Interactive { row: usize, column: usize },
    /// The cell itself.
    Cell { row: usize, column: usize },
}

impl FocusTarget {
    pub fn position(&self) -> GridFocus {
        match *self {
            FocusTarget::Interactive { row, column } | FocusTarget::Cell { row, column } => {
                GridFocus { row, column }
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum GridEvent {
    FocusMoved { target: FocusTarget },
    SelectionToggled { row: usize, selected: bool },
    /// Enter/Space on a data cell; the caller opens the record.
    Activated { row: usize, column: usize },
}

/// Result of one key press.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyOutcome {
    /// The default action should be suppressed.
    pub handled: bool,
    pub event: Option<GridEvent>,
}

impl KeyOutcome {
    fn ignored() -> Self {
        Self {
            handled: false,
            event: None,
        }
    }

    fn handled(event: GridEvent) -> Self {
        Self {
            handled: true,
            event: Some(event),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridConfig {
    pub multi_select: bool,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self { multi_select: true }
    }
}

/// Collaborators handed to every grid at construction.
#[derive(Debug, Clone)]
pub struct GridContext {
    pub announcer: Arc<Announcer>,
    pub config: GridConfig,
}

impl GridContext {
    pub fn new(announcer: Arc<Announcer>, config: GridConfig) -> Self {
        Self { announcer, config }
    }
}

/// `aria-sort` value of a column header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HeaderSort {
    None,
    Ascending,
    Descending,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnHeader {
    pub index: usize,
    pub label: &'static str,
    pub sort: HeaderSort,
}

/// Snapshot of what assistive technology sees.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GridAccessibility {
    pub row_count: usize,
    pub column_count: usize,
    pub multiselectable: bool,
    pub columns: Vec<ColumnHeader>,
    pub active_cell: Option<GridFocus>,
    pub selected_rows: Vec<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CellAttributes {
    /// 0 on the active cell, -1 everywhere else.
    pub tab_index: i32,
    pub active: bool,
    pub selected: bool,
}

#[derive(Debug)]
pub struct GridEngine {
    ctx: GridContext,
    columns: Vec<Column>,
    row_count: usize,
    focus: GridFocus,
    selection: SelectionModel,
    sort: SortController,
    loading: bool,
}

impl GridEngine {
    pub fn new(ctx: GridContext, columns: Vec<Column>, row_count: usize) -> Self {
        Self {
            ctx,
            columns,
            row_count,
            focus: GridFocus::default(),
            selection: SelectionModel::new(row_count),
            sort: SortController::new(),
            loading: false,
        }
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn row_count(&self) -> usize {
        self.row_count
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn focus(&self) -> GridFocus {
        self.focus
    }

    pub fn selection(&self) -> &SelectionModel {
        &self.selection
    }

    pub fn sort_state(&self) -> SortState {
        self.sort.state()
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn announcer(&self) -> &Arc<Announcer> {
        &self.ctx.announcer
    }

    fn is_empty(&self) -> bool {
        self.loading || self.row_count == 0 || self.columns.is_empty()
    }

    /// Index of the checkbox column, when multi-select is on.
    pub fn selection_column(&self) -> Option<usize> {
        if !self.ctx.config.multi_select {
            return None;
        }
        self.columns
            .iter()
            .position(|c| c.kind == ColumnKind::Selection)
    }

    fn target(&self, focus: GridFocus) -> FocusTarget {
        let interactive = self
            .columns
            .get(focus.column)
            .is_some_and(|c| c.interactive);
        if interactive {
            FocusTarget::Interactive {
                row: focus.row,
                column: focus.column,
            }
        } else {
            FocusTarget::Cell {
                row: focus.row,
                column: focus.column,
            }
        }
    }

    fn clamp_focus(&mut self) {
        let last_row = self.row_count.saturating_sub(1);
        let last_col = self.columns.len().saturating_sub(1);
        self.focus.row = self.focus.row.min(last_row);
        self.focus.column = self.focus.column.min(last_col);
    }

    fn move_to(&mut self, row: usize, column: usize) -> KeyOutcome {
        self.focus = GridFocus { row, column };
        KeyOutcome::handled(GridEvent::FocusMoved {
            target: self.target(self.focus),
        })
    }

    /// Process one key press.
    pub fn handle_key(&mut self, input: KeyInput) -> KeyOutcome {
        if self.is_empty() {
            return KeyOutcome::ignored();
        }
        let GridFocus { row, column } = self.focus;
        let last_row = self.row_count - 1;
        let last_col = self.columns.len() - 1;

        match input.key {
            GridKey::Right if column < last_col => self.move_to(row, column + 1),
            GridKey::Left if column > 0 => self.move_to(row, column - 1),
            GridKey::Down if row < last_row => self.move_to(row + 1, column),
            GridKey::Up if row > 0 => self.move_to(row - 1, column),
            GridKey::Home if input.modifier => self.move_to(0, 0),
            GridKey::Home => self.move_to(row, 0),
            GridKey::End if input.modifier => self.move_to(last_row, last_col),
            GridKey::End => self.move_to(row, last_col),
            GridKey::Enter | GridKey::Space => self.activate(row, column),
            _ => KeyOutcome::ignored(),
        }
    }

    fn activate(&mut self, row: usize, column: usize) -> KeyOutcome {
        if self.selection_column() == Some(column) {
            let selected = self.selection.toggle(row);
            let state = if selected { "selected" } else { "unselected" };
            self.ctx
                .announcer
                .polite(format!("Row {} {}", row + 1, state));
            return KeyOutcome::handled(GridEvent::SelectionToggled { row, selected });
        }
        KeyOutcome::handled(GridEvent::Activated { row, column })
    }

    /// Move focus to a clicked cell (clamped).
    pub fn focus_cell(&mut self, row: usize, column: usize) -> Option<FocusTarget> {
        if self.is_empty() {
            return None;
        }
        self.focus = GridFocus { row, column };
        self.clamp_focus();
        Some(self.target(self.focus))
    }

    /// Cycle the sort on `column`. Clears the selection because the
    /// rendered order is about to change. `None` when the column is not
    /// sortable.
    pub fn toggle_sort(&mut self, column: usize) -> Option<SortState> {
        let col = self.columns.get(column).filter(|c| c.sortable)?;
        let label = col.label;
        let state = self.sort.activate(column, label, &self.ctx.announcer);
        self.selection.clear_all();
        self.clamp_focus();
        Some(state)
    }

    /// Replace the sort state without announcing (restoring a saved view).
    pub fn set_sort_state(&mut self, state: SortState) {
        self.sort = SortController::with_state(state);
    }

    /// The rendered sequence changed: clear selection and clamp focus.
    pub fn set_row_count(&mut self, row_count: usize) {
        self.row_count = row_count;
        self.selection.set_row_count(row_count);
        self.clamp_focus();
    }

    /// A single row was deleted; selection positions above it shift down.
    pub fn remove_row(&mut self, row: usize) {
        if row >= self.row_count {
            return;
        }
        self.selection.remove_position(row);
        self.row_count -= 1;
        self.clamp_focus();
    }

    pub fn set_loading(&mut self, loading: bool) {
        self.loading = loading;
        if loading {
            self.selection.clear_all();
        }
    }

    pub fn select_all(&mut self) {
        if self.is_empty() || self.selection_column().is_none() {
            return;
        }
        self.selection.select_all();
        self.ctx
            .announcer
            .polite(format!("All {} rows selected", self.row_count));
    }

    pub fn clear_selection(&mut self) {
        if self.selection.is_empty() {
            return;
        }
        self.selection.clear_all();
        self.ctx.announcer.polite("Selection cleared");
    }

    pub fn accessibility(&self) -> GridAccessibility {
        let sort = self.sort.state();
        let columns = self
            .columns
            .iter()
            .enumerate()
            .map(|(index, c)| ColumnHeader {
                index,
                label: c.label,
                sort: match sort.direction_of(index) {
                    Some(SortDirection::Ascending) => HeaderSort::Ascending,
                    Some(SortDirection::Descending) => HeaderSort::Descending,
                    None => HeaderSort::None,
                },
            })
            .collect();
        let row_count = if self.loading { 0 } else { self.row_count };
        GridAccessibility {
            row_count,
            column_count: self.columns.len(),
            multiselectable: self.selection_column().is_some(),
            columns,
            active_cell: (!self.is_empty()).then_some(self.focus),
            selected_rows: self.selection.positions(),
        }
    }

    pub fn cell_attributes(&self, row: usize, column: usize) -> CellAttributes {
        let active = !self.is_empty() && self.focus == GridFocus { row, column };
        CellAttributes {
            tab_index: if active { 0 } else { -1 },
            active,
            selected: self.selection.is_selected(row),
        }
    }
}
