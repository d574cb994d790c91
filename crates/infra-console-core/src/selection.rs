//! Row selection over the rendered sequence.
//!
//! Positions index the rendered rows, not record ids: any change to the
//! rendered sequence must clear the selection (see
//! [`SelectionModel::set_row_count`]). The one exception is a single-row
//! delete, handled by [`SelectionModel::remove_position`].

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::models::Record;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectionModel {
    selected: BTreeSet<usize>,
    row_count: usize,
}

impl SelectionModel {
    pub fn new(row_count: usize) -> Self {
        Self {
            selected: BTreeSet::new(),
            row_count,
        }
    }

    pub fn row_count(&self) -> usize {
        self.row_count
    }

    /// Flip `row`. Returns the new selected state; out-of-range rows are
    /// ignored and report `false`.
    pub fn toggle(&mut self, row: usize) -> bool {
        if row >= self.row_count {
            return false;
        }
        if self.selected.remove(&row) {
            false
        } else {
            self.selected.insert(row);
            true
        }
    }

    pub fn select_all(&mut self) {
        self.selected = (0..self.row_count).collect();
    }

    pub fn clear_all(&mut self) {
        self.selected.clear();
    }

    pub fn count(&self) -> usize {
        self.selected.len()
    }

    pub fn is_empty(&self) -> bool {
        self.selected.is_empty()
    }

    pub fn is_selected(&self, row: usize) -> bool {
        self.selected.contains(&row)
    }

    /// True when every row is selected and there is at least one row.
    pub fn all_selected(&self) -> bool {
        self.row_count > 0 && self.selected.len() == self.row_count
    }

    /// Selected positions in ascending order.
    pub fn positions(&self) -> Vec<usize> {
        self.selected.iter().copied().collect()
    }

    /// The rendered sequence changed: adopt the new length and clear.
    pub fn set_row_count(&mut self, row_count: usize) {
        self.row_count = row_count;
        self.selected.clear();
    }

    /// Row `row` was removed from the rendered sequence. Higher positions
    /// shift down so they keep pointing at the same records.
    pub fn remove_position(&mut self, row: usize) {
        if row >= self.row_count {
            return;
        }
        self.row_count -= 1;
        self.selected = self
            .selected
            .iter()
            .filter(|&&p| p != row)
            .map(|&p| if p > row { p - 1 } else { p })
            .collect();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BulkOperation {
    Delete,
    MoveToGroup,
}

/// A bulk action over the current selection, executed by the store layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BulkCommand {
    pub operation: BulkOperation,
    pub row_positions: Vec<usize>,
    /// Only meaningful for `MoveToGroup`; `None` removes the group.
    pub target_group_id: Option<String>,
}

impl BulkCommand {
    pub fn delete(selection: &SelectionModel) -> Self {
        Self {
            operation: BulkOperation::Delete,
            row_positions: selection.positions(),
            target_group_id: None,
        }
    }

    pub fn move_to_group(selection: &SelectionModel, target_group_id: Option<String>) -> Self {
        Self {
            operation: BulkOperation::MoveToGroup,
            row_positions: selection.positions(),
            target_group_id,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.row_positions.is_empty()
    }

    /// Map positions to record ids in `rendered`. Stale positions are skipped.
    pub fn resolve_ids(&self, rendered: &[Record]) -> Vec<String> {
        self.row_positions
            .iter()
            .filter_map(|&p| rendered.get(p))
            .map(|r| r.id().to_string())
            .collect()
    }
}
