//! Tri-state column sort.
//!
//! Activating the same column cycles ascending → descending → unsorted.
//! Activating a different column always starts at ascending. Only one
//! column is sorted at a time.

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::announcer::Announcer;
use crate::columns::Column;
use crate::models::Record;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Ascending,
    Descending,
}

impl SortDirection {
    pub fn as_str(self) -> &'static str {
        match self {
            SortDirection::Ascending => "ascending",
            SortDirection::Descending => "descending",
        }
    }

    /// Lenient parse of `asc`/`ascending`/`desc`/`descending`.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "asc" | "ascending" => Some(SortDirection::Ascending),
            "desc" | "descending" => Some(SortDirection::Descending),
            _ => None,
        }
    }
}

impl fmt::Display for SortDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Active sort column (index into the column list) and direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SortState {
    pub column: Option<usize>,
    pub direction: SortDirection,
}

impl SortState {
    pub fn ascending(column: usize) -> Self {
        Self {
            column: Some(column),
            direction: SortDirection::Ascending,
        }
    }

    pub fn descending(column: usize) -> Self {
        Self {
            column: Some(column),
            direction: SortDirection::Descending,
        }
    }

    pub fn is_unsorted(&self) -> bool {
        self.column.is_none()
    }

    /// Direction of `column`, or `None` when it is not the sorted column.
    pub fn direction_of(&self, column: usize) -> Option<SortDirection> {
        (self.column == Some(column)).then_some(self.direction)
    }

    /// The state after activating `column`.
    pub fn next(self, column: usize) -> Self {
        match (self.column, self.direction) {
            (Some(c), SortDirection::Ascending) if c == column => Self::descending(column),
            (Some(c), SortDirection::Descending) if c == column => Self::default(),
            _ => Self::ascending(column),
        }
    }
}

/// Owns a view's [`SortState`] and announces each transition.
#[derive(Debug, Clone, Default)]
pub struct SortController {
    state: SortState,
}

impl SortController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_state(state: SortState) -> Self {
        Self { state }
    }

    pub fn state(&self) -> SortState {
        self.state
    }

    /// Advance the cycle for `column` and announce the result politely.
    pub fn activate(&mut self, column: usize, label: &str, announcer: &Announcer) -> SortState {
        self.state = self.state.next(column);
        let message = match self.state.column {
            Some(_) => format!("Sorted by {} {}", label, self.state.direction),
            None => "Sorting cleared".to_string(),
        };
        tracing::debug!(column, label, state = ?self.state, "sort activated");
        announcer.polite(message);
        self.state
    }

    pub fn clear(&mut self) {
        self.state = SortState::default();
    }
}

/// Sort `records` in place by the state's column.
///
/// The sort is stable. Missing values come first when ascending and last
/// when descending. An unsorted state, an out-of-range column, or a
/// non-sortable column leaves the order untouched.
pub fn sort_records(records: &mut [Record], columns: &[Column], state: SortState) {
    let Some(column) = state.column.and_then(|c| columns.get(c)) else {
        return;
    };
    if !column.sortable {
        return;
    }
    let key = column.key;
    let cmp = |a: &Record, b: &Record| -> Ordering { key.sort_value(a).cmp(&key.sort_value(b)) };
    match state.direction {
        SortDirection::Ascending => records.sort_by(cmp),
        SortDirection::Descending => records.sort_by(|a, b| cmp(b, a)),
    }
}
