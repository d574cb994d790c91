//! The list-view pipeline behind every services/groups page.
//!
//! A [`ListView`] holds the loaded records, the active criteria, and the
//! [`GridEngine`]. Every mutation recomputes the rendered sequence
//! (filter, then rank when a query is present, otherwise the column sort)
//! and resets the grid before returning, so the selection can never point
//! at rows from an older ordering.

use serde::Serialize;

use crate::columns::columns_for;
use crate::filter::{filter, FilterCriteria};
use crate::grid::{GridContext, GridEngine};
use crate::models::{Record, RecordKind};
use crate::rank::rank;
use crate::selection::{BulkCommand, BulkOperation};
use crate::sort::{sort_records, SortState};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewState {
    Loading,
    Ready,
}

/// What to show in place of an empty grid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmptyState {
    pub title: String,
    pub description: String,
    pub show_clear_filters: bool,
}

#[derive(Debug)]
pub struct ListView {
    kind: RecordKind,
    /// `None` while loading.
    records: Option<Vec<Record>>,
    criteria: FilterCriteria,
    rendered: Vec<Record>,
    /// Relevance per rendered row; empty when the order comes from sorting.
    scores: Vec<u32>,
    grid: GridEngine,
}

impl ListView {
    /// A view in the loading state.
    pub fn new(kind: RecordKind, ctx: GridContext) -> Self {
        let columns = columns_for(kind, ctx.config.multi_select);
        let mut grid = GridEngine::new(ctx, columns, 0);
        grid.set_loading(true);
        Self {
            kind,
            records: None,
            criteria: FilterCriteria::default(),
            rendered: Vec::new(),
            scores: Vec::new(),
            grid,
        }
    }

    /// A view already holding `records`.
    pub fn with_records(kind: RecordKind, ctx: GridContext, records: Vec<Record>) -> Self {
        let mut view = Self::new(kind, ctx);
        view.set_records(records);
        view
    }

    pub fn kind(&self) -> RecordKind {
        self.kind
    }

    pub fn state(&self) -> ViewState {
        if self.records.is_some() {
            ViewState::Ready
        } else {
            ViewState::Loading
        }
    }

    pub fn criteria(&self) -> &FilterCriteria {
        &self.criteria
    }

    /// Rows in display order.
    pub fn rendered(&self) -> &[Record] {
        &self.rendered
    }

    pub fn record_at(&self, row: usize) -> Option<&Record> {
        self.rendered.get(row)
    }

    /// Relevance score of a row, when the view is ranked.
    pub fn score(&self, row: usize) -> Option<u32> {
        self.scores.get(row).copied()
    }

    /// Number of loaded records before filtering.
    pub fn total(&self) -> usize {
        self.records.as_ref().map_or(0, Vec::len)
    }

    pub fn grid(&self) -> &GridEngine {
        &self.grid
    }

    pub fn grid_mut(&mut self) -> &mut GridEngine {
        &mut self.grid
    }

    pub fn sort_state(&self) -> SortState {
        self.grid.sort_state()
    }

    /// Replace the data set (a fetch finished).
    pub fn set_records(&mut self, records: Vec<Record>) {
        tracing::debug!(kind = ?self.kind, count = records.len(), "records loaded");
        self.records = Some(records);
        self.grid.set_loading(false);
        self.recompute();
    }

    /// Enter the loading state; the rendered sequence empties and the grid
    /// ignores input until [`set_records`](Self::set_records).
    pub fn begin_loading(&mut self) {
        self.records = None;
        self.grid.set_loading(true);
        self.recompute();
    }

    pub fn set_criteria(&mut self, criteria: FilterCriteria) {
        self.criteria = criteria;
        self.recompute();
        self.announce_count();
    }

    pub fn set_query(&mut self, query: impl Into<String>) {
        let query = query.into();
        self.criteria.query = Some(query).filter(|q| !q.trim().is_empty());
        self.recompute();
        self.announce_count();
    }

    pub fn clear_filters(&mut self) {
        self.criteria = FilterCriteria::default();
        self.recompute();
        self.announce_count();
    }

    /// Cycle the sort on `column`. While a query is present the rendered
    /// order stays relevance-ranked; the new sort applies once it clears.
    pub fn toggle_sort(&mut self, column: usize) -> Option<SortState> {
        if self.records.is_none() {
            return None;
        }
        let state = self.grid.toggle_sort(column)?;
        self.recompute();
        Some(state)
    }

    /// Restore a sort state without announcing it.
    pub fn set_sort_state(&mut self, state: SortState) {
        self.grid.set_sort_state(state);
        self.recompute();
    }

    /// A record was deleted. Returns whether it was loaded.
    ///
    /// The row disappears from the rendered sequence in place; selection
    /// positions above it shift down and focus is re-clamped.
    pub fn remove_record(&mut self, id: &str) -> bool {
        let Some(records) = self.records.as_mut() else {
            return false;
        };
        let Some(idx) = records.iter().position(|r| r.id() == id) else {
            return false;
        };
        records.remove(idx);
        if let Some(row) = self.rendered.iter().position(|r| r.id() == id) {
            self.rendered.remove(row);
            if row < self.scores.len() {
                self.scores.remove(row);
            }
            self.grid.remove_row(row);
        }
        true
    }

    /// Ids of the selected rows, in display order.
    pub fn selected_ids(&self) -> Vec<String> {
        self.bulk_command(BulkOperation::Delete, None)
            .resolve_ids(&self.rendered)
    }

    /// A bulk command over the current selection.
    pub fn bulk_command(&self, operation: BulkOperation, target_group_id: Option<String>) -> BulkCommand {
        let selection = self.grid.selection();
        match operation {
            BulkOperation::Delete => BulkCommand::delete(selection),
            BulkOperation::MoveToGroup => BulkCommand::move_to_group(selection, target_group_id),
        }
    }

    /// Empty-state copy, or `None` when there are rows (or still loading).
    pub fn empty_state(&self) -> Option<EmptyState> {
        let records = self.records.as_ref()?;
        if !self.rendered.is_empty() {
            return None;
        }
        let noun = self.kind.plural();
        if !records.is_empty() {
            if let Some(query) = self.criteria.query_text() {
                return Some(EmptyState {
                    title: format!("No results for \"{}\"", query),
                    description: format!(
                        "No {} match your search. Try a different term or clear the search.",
                        noun
                    ),
                    show_clear_filters: true,
                });
            }
            let active = self.criteria.active_filter_count();
            if active > 0 {
                return Some(EmptyState {
                    title: format!("No {} match {} active filters", noun, active),
                    description: "Adjust or clear the filters to see more results.".to_string(),
                    show_clear_filters: true,
                });
            }
        }
        Some(EmptyState {
            title: format!("No {} yet", noun),
            description: format!(
                "Create your first {} to get started.",
                self.kind.singular()
            ),
            show_clear_filters: false,
        })
    }

    /// "N services" / "1 group".
    pub fn result_count_message(&self) -> String {
        let n = self.rendered.len();
        let noun = if n == 1 {
            self.kind.singular()
        } else {
            self.kind.plural()
        };
        format!("{} {}", n, noun)
    }

    fn announce_count(&self) {
        if self.records.is_some() {
            self.grid.announcer().polite(self.result_count_message());
        }
    }

    fn recompute(&mut self) {
        let Some(records) = &self.records else {
            self.rendered.clear();
            self.scores.clear();
            self.grid.set_row_count(0);
            return;
        };
        let mut filtered = filter(records, &self.criteria);
        match self.criteria.query_text() {
            Some(query) => {
                let (rendered, scores): (Vec<Record>, Vec<u32>) = rank(filtered, query)
                    .into_iter()
                    .map(|r| (r.record, r.score))
                    .unzip();
                self.rendered = rendered;
                self.scores = scores;
            }
            None => {
                sort_records(&mut filtered, self.grid.columns(), self.grid.sort_state());
                self.rendered = filtered;
                self.scores.clear();
            }
        }
        self.grid.set_row_count(self.rendered.len());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::announcer::{Announcer, AnnouncerConfig, ManualClock, Priority, RecordingRegion};
    use crate::columns::column_index;
    use crate::grid::{GridConfig, GridKey, KeyInput};
    use crate::models::{Category, Group, Service};
    use chrono::{Duration as ChronoDuration, Utc};
    use std::sync::Arc;
    use std::time::Duration;

    struct Fixture {
        clock: Arc<ManualClock>,
        region: RecordingRegion,
        ctx: GridContext,
    }

    impl Fixture {
        fn new() -> Self {
            let clock = Arc::new(ManualClock::new());
            let region = RecordingRegion::new();
            let announcer = Arc::new(Announcer::new(
                AnnouncerConfig::default(),
                clock.clone(),
                Box::new(region.clone()),
            ));
            Self {
                clock,
                region,
                ctx: GridContext::new(announcer, GridConfig::default()),
            }
        }

        fn drain(&self) -> Vec<String> {
            self.clock.advance(Duration::from_secs(2));
            self.ctx.announcer.flush();
            self.region.texts(Priority::Polite)
        }
    }

    fn svc(name: &str, category: Category, vlan: Option<u16>, age_min: i64) -> Record {
        let at = Utc::now() - ChronoDuration::minutes(age_min);
        Record::Service(Service {
            id: format!("id-{}", name),
            name: name.to_string(),
            category,
            ips: vec!["10.1.0.5".to_string()],
            ports: vec![443],
            vlan,
            domain: None,
            group: None,
            created_at: at,
            updated_at: at,
        })
    }

    fn sample() -> Vec<Record> {
        vec![
            svc("cache-web", Category::Storage, Some(20), 3),
            svc("web", Category::Web, Some(10), 2),
            svc("db-01", Category::Database, None, 1),
        ]
    }

    fn names(view: &ListView) -> Vec<&str> {
        view.rendered().iter().map(Record::name).collect()
    }

    #[test]
    fn test_loading_is_inert() {
        let f = Fixture::new();
        let mut view = ListView::new(RecordKind::Service, f.ctx.clone());
        assert_eq!(view.state(), ViewState::Loading);
        view.set_query("web");
        assert!(view.rendered().is_empty());
        assert!(view.empty_state().is_none());
        assert!(view.toggle_sort(1).is_none());
        assert!(!view.grid_mut().handle_key(KeyInput::plain(GridKey::Down)).handled);
        view.set_records(sample());
        assert_eq!(view.state(), ViewState::Ready);
        assert_eq!(names(&view), vec!["web", "cache-web"]);
    }

    #[test]
    fn test_query_ranks_over_sort() {
        let f = Fixture::new();
        let mut view = ListView::with_records(RecordKind::Service, f.ctx.clone(), sample());
        let name_col = column_index(view.grid().columns(), "name").unwrap();
        view.toggle_sort(name_col);
        view.toggle_sort(name_col);
        assert_eq!(names(&view), vec!["web", "db-01", "cache-web"]);

        view.set_query("web");
        // exact name + category beats contains
        assert_eq!(names(&view), vec!["web", "cache-web"]);
        assert_eq!(view.score(0), Some(120));

        view.set_query("");
        assert_eq!(names(&view), vec!["web", "db-01", "cache-web"]);
        assert_eq!(view.score(0), None);
    }

    #[test]
    fn test_mutations_clear_selection_and_clamp_focus() {
        let f = Fixture::new();
        let mut view = ListView::with_records(RecordKind::Service, f.ctx.clone(), sample());
        view.grid_mut().focus_cell(2, 3);
        view.grid_mut().select_all();
        view.set_criteria(FilterCriteria {
            category: Some(Category::Web),
            ..FilterCriteria::default()
        });
        assert!(view.grid().selection().is_empty());
        assert_eq!(view.grid().focus().row, 0);
        assert_eq!(names(&view), vec!["web"]);
    }

    #[test]
    fn test_remove_record_keeps_shifted_selection() {
        let f = Fixture::new();
        let mut view = ListView::with_records(RecordKind::Service, f.ctx.clone(), sample());
        // rendered: cache-web, web, db-01 (unsorted keeps load order)
        view.grid_mut().focus_cell(2, 0);
        view.grid_mut().handle_key(KeyInput::plain(GridKey::Space));
        assert!(view.remove_record("id-cache-web"));
        assert_eq!(view.selected_ids(), vec!["id-db-01".to_string()]);
        assert_eq!(view.total(), 2);
        assert!(!view.remove_record("missing"));
    }

    #[test]
    fn test_empty_states() {
        let f = Fixture::new();
        let mut view = ListView::with_records(RecordKind::Service, f.ctx.clone(), Vec::new());
        let empty = view.empty_state().unwrap();
        assert_eq!(empty.title, "No services yet");
        assert!(!empty.show_clear_filters);

        view.set_records(sample());
        assert!(view.empty_state().is_none());

        view.set_query("zzz");
        let empty = view.empty_state().unwrap();
        assert_eq!(empty.title, "No results for \"zzz\"");
        assert!(empty.show_clear_filters);

        view.set_criteria(FilterCriteria {
            vlan: Some("99".to_string()),
            ip: Some("172.".to_string()),
            ..FilterCriteria::default()
        });
        let empty = view.empty_state().unwrap();
        assert_eq!(empty.title, "No services match 2 active filters");

        view.clear_filters();
        assert!(view.empty_state().is_none());
    }

    #[test]
    fn test_result_count_announced() {
        let f = Fixture::new();
        let mut view = ListView::with_records(RecordKind::Group, f.ctx.clone(), Vec::new());
        let now = Utc::now();
        view.set_records(vec![Record::Group(Group {
            id: "g".to_string(),
            name: "edge".to_string(),
            description: None,
            service_count: 2,
            created_at: now,
            updated_at: now,
        })]);
        view.set_query("edge");
        assert_eq!(f.drain(), vec!["1 group"]);
        view.set_query("core");
        assert_eq!(f.drain().last().map(String::as_str), Some("0 groups"));
    }

    #[test]
    fn test_bulk_move_command() {
        let f = Fixture::new();
        let mut view = ListView::with_records(RecordKind::Service, f.ctx.clone(), sample());
        view.grid_mut().select_all();
        let cmd = view.bulk_command(BulkOperation::MoveToGroup, Some("g-1".to_string()));
        assert_eq!(cmd.resolve_ids(view.rendered()).len(), 3);
        assert_eq!(cmd.target_group_id.as_deref(), Some("g-1"));
    }
}
