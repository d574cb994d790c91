//! Shared list plumbing for the CLI tables and the HTTP list endpoints.
//!
//! Both surfaces load every record of one kind from the store and push it
//! through a [`ListView`], so filtering, ranking, sorting and empty states
//! behave identically everywhere.

use std::sync::Arc;

use anyhow::Result;

use infra_console_core::announcer::Announcer;
use infra_console_core::columns::{column_index, ColumnKind};
use infra_console_core::filter::FilterCriteria;
use infra_console_core::grid::GridContext;
use infra_console_core::highlight::mark;
use infra_console_core::models::{Category, Record, RecordKind};
use infra_console_core::sort::{SortDirection, SortState};
use infra_console_core::store::InventoryStore;
use infra_console_core::view::ListView;

use crate::config::Config;

#[derive(Debug, Clone, Default)]
pub struct ListOptions {
    pub criteria: FilterCriteria,
    /// Column name as accepted by `column_index` (`name`, `type`, `vlan`, ...).
    pub sort: Option<String>,
    pub descending: bool,
}

/// Grid context for views that never reach a live region.
pub fn headless_context(config: &Config) -> GridContext {
    let announcer = Arc::new(Announcer::detached(config.announcer.to_announcer_config()));
    GridContext::new(announcer, config.grid.to_grid_config())
}

/// Load all records of `kind` and apply `options`.
pub async fn load_view(
    store: &dyn InventoryStore,
    kind: RecordKind,
    options: &ListOptions,
    ctx: GridContext,
) -> Result<ListView> {
    let records = store.list_records(kind).await?;
    build_view(kind, records, options, ctx)
}

/// Build a ready view over `records`. Fails only on an unknown or
/// unsortable sort column.
pub fn build_view(
    kind: RecordKind,
    records: Vec<Record>,
    options: &ListOptions,
    ctx: GridContext,
) -> Result<ListView> {
    let mut view = ListView::with_records(kind, ctx, records);
    view.set_criteria(options.criteria.clone());

    if let Some(name) = options.sort.as_deref().filter(|s| !s.trim().is_empty()) {
        let column = column_index(view.grid().columns(), name)
            .filter(|&i| view.grid().columns()[i].sortable)
            .ok_or_else(|| anyhow::anyhow!("Unknown sort column: {}", name))?;
        let state = if options.descending {
            SortState::descending(column)
        } else {
            SortState::ascending(column)
        };
        view.set_sort_state(state);
    }

    Ok(view)
}

/// Strict category parse for user input; `None` for unrecognized names.
pub fn parse_category(s: &str) -> Option<Category> {
    Category::ALL
        .into_iter()
        .find(|c| c.as_str().eq_ignore_ascii_case(s.trim()))
}

/// Map a `dir` parameter to a descending flag. Unrecognized values sort
/// ascending.
pub fn is_descending(dir: Option<&str>) -> bool {
    dir.and_then(SortDirection::parse) == Some(SortDirection::Descending)
}

/// Print the rendered rows as an aligned table, or the empty-state copy
/// when nothing matched.
pub fn print_view(view: &ListView) {
    if let Some(empty) = view.empty_state() {
        println!("{}", empty.title);
        println!("{}", empty.description);
        return;
    }
    for line in render_table(view) {
        println!("{}", line);
    }
    println!();
    println!("{}", view.result_count_message());
}

/// Header plus one line per rendered record. Query matches are bracketed.
pub fn render_table(view: &ListView) -> Vec<String> {
    let query = view.criteria().query_text();
    let columns: Vec<_> = view
        .grid()
        .columns()
        .iter()
        .filter(|c| c.kind != ColumnKind::Selection)
        .collect();

    let mut header = vec!["ID".to_string()];
    header.extend(columns.iter().map(|c| c.label.to_uppercase()));
    let mut rows = vec![header];

    for record in view.rendered() {
        let mut row = vec![record.id().to_string()];
        row.extend(columns.iter().map(|c| {
            let text = c.key.display(record);
            match query {
                Some(q) => mark(&text, q, "[", "]"),
                None => text,
            }
        }));
        rows.push(row);
    }

    let widths: Vec<usize> = (0..rows[0].len())
        .map(|i| rows.iter().map(|r| r[i].chars().count()).max().unwrap_or(0))
        .collect();

    rows.iter()
        .map(|row| {
            row.iter()
                .zip(&widths)
                .map(|(cell, width)| format!("{:<width$}", cell, width = *width))
                .collect::<Vec<_>>()
                .join("  ")
                .trim_end()
                .to_string()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use infra_console_core::announcer::AnnouncerConfig;
    use infra_console_core::grid::GridConfig;
    use infra_console_core::models::NewService;
    use infra_console_core::store::memory::InMemoryStore;

    fn ctx() -> GridContext {
        GridContext::new(
            Arc::new(Announcer::detached(AnnouncerConfig::default())),
            GridConfig::default(),
        )
    }

    async fn seeded() -> InMemoryStore {
        let store = InMemoryStore::new();
        for (name, vlan) in [("beta", 20), ("alpha", 10), ("gamma", 30)] {
            store
                .create_service(NewService {
                    name: name.to_string(),
                    category: Category::Api,
                    ips: vec!["10.1.1.1".to_string()],
                    ports: vec![443],
                    vlan: Some(vlan),
                    ..NewService::default()
                })
                .await
                .unwrap();
        }
        store
    }

    fn names(view: &ListView) -> Vec<&str> {
        view.rendered().iter().map(|r| r.name()).collect()
    }

    #[tokio::test]
    async fn test_sort_by_named_column() {
        let store = seeded().await;
        let options = ListOptions {
            sort: Some("vlan".to_string()),
            descending: true,
            ..ListOptions::default()
        };
        let view = load_view(&store, RecordKind::Service, &options, ctx())
            .await
            .unwrap();
        assert_eq!(names(&view), vec!["gamma", "beta", "alpha"]);
    }

    #[tokio::test]
    async fn test_unknown_or_unsortable_column_is_rejected() {
        let store = seeded().await;
        for bad in ["nope", "select"] {
            let options = ListOptions {
                sort: Some(bad.to_string()),
                ..ListOptions::default()
            };
            let err = load_view(&store, RecordKind::Service, &options, ctx())
                .await
                .unwrap_err();
            assert!(err.to_string().contains("Unknown sort column"));
        }
    }

    #[tokio::test]
    async fn test_query_reaches_the_view() {
        let store = seeded().await;
        let options = ListOptions {
            criteria: FilterCriteria::with_query("alp"),
            ..ListOptions::default()
        };
        let view = load_view(&store, RecordKind::Service, &options, ctx())
            .await
            .unwrap();
        assert_eq!(names(&view), vec!["alpha"]);
        assert!(view.score(0).unwrap() > 0);
    }

    #[tokio::test]
    async fn test_table_brackets_query_matches() {
        let store = seeded().await;
        let options = ListOptions {
            criteria: FilterCriteria::with_query("amm"),
            ..ListOptions::default()
        };
        let view = load_view(&store, RecordKind::Service, &options, ctx())
            .await
            .unwrap();
        let lines = render_table(&view);
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("ID"));
        assert!(lines[0].contains("NAME"));
        assert!(!lines[0].contains("SELECT"));
        assert!(lines[1].contains("g[amm]a"));
    }

    #[test]
    fn test_parse_category_is_strict() {
        assert_eq!(parse_category(" Web "), Some(Category::Web));
        assert_eq!(parse_category("unknown"), Some(Category::Unknown));
        assert_eq!(parse_category("mainframe"), None);
    }

    #[test]
    fn test_is_descending() {
        assert!(is_descending(Some("desc")));
        assert!(!is_descending(Some("asc")));
        assert!(!is_descending(Some("sideways")));
        assert!(!is_descending(None));
    }
}
