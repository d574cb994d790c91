//! Column definitions shared by the sort controller, the grid, and the
//! renderers (CLI table, terminal browser, HTTP sort parameter).

use serde::Serialize;

use crate::models::{format_ts_iso, Record, RecordKind};

/// How a column's values compare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnKind {
    /// Case-insensitive string comparison.
    Text,
    /// Numeric comparison.
    Numeric,
    /// Row selection checkbox; never sortable.
    Selection,
}

/// Which record field a column shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnKey {
    Select,
    Name,
    Category,
    Ips,
    Ports,
    Vlan,
    Domain,
    Group,
    Description,
    ServiceCount,
    CreatedAt,
    UpdatedAt,
}

/// Comparable cell value. Missing sorts before any present value.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum SortValue {
    Missing,
    Number(i64),
    Text(String),
}

impl ColumnKey {
    /// Stable identifier used by `?sort=` and `--sort`.
    pub fn as_str(self) -> &'static str {
        match self {
            ColumnKey::Select => "select",
            ColumnKey::Name => "name",
            ColumnKey::Category => "type",
            ColumnKey::Ips => "ips",
            ColumnKey::Ports => "ports",
            ColumnKey::Vlan => "vlan",
            ColumnKey::Domain => "domain",
            ColumnKey::Group => "group",
            ColumnKey::Description => "description",
            ColumnKey::ServiceCount => "services",
            ColumnKey::CreatedAt => "created",
            ColumnKey::UpdatedAt => "updated",
        }
    }

    /// The value this column sorts by for `record`.
    pub fn sort_value(self, record: &Record) -> SortValue {
        let text = |s: &str| SortValue::Text(s.to_lowercase());
        match (self, record) {
            (ColumnKey::Select, _) => SortValue::Missing,
            (ColumnKey::Name, r) => text(r.name()),
            (ColumnKey::CreatedAt, Record::Service(s)) => SortValue::Number(s.created_at.timestamp()),
            (ColumnKey::CreatedAt, Record::Group(g)) => SortValue::Number(g.created_at.timestamp()),
            (ColumnKey::UpdatedAt, Record::Service(s)) => SortValue::Number(s.updated_at.timestamp()),
            (ColumnKey::UpdatedAt, Record::Group(g)) => SortValue::Number(g.updated_at.timestamp()),
            (ColumnKey::Category, Record::Service(s)) => text(s.category.as_str()),
            (ColumnKey::Ips, Record::Service(s)) => {
                s.ips.first().map_or(SortValue::Missing, |ip| text(ip))
            }
            (ColumnKey::Ports, Record::Service(s)) => s
                .ports
                .iter()
                .min()
                .map_or(SortValue::Missing, |p| SortValue::Number(i64::from(*p))),
            (ColumnKey::Vlan, Record::Service(s)) => s
                .vlan
                .map_or(SortValue::Missing, |v| SortValue::Number(i64::from(v))),
            (ColumnKey::Domain, Record::Service(s)) => {
                s.domain.as_deref().map_or(SortValue::Missing, text)
            }
            (ColumnKey::Group, Record::Service(s)) => s
                .group
                .as_ref()
                .map_or(SortValue::Missing, |g| text(&g.name)),
            (ColumnKey::Description, Record::Group(g)) => {
                g.description.as_deref().map_or(SortValue::Missing, text)
            }
            (ColumnKey::ServiceCount, Record::Group(g)) => {
                SortValue::Number(i64::try_from(g.service_count).unwrap_or(i64::MAX))
            }
            _ => SortValue::Missing,
        }
    }

    /// Plain-text rendering of the cell.
    pub fn display(self, record: &Record) -> String {
        match (self, record) {
            (ColumnKey::Select, _) => String::new(),
            (ColumnKey::Name, r) => r.name().to_string(),
            (ColumnKey::CreatedAt, Record::Service(s)) => format_ts_iso(&s.created_at),
            (ColumnKey::CreatedAt, Record::Group(g)) => format_ts_iso(&g.created_at),
            (ColumnKey::UpdatedAt, Record::Service(s)) => format_ts_iso(&s.updated_at),
            (ColumnKey::UpdatedAt, Record::Group(g)) => format_ts_iso(&g.updated_at),
            (ColumnKey::Category, Record::Service(s)) => s.category.to_string(),
            (ColumnKey::Ips, Record::Service(s)) => s.ips.join(", "),
            (ColumnKey::Ports, Record::Service(s)) => s
                .ports
                .iter()
                .map(u16::to_string)
                .collect::<Vec<_>>()
                .join(", "),
            (ColumnKey::Vlan, Record::Service(s)) => {
                s.vlan.map(|v| v.to_string()).unwrap_or_default()
            }
            (ColumnKey::Domain, Record::Service(s)) => s.domain.clone().unwrap_or_default(),
            (ColumnKey::Group, Record::Service(s)) => {
                s.group.as_ref().map(|g| g.name.clone()).unwrap_or_default()
            }
            (ColumnKey::Description, Record::Group(g)) => {
                g.description.clone().unwrap_or_default()
            }
            (ColumnKey::ServiceCount, Record::Group(g)) => g.service_count.to_string(),
            _ => String::new(),
        }
    }
}

/// One rendered grid column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Column {
    pub key: ColumnKey,
    pub label: &'static str,
    pub kind: ColumnKind,
    pub sortable: bool,
    /// The cell hosts a focusable control (checkbox, link) that receives
    /// focus instead of the cell itself.
    pub interactive: bool,
}

impl Column {
    fn new(key: ColumnKey, label: &'static str, kind: ColumnKind) -> Self {
        Self {
            key,
            label,
            kind,
            sortable: true,
            interactive: false,
        }
    }

    fn link(mut self) -> Self {
        self.interactive = true;
        self
    }

    fn selection() -> Self {
        Self {
            key: ColumnKey::Select,
            label: "Select",
            kind: ColumnKind::Selection,
            sortable: false,
            interactive: true,
        }
    }
}

/// Columns of the services list. Column 0 is the selection checkbox when
/// `multi_select` is on.
pub fn service_columns(multi_select: bool) -> Vec<Column> {
    let mut cols = Vec::with_capacity(9);
    if multi_select {
        cols.push(Column::selection());
    }
    cols.extend([
        Column::new(ColumnKey::Name, "Name", ColumnKind::Text).link(),
        Column::new(ColumnKey::Category, "Type", ColumnKind::Text),
        Column::new(ColumnKey::Ips, "IP Addresses", ColumnKind::Text),
        Column::new(ColumnKey::Ports, "Ports", ColumnKind::Numeric),
        Column::new(ColumnKey::Vlan, "VLAN", ColumnKind::Numeric),
        Column::new(ColumnKey::Domain, "Domain", ColumnKind::Text),
        Column::new(ColumnKey::Group, "Group", ColumnKind::Text),
        Column::new(ColumnKey::UpdatedAt, "Updated", ColumnKind::Numeric),
    ]);
    cols
}

/// Columns of the groups list.
pub fn group_columns(multi_select: bool) -> Vec<Column> {
    let mut cols = Vec::with_capacity(5);
    if multi_select {
        cols.push(Column::selection());
    }
    cols.extend([
        Column::new(ColumnKey::Name, "Name", ColumnKind::Text).link(),
        Column::new(ColumnKey::Description, "Description", ColumnKind::Text),
        Column::new(ColumnKey::ServiceCount, "Services", ColumnKind::Numeric),
        Column::new(ColumnKey::UpdatedAt, "Updated", ColumnKind::Numeric),
    ]);
    cols
}

/// Columns for a record kind.
pub fn columns_for(kind: RecordKind, multi_select: bool) -> Vec<Column> {
    match kind {
        RecordKind::Service => service_columns(multi_select),
        RecordKind::Group => group_columns(multi_select),
    }
}

/// Find a column index by its [`ColumnKey::as_str`] name.
pub fn column_index(columns: &[Column], name: &str) -> Option<usize> {
    columns
        .iter()
        .position(|c| c.key.as_str().eq_ignore_ascii_case(name.trim()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Category, Service};
    use chrono::Utc;

    #[test]
    fn test_selection_column_first_and_interactive() {
        let cols = service_columns(true);
        assert_eq!(cols[0].key, ColumnKey::Select);
        assert!(cols[0].interactive);
        assert!(!cols[0].sortable);
        assert_eq!(service_columns(false)[0].key, ColumnKey::Name);
    }

    #[test]
    fn test_column_index_by_name() {
        let cols = group_columns(true);
        assert_eq!(column_index(&cols, "services"), Some(3));
        assert_eq!(column_index(&cols, " NAME "), Some(1));
        assert_eq!(column_index(&cols, "vlan"), None);
    }

    #[test]
    fn test_values_and_display() {
        let now = Utc::now();
        let rec = Record::Service(Service {
            id: "s".to_string(),
            name: "Mail".to_string(),
            category: Category::Web,
            ips: vec!["10.0.0.2".to_string(), "10.0.0.3".to_string()],
            ports: vec![993, 25],
            vlan: None,
            domain: None,
            group: None,
            created_at: now,
            updated_at: now,
        });
        assert_eq!(ColumnKey::Ports.sort_value(&rec), SortValue::Number(25));
        assert_eq!(ColumnKey::Vlan.sort_value(&rec), SortValue::Missing);
        assert_eq!(
            ColumnKey::Name.sort_value(&rec),
            SortValue::Text("mail".to_string())
        );
        assert_eq!(ColumnKey::Ports.display(&rec), "993, 25");
        assert_eq!(ColumnKey::Ips.display(&rec), "10.0.0.2, 10.0.0.3");
        assert_eq!(ColumnKey::Group.display(&rec), "");
    }

    #[test]
    fn test_missing_orders_first() {
        assert!(SortValue::Missing < SortValue::Number(i64::MIN));
        assert!(SortValue::Missing < SortValue::Text(String::new()));
    }
}
