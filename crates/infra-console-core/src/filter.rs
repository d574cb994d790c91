//! Free-text matching and the structured filter pipeline.
//!
//! Filtering is stable: [`filter`] keeps input order and never reorders.
//! Ranking ([`crate::rank`]) and sorting ([`crate::sort`]) are separate
//! stages applied afterwards.
//!
//! Malformed structured input never errors. A VLAN that is not a number or
//! a port expression with no usable clause simply matches nothing, so the
//! list keeps responding while the user is still typing.

use std::ops::RangeInclusive;

use serde::{Deserialize, Serialize};

use crate::highlight::contains_ignore_case;
use crate::models::{Category, Group, Record, Service};

/// `group_id` value selecting services that belong to no group.
pub const UNGROUPED: &str = "none";

/// Structured and free-text filter configuration for one list view.
///
/// Absent (or blank) fields do not constrain; present fields are ANDed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterCriteria {
    #[serde(default)]
    pub query: Option<String>,
    #[serde(default)]
    pub category: Option<Category>,
    #[serde(default)]
    pub group_id: Option<String>,
    /// Raw text; non-numeric input matches nothing.
    #[serde(default)]
    pub vlan: Option<String>,
    #[serde(default)]
    pub ip: Option<String>,
    #[serde(default)]
    pub domain: Option<String>,
    /// Port-range expression such as `80,443,8000-8080`.
    #[serde(default)]
    pub ports: Option<String>,
}

fn present(field: &Option<String>) -> Option<&str> {
    field.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

impl FilterCriteria {
    /// Criteria with only a free-text query.
    pub fn with_query(query: impl Into<String>) -> Self {
        Self {
            query: Some(query.into()),
            ..Self::default()
        }
    }

    /// The trimmed free-text query, if any.
    pub fn query_text(&self) -> Option<&str> {
        present(&self.query)
    }

    pub fn has_query(&self) -> bool {
        self.query_text().is_some()
    }

    /// Number of structured (non-query) fields currently constraining.
    pub fn active_filter_count(&self) -> usize {
        [
            self.category.is_some(),
            present(&self.group_id).is_some(),
            present(&self.vlan).is_some(),
            present(&self.ip).is_some(),
            present(&self.domain).is_some(),
            present(&self.ports).is_some(),
        ]
        .into_iter()
        .filter(|&active| active)
        .count()
    }

    /// True when nothing constrains the record set.
    pub fn is_unconstrained(&self) -> bool {
        !self.has_query() && self.active_filter_count() == 0
    }
}

/// Parsed port-range expression.
///
/// Clauses are single ports or inclusive `start-end` ranges separated by
/// commas. Clauses that fail to parse, or ranges with `start > end`, are
/// dropped during parsing.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PortRanges {
    clauses: Vec<RangeInclusive<u32>>,
}

impl PortRanges {
    pub fn parse(expr: &str) -> Self {
        let clauses = expr
            .split(',')
            .map(str::trim)
            .filter(|clause| !clause.is_empty())
            .filter_map(parse_clause)
            .collect();
        Self { clauses }
    }

    /// Number of clauses that survived parsing.
    pub fn len(&self) -> usize {
        self.clauses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    pub fn contains(&self, port: u16) -> bool {
        let port = u32::from(port);
        self.clauses.iter().any(|c| c.contains(&port))
    }

    /// True if any of `ports` falls in any clause.
    pub fn matches_any(&self, ports: &[u16]) -> bool {
        ports.iter().any(|&p| self.contains(p))
    }
}

fn parse_clause(clause: &str) -> Option<RangeInclusive<u32>> {
    match clause.split_once('-') {
        Some((start, end)) => {
            let start: u32 = start.trim().parse().ok()?;
            let end: u32 = end.trim().parse().ok()?;
            (start <= end).then_some(start..=end)
        }
        None => {
            let port: u32 = clause.parse().ok()?;
            Some(port..=port)
        }
    }
}

/// Case-insensitive free-text match across a record's searchable fields.
///
/// Services: name, category, each IP, each port, domain, VLAN.
/// Groups: name, description. A blank query always matches.
pub fn matches_query(record: &Record, query: &str) -> bool {
    let query = query.trim();
    if query.is_empty() {
        return true;
    }
    match record {
        Record::Service(s) => service_matches_query(s, query),
        Record::Group(g) => group_matches_query(g, query),
    }
}

fn service_matches_query(s: &Service, query: &str) -> bool {
    contains_ignore_case(&s.name, query)
        || contains_ignore_case(s.category.as_str(), query)
        || s.ips.iter().any(|ip| contains_ignore_case(ip, query))
        || s.ports.iter().any(|p| p.to_string().contains(query))
        || s.domain
            .as_deref()
            .is_some_and(|d| contains_ignore_case(d, query))
        || s.vlan.is_some_and(|v| v.to_string().contains(query))
}

fn group_matches_query(g: &Group, query: &str) -> bool {
    contains_ignore_case(&g.name, query)
        || g.description
            .as_deref()
            .is_some_and(|d| contains_ignore_case(d, query))
}

/// Criteria with the expensive parts parsed once per filter pass.
struct CompiledCriteria<'a> {
    query: Option<&'a str>,
    category: Option<Category>,
    group_id: Option<&'a str>,
    /// `Some(None)` when VLAN text is present but not a number.
    vlan: Option<Option<u16>>,
    ip: Option<&'a str>,
    domain: Option<&'a str>,
    ports: Option<PortRanges>,
}

impl<'a> CompiledCriteria<'a> {
    fn new(criteria: &'a FilterCriteria) -> Self {
        Self {
            query: criteria.query_text(),
            category: criteria.category,
            group_id: present(&criteria.group_id),
            vlan: present(&criteria.vlan).map(|v| v.parse::<u16>().ok()),
            ip: present(&criteria.ip),
            domain: present(&criteria.domain),
            ports: present(&criteria.ports).map(PortRanges::parse),
        }
    }

    fn has_service_only_fields(&self) -> bool {
        self.category.is_some()
            || self.vlan.is_some()
            || self.ip.is_some()
            || self.domain.is_some()
            || self.ports.is_some()
    }

    fn matches(&self, record: &Record) -> bool {
        if let Some(q) = self.query {
            if !matches_query(record, q) {
                return false;
            }
        }
        match record {
            Record::Service(s) => self.matches_service(s),
            Record::Group(g) => {
                !self.has_service_only_fields() && self.group_id.map_or(true, |id| g.id == id)
            }
        }
    }

    fn matches_service(&self, s: &Service) -> bool {
        if let Some(category) = self.category {
            if s.category != category {
                return false;
            }
        }
        if let Some(group_id) = self.group_id {
            let ok = if group_id.eq_ignore_ascii_case(UNGROUPED) {
                s.group.is_none()
            } else {
                s.group_id() == Some(group_id)
            };
            if !ok {
                return false;
            }
        }
        if let Some(vlan) = self.vlan {
            match vlan {
                Some(v) if s.vlan == Some(v) => {}
                _ => return false,
            }
        }
        if let Some(ip) = self.ip {
            if !s.ips.iter().any(|addr| contains_ignore_case(addr, ip)) {
                return false;
            }
        }
        if let Some(domain) = self.domain {
            if !s
                .domain
                .as_deref()
                .is_some_and(|d| contains_ignore_case(d, domain))
            {
                return false;
            }
        }
        if let Some(ports) = &self.ports {
            if !ports.matches_any(&s.ports) {
                return false;
            }
        }
        true
    }
}

/// True when `record` satisfies every present field of `criteria`.
pub fn matches_criteria(record: &Record, criteria: &FilterCriteria) -> bool {
    CompiledCriteria::new(criteria).matches(record)
}

/// Keep the records satisfying every present field of `criteria`, in
/// their original order.
pub fn filter(records: &[Record], criteria: &FilterCriteria) -> Vec<Record> {
    let compiled = CompiledCriteria::new(criteria);
    records
        .iter()
        .filter(|r| compiled.matches(r))
        .cloned()
        .collect()
}
