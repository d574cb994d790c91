//! Relevance ranking for free-text queries.
//!
//! # Scoring
//!
//! Each field contributes independently and at most once; within the name
//! field the most specific branch wins:
//!
//! | Field | Points |
//! |-------|--------|
//! | name: exact (case-insensitive) | 100 |
//! | name: starts with | 50 |
//! | name: contains | 25 |
//! | category contains | 20 |
//! | domain contains | 15 |
//! | any IP contains | 10 |
//! | any port contains | 5 |
//! | VLAN contains | 5 |
//!
//! Groups score on name and description (15).
//!
//! [`rank`] orders by descending score with a stable sort, so equal
//! scores keep the order the filter pipeline produced.

use serde::Serialize;

use crate::highlight::{contains_ignore_case, find_ignore_case};
use crate::models::Record;

pub const NAME_EXACT: u32 = 100;
pub const NAME_PREFIX: u32 = 50;
pub const NAME_CONTAINS: u32 = 25;
pub const CATEGORY_MATCH: u32 = 20;
pub const DOMAIN_MATCH: u32 = 15;
pub const DESCRIPTION_MATCH: u32 = 15;
pub const IP_MATCH: u32 = 10;
pub const PORT_MATCH: u32 = 5;
pub const VLAN_MATCH: u32 = 5;

/// A record paired with its relevance score for one query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RankedRecord {
    pub record: Record,
    pub score: u32,
}

/// Per-field scoring breakdown, used by `--explain` output.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ScoreBreakdown {
    pub name: u32,
    pub category: u32,
    pub domain: u32,
    pub description: u32,
    pub ip: u32,
    pub port: u32,
    pub vlan: u32,
}

impl ScoreBreakdown {
    pub fn total(&self) -> u32 {
        self.name + self.category + self.domain + self.description + self.ip + self.port + self.vlan
    }
}

fn name_points(name: &str, query: &str) -> u32 {
    match find_ignore_case(name, query) {
        Some((0, end)) if end == name.len() => NAME_EXACT,
        Some((0, _)) => NAME_PREFIX,
        Some(_) => NAME_CONTAINS,
        None => 0,
    }
}

/// Field-by-field score of `record` against `query`.
pub fn explain(record: &Record, query: &str) -> ScoreBreakdown {
    let query = query.trim();
    if query.is_empty() {
        return ScoreBreakdown::default();
    }
    let hit = |cond: bool, points: u32| if cond { points } else { 0 };

    match record {
        Record::Service(s) => ScoreBreakdown {
            name: name_points(&s.name, query),
            category: hit(
                contains_ignore_case(s.category.as_str(), query),
                CATEGORY_MATCH,
            ),
            domain: hit(
                s.domain
                    .as_deref()
                    .is_some_and(|d| contains_ignore_case(d, query)),
                DOMAIN_MATCH,
            ),
            description: 0,
            ip: hit(
                s.ips.iter().any(|ip| contains_ignore_case(ip, query)),
                IP_MATCH,
            ),
            port: hit(
                s.ports.iter().any(|p| p.to_string().contains(query)),
                PORT_MATCH,
            ),
            vlan: hit(
                s.vlan.is_some_and(|v| v.to_string().contains(query)),
                VLAN_MATCH,
            ),
        },
        Record::Group(g) => ScoreBreakdown {
            name: name_points(&g.name, query),
            description: hit(
                g.description
                    .as_deref()
                    .is_some_and(|d| contains_ignore_case(d, query)),
                DESCRIPTION_MATCH,
            ),
            ..ScoreBreakdown::default()
        },
    }
}

/// Relevance score of `record` for `query`. Zero for a blank query.
pub fn score(record: &Record, query: &str) -> u32 {
    explain(record, query).total()
}

/// Order `records` by descending score. Ties keep their input order.
///
/// A blank query is the identity: every record is returned in input order
/// with score 0. Callers normally skip ranking in that case and apply the
/// active column sort instead.
pub fn rank(records: Vec<Record>, query: &str) -> Vec<RankedRecord> {
    let mut ranked: Vec<RankedRecord> = records
        .into_iter()
        .map(|record| {
            let score = score(&record, query);
            RankedRecord { record, score }
        })
        .collect();
    if !query.trim().is_empty() {
        // `sort_by` is stable; equal scores retain filter order.
        ranked.sort_by(|a, b| b.score.cmp(&a.score));
    }
    ranked
}
