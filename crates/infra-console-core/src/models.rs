//! Core data models for the inventory: services, groups, and the
//! [`Record`] union that every list view filters, ranks, and renders.
//!
//! Input value objects ([`NewService`], [`ServicePatch`], [`NewGroup`],
//! [`GroupPatch`]) validate themselves and report every failing field at
//! once through [`ValidationError`].

use std::fmt;
use std::net::IpAddr;
use std::ops::RangeInclusive;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

/// Maximum number of IP addresses on a single service.
pub const MAX_SERVICE_IPS: usize = 10;
/// Maximum number of ports on a single service.
pub const MAX_SERVICE_PORTS: usize = 50;
/// Maximum service name length, in characters.
pub const MAX_SERVICE_NAME_LEN: usize = 100;
/// Maximum group name length, in characters.
pub const MAX_GROUP_NAME_LEN: usize = 50;
/// Maximum group description length, in characters.
pub const MAX_GROUP_DESCRIPTION_LEN: usize = 500;
/// Maximum domain length (DNS limit).
pub const MAX_DOMAIN_LEN: usize = 253;
/// Valid 802.1Q VLAN identifiers.
pub const VLAN_RANGE: RangeInclusive<u16> = 1..=4094;

/// Service category, shown as the "Type" column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Web,
    Database,
    Api,
    Storage,
    Security,
    Monitoring,
    #[default]
    #[serde(other)]
    Unknown,
}

impl Category {
    pub const ALL: [Category; 7] = [
        Category::Web,
        Category::Database,
        Category::Api,
        Category::Storage,
        Category::Security,
        Category::Monitoring,
        Category::Unknown,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Category::Web => "web",
            Category::Database => "database",
            Category::Api => "api",
            Category::Storage => "storage",
            Category::Security => "security",
            Category::Monitoring => "monitoring",
            Category::Unknown => "unknown",
        }
    }

    /// Lenient parse: anything unrecognized maps to [`Category::Unknown`].
    pub fn parse(s: &str) -> Self {
        let s = s.trim();
        Self::ALL
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(s))
            .unwrap_or(Category::Unknown)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Denormalized reference from a service to its group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupRef {
    pub id: String,
    pub name: String,
}

/// A deployed service in the inventory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Service {
    pub id: String,
    pub name: String,
    pub category: Category,
    pub ips: Vec<String>,
    pub ports: Vec<u16>,
    pub vlan: Option<u16>,
    pub domain: Option<String>,
    pub group: Option<GroupRef>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Service {
    pub fn group_id(&self) -> Option<&str> {
        self.group.as_ref().map(|g| g.id.as_str())
    }
}

/// A named collection of services.
///
/// Membership lives on the service side; `service_count` is derived by the
/// store when the group is loaded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    #[serde(default)]
    pub service_count: usize,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Which kind of record a list view shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordKind {
    Service,
    Group,
}

impl RecordKind {
    /// Plural noun used in announcements and empty states.
    pub fn plural(self) -> &'static str {
        match self {
            RecordKind::Service => "services",
            RecordKind::Group => "groups",
        }
    }

    pub fn singular(self) -> &'static str {
        match self {
            RecordKind::Service => "service",
            RecordKind::Group => "group",
        }
    }
}

/// A row in any list view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Record {
    Service(Service),
    Group(Group),
}

impl Record {
    pub fn id(&self) -> &str {
        match self {
            Record::Service(s) => &s.id,
            Record::Group(g) => &g.id,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Record::Service(s) => &s.name,
            Record::Group(g) => &g.name,
        }
    }

    pub fn kind(&self) -> RecordKind {
        match self {
            Record::Service(_) => RecordKind::Service,
            Record::Group(_) => RecordKind::Group,
        }
    }

    pub fn as_service(&self) -> Option<&Service> {
        match self {
            Record::Service(s) => Some(s),
            Record::Group(_) => None,
        }
    }

    pub fn as_group(&self) -> Option<&Group> {
        match self {
            Record::Group(g) => Some(g),
            Record::Service(_) => None,
        }
    }
}

impl From<Service> for Record {
    fn from(s: Service) -> Self {
        Record::Service(s)
    }
}

impl From<Group> for Record {
    fn from(g: Group) -> Self {
        Record::Group(g)
    }
}

// ─── Validation ──────────────────────────────────────────────────────────────

/// One failing field in a [`ValidationError`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldIssue {
    pub field: &'static str,
    pub message: String,
}

/// Every field that failed validation for one input object.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("validation failed: {summary}")]
pub struct ValidationError {
    pub issues: Vec<FieldIssue>,
    summary: String,
}

impl ValidationError {
    fn new(issues: Vec<FieldIssue>) -> Self {
        let summary = issues
            .iter()
            .map(|i| format!("{}: {}", i.field, i.message))
            .collect::<Vec<_>>()
            .join("; ");
        Self { issues, summary }
    }

    /// A single-field failure raised outside `validate`, e.g. a reference
    /// the store could not resolve.
    pub fn single(field: &'static str, message: impl Into<String>) -> Self {
        Self::new(vec![FieldIssue {
            field,
            message: message.into(),
        }])
    }

    /// Whether any issue concerns `field`.
    pub fn has_field(&self, field: &str) -> bool {
        self.issues.iter().any(|i| i.field == field)
    }
}

#[derive(Default)]
struct Issues(Vec<FieldIssue>);

impl Issues {
    fn push(&mut self, field: &'static str, message: impl Into<String>) {
        self.0.push(FieldIssue {
            field,
            message: message.into(),
        });
    }

    fn finish<T>(self, value: T) -> Result<T, ValidationError> {
        if self.0.is_empty() {
            Ok(value)
        } else {
            Err(ValidationError::new(self.0))
        }
    }
}

/// Deserialize a present-but-null field as `Some(None)` so patches can
/// distinguish "clear this field" from "leave it alone".
fn double_option<'de, D, T>(de: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Deserialize::deserialize(de).map(Some)
}

fn blank_to_none(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Input for creating a service. Also the merged form of an update.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct NewService {
    pub name: String,
    #[serde(default)]
    pub category: Category,
    pub ips: Vec<String>,
    pub ports: Vec<u16>,
    #[serde(default)]
    pub vlan: Option<u16>,
    #[serde(default)]
    pub domain: Option<String>,
    #[serde(default)]
    pub group_id: Option<String>,
}

impl NewService {
    /// Validate and normalize: trims text, drops blank optionals, and
    /// removes duplicate IPs and ports while keeping first-seen order.
    pub fn validate(self) -> Result<NewService, ValidationError> {
        let mut issues = Issues::default();

        let name = self.name.trim().to_string();
        if name.is_empty() {
            issues.push("name", "must not be empty");
        } else if name.chars().count() > MAX_SERVICE_NAME_LEN {
            issues.push(
                "name",
                format!("must be at most {} characters", MAX_SERVICE_NAME_LEN),
            );
        }

        let mut ips: Vec<String> = Vec::new();
        for ip in self.ips.iter().map(|ip| ip.trim()).filter(|ip| !ip.is_empty()) {
            if ip.parse::<IpAddr>().is_err() {
                issues.push("ips", format!("'{}' is not a valid IP address", ip));
            } else if !ips.iter().any(|seen| seen == ip) {
                ips.push(ip.to_string());
            }
        }
        if ips.is_empty() && !issues.0.iter().any(|i| i.field == "ips") {
            issues.push("ips", "at least one IP address is required");
        }
        if ips.len() > MAX_SERVICE_IPS {
            issues.push(
                "ips",
                format!("at most {} IP addresses are allowed", MAX_SERVICE_IPS),
            );
        }

        let mut ports: Vec<u16> = Vec::new();
        for &port in &self.ports {
            if port == 0 {
                issues.push("ports", "ports must be between 1 and 65535");
            } else if !ports.contains(&port) {
                ports.push(port);
            }
        }
        if self.ports.is_empty() {
            issues.push("ports", "at least one port is required");
        }
        if ports.len() > MAX_SERVICE_PORTS {
            issues.push(
                "ports",
                format!("at most {} ports are allowed", MAX_SERVICE_PORTS),
            );
        }

        if let Some(vlan) = self.vlan {
            if !VLAN_RANGE.contains(&vlan) {
                issues.push("vlan", "VLAN must be between 1 and 4094");
            }
        }

        let domain = blank_to_none(self.domain);
        if let Some(d) = &domain {
            if d.len() > MAX_DOMAIN_LEN {
                issues.push(
                    "domain",
                    format!("must be at most {} characters", MAX_DOMAIN_LEN),
                );
            } else if d.chars().any(char::is_whitespace) {
                issues.push("domain", "must not contain whitespace");
            }
        }

        issues.finish(NewService {
            name,
            category: self.category,
            ips,
            ports,
            vlan: self.vlan,
            domain,
            group_id: blank_to_none(self.group_id),
        })
    }
}

/// Partial update for a service. `None` leaves a field unchanged; for the
/// nullable fields `Some(None)` clears it.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ServicePatch {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub category: Option<Category>,
    #[serde(default)]
    pub ips: Option<Vec<String>>,
    #[serde(default)]
    pub ports: Option<Vec<u16>>,
    #[serde(default, deserialize_with = "double_option")]
    pub vlan: Option<Option<u16>>,
    #[serde(default, deserialize_with = "double_option")]
    pub domain: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub group_id: Option<Option<String>>,
}

impl ServicePatch {
    /// Merge the patch over `current` and validate the result with the
    /// same rules as creation.
    pub fn merge_into(self, current: &Service) -> Result<NewService, ValidationError> {
        NewService {
            name: self.name.unwrap_or_else(|| current.name.clone()),
            category: self.category.unwrap_or(current.category),
            ips: self.ips.unwrap_or_else(|| current.ips.clone()),
            ports: self.ports.unwrap_or_else(|| current.ports.clone()),
            vlan: self.vlan.unwrap_or(current.vlan),
            domain: self.domain.unwrap_or_else(|| current.domain.clone()),
            group_id: self
                .group_id
                .unwrap_or_else(|| current.group_id().map(str::to_string)),
        }
        .validate()
    }
}

/// Input for creating a group.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct NewGroup {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

fn is_group_name_char(c: char) -> bool {
    c.is_alphanumeric() || c == ' ' || c == '-' || c == '_'
}

impl NewGroup {
    pub fn validate(self) -> Result<NewGroup, ValidationError> {
        let mut issues = Issues::default();

        let name = self.name.trim().to_string();
        if name.is_empty() {
            issues.push("name", "must not be empty");
        } else if name.chars().count() > MAX_GROUP_NAME_LEN {
            issues.push(
                "name",
                format!("must be at most {} characters", MAX_GROUP_NAME_LEN),
            );
        } else if !name.chars().all(is_group_name_char) {
            issues.push(
                "name",
                "may only contain letters, digits, spaces, '-' and '_'",
            );
        }

        let description = blank_to_none(self.description);
        if let Some(d) = &description {
            if d.chars().count() > MAX_GROUP_DESCRIPTION_LEN {
                issues.push(
                    "description",
                    format!("must be at most {} characters", MAX_GROUP_DESCRIPTION_LEN),
                );
            }
        }

        issues.finish(NewGroup { name, description })
    }
}

/// Partial update for a group.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct GroupPatch {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub description: Option<Option<String>>,
}

impl GroupPatch {
    pub fn merge_into(self, current: &Group) -> Result<NewGroup, ValidationError> {
        NewGroup {
            name: self.name.unwrap_or_else(|| current.name.clone()),
            description: self
                .description
                .unwrap_or_else(|| current.description.clone()),
        }
        .validate()
    }
}

/// Format a timestamp as ISO 8601 with second precision.
pub fn format_ts_iso(ts: &DateTime<Utc>) -> String {
    ts.format("%Y-%m-%dT%H:%M:%SZ").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_service() -> NewService {
        NewService {
            name: "  web-01 ".to_string(),
            category: Category::Web,
            ips: vec!["10.0.0.1".to_string(), "10.0.0.1".to_string()],
            ports: vec![443, 80, 443],
            vlan: Some(12),
            domain: Some("  ".to_string()),
            group_id: Some(String::new()),
        }
    }

    #[test]
    fn test_category_parse_is_lenient() {
        assert_eq!(Category::parse("Database"), Category::Database);
        assert_eq!(Category::parse(" api "), Category::Api);
        assert_eq!(Category::parse("mainframe"), Category::Unknown);
    }

    #[test]
    fn test_category_deserializes_unknown_strings() {
        let c: Category = serde_json::from_str("\"mainframe\"").unwrap();
        assert_eq!(c, Category::Unknown);
        let c: Category = serde_json::from_str("\"storage\"").unwrap();
        assert_eq!(c, Category::Storage);
    }

    #[test]
    fn test_new_service_normalizes() {
        let s = valid_service().validate().unwrap();
        assert_eq!(s.name, "web-01");
        assert_eq!(s.ips, vec!["10.0.0.1"]);
        assert_eq!(s.ports, vec![443, 80]);
        assert_eq!(s.domain, None);
        assert_eq!(s.group_id, None);
    }

    #[test]
    fn test_new_service_reports_every_field() {
        let input = NewService {
            name: " ".to_string(),
            category: Category::Api,
            ips: vec!["not-an-ip".to_string()],
            ports: vec![0],
            vlan: Some(4095),
            domain: Some("bad domain".to_string()),
            group_id: None,
        };
        let err = input.validate().unwrap_err();
        for field in ["name", "ips", "ports", "vlan", "domain"] {
            assert!(err.has_field(field), "missing issue for {}", field);
        }
        assert!(err.to_string().starts_with("validation failed: name"));
    }

    #[test]
    fn test_new_service_limits() {
        let mut input = valid_service();
        input.ips = (1..=11).map(|i| format!("10.0.0.{}", i)).collect();
        input.ports = (1..=51).collect();
        let err = input.validate().unwrap_err();
        assert!(err.has_field("ips"));
        assert!(err.has_field("ports"));
    }

    #[test]
    fn test_new_service_requires_ports_and_ips() {
        let mut input = valid_service();
        input.ips = vec!["   ".to_string()];
        input.ports = vec![];
        let err = input.validate().unwrap_err();
        assert_eq!(err.issues.len(), 2);
    }

    #[test]
    fn test_ipv6_accepted() {
        let mut input = valid_service();
        input.ips = vec!["fe80::1".to_string()];
        assert!(input.validate().is_ok());
    }

    #[test]
    fn test_service_patch_clears_nullable_fields() {
        let now = Utc::now();
        let current = Service {
            id: "s1".to_string(),
            name: "db".to_string(),
            category: Category::Database,
            ips: vec!["10.0.0.5".to_string()],
            ports: vec![5432],
            vlan: Some(20),
            domain: Some("db.internal".to_string()),
            group: Some(GroupRef {
                id: "g1".to_string(),
                name: "core".to_string(),
            }),
            created_at: now,
            updated_at: now,
        };
        let patch: ServicePatch =
            serde_json::from_str(r#"{"vlan": null, "name": "db-primary"}"#).unwrap();
        let merged = patch.merge_into(&current).unwrap();
        assert_eq!(merged.vlan, None);
        assert_eq!(merged.name, "db-primary");
        assert_eq!(merged.domain.as_deref(), Some("db.internal"));
        assert_eq!(merged.group_id.as_deref(), Some("g1"));
    }

    #[test]
    fn test_group_name_pattern() {
        assert!(NewGroup {
            name: "Core_Services-1".to_string(),
            description: None
        }
        .validate()
        .is_ok());
        let err = NewGroup {
            name: "core/services".to_string(),
            description: None,
        }
        .validate()
        .unwrap_err();
        assert!(err.has_field("name"));
    }

    #[test]
    fn test_record_serializes_with_kind_tag() {
        let now = Utc::now();
        let rec = Record::Group(Group {
            id: "g1".to_string(),
            name: "edge".to_string(),
            description: None,
            service_count: 2,
            created_at: now,
            updated_at: now,
        });
        let json = serde_json::to_value(&rec).unwrap();
        assert_eq!(json["kind"], "group");
        assert_eq!(json["service_count"], 2);
    }
}
