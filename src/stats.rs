//! Inventory statistics.
//!
//! Totals plus per-category and per-group breakdowns. Shared by
//! `invctl stats` and `GET /api/stats`.

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;

use infra_console_core::models::Category;
use infra_console_core::store::{InventoryStore, StoreResult};

use crate::config::Config;
use crate::db;
use crate::sqlite_store::SqliteStore;

#[derive(Debug, Clone, Serialize)]
pub struct CategoryCount {
    pub category: Category,
    pub count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct GroupCount {
    pub id: String,
    pub name: String,
    pub service_count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct InventoryStats {
    pub services: usize,
    pub groups: usize,
    pub ungrouped: usize,
    /// Categories with at least one service, most populated first.
    pub by_category: Vec<CategoryCount>,
    /// Groups, most populated first.
    pub by_group: Vec<GroupCount>,
    pub last_updated: Option<DateTime<Utc>>,
}

pub async fn compute(store: &dyn InventoryStore) -> StoreResult<InventoryStats> {
    let services = store.list_services().await?;
    let groups = store.list_groups().await?;

    let mut by_category: Vec<CategoryCount> = Category::ALL
        .iter()
        .map(|&category| CategoryCount {
            category,
            count: services.iter().filter(|s| s.category == category).count(),
        })
        .filter(|c| c.count > 0)
        .collect();
    by_category.sort_by(|a, b| b.count.cmp(&a.count));

    let mut by_group: Vec<GroupCount> = groups
        .iter()
        .map(|g| GroupCount {
            id: g.id.clone(),
            name: g.name.clone(),
            service_count: g.service_count,
        })
        .collect();
    by_group.sort_by(|a, b| {
        b.service_count
            .cmp(&a.service_count)
            .then_with(|| a.name.to_lowercase().cmp(&b.name.to_lowercase()))
    });

    let last_updated = services
        .iter()
        .map(|s| s.updated_at)
        .chain(groups.iter().map(|g| g.updated_at))
        .max();

    Ok(InventoryStats {
        services: services.len(),
        groups: groups.len(),
        ungrouped: services.iter().filter(|s| s.group.is_none()).count(),
        by_category,
        by_group,
        last_updated,
    })
}

/// Run the stats command: query the database and print a summary.
pub async fn run_stats(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    let store = SqliteStore::new(pool.clone());
    let stats = compute(&store).await?;

    let db_size = std::fs::metadata(&config.db.path)
        .map(|m| m.len())
        .unwrap_or(0);

    println!("Infra Console: Inventory Stats");
    println!("==============================");
    println!();
    println!("  Database:    {}", config.db.path.display());
    println!("  Size:        {}", format_bytes(db_size));
    println!();
    println!("  Services:    {}", stats.services);
    println!("  Groups:      {}", stats.groups);
    println!("  Ungrouped:   {}", stats.ungrouped);
    println!(
        "  Last change: {}",
        stats
            .last_updated
            .map(|ts| format_ts_relative(&ts))
            .unwrap_or_else(|| "never".to_string())
    );

    if !stats.by_category.is_empty() {
        println!();
        println!("  By type:");
        for c in &stats.by_category {
            println!("  {:<16} {:>6}", c.category, c.count);
        }
    }

    if !stats.by_group.is_empty() {
        println!();
        println!("  {:<32} {:>8}", "GROUP", "SERVICES");
        println!("  {}", "-".repeat(41));
        for g in &stats.by_group {
            println!("  {:<32} {:>8}", g.name, g.service_count);
        }
    }

    println!();

    pool.close().await;
    Ok(())
}

/// Format a byte count as a human-readable string.
fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}

/// "3 hours ago" style rendering; falls back to a date for old or future
/// timestamps.
fn format_ts_relative(ts: &DateTime<Utc>) -> String {
    let delta = (Utc::now() - *ts).num_seconds();
    if delta < 0 {
        return ts.format("%Y-%m-%d %H:%M").to_string();
    }
    if delta < 60 {
        "just now".to_string()
    } else if delta < 3600 {
        let mins = delta / 60;
        format!("{} min{} ago", mins, if mins == 1 { "" } else { "s" })
    } else if delta < 86400 {
        let hours = delta / 3600;
        format!("{} hour{} ago", hours, if hours == 1 { "" } else { "s" })
    } else if delta < 86400 * 30 {
        let days = delta / 86400;
        format!("{} day{} ago", days, if days == 1 { "" } else { "s" })
    } else {
        ts.format("%Y-%m-%d %H:%M").to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use infra_console_core::models::{NewGroup, NewService};
    use infra_console_core::store::memory::InMemoryStore;

    #[tokio::test]
    async fn test_compute_breakdowns() {
        let store = InMemoryStore::new();
        let g = store
            .create_group(NewGroup {
                name: "edge".to_string(),
                description: None,
            })
            .await
            .unwrap();
        for (name, category, group) in [
            ("lb-1", Category::Web, Some(g.id.clone())),
            ("lb-2", Category::Web, None),
            ("pg", Category::Database, None),
        ] {
            store
                .create_service(NewService {
                    name: name.to_string(),
                    category,
                    ips: vec!["10.0.0.1".to_string()],
                    ports: vec![80],
                    group_id: group,
                    ..NewService::default()
                })
                .await
                .unwrap();
        }

        let stats = compute(&store).await.unwrap();
        assert_eq!(stats.services, 3);
        assert_eq!(stats.groups, 1);
        assert_eq!(stats.ungrouped, 2);
        assert_eq!(stats.by_category[0].category, Category::Web);
        assert_eq!(stats.by_category[0].count, 2);
        assert_eq!(stats.by_group[0].service_count, 1);
        assert!(stats.last_updated.is_some());
    }

    #[test]
    fn test_format_helpers() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(2048), "2.0 KB");
        assert_eq!(format_ts_relative(&Utc::now()), "just now");
    }
}
