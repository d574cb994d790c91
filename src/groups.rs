//! `invctl group ...` commands.

use anyhow::{bail, Result};

use infra_console_core::filter::FilterCriteria;
use infra_console_core::models::{GroupPatch, NewGroup, RecordKind};
use infra_console_core::store::{InventoryStore, StoreError};

use crate::config::Config;
use crate::db;
use crate::listing::{self, ListOptions};
use crate::sqlite_store::SqliteStore;

/// Resolve a group given by id or by (case-insensitive) name to its id.
pub async fn resolve_group(store: &dyn InventoryStore, raw: &str) -> Result<String> {
    let raw = raw.trim();
    match store.get_group(raw).await {
        Ok(group) => return Ok(group.id),
        Err(StoreError::NotFound { .. }) => {}
        Err(e) => return Err(e.into()),
    }
    store
        .list_groups()
        .await?
        .into_iter()
        .find(|g| g.name.eq_ignore_ascii_case(raw))
        .map(|g| g.id)
        .ok_or_else(|| anyhow::anyhow!("Group not found: {}", raw))
}

pub async fn run_group_list(config: &Config, query: Option<String>) -> Result<()> {
    let store = SqliteStore::new(db::connect(config).await?);
    let options = ListOptions {
        criteria: FilterCriteria {
            query,
            ..FilterCriteria::default()
        },
        ..ListOptions::default()
    };
    let view = listing::load_view(
        &store,
        RecordKind::Group,
        &options,
        listing::headless_context(config),
    )
    .await?;
    listing::print_view(&view);
    store.pool().close().await;
    Ok(())
}

pub async fn run_group_add(config: &Config, name: &str, description: Option<String>) -> Result<()> {
    let store = SqliteStore::new(db::connect(config).await?);
    let group = store
        .create_group(NewGroup {
            name: name.to_string(),
            description,
        })
        .await?;
    println!("Created group {} ({})", group.name, group.id);
    store.pool().close().await;
    Ok(())
}

pub async fn run_group_remove(config: &Config, id_or_name: &str) -> Result<()> {
    let store = SqliteStore::new(db::connect(config).await?);
    let id = resolve_group(&store, id_or_name).await?;
    let members = store.group_services(&id).await?.len();
    store.delete_group(&id).await?;
    println!("Removed group {}", id);
    if members > 0 {
        println!("{} services are now ungrouped", members);
    }
    store.pool().close().await;
    Ok(())
}

pub async fn run_group_show(config: &Config, id_or_name: &str) -> Result<()> {
    let store = SqliteStore::new(db::connect(config).await?);
    let id = resolve_group(&store, id_or_name).await?;
    let group = store.get_group(&id).await?;
    let services = store.group_services(&id).await?;

    println!("--- Group ---");
    println!("id:          {}", group.id);
    println!("name:        {}", group.name);
    if let Some(description) = &group.description {
        println!("description: {}", description);
    }
    println!("created:     {}", group.created_at);
    println!("updated:     {}", group.updated_at);
    println!();
    println!("--- Services ({}) ---", services.len());
    for s in &services {
        println!("{:<36}  {:<24} {}", s.id, s.name, s.category);
    }

    store.pool().close().await;
    Ok(())
}

/// `group rename <id|name> <new-name>`
pub async fn run_group_rename(config: &Config, id_or_name: &str, new_name: &str) -> Result<()> {
    if new_name.trim().is_empty() {
        bail!("new name must not be empty");
    }
    let store = SqliteStore::new(db::connect(config).await?);
    let id = resolve_group(&store, id_or_name).await?;
    let group = store
        .update_group(
            &id,
            GroupPatch {
                name: Some(new_name.to_string()),
                description: None,
            },
        )
        .await?;
    println!("Renamed group {} to {}", group.id, group.name);
    store.pool().close().await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use infra_console_core::store::memory::InMemoryStore;

    #[tokio::test]
    async fn test_resolve_by_id_or_name() {
        let store = InMemoryStore::new();
        let g = store
            .create_group(NewGroup {
                name: "Edge".to_string(),
                description: None,
            })
            .await
            .unwrap();

        assert_eq!(resolve_group(&store, &g.id).await.unwrap(), g.id);
        assert_eq!(resolve_group(&store, " edge ").await.unwrap(), g.id);
        let err = resolve_group(&store, "core").await.unwrap_err();
        assert!(err.to_string().contains("Group not found"));
    }
}
