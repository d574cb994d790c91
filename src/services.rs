//! `invctl service ...` commands.

use anyhow::{bail, Context, Result};
use clap::Args;

use infra_console_core::filter::{FilterCriteria, UNGROUPED};
use infra_console_core::models::{Category, NewService, RecordKind, Service, ServicePatch};
use infra_console_core::selection::BulkOperation;
use infra_console_core::store::InventoryStore;

use crate::config::Config;
use crate::db;
use crate::groups::resolve_group;
use crate::listing::{self, ListOptions};
use crate::sqlite_store::SqliteStore;

/// Filters and ordering for `service list`.
#[derive(Debug, Clone, Default, Args)]
pub struct ServiceListArgs {
    /// Free-text query (ranked by relevance)
    #[arg(long, short = 'Q')]
    pub query: Option<String>,
    /// Only this type (web, database, api, storage, security, monitoring, unknown)
    #[arg(long)]
    pub category: Option<String>,
    /// Group id or name; `none` for ungrouped services
    #[arg(long)]
    pub group: Option<String>,
    #[arg(long)]
    pub vlan: Option<String>,
    /// IP substring
    #[arg(long)]
    pub ip: Option<String>,
    /// Domain substring
    #[arg(long)]
    pub domain: Option<String>,
    /// Port ranges, e.g. `80,443,8000-8080`
    #[arg(long)]
    pub ports: Option<String>,
    /// Column to sort by when no query is given
    #[arg(long)]
    pub sort: Option<String>,
    #[arg(long)]
    pub desc: bool,
}

/// Field values for `service add` and `service update`.
#[derive(Debug, Clone, Default, Args)]
pub struct ServiceFieldArgs {
    #[arg(long)]
    pub name: Option<String>,
    #[arg(long)]
    pub category: Option<String>,
    /// Repeatable
    #[arg(long = "ip")]
    pub ips: Vec<String>,
    /// Repeatable
    #[arg(long = "port")]
    pub ports: Vec<u16>,
    #[arg(long)]
    pub vlan: Option<u16>,
    #[arg(long)]
    pub domain: Option<String>,
    /// Group id or name; `none` to ungroup
    #[arg(long)]
    pub group: Option<String>,
}

async fn open_store(config: &Config) -> Result<SqliteStore> {
    Ok(SqliteStore::new(db::connect(config).await?))
}

fn parse_category(raw: &str) -> Result<Category> {
    listing::parse_category(raw).with_context(|| format!("Unknown category: {}", raw))
}

/// Resolve a `--group` value: `None` leaves it unset, `none` ungroups.
async fn resolve_group_arg(store: &dyn InventoryStore, raw: &str) -> Result<Option<String>> {
    if raw.trim().eq_ignore_ascii_case(UNGROUPED) {
        Ok(None)
    } else {
        Ok(Some(resolve_group(store, raw).await?))
    }
}

pub async fn run_service_list(config: &Config, args: ServiceListArgs) -> Result<()> {
    let store = open_store(config).await?;

    let category = args.category.as_deref().map(parse_category).transpose()?;
    let group_id = match args.group.as_deref() {
        Some(raw) if raw.trim().eq_ignore_ascii_case(UNGROUPED) => Some(UNGROUPED.to_string()),
        Some(raw) => Some(resolve_group(&store, raw).await?),
        None => None,
    };

    let options = ListOptions {
        criteria: FilterCriteria {
            query: args.query,
            category,
            group_id,
            vlan: args.vlan,
            ip: args.ip,
            domain: args.domain,
            ports: args.ports,
        },
        sort: args.sort,
        descending: args.desc,
    };

    let view = listing::load_view(
        &store,
        RecordKind::Service,
        &options,
        listing::headless_context(config),
    )
    .await?;
    listing::print_view(&view);

    store.pool().close().await;
    Ok(())
}

pub async fn run_service_add(config: &Config, args: ServiceFieldArgs) -> Result<()> {
    let store = open_store(config).await?;

    let Some(name) = args.name else {
        bail!("--name is required");
    };
    let category = args
        .category
        .as_deref()
        .map(parse_category)
        .transpose()?
        .unwrap_or_default();
    let group_id = match args.group.as_deref() {
        Some(raw) => resolve_group_arg(&store, raw).await?,
        None => None,
    };

    let service = store
        .create_service(NewService {
            name,
            category,
            ips: args.ips,
            ports: args.ports,
            vlan: args.vlan,
            domain: args.domain,
            group_id,
        })
        .await?;

    println!("Created service {} ({})", service.name, service.id);
    store.pool().close().await;
    Ok(())
}

pub async fn run_service_update(
    config: &Config,
    id: &str,
    args: ServiceFieldArgs,
    clear_vlan: bool,
    clear_domain: bool,
) -> Result<()> {
    let store = open_store(config).await?;

    let group_id = match args.group.as_deref() {
        Some(raw) => Some(resolve_group_arg(&store, raw).await?),
        None => None,
    };
    let patch = ServicePatch {
        name: args.name,
        category: args.category.as_deref().map(parse_category).transpose()?,
        ips: (!args.ips.is_empty()).then_some(args.ips),
        ports: (!args.ports.is_empty()).then_some(args.ports),
        vlan: if clear_vlan { Some(None) } else { args.vlan.map(Some) },
        domain: if clear_domain {
            Some(None)
        } else {
            args.domain.map(Some)
        },
        group_id,
    };

    let service = store.update_service(id, patch).await?;
    print_service(&service);
    store.pool().close().await;
    Ok(())
}

pub async fn run_service_remove(config: &Config, id: &str) -> Result<()> {
    let store = open_store(config).await?;
    store.delete_service(id).await?;
    println!("Removed service {}", id);
    store.pool().close().await;
    Ok(())
}

pub async fn run_service_show(config: &Config, id: &str) -> Result<()> {
    let store = open_store(config).await?;
    let service = store.get_service(id).await?;
    print_service(&service);
    store.pool().close().await;
    Ok(())
}

/// `service move --to <group|none> <ids...>`
pub async fn run_service_move(config: &Config, to: &str, ids: &[String]) -> Result<()> {
    if ids.is_empty() {
        bail!("at least one service id is required");
    }
    let store = open_store(config).await?;
    let target = resolve_group_arg(&store, to).await?;
    let outcome = store
        .execute_bulk(BulkOperation::MoveToGroup, ids, target.as_deref())
        .await?;
    println!(
        "Moved {} of {} services to {}",
        outcome.affected,
        outcome.requested,
        if target.is_some() { to } else { "no group" }
    );
    store.pool().close().await;
    Ok(())
}

/// `service purge <ids...>`
pub async fn run_service_purge(config: &Config, ids: &[String]) -> Result<()> {
    if ids.is_empty() {
        bail!("at least one service id is required");
    }
    let store = open_store(config).await?;
    let outcome = store.execute_bulk(BulkOperation::Delete, ids, None).await?;
    println!(
        "Deleted {} of {} services",
        outcome.affected, outcome.requested
    );
    store.pool().close().await;
    Ok(())
}

pub fn print_service(service: &Service) {
    println!("--- Service ---");
    println!("id:       {}", service.id);
    println!("name:     {}", service.name);
    println!("type:     {}", service.category);
    println!("ips:      {}", service.ips.join(", "));
    println!(
        "ports:    {}",
        service
            .ports
            .iter()
            .map(u16::to_string)
            .collect::<Vec<_>>()
            .join(", ")
    );
    if let Some(vlan) = service.vlan {
        println!("vlan:     {}", vlan);
    }
    if let Some(domain) = &service.domain {
        println!("domain:   {}", domain);
    }
    if let Some(group) = &service.group {
        println!("group:    {} ({})", group.name, group.id);
    }
    println!("created:  {}", service.created_at);
    println!("updated:  {}", service.updated_at);
}
