//! # Infra Console CLI (`invctl`)
//!
//! ## Usage
//!
//! ```bash
//! invctl --config ./config/invctl.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `invctl init` | Create the SQLite database and run schema migrations |
//! | `invctl service list` | Filtered, ranked or sorted service table |
//! | `invctl service add/update/remove/show` | Single-service CRUD |
//! | `invctl service move --to <group> <ids...>` | Bulk move |
//! | `invctl service purge <ids...>` | Bulk delete |
//! | `invctl group list/add/remove/show/rename` | Group management |
//! | `invctl stats` | Inventory totals |
//! | `invctl serve` | Start the HTTP API |
//! | `invctl browse services` | Interactive keyboard grid |
//!
//! ## Examples
//!
//! ```bash
//! invctl init
//! invctl group add edge --description "Edge proxies"
//! invctl service add --name web-01 --category web --ip 10.0.0.5 --port 443 --group edge
//! invctl service list --query web
//! invctl service list --ports 80,8000-8080 --sort vlan --desc
//! invctl browse services
//! ```

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

use infra_console::services::{ServiceFieldArgs, ServiceListArgs};
use infra_console::tracing_setup::{self, Verbosity};
use infra_console::{browse, config, groups, migrate, server, services, stats};
use infra_console_core::models::RecordKind;

/// Infra Console: inventory of services and groups with search, filters and
/// an accessible keyboard grid.
#[derive(Parser)]
#[command(name = "invctl", version, about)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/invctl.toml")]
    config: PathBuf,

    /// Debug logging to stderr.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Only log errors.
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema. Idempotent.
    Init,

    /// Manage services.
    Service {
        #[command(subcommand)]
        action: ServiceAction,
    },

    /// Manage groups.
    Group {
        #[command(subcommand)]
        action: GroupAction,
    },

    /// Show inventory statistics.
    Stats,

    /// Start the HTTP API on `[server].bind`.
    Serve,

    /// Browse records in an interactive terminal grid.
    Browse {
        #[arg(value_enum, default_value = "services")]
        what: BrowseTarget,
    },
}

#[derive(Subcommand)]
enum ServiceAction {
    /// List services as a table.
    List(ServiceListArgs),

    /// Create a service.
    Add(ServiceFieldArgs),

    /// Update fields of a service.
    Update {
        id: String,
        #[command(flatten)]
        fields: ServiceFieldArgs,
        /// Remove the VLAN.
        #[arg(long, conflicts_with = "vlan")]
        no_vlan: bool,
        /// Remove the domain.
        #[arg(long, conflicts_with = "domain")]
        no_domain: bool,
    },

    /// Delete a service.
    Remove { id: String },

    /// Show one service.
    Show { id: String },

    /// Move services into a group (`none` to ungroup).
    Move {
        #[arg(long)]
        to: String,
        #[arg(required = true)]
        ids: Vec<String>,
    },

    /// Delete several services at once.
    Purge {
        #[arg(required = true)]
        ids: Vec<String>,
    },
}

#[derive(Subcommand)]
enum GroupAction {
    /// List groups as a table.
    List {
        #[arg(long, short = 'Q')]
        query: Option<String>,
    },

    /// Create a group.
    Add {
        name: String,
        #[arg(long)]
        description: Option<String>,
    },

    /// Delete a group; its services become ungrouped.
    Remove {
        /// Group id or name.
        group: String,
    },

    /// Show a group and its services.
    Show {
        /// Group id or name.
        group: String,
    },

    /// Rename a group.
    Rename { group: String, new_name: String },
}

#[derive(Clone, Copy, ValueEnum)]
enum BrowseTarget {
    Services,
    Groups,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    tracing_setup::init_subscriber(Verbosity::from_flags(cli.verbose, cli.quiet));

    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Service { action } => match action {
            ServiceAction::List(args) => services::run_service_list(&cfg, args).await?,
            ServiceAction::Add(fields) => services::run_service_add(&cfg, fields).await?,
            ServiceAction::Update {
                id,
                fields,
                no_vlan,
                no_domain,
            } => services::run_service_update(&cfg, &id, fields, no_vlan, no_domain).await?,
            ServiceAction::Remove { id } => services::run_service_remove(&cfg, &id).await?,
            ServiceAction::Show { id } => services::run_service_show(&cfg, &id).await?,
            ServiceAction::Move { to, ids } => services::run_service_move(&cfg, &to, &ids).await?,
            ServiceAction::Purge { ids } => services::run_service_purge(&cfg, &ids).await?,
        },
        Commands::Group { action } => match action {
            GroupAction::List { query } => groups::run_group_list(&cfg, query).await?,
            GroupAction::Add { name, description } => {
                groups::run_group_add(&cfg, &name, description).await?
            }
            GroupAction::Remove { group } => groups::run_group_remove(&cfg, &group).await?,
            GroupAction::Show { group } => groups::run_group_show(&cfg, &group).await?,
            GroupAction::Rename { group, new_name } => {
                groups::run_group_rename(&cfg, &group, &new_name).await?
            }
        },
        Commands::Stats => stats::run_stats(&cfg).await?,
        Commands::Serve => server::run_server(&cfg).await?,
        Commands::Browse { what } => {
            let kind = match what {
                BrowseTarget::Services => RecordKind::Service,
                BrowseTarget::Groups => RecordKind::Group,
            };
            browse::run_browse(&cfg, kind).await?
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_query_short_flag_coexists_with_quiet() {
        let cli = Cli::try_parse_from(["invctl", "-q", "group", "list", "-Q", "edge"]).unwrap();
        assert!(cli.quiet);
        let Commands::Group {
            action: GroupAction::List { query },
        } = cli.command
        else {
            panic!("expected group list");
        };
        assert_eq!(query.as_deref(), Some("edge"));
    }
}
