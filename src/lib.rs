//! # Infra Console
//!
//! Application layer of the infrastructure inventory console: SQLite
//! persistence, the `invctl` commands, the HTTP API and the terminal grid.
//! All list behavior (filtering, ranking, sorting, selection, focus and
//! announcements) lives in [`infra_console_core`].
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌──────────────────┐   ┌──────────┐
//! │ CLI / Browse │──▶│ ListView pipeline │◀──│   HTTP   │
//! └──────┬───────┘   │ (core crate)      │   └────┬─────┘
//!        │           └──────────────────┘        │
//!        └────────────▶ InventoryStore ◀──────────┘
//!                       (SqliteStore)
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |
//! | [`sqlite_store`] | SQLite `InventoryStore` |
//! | [`listing`] | Shared list options and table rendering |
//! | [`services`] | `invctl service` commands |
//! | [`groups`] | `invctl group` commands |
//! | [`stats`] | Inventory statistics |
//! | [`server`] | HTTP API |
//! | [`browse`] | Interactive terminal grid |
//! | [`tracing_setup`] | Log subscriber |

pub mod browse;
pub mod config;
pub mod db;
pub mod groups;
pub mod listing;
pub mod migrate;
pub mod server;
pub mod services;
pub mod sqlite_store;
pub mod stats;
pub mod tracing_setup;
