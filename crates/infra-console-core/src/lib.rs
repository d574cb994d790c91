//! # Infra Console Core
//!
//! Pure logic behind every inventory list view: data model and
//! validation, search-term highlighting, the filter pipeline, relevance
//! ranking, column sorting, row selection, the keyboard grid state
//! machine, screen-reader announcements, modal focus trapping, and the
//! store abstraction with an in-memory backend.
//!
//! This crate contains no tokio, sqlx, terminal, or filesystem I/O. The
//! only time-dependent component, the [`announcer`], takes its clock as a
//! parameter.
//!
//! Data flows leaf-first:
//!
//! ```text
//! records ─▶ filter ─▶ rank (query) / sort (no query) ─▶ ListView ─▶ GridEngine
//!                                                                       │
//!                                           Announcer ◀── selection, sort, counts
//! ```

pub mod announcer;
pub mod columns;
pub mod filter;
pub mod focus_trap;
pub mod grid;
pub mod highlight;
pub mod models;
pub mod rank;
pub mod selection;
pub mod sort;
pub mod store;
pub mod view;
