//! Storage abstraction for the inventory.
//!
//! The [`InventoryStore`] trait covers everything the list views and the
//! mutation layer need: CRUD for services and groups, member lookup, and
//! the two bulk operations. Backends: [`memory::InMemoryStore`] here, and
//! the SQLite store in the application crate.
//!
//! Implementations must be `Send + Sync` to work with async runtimes.

pub mod memory;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

use crate::models::{
    Group, GroupPatch, NewGroup, NewService, Record, RecordKind, Service, ServicePatch,
    ValidationError,
};
use crate::selection::BulkOperation;

/// Typed failure of a store operation.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },
    #[error("conflict: {0}")]
    Conflict(String),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

impl StoreError {
    pub fn service_not_found(id: &str) -> Self {
        StoreError::NotFound {
            entity: "service",
            id: id.to_string(),
        }
    }

    pub fn group_not_found(id: &str) -> Self {
        StoreError::NotFound {
            entity: "group",
            id: id.to_string(),
        }
    }

    pub fn duplicate_group(name: &str) -> Self {
        StoreError::Conflict(format!("a group named '{}' already exists", name))
    }
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Result of a bulk operation. Unknown ids are skipped, not errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BulkOutcome {
    pub requested: usize,
    pub affected: usize,
}

/// Abstract inventory backend.
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`list_services`](InventoryStore::list_services) | All services, newest first |
/// | [`create_service`](InventoryStore::create_service) | Validate and insert |
/// | [`update_service`](InventoryStore::update_service) | Merge a patch, validate, store |
/// | [`list_groups`](InventoryStore::list_groups) | All groups with member counts |
/// | [`group_services`](InventoryStore::group_services) | Members of one group |
/// | [`bulk_delete_services`](InventoryStore::bulk_delete_services) | Delete many |
/// | [`bulk_move_services`](InventoryStore::bulk_move_services) | Regroup many |
///
/// Deleting a group ungroups its services rather than deleting them.
#[async_trait]
pub trait InventoryStore: Send + Sync {
    async fn list_services(&self) -> StoreResult<Vec<Service>>;

    async fn get_service(&self, id: &str) -> StoreResult<Service>;

    /// Create a service. An unknown `group_id` is a validation error.
    async fn create_service(&self, input: NewService) -> StoreResult<Service>;

    async fn update_service(&self, id: &str, patch: ServicePatch) -> StoreResult<Service>;

    async fn delete_service(&self, id: &str) -> StoreResult<()>;

    async fn list_groups(&self) -> StoreResult<Vec<Group>>;

    async fn get_group(&self, id: &str) -> StoreResult<Group>;

    /// Create a group. Names are unique case-insensitively.
    async fn create_group(&self, input: NewGroup) -> StoreResult<Group>;

    async fn update_group(&self, id: &str, patch: GroupPatch) -> StoreResult<Group>;

    async fn delete_group(&self, id: &str) -> StoreResult<()>;

    async fn group_services(&self, id: &str) -> StoreResult<Vec<Service>>;

    async fn bulk_delete_services(&self, ids: &[String]) -> StoreResult<BulkOutcome>;

    /// Move services into `target_group_id`, or out of any group for `None`.
    async fn bulk_move_services(
        &self,
        ids: &[String],
        target_group_id: Option<&str>,
    ) -> StoreResult<BulkOutcome>;

    /// Dispatch a typed bulk command.
    async fn execute_bulk(
        &self,
        operation: BulkOperation,
        ids: &[String],
        target_group_id: Option<&str>,
    ) -> StoreResult<BulkOutcome> {
        match operation {
            BulkOperation::Delete => self.bulk_delete_services(ids).await,
            BulkOperation::MoveToGroup => self.bulk_move_services(ids, target_group_id).await,
        }
    }

    /// Every record of one kind, ready for a list view.
    async fn list_records(&self, kind: RecordKind) -> StoreResult<Vec<Record>> {
        Ok(match kind {
            RecordKind::Service => self
                .list_services()
                .await?
                .into_iter()
                .map(Record::from)
                .collect(),
            RecordKind::Group => self
                .list_groups()
                .await?
                .into_iter()
                .map(Record::from)
                .collect(),
        })
    }
}
