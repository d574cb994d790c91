//! In-memory [`InventoryStore`] for tests and embedding.
//!
//! All state lives in one `parking_lot::RwLock`, so every operation is
//! atomic with respect to the others.

use std::cmp::Ordering;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use uuid::Uuid;

use crate::models::{
    Group, GroupPatch, GroupRef, NewGroup, NewService, Service, ServicePatch, ValidationError,
};

use super::{BulkOutcome, InventoryStore, StoreError, StoreResult};

#[derive(Default)]
struct State {
    services: Vec<Service>,
    groups: Vec<Group>,
}

impl State {
    fn group(&self, id: &str) -> Option<&Group> {
        self.groups.iter().find(|g| g.id == id)
    }

    fn group_ref(&self, group_id: Option<&str>) -> StoreResult<Option<GroupRef>> {
        let Some(id) = group_id else {
            return Ok(None);
        };
        match self.group(id) {
            Some(g) => Ok(Some(GroupRef {
                id: g.id.clone(),
                name: g.name.clone(),
            })),
            None => {
                Err(ValidationError::single("group_id", format!("unknown group '{}'", id)).into())
            }
        }
    }

    fn name_taken(&self, name: &str, except: Option<&str>) -> bool {
        let lower = name.to_lowercase();
        self.groups
            .iter()
            .any(|g| Some(g.id.as_str()) != except && g.name.to_lowercase() == lower)
    }

    fn with_count(&self, group: &Group) -> Group {
        let mut g = group.clone();
        g.service_count = self
            .services
            .iter()
            .filter(|s| s.group_id() == Some(group.id.as_str()))
            .count();
        g
    }
}

/// Newest first, then id.
fn listing_order(a: (&DateTime<Utc>, &str), b: (&DateTime<Utc>, &str)) -> Ordering {
    b.0.cmp(a.0).then_with(|| a.1.cmp(b.1))
}

/// In-memory inventory store.
#[derive(Default)]
pub struct InMemoryStore {
    state: RwLock<State>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl InventoryStore for InMemoryStore {
    async fn list_services(&self) -> StoreResult<Vec<Service>> {
        let state = self.state.read();
        let mut out = state.services.clone();
        out.sort_by(|a, b| listing_order((&a.created_at, &a.id), (&b.created_at, &b.id)));
        Ok(out)
    }

    async fn get_service(&self, id: &str) -> StoreResult<Service> {
        self.state
            .read()
            .services
            .iter()
            .find(|s| s.id == id)
            .cloned()
            .ok_or_else(|| StoreError::service_not_found(id))
    }

    async fn create_service(&self, input: NewService) -> StoreResult<Service> {
        let input = input.validate()?;
        let mut state = self.state.write();
        let group = state.group_ref(input.group_id.as_deref())?;
        let now = Utc::now();
        let service = Service {
            id: Uuid::new_v4().to_string(),
            name: input.name,
            category: input.category,
            ips: input.ips,
            ports: input.ports,
            vlan: input.vlan,
            domain: input.domain,
            group,
            created_at: now,
            updated_at: now,
        };
        state.services.push(service.clone());
        Ok(service)
    }

    async fn update_service(&self, id: &str, patch: ServicePatch) -> StoreResult<Service> {
        let mut state = self.state.write();
        let idx = state
            .services
            .iter()
            .position(|s| s.id == id)
            .ok_or_else(|| StoreError::service_not_found(id))?;
        let merged = patch.merge_into(&state.services[idx])?;
        let group = state.group_ref(merged.group_id.as_deref())?;

        let service = &mut state.services[idx];
        service.name = merged.name;
        service.category = merged.category;
        service.ips = merged.ips;
        service.ports = merged.ports;
        service.vlan = merged.vlan;
        service.domain = merged.domain;
        service.group = group;
        service.updated_at = Utc::now().max(service.created_at);
        Ok(service.clone())
    }

    async fn delete_service(&self, id: &str) -> StoreResult<()> {
        let mut state = self.state.write();
        let before = state.services.len();
        state.services.retain(|s| s.id != id);
        if state.services.len() == before {
            return Err(StoreError::service_not_found(id));
        }
        Ok(())
    }

    async fn list_groups(&self) -> StoreResult<Vec<Group>> {
        let state = self.state.read();
        let mut out: Vec<Group> = state.groups.iter().map(|g| state.with_count(g)).collect();
        out.sort_by(|a, b| listing_order((&a.created_at, &a.id), (&b.created_at, &b.id)));
        Ok(out)
    }

    async fn get_group(&self, id: &str) -> StoreResult<Group> {
        let state = self.state.read();
        state
            .group(id)
            .map(|g| state.with_count(g))
            .ok_or_else(|| StoreError::group_not_found(id))
    }

    async fn create_group(&self, input: NewGroup) -> StoreResult<Group> {
        let input = input.validate()?;
        let mut state = self.state.write();
        if state.name_taken(&input.name, None) {
            return Err(StoreError::duplicate_group(&input.name));
        }
        let now = Utc::now();
        let group = Group {
            id: Uuid::new_v4().to_string(),
            name: input.name,
            description: input.description,
            service_count: 0,
            created_at: now,
            updated_at: now,
        };
        state.groups.push(group.clone());
        Ok(group)
    }

    async fn update_group(&self, id: &str, patch: GroupPatch) -> StoreResult<Group> {
        let mut state = self.state.write();
        let idx = state
            .groups
            .iter()
            .position(|g| g.id == id)
            .ok_or_else(|| StoreError::group_not_found(id))?;
        let merged = patch.merge_into(&state.groups[idx])?;
        if state.name_taken(&merged.name, Some(id)) {
            return Err(StoreError::duplicate_group(&merged.name));
        }

        let group = &mut state.groups[idx];
        group.name = merged.name.clone();
        group.description = merged.description;
        group.updated_at = Utc::now().max(group.created_at);
        let updated = group.clone();

        for s in state.services.iter_mut() {
            if let Some(r) = s.group.as_mut().filter(|r| r.id == id) {
                r.name = merged.name.clone();
            }
        }
        Ok(state.with_count(&updated))
    }

    async fn delete_group(&self, id: &str) -> StoreResult<()> {
        let mut state = self.state.write();
        let before = state.groups.len();
        state.groups.retain(|g| g.id != id);
        if state.groups.len() == before {
            return Err(StoreError::group_not_found(id));
        }
        for s in state.services.iter_mut() {
            if s.group_id() == Some(id) {
                s.group = None;
            }
        }
        Ok(())
    }

    async fn group_services(&self, id: &str) -> StoreResult<Vec<Service>> {
        let state = self.state.read();
        if state.group(id).is_none() {
            return Err(StoreError::group_not_found(id));
        }
        let mut out: Vec<Service> = state
            .services
            .iter()
            .filter(|s| s.group_id() == Some(id))
            .cloned()
            .collect();
        out.sort_by(|a, b| listing_order((&a.created_at, &a.id), (&b.created_at, &b.id)));
        Ok(out)
    }

    async fn bulk_delete_services(&self, ids: &[String]) -> StoreResult<BulkOutcome> {
        let mut state = self.state.write();
        let before = state.services.len();
        state.services.retain(|s| !ids.contains(&s.id));
        Ok(BulkOutcome {
            requested: ids.len(),
            affected: before - state.services.len(),
        })
    }

    async fn bulk_move_services(
        &self,
        ids: &[String],
        target_group_id: Option<&str>,
    ) -> StoreResult<BulkOutcome> {
        let mut state = self.state.write();
        let group = match target_group_id {
            Some(gid) => {
                let g = state
                    .group(gid)
                    .ok_or_else(|| StoreError::group_not_found(gid))?;
                Some(GroupRef {
                    id: g.id.clone(),
                    name: g.name.clone(),
                })
            }
            None => None,
        };
        let now = Utc::now();
        let mut affected = 0;
        for s in state.services.iter_mut().filter(|s| ids.contains(&s.id)) {
            s.group = group.clone();
            s.updated_at = now.max(s.created_at);
            affected += 1;
        }
        Ok(BulkOutcome {
            requested: ids.len(),
            affected,
        })
    }
}
