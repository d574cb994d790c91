//! SQLite-backed [`InventoryStore`] implementation.
//!
//! IPs and ports are stored as JSON arrays (`ips_json`, `ports_json`);
//! timestamps as Unix milliseconds. Group membership is the nullable
//! `services.group_id` foreign key, and a group's `service_count` is
//! computed on read.

use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use infra_console_core::models::{
    Category, Group, GroupPatch, GroupRef, NewGroup, NewService, Service, ServicePatch,
    ValidationError,
};
use infra_console_core::store::{BulkOutcome, InventoryStore, StoreError, StoreResult};

const SERVICE_SELECT: &str = r#"
    SELECT s.id, s.name, s.category, s.ips_json, s.ports_json, s.vlan, s.domain,
           s.group_id, g.name AS group_name, s.created_at, s.updated_at
    FROM services s
    LEFT JOIN groups g ON g.id = s.group_id
"#;

const GROUP_SELECT: &str = r#"
    SELECT g.id, g.name, g.description, g.created_at, g.updated_at,
           (SELECT COUNT(*) FROM services s WHERE s.group_id = g.id) AS service_count
    FROM groups g
"#;

/// SQLite implementation of the [`InventoryStore`] trait.
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Resolve a group reference for a service write.
    async fn group_ref(&self, group_id: Option<&str>) -> StoreResult<Option<GroupRef>> {
        let Some(id) = group_id else {
            return Ok(None);
        };
        let name: Option<String> = sqlx::query_scalar("SELECT name FROM groups WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        match name {
            Some(name) => Ok(Some(GroupRef {
                id: id.to_string(),
                name,
            })),
            None => {
                Err(ValidationError::single("group_id", format!("unknown group '{}'", id)).into())
            }
        }
    }

    async fn group_exists(&self, id: &str) -> StoreResult<bool> {
        let found: Option<String> = sqlx::query_scalar("SELECT id FROM groups WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(found.is_some())
    }
}

fn db_err(e: sqlx::Error) -> StoreError {
    StoreError::Backend(anyhow::Error::from(e))
}

/// Map a write error, turning a unique-name violation into a conflict.
fn group_write_err(e: sqlx::Error, name: &str) -> StoreError {
    let unique = e
        .as_database_error()
        .is_some_and(|d| d.is_unique_violation());
    if unique {
        StoreError::duplicate_group(name)
    } else {
        db_err(e)
    }
}

fn to_millis(ts: &DateTime<Utc>) -> i64 {
    ts.timestamp_millis()
}

fn from_millis(ms: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(ms).unwrap_or_default()
}

/// Current time at the precision the database keeps.
fn now() -> DateTime<Utc> {
    from_millis(to_millis(&Utc::now()))
}

fn row_to_service(row: &SqliteRow) -> anyhow::Result<Service> {
    let ips_json: String = row.try_get("ips_json")?;
    let ports_json: String = row.try_get("ports_json")?;
    let vlan: Option<i64> = row.try_get("vlan")?;
    let group_id: Option<String> = row.try_get("group_id")?;
    let group_name: Option<String> = row.try_get("group_name")?;
    let category: String = row.try_get("category")?;

    Ok(Service {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        category: Category::parse(&category),
        ips: serde_json::from_str(&ips_json).context("corrupt ips_json column")?,
        ports: serde_json::from_str(&ports_json).context("corrupt ports_json column")?,
        vlan: vlan.and_then(|v| u16::try_from(v).ok()),
        domain: row.try_get("domain")?,
        group: match (group_id, group_name) {
            (Some(id), Some(name)) => Some(GroupRef { id, name }),
            _ => None,
        },
        created_at: from_millis(row.try_get("created_at")?),
        updated_at: from_millis(row.try_get("updated_at")?),
    })
}

fn row_to_group(row: &SqliteRow) -> anyhow::Result<Group> {
    let count: i64 = row.try_get("service_count")?;
    Ok(Group {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        description: row.try_get("description")?,
        service_count: usize::try_from(count).unwrap_or(0),
        created_at: from_millis(row.try_get("created_at")?),
        updated_at: from_millis(row.try_get("updated_at")?),
    })
}

fn collect<T>(rows: &[SqliteRow], f: fn(&SqliteRow) -> anyhow::Result<T>) -> StoreResult<Vec<T>> {
    rows.iter()
        .map(|r| f(r).map_err(StoreError::from))
        .collect()
}

fn json<T: serde::Serialize>(value: &T) -> StoreResult<String> {
    serde_json::to_string(value).map_err(|e| StoreError::Backend(e.into()))
}

#[async_trait]
impl InventoryStore for SqliteStore {
    async fn list_services(&self) -> StoreResult<Vec<Service>> {
        let sql = format!("{} ORDER BY s.created_at DESC, s.id ASC", SERVICE_SELECT);
        let rows = sqlx::query(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;
        collect(&rows, row_to_service)
    }

    async fn get_service(&self, id: &str) -> StoreResult<Service> {
        let sql = format!("{} WHERE s.id = ?", SERVICE_SELECT);
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?
            .ok_or_else(|| StoreError::service_not_found(id))?;
        Ok(row_to_service(&row)?)
    }

    async fn create_service(&self, input: NewService) -> StoreResult<Service> {
        let input = input.validate()?;
        let group = self.group_ref(input.group_id.as_deref()).await?;
        let now = now();
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

        sqlx::query(
            r#"
            INSERT INTO services (id, name, category, ips_json, ports_json, vlan, domain,
                                  group_id, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&service.id)
        .bind(&service.name)
        .bind(service.category.as_str())
        .bind(json(&service.ips)?)
        .bind(json(&service.ports)?)
        .bind(service.vlan.map(i64::from))
        .bind(&service.domain)
        .bind(service.group_id())
        .bind(to_millis(&service.created_at))
        .bind(to_millis(&service.updated_at))
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        tracing::debug!(id = %service.id, name = %service.name, "service created");
        Ok(service)
    }

    async fn update_service(&self, id: &str, patch: ServicePatch) -> StoreResult<Service> {
        let current = self.get_service(id).await?;
        let merged = patch.merge_into(&current)?;
        let group = self.group_ref(merged.group_id.as_deref()).await?;
        let updated_at = now().max(current.created_at);

        sqlx::query(
            r#"
            UPDATE services
            SET name = ?, category = ?, ips_json = ?, ports_json = ?, vlan = ?, domain = ?,
                group_id = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&merged.name)
        .bind(merged.category.as_str())
        .bind(json(&merged.ips)?)
        .bind(json(&merged.ports)?)
        .bind(merged.vlan.map(i64::from))
        .bind(&merged.domain)
        .bind(group.as_ref().map(|g| g.id.as_str()))
        .bind(to_millis(&updated_at))
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(Service {
            name: merged.name,
            category: merged.category,
            ips: merged.ips,
            ports: merged.ports,
            vlan: merged.vlan,
            domain: merged.domain,
            group,
            updated_at,
            ..current
        })
    }

    async fn delete_service(&self, id: &str) -> StoreResult<()> {
        let result = sqlx::query("DELETE FROM services WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        if result.rows_affected() == 0 {
            return Err(StoreError::service_not_found(id));
        }
        Ok(())
    }

    async fn list_groups(&self) -> StoreResult<Vec<Group>> {
        let sql = format!("{} ORDER BY g.created_at DESC, g.id ASC", GROUP_SELECT);
        let rows = sqlx::query(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;
        collect(&rows, row_to_group)
    }

    async fn get_group(&self, id: &str) -> StoreResult<Group> {
        let sql = format!("{} WHERE g.id = ?", GROUP_SELECT);
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?
            .ok_or_else(|| StoreError::group_not_found(id))?;
        Ok(row_to_group(&row)?)
    }

    async fn create_group(&self, input: NewGroup) -> StoreResult<Group> {
        let input = input.validate()?;
        let now = now();
        let group = Group {
            id: Uuid::new_v4().to_string(),
            name: input.name,
            description: input.description,
            service_count: 0,
            created_at: now,
            updated_at: now,
        };

        sqlx::query(
            "INSERT INTO groups (id, name, description, created_at, updated_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&group.id)
        .bind(&group.name)
        .bind(&group.description)
        .bind(to_millis(&group.created_at))
        .bind(to_millis(&group.updated_at))
        .execute(&self.pool)
        .await
        .map_err(|e| group_write_err(e, &group.name))?;

        tracing::debug!(id = %group.id, name = %group.name, "group created");
        Ok(group)
    }

    async fn update_group(&self, id: &str, patch: GroupPatch) -> StoreResult<Group> {
        let current = self.get_group(id).await?;
        let merged = patch.merge_into(&current)?;
        let updated_at = now().max(current.created_at);

        sqlx::query("UPDATE groups SET name = ?, description = ?, updated_at = ? WHERE id = ?")
            .bind(&merged.name)
            .bind(&merged.description)
            .bind(to_millis(&updated_at))
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| group_write_err(e, &merged.name))?;

        Ok(Group {
            name: merged.name,
            description: merged.description,
            updated_at,
            ..current
        })
    }

    async fn delete_group(&self, id: &str) -> StoreResult<()> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        sqlx::query("UPDATE services SET group_id = NULL WHERE group_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;

        let result = sqlx::query("DELETE FROM groups WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;
        if result.rows_affected() == 0 {
            return Err(StoreError::group_not_found(id));
        }

        tx.commit().await.map_err(db_err)?;
        Ok(())
    }

    async fn group_services(&self, id: &str) -> StoreResult<Vec<Service>> {
        if !self.group_exists(id).await? {
            return Err(StoreError::group_not_found(id));
        }
        let sql = format!(
            "{} WHERE s.group_id = ? ORDER BY s.created_at DESC, s.id ASC",
            SERVICE_SELECT
        );
        let rows = sqlx::query(&sql)
            .bind(id)
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;
        collect(&rows, row_to_service)
    }

    async fn bulk_delete_services(&self, ids: &[String]) -> StoreResult<BulkOutcome> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;
        let mut affected = 0u64;
        for id in ids {
            affected += sqlx::query("DELETE FROM services WHERE id = ?")
                .bind(id)
                .execute(&mut *tx)
                .await
                .map_err(db_err)?
                .rows_affected();
        }
        tx.commit().await.map_err(db_err)?;

        tracing::info!(requested = ids.len(), affected, "bulk delete");
        Ok(BulkOutcome {
            requested: ids.len(),
            affected: usize::try_from(affected).unwrap_or(usize::MAX),
        })
    }

    async fn bulk_move_services(
        &self,
        ids: &[String],
        target_group_id: Option<&str>,
    ) -> StoreResult<BulkOutcome> {
        if let Some(gid) = target_group_id {
            if !self.group_exists(gid).await? {
                return Err(StoreError::group_not_found(gid));
            }
        }

        let now = to_millis(&now());
        let mut tx = self.pool.begin().await.map_err(db_err)?;
        let mut affected = 0u64;
        for id in ids {
            affected += sqlx::query(
                "UPDATE services SET group_id = ?, updated_at = MAX(?, created_at) WHERE id = ?",
            )
            .bind(target_group_id)
            .bind(now)
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?
            .rows_affected();
        }
        tx.commit().await.map_err(db_err)?;

        tracing::info!(requested = ids.len(), affected, target = ?target_group_id, "bulk move");
        Ok(BulkOutcome {
            requested: ids.len(),
            affected: usize::try_from(affected).unwrap_or(usize::MAX),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::migrate;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn store() -> SqliteStore {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        sqlx::query("PRAGMA foreign_keys = ON")
            .execute(&pool)
            .await
            .unwrap();
        migrate::apply(&pool).await.unwrap();
        SqliteStore::new(pool)
    }

    fn svc(name: &str, group_id: Option<&str>) -> NewService {
        NewService {
            name: name.to_string(),
            category: Category::Database,
            ips: vec!["10.9.0.1".to_string(), "fd00::9".to_string()],
            ports: vec![5432, 6432],
            vlan: Some(90),
            domain: Some("pg.internal".to_string()),
            group_id: group_id.map(str::to_string),
        }
    }

    #[tokio::test]
    async fn test_service_round_trip_preserves_lists() {
        let store = store().await;
        let created = store.create_service(svc("pg-main", None)).await.unwrap();
        let loaded = store.get_service(&created.id).await.unwrap();
        assert_eq!(loaded.ips, vec!["10.9.0.1", "fd00::9"]);
        assert_eq!(loaded.ports, vec![5432, 6432]);
        assert_eq!(loaded.vlan, Some(90));
        assert_eq!(loaded.category, Category::Database);
    }

    #[tokio::test]
    async fn test_group_membership_and_delete_ungroups() {
        let store = store().await;
        let g = store
            .create_group(NewGroup {
                name: "data".to_string(),
                description: None,
            })
            .await
            .unwrap();
        let s = store.create_service(svc("pg", Some(&g.id))).await.unwrap();
        assert_eq!(s.group.as_ref().unwrap().name, "data");
        assert_eq!(store.get_group(&g.id).await.unwrap().service_count, 1);
        assert_eq!(store.group_services(&g.id).await.unwrap().len(), 1);

        store.delete_group(&g.id).await.unwrap();
        assert!(store.get_service(&s.id).await.unwrap().group.is_none());
        assert!(matches!(
            store.delete_group(&g.id).await,
            Err(StoreError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_duplicate_group_name_is_conflict() {
        let store = store().await;
        let input = NewGroup {
            name: "Edge".to_string(),
            description: None,
        };
        store.create_group(input.clone()).await.unwrap();
        let dup = NewGroup {
            name: "edge".to_string(),
            description: None,
        };
        assert!(matches!(
            store.create_group(dup).await,
            Err(StoreError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn test_unknown_group_reference_is_validation_error() {
        let store = store().await;
        match store.create_service(svc("x", Some("nope"))).await {
            Err(StoreError::Validation(e)) => assert!(e.has_field("group_id")),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_bulk_move_and_delete() {
        let store = store().await;
        let g = store
            .create_group(NewGroup {
                name: "batch".to_string(),
                description: Some("bulk target".to_string()),
            })
            .await
            .unwrap();
        let a = store.create_service(svc("a", None)).await.unwrap().id;
        let b = store.create_service(svc("b", None)).await.unwrap().id;

        let ids = vec![a.clone(), b.clone(), "ghost".to_string()];
        let moved = store.bulk_move_services(&ids, Some(&g.id)).await.unwrap();
        assert_eq!(moved.affected, 2);
        assert_eq!(store.get_group(&g.id).await.unwrap().service_count, 2);

        let deleted = store.bulk_delete_services(&ids).await.unwrap();
        assert_eq!(deleted, BulkOutcome { requested: 3, affected: 2 });
        assert!(store.list_services().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_update_clears_vlan_and_keeps_created_at() {
        let store = store().await;
        let s = store.create_service(svc("pg", None)).await.unwrap();
        assert_eq!(store.get_service(&s.id).await.unwrap(), s);
        let patch = ServicePatch {
            vlan: Some(None),
            ..ServicePatch::default()
        };
        let updated = store.update_service(&s.id, patch).await.unwrap();
        assert_eq!(updated.vlan, None);
        assert_eq!(updated.created_at, s.created_at);
        let reloaded = store.get_service(&s.id).await.unwrap();
        assert_eq!(reloaded.vlan, None);
    }
}
