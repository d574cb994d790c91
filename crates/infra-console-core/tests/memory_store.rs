use infra_console_core::models::{Category, GroupPatch, NewGroup, NewService, RecordKind, ServicePatch};
use infra_console_core::selection::BulkOperation;
use infra_console_core::store::memory::InMemoryStore;
use infra_console_core::store::{InventoryStore, StoreError};

fn new_service(name: &str, group_id: Option<&str>) -> NewService {
    NewService {
        name: name.to_string(),
        category: Category::Api,
        ips: vec!["10.20.0.4".to_string()],
        ports: vec![8080],
        vlan: Some(40),
        domain: None,
        group_id: group_id.map(str::to_string),
    }
}

fn group(name: &str) -> NewGroup {
    NewGroup {
        name: name.to_string(),
        description: Some("edge tier".to_string()),
    }
}

#[tokio::test]
async fn test_service_crud_round_trip() {
    let store = InMemoryStore::new();
    let created = store.create_service(new_service("api-gw", None)).await.unwrap();
    assert_eq!(store.get_service(&created.id).await.unwrap(), created);

    let patch = ServicePatch {
        name: Some("api-gateway".to_string()),
        vlan: Some(None),
        ..ServicePatch::default()
    };
    let updated = store.update_service(&created.id, patch).await.unwrap();
    assert_eq!(updated.name, "api-gateway");
    assert_eq!(updated.vlan, None);
    assert!(updated.updated_at >= updated.created_at);

    store.delete_service(&created.id).await.unwrap();
    assert!(matches!(
        store.get_service(&created.id).await,
        Err(StoreError::NotFound { entity: "service", .. })
    ));
}

#[tokio::test]
async fn test_validation_errors_are_typed() {
    let store = InMemoryStore::new();
    let mut bad = new_service("", None);
    bad.ports.clear();
    match store.create_service(bad).await {
        Err(StoreError::Validation(e)) => {
            assert!(e.has_field("name"));
            assert!(e.has_field("ports"));
        }
        other => panic!("expected validation error, got {:?}", other),
    }

    match store.create_service(new_service("x", Some("missing"))).await {
        Err(StoreError::Validation(e)) => assert!(e.has_field("group_id")),
        other => panic!("expected validation error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_duplicate_group_name_conflicts_case_insensitively() {
    let store = InMemoryStore::new();
    let edge = store.create_group(group("Edge")).await.unwrap();
    assert!(matches!(
        store.create_group(group("edge")).await,
        Err(StoreError::Conflict(_))
    ));
    let core = store.create_group(group("core")).await.unwrap();
    let rename = GroupPatch {
        name: Some("EDGE".to_string()),
        description: None,
    };
    assert!(matches!(
        store.update_group(&core.id, rename).await,
        Err(StoreError::Conflict(_))
    ));
    // renaming to its own name in another case is fine
    let same = GroupPatch {
        name: Some("edge".to_string()),
        description: None,
    };
    assert_eq!(store.update_group(&edge.id, same).await.unwrap().name, "edge");
}

#[tokio::test]
async fn test_group_rename_and_delete_propagate_to_services() {
    let store = InMemoryStore::new();
    let g = store.create_group(group("payments")).await.unwrap();
    let s = store
        .create_service(new_service("billing", Some(&g.id)))
        .await
        .unwrap();
    assert_eq!(store.get_group(&g.id).await.unwrap().service_count, 1);

    store
        .update_group(
            &g.id,
            GroupPatch {
                name: Some("billing-core".to_string()),
                description: None,
            },
        )
        .await
        .unwrap();
    let reloaded = store.get_service(&s.id).await.unwrap();
    assert_eq!(reloaded.group.unwrap().name, "billing-core");

    store.delete_group(&g.id).await.unwrap();
    let orphan = store.get_service(&s.id).await.unwrap();
    assert!(orphan.group.is_none());
}

#[tokio::test]
async fn test_bulk_operations() {
    let store = InMemoryStore::new();
    let g = store.create_group(group("batch")).await.unwrap();
    let mut ids = Vec::new();
    for name in ["a", "b", "c"] {
        ids.push(store.create_service(new_service(name, None)).await.unwrap().id);
    }

    let moved = store
        .execute_bulk(BulkOperation::MoveToGroup, &ids[..2], Some(&g.id))
        .await
        .unwrap();
    assert_eq!(moved.affected, 2);
    assert_eq!(store.group_services(&g.id).await.unwrap().len(), 2);

    let ungrouped = store.bulk_move_services(&ids[..1], None).await.unwrap();
    assert_eq!(ungrouped.affected, 1);
    assert_eq!(store.get_group(&g.id).await.unwrap().service_count, 1);

    assert!(matches!(
        store.bulk_move_services(&ids, Some("nope")).await,
        Err(StoreError::NotFound { entity: "group", .. })
    ));

    let mut targets = ids.clone();
    targets.push("stale".to_string());
    let deleted = store
        .execute_bulk(BulkOperation::Delete, &targets, None)
        .await
        .unwrap();
    assert_eq!(deleted.requested, 4);
    assert_eq!(deleted.affected, 3);
    assert!(store.list_records(RecordKind::Service).await.unwrap().is_empty());
}
