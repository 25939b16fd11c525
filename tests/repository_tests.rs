//! 仓库层集成测试
//!
//! 针对内存 SQLite 存储验证约束、分页与关系查询

use asset_inventory::error::AppError;
use asset_inventory::models::*;
use asset_inventory::repository::*;
use secrecy::{ExposeSecret, Secret};
use std::collections::HashSet;
use std::time::Duration;
use uuid::Uuid;

mod common;
use common::{asset_input, asset_update, create_file_db_config, create_test_db_config};

#[derive(Clone)]
struct Repos {
    store: asset_inventory::db::Store,
    assets: SqliteAssetRepository,
    groups: SqliteAssetGroupRepository,
    credentials: SqliteCredentialRepository,
    sessions: SqliteSessionRepository,
}

async fn setup_repos() -> Repos {
    open_repos(&create_test_db_config()).await
}

async fn open_repos(config: &asset_inventory::config::DatabaseConfig) -> Repos {
    let store = asset_inventory::db::Store::open(config)
        .await
        .expect("Failed to open test store");
    let pool = store.pool().clone();
    Repos {
        assets: SqliteAssetRepository::new(pool.clone()),
        groups: SqliteAssetGroupRepository::new(pool.clone()),
        credentials: SqliteCredentialRepository::new(pool.clone()),
        sessions: SqliteSessionRepository::new(pool),
        store,
    }
}

fn group_input(name: &str) -> CreateAssetGroup {
    CreateAssetGroup {
        name: name.to_string(),
        attrs: Vec::new(),
    }
}

// ==================== Asset ====================

#[tokio::test]
async fn test_asset_repository_create_and_get() {
    let repos = setup_repos().await;

    let created = repos.assets.create(asset_input("n1", "10.0.0.1")).await.unwrap();
    assert_eq!(created.name, "n1");
    assert_eq!(created.port, 22);
    assert_eq!(created.kind, AssetType::Host);
    assert!(created.group_ids.is_empty());
    assert_eq!(created.created_at, created.updated_at);

    let fetched = repos.assets.get(created.id).await.unwrap();
    assert_eq!(fetched, created);
}

#[tokio::test]
async fn test_asset_repository_ipv6_stored_canonically() {
    let repos = setup_repos().await;

    let created = repos
        .assets
        .create(asset_input("v6", "2001:0db8:0000:0000:0000:0000:0000:0001"))
        .await
        .unwrap();
    assert_eq!(created.ip.to_string(), "2001:db8::1");

    // 同一地址的另一种写法也视为重复
    let err = repos
        .assets
        .create(asset_input("v6-dup", "2001:db8::1"))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::ConstraintViolation(_)));
}

#[tokio::test]
async fn test_asset_repository_unique_name_and_ip() {
    let repos = setup_repos().await;

    repos.assets.create(asset_input("n1", "10.0.0.1")).await.unwrap();

    let same_ip = repos.assets.create(asset_input("n2", "10.0.0.1")).await;
    assert!(matches!(same_ip, Err(AppError::ConstraintViolation(_))));

    let same_name = repos.assets.create(asset_input("n1", "10.0.0.2")).await;
    assert!(matches!(same_name, Err(AppError::ConstraintViolation(_))));

    assert_eq!(repos.assets.count().await.unwrap(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_asset_repository_concurrent_duplicate_create() {
    let dir = tempfile::tempdir().unwrap();
    let repos = open_repos(&create_file_db_config(dir.path(), 8)).await;

    let mut handles = Vec::new();
    for i in 0..16 {
        let repos = repos.clone();
        handles.push(tokio::spawn(async move {
            repos
                .assets
                .create(asset_input(&format!("dup-{i}"), "10.0.0.9"))
                .await
        }));
    }

    let mut successes = 0;
    let mut violations = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => successes += 1,
            Err(AppError::ConstraintViolation(_)) => violations += 1,
            Err(other) => panic!("unexpected error: {other:?}"),
        }
    }
    assert_eq!(successes, 1);
    assert_eq!(violations, 15);
    assert_eq!(repos.assets.count().await.unwrap(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_read_then_write_transactions() {
    let dir = tempfile::tempdir().unwrap();
    let repos = open_repos(&create_file_db_config(dir.path(), 8)).await;

    let group = repos.groups.create(group_input("shared")).await.unwrap();
    let mut ids = Vec::new();
    for i in 0..100 {
        let asset = repos
            .assets
            .create(asset_input(&format!("host-{i}"), &format!("10.2.{}.{}", i / 200, i % 200 + 1)))
            .await
            .unwrap();
        ids.push(asset.id);
    }

    // 删除、加入成员、资产组写入同时进行，全部都应成功
    let mut handles = Vec::new();
    for (i, id) in ids.iter().copied().enumerate() {
        let repos = repos.clone();
        let group_id = group.id;
        handles.push(tokio::spawn(async move {
            match i % 4 {
                0 => repos.assets.delete(id).await,
                1 => repos.assets.delete_collection(&[id]).await,
                2 => repos.groups.add_members(group_id, &[id]).await,
                _ => {
                    repos.groups.add_members(group_id, &[id]).await?;
                    repos.groups.remove_members(group_id, &[id]).await
                }
            }
        }));
    }
    for i in 0..20 {
        let repos = repos.clone();
        handles.push(tokio::spawn(async move {
            let created = repos.groups.create(group_input(&format!("g-{i}"))).await?;
            repos
                .groups
                .update(
                    created.id,
                    UpdateAssetGroup {
                        name: format!("g-{i}-renamed"),
                        attrs: vec![AttributeInput::new("idx", i.to_string(), "label")],
                    },
                )
                .await
                .map(|_| ())
        }));
    }

    for handle in handles {
        if let Err(e) = handle.await.unwrap() {
            panic!("concurrent write failed: {e:?}");
        }
    }

    assert_eq!(repos.assets.count().await.unwrap(), 50);
    assert_eq!(repos.groups.count().await.unwrap(), 21);
    let members = repos
        .assets
        .get_by_group(group.id, &ListOptions::first(100))
        .await
        .unwrap();
    assert_eq!(members.total, 25);

    repos.store.close().await;
}

#[tokio::test]
async fn test_asset_repository_check_constraint_on_port() {
    let repos = setup_repos().await;

    // 绕过服务层校验，存储层仍然拒绝端口 0
    let mut input = asset_input("zero-port", "10.0.0.3");
    input.port = 0;
    let err = repos.assets.create(input).await.unwrap_err();
    assert!(matches!(err, AppError::ConstraintViolation(_)));
}

#[tokio::test]
async fn test_asset_repository_update_refreshes_updated_at() {
    let repos = setup_repos().await;
    let created = repos.assets.create(asset_input("n1", "10.0.0.1")).await.unwrap();

    tokio::time::sleep(Duration::from_millis(10)).await;

    let updated = repos
        .assets
        .update(
            created.id,
            UpdateAsset {
                kind: AssetType::Db,
                name: "n1-renamed".to_string(),
                ip: "10.0.0.2".parse().unwrap(),
                port: 3306,
            },
        )
        .await
        .unwrap();

    assert_eq!(updated.id, created.id);
    assert_eq!(updated.kind, AssetType::Db);
    assert_eq!(updated.name, "n1-renamed");
    assert_eq!(updated.port, 3306);
    assert_eq!(updated.created_at, created.created_at);
    assert!(updated.updated_at > created.updated_at);
}

#[tokio::test]
async fn test_asset_repository_update_missing_is_not_found() {
    let repos = setup_repos().await;

    let err = repos
        .assets
        .update(Uuid::new_v4(), asset_update("ghost", "10.0.0.1"))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound { entity: "asset", .. }));
}

#[tokio::test]
async fn test_asset_repository_update_collision() {
    let repos = setup_repos().await;
    repos.assets.create(asset_input("n1", "10.0.0.1")).await.unwrap();
    let second = repos.assets.create(asset_input("n2", "10.0.0.2")).await.unwrap();

    let err = repos
        .assets
        .update(second.id, asset_update("n1", "10.0.0.2"))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::ConstraintViolation(_)));
}

#[tokio::test]
async fn test_asset_repository_repeated_delete_is_error() {
    let repos = setup_repos().await;
    let asset = repos.assets.create(asset_input("n1", "10.0.0.1")).await.unwrap();

    repos.assets.delete(asset.id).await.unwrap();

    let err = repos.assets.delete(asset.id).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound { .. }));

    let err = repos.assets.get(asset.id).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound { .. }));
}

#[tokio::test]
async fn test_asset_repository_delete_collection_all_or_nothing() {
    let repos = setup_repos().await;
    let a = repos.assets.create(asset_input("a", "10.0.0.1")).await.unwrap();
    let b = repos.assets.create(asset_input("b", "10.0.0.2")).await.unwrap();

    let err = repos
        .assets
        .delete_collection(&[a.id, Uuid::new_v4(), b.id])
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound { .. }));
    assert_eq!(repos.assets.count().await.unwrap(), 2);

    // 重复 id 只删除一次
    repos.assets.delete_collection(&[a.id, b.id, a.id]).await.unwrap();
    assert_eq!(repos.assets.count().await.unwrap(), 0);

    repos.assets.delete_collection(&[]).await.unwrap();
}

#[tokio::test]
async fn test_asset_repository_pagination_partitions_set() {
    let repos = setup_repos().await;
    let mut expected = Vec::new();
    for i in 0..7 {
        let asset = repos
            .assets
            .create(asset_input(&format!("host-{i}"), &format!("10.1.0.{}", i + 1)))
            .await
            .unwrap();
        expected.push(asset.id);
    }

    let mut seen = Vec::new();
    let mut options = ListOptions::first(3);
    loop {
        let page = repos.assets.list(&options).await.unwrap();
        assert_eq!(page.total, 7);
        if page.items.is_empty() {
            break;
        }
        seen.extend(page.items.iter().map(|a| a.id));
        options = options.next_page();
    }

    // 按创建顺序，每个资产恰好出现一次
    assert_eq!(seen, expected);

    // 同样的参数重复查询得到同样的切片
    let first = repos.assets.list(&ListOptions::new(3, 3)).await.unwrap();
    let again = repos.assets.list(&ListOptions::new(3, 3)).await.unwrap();
    assert_eq!(first.items, again.items);
}

#[tokio::test]
async fn test_asset_repository_zero_limit_rejected() {
    let repos = setup_repos().await;

    let err = repos.assets.list(&ListOptions::first(0)).await.unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));
}

// ==================== Group membership ====================

#[tokio::test]
async fn test_group_membership_is_symmetric() {
    let repos = setup_repos().await;
    let group = repos.groups.create(group_input("prod")).await.unwrap();
    let asset = repos.assets.create(asset_input("n1", "10.0.0.1")).await.unwrap();

    repos.groups.add_members(group.id, &[asset.id]).await.unwrap();

    let members = repos
        .assets
        .get_by_group(group.id, &ListOptions::first(100))
        .await
        .unwrap();
    assert_eq!(members.total, 1);
    assert_eq!(members.items[0].id, asset.id);
    assert_eq!(members.items[0].group_ids, vec![group.id]);

    let asset = repos.assets.get(asset.id).await.unwrap();
    assert_eq!(asset.group_ids, vec![group.id]);
}

#[tokio::test]
async fn test_group_add_members_is_idempotent() {
    let repos = setup_repos().await;
    let group = repos.groups.create(group_input("prod")).await.unwrap();
    let asset = repos.assets.create(asset_input("n1", "10.0.0.1")).await.unwrap();

    repos.groups.add_members(group.id, &[asset.id]).await.unwrap();
    repos.groups.add_members(group.id, &[asset.id, asset.id]).await.unwrap();

    let members = repos
        .assets
        .get_by_group(group.id, &ListOptions::first(100))
        .await
        .unwrap();
    assert_eq!(members.total, 1);
    assert_eq!(repos.assets.get(asset.id).await.unwrap().group_ids.len(), 1);
}

#[tokio::test]
async fn test_group_add_members_missing_ids() {
    let repos = setup_repos().await;
    let group = repos.groups.create(group_input("prod")).await.unwrap();
    let asset = repos.assets.create(asset_input("n1", "10.0.0.1")).await.unwrap();

    let err = repos
        .groups
        .add_members(Uuid::new_v4(), &[asset.id])
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound { entity: "asset group", .. }));

    // 任一资产不存在时整体失败，不写入已存在的资产
    let err = repos
        .groups
        .add_members(group.id, &[asset.id, Uuid::new_v4()])
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound { entity: "asset", .. }));
    assert!(repos.assets.get(asset.id).await.unwrap().group_ids.is_empty());
}

#[tokio::test]
async fn test_group_add_members_refreshes_updated_at() {
    let repos = setup_repos().await;
    let group = repos.groups.create(group_input("prod")).await.unwrap();
    let asset = repos.assets.create(asset_input("n1", "10.0.0.1")).await.unwrap();

    tokio::time::sleep(Duration::from_millis(10)).await;
    repos.groups.add_members(group.id, &[asset.id]).await.unwrap();

    let reloaded = repos.groups.get(group.id).await.unwrap();
    assert!(reloaded.updated_at > group.updated_at);
}

#[tokio::test]
async fn test_without_group_and_by_group_are_disjoint() {
    let repos = setup_repos().await;
    let g1 = repos.groups.create(group_input("g1")).await.unwrap();
    let g2 = repos.groups.create(group_input("g2")).await.unwrap();
    let grouped = repos.assets.create(asset_input("grouped", "10.0.0.1")).await.unwrap();
    let both = repos.assets.create(asset_input("both", "10.0.0.2")).await.unwrap();
    let lonely = repos.assets.create(asset_input("lonely", "10.0.0.3")).await.unwrap();

    repos.groups.add_members(g1.id, &[grouped.id, both.id]).await.unwrap();
    repos.groups.add_members(g2.id, &[both.id]).await.unwrap();

    let without = repos
        .assets
        .get_without_group(&ListOptions::first(100))
        .await
        .unwrap();
    assert_eq!(without.total, 1);
    assert_eq!(without.items[0].id, lonely.id);

    for group in [&g1, &g2] {
        let page = repos
            .assets
            .get_by_group(group.id, &ListOptions::first(100))
            .await
            .unwrap();
        assert!(page.items.iter().all(|a| a.id != lonely.id));
    }

    let in_g1 = repos
        .assets
        .get_by_group(g1.id, &ListOptions::first(1))
        .await
        .unwrap();
    // total 与切片大小无关
    assert_eq!(in_g1.total, 2);
    assert_eq!(in_g1.items.len(), 1);

    let both = repos.assets.get(both.id).await.unwrap();
    assert_eq!(both.group_ids, vec![g1.id, g2.id]);
}

#[tokio::test]
async fn test_get_by_group_missing_group() {
    let repos = setup_repos().await;

    let err = repos
        .assets
        .get_by_group(Uuid::new_v4(), &ListOptions::first(10))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound { entity: "asset group", .. }));
}

#[tokio::test]
async fn test_group_remove_members() {
    let repos = setup_repos().await;
    let group = repos.groups.create(group_input("prod")).await.unwrap();
    let a = repos.assets.create(asset_input("a", "10.0.0.1")).await.unwrap();
    let b = repos.assets.create(asset_input("b", "10.0.0.2")).await.unwrap();
    repos.groups.add_members(group.id, &[a.id, b.id]).await.unwrap();

    repos
        .groups
        .remove_members(group.id, &[a.id, Uuid::new_v4()])
        .await
        .unwrap();

    let page = repos
        .assets
        .get_by_group(group.id, &ListOptions::first(10))
        .await
        .unwrap();
    assert_eq!(page.total, 1);
    assert_eq!(page.items[0].id, b.id);

    let without = repos
        .assets
        .get_without_group(&ListOptions::first(10))
        .await
        .unwrap();
    assert_eq!(without.items.iter().map(|x| x.id).collect::<Vec<_>>(), vec![a.id]);
}

#[tokio::test]
async fn test_group_delete_cascades_membership_not_assets() {
    let repos = setup_repos().await;
    let group = repos
        .groups
        .create(CreateAssetGroup {
            name: "prod".to_string(),
            attrs: vec![AttributeInput::new("env", "production", "label")],
        })
        .await
        .unwrap();
    let asset = repos.assets.create(asset_input("n1", "10.0.0.1")).await.unwrap();
    repos.groups.add_members(group.id, &[asset.id]).await.unwrap();

    repos.groups.delete(group.id).await.unwrap();

    let asset = repos.assets.get(asset.id).await.unwrap();
    assert!(asset.group_ids.is_empty());

    let orphans: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM asset_group_attributes")
        .fetch_one(repos.store.pool())
        .await
        .unwrap();
    assert_eq!(orphans, 0);
}

#[tokio::test]
async fn test_deleting_asset_removes_its_memberships() {
    let repos = setup_repos().await;
    let group = repos.groups.create(group_input("prod")).await.unwrap();
    let asset = repos.assets.create(asset_input("n1", "10.0.0.1")).await.unwrap();
    repos.groups.add_members(group.id, &[asset.id]).await.unwrap();

    repos.assets.delete(asset.id).await.unwrap();

    let page = repos
        .assets
        .get_by_group(group.id, &ListOptions::first(10))
        .await
        .unwrap();
    assert_eq!(page.total, 0);
}

// ==================== Group attributes ====================

#[tokio::test]
async fn test_group_attributes_replaced_by_key() {
    let repos = setup_repos().await;
    let group = repos
        .groups
        .create(CreateAssetGroup {
            name: "prod".to_string(),
            attrs: vec![
                AttributeInput::new("env", "production", "label"),
                AttributeInput::new("owner", "ops", "team"),
            ],
        })
        .await
        .unwrap();
    assert_eq!(group.attrs.len(), 2);
    let env_id = group.attr("env").unwrap().id;

    let updated = repos
        .groups
        .update(
            group.id,
            UpdateAssetGroup {
                name: "production".to_string(),
                attrs: vec![
                    AttributeInput::new("env", "prod", "label"),
                    AttributeInput::new("region", "eu", "location"),
                ],
            },
        )
        .await
        .unwrap();

    assert_eq!(updated.name, "production");
    let keys: HashSet<_> = updated.attrs.iter().map(|a| a.key.as_str()).collect();
    assert_eq!(keys, HashSet::from(["env", "region"]));

    let env = updated.attr("env").unwrap();
    assert_eq!(env.id, env_id);
    assert_eq!(env.value, "prod");
    assert!(updated.attr("owner").is_none());

    let cleared = repos
        .groups
        .update(group.id, UpdateAssetGroup { name: "production".to_string(), attrs: Vec::new() })
        .await
        .unwrap();
    assert!(cleared.attrs.is_empty());
}

#[tokio::test]
async fn test_group_unique_name() {
    let repos = setup_repos().await;
    repos.groups.create(group_input("prod")).await.unwrap();

    let err = repos.groups.create(group_input("prod")).await.unwrap_err();
    assert!(matches!(err, AppError::ConstraintViolation(_)));

    let page = repos.groups.list(&ListOptions::first(10)).await.unwrap();
    assert_eq!(page.total, 1);
}

// ==================== Credential / Session ====================

#[tokio::test]
async fn test_credential_repository_rejects_dangling_asset() {
    let repos = setup_repos().await;

    let err = repos
        .credentials
        .create(common::credential_input(Uuid::new_v4(), "root"))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::ConstraintViolation(_)));
}

#[tokio::test]
async fn test_credential_repository_update_keeps_asset() {
    let repos = setup_repos().await;
    let asset = repos.assets.create(asset_input("n1", "10.0.0.1")).await.unwrap();
    let cred = repos
        .credentials
        .create(common::credential_input(asset.id, "root"))
        .await
        .unwrap();

    let updated = repos
        .credentials
        .update(
            cred.id,
            UpdateCredential {
                kind: CredentialType::Key,
                username: "deploy".to_string(),
                secret: Secret::new("-----BEGIN KEY-----".to_string()),
            },
        )
        .await
        .unwrap();

    assert_eq!(updated.asset_id, asset.id);
    assert_eq!(updated.kind, CredentialType::Key);
    assert_eq!(updated.username, "deploy");
    assert_eq!(updated.secret.expose_secret(), "-----BEGIN KEY-----");
}

#[tokio::test]
async fn test_asset_delete_rejected_with_dependents() {
    let repos = setup_repos().await;
    let asset = repos.assets.create(asset_input("n1", "10.0.0.1")).await.unwrap();
    let cred = repos
        .credentials
        .create(common::credential_input(asset.id, "root"))
        .await
        .unwrap();

    let err = repos.assets.delete(asset.id).await.unwrap_err();
    assert!(matches!(err, AppError::ConstraintViolation(_)));

    repos.credentials.delete(cred.id).await.unwrap();
    repos.assets.delete(asset.id).await.unwrap();
}

#[tokio::test]
async fn test_credential_delete_rejected_with_sessions() {
    let repos = setup_repos().await;
    let asset = repos.assets.create(asset_input("n1", "10.0.0.1")).await.unwrap();
    let cred = repos
        .credentials
        .create(common::credential_input(asset.id, "root"))
        .await
        .unwrap();
    let session = repos
        .sessions
        .create(common::session_input(asset.id, cred.id))
        .await
        .unwrap();

    let err = repos.credentials.delete_collection(&[cred.id]).await.unwrap_err();
    assert!(matches!(err, AppError::ConstraintViolation(_)));

    repos.sessions.delete(session.id).await.unwrap();
    repos.credentials.delete_collection(&[cred.id]).await.unwrap();
    assert_eq!(repos.credentials.count().await.unwrap(), 0);
}

#[tokio::test]
async fn test_session_repository_stop() {
    let repos = setup_repos().await;
    let asset = repos.assets.create(asset_input("n1", "10.0.0.1")).await.unwrap();
    let cred = repos
        .credentials
        .create(common::credential_input(asset.id, "root"))
        .await
        .unwrap();
    let session = repos
        .sessions
        .create(common::session_input(asset.id, cred.id))
        .await
        .unwrap();
    assert!(session.stopped_at.is_none());

    let stopped_at = chrono::Utc::now();
    let updated = repos
        .sessions
        .update(
            session.id,
            UpdateSession {
                kind: SessionType::Ssh,
                status: "inactive".to_string(),
                stopped_at: Some(stopped_at),
            },
        )
        .await
        .unwrap();

    assert!(updated.is_stopped());
    assert_eq!(updated.status, "inactive");
    assert_eq!(updated.asset_id, asset.id);
    assert_eq!(updated.credential_id, cred.id);
    assert!(updated.updated_at >= session.updated_at);
}

#[tokio::test]
async fn test_get_by_asset_filters_and_counts() {
    let repos = setup_repos().await;
    let a1 = repos.assets.create(asset_input("a1", "10.0.0.1")).await.unwrap();
    let a2 = repos.assets.create(asset_input("a2", "10.0.0.2")).await.unwrap();

    for name in ["u1", "u2", "u3"] {
        repos
            .credentials
            .create(common::credential_input(a1.id, name))
            .await
            .unwrap();
    }
    repos
        .credentials
        .create(common::credential_input(a2.id, "other"))
        .await
        .unwrap();

    let page = repos
        .credentials
        .get_by_asset(a1.id, &ListOptions::new(1, 1))
        .await
        .unwrap();
    assert_eq!(page.total, 3);
    assert_eq!(page.items.len(), 1);
    assert_eq!(page.items[0].username, "u2");

    let all = repos.credentials.list(&ListOptions::first(10)).await.unwrap();
    assert_eq!(all.total, 4);

    let err = repos
        .sessions
        .get_by_asset(Uuid::new_v4(), &ListOptions::first(10))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound { entity: "asset", .. }));
}
