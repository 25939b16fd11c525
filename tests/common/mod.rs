//! 测试公共模块
//! 提供内存数据库存储和常用的测试数据构造函数

#![allow(dead_code)]

use asset_inventory::{
    config::DatabaseConfig,
    db::Store,
    models::*,
    services::Services,
};
use secrecy::Secret;
use std::path::Path;
use tempfile::TempDir;

/// 创建测试数据库配置（单连接内存库，每个测试独立）
pub fn create_test_db_config() -> DatabaseConfig {
    DatabaseConfig {
        url: Secret::new("sqlite::memory:".to_string()),
        max_connections: 1,
        min_connections: 1,
        acquire_timeout_secs: 5,
        idle_timeout_secs: 300,
        max_lifetime_secs: 1800,
        busy_timeout_secs: 5,
    }
}

/// 创建文件数据库配置（WAL 模式，多连接，用于并发测试）
pub fn create_file_db_config(dir: &Path, max_connections: u32) -> DatabaseConfig {
    DatabaseConfig {
        url: Secret::new(format!("sqlite://{}", dir.join("inventory.db").display())),
        max_connections,
        ..create_test_db_config()
    }
}

/// 初始化文件存储并构建服务；返回的 TempDir 需要在测试结束前保持存活
pub async fn setup_file_services(max_connections: u32) -> (TempDir, Store, Services) {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let store = Store::open(&create_file_db_config(dir.path(), max_connections))
        .await
        .expect("Failed to open file store");
    let services = Services::from_store(&store);
    (dir, store, services)
}

/// 初始化测试存储并构建服务
pub async fn setup_test_services() -> (Store, Services) {
    let store = Store::open(&create_test_db_config())
        .await
        .expect("Failed to open test store");
    let services = Services::from_store(&store);
    (store, services)
}

pub fn asset_input(name: &str, ip: &str) -> CreateAsset {
    CreateAsset {
        kind: AssetType::Host,
        name: name.to_string(),
        ip: ip.parse().expect("valid test ip"),
        port: 22,
    }
}

pub fn asset_update(name: &str, ip: &str) -> UpdateAsset {
    UpdateAsset {
        kind: AssetType::Host,
        name: name.to_string(),
        ip: ip.parse().expect("valid test ip"),
        port: 22,
    }
}

/// 创建测试资产
pub async fn create_test_asset(services: &Services, name: &str, ip: &str) -> Asset {
    services
        .assets
        .create(asset_input(name, ip))
        .await
        .expect("Failed to create test asset")
}

/// 创建测试资产组
pub async fn create_test_group(services: &Services, name: &str) -> AssetGroup {
    services
        .groups
        .create(CreateAssetGroup {
            name: name.to_string(),
            attrs: Vec::new(),
        })
        .await
        .expect("Failed to create test group")
}

pub fn credential_input(asset_id: uuid::Uuid, username: &str) -> CreateCredential {
    CreateCredential {
        asset_id,
        kind: CredentialType::Password,
        username: username.to_string(),
        secret: Secret::new("s".to_string()),
    }
}

/// 创建测试凭据
pub async fn create_test_credential(
    services: &Services,
    asset_id: uuid::Uuid,
    username: &str,
) -> Credential {
    services
        .credentials
        .create(credential_input(asset_id, username))
        .await
        .expect("Failed to create test credential")
}

pub fn session_input(asset_id: uuid::Uuid, credential_id: uuid::Uuid) -> CreateSession {
    CreateSession {
        asset_id,
        credential_id,
        kind: SessionType::Ssh,
        status: "active".to_string(),
    }
}

/// 创建若干资产，名称为 `{prefix}-{i}`，ip 为 10.0.{prefix_len}.{i}
pub async fn create_test_assets(services: &Services, prefix: &str, count: u8) -> Vec<Asset> {
    let mut assets = Vec::with_capacity(count as usize);
    for i in 0..count {
        let ip = format!("10.{}.0.{}", prefix.len(), i + 1);
        assets.push(create_test_asset(services, &format!("{prefix}-{i}"), &ip).await);
    }
    assets
}
