//! Repository layer
//!
//! Storage-agnostic traits, one per entity, plus the SQLite implementations.
//! Services only ever see the traits, so the storage engine can be swapped.

pub mod asset_group_repo;
pub mod asset_repo;
pub mod credential_repo;
pub mod session_repo;

pub use asset_group_repo::SqliteAssetGroupRepository;
pub use asset_repo::SqliteAssetRepository;
pub use credential_repo::SqliteCredentialRepository;
pub use session_repo::SqliteSessionRepository;

use async_trait::async_trait;
use sqlx::{Sqlite, SqlitePool, Transaction};
use uuid::Uuid;

use crate::error::AppResult;
use crate::models::{
    Asset, AssetGroup, CreateAsset, CreateAssetGroup, CreateCredential, CreateSession,
    Credential, ListOptions, Page, Session, UpdateAsset, UpdateAssetGroup, UpdateCredential,
    UpdateSession,
};

#[async_trait]
pub trait AssetRepository: Send + Sync {
    async fn create(&self, input: CreateAsset) -> AppResult<Asset>;
    async fn update(&self, id: Uuid, input: UpdateAsset) -> AppResult<Asset>;
    /// Fails with `ConstraintViolation` while credentials or sessions reference the asset.
    async fn delete(&self, id: Uuid) -> AppResult<()>;
    async fn delete_collection(&self, ids: &[Uuid]) -> AppResult<()>;
    async fn get(&self, id: Uuid) -> AppResult<Asset>;
    async fn list(&self, options: &ListOptions) -> AppResult<Page<Asset>>;
    async fn count(&self) -> AppResult<u64>;
    async fn get_by_group(&self, group_id: Uuid, options: &ListOptions) -> AppResult<Page<Asset>>;
    async fn get_without_group(&self, options: &ListOptions) -> AppResult<Page<Asset>>;
}

#[async_trait]
pub trait AssetGroupRepository: Send + Sync {
    async fn create(&self, input: CreateAssetGroup) -> AppResult<AssetGroup>;
    async fn update(&self, id: Uuid, input: UpdateAssetGroup) -> AppResult<AssetGroup>;
    async fn delete(&self, id: Uuid) -> AppResult<()>;
    async fn delete_collection(&self, ids: &[Uuid]) -> AppResult<()>;
    async fn get(&self, id: Uuid) -> AppResult<AssetGroup>;
    async fn list(&self, options: &ListOptions) -> AppResult<Page<AssetGroup>>;
    async fn count(&self) -> AppResult<u64>;
    /// Idempotent per (group, asset) pair.
    async fn add_members(&self, group_id: Uuid, asset_ids: &[Uuid]) -> AppResult<()>;
    async fn remove_members(&self, group_id: Uuid, asset_ids: &[Uuid]) -> AppResult<()>;
}

#[async_trait]
pub trait CredentialRepository: Send + Sync {
    async fn create(&self, input: CreateCredential) -> AppResult<Credential>;
    async fn update(&self, id: Uuid, input: UpdateCredential) -> AppResult<Credential>;
    async fn delete(&self, id: Uuid) -> AppResult<()>;
    async fn delete_collection(&self, ids: &[Uuid]) -> AppResult<()>;
    async fn get(&self, id: Uuid) -> AppResult<Credential>;
    async fn list(&self, options: &ListOptions) -> AppResult<Page<Credential>>;
    async fn count(&self) -> AppResult<u64>;
    async fn get_by_asset(&self, asset_id: Uuid, options: &ListOptions)
        -> AppResult<Page<Credential>>;
}

#[async_trait]
pub trait SessionRepository: Send + Sync {
    async fn create(&self, input: CreateSession) -> AppResult<Session>;
    async fn update(&self, id: Uuid, input: UpdateSession) -> AppResult<Session>;
    async fn delete(&self, id: Uuid) -> AppResult<()>;
    async fn delete_collection(&self, ids: &[Uuid]) -> AppResult<()>;
    async fn get(&self, id: Uuid) -> AppResult<Session>;
    async fn list(&self, options: &ListOptions) -> AppResult<Page<Session>>;
    async fn count(&self) -> AppResult<u64>;
    async fn get_by_asset(&self, asset_id: Uuid, options: &ListOptions) -> AppResult<Page<Session>>;
}

/// 去重并保持原有顺序，批量操作对重复 id 只处理一次
pub(crate) fn dedup_ids(ids: &[Uuid]) -> Vec<Uuid> {
    let mut seen = std::collections::HashSet::with_capacity(ids.len());
    ids.iter().copied().filter(|id| seen.insert(*id)).collect()
}

pub(crate) const ASSET_EXISTS: &str = "SELECT COUNT(*) FROM assets WHERE id = ?";
pub(crate) const GROUP_EXISTS: &str = "SELECT COUNT(*) FROM asset_groups WHERE id = ?";

/// 按给定的计数语句检查 id 是否存在
pub(crate) async fn exists<'e, E>(executor: E, count_sql: &'static str, id: Uuid) -> AppResult<bool>
where
    E: sqlx::Executor<'e, Database = sqlx::Sqlite>,
{
    let found: i64 = sqlx::query_scalar(count_sql).bind(id).fetch_one(executor).await?;
    Ok(found > 0)
}

/// 开启写事务
///
/// 使用 `BEGIN IMMEDIATE` 在事务开始时取得写锁。先读后写的延迟事务在 WAL
/// 模式下升级写锁失败会立即返回 SQLITE_BUSY，不经过 busy_timeout 等待。
/// 只读快照仍使用普通的 `begin()`。
pub(crate) async fn begin_write(pool: &SqlitePool) -> AppResult<Transaction<'static, Sqlite>> {
    Ok(pool.begin_with("BEGIN IMMEDIATE").await?)
}

/// 将数据库中的枚举文本解析回领域类型
pub(crate) fn parse_column<T>(value: &str) -> AppResult<T>
where
    T: std::str::FromStr<Err = String>,
{
    value.parse().map_err(crate::error::AppError::Internal)
}
