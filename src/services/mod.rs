//! Business logic services layer
//!
//! Each service wraps one repository trait object. [`Services`] wires them up
//! once at process start; there is no global handle.

pub mod asset_group_service;
pub mod asset_service;
pub mod credential_service;
pub mod session_service;

pub use asset_group_service::AssetGroupService;
pub use asset_service::AssetService;
pub use credential_service::CredentialService;
pub use session_service::SessionService;

use std::sync::Arc;

use crate::db::Store;
use crate::error::AppResult;
use crate::repository::{
    AssetGroupRepository, AssetRepository, CredentialRepository, SessionRepository,
    SqliteAssetGroupRepository, SqliteAssetRepository, SqliteCredentialRepository,
    SqliteSessionRepository,
};

/// 所有领域服务的集合
#[derive(Clone)]
pub struct Services {
    pub assets: Arc<AssetService>,
    pub groups: Arc<AssetGroupService>,
    pub credentials: Arc<CredentialService>,
    pub sessions: Arc<SessionService>,
}

/// 各实体的库存数量
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct InventoryStats {
    pub assets: u64,
    pub groups: u64,
    pub credentials: u64,
    pub sessions: u64,
}

impl Services {
    /// 使用任意仓库实现构建服务
    pub fn new(
        assets: Arc<dyn AssetRepository>,
        groups: Arc<dyn AssetGroupRepository>,
        credentials: Arc<dyn CredentialRepository>,
        sessions: Arc<dyn SessionRepository>,
    ) -> Self {
        let asset_service = Arc::new(AssetService::new(assets));
        let credential_service = Arc::new(CredentialService::new(credentials, asset_service.clone()));
        let session_service = Arc::new(SessionService::new(
            sessions,
            asset_service.clone(),
            credential_service.clone(),
        ));

        Self {
            assets: asset_service,
            groups: Arc::new(AssetGroupService::new(groups)),
            credentials: credential_service,
            sessions: session_service,
        }
    }

    /// 基于 SQLite 存储构建服务，所有仓库共享同一个连接池
    pub fn from_store(store: &Store) -> Self {
        let pool = store.pool().clone();
        Self::new(
            Arc::new(SqliteAssetRepository::new(pool.clone())),
            Arc::new(SqliteAssetGroupRepository::new(pool.clone())),
            Arc::new(SqliteCredentialRepository::new(pool.clone())),
            Arc::new(SqliteSessionRepository::new(pool)),
        )
    }

    pub async fn stats(&self) -> AppResult<InventoryStats> {
        Ok(InventoryStats {
            assets: self.assets.count().await?,
            groups: self.groups.count().await?,
            credentials: self.credentials.count().await?,
            sessions: self.sessions.count().await?,
        })
    }
}
