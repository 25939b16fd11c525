//! 资产服务

use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

use crate::error::AppResult;
use crate::models::{Asset, CreateAsset, ListOptions, Page, UpdateAsset};
use crate::repository::AssetRepository;

pub struct AssetService {
    repo: Arc<dyn AssetRepository>,
}

impl AssetService {
    pub fn new(repo: Arc<dyn AssetRepository>) -> Self {
        Self { repo }
    }

    /// 创建资产
    pub async fn create(&self, input: CreateAsset) -> AppResult<Asset> {
        input.validate()?;
        let asset = self.repo.create(input).await?;

        tracing::info!(asset_id = %asset.id, name = %asset.name, ip = %asset.ip, "Asset created");
        Ok(asset)
    }

    pub async fn update(&self, id: Uuid, input: UpdateAsset) -> AppResult<Asset> {
        input.validate()?;
        self.repo.update(id, input).await
    }

    /// 删除资产；仍有凭据或会话时返回 ConstraintViolation
    pub async fn delete(&self, id: Uuid) -> AppResult<()> {
        self.repo.delete(id).await?;
        tracing::info!(asset_id = %id, "Asset deleted");
        Ok(())
    }

    pub async fn delete_collection(&self, ids: &[Uuid]) -> AppResult<()> {
        self.repo.delete_collection(ids).await?;
        tracing::info!(count = ids.len(), "Assets deleted");
        Ok(())
    }

    pub async fn get(&self, id: Uuid) -> AppResult<Asset> {
        self.repo.get(id).await
    }

    pub async fn list(&self, options: &ListOptions) -> AppResult<Page<Asset>> {
        self.repo.list(options).await
    }

    pub async fn count(&self) -> AppResult<u64> {
        self.repo.count().await
    }

    /// 查询资产组内的资产
    pub async fn get_by_group(&self, group_id: Uuid, options: &ListOptions) -> AppResult<Page<Asset>> {
        self.repo.get_by_group(group_id, options).await
    }

    /// 查询未加入任何资产组的资产
    pub async fn get_without_group(&self, options: &ListOptions) -> AppResult<Page<Asset>> {
        self.repo.get_without_group(options).await
    }
}
