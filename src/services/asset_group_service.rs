//! 资产组服务

use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

use crate::error::AppResult;
use crate::models::{AssetGroup, CreateAssetGroup, ListOptions, Page, UpdateAssetGroup};
use crate::repository::AssetGroupRepository;

pub struct AssetGroupService {
    repo: Arc<dyn AssetGroupRepository>,
}

impl AssetGroupService {
    pub fn new(repo: Arc<dyn AssetGroupRepository>) -> Self {
        Self { repo }
    }

    pub async fn create(&self, input: CreateAssetGroup) -> AppResult<AssetGroup> {
        input.validate()?;
        let group = self.repo.create(input).await?;

        tracing::info!(group_id = %group.id, name = %group.name, "Asset group created");
        Ok(group)
    }

    pub async fn update(&self, id: Uuid, input: UpdateAssetGroup) -> AppResult<AssetGroup> {
        input.validate()?;
        self.repo.update(id, input).await
    }

    pub async fn delete(&self, id: Uuid) -> AppResult<()> {
        self.repo.delete(id).await?;
        tracing::info!(group_id = %id, "Asset group deleted");
        Ok(())
    }

    pub async fn delete_collection(&self, ids: &[Uuid]) -> AppResult<()> {
        self.repo.delete_collection(ids).await?;
        tracing::info!(count = ids.len(), "Asset groups deleted");
        Ok(())
    }

    pub async fn get(&self, id: Uuid) -> AppResult<AssetGroup> {
        self.repo.get(id).await
    }

    pub async fn list(&self, options: &ListOptions) -> AppResult<Page<AssetGroup>> {
        self.repo.list(options).await
    }

    pub async fn count(&self) -> AppResult<u64> {
        self.repo.count().await
    }

    /// 添加资产组成员；重复添加不报错
    pub async fn add_members(&self, group_id: Uuid, asset_ids: &[Uuid]) -> AppResult<()> {
        self.repo.add_members(group_id, asset_ids).await
    }

    pub async fn remove_members(&self, group_id: Uuid, asset_ids: &[Uuid]) -> AppResult<()> {
        self.repo.remove_members(group_id, asset_ids).await
    }
}
