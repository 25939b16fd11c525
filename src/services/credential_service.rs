//! 凭据服务
//!
//! 创建前先通过资产服务解析所属资产，资产不存在时不写入。

use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

use super::AssetService;
use crate::error::AppResult;
use crate::models::{CreateCredential, Credential, ListOptions, Page, UpdateCredential};
use crate::repository::CredentialRepository;

pub struct CredentialService {
    repo: Arc<dyn CredentialRepository>,
    assets: Arc<AssetService>,
}

impl CredentialService {
    pub fn new(repo: Arc<dyn CredentialRepository>, assets: Arc<AssetService>) -> Self {
        Self { repo, assets }
    }

    /// 创建凭据
    pub async fn create(&self, input: CreateCredential) -> AppResult<Credential> {
        input.validate()?;

        let asset = self.assets.get(input.asset_id).await.map_err(|e| {
            tracing::warn!(asset_id = %input.asset_id, error = %e, "Credential asset did not resolve");
            e
        })?;

        let credential = self.repo.create(input).await?;

        tracing::info!(
            credential_id = %credential.id,
            asset_id = %asset.id,
            username = %credential.username,
            "Credential created"
        );
        Ok(credential)
    }

    pub async fn update(&self, id: Uuid, input: UpdateCredential) -> AppResult<Credential> {
        input.validate()?;
        self.repo.update(id, input).await
    }

    /// 删除凭据；仍被会话引用时返回 ConstraintViolation
    pub async fn delete(&self, id: Uuid) -> AppResult<()> {
        self.repo.delete(id).await?;
        tracing::info!(credential_id = %id, "Credential deleted");
        Ok(())
    }

    pub async fn delete_collection(&self, ids: &[Uuid]) -> AppResult<()> {
        self.repo.delete_collection(ids).await?;
        tracing::info!(count = ids.len(), "Credentials deleted");
        Ok(())
    }

    pub async fn get(&self, id: Uuid) -> AppResult<Credential> {
        self.repo.get(id).await
    }

    pub async fn list(&self, options: &ListOptions) -> AppResult<Page<Credential>> {
        self.repo.list(options).await
    }

    pub async fn count(&self) -> AppResult<u64> {
        self.repo.count().await
    }

    pub async fn get_by_asset(&self, asset_id: Uuid, options: &ListOptions) -> AppResult<Page<Credential>> {
        self.repo.get_by_asset(asset_id, options).await
    }
}
