//! 会话服务
//!
//! 创建时依次解析资产与凭据，任一不存在立即失败；凭据必须属于同一资产。

use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

use super::{AssetService, CredentialService};
use crate::error::{AppError, AppResult};
use crate::models::{CreateSession, ListOptions, Page, Session, UpdateSession};
use crate::repository::SessionRepository;

pub struct SessionService {
    repo: Arc<dyn SessionRepository>,
    assets: Arc<AssetService>,
    credentials: Arc<CredentialService>,
}

impl SessionService {
    pub fn new(
        repo: Arc<dyn SessionRepository>,
        assets: Arc<AssetService>,
        credentials: Arc<CredentialService>,
    ) -> Self {
        Self {
            repo,
            assets,
            credentials,
        }
    }

    /// 创建会话
    pub async fn create(&self, input: CreateSession) -> AppResult<Session> {
        input.validate()?;

        let asset = self.assets.get(input.asset_id).await.map_err(|e| {
            tracing::warn!(asset_id = %input.asset_id, error = %e, "Session asset did not resolve");
            e
        })?;
        let credential = self.credentials.get(input.credential_id).await.map_err(|e| {
            tracing::warn!(
                credential_id = %input.credential_id,
                error = %e,
                "Session credential did not resolve"
            );
            e
        })?;

        if credential.asset_id != asset.id {
            tracing::warn!(
                asset_id = %asset.id,
                credential_id = %credential.id,
                owner_id = %credential.asset_id,
                "Session credential belongs to another asset"
            );
            return Err(AppError::ConstraintViolation(format!(
                "credential {} does not belong to asset {}",
                credential.id, asset.id
            )));
        }

        let session = self.repo.create(input).await?;

        tracing::info!(
            session_id = %session.id,
            asset_id = %asset.id,
            credential_id = %credential.id,
            kind = %session.kind,
            "Session created"
        );
        Ok(session)
    }

    pub async fn update(&self, id: Uuid, input: UpdateSession) -> AppResult<Session> {
        input.validate()?;
        self.repo.update(id, input).await
    }

    pub async fn delete(&self, id: Uuid) -> AppResult<()> {
        self.repo.delete(id).await?;
        tracing::info!(session_id = %id, "Session deleted");
        Ok(())
    }

    pub async fn delete_collection(&self, ids: &[Uuid]) -> AppResult<()> {
        self.repo.delete_collection(ids).await?;
        tracing::info!(count = ids.len(), "Sessions deleted");
        Ok(())
    }

    pub async fn get(&self, id: Uuid) -> AppResult<Session> {
        self.repo.get(id).await
    }

    pub async fn list(&self, options: &ListOptions) -> AppResult<Page<Session>> {
        self.repo.list(options).await
    }

    pub async fn count(&self) -> AppResult<u64> {
        self.repo.count().await
    }

    pub async fn get_by_asset(&self, asset_id: Uuid, options: &ListOptions) -> AppResult<Page<Session>> {
        self.repo.get_by_asset(asset_id, options).await
    }
}
