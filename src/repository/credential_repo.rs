//! Credential repository (凭据数据访问)

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, Secret};
use sqlx::{SqliteConnection, SqlitePool};
use uuid::Uuid;

use super::{begin_write, dedup_ids, exists, parse_column, CredentialRepository, ASSET_EXISTS};
use crate::error::{AppError, AppResult};
use crate::models::{CreateCredential, Credential, ListOptions, Page, UpdateCredential};

const SELECT_CREDENTIALS: &str =
    "SELECT id, asset_id, type, username, secret, created_at, updated_at FROM credentials";

#[derive(sqlx::FromRow)]
struct CredentialRow {
    id: Uuid,
    asset_id: Uuid,
    #[sqlx(rename = "type")]
    kind: String,
    username: String,
    secret: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<CredentialRow> for Credential {
    type Error = AppError;

    fn try_from(row: CredentialRow) -> Result<Self, Self::Error> {
        Ok(Credential {
            id: row.id,
            asset_id: row.asset_id,
            kind: parse_column(&row.kind)?,
            username: row.username,
            secret: Secret::new(row.secret),
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

fn into_credentials(rows: Vec<CredentialRow>) -> AppResult<Vec<Credential>> {
    rows.into_iter().map(Credential::try_from).collect()
}

/// SQLite 凭据仓库
#[derive(Clone)]
pub struct SqliteCredentialRepository {
    db: SqlitePool,
}

impl SqliteCredentialRepository {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }
}

/// 在事务内删除单个凭据；仍被会话引用时拒绝删除
async fn delete_credential(conn: &mut SqliteConnection, id: Uuid) -> AppResult<()> {
    let sessions: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM sessions WHERE credential_id = ?")
        .bind(id)
        .fetch_one(&mut *conn)
        .await?;

    if sessions > 0 {
        return Err(AppError::ConstraintViolation(format!(
            "credential {id} is still referenced by {sessions} session(s)"
        )));
    }

    let result = sqlx::query("DELETE FROM credentials WHERE id = ?")
        .bind(id)
        .execute(&mut *conn)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::not_found("credential", id));
    }
    Ok(())
}

#[async_trait]
impl CredentialRepository for SqliteCredentialRepository {
    /// 创建凭据；资产不存在时由外键约束拒绝
    async fn create(&self, input: CreateCredential) -> AppResult<Credential> {
        let id = Uuid::new_v4();
        let now = Utc::now();

        sqlx::query(
            r#"
            INSERT INTO credentials (id, asset_id, type, username, secret, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(id)
        .bind(input.asset_id)
        .bind(input.kind.as_str())
        .bind(&input.username)
        .bind(input.secret.expose_secret())
        .bind(now)
        .bind(now)
        .execute(&self.db)
        .await?;

        tracing::debug!(credential_id = %id, asset_id = %input.asset_id, "Credential inserted");

        self.get(id).await
    }

    /// 更新凭据；所属资产不可变更
    async fn update(&self, id: Uuid, input: UpdateCredential) -> AppResult<Credential> {
        let result = sqlx::query(
            r#"
            UPDATE credentials
            SET type = ?, username = ?, secret = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(input.kind.as_str())
        .bind(&input.username)
        .bind(input.secret.expose_secret())
        .bind(Utc::now())
        .bind(id)
        .execute(&self.db)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found("credential", id));
        }

        tracing::debug!(credential_id = %id, "Credential updated");

        self.get(id).await
    }

    async fn delete(&self, id: Uuid) -> AppResult<()> {
        let mut tx = begin_write(&self.db).await?;
        delete_credential(&mut tx, id).await?;
        tx.commit().await?;

        tracing::debug!(credential_id = %id, "Credential deleted");
        Ok(())
    }

    async fn delete_collection(&self, ids: &[Uuid]) -> AppResult<()> {
        let ids = dedup_ids(ids);
        let mut tx = begin_write(&self.db).await?;
        for id in &ids {
            delete_credential(&mut tx, *id).await?;
        }
        tx.commit().await?;

        tracing::debug!(count = ids.len(), "Credentials deleted");
        Ok(())
    }

    async fn get(&self, id: Uuid) -> AppResult<Credential> {
        sqlx::query_as::<_, CredentialRow>(&format!("{SELECT_CREDENTIALS} WHERE id = ?"))
            .bind(id)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| AppError::not_found("credential", id))?
            .try_into()
    }

    async fn list(&self, options: &ListOptions) -> AppResult<Page<Credential>> {
        let (limit, offset) = options.to_sql_bounds()?;
        let mut tx = self.db.begin().await?;

        let rows = sqlx::query_as::<_, CredentialRow>(&format!(
            "{SELECT_CREDENTIALS} ORDER BY seq LIMIT ? OFFSET ?"
        ))
        .bind(limit)
        .bind(offset)
        .fetch_all(&mut *tx)
        .await?;

        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM credentials")
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(Page::new(into_credentials(rows)?, total, options))
    }

    async fn count(&self) -> AppResult<u64> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM credentials")
            .fetch_one(&self.db)
            .await?;
        Ok(u64::try_from(total).unwrap_or_default())
    }

    async fn get_by_asset(
        &self,
        asset_id: Uuid,
        options: &ListOptions,
    ) -> AppResult<Page<Credential>> {
        let (limit, offset) = options.to_sql_bounds()?;
        let mut tx = self.db.begin().await?;

        if !exists(&mut *tx, ASSET_EXISTS, asset_id).await? {
            return Err(AppError::not_found("asset", asset_id));
        }

        let rows = sqlx::query_as::<_, CredentialRow>(&format!(
            "{SELECT_CREDENTIALS} WHERE asset_id = ? ORDER BY seq LIMIT ? OFFSET ?"
        ))
        .bind(asset_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&mut *tx)
        .await?;

        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM credentials WHERE asset_id = ?")
            .bind(asset_id)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(Page::new(into_credentials(rows)?, total, options))
    }
}
