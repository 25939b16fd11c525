//! Session repository (会话数据访问)

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use uuid::Uuid;

use super::{begin_write, dedup_ids, exists, parse_column, SessionRepository, ASSET_EXISTS};
use crate::error::{AppError, AppResult};
use crate::models::{CreateSession, ListOptions, Page, Session, UpdateSession};

const SELECT_SESSIONS: &str = "SELECT id, asset_id, credential_id, type, status, created_at, updated_at, stopped_at FROM sessions";

#[derive(Debug, sqlx::FromRow)]
struct SessionRow {
    id: Uuid,
    asset_id: Uuid,
    credential_id: Uuid,
    #[sqlx(rename = "type")]
    kind: String,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    stopped_at: Option<DateTime<Utc>>,
}

impl TryFrom<SessionRow> for Session {
    type Error = AppError;

    fn try_from(row: SessionRow) -> Result<Self, Self::Error> {
        Ok(Session {
            id: row.id,
            asset_id: row.asset_id,
            credential_id: row.credential_id,
            kind: parse_column(&row.kind)?,
            status: row.status,
            created_at: row.created_at,
            updated_at: row.updated_at,
            stopped_at: row.stopped_at,
        })
    }
}

fn into_sessions(rows: Vec<SessionRow>) -> AppResult<Vec<Session>> {
    rows.into_iter().map(Session::try_from).collect()
}

/// SQLite 会话仓库
#[derive(Clone)]
pub struct SqliteSessionRepository {
    db: SqlitePool,
}

impl SqliteSessionRepository {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }
}

async fn delete_session(conn: &mut SqliteConnection, id: Uuid) -> AppResult<()> {
    let result = sqlx::query("DELETE FROM sessions WHERE id = ?")
        .bind(id)
        .execute(&mut *conn)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::not_found("session", id));
    }
    Ok(())
}

#[async_trait]
impl SessionRepository for SqliteSessionRepository {
    /// 创建会话；stopped_at 在会话结束前保持为空
    async fn create(&self, input: CreateSession) -> AppResult<Session> {
        let id = Uuid::new_v4();
        let now = Utc::now();

        sqlx::query(
            r#"
            INSERT INTO sessions (id, asset_id, credential_id, type, status, created_at, updated_at, stopped_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, NULL)
            "#,
        )
        .bind(id)
        .bind(input.asset_id)
        .bind(input.credential_id)
        .bind(input.kind.as_str())
        .bind(&input.status)
        .bind(now)
        .bind(now)
        .execute(&self.db)
        .await?;

        tracing::debug!(
            session_id = %id,
            asset_id = %input.asset_id,
            credential_id = %input.credential_id,
            "Session inserted"
        );

        self.get(id).await
    }

    /// 更新会话状态；资产与凭据引用不可变更
    async fn update(&self, id: Uuid, input: UpdateSession) -> AppResult<Session> {
        let result = sqlx::query(
            r#"
            UPDATE sessions
            SET type = ?, status = ?, stopped_at = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(input.kind.as_str())
        .bind(&input.status)
        .bind(input.stopped_at)
        .bind(Utc::now())
        .bind(id)
        .execute(&self.db)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found("session", id));
        }

        tracing::debug!(session_id = %id, status = %input.status, "Session updated");

        self.get(id).await
    }

    async fn delete(&self, id: Uuid) -> AppResult<()> {
        let mut tx = begin_write(&self.db).await?;
        delete_session(&mut tx, id).await?;
        tx.commit().await?;

        tracing::debug!(session_id = %id, "Session deleted");
        Ok(())
    }

    async fn delete_collection(&self, ids: &[Uuid]) -> AppResult<()> {
        let ids = dedup_ids(ids);
        let mut tx = begin_write(&self.db).await?;
        for id in &ids {
            delete_session(&mut tx, *id).await?;
        }
        tx.commit().await?;

        tracing::debug!(count = ids.len(), "Sessions deleted");
        Ok(())
    }

    async fn get(&self, id: Uuid) -> AppResult<Session> {
        sqlx::query_as::<_, SessionRow>(&format!("{SELECT_SESSIONS} WHERE id = ?"))
            .bind(id)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| AppError::not_found("session", id))?
            .try_into()
    }

    async fn list(&self, options: &ListOptions) -> AppResult<Page<Session>> {
        let (limit, offset) = options.to_sql_bounds()?;
        let mut tx = self.db.begin().await?;

        let rows = sqlx::query_as::<_, SessionRow>(&format!(
            "{SELECT_SESSIONS} ORDER BY seq LIMIT ? OFFSET ?"
        ))
        .bind(limit)
        .bind(offset)
        .fetch_all(&mut *tx)
        .await?;

        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM sessions")
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(Page::new(into_sessions(rows)?, total, options))
    }

    async fn count(&self) -> AppResult<u64> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM sessions")
            .fetch_one(&self.db)
            .await?;
        Ok(u64::try_from(total).unwrap_or_default())
    }

    async fn get_by_asset(&self, asset_id: Uuid, options: &ListOptions) -> AppResult<Page<Session>> {
        let (limit, offset) = options.to_sql_bounds()?;
        let mut tx = self.db.begin().await?;

        if !exists(&mut *tx, ASSET_EXISTS, asset_id).await? {
            return Err(AppError::not_found("asset", asset_id));
        }

        let rows = sqlx::query_as::<_, SessionRow>(&format!(
            "{SELECT_SESSIONS} WHERE asset_id = ? ORDER BY seq LIMIT ? OFFSET ?"
        ))
        .bind(asset_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&mut *tx)
        .await?;

        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM sessions WHERE asset_id = ?")
            .bind(asset_id)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(Page::new(into_sessions(rows)?, total, options))
    }
}
