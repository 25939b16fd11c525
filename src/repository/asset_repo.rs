//! Asset repository (资产数据访问)

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{QueryBuilder, Sqlite, SqliteConnection, SqlitePool};
use std::collections::HashMap;
use std::net::IpAddr;
use uuid::Uuid;

use super::{begin_write, dedup_ids, exists, parse_column, AssetRepository, GROUP_EXISTS};
use crate::error::{AppError, AppResult};
use crate::models::{Asset, CreateAsset, ListOptions, Page, UpdateAsset};

const SELECT_ASSETS: &str =
    "SELECT a.id, a.type, a.name, a.ip, a.port, a.created_at, a.updated_at FROM assets a";

#[derive(Debug, sqlx::FromRow)]
struct AssetRow {
    id: Uuid,
    #[sqlx(rename = "type")]
    kind: String,
    name: String,
    ip: String,
    port: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl AssetRow {
    fn into_asset(self, group_ids: Vec<Uuid>) -> AppResult<Asset> {
        let ip: IpAddr = self
            .ip
            .parse()
            .map_err(|e| AppError::Internal(format!("invalid ip stored for asset {}: {e}", self.id)))?;
        let port = u16::try_from(self.port)
            .map_err(|_| AppError::Internal(format!("invalid port stored for asset {}", self.id)))?;

        Ok(Asset {
            id: self.id,
            kind: parse_column(&self.kind)?,
            name: self.name,
            ip,
            port,
            group_ids,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

/// 列表过滤条件
#[derive(Debug, Clone, Copy)]
enum AssetFilter {
    All,
    InGroup(Uuid),
    WithoutGroup,
}

impl AssetFilter {
    fn where_clause(&self) -> &'static str {
        match self {
            AssetFilter::All => "",
            AssetFilter::InGroup(_) => {
                "WHERE EXISTS (SELECT 1 FROM asset_group_members m WHERE m.asset_id = a.id AND m.group_id = ?)"
            }
            AssetFilter::WithoutGroup => {
                "WHERE NOT EXISTS (SELECT 1 FROM asset_group_members m WHERE m.asset_id = a.id)"
            }
        }
    }
}

/// SQLite 资产仓库
#[derive(Clone)]
pub struct SqliteAssetRepository {
    db: SqlitePool,
}

impl SqliteAssetRepository {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// 按过滤条件分页查询；切片与总数在同一个事务中读取
    async fn page(&self, filter: AssetFilter, options: &ListOptions) -> AppResult<Page<Asset>> {
        let (limit, offset) = options.to_sql_bounds()?;
        let mut tx = self.db.begin().await?;

        if let AssetFilter::InGroup(group_id) = filter {
            if !exists(&mut *tx, GROUP_EXISTS, group_id).await? {
                return Err(AppError::not_found("asset group", group_id));
            }
        }

        let where_clause = filter.where_clause();

        let rows_sql = format!("{SELECT_ASSETS} {where_clause} ORDER BY a.seq LIMIT ? OFFSET ?");
        let mut rows_query = sqlx::query_as::<_, AssetRow>(&rows_sql);
        if let AssetFilter::InGroup(group_id) = filter {
            rows_query = rows_query.bind(group_id);
        }
        let rows = rows_query
            .bind(limit)
            .bind(offset)
            .fetch_all(&mut *tx)
            .await?;

        let count_sql = format!("SELECT COUNT(*) FROM assets a {where_clause}");
        let mut count_query = sqlx::query_scalar::<_, i64>(&count_sql);
        if let AssetFilter::InGroup(group_id) = filter {
            count_query = count_query.bind(group_id);
        }
        let total = count_query.fetch_one(&mut *tx).await?;

        let assets = attach_groups(&mut tx, rows).await?;
        tx.commit().await?;

        Ok(Page::new(assets, total, options))
    }
}

/// 批量加载资产所属的资产组 id（按资产组创建顺序）
async fn attach_groups(conn: &mut SqliteConnection, rows: Vec<AssetRow>) -> AppResult<Vec<Asset>> {
    if rows.is_empty() {
        return Ok(Vec::new());
    }

    let mut builder = QueryBuilder::<Sqlite>::new(
        "SELECT m.asset_id, m.group_id FROM asset_group_members m \
         JOIN asset_groups g ON g.id = m.group_id WHERE m.asset_id IN (",
    );
    let mut separated = builder.separated(", ");
    for row in &rows {
        separated.push_bind(row.id);
    }
    separated.push_unseparated(") ORDER BY g.seq");

    let pairs: Vec<(Uuid, Uuid)> = builder.build_query_as().fetch_all(&mut *conn).await?;

    let mut memberships: HashMap<Uuid, Vec<Uuid>> = HashMap::new();
    for (asset_id, group_id) in pairs {
        memberships.entry(asset_id).or_default().push(group_id);
    }

    rows.into_iter()
        .map(|row| {
            let group_ids = memberships.remove(&row.id).unwrap_or_default();
            row.into_asset(group_ids)
        })
        .collect()
}

/// 在事务内删除单个资产；仍有凭据或会话引用时拒绝删除
async fn delete_asset(conn: &mut SqliteConnection, id: Uuid) -> AppResult<()> {
    let credentials: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM credentials WHERE asset_id = ?")
        .bind(id)
        .fetch_one(&mut *conn)
        .await?;
    let sessions: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM sessions WHERE asset_id = ?")
        .bind(id)
        .fetch_one(&mut *conn)
        .await?;

    if credentials > 0 || sessions > 0 {
        return Err(AppError::ConstraintViolation(format!(
            "asset {id} is still referenced by {credentials} credential(s) and {sessions} session(s)"
        )));
    }

    let result = sqlx::query("DELETE FROM assets WHERE id = ?")
        .bind(id)
        .execute(&mut *conn)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::not_found("asset", id));
    }

    Ok(())
}

#[async_trait]
impl AssetRepository for SqliteAssetRepository {
    /// 创建资产
    async fn create(&self, input: CreateAsset) -> AppResult<Asset> {
        let id = Uuid::new_v4();
        let now = Utc::now();

        sqlx::query(
            r#"
            INSERT INTO assets (id, type, name, ip, port, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(id)
        .bind(input.kind.as_str())
        .bind(&input.name)
        .bind(input.ip.to_string())
        .bind(i64::from(input.port))
        .bind(now)
        .bind(now)
        .execute(&self.db)
        .await?;

        tracing::debug!(asset_id = %id, name = %input.name, ip = %input.ip, "Asset inserted");

        self.get(id).await
    }

    /// 更新资产（整体替换可变字段，刷新 updated_at）
    async fn update(&self, id: Uuid, input: UpdateAsset) -> AppResult<Asset> {
        let result = sqlx::query(
            r#"
            UPDATE assets
            SET type = ?, name = ?, ip = ?, port = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(input.kind.as_str())
        .bind(&input.name)
        .bind(input.ip.to_string())
        .bind(i64::from(input.port))
        .bind(Utc::now())
        .bind(id)
        .execute(&self.db)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found("asset", id));
        }

        tracing::debug!(asset_id = %id, "Asset updated");

        self.get(id).await
    }

    async fn delete(&self, id: Uuid) -> AppResult<()> {
        let mut tx = begin_write(&self.db).await?;
        delete_asset(&mut tx, id).await?;
        tx.commit().await?;

        tracing::debug!(asset_id = %id, "Asset deleted");
        Ok(())
    }

    async fn delete_collection(&self, ids: &[Uuid]) -> AppResult<()> {
        let ids = dedup_ids(ids);
        let mut tx = begin_write(&self.db).await?;
        for id in &ids {
            // 任一失败时事务随 tx 一起回滚
            delete_asset(&mut tx, *id).await?;
        }
        tx.commit().await?;

        tracing::debug!(count = ids.len(), "Assets deleted");
        Ok(())
    }

    async fn get(&self, id: Uuid) -> AppResult<Asset> {
        let mut conn = self.db.acquire().await?;

        let row = sqlx::query_as::<_, AssetRow>(&format!("{SELECT_ASSETS} WHERE a.id = ?"))
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?
            .ok_or_else(|| AppError::not_found("asset", id))?;

        let mut assets = attach_groups(&mut conn, vec![row]).await?;
        assets
            .pop()
            .ok_or_else(|| AppError::Internal(format!("asset {id} vanished while loading")))
    }

    async fn list(&self, options: &ListOptions) -> AppResult<Page<Asset>> {
        self.page(AssetFilter::All, options).await
    }

    async fn count(&self) -> AppResult<u64> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM assets")
            .fetch_one(&self.db)
            .await?;
        Ok(u64::try_from(total).unwrap_or_default())
    }

    async fn get_by_group(&self, group_id: Uuid, options: &ListOptions) -> AppResult<Page<Asset>> {
        self.page(AssetFilter::InGroup(group_id), options).await
    }

    async fn get_without_group(&self, options: &ListOptions) -> AppResult<Page<Asset>> {
        self.page(AssetFilter::WithoutGroup, options).await
    }
}
