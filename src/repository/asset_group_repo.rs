//! Asset group repository (资产组数据访问)
//!
//! Owns group attributes and the group/asset membership table.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{QueryBuilder, Sqlite, SqliteConnection, SqlitePool};
use std::collections::HashMap;
use uuid::Uuid;

use super::{begin_write, dedup_ids, exists, AssetGroupRepository, ASSET_EXISTS, GROUP_EXISTS};
use crate::error::{AppError, AppResult};
use crate::models::{
    AssetGroup, AssetGroupAttribute, AttributeInput, CreateAssetGroup, ListOptions, Page,
    UpdateAssetGroup,
};

#[derive(Debug, sqlx::FromRow)]
struct GroupRow {
    id: Uuid,
    name: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, sqlx::FromRow)]
struct AttributeRow {
    id: Uuid,
    group_id: Uuid,
    key: String,
    value: String,
    #[sqlx(rename = "type")]
    kind: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<AttributeRow> for AssetGroupAttribute {
    fn from(row: AttributeRow) -> Self {
        Self {
            id: row.id,
            key: row.key,
            value: row.value,
            kind: row.kind,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// SQLite 资产组仓库
#[derive(Clone)]
pub struct SqliteAssetGroupRepository {
    db: SqlitePool,
}

impl SqliteAssetGroupRepository {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }
}

/// 批量加载属性并组装资产组
async fn attach_attrs(conn: &mut SqliteConnection, rows: Vec<GroupRow>) -> AppResult<Vec<AssetGroup>> {
    if rows.is_empty() {
        return Ok(Vec::new());
    }

    let mut builder = QueryBuilder::<Sqlite>::new(
        "SELECT id, group_id, key, value, type, created_at, updated_at \
         FROM asset_group_attributes WHERE group_id IN (",
    );
    let mut separated = builder.separated(", ");
    for row in &rows {
        separated.push_bind(row.id);
    }
    separated.push_unseparated(") ORDER BY seq");

    let attr_rows: Vec<AttributeRow> = builder.build_query_as().fetch_all(&mut *conn).await?;

    let mut attrs: HashMap<Uuid, Vec<AssetGroupAttribute>> = HashMap::new();
    for attr in attr_rows {
        attrs.entry(attr.group_id).or_default().push(attr.into());
    }

    Ok(rows
        .into_iter()
        .map(|row| AssetGroup {
            attrs: attrs.remove(&row.id).unwrap_or_default(),
            id: row.id,
            name: row.name,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
        .collect())
}

/// 按 key upsert 属性，并删除不在新集合中的 key
async fn replace_attrs(
    conn: &mut SqliteConnection,
    group_id: Uuid,
    attrs: &[AttributeInput],
    now: DateTime<Utc>,
) -> AppResult<()> {
    for attr in attrs {
        sqlx::query(
            r#"
            INSERT INTO asset_group_attributes (id, group_id, key, value, type, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT (group_id, key) DO UPDATE SET
                value = excluded.value,
                type = excluded.type,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(group_id)
        .bind(&attr.key)
        .bind(&attr.value)
        .bind(&attr.kind)
        .bind(now)
        .bind(now)
        .execute(&mut *conn)
        .await?;
    }

    let mut builder = QueryBuilder::<Sqlite>::new("DELETE FROM asset_group_attributes WHERE group_id = ");
    builder.push_bind(group_id);
    if !attrs.is_empty() {
        builder.push(" AND key NOT IN (");
        let mut separated = builder.separated(", ");
        for attr in attrs {
            separated.push_bind(attr.key.as_str());
        }
        separated.push_unseparated(")");
    }
    builder.build().execute(&mut *conn).await?;

    Ok(())
}

async fn delete_group(conn: &mut SqliteConnection, id: Uuid) -> AppResult<()> {
    let result = sqlx::query("DELETE FROM asset_groups WHERE id = ?")
        .bind(id)
        .execute(&mut *conn)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::not_found("asset group", id));
    }
    Ok(())
}

#[async_trait]
impl AssetGroupRepository for SqliteAssetGroupRepository {
    /// 创建资产组及其属性
    async fn create(&self, input: CreateAssetGroup) -> AppResult<AssetGroup> {
        let id = Uuid::new_v4();
        let now = Utc::now();
        let mut tx = begin_write(&self.db).await?;

        sqlx::query(
            r#"
            INSERT INTO asset_groups (id, name, created_at, updated_at)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(id)
        .bind(&input.name)
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        replace_attrs(&mut tx, id, &input.attrs, now).await?;
        tx.commit().await?;

        tracing::debug!(group_id = %id, name = %input.name, "Asset group inserted");

        self.get(id).await
    }

    /// 更新资产组名称并替换属性集合
    async fn update(&self, id: Uuid, input: UpdateAssetGroup) -> AppResult<AssetGroup> {
        let now = Utc::now();
        let mut tx = begin_write(&self.db).await?;

        let result = sqlx::query("UPDATE asset_groups SET name = ?, updated_at = ? WHERE id = ?")
            .bind(&input.name)
            .bind(now)
            .bind(id)
            .execute(&mut *tx)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found("asset group", id));
        }

        replace_attrs(&mut tx, id, &input.attrs, now).await?;
        tx.commit().await?;

        tracing::debug!(group_id = %id, "Asset group updated");

        self.get(id).await
    }

    /// 删除资产组；属性与成员关系级联删除，资产本身保留
    async fn delete(&self, id: Uuid) -> AppResult<()> {
        let mut tx = begin_write(&self.db).await?;
        delete_group(&mut tx, id).await?;
        tx.commit().await?;

        tracing::debug!(group_id = %id, "Asset group deleted");
        Ok(())
    }

    async fn delete_collection(&self, ids: &[Uuid]) -> AppResult<()> {
        let ids = dedup_ids(ids);
        let mut tx = begin_write(&self.db).await?;
        for id in &ids {
            delete_group(&mut tx, *id).await?;
        }
        tx.commit().await?;

        tracing::debug!(count = ids.len(), "Asset groups deleted");
        Ok(())
    }

    async fn get(&self, id: Uuid) -> AppResult<AssetGroup> {
        let mut conn = self.db.acquire().await?;

        let row = sqlx::query_as::<_, GroupRow>(
            "SELECT id, name, created_at, updated_at FROM asset_groups WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| AppError::not_found("asset group", id))?;

        let mut groups = attach_attrs(&mut conn, vec![row]).await?;
        groups
            .pop()
            .ok_or_else(|| AppError::Internal(format!("asset group {id} vanished while loading")))
    }

    async fn list(&self, options: &ListOptions) -> AppResult<Page<AssetGroup>> {
        let (limit, offset) = options.to_sql_bounds()?;
        let mut tx = self.db.begin().await?;

        let rows = sqlx::query_as::<_, GroupRow>(
            "SELECT id, name, created_at, updated_at FROM asset_groups ORDER BY seq LIMIT ? OFFSET ?",
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(&mut *tx)
        .await?;

        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM asset_groups")
            .fetch_one(&mut *tx)
            .await?;

        let groups = attach_attrs(&mut tx, rows).await?;
        tx.commit().await?;

        Ok(Page::new(groups, total, options))
    }

    async fn count(&self) -> AppResult<u64> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM asset_groups")
            .fetch_one(&self.db)
            .await?;
        Ok(u64::try_from(total).unwrap_or_default())
    }

    /// 添加成员；任一资产不存在时不写入任何关系
    async fn add_members(&self, group_id: Uuid, asset_ids: &[Uuid]) -> AppResult<()> {
        let asset_ids = dedup_ids(asset_ids);
        let now = Utc::now();
        let mut tx = begin_write(&self.db).await?;

        if !exists(&mut *tx, GROUP_EXISTS, group_id).await? {
            return Err(AppError::not_found("asset group", group_id));
        }

        for asset_id in &asset_ids {
            if !exists(&mut *tx, ASSET_EXISTS, *asset_id).await? {
                return Err(AppError::not_found("asset", *asset_id));
            }

            sqlx::query(
                r#"
                INSERT INTO asset_group_members (group_id, asset_id, created_at)
                VALUES (?, ?, ?)
                ON CONFLICT (group_id, asset_id) DO NOTHING
                "#,
            )
            .bind(group_id)
            .bind(*asset_id)
            .bind(now)
            .execute(&mut *tx)
            .await?;
        }

        sqlx::query("UPDATE asset_groups SET updated_at = ? WHERE id = ?")
            .bind(now)
            .bind(group_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        tracing::debug!(group_id = %group_id, count = asset_ids.len(), "Asset group members added");
        Ok(())
    }

    /// 移除成员；非成员直接忽略
    async fn remove_members(&self, group_id: Uuid, asset_ids: &[Uuid]) -> AppResult<()> {
        let asset_ids = dedup_ids(asset_ids);
        let mut tx = begin_write(&self.db).await?;

        if !exists(&mut *tx, GROUP_EXISTS, group_id).await? {
            return Err(AppError::not_found("asset group", group_id));
        }

        if !asset_ids.is_empty() {
            let mut builder =
                QueryBuilder::<Sqlite>::new("DELETE FROM asset_group_members WHERE group_id = ");
            builder.push_bind(group_id);
            builder.push(" AND asset_id IN (");
            let mut separated = builder.separated(", ");
            for asset_id in &asset_ids {
                separated.push_bind(*asset_id);
            }
            separated.push_unseparated(")");
            builder.build().execute(&mut *tx).await?;

            sqlx::query("UPDATE asset_groups SET updated_at = ? WHERE id = ?")
                .bind(Utc::now())
                .bind(group_id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;

        tracing::debug!(group_id = %group_id, count = asset_ids.len(), "Asset group members removed");
        Ok(())
    }
}
