//! 数据库连接池与迁移管理
//! 提供 SQLite 连接池、迁移执行、健康检查以及存储生命周期

use crate::config::DatabaseConfig;
use secrecy::ExposeSecret;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::future::Future;
use std::str::FromStr;
use std::time::Duration;

/// 创建数据库连接池
pub async fn create_pool(config: &DatabaseConfig) -> Result<SqlitePool, DbError> {
    let db_url = config.url.expose_secret();

    tracing::debug!("Creating database connection pool...");

    let mut options = SqliteConnectOptions::from_str(db_url)
        .map_err(|e| DbError::ConnectionFailed(e.to_string()))?
        .create_if_missing(true)
        .foreign_keys(true)
        .busy_timeout(Duration::from_secs(config.busy_timeout_secs));

    // 内存数据库不支持 WAL
    if !db_url.contains(":memory:") && !db_url.contains("mode=memory") {
        options = options.journal_mode(SqliteJournalMode::Wal);
    }

    let pool = SqlitePoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(Duration::from_secs(config.acquire_timeout_secs))
        .idle_timeout(Duration::from_secs(config.idle_timeout_secs))
        .max_lifetime(Duration::from_secs(config.max_lifetime_secs))
        .test_before_acquire(true)
        .connect_with(options)
        .await
        .map_err(|e| {
            tracing::error!("Failed to create database pool: {}", e);
            DbError::ConnectionFailed(e.to_string())
        })?;

    tracing::info!(
        max_connections = config.max_connections,
        min_connections = config.min_connections,
        "Database pool created successfully"
    );

    Ok(pool)
}

/// 运行数据库迁移
pub async fn run_migrations(pool: &SqlitePool) -> Result<(), DbError> {
    tracing::info!("Running database migrations...");

    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .map_err(|e| {
            tracing::error!("Migration failed: {}", e);
            DbError::MigrationFailed(e.to_string())
        })?;

    tracing::info!("Migrations completed successfully");
    Ok(())
}

/// 数据库健康检查
pub async fn health_check(pool: &SqlitePool) -> HealthStatus {
    match sqlx::query("SELECT 1").fetch_one(pool).await {
        Ok(_) => {
            tracing::debug!("Database health check: OK");
            HealthStatus::Healthy
        }
        Err(e) => {
            tracing::warn!("Database health check failed: {}", e);
            HealthStatus::Unhealthy(e.to_string())
        }
    }
}

/// 记录数据库连接池指标
pub fn record_pool_metrics(pool: &SqlitePool) {
    metrics::gauge!("db.pool.size").set(pool.size() as f64);
    metrics::gauge!("db.pool.idle").set(pool.num_idle() as f64);
}

/// 已初始化 schema 的存储句柄
///
/// 进程启动时打开一次，所有仓库共享同一个连接池；关闭时调用 [`Store::close`]。
#[derive(Clone)]
pub struct Store {
    pool: SqlitePool,
}

impl Store {
    /// 连接数据库并确保 schema 已存在
    pub async fn open(config: &DatabaseConfig) -> Result<Self, DbError> {
        let pool = create_pool(config).await?;
        if let Err(e) = run_migrations(&pool).await {
            pool.close().await;
            return Err(e);
        }
        record_pool_metrics(&pool);
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn health_check(&self) -> HealthStatus {
        health_check(&self.pool).await
    }

    /// 关闭连接池，等待所有连接归还
    pub async fn close(self) {
        record_pool_metrics(&self.pool);
        self.pool.close().await;
        tracing::info!("Database pool closed");
    }
}

/// 在存储的生命周期内执行 `f`
///
/// 无论 `f` 成功与否，存储都只关闭一次。
pub async fn scoped<F, Fut, T, E>(config: &DatabaseConfig, f: F) -> Result<T, E>
where
    F: FnOnce(Store) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: From<DbError>,
{
    let store = Store::open(config).await?;
    let result = f(store.clone()).await;
    store.close().await;
    result
}

/// 数据库错误类型
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Migration failed: {0}")]
    MigrationFailed(String),
}

impl From<DbError> for crate::error::AppError {
    fn from(e: DbError) -> Self {
        crate::error::AppError::StorageUnavailable(e.to_string())
    }
}

/// 健康状态
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    Healthy,
    Unhealthy(String),
}
