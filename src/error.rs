//! 统一错误模型
//! 仓库层是 sqlx 错误到领域错误的唯一翻译点，服务层原样传递

use sqlx::error::ErrorKind;
use thiserror::Error;

/// 应用错误类型
#[derive(Debug, Error)]
pub enum AppError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        AppError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// 错误分类标签，用于指标与日志
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::NotFound { .. } => "not_found",
            AppError::ConstraintViolation(_) => "constraint_violation",
            AppError::StorageUnavailable(_) => "storage_unavailable",
            AppError::Validation(_) => "validation",
            AppError::Internal(_) => "internal",
        }
    }
}

impl From<sqlx::Error> for AppError {
    fn from(e: sqlx::Error) -> Self {
        let err = match e {
            sqlx::Error::Database(db_err) => match db_err.kind() {
                ErrorKind::UniqueViolation
                | ErrorKind::ForeignKeyViolation
                | ErrorKind::NotNullViolation
                | ErrorKind::CheckViolation => {
                    AppError::ConstraintViolation(db_err.message().to_string())
                }
                // 未开启扩展错误码时 SQLite 只返回通用的 SQLITE_CONSTRAINT
                _ if db_err.message().contains("constraint failed") => {
                    AppError::ConstraintViolation(db_err.message().to_string())
                }
                _ => AppError::StorageUnavailable(db_err.message().to_string()),
            },
            sqlx::Error::RowNotFound => AppError::not_found("record", "unknown"),
            sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::WorkerCrashed
            | sqlx::Error::Configuration(_) => AppError::StorageUnavailable(e.to_string()),
            other => AppError::Internal(other.to_string()),
        };

        metrics::counter!("storage.errors", "kind" => err.kind()).increment(1);
        tracing::debug!(kind = err.kind(), error = %err, "Translated storage error");

        err
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(e: validator::ValidationErrors) -> Self {
        AppError::Validation(e.to_string())
    }
}

pub type AppResult<T> = Result<T, AppError>;
