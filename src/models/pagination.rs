//! 分页约定
//!
//! 所有列表查询共享 `(offset, limit)`。结果按创建顺序排列，
//! `total` 是完整匹配集合的大小，与返回的切片无关。

use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// 调用方未指定 limit 时约定使用的页大小（本层不自动填充）
pub const DEFAULT_PAGE_LIMIT: u64 = 20;

/// Pagination parameters for list queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListOptions {
    #[serde(default)]
    pub offset: u64,
    pub limit: u64,
}

impl ListOptions {
    pub fn new(offset: u64, limit: u64) -> Self {
        Self { offset, limit }
    }

    /// 从第一条记录开始的一页
    pub fn first(limit: u64) -> Self {
        Self { offset: 0, limit }
    }

    /// 下一页的选项
    pub fn next_page(&self) -> Self {
        Self {
            offset: self.offset.saturating_add(self.limit),
            limit: self.limit,
        }
    }

    /// 转换为可绑定到 SQL 的 `(limit, offset)`，拒绝零 limit
    pub fn to_sql_bounds(&self) -> Result<(i64, i64), AppError> {
        if self.limit == 0 {
            return Err(AppError::Validation("limit must be positive".to_string()));
        }
        let limit = i64::try_from(self.limit).unwrap_or(i64::MAX);
        let offset = i64::try_from(self.offset)
            .map_err(|_| AppError::Validation("offset is out of range".to_string()))?;
        Ok((limit, offset))
    }
}

/// A paginated result set.
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub offset: u64,
    pub limit: u64,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, total: i64, options: &ListOptions) -> Self {
        Self {
            items,
            total: u64::try_from(total).unwrap_or_default(),
            offset: options.offset,
            limit: options.limit,
        }
    }

    /// 是否还有下一页
    pub fn has_more(&self) -> bool {
        self.offset.saturating_add(self.items.len() as u64) < self.total
    }
}
