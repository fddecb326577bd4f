//! 编码目录协作方接口

use async_trait::async_trait;

use crate::error::CodingResult;
use crate::types::{AttributeDefinition, CatalogRecord, ScoredRecord};

pub mod code;
mod json_store;

pub use json_store::{JsonAttributeSource, JsonCatalogStore};

/// 编码目录：相似度检索与精确/区段查找
///
/// 检索失败应返回 `CodingError::RetrievalFailure`。
#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// 按相似度降序返回最多 `limit` 条记录
    async fn similarity_search(&self, query: &str, limit: usize)
    -> CodingResult<Vec<ScoredRecord>>;

    async fn find_exact(&self, code: &str) -> CodingResult<Option<CatalogRecord>>;

    /// 按编码升序返回区段内的记录
    async fn find_by_range(&self, start: &str, end: &str) -> CodingResult<Vec<CatalogRecord>>;

    /// 按编码升序返回全部记录，用于编码上下文浏览
    async fn list_sorted(&self) -> CodingResult<Vec<CatalogRecord>>;
}

/// 属性定义来源，仅在进程启动时调用一次
#[async_trait]
pub trait AttributeDefinitionSource: Send + Sync {
    async fn load_all(&self) -> CodingResult<Vec<AttributeDefinition>>;
}
