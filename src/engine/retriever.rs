use std::sync::Arc;

use tracing::debug;

use crate::catalog::CatalogStore;
use crate::error::{CodingError, CodingResult};
use crate::types::CandidateItem;

/// 候选检索器，排序完全交给 CatalogStore
#[derive(Clone)]
pub struct CandidateRetriever {
    store: Arc<dyn CatalogStore>,
}

impl CandidateRetriever {
    pub fn new(store: Arc<dyn CatalogStore>) -> Self {
        Self { store }
    }

    /// 空查询直接返回 `EmptyQuery`，不会访问存储；零命中返回空列表
    pub async fn retrieve(&self, query: &str, limit: usize) -> CodingResult<Vec<CandidateItem>> {
        let query = query.trim();
        if query.is_empty() {
            return Err(CodingError::EmptyQuery);
        }

        let records = self.store.similarity_search(query, limit).await?;
        debug!(query, limit, hits = records.len(), "similarity search finished");

        Ok(records.into_iter().map(CandidateItem::from).collect())
    }
}
