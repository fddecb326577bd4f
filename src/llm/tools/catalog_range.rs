//! 目录区段查询工具

use std::sync::Arc;

use rig::tool::Tool;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::catalog::CatalogStore;
use crate::error::{CodingError, CodingResult};
use crate::types::CatalogRecord;

/// 区段查询工具，供编码智能体补充候选编码
#[derive(Clone)]
pub struct AgentToolCatalogRange {
    store: Arc<dyn CatalogStore>,
}

/// 区段查询参数
#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema)]
pub struct RangeArgs {
    /// 区段起始编码（含），如 "B95"
    pub start: String,
    /// 区段结束编码（含），如 "B97"
    pub end: String,
}

/// 返回给模型的精简记录
#[derive(Debug, Clone, Serialize)]
pub struct RangeEntry {
    pub code: String,
    pub description: String,
    pub includes: Vec<String>,
    pub excludes: Vec<String>,
    pub notes: Vec<String>,
}

impl From<CatalogRecord> for RangeEntry {
    fn from(record: CatalogRecord) -> Self {
        Self {
            code: record.code,
            description: record.description,
            includes: record.includes,
            excludes: record.excludes,
            notes: record.notes,
        }
    }
}

/// 区段查询工具错误
#[derive(Debug, thiserror::Error)]
#[error("catalog range tool error: {0}")]
pub struct CatalogRangeToolError(String);

impl AgentToolCatalogRange {
    pub fn new(store: Arc<dyn CatalogStore>) -> Self {
        Self { store }
    }

    /// 查询区段，保留原始错误类型以便编排器透传
    pub async fn fetch(&self, args: &RangeArgs) -> CodingResult<Vec<RangeEntry>> {
        if args.start.trim().is_empty() || args.end.trim().is_empty() {
            return Err(CodingError::RetrievalFailure(
                "range bounds must not be empty".to_string(),
            ));
        }
        let records = self.store.find_by_range(&args.start, &args.end).await?;
        Ok(records.into_iter().map(RangeEntry::from).collect())
    }
}

impl Tool for AgentToolCatalogRange {
    const NAME: &'static str = "getIcdByBlockRange";

    type Error = CatalogRangeToolError;
    type Args = RangeArgs;
    type Output = Vec<RangeEntry>;

    async fn definition(&self, _prompt: String) -> rig::completion::ToolDefinition {
        let parameters = serde_json::to_value(schemars::schema_for!(RangeArgs))
            .unwrap_or_else(|_| serde_json::json!({"type": "object"}));

        rig::completion::ToolDefinition {
            name: Self::NAME.to_string(),
            description: "Fetch every ICD-10-CA code in a block range, inclusive of both ends \
                          (e.g. start \"B95\", end \"B97\"). Use it when a required code is \
                          missing from the candidate list."
                .to_string(),
            parameters,
        }
    }

    async fn call(&self, args: Self::Args) -> Result<Self::Output, Self::Error> {
        self.fetch(&args)
            .await
            .map_err(|e| CatalogRangeToolError(e.to_string()))
    }
}
