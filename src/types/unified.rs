use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::types::catalog::{AttributeDomain, CandidateItem, Qualifier, ResolvedAttribute};

/// 检索/编码结果的状态。not_found 是正常结果，不是错误
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum SearchStatus {
    Matched,
    NotFound,
}

/// 选定编码在 S/L/E 三个维度上应用的属性
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq, JsonSchema)]
pub struct AppliedAttributes {
    #[serde(rename = "S")]
    pub status: Option<ResolvedAttribute>,
    #[serde(rename = "L")]
    pub location: Option<ResolvedAttribute>,
    #[serde(rename = "E")]
    pub extent: Option<ResolvedAttribute>,
}

impl AppliedAttributes {
    pub fn get(&self, domain: AttributeDomain) -> Option<&ResolvedAttribute> {
        match domain {
            AttributeDomain::Status => self.status.as_ref(),
            AttributeDomain::Location => self.location.as_ref(),
            AttributeDomain::Extent => self.extent.as_ref(),
        }
    }

    pub fn set(&mut self, domain: AttributeDomain, attribute: Option<ResolvedAttribute>) {
        match domain {
            AttributeDomain::Status => self.status = attribute,
            AttributeDomain::Location => self.location = attribute,
            AttributeDomain::Extent => self.extent = attribute,
        }
    }

    pub fn code(&self, domain: AttributeDomain) -> Option<&str> {
        self.get(domain).map(|a| a.code.as_str())
    }
}

/// 单个后端输出的统一结果项
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct UnifiedResultItem {
    #[serde(flatten)]
    pub candidate: CandidateItem,
    pub is_chosen: bool,
    /// 未被选中时恒为 None
    pub applied_qualifier: Option<Qualifier>,
    /// 未被选中时恒为 None
    pub applied_attributes: Option<AppliedAttributes>,
    pub reasoning: String,
}

impl UnifiedResultItem {
    /// 未被模型选中的候选项
    pub fn unchosen(candidate: CandidateItem) -> Self {
        Self {
            candidate,
            is_chosen: false,
            applied_qualifier: None,
            applied_attributes: None,
            reasoning: String::new(),
        }
    }

    pub fn code(&self) -> &str {
        self.candidate.code()
    }

    pub fn qualifier_code(&self) -> Option<&str> {
        self.applied_qualifier.as_ref().map(|q| q.code.as_str())
    }
}

/// 单后端增强检索的完整响应
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct UnifiedResponse {
    pub backend: String,
    pub status: SearchStatus,
    pub items: Vec<UnifiedResultItem>,
    pub search_time_ms: u64,
}

/// 浏览类模式的输出：直接取自目录，不经过模型
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CatalogListing {
    pub status: SearchStatus,
    pub items: Vec<CandidateItem>,
    pub search_time_ms: u64,
}
