use std::{
    collections::BTreeMap,
    fmt::{Display, Formatter},
};

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// 属性维度：状态(S) / 位置(L) / 范围(E)
#[derive(
    Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, JsonSchema,
)]
pub enum AttributeDomain {
    #[serde(rename = "S")]
    Status,
    #[serde(rename = "L")]
    Location,
    #[serde(rename = "E")]
    Extent,
}

impl AttributeDomain {
    pub const ALL: [AttributeDomain; 3] = [
        AttributeDomain::Status,
        AttributeDomain::Location,
        AttributeDomain::Extent,
    ];

    /// 维度的单字母标签
    pub fn label(&self) -> &'static str {
        match self {
            AttributeDomain::Status => "S",
            AttributeDomain::Location => "L",
            AttributeDomain::Extent => "E",
        }
    }

    /// 属性定义文档中使用的分组名
    pub fn group_name(&self) -> &'static str {
        match self {
            AttributeDomain::Status => "status",
            AttributeDomain::Location => "location",
            AttributeDomain::Extent => "extent",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        let label = label.trim();
        Self::ALL
            .into_iter()
            .find(|domain| domain.label().eq_ignore_ascii_case(label))
    }

    pub fn from_group_name(name: &str) -> Option<Self> {
        let name = name.trim();
        Self::ALL
            .into_iter()
            .find(|domain| domain.group_name().eq_ignore_ascii_case(name))
    }
}

impl Display for AttributeDomain {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// 属性维度声明的基数
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, JsonSchema)]
pub enum Cardinality {
    #[serde(alias = "mandatory", alias = "M")]
    Mandatory,
    #[serde(alias = "optional", alias = "O")]
    Optional,
    #[serde(rename = "N/A", alias = "NotApplicable", alias = "n/a")]
    NotApplicable,
}

impl Display for Cardinality {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Cardinality::Mandatory => write!(f, "Mandatory"),
            Cardinality::Optional => write!(f, "Optional"),
            Cardinality::NotApplicable => write!(f, "N/A"),
        }
    }
}

/// 编码记录上某个维度的属性声明
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, JsonSchema)]
pub struct AttributeSpec {
    #[serde(rename = "type")]
    pub cardinality: Cardinality,
    #[serde(default)]
    pub codes: Vec<String>,
}

/// 限定码，作用域为所属编码
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Qualifier {
    pub code: String,
    #[serde(default)]
    pub approach: String,
    pub description: String,
    #[serde(default)]
    pub includes: Vec<String>,
}

/// 目录中的一条编码记录，加载后不可变
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CatalogRecord {
    pub code: String,
    pub description: String,
    #[serde(default)]
    pub includes: Vec<String>,
    #[serde(default)]
    pub excludes: Vec<String>,
    #[serde(default, alias = "note")]
    pub notes: Vec<String>,
    #[serde(default, alias = "code_also")]
    pub code_also: Vec<String>,
    #[serde(default, alias = "otherQualifiers")]
    pub qualifiers: Vec<Qualifier>,
    /// 维度标签 -> 声明；未知维度在组装时跳过
    #[serde(default)]
    pub attributes: BTreeMap<String, AttributeSpec>,
}

impl CatalogRecord {
    pub fn new(code: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            description: description.into(),
            includes: Vec::new(),
            excludes: Vec::new(),
            notes: Vec::new(),
            code_also: Vec::new(),
            qualifiers: Vec::new(),
            attributes: BTreeMap::new(),
        }
    }
}

/// 相似度检索返回的原始结果
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredRecord {
    pub record: CatalogRecord,
    pub score: f64,
}

/// 属性参考定义
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, JsonSchema)]
pub struct AttributeDefinition {
    pub domain: AttributeDomain,
    pub code: String,
    pub description: String,
}

/// 组装后的属性条目
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, JsonSchema)]
pub struct ResolvedAttribute {
    #[serde(rename = "name")]
    pub domain: AttributeDomain,
    pub code: String,
    pub description: String,
    #[serde(rename = "type")]
    pub cardinality: Cardinality,
}

/// 检索得到的候选项
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CandidateItem {
    #[serde(flatten)]
    pub record: CatalogRecord,
    pub similarity_score: f64,
    /// 由 RubricAssembler 填充
    #[serde(default, rename = "allAttributes")]
    pub attributes: Vec<ResolvedAttribute>,
}

impl CandidateItem {
    pub fn code(&self) -> &str {
        &self.record.code
    }
}

impl From<ScoredRecord> for CandidateItem {
    fn from(scored: ScoredRecord) -> Self {
        Self {
            record: scored.record,
            similarity_score: scored.score,
            attributes: Vec::new(),
        }
    }
}
