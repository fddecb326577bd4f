use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::types::unified::SearchStatus;

/// 编码包中的单条 ICD-10-CA 结果
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct FinalCodingResult {
    pub code: String,
    #[serde(default)]
    pub description: String,
    pub rationale: String,
    /// 诊断类型，如 M、MP、1、2、3、9、OP
    #[serde(default)]
    pub diagnosis_type: String,
    #[serde(default)]
    pub diagnosis_cluster: Option<String>,
    #[serde(default)]
    pub prefix: Option<String>,
    #[serde(default)]
    pub includes: Vec<String>,
    #[serde(default)]
    pub excludes: Vec<String>,
    #[serde(default)]
    pub notes: Vec<String>,
}

/// 模型给出的最终答复
#[derive(Debug, Deserialize)]
pub struct AgentFinalPayload {
    pub results: Vec<FinalCodingResult>,
    #[serde(default)]
    pub summary: String,
}

/// 面向调用方的完整编码包
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FinalCodingPackage {
    pub status: SearchStatus,
    pub results: Vec<FinalCodingResult>,
    pub summary: String,
    pub processing_time_ms: u64,
    pub rounds_used: usize,
    /// 没有任何有效祖先、已被丢弃的幻觉编码
    pub discarded_codes: Vec<String>,
    pub generated_at: DateTime<Utc>,
}
