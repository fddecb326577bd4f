//! 编码引擎错误分类

use thiserror::Error;

/// 编码解析过程中可能出现的错误
///
/// 缺失的属性定义、可丢弃的幻觉编码在本地降级处理，不会出现在这里；
/// 其余错误原样抛给调用方，绝不退化为空结果。
#[derive(Debug, Error)]
pub enum CodingError {
    /// 查询为空，未进行任何检索
    #[error("query text is empty")]
    EmptyQuery,

    /// CatalogStore 不可用或返回错误
    #[error("catalog retrieval failed: {0}")]
    RetrievalFailure(String),

    /// LLM 后端调用失败
    #[error("LLM backend '{backend}' invocation failed: {message}")]
    LlmInvocation { backend: String, message: String },

    /// LLM 返回的内容不符合约定格式
    #[error("LLM response could not be parsed: {0}")]
    ResponseParse(String),

    /// 工具调用循环超出轮数上限
    #[error("agent exhausted {rounds} rounds without a final answer")]
    AgentExhausted { rounds: usize },

    /// 最终结果中的编码全部无法校正
    #[error("no valid catalog code could be recovered for: {}", codes.join(", "))]
    CodeValidation { codes: Vec<String> },
}

impl CodingError {
    pub fn llm(backend: impl Into<String>, message: impl std::fmt::Display) -> Self {
        CodingError::LlmInvocation {
            backend: backend.into(),
            message: message.to_string(),
        }
    }

    /// 仅外部协作方的瞬时故障值得重试，解析失败与轮数耗尽重试也无意义
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            CodingError::RetrievalFailure(_) | CodingError::LlmInvocation { .. }
        )
    }
}

pub type CodingResult<T> = std::result::Result<T, CodingError>;
