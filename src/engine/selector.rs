use std::sync::Arc;

use tracing::{debug, error};

use crate::error::{CodingError, CodingResult};
use crate::llm::client::utils::{preview, strip_code_fences};
use crate::llm::client::{ChatMessage, LlmBackend};
use crate::types::Selection;
use crate::types::selection::parse_selections;

/// 调用单个LLM后端并解析其选择结果
///
/// 不做重试，重试策略属于调用方。
#[derive(Clone)]
pub struct ModelSelector {
    backend: Arc<dyn LlmBackend>,
}

impl ModelSelector {
    pub fn new(backend: Arc<dyn LlmBackend>) -> Self {
        Self { backend }
    }

    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    pub async fn select(&self, prompt: &str) -> CodingResult<Vec<Selection>> {
        debug!(
            backend = self.backend.name(),
            prompt_chars = prompt.len(),
            "requesting selections"
        );

        let reply = self
            .backend
            .complete(&[ChatMessage::user(prompt)], &[])
            .await?;

        let Some(content) = reply.content.filter(|c| !c.trim().is_empty()) else {
            return Err(CodingError::ResponseParse(format!(
                "backend '{}' returned no content",
                self.backend.name()
            )));
        };

        let cleaned = strip_code_fences(&content);
        parse_selections(&cleaned).inspect_err(|e| {
            error!(
                backend = self.backend.name(),
                error = %e,
                content = %preview(&cleaned, 200),
                "failed to parse selections"
            );
        })
    }
}
