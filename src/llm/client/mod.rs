//! LLM客户端 - 提供统一的LLM后端接口

use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use rig::{
    OneOrMany,
    completion::{
        AssistantContent, Message, ToolDefinition,
        message::{ToolResultContent, UserContent},
    },
};
use tracing::{debug, error};

use crate::config::LLMConfig;
use crate::error::{CodingError, CodingResult};

mod providers;
pub mod types;
pub mod utils;

use providers::{ProviderClient, ProviderRequest};
pub use types::{ChatMessage, ModelReply, ToolCall};

const CODER_PREAMBLE: &str = "You are an expert Canadian medical coder certified by CIHI. \
Follow the instructions in the user message exactly and answer in the requested format.";

/// LLM后端能力
///
/// 单次调用，不做重试；超时与取消由实现方负责，失败统一映射为 `LlmInvocation`。
#[async_trait]
pub trait LlmBackend: Send + Sync {
    /// 后端名称，用于日志和双模型对比的标注
    fn name(&self) -> &str;

    async fn complete(
        &self,
        messages: &[ChatMessage],
        tools: &[ToolDefinition],
    ) -> CodingResult<ModelReply>;
}

/// 基于rig的LLM客户端
#[derive(Clone)]
pub struct LLMClient {
    name: String,
    config: LLMConfig,
    client: ProviderClient,
}

impl LLMClient {
    /// 创建新的LLM客户端
    pub fn new(name: impl Into<String>, config: LLMConfig) -> Result<Self> {
        let client = ProviderClient::new(&config)?;
        Ok(Self {
            name: name.into(),
            client,
            config,
        })
    }

    fn to_rig_message(message: &ChatMessage) -> CodingResult<Message> {
        match message {
            ChatMessage::User { content } => Ok(Message::user(content.clone())),
            ChatMessage::Assistant {
                content,
                tool_calls,
            } => {
                let mut items = Vec::new();
                if let Some(text) = content
                    && !text.is_empty()
                {
                    items.push(AssistantContent::text(text.clone()));
                }
                for call in tool_calls {
                    items.push(AssistantContent::tool_call(
                        call.id.clone(),
                        call.name.clone(),
                        call.arguments.clone(),
                    ));
                }
                let content = OneOrMany::many(items).map_err(|_| {
                    CodingError::ResponseParse("assistant message without content".to_string())
                })?;
                Ok(Message::Assistant { id: None, content })
            }
            ChatMessage::Tool { call_id, content } => Ok(Message::User {
                content: OneOrMany::one(UserContent::tool_result(
                    call_id.clone(),
                    OneOrMany::one(ToolResultContent::text(content.clone())),
                )),
            }),
        }
    }
}

#[async_trait]
impl LlmBackend for LLMClient {
    fn name(&self) -> &str {
        &self.name
    }

    async fn complete(
        &self,
        messages: &[ChatMessage],
        tools: &[ToolDefinition],
    ) -> CodingResult<ModelReply> {
        let (last, earlier) = messages
            .split_last()
            .ok_or_else(|| CodingError::llm(&self.name, "no messages to send"))?;

        let prompt = Self::to_rig_message(last)?;
        let history = earlier
            .iter()
            .map(Self::to_rig_message)
            .collect::<CodingResult<Vec<_>>>()?;

        let request = ProviderRequest {
            preamble: CODER_PREAMBLE.to_string(),
            prompt,
            history,
            tools: tools.to_vec(),
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens.into(),
        };

        debug!(
            backend = %self.name,
            model = %self.config.model,
            messages = messages.len(),
            tools = tools.len(),
            "sending completion request"
        );

        let timeout = Duration::from_secs(self.config.timeout_seconds);
        match tokio::time::timeout(timeout, self.client.complete(&self.config.model, request)).await
        {
            Ok(Ok(reply)) => Ok(reply),
            Ok(Err(e)) => {
                error!(backend = %self.name, error = %e, "completion request failed");
                Err(CodingError::llm(&self.name, e))
            }
            Err(_) => {
                error!(backend = %self.name, "completion request timed out");
                Err(CodingError::llm(
                    &self.name,
                    format!("timed out after {}s", self.config.timeout_seconds),
                ))
            }
        }
    }
}
