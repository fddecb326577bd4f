//! LLM Provider支持模块

use anyhow::Result;
use rig::{
    client::CompletionClient,
    completion::{AssistantContent, CompletionModel, Message, ToolDefinition},
    providers::gemini::completion::gemini_api_types::{AdditionalParameters, GenerationConfig},
};

use super::types::{ModelReply, ToolCall};
use crate::config::{LLMConfig, LLMProvider};

/// 统一的Provider客户端枚举
#[derive(Clone)]
pub enum ProviderClient {
    OpenAI(rig::providers::openai::Client),
    DeepSeek(rig::providers::deepseek::Client),
    OpenRouter(rig::providers::openrouter::Client),
    Anthropic(rig::providers::anthropic::Client),
    Gemini(rig::providers::gemini::Client),
    Ollama(rig::providers::ollama::Client),
}

/// 发往provider的一次补全请求
pub struct ProviderRequest {
    pub preamble: String,
    /// 最新一条消息
    pub prompt: Message,
    /// 之前的对话历史
    pub history: Vec<Message>,
    pub tools: Vec<ToolDefinition>,
    pub temperature: f64,
    pub max_tokens: u64,
}

impl ProviderClient {
    /// 根据配置创建相应的provider客户端
    pub fn new(config: &LLMConfig) -> Result<Self> {
        match config.provider {
            LLMProvider::OpenAI => {
                let client = rig::providers::openai::Client::builder(&config.api_key)
                    .base_url(&config.api_base_url)
                    .build();
                Ok(ProviderClient::OpenAI(client))
            }
            LLMProvider::DeepSeek => {
                let client = rig::providers::deepseek::Client::builder(&config.api_key)
                    .base_url(&config.api_base_url)
                    .build();
                Ok(ProviderClient::DeepSeek(client))
            }
            LLMProvider::OpenRouter => {
                let client = rig::providers::openrouter::Client::builder(&config.api_key).build();
                Ok(ProviderClient::OpenRouter(client))
            }
            LLMProvider::Anthropic => {
                let client =
                    rig::providers::anthropic::ClientBuilder::new(&config.api_key).build()?;
                Ok(ProviderClient::Anthropic(client))
            }
            LLMProvider::Gemini => {
                let client = rig::providers::gemini::Client::builder(&config.api_key).build()?;
                Ok(ProviderClient::Gemini(client))
            }
            LLMProvider::Ollama => {
                let client = rig::providers::ollama::Client::builder().build();
                Ok(ProviderClient::Ollama(client))
            }
        }
    }

    /// 执行一次补全，不自动执行工具调用
    pub async fn complete(
        &self,
        model: &str,
        request: ProviderRequest,
    ) -> Result<ModelReply, String> {
        match self {
            ProviderClient::OpenAI(client) => {
                send(client.completion_model(model).completions_api(), request, None).await
            }
            ProviderClient::DeepSeek(client) => {
                send(client.completion_model(model), request, None).await
            }
            ProviderClient::OpenRouter(client) => {
                send(client.completion_model(model), request, None).await
            }
            ProviderClient::Anthropic(client) => {
                send(client.completion_model(model), request, None).await
            }
            ProviderClient::Gemini(client) => {
                let gen_cfg = GenerationConfig::default();
                let cfg = AdditionalParameters::default().with_config(gen_cfg);
                let params = serde_json::to_value(cfg).map_err(|e| e.to_string())?;
                send(client.completion_model(model), request, Some(params)).await
            }
            ProviderClient::Ollama(client) => {
                send(client.completion_model(model), request, None).await
            }
        }
    }
}

async fn send<M>(
    model: M,
    request: ProviderRequest,
    additional_params: Option<serde_json::Value>,
) -> Result<ModelReply, String>
where
    M: CompletionModel,
{
    let mut builder = model
        .completion_request(request.prompt)
        .preamble(request.preamble)
        .messages(request.history)
        .temperature(request.temperature)
        .max_tokens(request.max_tokens);

    if !request.tools.is_empty() {
        builder = builder.tools(request.tools);
    }
    if let Some(params) = additional_params {
        builder = builder.additional_params(params);
    }

    let response = builder.send().await.map_err(|e| e.to_string())?;

    let mut texts = Vec::new();
    let mut tool_calls = Vec::new();
    for item in response.choice.iter() {
        match item {
            AssistantContent::Text(text) => {
                if !text.text.trim().is_empty() {
                    texts.push(text.text.clone());
                }
            }
            AssistantContent::ToolCall(call) => tool_calls.push(ToolCall {
                id: call.id.clone(),
                name: call.function.name.clone(),
                arguments: call.function.arguments.clone(),
            }),
            _ => {}
        }
    }

    Ok(ModelReply {
        content: (!texts.is_empty()).then(|| texts.join("\n")),
        tool_calls,
    })
}
