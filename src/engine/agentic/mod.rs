//! ICD-10-CA 编码智能体：有界的多轮工具调用状态机

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use rig::tool::Tool;
use serde_json::{Value, json};
use tracing::{debug, info, warn};

use crate::catalog::CatalogStore;
use crate::config::AgentConfig;
use crate::engine::retriever::CandidateRetriever;
use crate::error::{CodingError, CodingResult};
use crate::llm::client::utils::{preview, strip_code_fences};
use crate::llm::client::{ChatMessage, LlmBackend, ToolCall};
use crate::llm::tools::{AgentToolCatalogRange, RangeArgs};
use crate::types::{AgentFinalPayload, CandidateItem, FinalCodingPackage, SearchStatus};

pub mod prompt;
pub mod validation;

use validation::CodeValidator;

const NOT_FOUND_SUMMARY: &str = "No relevant ICD-10-CA codes were found for the provided term.";

/// 单个请求的状态；失败直接以 `Err` 结束循环
#[derive(Debug)]
enum AgentState {
    Retrieving,
    Prompting(Vec<CandidateItem>),
    AwaitingModel,
    ToolDispatch(Vec<ToolCall>),
    Finalizing(Option<String>),
    Validating(AgentFinalPayload),
    Done(FinalCodingPackage),
}

impl AgentState {
    fn name(&self) -> &'static str {
        match self {
            AgentState::Retrieving => "retrieving",
            AgentState::Prompting(_) => "prompting",
            AgentState::AwaitingModel => "awaiting_model",
            AgentState::ToolDispatch(_) => "tool_dispatch",
            AgentState::Finalizing(_) => "finalizing",
            AgentState::Validating(_) => "validating",
            AgentState::Done(_) => "done",
        }
    }
}

/// 诊断编码智能体
///
/// 模型调用次数以 `max_rounds` 为上限，超出即 `AgentExhausted`；工具调用严格串行执行。
pub struct AgenticCodingOrchestrator {
    retriever: CandidateRetriever,
    backend: Arc<dyn LlmBackend>,
    range_tool: AgentToolCatalogRange,
    validator: CodeValidator,
    candidate_limit: usize,
    max_rounds: usize,
}

impl AgenticCodingOrchestrator {
    pub fn new(
        store: Arc<dyn CatalogStore>,
        backend: Arc<dyn LlmBackend>,
        config: &AgentConfig,
        candidate_limit: usize,
    ) -> Self {
        Self {
            retriever: CandidateRetriever::new(store.clone()),
            range_tool: AgentToolCatalogRange::new(store.clone()),
            validator: CodeValidator::new(store, config.min_code_length),
            backend,
            candidate_limit,
            max_rounds: config.max_rounds,
        }
    }

    pub async fn run(&self, query: &str) -> CodingResult<FinalCodingPackage> {
        let start = Instant::now();
        let tools = vec![self.range_tool.definition(String::new()).await];

        let mut messages: Vec<ChatMessage> = Vec::new();
        let mut rounds = 0usize;
        let mut state = AgentState::Retrieving;

        loop {
            debug!(state = state.name(), rounds, "agent state");
            state = match state {
                AgentState::Retrieving => {
                    let candidates = self.retriever.retrieve(query, self.candidate_limit).await?;
                    if candidates.is_empty() {
                        info!("no ICD candidates found");
                        AgentState::Done(not_found_package(start, rounds))
                    } else {
                        AgentState::Prompting(candidates)
                    }
                }
                AgentState::Prompting(candidates) => {
                    if prompt::needs_infection_rule(query) {
                        info!("infection keywords detected, adding drug-resistance rule");
                    }
                    messages.push(ChatMessage::user(prompt::build_icd_prompt(
                        query,
                        &candidates,
                        AgentToolCatalogRange::NAME,
                    )));
                    AgentState::AwaitingModel
                }
                AgentState::AwaitingModel => {
                    if rounds >= self.max_rounds {
                        warn!(rounds, "agent exhausted its round budget");
                        return Err(CodingError::AgentExhausted { rounds });
                    }
                    rounds += 1;

                    let reply = self.backend.complete(&messages, &tools).await?;
                    if reply.wants_tools() {
                        messages.push(ChatMessage::Assistant {
                            content: reply.content.clone(),
                            tool_calls: reply.tool_calls.clone(),
                        });
                        AgentState::ToolDispatch(reply.tool_calls)
                    } else {
                        AgentState::Finalizing(reply.content)
                    }
                }
                AgentState::ToolDispatch(calls) => {
                    for call in calls {
                        let output = self.dispatch(&call).await?;
                        messages.push(ChatMessage::tool(call.id, output.to_string()));
                    }
                    AgentState::AwaitingModel
                }
                AgentState::Finalizing(content) => {
                    AgentState::Validating(parse_final_payload(content.as_deref())?)
                }
                AgentState::Validating(payload) => {
                    let outcome = self.validator.validate(payload.results).await?;
                    let status = if outcome.results.is_empty() {
                        SearchStatus::NotFound
                    } else {
                        SearchStatus::Matched
                    };
                    AgentState::Done(FinalCodingPackage {
                        status,
                        results: outcome.results,
                        summary: payload.summary,
                        processing_time_ms: elapsed_ms(start),
                        rounds_used: rounds,
                        discarded_codes: outcome.discarded,
                        generated_at: Utc::now(),
                    })
                }
                AgentState::Done(package) => {
                    info!(
                        results = package.results.len(),
                        rounds = package.rounds_used,
                        elapsed_ms = package.processing_time_ms,
                        "coding package ready"
                    );
                    return Ok(package);
                }
            };
        }
    }

    /// 执行一次工具调用；未知工具与参数错误以 `{"error": ...}` 返回给模型
    async fn dispatch(&self, call: &ToolCall) -> CodingResult<Value> {
        if call.name != AgentToolCatalogRange::NAME {
            warn!(tool = %call.name, "model requested an unknown tool");
            return Ok(json!({ "error": format!("Unknown tool called: {}", call.name) }));
        }

        let args = match parse_arguments::<RangeArgs>(&call.arguments) {
            Ok(args) if args.start.trim().is_empty() || args.end.trim().is_empty() => {
                warn!(tool = %call.name, "empty range bounds");
                return Ok(json!({ "error": "Invalid arguments: range bounds must not be empty" }));
            }
            Ok(args) => args,
            Err(e) => {
                warn!(tool = %call.name, error = %e, "malformed tool arguments");
                return Ok(json!({ "error": format!("Invalid arguments: {}", e) }));
            }
        };

        info!(start = %args.start, end = %args.end, "fetching ICD block range");
        let entries = self.range_tool.fetch(&args).await?;
        serde_json::to_value(entries).map_err(|e| {
            CodingError::RetrievalFailure(format!("range result could not be encoded: {}", e))
        })
    }
}

/// 部分 provider 把参数作为 JSON 字符串传回
fn parse_arguments<T: serde::de::DeserializeOwned>(arguments: &Value) -> serde_json::Result<T> {
    match arguments {
        Value::String(raw) => serde_json::from_str(raw),
        other => serde_json::from_value(other.clone()),
    }
}

fn parse_final_payload(content: Option<&str>) -> CodingResult<AgentFinalPayload> {
    let content = content
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .ok_or_else(|| CodingError::ResponseParse("agent returned an empty final response".into()))?;

    let cleaned = strip_code_fences(content);
    serde_json::from_str(&cleaned).map_err(|e| {
        CodingError::ResponseParse(format!(
            "final package is not valid JSON ({}): {}",
            e,
            preview(&cleaned, 200)
        ))
    })
}

fn not_found_package(start: Instant, rounds: usize) -> FinalCodingPackage {
    FinalCodingPackage {
        status: SearchStatus::NotFound,
        results: Vec::new(),
        summary: NOT_FOUND_SUMMARY.to_string(),
        processing_time_ms: elapsed_ms(start),
        rounds_used: rounds,
        discarded_codes: Vec::new(),
        generated_at: Utc::now(),
    }
}

fn elapsed_ms(start: Instant) -> u64 {
    start.elapsed().as_millis() as u64
}
