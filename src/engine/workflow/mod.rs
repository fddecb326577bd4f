use std::future::Future;
use std::time::{Duration, Instant};

use anyhow::Result;
use serde::{Deserialize, Serialize};
use tracing::{Instrument, info, info_span, warn};
use uuid::Uuid;

use crate::config::Config;
use crate::engine::browser::Neighbourhood;
use crate::engine::context::EngineContext;
use crate::engine::reconciler::DualReconciliation;
use crate::error::CodingResult;
use crate::types::{
    CatalogListing, FinalCodingPackage, SearchStatus, UnifiedResponse, UnifiedResultItem,
};

/// 运行模式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CodingMode {
    /// 单模型 CCI 增强检索
    #[default]
    Cci,
    /// 双模型 CCI 对比
    Dual,
    /// ICD-10-CA 编码智能体
    Icd,
    /// CCI 相似检索，不调用模型
    Search,
    /// ICD-10-CA 相似检索，不调用模型
    IcdSearch,
    /// 按 CCI 编码精确查找
    Lookup,
    /// ICD-10-CA 区段查询
    Range,
    /// ICD-10-CA 编码前后的目录条目
    Context,
    Above,
    Below,
}

impl CodingMode {
    pub const ALL: [CodingMode; 10] = [
        CodingMode::Cci,
        CodingMode::Dual,
        CodingMode::Icd,
        CodingMode::Search,
        CodingMode::IcdSearch,
        CodingMode::Lookup,
        CodingMode::Range,
        CodingMode::Context,
        CodingMode::Above,
        CodingMode::Below,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CodingMode::Cci => "cci",
            CodingMode::Dual => "dual",
            CodingMode::Icd => "icd",
            CodingMode::Search => "search",
            CodingMode::IcdSearch => "icd-search",
            CodingMode::Lookup => "lookup",
            CodingMode::Range => "range",
            CodingMode::Context => "context",
            CodingMode::Above => "above",
            CodingMode::Below => "below",
        }
    }

    /// 读取 ICD-10-CA 目录而不是 CCI 目录
    pub fn uses_icd_catalog(&self) -> bool {
        !matches!(
            self,
            CodingMode::Cci | CodingMode::Dual | CodingMode::Search | CodingMode::Lookup
        )
    }

    /// 需要构建模型客户端
    pub fn uses_model(&self) -> bool {
        matches!(self, CodingMode::Cci | CodingMode::Dual | CodingMode::Icd)
    }
}

impl std::fmt::Display for CodingMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for CodingMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase().replace('_', "-");
        CodingMode::ALL
            .into_iter()
            .find(|mode| mode.as_str() == wanted)
            .ok_or_else(|| format!("Unknown mode: {}", s))
    }
}

/// 一次编码请求
#[derive(Debug, Clone, PartialEq)]
pub struct CodingRequest {
    pub query: String,
    pub mode: CodingMode,
}

/// 双模型模式的响应
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DualResponse {
    pub status: SearchStatus,
    pub search_time_ms: u64,
    #[serde(flatten)]
    pub reconciliation: DualReconciliation,
}

/// 各模式的输出
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(untagged)]
pub enum CodingOutcome {
    Single(UnifiedResponse),
    Dual(DualResponse),
    Icd(FinalCodingPackage),
    Listing(CatalogListing),
}

/// 单模型：检索、组装、选择、合并
pub async fn run_single(context: &EngineContext, query: &str) -> CodingResult<UnifiedResponse> {
    let start = Instant::now();
    let selector = context.selector_a();

    let candidates = context
        .cci_retriever()
        .retrieve(query, context.config.retrieval.cci_candidate_limit)
        .await?;
    if candidates.is_empty() {
        return Ok(UnifiedResponse {
            backend: selector.backend_name().to_string(),
            status: SearchStatus::NotFound,
            items: Vec::new(),
            search_time_ms: elapsed_ms(start),
        });
    }

    let candidates = context.assembler().assemble(candidates);
    let items = context
        .enhancer()
        .enhance(query, &candidates, &selector)
        .await?;

    Ok(UnifiedResponse {
        backend: selector.backend_name().to_string(),
        status: status_of(items.iter()),
        items,
        search_time_ms: elapsed_ms(start),
    })
}

/// 双模型：同一候选池交给两个后端并对比
pub async fn run_dual(context: &EngineContext, query: &str) -> CodingResult<DualResponse> {
    let start = Instant::now();

    let candidates = context
        .cci_retriever()
        .retrieve(query, context.config.retrieval.cci_candidate_limit)
        .await?;
    let candidates = context.assembler().assemble(candidates);
    let reconciliation = context
        .reconciler()
        .reconcile(query, &candidates, &candidates)
        .await?;
    let status = status_of(
        reconciliation
            .items_a
            .iter()
            .chain(reconciliation.items_b.iter()),
    );

    Ok(DualResponse {
        status,
        search_time_ms: elapsed_ms(start),
        reconciliation,
    })
}

/// 按模式分派一次请求；浏览类模式只读目录，不调用模型
pub async fn execute(context: &EngineContext, request: &CodingRequest) -> CodingResult<CodingOutcome> {
    let query = request.query.as_str();
    let limits = &context.config.retrieval;

    let listing = match request.mode {
        CodingMode::Cci => return run_single(context, query).await.map(CodingOutcome::Single),
        CodingMode::Dual => return run_dual(context, query).await.map(CodingOutcome::Dual),
        CodingMode::Icd => {
            return context
                .orchestrator()
                .run(query)
                .await
                .map(CodingOutcome::Icd);
        }
        CodingMode::Search => {
            context
                .cci_browser()
                .search(query, limits.cci_candidate_limit)
                .await
        }
        CodingMode::IcdSearch => {
            context
                .icd_browser()
                .search(query, limits.icd_candidate_limit)
                .await
        }
        CodingMode::Lookup => context.cci_browser().lookup(query).await,
        CodingMode::Range => context.icd_browser().range(query).await,
        CodingMode::Context => {
            context
                .icd_browser()
                .neighbours(query, Neighbourhood::Around)
                .await
        }
        CodingMode::Above => {
            context
                .icd_browser()
                .neighbours(query, Neighbourhood::Above)
                .await
        }
        CodingMode::Below => {
            context
                .icd_browser()
                .neighbours(query, Neighbourhood::Below)
                .await
        }
    };
    listing.map(CodingOutcome::Listing)
}

/// 调用方重试策略：只重试可重试的错误，间隔指数增长
pub async fn retry_with_backoff<T, F, Fut>(
    attempts: u32,
    delay_ms: u64,
    mut operation: F,
) -> CodingResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = CodingResult<T>>,
{
    let attempts = attempts.max(1);
    let mut attempt = 1;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_retryable() && attempt < attempts => {
                let wait = delay_ms.saturating_mul(1u64 << (attempt - 1).min(16));
                warn!(attempt, attempts, wait_ms = wait, error = %e, "retrying request");
                tokio::time::sleep(Duration::from_millis(wait)).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

/// 启动一次编码请求
pub async fn launch(config: &Config, request: &CodingRequest) -> Result<CodingOutcome> {
    let request_id = Uuid::new_v4();
    let span = info_span!("coding_request", %request_id, mode = %request.mode);

    async {
        info!(query = %request.query, "coding request started");
        let context = EngineContext::load(config.clone(), request.mode).await?;

        let outcome = retry_with_backoff(
            config.model_a.retry_attempts,
            config.model_a.retry_delay_ms,
            || execute(&context, request),
        )
        .await?;
        Ok::<_, anyhow::Error>(outcome)
    }
    .instrument(span)
    .await
}

/// 至少有一个编码被模型选中才算命中
fn status_of<'a>(mut items: impl Iterator<Item = &'a UnifiedResultItem>) -> SearchStatus {
    if items.any(|item| item.is_chosen) {
        SearchStatus::Matched
    } else {
        SearchStatus::NotFound
    }
}

fn elapsed_ms(start: Instant) -> u64 {
    start.elapsed().as_millis() as u64
}
