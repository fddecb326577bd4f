use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use rig::completion::ToolDefinition;
use tracing::info;

use crate::cache::AttributeDefinitionCache;
use crate::catalog::{CatalogStore, JsonAttributeSource, JsonCatalogStore};
use crate::config::{Config, LLMConfig};
use crate::engine::agentic::AgenticCodingOrchestrator;
use crate::engine::assembler::RubricAssembler;
use crate::engine::browser::CatalogBrowser;
use crate::engine::enhancer::SingleModelEnhancer;
use crate::engine::prompt::CCI_DOMAIN_RULES;
use crate::engine::reconciler::DualModelReconciler;
use crate::engine::retriever::CandidateRetriever;
use crate::engine::selector::ModelSelector;
use crate::engine::workflow::CodingMode;
use crate::error::{CodingError, CodingResult};
use crate::llm::client::{ChatMessage, LLMClient, LlmBackend, ModelReply};

/// 引擎上下文：请求之间共享的只读依赖
#[derive(Clone)]
pub struct EngineContext {
    /// 配置
    pub config: Config,
    /// CCI 目录
    pub cci_store: Arc<dyn CatalogStore>,
    /// ICD-10-CA 目录
    pub icd_store: Arc<dyn CatalogStore>,
    /// 属性定义缓存，启动时加载一次
    pub attribute_cache: Arc<AttributeDefinitionCache>,
    /// 主模型
    pub model_a: Arc<dyn LlmBackend>,
    /// 对比模型
    pub model_b: Arc<dyn LlmBackend>,
}

impl EngineContext {
    /// 按运行模式加载所需的目录与模型客户端
    pub async fn load(config: Config, mode: CodingMode) -> Result<Self> {
        let empty: Arc<dyn CatalogStore> = Arc::new(JsonCatalogStore::default());

        let (cci_store, attribute_cache) = if mode.uses_icd_catalog() {
            (empty.clone(), AttributeDefinitionCache::default())
        } else {
            let store = JsonCatalogStore::from_file(&config.catalog.cci_catalog_path).await?;
            info!(records = store.len(), "CCI catalog loaded");
            let source = JsonAttributeSource::new(&config.catalog.attribute_definitions_path);
            let cache = AttributeDefinitionCache::load_or_empty(&source).await;
            (Arc::new(store) as Arc<dyn CatalogStore>, cache)
        };

        let icd_store: Arc<dyn CatalogStore> = if mode.uses_icd_catalog() {
            let store = JsonCatalogStore::from_file(&config.catalog.icd_catalog_path).await?;
            info!(records = store.len(), "ICD-10-CA catalog loaded");
            Arc::new(store)
        } else {
            empty
        };

        let model_a = if mode.uses_model() {
            build_backend(&config.model_a)?
        } else {
            Arc::new(CatalogOnly) as Arc<dyn LlmBackend>
        };
        let model_b = if mode == CodingMode::Dual {
            build_backend(&config.model_b)?
        } else {
            model_a.clone()
        };

        Ok(Self::from_parts(
            config,
            cci_store,
            icd_store,
            Arc::new(attribute_cache),
            model_a,
            model_b,
        ))
    }

    pub fn from_parts(
        config: Config,
        cci_store: Arc<dyn CatalogStore>,
        icd_store: Arc<dyn CatalogStore>,
        attribute_cache: Arc<AttributeDefinitionCache>,
        model_a: Arc<dyn LlmBackend>,
        model_b: Arc<dyn LlmBackend>,
    ) -> Self {
        Self {
            config,
            cci_store,
            icd_store,
            attribute_cache,
            model_a,
            model_b,
        }
    }

    pub fn cci_retriever(&self) -> CandidateRetriever {
        CandidateRetriever::new(self.cci_store.clone())
    }

    pub fn assembler(&self) -> RubricAssembler {
        RubricAssembler::new(self.attribute_cache.clone())
    }

    pub fn cci_browser(&self) -> CatalogBrowser {
        CatalogBrowser::new(self.cci_store.clone(), self.assembler())
    }

    pub fn icd_browser(&self) -> CatalogBrowser {
        CatalogBrowser::new(self.icd_store.clone(), self.assembler())
    }

    pub fn enhancer(&self) -> SingleModelEnhancer {
        let rules = self
            .config
            .selection
            .domain_rules
            .as_deref()
            .unwrap_or(CCI_DOMAIN_RULES);
        SingleModelEnhancer::new(self.config.selection.max_results, rules)
    }

    pub fn selector_a(&self) -> ModelSelector {
        ModelSelector::new(self.model_a.clone())
    }

    pub fn reconciler(&self) -> DualModelReconciler {
        DualModelReconciler::new(
            self.enhancer(),
            ModelSelector::new(self.model_a.clone()),
            ModelSelector::new(self.model_b.clone()),
        )
    }

    pub fn orchestrator(&self) -> AgenticCodingOrchestrator {
        AgenticCodingOrchestrator::new(
            self.icd_store.clone(),
            self.model_a.clone(),
            &self.config.agent,
            self.config.retrieval.icd_candidate_limit,
        )
    }
}

/// 后端以 provider 名称标注
fn build_backend(config: &LLMConfig) -> Result<Arc<dyn LlmBackend>> {
    let client = LLMClient::new(config.provider.to_string(), config.clone())?;
    Ok(Arc::new(client))
}

/// 浏览类模式不调用模型，也就不需要凭据
struct CatalogOnly;

#[async_trait]
impl LlmBackend for CatalogOnly {
    fn name(&self) -> &str {
        "catalog"
    }

    async fn complete(
        &self,
        _messages: &[ChatMessage],
        _tools: &[ToolDefinition],
    ) -> CodingResult<ModelReply> {
        Err(CodingError::llm("catalog", "browsing modes do not call a model"))
    }
}
