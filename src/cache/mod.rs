use std::collections::HashMap;

use tracing::{info, warn};

use crate::catalog::AttributeDefinitionSource;
use crate::error::CodingResult;
use crate::types::{AttributeDefinition, AttributeDomain};

/// 属性定义缓存
///
/// 生命周期：进程启动时通过 [`AttributeDefinitionCache::load`] 加载一次，
/// 之后只读，以 `Arc` 注入各组件，可被任意数量的请求并发读取，无需加锁。
#[derive(Debug, Default, Clone)]
pub struct AttributeDefinitionCache {
    definitions: HashMap<(AttributeDomain, String), String>,
}

impl AttributeDefinitionCache {
    pub fn new(definitions: Vec<AttributeDefinition>) -> Self {
        let definitions = definitions
            .into_iter()
            .map(|d| ((d.domain, d.code), d.description))
            .collect();
        Self { definitions }
    }

    /// 从定义来源加载全部属性定义
    pub async fn load(source: &dyn AttributeDefinitionSource) -> CodingResult<Self> {
        let definitions = source.load_all().await?;
        info!(count = definitions.len(), "attribute definitions cached");
        Ok(Self::new(definitions))
    }

    /// 加载失败时退化为空缓存，缺失的定义由组装器用占位描述填充
    pub async fn load_or_empty(source: &dyn AttributeDefinitionSource) -> Self {
        match Self::load(source).await {
            Ok(cache) => cache,
            Err(e) => {
                warn!(error = %e, "failed to load attribute definitions, continuing without them");
                Self::default()
            }
        }
    }

    pub fn describe(&self, domain: AttributeDomain, code: &str) -> Option<&str> {
        self.definitions
            .get(&(domain, code.to_string()))
            .map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }
}
