//! 基于 JSON 文件的内存目录，替代外部向量库用于本地运行与测试

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use super::code::{compare_codes, in_block_range};
use super::{AttributeDefinitionSource, CatalogStore};
use crate::error::{CodingError, CodingResult};
use crate::types::{AttributeDefinition, AttributeDomain, CatalogRecord, ScoredRecord};

const STOP_WORDS: &[&str] = &[
    "a", "an", "and", "by", "for", "in", "of", "on", "or", "the", "to", "with",
];

/// 内存目录，记录加载后只读
#[derive(Debug, Clone, Default)]
pub struct JsonCatalogStore {
    records: Vec<IndexedRecord>,
}

#[derive(Debug, Clone)]
struct IndexedRecord {
    record: CatalogRecord,
    tokens: HashSet<String>,
}

impl JsonCatalogStore {
    pub fn new(records: Vec<CatalogRecord>) -> Self {
        let records = records
            .into_iter()
            .map(|record| {
                let mut text = format!("{} {}", record.code, record.description);
                for line in record.includes.iter().chain(record.notes.iter()) {
                    text.push(' ');
                    text.push_str(line);
                }
                IndexedRecord {
                    tokens: tokenize(&text),
                    record,
                }
            })
            .collect();
        Self { records }
    }

    /// 从 JSON 数组文件加载目录
    pub async fn from_file(path: &Path) -> Result<Self> {
        let content = tokio::fs::read_to_string(path)
            .await
            .context(format!("Failed to read catalog file: {:?}", path))?;
        let records: Vec<CatalogRecord> = serde_json::from_str(&content)
            .context(format!("Failed to parse catalog file: {:?}", path))?;
        Ok(Self::new(records))
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

fn tokenize(text: &str) -> HashSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .map(|t| t.to_lowercase())
        .filter(|t| !t.is_empty() && !STOP_WORDS.contains(&t.as_str()))
        .collect()
}

#[async_trait]
impl CatalogStore for JsonCatalogStore {
    async fn similarity_search(
        &self,
        query: &str,
        limit: usize,
    ) -> CodingResult<Vec<ScoredRecord>> {
        let query_tokens = tokenize(query);
        if query_tokens.is_empty() {
            return Ok(Vec::new());
        }

        let mut scored: Vec<ScoredRecord> = self
            .records
            .iter()
            .filter_map(|indexed| {
                let hits = query_tokens
                    .iter()
                    .filter(|t| indexed.tokens.contains(*t))
                    .count();
                (hits > 0).then(|| ScoredRecord {
                    record: indexed.record.clone(),
                    score: hits as f64 / query_tokens.len() as f64,
                })
            })
            .collect();

        scored.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then_with(|| compare_codes(&a.record.code, &b.record.code))
        });
        scored.truncate(limit);
        Ok(scored)
    }

    async fn find_exact(&self, code: &str) -> CodingResult<Option<CatalogRecord>> {
        let code = code.trim();
        Ok(self
            .records
            .iter()
            .find(|r| r.record.code.eq_ignore_ascii_case(code))
            .map(|r| r.record.clone()))
    }

    async fn find_by_range(&self, start: &str, end: &str) -> CodingResult<Vec<CatalogRecord>> {
        let mut found: Vec<CatalogRecord> = self
            .records
            .iter()
            .filter(|r| in_block_range(&r.record.code, start, end))
            .map(|r| r.record.clone())
            .collect();
        found.sort_by(|a, b| compare_codes(&a.code, &b.code));
        Ok(found)
    }

    async fn list_sorted(&self) -> CodingResult<Vec<CatalogRecord>> {
        let mut all: Vec<CatalogRecord> = self.records.iter().map(|r| r.record.clone()).collect();
        all.sort_by(|a, b| compare_codes(&a.code, &b.code));
        Ok(all)
    }
}

#[derive(Debug, Deserialize)]
struct DefinitionEntry {
    code: String,
    #[serde(alias = "description")]
    desc: String,
}

/// 读取 `{ "status": [{code, desc}], "location": [...], "extent": [...] }` 形态的属性文档
#[derive(Debug, Clone)]
pub struct JsonAttributeSource {
    path: PathBuf,
}

impl JsonAttributeSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// 解析属性文档，未知分组（如 `_id`）忽略
    pub fn parse(content: &str) -> CodingResult<Vec<AttributeDefinition>> {
        let doc: serde_json::Map<String, Value> = serde_json::from_str(content)
            .map_err(|e| CodingError::RetrievalFailure(format!("attribute document: {}", e)))?;

        let mut definitions = Vec::new();
        for (group, value) in doc {
            let Some(domain) = AttributeDomain::from_group_name(&group) else {
                continue;
            };
            let entries: Vec<DefinitionEntry> = serde_json::from_value(value).map_err(|e| {
                CodingError::RetrievalFailure(format!("attribute group '{}': {}", group, e))
            })?;
            definitions.extend(entries.into_iter().map(|entry| AttributeDefinition {
                domain,
                code: entry.code,
                description: entry.desc,
            }));
        }
        Ok(definitions)
    }
}

#[async_trait]
impl AttributeDefinitionSource for JsonAttributeSource {
    async fn load_all(&self) -> CodingResult<Vec<AttributeDefinition>> {
        let content = tokio::fs::read_to_string(&self.path).await.map_err(|e| {
            CodingError::RetrievalFailure(format!("reading {:?}: {}", self.path, e))
        })?;
        Self::parse(&content)
    }
}
