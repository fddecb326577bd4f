//! 不经过模型的目录浏览：精确查找、区段、相似检索与编码上下文

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info};

use crate::catalog::CatalogStore;
use crate::catalog::code::rubric_base;
use crate::engine::assembler::RubricAssembler;
use crate::engine::retriever::CandidateRetriever;
use crate::error::{CodingError, CodingResult};
use crate::types::{CandidateItem, CatalogListing, CatalogRecord, SearchStatus};

/// 编码上下文窗口的单侧条数
pub const NEIGHBOUR_WINDOW: usize = 30;

/// 相对某个编码的浏览方向
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Neighbourhood {
    /// 前后各取一个窗口，包含编码本身
    Around,
    /// 只取之前的窗口
    Above,
    /// 只取之后的窗口
    Below,
}

/// 目录浏览器
#[derive(Clone)]
pub struct CatalogBrowser {
    store: Arc<dyn CatalogStore>,
    assembler: RubricAssembler,
}

impl CatalogBrowser {
    pub fn new(store: Arc<dyn CatalogStore>, assembler: RubricAssembler) -> Self {
        Self { store, assembler }
    }

    /// 按编码精确查找；带限定符的完整编码先截到三段基础编码
    pub async fn lookup(&self, code: &str) -> CodingResult<CatalogListing> {
        let start = Instant::now();
        let code = non_empty(code)?;
        let base = rubric_base(code);

        let items = match self.store.find_exact(&base).await? {
            Some(record) => vec![self.assembler.assemble_record(record)],
            None => Vec::new(),
        };
        debug!(code, base, found = !items.is_empty(), "exact lookup finished");
        Ok(listing(items, start))
    }

    /// 相似检索后直接组装，不做模型选择
    pub async fn search(&self, query: &str, limit: usize) -> CodingResult<CatalogListing> {
        let start = Instant::now();
        let candidates = CandidateRetriever::new(self.store.clone())
            .retrieve(query, limit)
            .await?;
        Ok(listing(self.assembler.assemble(candidates), start))
    }

    /// 区段查询，接受 `START-END`、`START:END` 或单个编码
    pub async fn range(&self, query: &str) -> CodingResult<CatalogListing> {
        let start = Instant::now();
        let (from, to) = parse_bounds(non_empty(query)?)?;

        let records = self.store.find_by_range(from, to).await?;
        info!(from, to, hits = records.len(), "range lookup finished");
        Ok(listing(self.assemble_all(records), start))
    }

    /// 目录顺序中某编码前后的条目；编码不存在时为 not_found
    pub async fn neighbours(
        &self,
        code: &str,
        direction: Neighbourhood,
    ) -> CodingResult<CatalogListing> {
        let start = Instant::now();
        let code = non_empty(code)?;

        let mut all = self.store.list_sorted().await?;
        let Some(index) = all.iter().position(|r| r.code.eq_ignore_ascii_case(code)) else {
            debug!(code, "code not present in catalog");
            return Ok(listing(Vec::new(), start));
        };

        let lo = index.saturating_sub(NEIGHBOUR_WINDOW);
        let hi = (index + NEIGHBOUR_WINDOW + 1).min(all.len());
        let window = match direction {
            Neighbourhood::Around => lo..hi,
            Neighbourhood::Above => lo..index,
            Neighbourhood::Below => index + 1..hi,
        };
        let records: Vec<CatalogRecord> = all.drain(window).collect();
        Ok(listing(self.assemble_all(records), start))
    }

    fn assemble_all(&self, records: Vec<CatalogRecord>) -> Vec<CandidateItem> {
        records
            .into_iter()
            .map(|record| self.assembler.assemble_record(record))
            .collect()
    }
}

fn non_empty(value: &str) -> CodingResult<&str> {
    let value = value.trim();
    if value.is_empty() {
        Err(CodingError::EmptyQuery)
    } else {
        Ok(value)
    }
}

fn parse_bounds(query: &str) -> CodingResult<(&str, &str)> {
    match query.split_once(['-', ':']) {
        Some((from, to)) => {
            let (from, to) = (from.trim(), to.trim());
            if from.is_empty() || to.is_empty() {
                return Err(CodingError::EmptyQuery);
            }
            Ok((from, to))
        }
        None => Ok((query, query)),
    }
}

fn listing(items: Vec<CandidateItem>, start: Instant) -> CatalogListing {
    let status = if items.is_empty() {
        SearchStatus::NotFound
    } else {
        SearchStatus::Matched
    };
    CatalogListing {
        status,
        items,
        search_time_ms: start.elapsed().as_millis() as u64,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::AttributeDefinitionCache;
    use crate::catalog::JsonCatalogStore;

    fn browser(codes: &[&str]) -> CatalogBrowser {
        let records = codes
            .iter()
            .map(|code| CatalogRecord::new(*code, format!("rubric {}", code)))
            .collect();
        CatalogBrowser::new(
            Arc::new(JsonCatalogStore::new(records)),
            RubricAssembler::new(Arc::new(AttributeDefinitionCache::default())),
        )
    }

    fn codes(listing: &CatalogListing) -> Vec<&str> {
        listing.items.iter().map(|item| item.code()).collect()
    }

    #[test]
    fn test_parse_bounds() {
        assert_eq!(parse_bounds("B95-B97").unwrap(), ("B95", "B97"));
        assert_eq!(parse_bounds("B95 : B97").unwrap(), ("B95", "B97"));
        assert_eq!(parse_bounds("K35.8").unwrap(), ("K35.8", "K35.8"));
        assert!(matches!(parse_bounds("B95-"), Err(CodingError::EmptyQuery)));
    }

    #[tokio::test]
    async fn test_lookup_strips_qualifier() {
        let browser = browser(&["1.NT.89", "1.NT.87"]);

        let hit = browser.lookup(" 1.NT.89.LA ").await.unwrap();
        assert_eq!(hit.status, SearchStatus::Matched);
        assert_eq!(codes(&hit), vec!["1.NT.89"]);
        assert_eq!(hit.items[0].similarity_score, 0.0);

        let miss = browser.lookup("1.NT.90").await.unwrap();
        assert_eq!(miss.status, SearchStatus::NotFound);
        assert!(miss.items.is_empty());

        assert!(matches!(browser.lookup("  ").await, Err(CodingError::EmptyQuery)));
    }

    #[tokio::test]
    async fn test_range_is_sorted() {
        let browser = browser(&["B97.8", "B95.6", "B96.2", "B98"]);

        let listing = browser.range("B95-B97").await.unwrap();
        assert_eq!(codes(&listing), vec!["B95.6", "B96.2", "B97.8"]);

        let empty = browser.range("C00:C10").await.unwrap();
        assert_eq!(empty.status, SearchStatus::NotFound);
    }

    #[tokio::test]
    async fn test_neighbour_windows_clip_at_edges() {
        let all: Vec<String> = (1..=70).map(|n| format!("A{:02}", n)).collect();
        let refs: Vec<&str> = all.iter().map(String::as_str).collect();
        let browser = browser(&refs);

        let around = browser.neighbours("a05", Neighbourhood::Around).await.unwrap();
        assert_eq!(around.items.len(), 5 + 30);
        assert_eq!(around.items[0].code(), "A01");
        assert_eq!(around.items[4].code(), "A05");

        let above = browser.neighbours("A40", Neighbourhood::Above).await.unwrap();
        assert_eq!(above.items.len(), NEIGHBOUR_WINDOW);
        assert_eq!(above.items.first().map(|i| i.code()), Some("A10"));
        assert_eq!(above.items.last().map(|i| i.code()), Some("A39"));

        let below = browser.neighbours("A60", Neighbourhood::Below).await.unwrap();
        assert_eq!(codes(&below), refs[60..].to_vec());

        let top = browser.neighbours("A01", Neighbourhood::Above).await.unwrap();
        assert_eq!(top.status, SearchStatus::NotFound);

        let missing = browser.neighbours("Z99", Neighbourhood::Around).await.unwrap();
        assert_eq!(missing.status, SearchStatus::NotFound);
    }

    #[tokio::test]
    async fn test_search_skips_model_selection() {
        let browser = browser(&["1.NT.89", "1.NT.87"]);
        let listing = browser.search("rubric 1.NT.89", 10).await.unwrap();
        assert_eq!(listing.status, SearchStatus::Matched);
        assert_eq!(listing.items[0].code(), "1.NT.89");

        assert!(matches!(browser.search("", 10).await, Err(CodingError::EmptyQuery)));
    }
}
