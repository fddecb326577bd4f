use std::sync::Arc;

use tracing::{debug, warn};

use crate::catalog::CatalogStore;
use crate::error::{CodingError, CodingResult};
use crate::types::{CatalogRecord, FinalCodingResult};

/// 校验结果
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationOutcome {
    pub results: Vec<FinalCodingResult>,
    /// 没有任何有效祖先而被丢弃的原始编码
    pub discarded: Vec<String>,
}

/// 对最终结果中的每个编码做目录校验与自我修正
#[derive(Clone)]
pub struct CodeValidator {
    store: Arc<dyn CatalogStore>,
    min_code_length: usize,
}

impl CodeValidator {
    pub fn new(store: Arc<dyn CatalogStore>, min_code_length: usize) -> Self {
        Self {
            store,
            min_code_length: min_code_length.max(1),
        }
    }

    /// 全部结果都被丢弃时返回 `CodeValidation`
    pub async fn validate(&self, results: Vec<FinalCodingResult>) -> CodingResult<ValidationOutcome> {
        let submitted = results.len();
        let mut kept: Vec<FinalCodingResult> = Vec::with_capacity(submitted);
        let mut discarded = Vec::new();

        for result in results {
            let original = result.code.trim().to_string();

            let resolved = match self.store.find_exact(&original).await? {
                Some(record) => Some(enrich(result, record)),
                None => match self.nearest_ancestor(&original).await? {
                    Some(record) => {
                        warn!(from = %original, to = %record.code, "hallucinated code corrected to ancestor");
                        let mut corrected = enrich(result, record);
                        corrected.rationale = format!(
                            "[System correction: code {} does not exist in the catalog and was replaced by its nearest valid ancestor {}.] {}",
                            original, corrected.code, corrected.rationale
                        );
                        Some(corrected)
                    }
                    None => None,
                },
            };

            match resolved {
                // 同一编码只保留第一次出现的结果
                Some(entry) if kept.iter().any(|k| k.code == entry.code) => {
                    debug!(from = %original, code = %entry.code, "duplicate code dropped");
                }
                Some(entry) => kept.push(entry),
                None => {
                    warn!(code = %original, "hallucinated code discarded, no valid ancestor");
                    discarded.push(original);
                }
            }
        }

        if submitted > 0 && kept.is_empty() {
            return Err(CodingError::CodeValidation { codes: discarded });
        }

        Ok(ValidationOutcome {
            results: kept,
            discarded,
        })
    }

    /// 逐个去掉末尾字符重新查找，直到长度小于下限
    async fn nearest_ancestor(&self, code: &str) -> CodingResult<Option<CatalogRecord>> {
        let mut ancestor = code.to_string();
        while ancestor.pop().is_some() {
            if ancestor.chars().count() < self.min_code_length {
                break;
            }
            if ancestor.ends_with('.') {
                continue;
            }
            debug!(ancestor = %ancestor, "looking up ancestor");
            if let Some(record) = self.store.find_exact(&ancestor).await? {
                return Ok(Some(record));
            }
        }
        Ok(None)
    }
}

/// 用目录中的规范描述与说明字段覆盖模型给出的内容
fn enrich(mut result: FinalCodingResult, record: CatalogRecord) -> FinalCodingResult {
    result.code = record.code;
    result.description = record.description;
    result.includes = record.includes;
    result.excludes = record.excludes;
    result.notes = record.notes;
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::JsonCatalogStore;

    fn validator() -> CodeValidator {
        let mut z99 = CatalogRecord::new("Z99", "Dependence on enabling machines and devices");
        z99.notes.push("Excludes: dependence on cardiac pacemaker".into());
        let store = JsonCatalogStore::new(vec![
            z99,
            CatalogRecord::new("B95.6", "Staphylococcus aureus"),
        ]);
        CodeValidator::new(Arc::new(store), 3)
    }

    fn result(code: &str) -> FinalCodingResult {
        FinalCodingResult {
            code: code.into(),
            description: "model text".into(),
            rationale: "because".into(),
            diagnosis_type: "M".into(),
            diagnosis_cluster: None,
            prefix: None,
            includes: Vec::new(),
            excludes: Vec::new(),
            notes: Vec::new(),
        }
    }

    #[tokio::test]
    async fn test_valid_code_enriched() {
        let outcome = validator().validate(vec![result("b95.6")]).await.unwrap();
        assert_eq!(outcome.results[0].code, "B95.6");
        assert_eq!(outcome.results[0].description, "Staphylococcus aureus");
        assert_eq!(outcome.results[0].rationale, "because");
        assert!(outcome.discarded.is_empty());
    }

    #[tokio::test]
    async fn test_corrects_to_ancestor() {
        let outcome = validator().validate(vec![result("Z99.XX")]).await.unwrap();
        let corrected = &outcome.results[0];
        assert_eq!(corrected.code, "Z99");
        assert!(corrected.rationale.starts_with("[System correction"));
        assert!(corrected.rationale.contains("Z99.XX"));
        assert!(corrected.rationale.ends_with("because"));
        assert_eq!(corrected.notes.len(), 1);
    }

    #[tokio::test]
    async fn test_discards_without_ancestor() {
        let outcome = validator()
            .validate(vec![result("Q12.345"), result("B95.6")])
            .await
            .unwrap();
        assert_eq!(outcome.results.len(), 1);
        assert_eq!(outcome.results[0].code, "B95.6");
        assert_eq!(outcome.discarded, vec!["Q12.345".to_string()]);
    }

    #[tokio::test]
    async fn test_all_discarded_is_error() {
        let err = validator()
            .validate(vec![result("Q12.345")])
            .await
            .unwrap_err();
        match err {
            CodingError::CodeValidation { codes } => assert_eq!(codes, vec!["Q12.345"]),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_min_length_bounds_search() {
        // "Z9" 短于下限，不会被当作 "Z99X" 的祖先查找
        let store = JsonCatalogStore::new(vec![CatalogRecord::new("Z9", "short")]);
        let validator = CodeValidator::new(Arc::new(store), 3);
        let err = validator.validate(vec![result("Z99X")]).await.unwrap_err();
        assert!(matches!(err, CodingError::CodeValidation { .. }));
    }

    #[tokio::test]
    async fn test_empty_results_pass_through() {
        let outcome = validator().validate(Vec::new()).await.unwrap();
        assert!(outcome.results.is_empty());
        assert!(outcome.discarded.is_empty());
    }

    #[tokio::test]
    async fn test_corrected_code_not_duplicated() {
        let outcome = validator()
            .validate(vec![result("Z99"), result("Z99.XX"), result("B95.6"), result("b95.6")])
            .await
            .unwrap();
        let codes: Vec<&str> = outcome.results.iter().map(|r| r.code.as_str()).collect();
        assert_eq!(codes, vec!["Z99", "B95.6"]);
        assert_eq!(outcome.results[0].rationale, "because");
        assert!(outcome.discarded.is_empty());

        let outcome = validator()
            .validate(vec![result("Z99.XX"), result("Z99")])
            .await
            .unwrap();
        assert_eq!(outcome.results.len(), 1);
        assert!(outcome.results[0].rationale.starts_with("[System correction"));
    }
}
