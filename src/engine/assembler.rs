use std::sync::Arc;

use tracing::warn;

use crate::cache::AttributeDefinitionCache;
use crate::types::{
    AttributeDomain, CandidateItem, Cardinality, CatalogRecord, ResolvedAttribute,
};

/// 不适用维度的合成属性码
pub const NOT_APPLICABLE_CODE: &str = "/";
/// 可选维度下没有适用属性时模型返回的标记
pub const NONE_APPLIES_CODE: &str = "-";

/// 为候选项解析属性描述
///
/// 纯函数，只读取缓存中的参考数据；缺失的定义用占位描述填充，绝不让请求失败。
#[derive(Clone)]
pub struct RubricAssembler {
    cache: Arc<AttributeDefinitionCache>,
}

impl RubricAssembler {
    pub fn new(cache: Arc<AttributeDefinitionCache>) -> Self {
        Self { cache }
    }

    pub fn assemble(&self, candidates: Vec<CandidateItem>) -> Vec<CandidateItem> {
        candidates
            .into_iter()
            .map(|mut candidate| {
                candidate.attributes = self.resolve(&candidate.record);
                candidate
            })
            .collect()
    }

    /// 精确查找命中的单条记录，相似度记为 0
    pub fn assemble_record(&self, record: CatalogRecord) -> CandidateItem {
        let attributes = self.resolve(&record);
        CandidateItem {
            record,
            similarity_score: 0.0,
            attributes,
        }
    }

    fn resolve(&self, record: &CatalogRecord) -> Vec<ResolvedAttribute> {
        let mut resolved = Vec::new();

        for (label, spec) in &record.attributes {
            let Some(domain) = AttributeDomain::from_label(label) else {
                warn!(code = %record.code, domain = %label, "skipping unknown attribute domain");
                continue;
            };

            if spec.cardinality == Cardinality::NotApplicable || spec.codes.is_empty() {
                resolved.push(ResolvedAttribute {
                    domain,
                    code: NOT_APPLICABLE_CODE.to_string(),
                    description: "N/A".to_string(),
                    cardinality: spec.cardinality,
                });
                continue;
            }

            for code in &spec.codes {
                let description = match self.cache.describe(domain, code) {
                    Some(description) => description.to_string(),
                    None => format!("Definition for {} not found", code),
                };
                resolved.push(ResolvedAttribute {
                    domain,
                    code: code.clone(),
                    description,
                    cardinality: spec.cardinality,
                });
            }
        }

        resolved
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AttributeDefinition, AttributeSpec};

    fn assembler() -> RubricAssembler {
        let cache = AttributeDefinitionCache::new(vec![
            AttributeDefinition {
                domain: AttributeDomain::Status,
                code: "RV".into(),
                description: "Revision".into(),
            },
            AttributeDefinition {
                domain: AttributeDomain::Location,
                code: "L".into(),
                description: "Left".into(),
            },
        ]);
        RubricAssembler::new(Arc::new(cache))
    }

    fn spec(cardinality: Cardinality, codes: &[&str]) -> AttributeSpec {
        AttributeSpec {
            cardinality,
            codes: codes.iter().map(|c| c.to_string()).collect(),
        }
    }

    #[test]
    fn test_resolves_codes_and_placeholders() {
        let mut record = CatalogRecord::new("1.VG.53", "Implantation of internal device, knee");
        record
            .attributes
            .insert("S".into(), spec(Cardinality::Optional, &["RV", "XX"]));
        record
            .attributes
            .insert("L".into(), spec(Cardinality::Mandatory, &["L"]));

        let item = assembler().assemble_record(record);
        assert_eq!(item.similarity_score, 0.0);
        assert_eq!(item.attributes.len(), 3);

        let rv = item.attributes.iter().find(|a| a.code == "RV").unwrap();
        assert_eq!(rv.description, "Revision");
        assert_eq!(rv.cardinality, Cardinality::Optional);

        let missing = item.attributes.iter().find(|a| a.code == "XX").unwrap();
        assert_eq!(missing.description, "Definition for XX not found");

        let left = item.attributes.iter().find(|a| a.code == "L").unwrap();
        assert_eq!(left.domain, AttributeDomain::Location);
        assert_eq!(left.description, "Left");
    }

    #[test]
    fn test_not_applicable_domain_is_synthetic() {
        let mut record = CatalogRecord::new("1.NT.89", "Excision total, appendix");
        record
            .attributes
            .insert("E".into(), spec(Cardinality::NotApplicable, &["ignored"]));

        let item = assembler().assemble_record(record);
        assert_eq!(item.attributes.len(), 1);
        assert_eq!(item.attributes[0].code, NOT_APPLICABLE_CODE);
        assert_eq!(item.attributes[0].description, "N/A");
        assert_eq!(item.attributes[0].cardinality, Cardinality::NotApplicable);
    }

    #[test]
    fn test_unknown_domain_skipped() {
        let mut record = CatalogRecord::new("1.NT.89", "Excision total, appendix");
        record
            .attributes
            .insert("Q".into(), spec(Cardinality::Mandatory, &["A"]));

        let item = assembler().assemble_record(record);
        assert!(item.attributes.is_empty());
    }

    #[test]
    fn test_assemble_keeps_scores_and_order() {
        let candidates = vec![
            CandidateItem {
                record: CatalogRecord::new("1.NT.89", "a"),
                similarity_score: 0.9,
                attributes: Vec::new(),
            },
            CandidateItem {
                record: CatalogRecord::new("1.NT.87", "b"),
                similarity_score: 0.4,
                attributes: Vec::new(),
            },
        ];
        let out = assembler().assemble(candidates);
        assert_eq!(out[0].code(), "1.NT.89");
        assert_eq!(out[1].similarity_score, 0.4);
    }
}
