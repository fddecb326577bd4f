use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::types::catalog::AttributeDomain;
use crate::types::unified::{AppliedAttributes, UnifiedResultItem};

/// 两个后端在单个编码上的对比结果
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ComparisonDetail {
    pub code: String,
    #[serde(rename = "chosenByA")]
    pub chosen_by_a: bool,
    #[serde(rename = "chosenByB")]
    pub chosen_by_b: bool,
    pub qualifier_match: bool,
    #[serde(rename = "attributeMatch_S")]
    pub attribute_match_s: bool,
    #[serde(rename = "attributeMatch_L")]
    pub attribute_match_l: bool,
    #[serde(rename = "attributeMatch_E")]
    pub attribute_match_e: bool,
    pub full_match: bool,
    #[serde(rename = "attributesA")]
    pub attributes_a: Option<AppliedAttributes>,
    #[serde(rename = "attributesB")]
    pub attributes_b: Option<AppliedAttributes>,
}

impl ComparisonDetail {
    /// 比较两个后端为同一编码给出的结果
    ///
    /// 只有双方都选中该编码时才比较限定码与属性；单方选中时所有匹配项为 false。
    pub fn compare(
        code: &str,
        a: Option<&UnifiedResultItem>,
        b: Option<&UnifiedResultItem>,
    ) -> Self {
        let chosen_a = a.filter(|item| item.is_chosen);
        let chosen_b = b.filter(|item| item.is_chosen);

        let (qualifier_match, [s, l, e]) = match (chosen_a, chosen_b) {
            (Some(a), Some(b)) => {
                let qualifier_match = a.qualifier_code() == b.qualifier_code();
                let attrs = AttributeDomain::ALL.map(|domain| {
                    match (&a.applied_attributes, &b.applied_attributes) {
                        (Some(x), Some(y)) => x.code(domain) == y.code(domain),
                        _ => false,
                    }
                });
                (qualifier_match, attrs)
            }
            _ => (false, [false; 3]),
        };

        Self::new(
            code,
            chosen_a.is_some(),
            chosen_b.is_some(),
            qualifier_match,
            [s, l, e],
            chosen_a.and_then(|item| item.applied_attributes.clone()),
            chosen_b.and_then(|item| item.applied_attributes.clone()),
        )
    }

    /// full_match 始终由其余字段推导
    pub fn new(
        code: &str,
        chosen_by_a: bool,
        chosen_by_b: bool,
        qualifier_match: bool,
        attribute_matches: [bool; 3],
        attributes_a: Option<AppliedAttributes>,
        attributes_b: Option<AppliedAttributes>,
    ) -> Self {
        let [s, l, e] = attribute_matches;
        Self {
            code: code.to_string(),
            chosen_by_a,
            chosen_by_b,
            qualifier_match,
            attribute_match_s: s,
            attribute_match_l: l,
            attribute_match_e: e,
            full_match: chosen_by_a && chosen_by_b && qualifier_match && s && l && e,
            attributes_a,
            attributes_b,
        }
    }

    pub fn attribute_match(&self, domain: AttributeDomain) -> bool {
        match domain {
            AttributeDomain::Status => self.attribute_match_s,
            AttributeDomain::Location => self.attribute_match_l,
            AttributeDomain::Extent => self.attribute_match_e,
        }
    }

    pub fn agreed(&self) -> bool {
        self.chosen_by_a && self.chosen_by_b
    }
}

/// 对比汇总，总是从明细重新计算
#[derive(Debug, Serialize, Deserialize, Clone, Copy, Default, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ComparisonSummary {
    pub total_codes: usize,
    #[serde(rename = "chosenByACount")]
    pub chosen_by_a_count: usize,
    #[serde(rename = "chosenByBCount")]
    pub chosen_by_b_count: usize,
    pub codes_agreed: usize,
    pub codes_disagreed: usize,
    pub full_matches: usize,
    pub partial_matches: usize,
}

impl ComparisonSummary {
    pub fn from_details(details: &[ComparisonDetail]) -> Self {
        let total_codes = details.len();
        let chosen_by_a_count = details.iter().filter(|d| d.chosen_by_a).count();
        let chosen_by_b_count = details.iter().filter(|d| d.chosen_by_b).count();
        let codes_agreed = details.iter().filter(|d| d.agreed()).count();
        let full_matches = details.iter().filter(|d| d.full_match).count();
        let partial_matches = details
            .iter()
            .filter(|d| d.agreed() && !d.full_match)
            .count();

        Self {
            total_codes,
            chosen_by_a_count,
            chosen_by_b_count,
            codes_agreed,
            codes_disagreed: total_codes - codes_agreed,
            full_matches,
            partial_matches,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{CandidateItem, CatalogRecord, Qualifier, ScoredRecord};

    fn chosen(code: &str, qualifier: Option<&str>) -> UnifiedResultItem {
        let mut item = UnifiedResultItem::unchosen(CandidateItem::from(ScoredRecord {
            record: CatalogRecord::new(code, "test"),
            score: 0.5,
        }));
        item.is_chosen = true;
        item.applied_qualifier = qualifier.map(|q| Qualifier {
            code: q.into(),
            approach: String::new(),
            description: String::new(),
            includes: Vec::new(),
        });
        item.applied_attributes = Some(AppliedAttributes::default());
        item
    }

    #[test]
    fn test_one_sided_choice_has_no_matches() {
        let a = chosen("1.NT.89", Some("LAP"));
        let detail = ComparisonDetail::compare("1.NT.89", Some(&a), None);

        assert!(detail.chosen_by_a);
        assert!(!detail.chosen_by_b);
        assert!(!detail.qualifier_match);
        assert!(!detail.full_match);
        assert!(detail.attributes_a.is_some());
        assert!(detail.attributes_b.is_none());
    }

    #[test]
    fn test_qualifier_mismatch_is_partial() {
        let a = chosen("1.NT.89", Some("LAP"));
        let b = chosen("1.NT.89", Some("OPEN"));
        let detail = ComparisonDetail::compare("1.NT.89", Some(&a), Some(&b));
        assert!(detail.agreed());
        assert!(!detail.qualifier_match);
        assert!(detail.attribute_match(AttributeDomain::Status));

        let same = ComparisonDetail::compare("1.NT.89", Some(&a), Some(&a));
        let summary = ComparisonSummary::from_details(&[detail, same]);
        assert_eq!(summary.codes_agreed, 2);
        assert_eq!(summary.full_matches, 1);
        assert_eq!(summary.partial_matches, 1);
        assert_eq!(summary.codes_disagreed, 0);
    }

    #[test]
    fn test_summary_tolerates_inconsistent_detail() {
        let detail: ComparisonDetail = serde_json::from_value(serde_json::json!({
            "code": "X",
            "chosenByA": false,
            "chosenByB": false,
            "qualifierMatch": true,
            "attributeMatch_S": true,
            "attributeMatch_L": true,
            "attributeMatch_E": true,
            "fullMatch": true,
            "attributesA": null,
            "attributesB": null
        }))
        .unwrap();

        let summary = ComparisonSummary::from_details(&[detail]);
        assert_eq!(summary.codes_agreed, 0);
        assert_eq!(summary.full_matches, 1);
        assert_eq!(summary.partial_matches, 0);
        assert_eq!(summary.codes_disagreed, 1);
    }
}
