use std::cmp::Ordering;
use std::collections::HashMap;

use tracing::{debug, info};

use crate::catalog::code::{compare_codes, rubric_base};
use crate::engine::assembler::NONE_APPLIES_CODE;
use crate::engine::prompt::SelectionPromptBuilder;
use crate::engine::selector::ModelSelector;
use crate::error::CodingResult;
use crate::types::{
    AppliedAttributes, AttributeDomain, CandidateItem, Qualifier, Selection, UnifiedResultItem,
};

/// 单后端增强：让模型在候选集上做选择，并把选择合并回候选项
///
/// 后端以 [`ModelSelector`] 的形式传入，两个后端共用同一条合并路径。
#[derive(Debug, Clone)]
pub struct SingleModelEnhancer {
    max_results: usize,
    domain_rules: String,
}

impl SingleModelEnhancer {
    pub fn new(max_results: usize, domain_rules: impl Into<String>) -> Self {
        Self {
            max_results,
            domain_rules: domain_rules.into(),
        }
    }

    pub async fn enhance(
        &self,
        query: &str,
        candidates: &[CandidateItem],
        selector: &ModelSelector,
    ) -> CodingResult<Vec<UnifiedResultItem>> {
        if candidates.is_empty() {
            return Ok(Vec::new());
        }

        let prompt = SelectionPromptBuilder::build(query, candidates, &self.domain_rules);
        let selections = selector.select(&prompt).await?;
        info!(
            backend = selector.backend_name(),
            candidates = candidates.len(),
            selections = selections.len(),
            "model selections received"
        );

        let index = index_selections(selections);
        let merged: Vec<UnifiedResultItem> = candidates
            .iter()
            .map(|candidate| match index.get(candidate.code()) {
                Some(selection) => apply_selection(candidate.clone(), selection),
                None => UnifiedResultItem::unchosen(candidate.clone()),
            })
            .collect();

        let unmatched: Vec<&str> = index
            .keys()
            .filter(|code| !candidates.iter().any(|c| c.code() == code.as_str()))
            .map(String::as_str)
            .collect();
        if !unmatched.is_empty() {
            debug!(codes = ?unmatched, "selections reference codes outside the candidate set");
        }

        Ok(rank_results(merged, self.max_results))
    }
}

/// 按 rubric 基础编码索引选择；完整编码带限定码后缀而选择未给出限定码时，以完整编码作为限定码
fn index_selections(selections: Vec<Selection>) -> HashMap<String, Selection> {
    let mut index = HashMap::new();
    for mut selection in selections {
        let base = rubric_base(&selection.code);
        if selection.chosen_qualifier.is_none() && base != selection.code {
            selection.chosen_qualifier = Some(selection.code.clone());
        }
        index.insert(base, selection);
    }
    index
}

fn apply_selection(candidate: CandidateItem, selection: &Selection) -> UnifiedResultItem {
    let applied_qualifier = selection
        .chosen_qualifier
        .as_deref()
        .and_then(|chosen| resolve_qualifier(&candidate, chosen));

    let mut applied = AppliedAttributes::default();
    for domain in AttributeDomain::ALL {
        let resolved = selection.attribute_code(domain).and_then(|code| {
            let found = candidate
                .attributes
                .iter()
                .find(|a| a.domain == domain && a.code == code)
                .cloned();
            if found.is_none() && code != NONE_APPLIES_CODE {
                debug!(
                    code = candidate.code(),
                    domain = %domain,
                    attribute = code,
                    "selected attribute is not offered by the candidate"
                );
            }
            found
        });
        applied.set(domain, resolved);
    }

    UnifiedResultItem {
        candidate,
        is_chosen: true,
        applied_qualifier,
        applied_attributes: Some(applied),
        reasoning: selection.rationale.clone(),
    }
}

/// 只在该候选项自己的限定码列表中查找
fn resolve_qualifier(candidate: &CandidateItem, chosen: &str) -> Option<Qualifier> {
    let rubric = candidate.code();
    let prefixed = format!("{}.{}", rubric, chosen);
    let suffix = chosen.strip_prefix(&format!("{}.", rubric));

    candidate
        .record
        .qualifiers
        .iter()
        .find(|q| q.code == chosen || q.code == prefixed || Some(q.code.as_str()) == suffix)
        .cloned()
}

/// 排序并截断
///
/// 选中项在前；选中项之间按编码数字感知升序；未选中项按相似度降序。
pub fn rank_results(mut items: Vec<UnifiedResultItem>, max_results: usize) -> Vec<UnifiedResultItem> {
    items.sort_by(|a, b| match (a.is_chosen, b.is_chosen) {
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        (true, true) => compare_codes(a.code(), b.code()),
        (false, false) => b
            .candidate
            .similarity_score
            .total_cmp(&a.candidate.similarity_score),
    });
    items.truncate(max_results);
    items
}
