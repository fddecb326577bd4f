use std::collections::HashSet;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::engine::enhancer::SingleModelEnhancer;
use crate::engine::selector::ModelSelector;
use crate::error::CodingResult;
use crate::types::{CandidateItem, ComparisonDetail, ComparisonSummary, UnifiedResultItem};

/// 双模型对比结果
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DualReconciliation {
    pub backend_a: String,
    pub backend_b: String,
    pub items_a: Vec<UnifiedResultItem>,
    pub items_b: Vec<UnifiedResultItem>,
    pub details: Vec<ComparisonDetail>,
    pub summary: ComparisonSummary,
    pub elapsed_a_ms: u64,
    pub elapsed_b_ms: u64,
}

/// 在同一候选池上并发运行两个后端并逐码对比
pub struct DualModelReconciler {
    enhancer: SingleModelEnhancer,
    selector_a: ModelSelector,
    selector_b: ModelSelector,
}

impl DualModelReconciler {
    pub fn new(
        enhancer: SingleModelEnhancer,
        selector_a: ModelSelector,
        selector_b: ModelSelector,
    ) -> Self {
        Self {
            enhancer,
            selector_a,
            selector_b,
        }
    }

    /// 两个后端都会等到完成；任一失败则整个请求失败
    pub async fn reconcile(
        &self,
        query: &str,
        candidates_a: &[CandidateItem],
        candidates_b: &[CandidateItem],
    ) -> CodingResult<DualReconciliation> {
        let run_a = timed(self.enhancer.enhance(query, candidates_a, &self.selector_a));
        let run_b = timed(self.enhancer.enhance(query, candidates_b, &self.selector_b));
        let ((result_a, elapsed_a_ms), (result_b, elapsed_b_ms)) =
            futures::future::join(run_a, run_b).await;

        let items_a = result_a.inspect_err(|e| {
            error!(backend = self.selector_a.backend_name(), error = %e, "backend A failed");
        })?;
        let items_b = result_b.inspect_err(|e| {
            error!(backend = self.selector_b.backend_name(), error = %e, "backend B failed");
        })?;

        let details = compare_items(&items_a, &items_b);
        let summary = ComparisonSummary::from_details(&details);
        info!(
            total = summary.total_codes,
            agreed = summary.codes_agreed,
            full = summary.full_matches,
            "dual reconciliation finished"
        );

        Ok(DualReconciliation {
            backend_a: self.selector_a.backend_name().to_string(),
            backend_b: self.selector_b.backend_name().to_string(),
            items_a,
            items_b,
            details,
            summary,
            elapsed_a_ms,
            elapsed_b_ms,
        })
    }
}

async fn timed<F, T>(future: F) -> (T, u64)
where
    F: std::future::Future<Output = T>,
{
    let start = Instant::now();
    let output = future.await;
    (output, start.elapsed().as_millis() as u64)
}

/// 对两侧选中编码的并集逐一对比，顺序为 A 的选中项，再接 B 独有的选中项
pub fn compare_items(
    items_a: &[UnifiedResultItem],
    items_b: &[UnifiedResultItem],
) -> Vec<ComparisonDetail> {
    let mut seen = HashSet::new();
    let codes: Vec<&str> = items_a
        .iter()
        .chain(items_b.iter())
        .filter(|item| item.is_chosen)
        .map(|item| item.code())
        .filter(|code| seen.insert(*code))
        .collect();

    codes
        .into_iter()
        .map(|code| {
            let a = items_a.iter().find(|item| item.code() == code);
            let b = items_b.iter().find(|item| item.code() == code);
            ComparisonDetail::compare(code, a, b)
        })
        .collect()
}
