use std::collections::VecDeque;
use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use medcode_rs::cache::AttributeDefinitionCache;
use medcode_rs::catalog::code::compare_codes;
use medcode_rs::catalog::{CatalogStore, JsonAttributeSource, JsonCatalogStore};
use medcode_rs::config::AgentConfig;
use medcode_rs::engine::enhancer::rank_results;
use medcode_rs::engine::prompt::CCI_DOMAIN_RULES;
use medcode_rs::engine::{
    AgenticCodingOrchestrator, CandidateRetriever, DualModelReconciler, ModelSelector,
    RubricAssembler, SingleModelEnhancer,
};
use medcode_rs::llm::client::{ChatMessage, LlmBackend, ModelReply, ToolCall};
use medcode_rs::types::{
    AttributeDomain, CandidateItem, CatalogRecord, ComparisonDetail, ComparisonSummary,
    ScoredRecord, SearchStatus, UnifiedResultItem,
};
use medcode_rs::CodingError;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rig::completion::ToolDefinition;
use serde_json::json;
use tempfile::TempDir;

/// 按顺序返回预设回复的后端，并记录每次收到的消息
struct ScriptedBackend {
    name: &'static str,
    replies: Mutex<VecDeque<ModelReply>>,
    seen: Mutex<Vec<Vec<ChatMessage>>>,
}

impl ScriptedBackend {
    fn new(name: &'static str, replies: Vec<ModelReply>) -> Arc<Self> {
        Arc::new(Self {
            name,
            replies: Mutex::new(replies.into()),
            seen: Mutex::new(Vec::new()),
        })
    }

    fn calls(&self) -> usize {
        self.seen.lock().unwrap().len()
    }

    fn transcript(&self, call: usize) -> Vec<ChatMessage> {
        self.seen.lock().unwrap()[call].clone()
    }
}

#[async_trait]
impl LlmBackend for ScriptedBackend {
    fn name(&self) -> &str {
        self.name
    }

    async fn complete(
        &self,
        messages: &[ChatMessage],
        _tools: &[ToolDefinition],
    ) -> medcode_rs::CodingResult<ModelReply> {
        self.seen.lock().unwrap().push(messages.to_vec());
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| CodingError::llm(self.name, "script exhausted"))
    }
}

/// 永远请求工具的后端
struct ToolLoopBackend {
    calls: AtomicUsize,
}

#[async_trait]
impl LlmBackend for ToolLoopBackend {
    fn name(&self) -> &str {
        "looping"
    }

    async fn complete(
        &self,
        _messages: &[ChatMessage],
        _tools: &[ToolDefinition],
    ) -> medcode_rs::CodingResult<ModelReply> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(ModelReply::tools(vec![ToolCall {
            id: format!("call-{}", n),
            name: "getIcdByBlockRange".into(),
            arguments: json!({"start": "B95", "end": "B97"}),
        }]))
    }
}

fn write_cci_fixture(dir: &Path) {
    let catalog = json!([
        {
            "code": "1.NT.89",
            "description": "Excision total, appendix laparoscopic appendectomy",
            "qualifiers": [
                {"code": "LAP", "approach": "endoscopic", "description": "laparoscopic approach"},
                {"code": "OPEN", "approach": "open", "description": "open approach"}
            ],
            "attributes": {
                "S": {"type": "Mandatory", "codes": ["a", "b"]},
                "L": {"type": "N/A", "codes": []}
            }
        },
        {
            "code": "1.NT.87",
            "description": "Excision partial, appendix open appendectomy",
            "qualifiers": [
                {"code": "OPEN", "approach": "open", "description": "open approach"}
            ]
        }
    ]);
    fs::write(dir.join("cci.json"), catalog.to_string()).unwrap();

    let definitions = json!({
        "status": [{"code": "a", "desc": "acute"}, {"code": "b", "desc": "chronic"}],
        "location": [],
        "extent": []
    });
    fs::write(dir.join("attributes.json"), definitions.to_string()).unwrap();
}

fn write_icd_fixture(dir: &Path) {
    let catalog = json!([
        {"code": "Z99", "description": "Dependence on enabling machines and devices"},
        {"code": "L03.1", "description": "Cellulitis of other parts of limb"},
        {"code": "B95.6", "description": "Staphylococcus aureus as the cause of diseases"},
        {"code": "B96.2", "description": "Escherichia coli as the cause of diseases"}
    ]);
    fs::write(dir.join("icd.json"), catalog.to_string()).unwrap();
}

async fn cci_candidates(dir: &Path, query: &str) -> Vec<CandidateItem> {
    let store: Arc<dyn CatalogStore> =
        Arc::new(JsonCatalogStore::from_file(&dir.join("cci.json")).await.unwrap());
    let source = JsonAttributeSource::new(dir.join("attributes.json"));
    let cache = AttributeDefinitionCache::load(&source).await.unwrap();

    let candidates = CandidateRetriever::new(store)
        .retrieve(query, 40)
        .await
        .unwrap();
    RubricAssembler::new(Arc::new(cache)).assemble(candidates)
}

async fn icd_store(dir: &Path) -> Arc<dyn CatalogStore> {
    Arc::new(JsonCatalogStore::from_file(&dir.join("icd.json")).await.unwrap())
}

#[tokio::test]
async fn test_laparoscopic_appendectomy_single_choice() {
    let temp_dir = TempDir::new().unwrap();
    write_cci_fixture(temp_dir.path());
    let candidates = cci_candidates(temp_dir.path(), "laparoscopic appendectomy").await;
    assert_eq!(candidates.len(), 2);

    let backend = ScriptedBackend::new(
        "openai",
        vec![ModelReply::text(
            r#"```json
[{"code":"1.NT.89","chosenQualifier":"LAP","chosenAttributes":[{"type":"S","code":"a"}],"rationale":"laparoscopic approach documented"}]
```"#,
        )],
    );
    let selector = ModelSelector::new(backend.clone());
    let items = SingleModelEnhancer::new(20, CCI_DOMAIN_RULES)
        .enhance("laparoscopic appendectomy", &candidates, &selector)
        .await
        .unwrap();

    let chosen: Vec<&UnifiedResultItem> = items.iter().filter(|i| i.is_chosen).collect();
    assert_eq!(chosen.len(), 1);
    assert_eq!(chosen[0].code(), "1.NT.89");
    assert_eq!(chosen[0].applied_qualifier.as_ref().unwrap().code, "LAP");

    let status = chosen[0]
        .applied_attributes
        .as_ref()
        .unwrap()
        .get(AttributeDomain::Status)
        .unwrap();
    assert_eq!(status.description, "acute");
    assert_eq!(backend.calls(), 1);

    // 未选中项保留检索结果
    assert!(!items[1].is_chosen);
    assert_eq!(items[1].code(), "1.NT.87");
}

#[tokio::test]
async fn test_dual_attribute_disagreement() {
    let temp_dir = TempDir::new().unwrap();
    write_cci_fixture(temp_dir.path());
    let candidates = cci_candidates(temp_dir.path(), "laparoscopic appendectomy").await;

    let reply = |attr: &str| {
        ModelReply::text(format!(
            r#"[{{"code":"1.NT.89","chosenQualifier":"LAP","chosenAttributes":[{{"type":"S","code":"{}"}}],"rationale":"r"}}]"#,
            attr
        ))
    };
    let backend_a = ScriptedBackend::new("openai", vec![reply("a")]);
    let backend_b = ScriptedBackend::new("gemini", vec![reply("b")]);

    let reconciler = DualModelReconciler::new(
        SingleModelEnhancer::new(20, CCI_DOMAIN_RULES),
        ModelSelector::new(backend_a),
        ModelSelector::new(backend_b),
    );
    let result = reconciler
        .reconcile("laparoscopic appendectomy", &candidates, &candidates)
        .await
        .unwrap();

    assert_eq!(result.details.len(), 1);
    let detail = &result.details[0];
    assert!(detail.chosen_by_a && detail.chosen_by_b);
    assert!(detail.qualifier_match);
    assert!(!detail.attribute_match_s);
    assert!(!detail.full_match);
    assert_eq!(result.summary.codes_agreed, 1);
    assert_eq!(result.summary.full_matches, 0);
    assert_eq!(result.summary.partial_matches, 1);

    let json = serde_json::to_value(detail).unwrap();
    assert_eq!(json["attributeMatch_S"], false);
    assert_eq!(json["fullMatch"], false);
}

#[tokio::test]
async fn test_agent_always_requesting_tools_is_bounded() {
    let temp_dir = TempDir::new().unwrap();
    write_icd_fixture(temp_dir.path());
    let backend = Arc::new(ToolLoopBackend {
        calls: AtomicUsize::new(0),
    });

    let orchestrator = AgenticCodingOrchestrator::new(
        icd_store(temp_dir.path()).await,
        backend.clone(),
        &AgentConfig::default(),
        100,
    );
    let err = orchestrator
        .run("cellulitis of limb due to staphylococcus aureus")
        .await
        .unwrap_err();

    assert!(matches!(err, CodingError::AgentExhausted { rounds: 5 }));
    assert_eq!(backend.calls.load(Ordering::SeqCst), 5);
}

#[tokio::test]
async fn test_agent_tools_and_self_correction() {
    let temp_dir = TempDir::new().unwrap();
    write_icd_fixture(temp_dir.path());

    let backend = ScriptedBackend::new(
        "openai",
        vec![
            ModelReply::tools(vec![ToolCall {
                id: "call-1".into(),
                name: "getIcdByBlockRange".into(),
                arguments: json!(r#"{"start":"B95","end":"B97"}"#),
            }]),
            ModelReply::tools(vec![ToolCall {
                id: "call-2".into(),
                name: "lookupEverything".into(),
                arguments: json!({}),
            }]),
            ModelReply::text(
                json!({
                    "results": [
                        {"code": "L03.1", "rationale": "cellulitis of limb", "diagnosisType": "M", "diagnosisCluster": "A"},
                        {"code": "B95.6", "rationale": "organism", "diagnosisType": "3", "diagnosisCluster": "A"},
                        {"code": "Z99.XX", "rationale": "device dependence", "diagnosisType": "3"},
                        {"code": "Q12.345", "rationale": "invented", "diagnosisType": "3"}
                    ],
                    "summary": "Cellulitis of limb caused by S. aureus."
                })
                .to_string(),
            ),
        ],
    );

    let orchestrator = AgenticCodingOrchestrator::new(
        icd_store(temp_dir.path()).await,
        backend.clone(),
        &AgentConfig::default(),
        100,
    );
    let package = orchestrator
        .run("cellulitis of limb, staphylococcus aureus, dependence on machines")
        .await
        .unwrap();

    assert_eq!(backend.calls(), 3);
    assert_eq!(package.rounds_used, 3);
    assert_eq!(package.status, SearchStatus::Matched);

    let codes: Vec<&str> = package.results.iter().map(|r| r.code.as_str()).collect();
    assert_eq!(codes, vec!["L03.1", "B95.6", "Z99"]);
    assert!(package.results[2].rationale.contains("Z99.XX"));
    assert!(package.results[2].rationale.ends_with("device dependence"));
    assert_eq!(
        package.results[0].description,
        "Cellulitis of other parts of limb"
    );
    assert_eq!(package.discarded_codes, vec!["Q12.345".to_string()]);

    // 第二次调用能看到区段查询结果，第三次调用能看到未知工具的错误
    let second = backend.transcript(1);
    let Some(ChatMessage::Tool { call_id, content }) = second.last() else {
        panic!("expected a tool result message");
    };
    assert_eq!(call_id, "call-1");
    assert!(content.contains("B95.6"));
    assert!(content.contains("B96.2"));

    let third = backend.transcript(2);
    let Some(ChatMessage::Tool { content, .. }) = third.last() else {
        panic!("expected a tool result message");
    };
    assert!(content.contains("Unknown tool called: lookupEverything"));
}

#[tokio::test]
async fn test_agent_response_not_json_is_parse_error() {
    let temp_dir = TempDir::new().unwrap();
    write_icd_fixture(temp_dir.path());
    let backend = ScriptedBackend::new(
        "openai",
        vec![ModelReply::text("The patient has cellulitis, code L03.1.")],
    );

    let orchestrator = AgenticCodingOrchestrator::new(
        icd_store(temp_dir.path()).await,
        backend,
        &AgentConfig::default(),
        100,
    );
    let err = orchestrator.run("cellulitis of limb").await.unwrap_err();
    assert!(matches!(err, CodingError::ResponseParse(_)));
}

fn random_candidate(rng: &mut StdRng, index: usize) -> CandidateItem {
    let code = format!(
        "1.{}{}.{}",
        (b'A' + rng.random_range(0..26u8)) as char,
        (b'A' + rng.random_range(0..26u8)) as char,
        rng.random_range(1..100u32)
    );
    CandidateItem::from(ScoredRecord {
        record: CatalogRecord::new(code, format!("candidate {}", index)),
        score: rng.random::<f64>(),
    })
}

#[test]
fn test_rank_results_properties() {
    let mut rng = StdRng::seed_from_u64(7);

    for _ in 0..200 {
        let len = rng.random_range(0..30usize);
        let items: Vec<UnifiedResultItem> = (0..len)
            .map(|i| {
                let mut item = UnifiedResultItem::unchosen(random_candidate(&mut rng, i));
                item.is_chosen = rng.random_bool(0.4);
                item
            })
            .collect();
        let max_results = rng.random_range(1..25usize);

        let ranked = rank_results(items, max_results);
        assert!(ranked.len() <= max_results);

        let first_unchosen = ranked
            .iter()
            .position(|i| !i.is_chosen)
            .unwrap_or(ranked.len());
        assert!(ranked[first_unchosen..].iter().all(|i| !i.is_chosen));

        for pair in ranked[..first_unchosen].windows(2) {
            assert_ne!(
                compare_codes(pair[0].code(), pair[1].code()),
                std::cmp::Ordering::Greater
            );
        }
        for pair in ranked[first_unchosen..].windows(2) {
            assert!(pair[0].candidate.similarity_score >= pair[1].candidate.similarity_score);
        }

        let again = rank_results(ranked.clone(), max_results);
        assert_eq!(again, ranked);
    }
}

#[test]
fn test_comparison_summary_properties() {
    let mut rng = StdRng::seed_from_u64(11);

    for _ in 0..200 {
        let len = rng.random_range(0..20usize);
        let details: Vec<ComparisonDetail> = (0..len)
            .map(|i| {
                let chosen_a = rng.random_bool(0.7);
                let chosen_b = rng.random_bool(0.7);
                ComparisonDetail::new(
                    &format!("CODE{}", i),
                    chosen_a,
                    chosen_b,
                    rng.random_bool(0.8),
                    [
                        rng.random_bool(0.8),
                        rng.random_bool(0.8),
                        rng.random_bool(0.8),
                    ],
                    None,
                    None,
                )
            })
            .collect();

        for detail in &details {
            if detail.full_match {
                assert!(detail.chosen_by_a && detail.chosen_by_b && detail.qualifier_match);
                assert!(
                    AttributeDomain::ALL
                        .iter()
                        .all(|domain| detail.attribute_match(*domain))
                );
            }
        }

        let summary = ComparisonSummary::from_details(&details);
        assert_eq!(summary.total_codes, details.len());
        assert_eq!(
            summary.chosen_by_a_count,
            details.iter().filter(|d| d.chosen_by_a).count()
        );
        assert_eq!(
            summary.chosen_by_b_count,
            details.iter().filter(|d| d.chosen_by_b).count()
        );
        assert_eq!(summary.codes_agreed + summary.codes_disagreed, summary.total_codes);
        assert_eq!(summary.full_matches + summary.partial_matches, summary.codes_agreed);
        assert_eq!(ComparisonSummary::from_details(&details), summary);
    }
}
