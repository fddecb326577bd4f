use tracing::warn;

use crate::llm::tools::RangeEntry;
use crate::types::CandidateItem;

/// 出现这些词时附加耐药感染的三码规则
pub const INFECTION_KEYWORDS: &[&str] = &[
    "mrsa",
    "vre",
    "infection",
    "cellulitis",
    "abscess",
    "sepsis",
    "bacterial",
];

const CHAPTER_GUIDE: &str = r#"--- ICD-10-CA Chapter Guide ---
Use this guide to decide which block to search for each component of the diagnosis:
- Chapter I (A00-B99): Certain infectious and parasitic diseases (e.g. Staphylococcus aureus).
- Chapter II (C00-D48): Neoplasms.
- Chapter XII (L00-L99): Diseases of the skin and subcutaneous tissue (e.g. Cellulitis, Abscess).
- Chapter XIX (S00-T98): Injury, poisoning and other consequences of external causes.
- Chapter XX (U00-U99): Codes for special purposes (e.g. U82-U84 for antibiotic resistance).
- Chapter XXI (V01-Y98): External causes of morbidity and mortality."#;

const INFECTION_RULE: &str = r#"--- CRITICAL CODING RULE: Drug-Resistant Infections ---
Under CIHI standards a drug-resistant infection such as MRSA requires three separate codes,
linked with a diagnosis cluster (e.g. cluster 'A'):
1. Site of infection: the code for the condition itself (e.g. Cellulitis from Chapter XII).
2. Causative organism: the code for the bacteria (e.g. B95.6 for Staphylococcus aureus from Chapter I).
3. Drug resistance: the code for the specific resistance (e.g. U82.1 for methicillin resistance from Chapter XX)."#;

const OUTPUT_FORMAT: &str = r#"--- VERY STRICT OUTPUT FORMAT ---
When you are ready to give the final answer, respond ONLY with a single valid JSON object and nothing else:

{
  "results": [
    {
      "code": "string",
      "description": "string",
      "rationale": "A detailed explanation for choosing this specific code based on the rules.",
      "diagnosisType": "string (e.g. M, MP, 1, 2, 3, 9, OP)",
      "diagnosisCluster": "string (e.g. A, B) or null",
      "prefix": "string (e.g. Q, 5, 6) or null"
    }
  ],
  "summary": "A narrative summary of the coding decisions for a human reader."
}"#;

pub fn needs_infection_rule(query: &str) -> bool {
    let lowered = query.to_lowercase();
    INFECTION_KEYWORDS.iter().any(|k| lowered.contains(k))
}

/// 构建 ICD-10-CA 编码智能体的初始提示词
pub fn build_icd_prompt(query: &str, candidates: &[CandidateItem], tool_name: &str) -> String {
    let entries: Vec<RangeEntry> = candidates
        .iter()
        .map(|c| RangeEntry::from(c.record.clone()))
        .collect();
    let candidate_json = serde_json::to_string_pretty(&entries).unwrap_or_else(|e| {
        warn!(error = %e, "candidate list could not be serialized");
        "[]".to_string()
    });

    let mut sections = vec![
        "You are an expert, meticulous ICD-10-CA medical coder. Build a complete and accurate \
         coding package for the clinical scenario below, strictly following Canadian CIHI coding standards."
            .to_string(),
        CHAPTER_GUIDE.to_string(),
    ];
    if needs_infection_rule(query) {
        sections.push(INFECTION_RULE.to_string());
    }
    sections.push(format!("Clinical Scenario:\n```\n{}\n```", query.trim()));
    sections.push(format!(
        "Top {} Candidate Codes (from initial search):\n```json\n{}\n```",
        candidates.len(),
        candidate_json
    ));
    sections.push(format!(
        "Instructions:\n\
         1. Deconstruct the scenario into its components (condition, anatomical site, organism, drug resistance, etc.).\n\
         2. For EACH component find the best code. If special rules are given above you MUST follow them.\n\
         \x20  - First check the candidate codes.\n\
         \x20  - If a required code is missing you MUST call the `{}` tool to fetch it. Use the chapter guide to pick the block.\n\
         3. Once all codes are found, assemble the final package. Apply any required diagnosis clusters and give a clear rationale for each code.",
        tool_name
    ));
    sections.push(OUTPUT_FORMAT.to_string());

    sections.join("\n\n")
}
