use tracing::warn;

use crate::types::CandidateItem;

/// CCI 选择规则，模型必须遵守；引擎本身不校验这些规则
pub const CCI_DOMAIN_RULES: &str = r#"Coding Rules:
 1. If a rubric bundles both diagnostic and therapeutic work, code ONLY the THERAPEUTIC part.
    For example, when both 1.BC and 2.BA apply, code only 1.BC.
 2. ALWAYS pick exactly one qualifier for each chosen code, taken from that rubric's own qualifiers list.
 3. Supplemental references:
    If a rubric's includes or codeAlso text literally names another code (e.g. "see 3.IP.30.^^")
    and that code's description or includes fits the scenario, you MUST add that code as a
    separate entry in your output, even when it is not among the candidates.
 4. For each attribute domain S, L, E:
    - If Mandatory, pick the best match whose description appears in the scenario.
    - If Optional, pick the option whose description appears in the scenario;
      if none applies, return "-" as the code for that domain.
    - If N/A, return "/".
    - Never select more than one code per domain."#;

/// 输出格式说明，下游解析器依赖此格式
const OUTPUT_FORMAT: &str = r#"Output Format:
Return ONLY valid JSON, an array of objects like:
 [
   {
     "code": "1.ZZ.35",
     "chosenQualifier": "HA-M2",
     "chosenAttributes": [
       { "type": "S", "code": "IN" },
       { "type": "L", "code": "/" },
       { "type": "E", "code": "/" }
     ],
     "rationale": "final rubric name, chosen qualifier and chosen attributes, reasons for each, and any Code Also applied"
   }
 ]

Do not wrap the output in markdown and do not add any other text."#;

/// 构建选择提示词
pub struct SelectionPromptBuilder;

impl SelectionPromptBuilder {
    /// 嵌入完整的候选集（而非摘要），让模型看到每一个字段
    pub fn build(query: &str, candidates: &[CandidateItem], domain_rules: &str) -> String {
        let mut lines: Vec<String> = vec![
            "You are a certified CCI coder following CIHI coding best practices. A clinician describes:".to_string(),
            format!("\"{}\"", query.trim()),
            String::new(),
            format!(
                "Below are {} candidate CCI rubric objects in full JSON.",
                candidates.len()
            ),
            "Each object carries every field returned by the search, including code, description,".to_string(),
            "includes, excludes, codeAlso, qualifiers, allAttributes and similarityScore.".to_string(),
            String::new(),
            domain_rules.trim().to_string(),
            String::new(),
            OUTPUT_FORMAT.to_string(),
            String::new(),
            "Here are the full candidate objects:".to_string(),
        ];

        for (i, candidate) in candidates.iter().enumerate() {
            let json = match serde_json::to_string_pretty(candidate) {
                Ok(json) => json.replace('`', ""),
                Err(e) => {
                    warn!(code = candidate.code(), error = %e, "candidate could not be serialized, omitted from prompt");
                    continue;
                }
            };
            lines.push(String::new());
            lines.push(format!("--- Candidate {} ---", i + 1));
            lines.push(json);
        }

        lines.join("\n")
    }
}
