use std::collections::HashSet;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::{CodingError, CodingResult};
use crate::types::catalog::AttributeDomain;

/// 模型为某个维度选定的属性码
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, JsonSchema)]
pub struct ChosenAttribute {
    #[serde(rename = "type")]
    pub domain: AttributeDomain,
    pub code: String,
}

/// 经过校验的模型选择
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Selection {
    pub code: String,
    pub chosen_qualifier: Option<String>,
    pub chosen_attributes: Vec<ChosenAttribute>,
    pub rationale: String,
}

impl Selection {
    /// 指定维度上选定的属性码
    pub fn attribute_code(&self, domain: AttributeDomain) -> Option<&str> {
        self.chosen_attributes
            .iter()
            .find(|a| a.domain == domain)
            .map(|a| a.code.as_str())
    }
}

/// 模型输出中限定码既可能是字符串，也可能是对象
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum QualifierWire {
    Code(String),
    Entry { code: String },
}

#[derive(Debug, Deserialize)]
struct AttributeWire {
    #[serde(rename = "type", alias = "name")]
    domain: String,
    code: String,
}

/// 模型原始输出，校验前的形态
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SelectionWire {
    code: String,
    #[serde(default)]
    chosen_qualifier: Option<QualifierWire>,
    #[serde(default)]
    chosen_attributes: Vec<AttributeWire>,
    rationale: String,
}

impl SelectionWire {
    fn validate(self, index: usize) -> CodingResult<Selection> {
        let code = self.code.trim().to_string();
        if code.is_empty() {
            return Err(CodingError::ResponseParse(format!(
                "selection #{} has an empty code",
                index + 1
            )));
        }

        let chosen_qualifier = match self.chosen_qualifier {
            Some(QualifierWire::Code(q)) | Some(QualifierWire::Entry { code: q }) => {
                let q = q.trim().to_string();
                if q.is_empty() { None } else { Some(q) }
            }
            None => None,
        };

        let mut seen = HashSet::new();
        let mut chosen_attributes = Vec::with_capacity(self.chosen_attributes.len());
        for attr in self.chosen_attributes {
            let domain = AttributeDomain::from_label(&attr.domain).ok_or_else(|| {
                CodingError::ResponseParse(format!(
                    "selection {} names unknown attribute domain '{}'",
                    code, attr.domain
                ))
            })?;
            if !seen.insert(domain) {
                return Err(CodingError::ResponseParse(format!(
                    "selection {} picks more than one code for domain {}",
                    code, domain
                )));
            }
            let attr_code = attr.code.trim().to_string();
            if attr_code.is_empty() {
                return Err(CodingError::ResponseParse(format!(
                    "selection {} has an empty code for domain {}",
                    code, domain
                )));
            }
            chosen_attributes.push(ChosenAttribute {
                domain,
                code: attr_code,
            });
        }

        Ok(Selection {
            code,
            chosen_qualifier,
            chosen_attributes,
            rationale: self.rationale,
        })
    }
}

/// 将去除围栏后的文本解析为选择列表，不符合约定的一律拒绝
pub fn parse_selections(json: &str) -> CodingResult<Vec<Selection>> {
    let wires: Vec<SelectionWire> = serde_json::from_str(json)
        .map_err(|e| CodingError::ResponseParse(format!("selection array: {}", e)))?;

    wires
        .into_iter()
        .enumerate()
        .map(|(i, wire)| wire.validate(i))
        .collect()
}
