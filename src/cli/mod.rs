use crate::config::{Config, LLMProvider};
use crate::engine::workflow::{CodingMode, CodingRequest};
use anyhow::{Result, anyhow};
use clap::Parser;
use std::path::PathBuf;

/// MedCode-RS - 检索增强的 CCI / ICD-10-CA 编码引擎
#[derive(Parser, Debug)]
#[command(name = "medcode-rs")]
#[command(
    about = "Retrieval-augmented coding engine that resolves clinical text to CCI intervention codes and ICD-10-CA diagnosis codes with one or two LLM backends."
)]
#[command(version)]
pub struct Args {
    /// 临床描述文本
    #[arg(short, long)]
    pub query: String,

    /// 运行模式 (cci, dual, icd, search, icd-search, lookup, range, context, above, below)
    #[arg(short, long, default_value = "cci")]
    pub mode: CodingMode,

    /// 配置文件路径
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// CCI 目录文件
    #[arg(long)]
    pub catalog: Option<PathBuf>,

    /// ICD-10-CA 目录文件
    #[arg(long)]
    pub icd_catalog: Option<PathBuf>,

    /// 属性定义文件
    #[arg(long)]
    pub attributes: Option<PathBuf>,

    /// 主模型 Provider (openai, anthropic, gemini, deepseek, openrouter, ollama)
    #[arg(long)]
    pub provider_a: Option<String>,

    /// 主模型名称
    #[arg(long)]
    pub model_a: Option<String>,

    /// 对比模型 Provider
    #[arg(long)]
    pub provider_b: Option<String>,

    /// 对比模型名称
    #[arg(long)]
    pub model_b: Option<String>,

    /// 合并结果的最大条目数
    #[arg(long)]
    pub max_results: Option<usize>,

    /// 编码智能体的最大模型调用轮次
    #[arg(long)]
    pub max_rounds: Option<usize>,

    /// 是否启用详细日志
    #[arg(short, long)]
    pub verbose: bool,
}

impl Args {
    /// 将CLI参数转换为配置与请求
    pub fn into_config(self) -> Result<(Config, CodingRequest)> {
        let mut config = Config::load(self.config.as_deref())?;

        // 覆盖配置文件中的设置
        if let Some(path) = self.catalog {
            config.catalog.cci_catalog_path = path;
        }
        if let Some(path) = self.icd_catalog {
            config.catalog.icd_catalog_path = path;
        }
        if let Some(path) = self.attributes {
            config.catalog.attribute_definitions_path = path;
        }

        if let Some(provider) = self.provider_a {
            config.model_a.provider = parse_provider(&provider)?;
        }
        if let Some(model) = self.model_a {
            config.model_a.model = model;
        }
        if let Some(provider) = self.provider_b {
            config.model_b.provider = parse_provider(&provider)?;
        }
        if let Some(model) = self.model_b {
            config.model_b.model = model;
        }

        if let Some(max_results) = self.max_results {
            config.selection.max_results = max_results;
        }
        if let Some(max_rounds) = self.max_rounds {
            config.agent.max_rounds = max_rounds;
        }
        config.verbose = config.verbose || self.verbose;

        let request = CodingRequest {
            query: self.query,
            mode: self.mode,
        };
        Ok((config, request))
    }
}

fn parse_provider(value: &str) -> Result<LLMProvider> {
    value.parse::<LLMProvider>().map_err(|e| anyhow!(e))
}
