use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

/// 未指定 `--config` 时尝试加载的默认配置文件
pub const DEFAULT_CONFIG_FILE: &str = "medcode.toml";

/// LLM Provider类型
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Default)]
pub enum LLMProvider {
    #[serde(rename = "openai")]
    #[default]
    OpenAI,
    #[serde(rename = "deepseek")]
    DeepSeek,
    #[serde(rename = "openrouter")]
    OpenRouter,
    #[serde(rename = "anthropic")]
    Anthropic,
    #[serde(rename = "gemini")]
    Gemini,
    #[serde(rename = "ollama")]
    Ollama,
}

impl std::fmt::Display for LLMProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LLMProvider::OpenAI => write!(f, "openai"),
            LLMProvider::DeepSeek => write!(f, "deepseek"),
            LLMProvider::OpenRouter => write!(f, "openrouter"),
            LLMProvider::Anthropic => write!(f, "anthropic"),
            LLMProvider::Gemini => write!(f, "gemini"),
            LLMProvider::Ollama => write!(f, "ollama"),
        }
    }
}

impl std::str::FromStr for LLMProvider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "openai" => Ok(LLMProvider::OpenAI),
            "deepseek" => Ok(LLMProvider::DeepSeek),
            "openrouter" => Ok(LLMProvider::OpenRouter),
            "anthropic" => Ok(LLMProvider::Anthropic),
            "gemini" => Ok(LLMProvider::Gemini),
            "ollama" => Ok(LLMProvider::Ollama),
            _ => Err(format!("Unknown provider: {}", s)),
        }
    }
}

/// 应用程序配置
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct Config {
    /// 目录数据文件
    pub catalog: CatalogConfig,

    /// 候选检索配置
    pub retrieval: RetrievalConfig,

    /// 选择与合并配置
    pub selection: SelectionConfig,

    /// ICD编码智能体配置
    pub agent: AgentConfig,

    /// 主模型（单模型模式与ICD模式使用）
    pub model_a: LLMConfig,

    /// 对比模型（双模型模式使用）
    pub model_b: LLMConfig,

    /// 是否启用详细日志
    pub verbose: bool,
}

/// 目录数据文件路径
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct CatalogConfig {
    /// CCI 目录（JSON数组）
    pub cci_catalog_path: PathBuf,

    /// ICD-10-CA 目录（JSON数组）
    pub icd_catalog_path: PathBuf,

    /// 属性定义文档
    pub attribute_definitions_path: PathBuf,
}

/// 候选检索配置
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct RetrievalConfig {
    pub cci_candidate_limit: usize,
    pub icd_candidate_limit: usize,
}

/// 选择与合并配置
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct SelectionConfig {
    /// 合并后保留的最大条目数
    pub max_results: usize,

    /// 覆盖内置的领域规则文本
    pub domain_rules: Option<String>,
}

/// ICD编码智能体配置
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct AgentConfig {
    /// 模型调用轮次上限
    pub max_rounds: usize,

    /// 自我修正时编码截断的最短长度
    pub min_code_length: usize,
}

/// LLM模型配置
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct LLMConfig {
    /// LLM Provider类型
    pub provider: LLMProvider,

    /// LLM API KEY
    pub api_key: String,

    /// LLM API基地址
    pub api_base_url: String,

    /// 模型名称
    pub model: String,

    /// 最大tokens
    pub max_tokens: u32,

    /// 温度
    pub temperature: f64,

    /// 重试次数
    pub retry_attempts: u32,

    /// 重试间隔（毫秒）
    pub retry_delay_ms: u64,

    /// 超时时间（秒）
    pub timeout_seconds: u64,
}

impl Config {
    /// 从文件加载配置
    pub fn from_file(path: &Path) -> Result<Self> {
        let mut file =
            File::open(path).context(format!("Failed to open config file: {:?}", path))?;
        let mut content = String::new();
        file.read_to_string(&mut content)
            .context("Failed to read config file")?;

        let config: Config = toml::from_str(&content).context("Failed to parse config file")?;
        Ok(config)
    }

    /// 按优先级加载：显式路径 > 当前目录的 medcode.toml > 默认值
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::from_file(path);
        }

        let fallback = PathBuf::from(DEFAULT_CONFIG_FILE);
        if fallback.exists() {
            Self::from_file(&fallback)
        } else {
            Ok(Self::default())
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            catalog: CatalogConfig::default(),
            retrieval: RetrievalConfig::default(),
            selection: SelectionConfig::default(),
            agent: AgentConfig::default(),
            model_a: LLMConfig::openai_default(),
            model_b: LLMConfig::gemini_default(),
            verbose: false,
        }
    }
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            cci_catalog_path: PathBuf::from("data/cci_catalog.json"),
            icd_catalog_path: PathBuf::from("data/icd_catalog.json"),
            attribute_definitions_path: PathBuf::from("data/attribute_definitions.json"),
        }
    }
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            cci_candidate_limit: 40,
            icd_candidate_limit: 100,
        }
    }
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            max_results: 20,
            domain_rules: None,
        }
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_rounds: 5,
            min_code_length: 3,
        }
    }
}

impl LLMConfig {
    /// 主模型默认值：OpenAI
    pub fn openai_default() -> Self {
        Self {
            provider: LLMProvider::OpenAI,
            api_key: std::env::var("OPENAI_API_KEY").unwrap_or_default(),
            api_base_url: String::from("https://api.openai.com/v1"),
            model: String::from("gpt-4o-mini"),
            max_tokens: 4096,
            temperature: 0.1,
            retry_attempts: 3,
            retry_delay_ms: 2000,
            timeout_seconds: 120,
        }
    }

    /// 对比模型默认值：Gemini
    pub fn gemini_default() -> Self {
        Self {
            provider: LLMProvider::Gemini,
            api_key: std::env::var("GEMINI_API_KEY").unwrap_or_default(),
            api_base_url: String::from("https://generativelanguage.googleapis.com"),
            model: String::from("gemini-2.0-flash"),
            ..Self::openai_default()
        }
    }
}

impl Default for LLMConfig {
    fn default() -> Self {
        Self::openai_default()
    }
}
