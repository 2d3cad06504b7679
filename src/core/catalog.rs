//! 模型与提示词目录
//!
//! 两个 YAML 文件：
//! - `llm_models.yaml`：`llm_models` / `lrm_models` / `vlm_models` 三个模型列表
//! - `prompt_models.yaml`：`prompt_models` 提示词映射

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

use crate::domain::ChatMessage;
use crate::errors::{AnalyzerError, Result};

/// 模型配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    pub name: String,
    #[serde(default)]
    pub context_window: Option<u32>,
    #[serde(default)]
    pub temperature: Option<f64>,
    #[serde(default)]
    pub top_p: Option<f64>,
    /// 其余字段原样保留（描述、厂商等）
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_yaml::Value>,
}

impl ModelConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            context_window: None,
            temperature: None,
            top_p: None,
            extra: BTreeMap::new(),
        }
    }

    pub fn with_context_window(mut self, tokens: u32) -> Self {
        self.context_window = Some(tokens);
        self
    }
}

/// 提示词配置
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PromptConfig {
    #[serde(default)]
    pub messages: Vec<ChatMessage>,
    #[serde(default)]
    pub temperature: Option<f64>,
    #[serde(default)]
    pub top_p: Option<f64>,
    #[serde(default)]
    pub response_format: Option<Value>,
}

#[derive(Debug, Default, Deserialize)]
struct ModelsFile {
    #[serde(default)]
    llm_models: Vec<ModelConfig>,
    #[serde(default)]
    lrm_models: Vec<ModelConfig>,
    #[serde(default)]
    vlm_models: Vec<ModelConfig>,
}

#[derive(Debug, Default, Deserialize)]
struct PromptsFile {
    #[serde(default)]
    prompt_models: HashMap<String, PromptConfig>,
}

/// 模型和提示词目录
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    /// 按 llm → lrm → vlm 顺序排列
    models: Vec<ModelConfig>,
    prompts: HashMap<String, PromptConfig>,
}

impl Catalog {
    /// 从磁盘加载目录
    pub fn load<P: AsRef<Path>, Q: AsRef<Path>>(models_path: P, prompts_path: Q) -> Result<Self> {
        let models_path = models_path.as_ref();
        let prompts_path = prompts_path.as_ref();

        let models_yaml = std::fs::read_to_string(models_path).map_err(|e| {
            AnalyzerError::ConfigError(format!("cannot read {}: {}", models_path.display(), e))
        })?;
        let prompts_yaml = std::fs::read_to_string(prompts_path).map_err(|e| {
            AnalyzerError::ConfigError(format!("cannot read {}: {}", prompts_path.display(), e))
        })?;

        let catalog = Self::from_yaml_str(&models_yaml, &prompts_yaml)?;
        info!(
            models = catalog.models.len(),
            prompts = catalog.prompts.len(),
            "catalog loaded"
        );
        Ok(catalog)
    }

    /// 从 YAML 文本构建目录
    pub fn from_yaml_str(models_yaml: &str, prompts_yaml: &str) -> Result<Self> {
        let models: ModelsFile = serde_yaml::from_str(models_yaml)?;
        let prompts: PromptsFile = serde_yaml::from_str(prompts_yaml)?;

        Ok(Self::from_parts(
            models
                .llm_models
                .into_iter()
                .chain(models.lrm_models)
                .chain(models.vlm_models)
                .collect(),
            prompts.prompt_models,
        ))
    }

    pub fn from_parts(models: Vec<ModelConfig>, prompts: HashMap<String, PromptConfig>) -> Self {
        Self { models, prompts }
    }

    /// 按名称查找模型，多个分区同名时取第一个
    pub fn get_model_config(&self, model_name: &str) -> Result<&ModelConfig> {
        self.models
            .iter()
            .find(|m| m.name == model_name)
            .ok_or_else(|| {
                AnalyzerError::NotFound(format!(
                    "Model '{}' not found in llm_models.yaml.",
                    model_name
                ))
            })
    }

    pub fn get_prompt_config(&self, prompt_name: &str) -> Result<&PromptConfig> {
        self.prompts.get(prompt_name).ok_or_else(|| {
            AnalyzerError::NotFound(format!(
                "Prompt '{}' not found in prompt_models.yaml.",
                prompt_name
            ))
        })
    }

    pub fn model_names(&self) -> impl Iterator<Item = &str> {
        self.models.iter().map(|m| m.name.as_str())
    }
}
