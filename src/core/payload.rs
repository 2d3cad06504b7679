//! Chat-completion 请求载荷构建
//!
//! 模板占位符：
//! - `{{question}}` / `{{messages}}` / `{{trend}}`：用户内容
//! - `{{max_tokens}}`：计算出的响应 token 上限（分析载荷）

use serde::Serialize;
use serde_json::{Map, Value};

use crate::core::catalog::{ModelConfig, PromptConfig};
use crate::core::tokens::TokenEstimator;
use crate::domain::ChatMessage;

/// 未配置上下文窗口时的默认值
pub const DEFAULT_CONTEXT_WINDOW: u32 = 4096;
/// 为响应预留的最大 token 数
pub const COMPLETION_RESERVE: u32 = 2048;
/// 内容生成载荷在未配置上下文窗口时的 max_tokens
pub const CONTENT_DEFAULT_MAX_TOKENS: u32 = 512;

pub const DEFAULT_TEMPERATURE: f64 = 0.3;
pub const DEFAULT_TOP_P: f64 = 0.8;

const CONTENT_PLACEHOLDERS: [&str; 3] = ["{{question}}", "{{messages}}", "{{trend}}"];
const MAX_TOKENS_PLACEHOLDER: &str = "{{max_tokens}}";
const TREND_PLACEHOLDER: &str = "{{trend}}";

/// 用户内容
#[derive(Debug, Clone, PartialEq)]
pub enum UserContent {
    Text(String),
    /// 按行拼接
    Lines(Vec<String>),
    /// 以 2 空格缩进的 JSON 呈现
    Json(Value),
}

impl UserContent {
    pub fn render(&self) -> String {
        match self {
            UserContent::Text(text) => text.clone(),
            UserContent::Lines(lines) => lines.join("\n"),
            UserContent::Json(value) => pretty_json(value),
        }
    }
}

impl From<String> for UserContent {
    fn from(text: String) -> Self {
        UserContent::Text(text)
    }
}

impl From<&str> for UserContent {
    fn from(text: &str) -> Self {
        UserContent::Text(text.to_string())
    }
}

impl From<Vec<String>> for UserContent {
    fn from(lines: Vec<String>) -> Self {
        UserContent::Lines(lines)
    }
}

impl From<Value> for UserContent {
    fn from(value: Value) -> Self {
        UserContent::Json(value)
    }
}

fn pretty_json(value: &Value) -> String {
    // Value 的序列化不会失败
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}

/// Chat-completion 请求载荷
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatPayload {
    pub messages: Vec<ChatMessage>,
    pub model: String,
    pub temperature: f64,
    pub top_p: f64,
    pub stream: bool,
    pub max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_format: Option<Value>,
    /// 额外参数，序列化时覆盖同名字段
    #[serde(skip)]
    pub extra: Map<String, Value>,
}

impl ChatPayload {
    /// 转为请求体，`extra` 中的键覆盖已有字段
    pub fn to_json(&self) -> Value {
        let mut body = match serde_json::to_value(self) {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        };
        for (key, value) in &self.extra {
            body.insert(key.clone(), value.clone());
        }
        Value::Object(body)
    }
}

/// 响应 token 上限：`min(max(context_window - prompt_tokens, 0), 2048)`
pub fn completion_budget(context_window: u32, prompt_tokens: usize) -> u32 {
    let available = (context_window as usize).saturating_sub(prompt_tokens);
    available.min(COMPLETION_RESERVE as usize) as u32
}

fn sampling(model: &ModelConfig, prompt: &PromptConfig) -> (f64, f64) {
    let temperature = prompt
        .temperature
        .or(model.temperature)
        .unwrap_or(DEFAULT_TEMPERATURE);
    let top_p = prompt.top_p.or(model.top_p).unwrap_or(DEFAULT_TOP_P);
    (temperature, top_p)
}

/// 构建分析载荷
///
/// 先代入用户内容，再按提示词 token 数计算 `max_tokens` 并代入 `{{max_tokens}}`。
pub fn build_payload(
    model: &ModelConfig,
    prompt: &PromptConfig,
    user_content: &UserContent,
    tokens: &TokenEstimator,
    stream: bool,
    extra: Option<&Map<String, Value>>,
) -> ChatPayload {
    let rendered = user_content.render();
    let (temperature, top_p) = sampling(model, prompt);

    let raw_messages: Vec<ChatMessage> = prompt
        .messages
        .iter()
        .map(|msg| {
            let content = CONTENT_PLACEHOLDERS
                .iter()
                .fold(msg.content.clone(), |acc, ph| acc.replace(ph, &rendered));
            ChatMessage::new(msg.role.clone(), content)
        })
        .collect();

    let prompt_tokens = tokens.estimate(&raw_messages, &model.name);
    let context_window = model.context_window.unwrap_or(DEFAULT_CONTEXT_WINDOW);
    let max_tokens = completion_budget(context_window, prompt_tokens);

    let budget = max_tokens.to_string();
    let messages = raw_messages
        .into_iter()
        .map(|msg| ChatMessage::new(msg.role, msg.content.replace(MAX_TOKENS_PLACEHOLDER, &budget)))
        .collect();

    ChatPayload {
        messages,
        model: model.name.clone(),
        temperature,
        top_p,
        stream,
        max_tokens,
        response_format: prompt.response_format.clone(),
        extra: extra.cloned().unwrap_or_default(),
    }
}

/// 构建趋势转内容载荷
///
/// 仅代入 `{{trend}}`，`max_tokens` 直接取模型上下文窗口。
pub fn build_payload_for_content(
    model: &ModelConfig,
    prompt: &PromptConfig,
    trend: &Value,
    stream: bool,
    extra: Option<&Map<String, Value>>,
) -> ChatPayload {
    let trend_json = pretty_json(trend);
    let (temperature, top_p) = sampling(model, prompt);

    let messages = prompt
        .messages
        .iter()
        .map(|msg| ChatMessage::new(msg.role.clone(), msg.content.replace(TREND_PLACEHOLDER, &trend_json)))
        .collect();

    ChatPayload {
        messages,
        model: model.name.clone(),
        temperature,
        top_p,
        stream,
        max_tokens: model.context_window.unwrap_or(CONTENT_DEFAULT_MAX_TOKENS),
        response_format: prompt.response_format.clone(),
        extra: extra.cloned().unwrap_or_default(),
    }
}
