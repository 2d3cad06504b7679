//! Token 估算
//!
//! 已知模型映射到 HuggingFace tokenizer 标识；注册了对应 tokenizer 时精确计数，
//! 否则退回按字符数估算（约 4 字符 / token）。
//! 配置了 [`TokenizerSource`] 时，首次用到某个 tokenizer 会按需加载并缓存。

use std::sync::Arc;

use dashmap::{DashMap, DashSet};
use tracing::{debug, warn};

use crate::domain::ChatMessage;

/// 已知模型 → tokenizer 标识
const MODEL_TO_TOKENIZER: &[(&str, &str)] = &[
    ("Llama-3.1-8B-Instruct", "meta-llama/Meta-Llama-3-8B-Instruct"),
    ("Meta-Llama-3_3-70B-Instruct", "meta-llama/Meta-Llama-3-70B-Instruct"),
    ("gpt-3.5-turbo", "gpt2"),
    ("gpt2", "gpt2"),
];

/// 查找模型对应的 tokenizer
pub fn tokenizer_for_model(model_name: &str) -> Option<&'static str> {
    MODEL_TO_TOKENIZER
        .iter()
        .find(|(model, _)| *model == model_name)
        .map(|(_, tokenizer)| *tokenizer)
}

/// 粗略估算：(role 字符数 + content 字符数) / 4，向下取整
pub fn naive_token_estimate(messages: &[ChatMessage]) -> usize {
    let total_chars: usize = messages
        .iter()
        .map(|m| m.role.chars().count() + m.content.chars().count())
        .sum();
    total_chars / 4
}

/// Tokenizer 抽象
pub trait TokenCounter: Send + Sync {
    /// 返回编码后的 token 数（不含特殊 token）
    fn count(&self, text: &str) -> anyhow::Result<usize>;
}

/// Tokenizer 加载器
pub trait TokenizerSource: Send + Sync {
    /// 按标识加载 tokenizer（可能阻塞，例如下载词表）
    fn load(&self, tokenizer_id: &str) -> anyhow::Result<Arc<dyn TokenCounter>>;
}

/// Token 估算器
///
/// 按 tokenizer 标识缓存已注册或已加载的 [`TokenCounter`]；加载失败的标识只尝试一次
#[derive(Default, Clone)]
pub struct TokenEstimator {
    counters: Arc<DashMap<String, Arc<dyn TokenCounter>>>,
    unavailable: Arc<DashSet<String>>,
    source: Option<Arc<dyn TokenizerSource>>,
}

impl TokenEstimator {
    pub fn new() -> Self {
        Self::default()
    }

    /// 使用加载器按需获取 tokenizer
    pub fn with_source(source: Arc<dyn TokenizerSource>) -> Self {
        Self {
            source: Some(source),
            ..Self::default()
        }
    }

    /// 注册 tokenizer 实现
    pub fn register(&self, tokenizer_id: impl Into<String>, counter: Arc<dyn TokenCounter>) {
        let tokenizer_id = tokenizer_id.into();
        self.unavailable.remove(&tokenizer_id);
        self.counters.insert(tokenizer_id, counter);
    }

    /// 预先加载一组模型对应的 tokenizer，返回可用的数量
    pub fn preload<'a>(&self, model_names: impl IntoIterator<Item = &'a str>) -> usize {
        let mut ids: Vec<&'static str> = model_names
            .into_iter()
            .filter_map(tokenizer_for_model)
            .collect();
        ids.sort_unstable();
        ids.dedup();
        ids.into_iter().filter(|id| self.counter(id).is_some()).count()
    }

    fn counter(&self, tokenizer_id: &str) -> Option<Arc<dyn TokenCounter>> {
        if let Some(counter) = self.counters.get(tokenizer_id) {
            return Some(counter.value().clone());
        }
        if self.unavailable.contains(tokenizer_id) {
            return None;
        }
        let source = self.source.as_ref()?;

        match source.load(tokenizer_id) {
            Ok(counter) => {
                debug!(tokenizer = tokenizer_id, "tokenizer loaded");
                Some(
                    self.counters
                        .entry(tokenizer_id.to_string())
                        .or_insert(counter)
                        .value()
                        .clone(),
                )
            }
            Err(e) => {
                warn!(
                    tokenizer = tokenizer_id,
                    error = %e,
                    "cannot load tokenizer, using naive estimate"
                );
                self.unavailable.insert(tokenizer_id.to_string());
                None
            }
        }
    }

    /// 估算一组提示消息的 token 数
    pub fn estimate(&self, messages: &[ChatMessage], model_name: &str) -> usize {
        let Some(tokenizer_id) = tokenizer_for_model(model_name) else {
            debug!(model = model_name, "no tokenizer mapping, using naive estimate");
            return naive_token_estimate(messages);
        };

        let Some(counter) = self.counter(tokenizer_id) else {
            debug!(
                model = model_name,
                tokenizer = tokenizer_id,
                "tokenizer not available, using naive estimate"
            );
            return naive_token_estimate(messages);
        };

        let mut total = 0;
        for msg in messages {
            match counter.count(&format!("{}: {}", msg.role, msg.content)) {
                Ok(n) => total += n,
                Err(e) => {
                    warn!(
                        model = model_name,
                        error = %e,
                        "tokenizer failed, using naive estimate"
                    );
                    return naive_token_estimate(messages);
                }
            }
        }
        total
    }
}
