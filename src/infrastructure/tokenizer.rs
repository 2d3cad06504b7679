//! HuggingFace tokenizer
//!
//! 通过 `tokenizers` 从 Hub 下载 `tokenizer.json`（受限模型需要 `HF_TOKEN`）

use std::sync::Arc;

use anyhow::{anyhow, Result};
use tokenizers::Tokenizer;

use crate::core::tokens::{TokenCounter, TokenizerSource};

/// 基于 `tokenizers::Tokenizer` 的计数器
pub struct HfTokenCounter {
    tokenizer: Tokenizer,
}

impl HfTokenCounter {
    pub fn new(tokenizer: Tokenizer) -> Self {
        Self { tokenizer }
    }
}

impl TokenCounter for HfTokenCounter {
    fn count(&self, text: &str) -> Result<usize> {
        let encoding = self
            .tokenizer
            .encode(text, false)
            .map_err(|e| anyhow!("tokenizer encode failed: {}", e))?;
        Ok(encoding.len())
    }
}

/// 从 HuggingFace Hub 加载 tokenizer
#[derive(Debug, Default, Clone, Copy)]
pub struct HubTokenizers;

impl TokenizerSource for HubTokenizers {
    fn load(&self, tokenizer_id: &str) -> Result<Arc<dyn TokenCounter>> {
        let tokenizer = Tokenizer::from_pretrained(tokenizer_id, None)
            .map_err(|e| anyhow!("cannot load tokenizer {}: {}", tokenizer_id, e))?;
        Ok(Arc::new(HfTokenCounter::new(tokenizer)))
    }
}
