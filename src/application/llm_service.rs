//! LLM 调用服务
//!
//! 目录查找 → 载荷构建 → 调用后端

use std::sync::Arc;

use anyhow::Result;
use serde_json::{Map, Value};
use tracing::debug;

use crate::core::catalog::Catalog;
use crate::core::payload::{build_payload, build_payload_for_content, ChatPayload, UserContent};
use crate::core::tokens::TokenEstimator;
use crate::infrastructure::llm::{CompletionBackend, LineStream};
use crate::infrastructure::logger::Timer;

#[derive(Clone)]
pub struct LlmService {
    catalog: Arc<Catalog>,
    tokens: Arc<TokenEstimator>,
    backend: Arc<dyn CompletionBackend>,
}

impl LlmService {
    pub fn new(catalog: Arc<Catalog>, tokens: Arc<TokenEstimator>, backend: Arc<dyn CompletionBackend>) -> Self {
        Self {
            catalog,
            tokens,
            backend,
        }
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// 分析载荷（不发送）
    pub fn analyse_payload(
        &self,
        model_name: &str,
        prompt_name: &str,
        user_content: &UserContent,
        stream: bool,
        extra: Option<&Map<String, Value>>,
    ) -> Result<ChatPayload> {
        let model = self.catalog.get_model_config(model_name)?;
        let prompt = self.catalog.get_prompt_config(prompt_name)?;
        Ok(build_payload(model, prompt, user_content, &self.tokens, stream, extra))
    }

    /// 内容生成载荷（不发送）
    pub fn content_payload(
        &self,
        model_name: &str,
        prompt_name: &str,
        trend: &Value,
        stream: bool,
        extra: Option<&Map<String, Value>>,
    ) -> Result<ChatPayload> {
        let model = self.catalog.get_model_config(model_name)?;
        let prompt = self.catalog.get_prompt_config(prompt_name)?;
        Ok(build_payload_for_content(model, prompt, trend, stream, extra))
    }

    /// 分析：返回原始响应 JSON
    pub async fn analyse(
        &self,
        model_name: &str,
        prompt_name: &str,
        user_content: &UserContent,
        extra: Option<&Map<String, Value>>,
    ) -> Result<Value> {
        let payload = self.analyse_payload(model_name, prompt_name, user_content, false, extra)?;
        debug!(
            model = model_name,
            prompt = prompt_name,
            max_tokens = payload.max_tokens,
            "analyse payload built"
        );

        let _timer = Timer::new("llm.analyse").with_subject(model_name);
        self.backend.complete(&payload.to_json()).await
    }

    /// 分析（流式）
    pub async fn analyse_stream(
        &self,
        model_name: &str,
        prompt_name: &str,
        user_content: &UserContent,
        extra: Option<&Map<String, Value>>,
    ) -> Result<LineStream> {
        let payload = self.analyse_payload(model_name, prompt_name, user_content, true, extra)?;
        self.backend.stream(&payload.to_json()).await
    }

    /// 趋势转内容：返回原始响应 JSON
    pub async fn trend_to_content(
        &self,
        model_name: &str,
        prompt_name: &str,
        trend: &Value,
        extra: Option<&Map<String, Value>>,
    ) -> Result<Value> {
        let payload = self.content_payload(model_name, prompt_name, trend, false, extra)?;
        debug!(
            model = model_name,
            prompt = prompt_name,
            max_tokens = payload.max_tokens,
            "content payload built"
        );

        let _timer = Timer::new("llm.trend_to_content").with_subject(model_name);
        self.backend.complete(&payload.to_json()).await
    }

    /// 趋势转内容（流式）
    pub async fn trend_to_content_stream(
        &self,
        model_name: &str,
        prompt_name: &str,
        trend: &Value,
        extra: Option<&Map<String, Value>>,
    ) -> Result<LineStream> {
        let payload = self.content_payload(model_name, prompt_name, trend, true, extra)?;
        self.backend.stream(&payload.to_json()).await
    }
}
