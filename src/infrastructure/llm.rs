//! LLM 客户端
//!
//! 通过 bearer 令牌调用 OpenAI 兼容的 chat-completion 端点

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use bytes::Buf;
use futures::future;
use futures::stream::{BoxStream, Stream, StreamExt, TryStreamExt};
use serde_json::Value;
use tokio_util::codec::{FramedRead, LinesCodec};
use tokio_util::io::StreamReader;
use tracing::debug;

use crate::infrastructure::logger::Sanitizer;

/// 流式响应：逐行（非空）返回
pub type LineStream = BoxStream<'static, Result<String>>;

/// Chat-completion 后端
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    /// 非流式调用，返回原始 JSON 响应
    async fn complete(&self, payload: &Value) -> Result<Value>;

    /// 流式调用
    async fn stream(&self, payload: &Value) -> Result<LineStream>;
}

/// HTTP chat-completion 客户端
#[derive(Clone)]
pub struct ChatCompletionClient {
    endpoint: String,
    token: String,
    http: reqwest::Client,
}

impl ChatCompletionClient {
    pub fn new(endpoint: impl Into<String>, token: impl Into<String>, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build http client")?;

        Ok(Self {
            endpoint: endpoint.into(),
            token: token.into(),
            http,
        })
    }

    async fn post(&self, payload: &Value) -> Result<reqwest::Response> {
        debug!(
            endpoint = %self.endpoint,
            token = %Sanitizer::api_token(&self.token),
            model = %payload.get("model").and_then(serde_json::Value::as_str).unwrap_or_default(),
            "calling chat-completion endpoint"
        );

        self.http
            .post(&self.endpoint)
            .bearer_auth(&self.token)
            .json(payload)
            .send()
            .await
            .context("failed to call LLM endpoint")
    }
}

#[async_trait]
impl CompletionBackend for ChatCompletionClient {
    async fn complete(&self, payload: &Value) -> Result<Value> {
        let response = self.post(payload).await?;
        let status = response.status();

        if status != reqwest::StatusCode::OK {
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("LLM API error: {} - {}", status.as_u16(), body);
        }

        response
            .json()
            .await
            .context("failed to parse LLM response")
    }

    async fn stream(&self, payload: &Value) -> Result<LineStream> {
        let response = self.post(payload).await?;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("LLM API error: {} - {}", status.as_u16(), body);
        }

        Ok(lines(response.bytes_stream().map_err(std::io::Error::other)).boxed())
    }
}

/// 把字节流切分为非空文本行（兼容 `\r\n`）；非 UTF-8 内容作为错误返回
pub fn lines<S, B>(bytes: S) -> impl Stream<Item = Result<String>> + Send + 'static
where
    S: Stream<Item = std::io::Result<B>> + Send + 'static,
    B: Buf + Send + 'static,
{
    FramedRead::new(StreamReader::new(bytes), LinesCodec::new())
        .map_err(|e| anyhow::Error::new(e).context("stream interrupted"))
        .try_filter(|line| future::ready(!line.is_empty()))
}
