//! 测试通用工具
//!
//! 假的 Discord 采集器、假的 LLM 后端、目录样例和 HTTP 测试服务器

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, Once};

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use serde_json::{json, Value};

use snowledge_analyzer::application::{AnalysisService, LlmService};
use snowledge_analyzer::core::catalog::Catalog;
use snowledge_analyzer::core::collector::Collector;
use snowledge_analyzer::core::store::Store;
use snowledge_analyzer::core::tokens::TokenEstimator;
use snowledge_analyzer::domain::{
    AnalysisPeriod, AnalysisRecord, AnalysisScope, ChannelInfo, DiscordMessage, GuildChannels, GuildSummary,
    Snowflake, GUILD_TEXT, PLATFORM_DISCORD,
};
use snowledge_analyzer::infrastructure::discord::snowflake::parse_bound;
use snowledge_analyzer::infrastructure::llm::{CompletionBackend, LineStream};
use snowledge_analyzer::infrastructure::store::SqliteStore;
use snowledge_analyzer::infrastructure::web::{create_router, AppState};

static INIT: Once = Once::new();

/// 初始化测试环境
pub fn setup() {
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter("debug")
            .with_test_writer()
            .try_init();
    });
}

pub const MODELS_YAML: &str = r#"
llm_models:
  - name: small-model
    context_window: 1000
    temperature: 0.5
lrm_models:
  - name: reasoning-model
    top_p: 0.95
vlm_models:
  - name: small-model
    context_window: 99
"#;

pub const PROMPTS_YAML: &str = r#"
prompt_models:
  discord_trends:
    temperature: 0.1
    response_format:
      type: json_object
    messages:
      - role: system
        content: "Answer in at most {{max_tokens}} tokens."
      - role: user
        content: "Messages:\n{{messages}}"
  trend_to_content:
    messages:
      - role: user
        content: "Write a post about:\n{{trend}}"
"#;

pub fn catalog() -> Arc<Catalog> {
    Arc::new(Catalog::from_yaml_str(MODELS_YAML, PROMPTS_YAML).unwrap())
}

pub fn message(id: Snowflake, channel_id: Snowflake, at: DateTime<Utc>, author: Option<&str>, content: &str) -> DiscordMessage {
    DiscordMessage {
        id,
        channel_id,
        server_id: Some(1),
        user_id: Some(id + 1000),
        author_name: author.map(str::to_string),
        content: content.to_string(),
        created_at_by_discord: at,
        parent_message_id: None,
        fetched_at: Utc::now(),
    }
}

pub fn text_channel(id: Snowflake, name: &str) -> ChannelInfo {
    ChannelInfo {
        id,
        name: name.to_string(),
        guild_id: Some(1),
        kind: GUILD_TEXT,
    }
}

/// chat-completion 响应，`content` 为 JSON 文本
pub fn completion_response(content: &Value) -> Value {
    json!({
        "id": "cmpl-1",
        "choices": [{"index": 0, "message": {"role": "assistant", "content": content.to_string()}}],
        "timeframe": "2024-05",
    })
}

/// 直接写入一条分析结果，返回 ID
pub async fn stored_analysis(store: &dyn Store, result: Value) -> String {
    let record = AnalysisRecord {
        id: uuid::Uuid::new_v4().to_string(),
        creator_id: 7,
        platform: PLATFORM_DISCORD.to_string(),
        prompt_key: "discord_trends".to_string(),
        llm_model: Some("small-model".to_string()),
        scope: AnalysisScope {
            server_id: 1,
            channel_id: 10,
        },
        period: AnalysisPeriod {
            from: Utc::now() - chrono::Duration::days(7),
            to: Utc::now(),
        },
        result,
        created_at: Utc::now(),
    };
    store.insert_analysis(&record).await.unwrap()
}

pub fn two_trends() -> Value {
    json!({
        "trends": [
            {"title": "Async Rust", "summary": "Lots of tokio questions", "activity_level": "high"},
            {
                "title": "Été release",
                "summary": "Release party planning",
                "representative_messages": ["see you there"],
                "activity_level": "medium"
            }
        ]
    })
}

// ==================== 假的 Discord 采集器 ====================

#[derive(Default)]
pub struct FakeCollector {
    pub guilds: Vec<GuildChannels>,
    pub channels: HashMap<Snowflake, ChannelInfo>,
    pub messages: HashMap<Snowflake, Vec<DiscordMessage>>,
    /// 加载时报错的频道
    pub broken_channels: HashSet<Snowflake>,
    /// 拉取消息时报错的频道
    pub broken_history: HashSet<Snowflake>,
    pub fail_servers: bool,
}

impl FakeCollector {
    pub fn with_guild(mut self, id: Snowflake, name: &str, channels: Vec<ChannelInfo>) -> Self {
        for channel in &channels {
            self.channels.insert(channel.id, channel.clone());
        }
        self.guilds.push(GuildChannels {
            guild: GuildSummary {
                id,
                name: name.to_string(),
            },
            channels,
        });
        self
    }

    pub fn with_channel(mut self, channel: ChannelInfo) -> Self {
        self.channels.insert(channel.id, channel);
        self
    }

    pub fn with_messages(mut self, channel_id: Snowflake, messages: Vec<DiscordMessage>) -> Self {
        self.messages.entry(channel_id).or_default().extend(messages);
        self
    }
}

#[async_trait]
impl Collector for FakeCollector {
    async fn servers(&self) -> Result<Vec<GuildSummary>> {
        if self.fail_servers {
            anyhow::bail!("gateway unavailable");
        }
        Ok(self.guilds.iter().map(|g| g.guild.clone()).collect())
    }

    async fn readable_text_channels(&self, guild_id: Snowflake) -> Result<Option<GuildChannels>> {
        Ok(self.guilds.iter().find(|g| g.guild.id == guild_id).cloned())
    }

    async fn channel(&self, channel_id: Snowflake) -> Result<Option<ChannelInfo>> {
        if self.broken_channels.contains(&channel_id) {
            anyhow::bail!("missing access to channel {}", channel_id);
        }
        Ok(self.channels.get(&channel_id).cloned())
    }

    async fn fetch_messages(
        &self,
        channel: &ChannelInfo,
        after: Option<&str>,
        before: Option<&str>,
    ) -> Result<Vec<DiscordMessage>> {
        if self.broken_history.contains(&channel.id) {
            anyhow::bail!("403 Forbidden");
        }
        let after = after.map(parse_bound).transpose()?;
        let before = before.map(parse_bound).transpose()?;

        Ok(self
            .messages
            .get(&channel.id)
            .into_iter()
            .flatten()
            .filter(|m| after.map_or(true, |a| m.id > a) && before.map_or(true, |b| m.id < b))
            .cloned()
            .collect())
    }
}

// ==================== 假的 LLM 后端 ====================

/// 记录每次请求的载荷，按顺序返回预设响应
#[derive(Default)]
pub struct FakeBackend {
    pub payloads: Mutex<Vec<Value>>,
    responses: Mutex<Vec<Value>>,
    pub fail_with: Option<String>,
}

impl FakeBackend {
    pub fn responding(responses: Vec<Value>) -> Self {
        Self {
            responses: Mutex::new(responses),
            ..Default::default()
        }
    }

    pub fn failing(error: &str) -> Self {
        Self {
            fail_with: Some(error.to_string()),
            ..Default::default()
        }
    }

    pub fn payloads(&self) -> Vec<Value> {
        self.payloads.lock().unwrap().clone()
    }

    fn next(&self, payload: &Value) -> Result<Value> {
        self.payloads.lock().unwrap().push(payload.clone());
        if let Some(error) = &self.fail_with {
            anyhow::bail!("LLM API error: 503 - {}", error);
        }
        let mut responses = self.responses.lock().unwrap();
        if responses.is_empty() {
            anyhow::bail!("no canned response left");
        }
        Ok(responses.remove(0))
    }
}

#[async_trait]
impl CompletionBackend for FakeBackend {
    async fn complete(&self, payload: &Value) -> Result<Value> {
        self.next(payload)
    }

    async fn stream(&self, payload: &Value) -> Result<LineStream> {
        let body = self.next(payload)?;
        let lines: Vec<Result<String>> = vec![Ok(format!("data: {}", body)), Ok("data: [DONE]".to_string())];
        Ok(stream::iter(lines).boxed())
    }
}

// ==================== 组装 ====================

pub struct TestApp {
    pub store: Arc<SqliteStore>,
    pub backend: Arc<FakeBackend>,
    pub state: Arc<AppState>,
}

pub fn build_app(collector: FakeCollector, backend: FakeBackend) -> TestApp {
    setup();
    let store = Arc::new(SqliteStore::new_in_memory().unwrap());
    let backend = Arc::new(backend);
    let llm = LlmService::new(catalog(), Arc::new(TokenEstimator::new()), backend.clone());

    let store_dyn: Arc<dyn Store> = store.clone();
    let state = Arc::new(AppState {
        analysis: AnalysisService::new(store_dyn.clone(), llm),
        store: store_dyn,
        collector: Arc::new(collector),
    });

    TestApp { store, backend, state }
}

/// 在随机端口启动路由，返回地址
pub async fn spawn_app(state: Arc<AppState>) -> SocketAddr {
    spawn_router(create_router(state)).await
}

/// 在随机端口启动任意路由（用于假的 Discord / LLM 服务）
pub async fn spawn_router(router: axum::Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    addr
}
