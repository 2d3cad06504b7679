//! 配置管理
//!
//! 命令行参数优先，其次环境变量（启动时会读取 `.env`）

use clap::Parser;

use crate::infrastructure::logger::LogFormat;

/// 默认 chat-completion 端点
pub const DEFAULT_LLM_ENDPOINT: &str =
    "https://oai.endpoints.kepler.ai.cloud.ovh.net/v1/chat/completions";

/// 默认 Discord REST API 地址
pub const DEFAULT_DISCORD_API_BASE: &str = "https://discord.com/api/v10";

#[derive(Parser, Debug, Clone)]
#[command(
    author,
    version,
    about = "Discord channel harvester and LLM trend analysis service"
)]
pub struct AppConfig {
    /// HTTP 监听地址
    #[arg(long, env = "BIND_ADDR", default_value = "0.0.0.0:8000")]
    pub bind_addr: String,

    /// SQLite 数据库路径
    #[arg(long, env = "DB_PATH", default_value = "./data/analyzer.db")]
    pub db_path: String,

    /// 模型目录文件
    #[arg(long, env = "LLM_MODELS_PATH", default_value = "./config/llm_models.yaml")]
    pub llm_models_path: String,

    /// 提示词目录文件
    #[arg(long, env = "PROMPT_MODELS_PATH", default_value = "./config/prompt_models.yaml")]
    pub prompt_models_path: String,

    // LLM 配置
    #[arg(long, env = "OVH_API_BASE_URL", default_value = DEFAULT_LLM_ENDPOINT)]
    pub llm_endpoint: String,

    #[arg(long, env = "OVH_AI_ENDPOINTS_ACCESS_TOKEN", default_value = "")]
    pub llm_access_token: String,

    /// LLM 请求超时（秒）
    #[arg(long, env = "LLM_TIMEOUT_SECS", default_value_t = 60)]
    pub llm_timeout_secs: u64,

    // Discord 配置
    #[arg(long, env = "DISCORD_BOT_TOKEN", default_value = "")]
    pub discord_bot_token: String,

    #[arg(long, env = "DISCORD_API_BASE", default_value = DEFAULT_DISCORD_API_BASE)]
    pub discord_api_base: String,

    /// 采集任务轮询间隔（秒）
    #[arg(long, env = "HARVEST_POLL_SECS", default_value_t = 3)]
    pub harvest_poll_secs: u64,

    /// 是否在本进程内运行采集 worker
    #[arg(long, env = "RUN_HARVEST_WORKER", default_value_t = true, action = clap::ArgAction::Set)]
    pub run_harvest_worker: bool,

    /// 日志格式: pretty, compact, json
    #[arg(long, env = "LOG_FORMAT", default_value = "pretty")]
    pub log_format: LogFormat,
}

impl AppConfig {
    /// 验证配置的有效性
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.llm_access_token.is_empty() {
            anyhow::bail!("OVH_AI_ENDPOINTS_ACCESS_TOKEN is required");
        }

        if self.discord_bot_token.is_empty() {
            anyhow::bail!("DISCORD_BOT_TOKEN is required");
        }

        if self.harvest_poll_secs == 0 {
            anyhow::bail!("HARVEST_POLL_SECS must be greater than zero");
        }

        Ok(())
    }
}
