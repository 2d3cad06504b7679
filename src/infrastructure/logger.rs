//! 日志模块 - 结构化日志、耗时记录与敏感信息脱敏
//!
//! - `RUST_LOG`: 日志级别过滤（如 `info`, `debug`, `warn,snowledge_analyzer=trace`）
//! - `LOG_FORMAT`: 日志格式（`pretty`, `compact`, `json`）

use std::time::Instant;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// 日志格式类型
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LogFormat {
    /// 人类可读格式（带颜色）
    Pretty,
    /// 紧凑单行格式
    Compact,
    /// JSON 结构化格式（适合日志收集系统）
    Json,
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pretty" => Ok(LogFormat::Pretty),
            "compact" => Ok(LogFormat::Compact),
            "json" => Ok(LogFormat::Json),
            _ => Err(format!("unknown log format: {}", s)),
        }
    }
}

impl std::fmt::Display for LogFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogFormat::Pretty => write!(f, "pretty"),
            LogFormat::Compact => write!(f, "compact"),
            LogFormat::Json => write!(f, "json"),
        }
    }
}

/// 日志配置
#[derive(Debug, Clone)]
pub struct LogConfig {
    pub format: LogFormat,
    /// 是否启用颜色（JSON 格式无效）
    pub enable_color: bool,
    /// 是否显示目标模块
    pub show_target: bool,
    /// 是否显示文件名和行号
    pub show_file: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::Pretty,
            enable_color: true,
            show_target: true,
            show_file: false,
        }
    }
}

impl LogConfig {
    pub fn with_format(format: LogFormat) -> Self {
        Self {
            format,
            ..Default::default()
        }
    }
}

/// 初始化日志系统
///
/// 重复调用时保留第一次的订阅者
pub fn init(config: LogConfig) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let subscriber = tracing_subscriber::registry().with(env_filter);

    let result = match config.format {
        LogFormat::Pretty => {
            let fmt_layer = tracing_subscriber::fmt::layer()
                .pretty()
                .with_target(config.show_target)
                .with_file(config.show_file)
                .with_line_number(config.show_file)
                .with_ansi(config.enable_color);
            subscriber.with(fmt_layer).try_init()
        }
        LogFormat::Compact => {
            let fmt_layer = tracing_subscriber::fmt::layer()
                .compact()
                .with_target(config.show_target)
                .with_file(config.show_file)
                .with_line_number(config.show_file)
                .with_ansi(config.enable_color);
            subscriber.with(fmt_layer).try_init()
        }
        LogFormat::Json => {
            let fmt_layer = tracing_subscriber::fmt::layer()
                .json()
                .with_target(config.show_target)
                .with_file(config.show_file)
                .with_line_number(config.show_file)
                .with_current_span(true)
                .with_span_list(true);
            subscriber.with(fmt_layer).try_init()
        }
    };

    if let Err(e) = result {
        tracing::debug!("logger already initialised: {}", e);
    }
}

/// 性能计时器 - 离开作用域时记录耗时
pub struct Timer {
    name: String,
    start: Instant,
    subject: Option<String>,
}

impl Timer {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            start: Instant::now(),
            subject: None,
        }
    }

    /// 关联对象（模型名、任务 ID 等）
    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        let elapsed_ms = self.start.elapsed().as_secs_f64() * 1000.0;

        match &self.subject {
            Some(subject) => {
                tracing::info!(
                    target: "metrics",
                    operation = %self.name,
                    subject = %subject,
                    elapsed_ms = %format!("{:.2}", elapsed_ms),
                    "operation completed"
                );
            }
            None => {
                tracing::info!(
                    target: "metrics",
                    operation = %self.name,
                    elapsed_ms = %format!("{:.2}", elapsed_ms),
                    "operation completed"
                );
            }
        }
    }
}

/// 敏感信息脱敏工具
pub struct Sanitizer;

impl Sanitizer {
    /// API 访问令牌 - 只保留前 6 位和后 4 位
    pub fn api_token(token: &str) -> String {
        let chars: Vec<char> = token.chars().collect();
        if chars.len() <= 16 {
            return "***".to_string();
        }
        let head: String = chars[..6].iter().collect();
        let tail: String = chars[chars.len() - 4..].iter().collect();
        format!("{}...{}", head, tail)
    }

    /// Bot 令牌 - 完全隐藏
    pub fn bot_token(_token: &str) -> String {
        "***TOKEN***".to_string()
    }
}
