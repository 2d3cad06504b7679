//! Discord 趋势分析服务
//!
//! 提供以下能力：
//! - 采集 Discord 频道历史消息（后台任务队列）
//! - 构建 chat-completion 载荷并按上下文窗口分配 `max_tokens`
//! - 对频道消息做趋势分析，并把单个趋势转为内容
//!
//! # 架构分层
//!
//! - `domain`: 领域实体
//! - `core`: 核心层，目录、载荷构建、token 估算、存储与采集接口
//! - `infrastructure`: 基础设施层，外部系统交互
//! - `application`: 应用层，业务编排

pub mod application;
pub mod bootstrap;
pub mod core;
pub mod domain;
pub mod errors;
pub mod infrastructure;

// 重新导出常用类型
pub use application::{AnalysisOutcome, AnalysisService, HarvestWorker, LlmService};
pub use crate::core::catalog::{Catalog, ModelConfig, PromptConfig};
pub use crate::core::config::AppConfig;
pub use crate::core::payload::{build_payload, build_payload_for_content, ChatPayload, UserContent};
pub use crate::core::tokens::{naive_token_estimate, TokenCounter, TokenEstimator};
pub use errors::{AnalyzerError, Result};
pub use infrastructure::logger;

/// 服务版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
