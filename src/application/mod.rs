//! 应用层：业务编排
//!
//! - `harvest`: 采集任务后台处理
//! - `llm_service`: 目录查找与 LLM 调用
//! - `analysis`: 分析与趋势转内容

pub mod analysis;
pub mod harvest;
pub mod llm_service;

pub use analysis::{AnalysisOutcome, AnalysisService};
pub use harvest::HarvestWorker;
pub use llm_service::LlmService;
