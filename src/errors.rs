//! 标准化错误处理
//!
//! 定义服务专用的错误类型。`Display` 文本即对外返回的错误详情。

use thiserror::Error;

/// 服务主要错误类型
#[derive(Error, Debug)]
pub enum AnalyzerError {
    /// 配置错误
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// 存储相关错误
    #[error("Storage error: {0}")]
    StorageError(String),

    /// LLM 服务错误
    #[error("LLM error: {0}")]
    LlmError(String),

    /// 输入验证错误
    #[error("{0}")]
    ValidationError(String),

    /// 资源不存在
    #[error("{0}")]
    NotFound(String),

    /// 内部处理错误（如 LLM 返回内容无法解析）
    #[error("{0}")]
    Internal(String),
}

impl AnalyzerError {
    /// 以 `{:#}` 展开 anyhow 错误链，保留底层原因
    pub fn llm(err: impl std::fmt::Display) -> Self {
        AnalyzerError::LlmError(format!("{:#}", err))
    }

    pub fn storage(err: impl std::fmt::Display) -> Self {
        AnalyzerError::StorageError(format!("{:#}", err))
    }
}

impl From<serde_json::Error> for AnalyzerError {
    fn from(err: serde_json::Error) -> Self {
        AnalyzerError::Internal(err.to_string())
    }
}

impl From<serde_yaml::Error> for AnalyzerError {
    fn from(err: serde_yaml::Error) -> Self {
        AnalyzerError::ConfigError(err.to_string())
    }
}

/// 服务结果类型别名
pub type Result<T> = std::result::Result<T, AnalyzerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detail_text() {
        assert_eq!(
            AnalyzerError::ValidationError("Invalid job_id format".into()).to_string(),
            "Invalid job_id format"
        );
        assert_eq!(
            AnalyzerError::LlmError("timeout".into()).to_string(),
            "LLM error: timeout"
        );
    }

    #[test]
    fn test_llm_keeps_error_chain() {
        let err = anyhow::anyhow!("connection refused").context("failed to call LLM endpoint");
        let wrapped = AnalyzerError::llm(err);
        assert_eq!(
            wrapped.to_string(),
            "LLM error: failed to call LLM endpoint: connection refused"
        );
    }
}
