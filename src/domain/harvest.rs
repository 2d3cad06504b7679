//! 采集任务领域实体

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::message::Snowflake;

/// 任务状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Running,
    Done,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Running => "running",
            JobStatus::Done => "done",
            JobStatus::Failed => "failed",
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 采集任务
///
/// `after` / `before` 可以是 Snowflake ID，也可以是 ISO-8601 时间
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HarvestJob {
    pub id: String,
    /// 发起采集的服务器管理员 Discord 用户 ID（不是 Bot ID）
    pub discord_id: String,
    pub server_id: Snowflake,
    pub channels: Vec<Snowflake>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub after: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub before: Option<String>,
    pub status: JobStatus,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub finished_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub inserted: Option<u64>,
    #[serde(default)]
    pub error: Option<String>,
}

impl HarvestJob {
    /// 创建待处理任务
    pub fn new(discord_id: impl Into<String>, server_id: Snowflake, channels: Vec<Snowflake>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            discord_id: discord_id.into(),
            server_id,
            channels,
            after: None,
            before: None,
            status: JobStatus::Pending,
            created_at: Utc::now(),
            finished_at: None,
            inserted: None,
            error: None,
        }
    }

    /// 设置采集区间，空字符串视为未设置
    pub fn with_bounds(mut self, after: Option<String>, before: Option<String>) -> Self {
        self.after = after.filter(|s| !s.is_empty());
        self.before = before.filter(|s| !s.is_empty());
        self
    }

    /// 应用任务结果
    pub fn finish(&mut self, outcome: JobOutcome) {
        self.finished_at = Some(Utc::now());
        match outcome {
            JobOutcome::Done { inserted } => {
                self.status = JobStatus::Done;
                self.inserted = Some(inserted);
            }
            JobOutcome::Failed { error } => {
                self.status = JobStatus::Failed;
                self.error = Some(error);
            }
        }
    }
}

/// 任务结束结果
#[derive(Debug, Clone, PartialEq)]
pub enum JobOutcome {
    Done { inserted: u64 },
    Failed { error: String },
}
