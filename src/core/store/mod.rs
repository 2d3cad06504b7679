//! 存储接口定义
//!
//! 文档存储的抽象接口：采集任务、Discord 消息、分析结果、内容生成结果

use std::collections::HashSet;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::{AnalysisRecord, ContentRecord, DiscordMessage, HarvestJob, JobOutcome, Snowflake};

/// 存储接口
#[async_trait]
pub trait Store: Send + Sync {
    /// 新增采集任务，返回任务 ID
    async fn add_harvest_job(&self, job: &HarvestJob) -> Result<String>;

    async fn get_harvest_job(&self, job_id: &str) -> Result<Option<HarvestJob>>;

    /// 取出最早的待处理任务并标记为 running
    async fn claim_next_pending_job(&self) -> Result<Option<HarvestJob>>;

    /// 写入任务结果
    async fn finish_harvest_job(&self, job_id: &str, outcome: JobOutcome) -> Result<()>;

    /// 按消息 ID 去重写入，返回新增条数
    async fn save_messages_if_new(&self, messages: &[DiscordMessage]) -> Result<u64>;

    /// 给定频道中已有消息的频道 ID
    async fn harvested_channels(&self, channel_ids: &[Snowflake]) -> Result<HashSet<Snowflake>>;

    /// 频道在 [from, to] 内的消息（含两端）
    async fn messages_in_range(
        &self,
        channel_id: Snowflake,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<DiscordMessage>>;

    async fn insert_analysis(&self, record: &AnalysisRecord) -> Result<String>;

    async fn get_analysis(&self, analysis_id: &str) -> Result<Option<AnalysisRecord>>;

    async fn insert_content(&self, record: &ContentRecord) -> Result<String>;
}
