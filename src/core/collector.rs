//! Discord 采集接口
//!
//! 服务只依赖这个抽象，REST 实现见 `infrastructure::discord`

use anyhow::Result;
use async_trait::async_trait;

use crate::domain::{ChannelInfo, DiscordMessage, GuildChannels, GuildSummary, Snowflake};

#[async_trait]
pub trait Collector: Send + Sync {
    /// Bot 所在的全部服务器
    async fn servers(&self) -> Result<Vec<GuildSummary>>;

    /// 服务器中 Bot 可读的文本频道；服务器不存在或 Bot 不在其中时返回 `None`
    async fn readable_text_channels(&self, guild_id: Snowflake) -> Result<Option<GuildChannels>>;

    /// 单个频道；不存在或无权访问时返回 `None`
    async fn channel(&self, channel_id: Snowflake) -> Result<Option<ChannelInfo>>;

    /// 拉取 `after` 与 `before` 之间的全部消息（Snowflake 或 ISO-8601）
    async fn fetch_messages(
        &self,
        channel: &ChannelInfo,
        after: Option<&str>,
        before: Option<&str>,
    ) -> Result<Vec<DiscordMessage>>;
}
