//! Discord 服务器与频道

use serde::{Deserialize, Serialize};

use super::message::Snowflake;

/// 文本频道类型（GUILD_TEXT）
pub const GUILD_TEXT: u8 = 0;

/// 公告频道类型（GUILD_ANNOUNCEMENT），同样承载文本消息
pub const GUILD_ANNOUNCEMENT: u8 = 5;

/// Bot 所在的服务器
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GuildSummary {
    pub id: Snowflake,
    pub name: String,
}

/// 文本与公告频道都可采集
pub fn is_text_kind(kind: u8) -> bool {
    matches!(kind, GUILD_TEXT | GUILD_ANNOUNCEMENT)
}

/// 频道基础信息
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelInfo {
    pub id: Snowflake,
    pub name: String,
    pub guild_id: Option<Snowflake>,
    pub kind: u8,
}

impl ChannelInfo {
    pub fn is_text(&self) -> bool {
        is_text_kind(self.kind)
    }
}

/// 服务器及 Bot 可读的文本频道
#[derive(Debug, Clone, PartialEq)]
pub struct GuildChannels {
    pub guild: GuildSummary,
    pub channels: Vec<ChannelInfo>,
}
