//! 消息领域实体
//!
//! 已采集的 Discord 频道消息

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Discord Snowflake ID
pub type Snowflake = u64;

/// Snowflake 的字符串序列化；反序列化同时接受字符串和数字
pub mod snowflake_str {
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    use super::Snowflake;

    #[derive(Deserialize)]
    #[serde(untagged)]
    pub(crate) enum Raw {
        Num(u64),
        Str(String),
    }

    impl Raw {
        pub(crate) fn into_snowflake<E: Error>(self) -> Result<Snowflake, E> {
            match self {
                Raw::Num(n) => Ok(n),
                Raw::Str(s) => s
                    .trim()
                    .parse()
                    .map_err(|_| E::custom(format!("invalid snowflake: {}", s))),
            }
        }
    }

    pub fn serialize<S: Serializer>(id: &Snowflake, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(id)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Snowflake, D::Error> {
        Raw::deserialize(deserializer)?.into_snowflake()
    }
}

/// `Vec<Snowflake>` 版本
pub mod snowflake_list {
    use serde::{Deserialize, Deserializer, Serializer};

    use super::snowflake_str::Raw;
    use super::Snowflake;

    pub fn serialize<S: Serializer>(ids: &[Snowflake], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(ids.iter().map(|id| id.to_string()))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<Snowflake>, D::Error> {
        Vec::<Raw>::deserialize(deserializer)?
            .into_iter()
            .map(Raw::into_snowflake)
            .collect()
    }
}

/// 已采集的 Discord 消息
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscordMessage {
    pub id: Snowflake,
    pub channel_id: Snowflake,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_id: Option<Snowflake>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<Snowflake>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author_name: Option<String>,
    pub content: String,
    pub created_at_by_discord: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_message_id: Option<Snowflake>,
    pub fetched_at: DateTime<Utc>,
}

impl DiscordMessage {
    /// 作者显示名：优先昵称，其次用户 ID，都没有时为 `?`
    pub fn author_label(&self) -> String {
        match (&self.author_name, self.user_id) {
            (Some(name), _) => name.clone(),
            (None, Some(id)) => id.to_string(),
            (None, None) => "?".to_string(),
        }
    }

    /// 格式化为提示词中的一行：`[YYYY-MM-DD HH:MM] author: content`
    pub fn prompt_line(&self) -> String {
        format!(
            "[{}] {}: {}",
            self.created_at_by_discord.format("%Y-%m-%d %H:%M"),
            self.author_label(),
            self.content
        )
    }
}
