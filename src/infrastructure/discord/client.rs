use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::header::AUTHORIZATION;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tokio::sync::OnceCell;
use tracing::{debug, info};

use super::permissions::{MemberContext, Overwrite, OverwriteKind};
use super::snowflake::parse_bound;
use crate::core::collector::Collector;
use crate::domain::{is_text_kind, ChannelInfo, DiscordMessage, GuildChannels, GuildSummary, Snowflake};

/// 单页消息上限
const PAGE_SIZE: usize = 100;

/// 单页服务器上限
const GUILD_PAGE_SIZE: usize = 200;

fn snowflake(raw: &str) -> Result<Snowflake> {
    raw.parse()
        .with_context(|| format!("invalid snowflake from discord: {}", raw))
}

fn bits(raw: &str) -> Result<u64> {
    raw.parse()
        .with_context(|| format!("invalid permission bitset from discord: {}", raw))
}

#[derive(Debug, Deserialize)]
struct RawGuild {
    id: String,
    name: String,
    #[serde(default)]
    owner_id: Option<String>,
    #[serde(default)]
    roles: Vec<RawRole>,
}

#[derive(Debug, Deserialize)]
struct RawRole {
    id: String,
    permissions: String,
}

#[derive(Debug, Deserialize)]
struct RawUser {
    id: String,
    #[serde(default)]
    username: Option<String>,
    #[serde(default)]
    global_name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct RawMember {
    #[serde(default)]
    roles: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct RawChannel {
    id: String,
    #[serde(rename = "type")]
    kind: u8,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    guild_id: Option<String>,
    #[serde(default)]
    position: Option<i64>,
    #[serde(default)]
    permission_overwrites: Vec<RawOverwrite>,
}

#[derive(Debug, Deserialize)]
struct RawOverwrite {
    id: String,
    #[serde(rename = "type")]
    kind: u8,
    allow: String,
    deny: String,
}

#[derive(Debug, Deserialize)]
struct RawMessage {
    id: String,
    channel_id: String,
    author: RawUser,
    #[serde(default)]
    content: String,
    timestamp: DateTime<Utc>,
    #[serde(default)]
    message_reference: Option<RawReference>,
}

#[derive(Debug, Deserialize)]
struct RawReference {
    #[serde(default)]
    message_id: Option<String>,
}

impl RawChannel {
    fn info(&self) -> Result<ChannelInfo> {
        Ok(ChannelInfo {
            id: snowflake(&self.id)?,
            name: self.name.clone().unwrap_or_default(),
            guild_id: self.guild_id.as_deref().map(snowflake).transpose()?,
            kind: self.kind,
        })
    }

    fn overwrites(&self) -> Result<Vec<Overwrite>> {
        self.permission_overwrites
            .iter()
            .map(|o| {
                Ok(Overwrite {
                    id: snowflake(&o.id)?,
                    kind: if o.kind == 1 {
                        OverwriteKind::Member
                    } else {
                        OverwriteKind::Role
                    },
                    allow: bits(&o.allow)?,
                    deny: bits(&o.deny)?,
                })
            })
            .collect()
    }
}

impl RawMessage {
    fn into_message(self, server_id: Option<Snowflake>, fetched_at: DateTime<Utc>) -> Result<DiscordMessage> {
        Ok(DiscordMessage {
            id: snowflake(&self.id)?,
            channel_id: snowflake(&self.channel_id)?,
            server_id,
            user_id: Some(snowflake(&self.author.id)?),
            author_name: self.author.global_name.or(self.author.username),
            content: self.content,
            created_at_by_discord: self.timestamp,
            parent_message_id: self
                .message_reference
                .and_then(|r| r.message_id)
                .as_deref()
                .map(snowflake)
                .transpose()?,
            fetched_at,
        })
    }
}

/// Discord REST 客户端（Bot 令牌）
pub struct DiscordClient {
    api_base: String,
    token: String,
    http: reqwest::Client,
    bot_user_id: OnceCell<Snowflake>,
}

impl DiscordClient {
    pub fn new(api_base: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            api_base: api_base.into().trim_end_matches('/').to_string(),
            token: token.into(),
            http: reqwest::Client::new(),
            bot_user_id: OnceCell::new(),
        }
    }

    async fn request(&self, path: &str, query: &[(&str, String)]) -> Result<reqwest::Response> {
        let url = format!("{}{}", self.api_base, path);
        debug!(%url, "discord request");

        self.http
            .get(url)
            .header(AUTHORIZATION, format!("Bot {}", self.token))
            .query(query)
            .send()
            .await
            .context("failed to query discord")
    }

    async fn get<T: DeserializeOwned>(&self, path: &str, query: &[(&str, String)]) -> Result<T> {
        self.request(path, query)
            .await?
            .error_for_status()
            .context("discord returned non-success status")?
            .json()
            .await
            .context("failed to deserialize discord response")
    }

    /// 404 / 403 视为不存在
    async fn get_optional<T: DeserializeOwned>(&self, path: &str) -> Result<Option<T>> {
        let res = self.request(path, &[]).await?;
        if matches!(res.status(), StatusCode::NOT_FOUND | StatusCode::FORBIDDEN) {
            return Ok(None);
        }

        let body = res
            .error_for_status()
            .context("discord returned non-success status")?
            .json()
            .await
            .context("failed to deserialize discord response")?;
        Ok(Some(body))
    }

    async fn bot_user_id(&self) -> Result<Snowflake> {
        self.bot_user_id
            .get_or_try_init(|| async {
                let me: RawUser = self.get("/users/@me", &[]).await?;
                snowflake(&me.id)
            })
            .await
            .copied()
    }

    async fn fetch_page(
        &self,
        channel_id: Snowflake,
        cursor: Option<(&str, Snowflake)>,
    ) -> Result<Vec<RawMessage>> {
        let mut query = vec![("limit", PAGE_SIZE.to_string())];
        if let Some((key, id)) = cursor {
            query.push((key, id.to_string()));
        }
        self.get(&format!("/channels/{}/messages", channel_id), &query)
            .await
    }
}

#[async_trait]
impl Collector for DiscordClient {
    async fn servers(&self) -> Result<Vec<GuildSummary>> {
        let mut servers = Vec::new();
        let mut cursor: Option<Snowflake> = None;

        loop {
            let mut query = vec![("limit", GUILD_PAGE_SIZE.to_string())];
            if let Some(after) = cursor {
                query.push(("after", after.to_string()));
            }
            let page: Vec<RawGuild> = self.get("/users/@me/guilds", &query).await?;
            let full_page = page.len() == GUILD_PAGE_SIZE;

            let mut last = cursor;
            for guild in page {
                let id = snowflake(&guild.id)?;
                last = Some(last.map_or(id, |l| l.max(id)));
                servers.push(GuildSummary { id, name: guild.name });
            }

            if !full_page || last == cursor {
                break;
            }
            cursor = last;
        }

        debug!(count = servers.len(), "listed bot guilds");
        Ok(servers)
    }

    async fn readable_text_channels(&self, guild_id: Snowflake) -> Result<Option<GuildChannels>> {
        let Some(guild) = self.get_optional::<RawGuild>(&format!("/guilds/{}", guild_id)).await? else {
            return Ok(None);
        };

        let bot_id = self.bot_user_id().await?;
        let member: RawMember = self
            .get_optional(&format!("/guilds/{}/members/{}", guild_id, bot_id))
            .await?
            .unwrap_or_default();
        let mut channels: Vec<RawChannel> = self
            .get(&format!("/guilds/{}/channels", guild_id), &[])
            .await?;
        channels.sort_by_key(|c| c.position.unwrap_or(i64::MAX));

        let guild_roles = guild
            .roles
            .iter()
            .map(|r| Ok((snowflake(&r.id)?, bits(&r.permissions)?)))
            .collect::<Result<Vec<_>>>()?;
        let member_roles = member
            .roles
            .iter()
            .map(|r| snowflake(r))
            .collect::<Result<Vec<_>>>()?;

        let ctx = MemberContext {
            guild_id,
            owner_id: guild.owner_id.as_deref().map(snowflake).transpose()?,
            member_id: bot_id,
            member_roles: &member_roles,
            guild_roles: &guild_roles,
        };

        let mut readable = Vec::new();
        for channel in channels.iter().filter(|c| is_text_kind(c.kind)) {
            if ctx.can_view(&channel.overwrites()?) {
                readable.push(channel.info()?);
            }
        }

        Ok(Some(GuildChannels {
            guild: GuildSummary {
                id: snowflake(&guild.id)?,
                name: guild.name,
            },
            channels: readable,
        }))
    }

    async fn channel(&self, channel_id: Snowflake) -> Result<Option<ChannelInfo>> {
        let raw: Option<RawChannel> = self.get_optional(&format!("/channels/{}", channel_id)).await?;
        raw.map(|c| c.info()).transpose()
    }

    async fn fetch_messages(
        &self,
        channel: &ChannelInfo,
        after: Option<&str>,
        before: Option<&str>,
    ) -> Result<Vec<DiscordMessage>> {
        let after = after.map(parse_bound).transpose()?;
        let before = before.map(parse_bound).transpose()?;
        let fetched_at = Utc::now();
        let mut messages = Vec::new();

        match after {
            // 从 after 向后翻页
            Some(after_id) => {
                let mut cursor = after_id;
                loop {
                    let page = self.fetch_page(channel.id, Some(("after", cursor))).await?;
                    let full_page = page.len() == PAGE_SIZE;
                    let mut newest = cursor;
                    let mut past_upper_bound = false;

                    for raw in page {
                        let msg = raw.into_message(channel.guild_id, fetched_at)?;
                        newest = newest.max(msg.id);
                        if before.map_or(true, |b| msg.id < b) {
                            messages.push(msg);
                        } else {
                            past_upper_bound = true;
                        }
                    }

                    if !full_page || past_upper_bound || newest == cursor {
                        break;
                    }
                    cursor = newest;
                }
            }
            // 从 before（或最新）向前翻页
            None => {
                let mut cursor = before;
                loop {
                    let page = self
                        .fetch_page(channel.id, cursor.map(|id| ("before", id)))
                        .await?;
                    let full_page = page.len() == PAGE_SIZE;
                    let mut oldest = cursor;

                    for raw in page {
                        let msg = raw.into_message(channel.guild_id, fetched_at)?;
                        oldest = Some(oldest.map_or(msg.id, |o| o.min(msg.id)));
                        messages.push(msg);
                    }

                    if !full_page || oldest == cursor {
                        break;
                    }
                    cursor = oldest;
                }
            }
        }

        messages.sort_by_key(|m| m.id);
        info!(
            channel_id = channel.id,
            count = messages.len(),
            "fetched channel history"
        );
        Ok(messages)
    }
}
