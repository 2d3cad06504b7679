//! Discord REST 采集器
//!
//! 服务器/频道列表、可读权限判断和历史消息翻页

mod client;
pub mod permissions;
pub mod snowflake;

pub use client::DiscordClient;
