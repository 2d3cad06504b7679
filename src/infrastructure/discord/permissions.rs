//! 频道权限计算
//!
//! 顺序：@everyone 角色 → 成员角色 → 管理员/所有者 → 频道覆盖
//! （@everyone 覆盖、角色覆盖合并、成员覆盖）

use crate::domain::Snowflake;

pub const ADMINISTRATOR: u64 = 1 << 3;
pub const VIEW_CHANNEL: u64 = 1 << 10;
pub const ALL: u64 = u64::MAX;

/// 覆盖目标类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverwriteKind {
    Role,
    Member,
}

/// 频道权限覆盖
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Overwrite {
    pub id: Snowflake,
    pub kind: OverwriteKind,
    pub allow: u64,
    pub deny: u64,
}

/// 成员在服务器中的身份
#[derive(Debug, Clone)]
pub struct MemberContext<'a> {
    pub guild_id: Snowflake,
    pub owner_id: Option<Snowflake>,
    pub member_id: Snowflake,
    pub member_roles: &'a [Snowflake],
    /// 服务器全部角色 (id, permissions)
    pub guild_roles: &'a [(Snowflake, u64)],
}

impl MemberContext<'_> {
    /// 服务器级权限
    pub fn base_permissions(&self) -> u64 {
        if self.owner_id == Some(self.member_id) {
            return ALL;
        }

        // @everyone 角色 ID 等于服务器 ID
        let mut permissions = self
            .guild_roles
            .iter()
            .find(|(id, _)| *id == self.guild_id)
            .map(|(_, p)| *p)
            .unwrap_or(0);

        for (role_id, role_permissions) in self.guild_roles {
            if self.member_roles.contains(role_id) {
                permissions |= role_permissions;
            }
        }

        if permissions & ADMINISTRATOR == ADMINISTRATOR {
            return ALL;
        }
        permissions
    }

    /// 应用频道覆盖后的权限
    pub fn channel_permissions(&self, overwrites: &[Overwrite]) -> u64 {
        let base = self.base_permissions();
        if base & ADMINISTRATOR == ADMINISTRATOR {
            return ALL;
        }

        let mut permissions = base;

        if let Some(everyone) = overwrites
            .iter()
            .find(|o| o.kind == OverwriteKind::Role && o.id == self.guild_id)
        {
            permissions &= !everyone.deny;
            permissions |= everyone.allow;
        }

        let (mut allow, mut deny) = (0u64, 0u64);
        for overwrite in overwrites.iter().filter(|o| {
            o.kind == OverwriteKind::Role && o.id != self.guild_id && self.member_roles.contains(&o.id)
        }) {
            allow |= overwrite.allow;
            deny |= overwrite.deny;
        }
        permissions &= !deny;
        permissions |= allow;

        if let Some(member) = overwrites
            .iter()
            .find(|o| o.kind == OverwriteKind::Member && o.id == self.member_id)
        {
            permissions &= !member.deny;
            permissions |= member.allow;
        }

        permissions
    }

    pub fn can_view(&self, overwrites: &[Overwrite]) -> bool {
        self.channel_permissions(overwrites) & VIEW_CHANNEL == VIEW_CHANNEL
    }
}
