//! Permission bitmask and channel permission evaluation.
//!
//! Evaluation follows the platform's documented order: @everyone role, the
//! member's roles, owner/administrator short-circuit, then @everyone, role
//! and member overwrites of the channel. A channel the member cannot view
//! grants nothing.

use std::ops::{BitAnd, BitOr, BitOrAssign, Not};

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::ids::{GuildId, RoleId, UserId, deserialize_u64_lenient};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct Permissions(u64);

impl Permissions {
    pub const ADMINISTRATOR: Self = Self(1 << 3);
    pub const MANAGE_CHANNELS: Self = Self(1 << 4);
    pub const MANAGE_GUILD: Self = Self(1 << 5);
    pub const VIEW_CHANNEL: Self = Self(1 << 10);
    pub const SEND_MESSAGES: Self = Self(1 << 11);
    pub const MANAGE_MESSAGES: Self = Self(1 << 13);
    pub const READ_MESSAGE_HISTORY: Self = Self(1 << 16);
    pub const MANAGE_THREADS: Self = Self(1 << 34);
    pub const SEND_MESSAGES_IN_THREADS: Self = Self(1 << 38);

    pub const ALL: Self = Self(u64::MAX);

    pub const fn empty() -> Self {
        Self(0)
    }

    pub const fn from_bits(bits: u64) -> Self {
        Self(bits)
    }

    pub const fn bits(self) -> u64 {
        self.0
    }

    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl BitOr for Permissions {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for Permissions {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl BitAnd for Permissions {
    type Output = Self;

    fn bitand(self, rhs: Self) -> Self {
        Self(self.0 & rhs.0)
    }
}

impl Not for Permissions {
    type Output = Self;

    fn not(self) -> Self {
        Self(!self.0)
    }
}

// The API encodes permission sets as decimal strings.
impl Serialize for Permissions {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0.to_string())
    }
}

impl<'de> Deserialize<'de> for Permissions {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserialize_u64_lenient(deserializer).map(Self)
    }
}

/// Target of a channel permission overwrite.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverwriteTarget {
    Role(RoleId),
    Member(UserId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PermissionOverwrite {
    pub target: OverwriteTarget,
    pub allow: Permissions,
    pub deny: Permissions,
}

/// Everything needed to evaluate one member's permissions in one channel.
#[derive(Debug, Clone, Copy)]
pub struct PermissionContext<'a> {
    pub guild_id: GuildId,
    pub owner_id: UserId,
    pub member_id: UserId,
    pub member_roles: &'a [RoleId],
    /// All guild roles with their base permissions.
    pub roles: &'a [(RoleId, Permissions)],
    /// Overwrites of the channel, or of the parent channel for threads.
    pub overwrites: &'a [PermissionOverwrite],
}

impl PermissionContext<'_> {
    /// Guild-wide permissions before channel overwrites.
    pub fn base_permissions(&self) -> Permissions {
        if self.member_id == self.owner_id {
            return Permissions::ALL;
        }

        let everyone = RoleId(self.guild_id.get());
        let mut perms = Permissions::empty();
        for (role_id, role_perms) in self.roles {
            if *role_id == everyone || self.member_roles.contains(role_id) {
                perms |= *role_perms;
            }
        }

        if perms.contains(Permissions::ADMINISTRATOR) {
            return Permissions::ALL;
        }
        perms
    }

    /// Effective permissions in the channel.
    pub fn channel_permissions(&self) -> Permissions {
        let base = self.base_permissions();
        if base == Permissions::ALL {
            return base;
        }

        let everyone = RoleId(self.guild_id.get());
        let mut perms = base;

        if let Some(ow) = self
            .overwrites
            .iter()
            .find(|ow| ow.target == OverwriteTarget::Role(everyone))
        {
            perms = (perms & !ow.deny) | ow.allow;
        }

        let mut allow = Permissions::empty();
        let mut deny = Permissions::empty();
        for ow in self.overwrites {
            if let OverwriteTarget::Role(role_id) = ow.target
                && role_id != everyone
                && self.member_roles.contains(&role_id)
            {
                allow |= ow.allow;
                deny |= ow.deny;
            }
        }
        perms = (perms & !deny) | allow;

        if let Some(ow) = self
            .overwrites
            .iter()
            .find(|ow| ow.target == OverwriteTarget::Member(self.member_id))
        {
            perms = (perms & !ow.deny) | ow.allow;
        }

        if !perms.contains(Permissions::VIEW_CHANNEL) {
            return Permissions::empty();
        }
        perms
    }
}
