//! Snowflake identifiers.
//!
//! The REST API sends IDs as JSON strings; the channel store writes them as
//! integers. Both forms are accepted on input, integers are written.

use std::{fmt, num::ParseIntError, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, de::Error as _};

/// First second of 2015, the zero point of every snowflake timestamp.
pub const DISCORD_EPOCH_MS: i64 = 1_420_070_400_000;

const TIMESTAMP_SHIFT: u32 = 22;

macro_rules! snowflake_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl $name {
            pub const fn get(self) -> u64 {
                self.0
            }

            /// Creation time encoded in the upper bits.
            pub fn created_at(self) -> DateTime<Utc> {
                snowflake_timestamp(self.0)
            }
        }

        impl From<u64> for $name {
            fn from(value: u64) -> Self {
                Self(value)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = ParseIntError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                s.trim().parse().map(Self)
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                deserialize_u64_lenient(deserializer).map(Self)
            }
        }
    };
}

snowflake_id!(
    /// A guild (server).
    GuildId
);
snowflake_id!(
    /// A text channel or thread.
    ChannelId
);
snowflake_id!(
    /// A single message.
    MessageId
);
snowflake_id!(
    /// A user, including the bot itself.
    UserId
);
snowflake_id!(
    /// A guild role. The @everyone role shares its guild's ID.
    RoleId
);
snowflake_id!(
    /// An application (the bot's OAuth2 client).
    ApplicationId
);

impl MessageId {
    /// Smallest message ID created at `at`, usable as an exclusive
    /// "before" bound for history queries.
    pub fn from_datetime(at: DateTime<Utc>) -> Self {
        let ms = (at.timestamp_millis() - DISCORD_EPOCH_MS).max(0) as u64;
        Self(ms << TIMESTAMP_SHIFT)
    }
}

fn snowflake_timestamp(raw: u64) -> DateTime<Utc> {
    let ms = (raw >> TIMESTAMP_SHIFT) as i64 + DISCORD_EPOCH_MS;
    DateTime::from_timestamp_millis(ms).unwrap_or_default()
}

/// Accept either a JSON number or a decimal string.
pub(crate) fn deserialize_u64_lenient<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(u64),
        Text(String),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Number(n) => Ok(n),
        Raw::Text(s) => s
            .parse()
            .map_err(|_| D::Error::custom(format!("invalid snowflake '{s}'"))),
    }
}
