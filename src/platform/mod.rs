//! Platform-neutral message and identity types.
//!
//! The connection to the actual messaging platform lives behind the
//! [`Gateway`] trait; everything in this module is plain data handed to the
//! dispatcher by the host bot.

use serde::{Deserialize, Serialize};
use std::fmt;

pub mod gateway;

pub use gateway::Gateway;

macro_rules! id_type {
    ($name:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub struct $name(pub String);

        impl $name {
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }
    };
}

id_type!(UserId);
id_type!(GuildId);
id_type!(ChannelId);
id_type!(RoleId);

/// The user who sent a message. `bot` marks accounts the dispatcher ignores.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Author {
    pub id: UserId,
    pub name: String,
    pub bot: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Role {
    pub id: RoleId,
    pub name: String,
}

/// A message already delivered to a channel, as reported by the gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub channel_id: ChannelId,
    pub content: String,
}

/// An inbound chat message. `guild_id` is `None` in DM-equivalent contexts.
#[derive(Debug, Clone)]
pub struct Message {
    pub author: Author,
    pub channel_id: ChannelId,
    pub guild_id: Option<GuildId>,
    pub content: String,
    pub mentions: Vec<UserId>,
}

impl Message {
    /// Removes a single occurrence of `user` from the mention set.
    ///
    /// Used when a leading bot mention served purely as the command prefix,
    /// so commands don't see the bot as a mentioned recipient.
    pub fn strip_mention(&mut self, user: &UserId) {
        if let Some(pos) = self.mentions.iter().position(|m| m == user) {
            self.mentions.remove(pos);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strip_mention_removes_one_occurrence() {
        let mut message = Message {
            author: Author {
                id: "1".into(),
                name: "tester".into(),
                bot: false,
            },
            channel_id: "c".into(),
            guild_id: None,
            content: String::new(),
            mentions: vec!["9".into(), "9".into()],
        };

        message.strip_mention(&"9".into());
        assert_eq!(message.mentions.len(), 1);

        message.strip_mention(&"9".into());
        message.strip_mention(&"9".into());
        assert!(message.mentions.is_empty());
    }
}
