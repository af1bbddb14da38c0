use async_trait::async_trait;
use std::collections::HashSet;

use crate::error::Result;
use crate::platform::{Author, ChannelId, GuildId, Reply, Role, UserId};

/// Connection to the messaging platform.
///
/// The dispatcher never talks to the wire directly; hosts implement this
/// trait over their client library, tests implement it with an in-memory
/// mock.
#[async_trait]
pub trait Gateway: Send + Sync {
    /// Send a message to a channel, returning the delivered reply.
    async fn send(&self, channel: &ChannelId, content: &str) -> Result<Reply>;

    /// Deliver a message to a user's private channel (DM-equivalent).
    async fn send_private(&self, user: &UserId, content: &str) -> Result<()>;

    /// Permissions the bot itself holds in a channel.
    async fn client_permissions(&self, channel: &ChannelId) -> Result<HashSet<String>>;

    /// Permissions a member holds in a guild.
    async fn member_permissions(&self, guild: &GuildId, user: &UserId)
        -> Result<HashSet<String>>;

    /// Roles a member holds in a guild.
    async fn member_roles(&self, guild: &GuildId, user: &UserId) -> Result<Vec<Role>>;

    /// Resolve a raw argument token (id, mention or name) to a known user.
    async fn find_user(&self, token: &str) -> Result<Option<Author>>;

    /// Resolve a raw argument token to a member of the given guild.
    async fn find_member(&self, guild: &GuildId, token: &str) -> Result<Option<Author>>;

    /// Resolve a raw argument token to a channel in the given guild.
    async fn find_channel(&self, guild: &GuildId, token: &str) -> Result<Option<ChannelId>>;

    /// Resolve a raw argument token to a role in the given guild.
    async fn find_role(&self, guild: &GuildId, token: &str) -> Result<Option<Role>>;
}
