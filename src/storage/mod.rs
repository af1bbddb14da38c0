//! Settings storage collaborator contracts.
//!
//! Guild and global settings live behind [`SettingsStore`]; the dispatcher
//! reads them fresh on every access and never caches a value across await
//! points. Persistence mechanics belong to the host.

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

use crate::error::Result;
use crate::platform::GuildId;

mod memory;

pub use memory::{MemoryProvider, MemoryStore};

/// Dotted keys the dispatcher reads during message handling.
pub mod keys {
    pub const PREFIX: &str = "prefix";
    pub const DISABLED_GROUPS: &str = "disabledGroups";
    pub const LIMITED_COMMANDS: &str = "limitedCommands";
    pub const SHORTCUTS: &str = "shortcuts";
    pub const BLACKLIST: &str = "blacklist";
    pub const LANG: &str = "lang";
    pub const COMPACT: &str = "compact";
}

/// Async key/value settings store over dotted keys.
#[async_trait]
pub trait SettingsStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Value>>;
    async fn set(&self, key: &str, value: Value) -> Result<()>;
    async fn remove(&self, key: &str) -> Result<()>;
    async fn exists(&self, key: &str) -> Result<bool>;
}

/// Hands out the global store and per-guild stores.
///
/// `guild` may return `None` when no storage context exists for a guild;
/// the dispatcher drops such messages defensively.
pub trait StorageProvider: Send + Sync {
    fn global(&self) -> Arc<dyn SettingsStore>;
    fn guild(&self, guild: &GuildId) -> Option<Arc<dyn SettingsStore>>;
}

/// Reads a flag-style setting (`blacklist.<id>` and friends) as a boolean.
pub(crate) fn value_is_set(value: Option<Value>) -> bool {
    match value {
        Some(Value::Bool(b)) => b,
        Some(Value::Null) | None => false,
        Some(_) => true,
    }
}
