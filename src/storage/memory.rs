use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::error::Result;
use crate::platform::GuildId;
use crate::storage::{SettingsStore, StorageProvider};

/// In-memory settings store. Default backend for embedding and tests.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the store with a set of entries.
    pub fn with_entries(entries: impl IntoIterator<Item = (String, Value)>) -> Self {
        Self {
            entries: Mutex::new(entries.into_iter().collect()),
        }
    }
}

#[async_trait]
impl SettingsStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<Value>> {
        Ok(self.entries.lock().unwrap().get(key).cloned())
    }

    async fn set(&self, key: &str, value: Value) -> Result<()> {
        self.entries.lock().unwrap().insert(key.to_string(), value);
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.entries.lock().unwrap().remove(key);
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        Ok(self.entries.lock().unwrap().contains_key(key))
    }
}

/// In-memory [`StorageProvider`]: one global store plus a lazily created
/// store per guild.
#[derive(Default)]
pub struct MemoryProvider {
    global: Arc<MemoryStore>,
    guilds: Mutex<HashMap<GuildId, Arc<MemoryStore>>>,
}

impl MemoryProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Direct handle to a guild's store, creating it if absent.
    pub fn guild_store(&self, guild: &GuildId) -> Arc<MemoryStore> {
        self.guilds
            .lock()
            .unwrap()
            .entry(guild.clone())
            .or_default()
            .clone()
    }

    pub fn global_store(&self) -> Arc<MemoryStore> {
        self.global.clone()
    }
}

impl StorageProvider for MemoryProvider {
    fn global(&self) -> Arc<dyn SettingsStore> {
        self.global.clone()
    }

    fn guild(&self, guild: &GuildId) -> Option<Arc<dyn SettingsStore>> {
        Some(self.guild_store(guild))
    }
}
