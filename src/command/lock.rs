use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use crate::lang::{self, Language};
use crate::platform::GuildId;

/// Mutual exclusion scoped to one command (and its declared siblings) per
/// guild.
///
/// Two states per guild: unlocked and locked. `free` must stay idempotent
/// because normal completion and the dead-man timeout may both call it.
/// Sibling matching is the dispatcher's job; the lock only declares the set.
pub trait CommandLock: Send + Sync {
    fn lock(&self, guild: &GuildId);

    fn free(&self, guild: &GuildId);

    fn is_locked(&self, guild: &GuildId) -> bool;

    /// Command names that share this lock.
    fn siblings(&self) -> &HashSet<String>;

    /// Localized explanation shown when an invocation is rejected while
    /// locked. Override for custom lock semantics (e.g. locking on a
    /// sub-resource rather than the whole guild).
    fn error_message(&self, lang: &dyn Language, command: &str, _guild: &GuildId) -> String {
        lang.get(lang::ERR_LOCKED, &[command])
    }
}

/// Default per-guild boolean lock.
#[derive(Debug, Default)]
pub struct GuildLock {
    siblings: HashSet<String>,
    held: Mutex<HashMap<GuildId, bool>>,
}

impl GuildLock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_siblings(siblings: &[&str]) -> Self {
        Self {
            siblings: siblings.iter().map(|s| s.to_lowercase()).collect(),
            held: Mutex::new(HashMap::new()),
        }
    }
}

impl CommandLock for GuildLock {
    fn lock(&self, guild: &GuildId) {
        self.held.lock().unwrap().insert(guild.clone(), true);
    }

    fn free(&self, guild: &GuildId) {
        self.held.lock().unwrap().remove(guild);
    }

    fn is_locked(&self, guild: &GuildId) -> bool {
        self.held.lock().unwrap().get(guild).copied().unwrap_or(false)
    }

    fn siblings(&self) -> &HashSet<String> {
        &self.siblings
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lang::DefaultLanguage;

    #[test]
    fn lock_and_free_toggle_per_guild() {
        let lock = GuildLock::new();
        let a: GuildId = "a".into();
        let b: GuildId = "b".into();

        assert!(!lock.is_locked(&a));
        lock.lock(&a);
        assert!(lock.is_locked(&a));
        assert!(!lock.is_locked(&b));

        lock.free(&a);
        assert!(!lock.is_locked(&a));
    }

    #[test]
    fn free_is_idempotent() {
        let lock = GuildLock::new();
        let guild: GuildId = "g".into();

        lock.lock(&guild);
        lock.free(&guild);
        // Second free simulates the timeout racing normal completion.
        lock.free(&guild);
        assert!(!lock.is_locked(&guild));
    }

    #[test]
    fn siblings_are_lowercased() {
        let lock = GuildLock::with_siblings(&["Ban", "kick"]);
        assert!(lock.siblings().contains("ban"));
        assert!(lock.siblings().contains("kick"));
    }

    #[test]
    fn default_error_names_the_command() {
        let lock = GuildLock::new();
        let text = lock.error_message(&DefaultLanguage, "deploy", &"g".into());
        assert!(text.contains("deploy"));
    }
}
