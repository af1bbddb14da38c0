//! Command definitions and the registry seam.
//!
//! Command *loading* (file discovery, hot reload) is a host concern; the
//! dispatcher only consults a [`CommandRegistry`] to turn a name or alias
//! into a [`Command`].

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use crate::error::Result;
use crate::middleware::{Arg, Middleware};
use crate::platform::{Message, Reply};

pub mod lock;

pub use lock::{CommandLock, GuildLock};

/// What a command action produced.
#[derive(Debug, Clone)]
pub enum Outcome {
    /// A plain value; the dispatcher sends it to the originating channel.
    Reply(String),
    /// Messages the action already delivered itself.
    Handled(Vec<Reply>),
    /// Nothing to deliver.
    None,
}

pub type ActionFuture = Pin<Box<dyn Future<Output = Result<Outcome>> + Send>>;

/// Boxed async command body.
pub type Action = Arc<dyn Fn(Message, Vec<Arg>) -> ActionFuture + Send + Sync>;

pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(30);

/// A registered command definition. Constructed once, shared via `Arc`.
#[derive(Clone)]
pub struct Command {
    pub name: String,
    pub aliases: Vec<String>,
    pub group: String,
    pub enabled: bool,
    pub guild_only: bool,
    pub owner_only: bool,
    /// Per-user limit spec (`"2/10s"` form); absent means unlimited.
    pub ratelimit: Option<String>,
    pub caller_permissions: Vec<String>,
    pub client_permissions: Vec<String>,
    /// Role names the caller must all hold.
    pub roles: Vec<String>,
    pub lock: Option<Arc<dyn CommandLock>>,
    /// Dead-man timeout force-freeing a stuck lock; zero disables it.
    pub lock_timeout: Duration,
    /// Command-scoped middleware, run after client-level middleware.
    pub middleware: Vec<Middleware>,
    pub action: Action,
}

impl Command {
    pub fn new<N, F, Fut>(name: N, action: F) -> Self
    where
        N: Into<String>,
        F: Fn(Message, Vec<Arg>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Outcome>> + Send + 'static,
    {
        Self {
            name: name.into().to_lowercase(),
            aliases: Vec::new(),
            group: "general".to_string(),
            enabled: true,
            guild_only: false,
            owner_only: false,
            ratelimit: None,
            caller_permissions: Vec::new(),
            client_permissions: Vec::new(),
            roles: Vec::new(),
            lock: None,
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
            middleware: Vec::new(),
            action: Arc::new(move |message, args| Box::pin(action(message, args))),
        }
    }

    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.aliases.push(alias.into().to_lowercase());
        self
    }

    pub fn group(mut self, group: impl Into<String>) -> Self {
        self.group = group.into();
        self
    }

    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn guild_only(mut self) -> Self {
        self.guild_only = true;
        self
    }

    pub fn owner_only(mut self) -> Self {
        self.owner_only = true;
        self
    }

    pub fn ratelimit(mut self, spec: impl Into<String>) -> Self {
        self.ratelimit = Some(spec.into());
        self
    }

    pub fn caller_permissions(mut self, perms: &[&str]) -> Self {
        self.caller_permissions = perms.iter().map(|p| p.to_string()).collect();
        self
    }

    pub fn client_permissions(mut self, perms: &[&str]) -> Self {
        self.client_permissions = perms.iter().map(|p| p.to_string()).collect();
        self
    }

    pub fn roles(mut self, roles: &[&str]) -> Self {
        self.roles = roles.iter().map(|r| r.to_string()).collect();
        self
    }

    pub fn lock(mut self, lock: Arc<dyn CommandLock>) -> Self {
        self.lock = Some(lock);
        self
    }

    pub fn lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }

    pub fn middleware(mut self, mw: Middleware) -> Self {
        self.middleware.push(mw);
        self
    }
}

impl std::fmt::Debug for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Command")
            .field("name", &self.name)
            .field("aliases", &self.aliases)
            .field("group", &self.group)
            .field("enabled", &self.enabled)
            .finish()
    }
}

/// Resolves a typed command from a name or alias string.
pub trait CommandRegistry: Send + Sync {
    fn resolve(&self, name: &str) -> Option<Arc<Command>>;
}

/// Alias-aware registry with case-insensitive resolution.
#[derive(Default)]
pub struct InMemoryRegistry {
    by_name: HashMap<String, Arc<Command>>,
}

impl InMemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, command: Command) -> Arc<Command> {
        let command = Arc::new(command);
        self.by_name
            .insert(command.name.clone(), command.clone());
        for alias in &command.aliases {
            self.by_name.insert(alias.clone(), command.clone());
        }
        command
    }

    pub fn len(&self) -> usize {
        self.by_name.values().map(|c| &c.name).collect::<std::collections::HashSet<_>>().len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }
}

impl CommandRegistry for InMemoryRegistry {
    fn resolve(&self, name: &str) -> Option<Arc<Command>> {
        self.by_name.get(&name.to_lowercase()).cloned()
    }
}
