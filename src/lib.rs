//! commandeer: command-dispatch core for chat bots.
//!
//! Given an inbound message from a connected messaging platform, the
//! [`Dispatcher`] decides whether it invokes a command, enforces usage
//! policy (blacklists, permissions, roles, rate limits, per-guild locks),
//! runs a composable middleware chain over the arguments, executes the
//! resolved command action and reports the outcome.
//!
//! The platform connection, persistent storage, localization and command
//! loading are collaborators supplied behind traits; see [`platform::Gateway`],
//! [`storage::StorageProvider`], [`lang::LanguageProvider`] and
//! [`command::CommandRegistry`].

pub mod command;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod events;
pub mod lang;
pub mod middleware;
pub mod platform;
pub mod ratelimit;
pub mod storage;

pub use command::{Command, CommandLock, CommandRegistry, GuildLock, InMemoryRegistry, Outcome};
pub use config::DispatcherConfig;
pub use dispatch::Dispatcher;
pub use error::{Error, Result};
pub use events::{EventSink, NullSink};
pub use middleware::{expect, localize, resolve, Arg, Flow, Middleware};
pub use platform::{Author, ChannelId, Gateway, GuildId, Message, Reply, Role, RoleId, UserId};
pub use ratelimit::{RateLimit, RateLimitManager};
pub use storage::{MemoryProvider, MemoryStore, SettingsStore, StorageProvider};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
