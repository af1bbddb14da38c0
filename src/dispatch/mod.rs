//! The command dispatcher: turns inbound messages into command executions.
//!
//! Per message the pipeline is: ignore filter, blacklist, prefix/shortcut
//! resolution, the ordered eligibility gate, mention stripping, middleware,
//! lock check, lock acquisition, action execution, result delivery, lock
//! release, telemetry. Each gate short-circuits; caller-actionable failures
//! are delivered privately, operational ones to the originating channel.

use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::command::{Command, CommandLock, CommandRegistry, Outcome};
use crate::config::DispatcherConfig;
use crate::error::{Error, Result};
use crate::events::{EventSink, NullSink};
use crate::lang::{self, Language, LanguageProvider};
use crate::middleware::{run_chain, Arg, Flow, Middleware, MiddlewareCx};
use crate::platform::{ChannelId, Gateway, GuildId, Message};
use crate::ratelimit::RateLimitManager;
use crate::storage::{keys, value_is_set, SettingsStore, StorageProvider};

mod parse;

pub use parse::{expand_shortcut, parse_invocation, ParsedInvocation, PrefixKind};

struct LockEntry {
    lock: Arc<dyn CommandLock>,
    watchdog: Option<JoinHandle<()>>,
    /// Identifies the invocation that inserted the entry, so a release
    /// racing the dead-man timer can never free a successor's lock.
    token: u64,
}

type LockTable = Arc<Mutex<HashMap<(GuildId, String), LockEntry>>>;

enum GateVerdict {
    Allow,
    /// Ineligible with no user-visible output.
    Silent,
    /// Ineligible; an explanation was already sent to the channel.
    Notified,
}

/// Orchestrates the full decision pipeline for inbound messages.
///
/// Owns the lock table and the rate-limit store; everything else is an
/// injected collaborator. One instance per client.
pub struct Dispatcher {
    config: DispatcherConfig,
    gateway: Arc<dyn Gateway>,
    storage: Arc<dyn StorageProvider>,
    languages: Arc<dyn LanguageProvider>,
    registry: Arc<dyn CommandRegistry>,
    events: Arc<dyn EventSink>,
    ratelimits: Arc<RateLimitManager>,
    middleware: Vec<Middleware>,
    locks: LockTable,
    lock_token: AtomicU64,
}

impl Dispatcher {
    pub fn new(
        config: DispatcherConfig,
        gateway: Arc<dyn Gateway>,
        storage: Arc<dyn StorageProvider>,
        languages: Arc<dyn LanguageProvider>,
        registry: Arc<dyn CommandRegistry>,
    ) -> Self {
        Self {
            config,
            gateway,
            storage,
            languages,
            registry,
            events: Arc::new(NullSink),
            ratelimits: Arc::new(RateLimitManager::new()),
            middleware: Vec::new(),
            locks: Arc::new(Mutex::new(HashMap::new())),
            lock_token: AtomicU64::new(0),
        }
    }

    pub fn events(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = events;
        self
    }

    /// Appends a client-level middleware stage. These run before any
    /// command-level middleware, in registration order; append
    /// [`crate::middleware::localize`] last.
    pub fn use_middleware(&mut self, stage: Middleware) {
        self.middleware.push(stage);
    }

    pub fn ratelimits(&self) -> &Arc<RateLimitManager> {
        &self.ratelimits
    }

    /// Starts the periodic rate-limit sweep. The task stops when the
    /// returned handle is aborted or dropped by its owner.
    pub fn start_sweeper(&self) -> JoinHandle<()> {
        self.ratelimits.start_sweeper(self.config.sweep_interval)
    }

    /// Top-level message handler. Never propagates an error: one malformed
    /// message must not affect others in flight.
    pub async fn handle_message(&self, message: Message) {
        let started = Instant::now();
        if let Err(err) = self.process(message, started).await {
            warn!(error = %err, "message processing failed");
        }
    }

    async fn process(&self, mut message: Message, started: Instant) -> Result<()> {
        // Step 1: ignore the bot's own messages, and guild messages with no
        // storage context (should not occur).
        if message.author.bot {
            return Ok(());
        }
        let guild_settings = match &message.guild_id {
            Some(guild) => match self.storage.guild(guild) {
                Some(store) => Some(store),
                None => {
                    debug!(guild = %guild, "dropping guild message without storage context");
                    return Ok(());
                }
            },
            None => None,
        };

        // Step 2: global then guild blacklist, both silent.
        let blacklist_key = format!("{}.{}", keys::BLACKLIST, message.author.id);
        if value_is_set(self.storage.global().get(&blacklist_key).await?) {
            return Ok(());
        }
        if let Some(store) = &guild_settings {
            if value_is_set(store.get(&blacklist_key).await?) {
                return Ok(());
            }
        }

        // Step 3: prefix + command resolution, with one shortcut retry.
        let prefix = match &guild_settings {
            Some(store) => store
                .get(keys::PREFIX)
                .await?
                .and_then(|v| v.as_str().map(str::to_string)),
            None => None,
        }
        .unwrap_or_else(|| self.config.prefix.clone());

        let Some(mut parsed) = parse_invocation(&message.content, &prefix, &self.config.bot_id)
        else {
            self.events.no_command(&message);
            return Ok(());
        };

        let lang = self.language_for(&guild_settings).await?;

        let mut command = self.resolve_enabled(&parsed.command);
        let mut shortcut_failed = false;
        if command.is_none() {
            if let Some(store) = &guild_settings {
                if let Some(shortcuts) = store.get(keys::SHORTCUTS).await? {
                    if let Some(template) = parse::shortcut_template(&shortcuts, &parsed.command) {
                        let expanded = expand_shortcut(&template, &parsed.args);
                        let mut tokens = expanded.split_whitespace();
                        if let Some(name) = tokens.next() {
                            let retry = ParsedInvocation {
                                prefix: parsed.prefix,
                                command: name.to_lowercase(),
                                args: tokens.map(str::to_string).collect(),
                            };
                            command = self.resolve_enabled(&retry.command);
                            if command.is_some() {
                                message.content = match parsed.prefix {
                                    PrefixKind::Text => format!("{prefix}{expanded}"),
                                    PrefixKind::Mention => {
                                        format!("<@{}> {}", self.config.bot_id, expanded)
                                    }
                                };
                                parsed = retry;
                            }
                        }
                        if command.is_none() {
                            shortcut_failed = true;
                            let notice =
                                lang.get(lang::ERR_INVALID_SHORTCUT, &[&parsed.command]);
                            self.send_channel(&message.channel_id, &notice).await;
                        }
                    }
                }
            }
        }

        let Some(command) = command else {
            if message.guild_id.is_none() && self.config.dm_unknown_notice && !shortcut_failed {
                let notice = lang.get(lang::ERR_UNKNOWN_COMMAND, &[]);
                self.send_channel(&message.channel_id, &notice).await;
            }
            self.events
                .unknown_command(&parsed.command, &parsed.args, &message);
            return Ok(());
        };

        // Step 4: the eligibility gate. Thrown errors are caller-actionable
        // and go to a private channel; explicit sends already happened.
        match self
            .check_eligibility(&message, &command, &guild_settings, &lang)
            .await
        {
            Ok(GateVerdict::Allow) => {}
            Ok(GateVerdict::Silent) | Ok(GateVerdict::Notified) => return Ok(()),
            Err(err) => {
                return self.deliver_caller_error(&message.author.id, &lang, err).await;
            }
        }

        // Step 5: a mention used purely as a prefix is not a recipient.
        if parsed.prefix == PrefixKind::Mention {
            message.strip_mention(&self.config.bot_id);
        }

        // Step 6: client-level then command-level middleware.
        let channel = message.channel_id.clone();
        let author = message.author.id.clone();
        let cx = Arc::new(MiddlewareCx {
            gateway: self.gateway.clone(),
            lang: lang.clone(),
            guild: message.guild_id.clone(),
        });
        let raw_args: Vec<Arg> = parsed.args.iter().map(|t| Arg::Str(t.clone())).collect();
        // Owned chain so the whole handler future stays `'static` and can
        // be spawned by the host.
        let stages: Vec<Middleware> = self
            .middleware
            .iter()
            .chain(command.middleware.iter())
            .cloned()
            .collect();
        let (message, args) = match run_chain(&cx, &stages, message, raw_args).await {
            Ok(Flow::Continue(message, args)) => (message, args),
            Ok(Flow::Abort(text)) => {
                self.send_channel(&channel, &text).await;
                return Ok(());
            }
            Err(err) => {
                return self.deliver_caller_error(&author, &lang, err).await;
            }
        };

        // Step 7: reject while a matching lock is held (no queueing).
        if let Some(guild) = &message.guild_id {
            if let Some(text) = self.locked_error(guild, &command, lang.as_ref()) {
                self.send_channel(&channel, &text).await;
                return Ok(());
            }
        }

        // Step 8: acquire the lock and arm the dead-man timer.
        let acquired = self.acquire_lock(&message, &command);

        // Step 9: run the action. Failures here are command-logic errors:
        // logged, never surfaced to the user, never left holding a lock.
        let outcome = match (command.action)(message.clone(), args.clone()).await {
            Ok(outcome) => outcome,
            Err(err) => {
                error!(command = %command.name, error = %err, "command action failed");
                Outcome::None
            }
        };

        // Step 10: plain values are delivered automatically.
        if let Outcome::Reply(text) = &outcome {
            self.send_channel(&channel, text).await;
        }

        // Step 11: release unconditionally.
        if let Some((guild, name, token)) = acquired {
            self.release_lock(&guild, &name, token);
        }

        // Step 12: telemetry.
        let elapsed = started.elapsed();
        info!(command = %command.name, elapsed_ms = elapsed.as_millis() as u64, "command dispatched");
        self.events.command(&command.name, &args, elapsed, &message);
        Ok(())
    }

    fn resolve_enabled(&self, name: &str) -> Option<Arc<Command>> {
        self.registry.resolve(name).filter(|c| c.enabled)
    }

    async fn language_for(
        &self,
        guild_settings: &Option<Arc<dyn SettingsStore>>,
    ) -> Result<Arc<dyn Language>> {
        let tag = match guild_settings {
            Some(store) => store
                .get(keys::LANG)
                .await?
                .and_then(|v| v.as_str().map(str::to_string)),
            None => None,
        }
        .unwrap_or_else(|| self.config.default_language.clone());
        Ok(self.languages.language(&tag))
    }

    /// The call-eligibility gate, evaluated in a fixed order so permission
    /// errors stay distinguishable from simple ineligibility.
    async fn check_eligibility(
        &self,
        message: &Message,
        command: &Command,
        guild_settings: &Option<Arc<dyn SettingsStore>>,
        lang: &Arc<dyn Language>,
    ) -> Result<GateVerdict> {
        // a. owner-only: silently ineligible.
        if command.owner_only && !self.config.owners.contains(&message.author.id) {
            return Ok(GateVerdict::Silent);
        }

        // b. disabled group: silently ineligible.
        if let Some(store) = guild_settings {
            if let Some(groups) = store.get(keys::DISABLED_GROUPS).await? {
                let disabled = groups
                    .as_array()
                    .map(|g| g.iter().any(|v| v.as_str() == Some(command.group.as_str())))
                    .unwrap_or(false);
                if disabled {
                    return Ok(GateVerdict::Silent);
                }
            }
        }

        // c. rate limiters, global then command-specific. The caller sees
        // the notice at most once per window, and never twice across the
        // two limiters.
        let compact = match guild_settings {
            Some(store) => value_is_set(store.get(keys::COMPACT).await?),
            None => false,
        };
        let user = message.author.id.as_str();
        let mut global_notified = false;
        if let Some(spec) = &self.config.ratelimit {
            let cell = self.ratelimits.get(spec, &[user])?;
            if !cell.call() {
                if !cell.was_notified() {
                    cell.set_notified();
                    let notice = ratelimit_notice(lang.as_ref(), &cell, compact);
                    self.send_channel(&message.channel_id, &notice).await;
                    return Ok(GateVerdict::Notified);
                }
                return Ok(GateVerdict::Silent);
            }
            global_notified = cell.was_notified();
        }
        if let Some(spec) = &command.ratelimit {
            let cell = self.ratelimits.get(spec, &[user, &command.name])?;
            if !cell.call() {
                if !global_notified && !cell.was_notified() {
                    cell.set_notified();
                    let notice = ratelimit_notice(lang.as_ref(), &cell, compact);
                    self.send_channel(&message.channel_id, &notice).await;
                    return Ok(GateVerdict::Notified);
                }
                return Ok(GateVerdict::Silent);
            }
        }

        // d. guild-only outside a guild: thrown.
        if command.guild_only && message.guild_id.is_none() {
            return Err(Error::GuildOnly);
        }

        // e. missing client permissions: explicit channel message.
        if !command.client_permissions.is_empty() {
            let have = self.gateway.client_permissions(&message.channel_id).await?;
            let missing: Vec<String> = command
                .client_permissions
                .iter()
                .filter(|p| !have.contains(*p))
                .cloned()
                .collect();
            if !missing.is_empty() {
                let notice = lang.get(lang::ERR_MISSING_CLIENT_PERMS, &[&missing.join(", ")]);
                self.send_channel(&message.channel_id, &notice).await;
                return Ok(GateVerdict::Notified);
            }
        }

        let Some(guild) = &message.guild_id else {
            return Ok(GateVerdict::Allow);
        };

        // f. missing caller permissions: thrown.
        if !command.caller_permissions.is_empty() {
            let have = self
                .gateway
                .member_permissions(guild, &message.author.id)
                .await?;
            let missing: Vec<String> = command
                .caller_permissions
                .iter()
                .filter(|p| !have.contains(*p))
                .cloned()
                .collect();
            if !missing.is_empty() {
                return Err(Error::MissingCallerPermissions(missing));
            }
        }

        // g. per-guild role allow-list for this command: thrown.
        if let Some(store) = guild_settings {
            if let Some(limited) = store.get(keys::LIMITED_COMMANDS).await? {
                let allowed: Vec<String> = limited
                    .get(&command.name)
                    .and_then(Value::as_array)
                    .map(|ids| {
                        ids.iter()
                            .filter_map(Value::as_str)
                            .map(str::to_string)
                            .collect()
                    })
                    .unwrap_or_default();
                if !allowed.is_empty() {
                    let roles = self
                        .gateway
                        .member_roles(guild, &message.author.id)
                        .await?;
                    if !roles.iter().any(|r| allowed.contains(&r.id.0)) {
                        return Err(Error::RoleLimited(allowed));
                    }
                }
            }
        }

        // h. required role names: thrown.
        if !command.roles.is_empty() {
            let roles = self
                .gateway
                .member_roles(guild, &message.author.id)
                .await?;
            let names: HashSet<&str> = roles.iter().map(|r| r.name.as_str()).collect();
            let missing: Vec<String> = command
                .roles
                .iter()
                .filter(|r| !names.contains(r.as_str()))
                .cloned()
                .collect();
            if !missing.is_empty() {
                return Err(Error::MissingRoles(missing));
            }
        }

        Ok(GateVerdict::Allow)
    }

    /// Finds a held lock that blocks `command` in `guild`, either directly
    /// or through a sibling declaration, and returns its localized error.
    fn locked_error(
        &self,
        guild: &GuildId,
        command: &Command,
        lang: &dyn Language,
    ) -> Option<String> {
        {
            let locks = self.locks.lock().unwrap();
            for ((locked_guild, locked_name), entry) in locks.iter() {
                if locked_guild != guild {
                    continue;
                }
                let matches = locked_name == &command.name
                    || entry.lock.siblings().contains(&command.name);
                if matches && entry.lock.is_locked(guild) {
                    return Some(entry.lock.error_message(lang, locked_name, guild));
                }
            }
        }
        if let Some(lock) = &command.lock {
            if lock.is_locked(guild) {
                return Some(lock.error_message(lang, &command.name, guild));
            }
        }
        None
    }

    fn acquire_lock(&self, message: &Message, command: &Command) -> Option<(GuildId, String, u64)> {
        let guild = message.guild_id.clone()?;
        let lock = command.lock.clone()?;
        let token = self.lock_token.fetch_add(1, Ordering::Relaxed);

        lock.lock(&guild);
        let watchdog = if command.lock_timeout > Duration::ZERO {
            Some(self.spawn_watchdog(
                guild.clone(),
                command.name.clone(),
                lock.clone(),
                command.lock_timeout,
                token,
            ))
        } else {
            None
        };
        self.locks.lock().unwrap().insert(
            (guild.clone(), command.name.clone()),
            LockEntry { lock, watchdog, token },
        );
        Some((guild, command.name.clone(), token))
    }

    /// Dead-man switch: force-frees a lock whose command never completed.
    /// The command action itself keeps running; only the lock is released.
    fn spawn_watchdog(
        &self,
        guild: GuildId,
        name: String,
        lock: Arc<dyn CommandLock>,
        timeout: Duration,
        token: u64,
    ) -> JoinHandle<()> {
        let table = self.locks.clone();
        tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            let key = (guild.clone(), name.clone());
            let removed = {
                let mut table = table.lock().unwrap();
                let owned = table.get(&key).map_or(false, |entry| entry.token == token);
                if owned {
                    table.remove(&key);
                    // Freed under the table mutex so a rival invocation
                    // can't slip in between.
                    lock.free(&guild);
                }
                owned
            };
            if removed {
                warn!(guild = %guild, command = %name, "lock timed out; force-released");
            }
        })
    }

    /// Releases the lock acquired under `token`. A no-op when the entry is
    /// gone or has been superseded: after a dead-man timeout another
    /// invocation may hold the lock, and its entry must survive the stale
    /// release.
    fn release_lock(&self, guild: &GuildId, name: &str, token: u64) {
        let key = (guild.clone(), name.to_string());
        let entry = {
            let mut locks = self.locks.lock().unwrap();
            let owned = locks.get(&key).map_or(false, |entry| entry.token == token);
            if owned {
                locks.remove(&key)
            } else {
                None
            }
        };
        if let Some(entry) = entry {
            if let Some(watchdog) = entry.watchdog {
                watchdog.abort();
            }
            entry.lock.free(guild);
        }
    }

    /// Delivers a thrown caller-actionable error privately; anything else
    /// propagates to the top-level handler's log.
    async fn deliver_caller_error(
        &self,
        author: &crate::platform::UserId,
        lang: &Arc<dyn Language>,
        err: Error,
    ) -> Result<()> {
        match caller_error_text(lang.as_ref(), &err) {
            Some(text) => {
                if let Err(send_err) = self.gateway.send_private(author, &text).await {
                    warn!(error = %send_err, "failed to deliver private error");
                }
                Ok(())
            }
            None => Err(err),
        }
    }
}

fn ratelimit_notice(
    lang: &dyn Language,
    cell: &crate::ratelimit::RateLimit,
    compact: bool,
) -> String {
    let secs = cell.remaining_secs().to_string();
    if compact {
        lang.get(lang::ERR_RATELIMITED_COMPACT, &[&secs])
    } else {
        lang.get(lang::ERR_RATELIMITED, &[&secs])
    }
}

fn caller_error_text(lang: &dyn Language, err: &Error) -> Option<String> {
    match err {
        Error::GuildOnly => Some(lang.get(lang::ERR_GUILD_ONLY, &[])),
        Error::MissingCallerPermissions(perms) => {
            Some(lang.get(lang::ERR_MISSING_CALLER_PERMS, &[&perms.join(", ")]))
        }
        Error::RoleLimited(roles) => {
            Some(lang.get(lang::ERR_ROLE_LIMITED, &[&roles.join(", ")]))
        }
        Error::MissingRoles(roles) => {
            Some(lang.get(lang::ERR_MISSING_ROLES, &[&roles.join(", ")]))
        }
        Error::Middleware(text) => Some(text.clone()),
        _ => None,
    }
}

impl Dispatcher {
    async fn send_channel(&self, channel: &ChannelId, content: &str) {
        if let Err(err) = self.gateway.send(channel, content).await {
            warn!(channel = %channel, error = %err, "failed to send channel message");
        }
    }
}
