use std::collections::HashSet;
use std::time::Duration;

use crate::platform::UserId;

/// Dispatcher settings supplied by the host bot at construction time.
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    /// Fallback command prefix when a guild has none configured.
    pub prefix: String,
    /// The bot's own user id; a leading mention of it acts as a prefix.
    pub bot_id: UserId,
    /// Users allowed to run owner-only commands.
    pub owners: HashSet<UserId>,
    /// Optional per-user rate limit applied before any per-command limit,
    /// in `quantity/duration[unit]` form (e.g. `"5/10s"`).
    pub ratelimit: Option<String>,
    /// Whether to answer unrecognized commands in DMs with a notice.
    pub dm_unknown_notice: bool,
    /// Language tag used when a guild has no `lang` setting.
    pub default_language: String,
    /// Cadence of the rate-limit store sweep.
    pub sweep_interval: Duration,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            prefix: "!".to_string(),
            bot_id: UserId(String::new()),
            owners: HashSet::new(),
            ratelimit: None,
            dm_unknown_notice: false,
            default_language: "en-US".to_string(),
            sweep_interval: Duration::from_secs(30),
        }
    }
}
