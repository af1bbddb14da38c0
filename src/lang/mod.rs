//! Localization collaborator contract plus a built-in English fallback.
//!
//! Templates are addressed by the `DISPATCHER_ERR_*` keys below and use
//! `%s` placeholders filled positionally, the same substitution shape the
//! shortcut expander uses.

use std::sync::Arc;

/// Template keys the dispatcher and middleware resolve at runtime.
pub const ERR_GUILD_ONLY: &str = "DISPATCHER_ERR_GUILD_ONLY";
pub const ERR_MISSING_CALLER_PERMS: &str = "DISPATCHER_ERR_MISSING_CALLER_PERMS";
pub const ERR_MISSING_CLIENT_PERMS: &str = "DISPATCHER_ERR_MISSING_CLIENT_PERMS";
pub const ERR_ROLE_LIMITED: &str = "DISPATCHER_ERR_ROLE_LIMITED";
pub const ERR_MISSING_ROLES: &str = "DISPATCHER_ERR_MISSING_ROLES";
pub const ERR_RATELIMITED: &str = "DISPATCHER_ERR_RATELIMITED";
pub const ERR_RATELIMITED_COMPACT: &str = "DISPATCHER_ERR_RATELIMITED_COMPACT";
pub const ERR_LOCKED: &str = "DISPATCHER_ERR_LOCKED";
pub const ERR_INVALID_SHORTCUT: &str = "DISPATCHER_ERR_INVALID_SHORTCUT";
pub const ERR_UNKNOWN_COMMAND: &str = "DISPATCHER_ERR_UNKNOWN_COMMAND";
pub const ERR_RESOLVER_FAILED: &str = "DISPATCHER_ERR_RESOLVER_FAILED";
pub const ERR_MISSING_ARG: &str = "DISPATCHER_ERR_MISSING_ARG";
pub const ERR_EXPECTED_TYPE: &str = "DISPATCHER_ERR_EXPECTED_TYPE";

/// A resolved language: maps template keys to formatted strings.
pub trait Language: Send + Sync {
    fn get(&self, key: &str, args: &[&str]) -> String;
}

/// Resolves a language tag (e.g. `en-US`) to a [`Language`].
pub trait LanguageProvider: Send + Sync {
    fn language(&self, tag: &str) -> Arc<dyn Language>;
}

/// Fills `%s` placeholders in `template` positionally from `args`.
pub fn format_template(template: &str, args: &[&str]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    let mut i = 0;
    while let Some(pos) = rest.find("%s") {
        out.push_str(&rest[..pos]);
        out.push_str(args.get(i).copied().unwrap_or(""));
        rest = &rest[pos + 2..];
        i += 1;
    }
    out.push_str(rest);
    out
}

/// Built-in English templates, used when the host supplies no localization
/// layer of its own.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultLanguage;

impl DefaultLanguage {
    fn template(key: &str) -> &'static str {
        match key {
            ERR_GUILD_ONLY => "This command can only be used inside a server.",
            ERR_MISSING_CALLER_PERMS => "You need the following permissions to use this command: %s",
            ERR_MISSING_CLIENT_PERMS => "I am missing the following permissions in this channel: %s",
            ERR_ROLE_LIMITED => "This command is limited to the following roles here: %s",
            ERR_MISSING_ROLES => "You are missing the following required roles: %s",
            ERR_RATELIMITED => "You are being rate limited. Try again in %s seconds.",
            ERR_RATELIMITED_COMPACT => "Rate limited (%ss).",
            ERR_LOCKED => "The command `%s` is already running here. Wait for it to finish.",
            ERR_INVALID_SHORTCUT => "The shortcut `%s` did not expand to a known command.",
            ERR_UNKNOWN_COMMAND => "Unknown command. Try the help command for a list.",
            ERR_RESOLVER_FAILED => "Could not resolve `%s` as %s.",
            ERR_MISSING_ARG => "Missing required argument `%s`. Usage: %s",
            ERR_EXPECTED_TYPE => "Expected `%s` to be %s. Usage: %s",
            _ => "%s",
        }
    }
}

impl Language for DefaultLanguage {
    fn get(&self, key: &str, args: &[&str]) -> String {
        format_template(Self::template(key), args)
    }
}

/// Provider that always yields [`DefaultLanguage`] regardless of tag.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultLanguageProvider;

impl LanguageProvider for DefaultLanguageProvider {
    fn language(&self, _tag: &str) -> Arc<dyn Language> {
        Arc::new(DefaultLanguage)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fills_placeholders_in_order() {
        assert_eq!(format_template("a %s b %s", &["1", "2"]), "a 1 b 2");
        assert_eq!(format_template("no placeholders", &["1"]), "no placeholders");
        assert_eq!(format_template("%s and %s", &["only"]), "only and ");
    }

    #[test]
    fn default_language_formats_known_keys() {
        let lang = DefaultLanguage;
        let text = lang.get(ERR_MISSING_CALLER_PERMS, &["ADMINISTRATOR"]);
        assert!(text.contains("ADMINISTRATOR"));

        // Unknown keys echo their first argument rather than panicking.
        assert_eq!(lang.get("NO_SUCH_KEY", &["fallback"]), "fallback");
    }
}
