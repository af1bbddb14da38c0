use serde_json::Value;

use crate::platform::UserId;

/// How the triggering prefix was written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrefixKind {
    /// A configured text prefix (guild-specific or the default).
    Text,
    /// A single leading mention of the bot used purely as a prefix.
    Mention,
}

/// A message body split into its command token and raw arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedInvocation {
    pub prefix: PrefixKind,
    pub command: String,
    pub args: Vec<String>,
}

/// Splits `content` into command + args if it starts with `prefix` or a
/// mention of `bot_id`.
pub fn parse_invocation(
    content: &str,
    prefix: &str,
    bot_id: &UserId,
) -> Option<ParsedInvocation> {
    let content = content.trim_start();

    let (rest, kind) = if !prefix.is_empty() && content.starts_with(prefix) {
        (&content[prefix.len()..], PrefixKind::Text)
    } else if let Some(rest) = strip_mention_prefix(content, bot_id) {
        (rest, PrefixKind::Mention)
    } else {
        return None;
    };

    let mut tokens = rest.split_whitespace();
    let command = tokens.next()?.to_lowercase();
    Some(ParsedInvocation {
        prefix: kind,
        command,
        args: tokens.map(str::to_string).collect(),
    })
}

fn strip_mention_prefix<'a>(content: &'a str, bot_id: &UserId) -> Option<&'a str> {
    if bot_id.as_str().is_empty() {
        return None;
    }
    for form in [
        format!("<@{}>", bot_id),
        format!("<@!{}>", bot_id),
    ] {
        if let Some(rest) = content.strip_prefix(form.as_str()) {
            return Some(rest);
        }
    }
    None
}

/// Expands a shortcut template, substituting trailing argument tokens into
/// `%s` placeholders in order. The final placeholder greedily receives the
/// remaining tokens; tokens beyond the placeholders are appended.
pub fn expand_shortcut(template: &str, args: &[String]) -> String {
    let placeholders = template.matches("%s").count();
    if placeholders == 0 {
        return if args.is_empty() {
            template.to_string()
        } else {
            format!("{} {}", template, args.join(" "))
        };
    }

    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    for i in 0..placeholders {
        let pos = rest.find("%s").unwrap_or(rest.len());
        out.push_str(&rest[..pos]);
        if i + 1 == placeholders {
            // Last placeholder takes everything left over.
            out.push_str(&args.get(i..).map(|a| a.join(" ")).unwrap_or_default());
        } else {
            out.push_str(args.get(i).map(String::as_str).unwrap_or(""));
        }
        rest = &rest[(pos + 2).min(rest.len())..];
    }
    out.push_str(rest);
    out
}

/// Looks up `token` in a guild's shortcut map value.
pub fn shortcut_template(shortcuts: &Value, token: &str) -> Option<String> {
    shortcuts
        .as_object()?
        .get(token)
        .and_then(Value::as_str)
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_text_prefix() {
        let parsed = parse_invocation("!ban bob spamming", "!", &UserId::from("9")).unwrap();
        assert_eq!(parsed.prefix, PrefixKind::Text);
        assert_eq!(parsed.command, "ban");
        assert_eq!(parsed.args, vec!["bob", "spamming"]);
    }

    #[test]
    fn parses_mention_prefix_in_both_forms() {
        let bot = UserId::from("42");
        for content in ["<@42> help", "<@!42> help"] {
            let parsed = parse_invocation(content, "!", &bot).unwrap();
            assert_eq!(parsed.prefix, PrefixKind::Mention);
            assert_eq!(parsed.command, "help");
        }
    }

    #[test]
    fn non_command_chatter_is_not_parsed() {
        let bot = UserId::from("42");
        assert!(parse_invocation("hello there", "!", &bot).is_none());
        assert!(parse_invocation("<@99> help", "!", &bot).is_none());
        assert!(parse_invocation("!", "!", &bot).is_none());
        assert!(parse_invocation("!   ", "!", &bot).is_none());
    }

    #[test]
    fn command_token_is_lowercased() {
        let parsed = parse_invocation("!HELP", "!", &UserId::from("9")).unwrap();
        assert_eq!(parsed.command, "help");
    }

    #[test]
    fn expands_placeholders_positionally() {
        assert_eq!(
            expand_shortcut("ban %s %s", &["bob".into(), "spam".into(), "again".into()]),
            "ban bob spam again"
        );
        assert_eq!(expand_shortcut("help", &[]), "help");
        assert_eq!(
            expand_shortcut("help", &["commands".into()]),
            "help commands"
        );
        assert_eq!(expand_shortcut("mute %s", &[]), "mute ");
    }

    #[test]
    fn shortcut_lookup() {
        let shortcuts = json!({ "h": "help", "b": "ban %s" });
        assert_eq!(shortcut_template(&shortcuts, "h").as_deref(), Some("help"));
        assert_eq!(shortcut_template(&shortcuts, "x"), None);
        assert_eq!(shortcut_template(&json!("not a map"), "h"), None);
    }
}
