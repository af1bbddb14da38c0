use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::lang;
use crate::middleware::{middleware, Arg, Flow, Middleware, MiddlewareCx};

/// Named argument resolver types accepted in arg specs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ResolverKind {
    Str,
    Number,
    Duration,
    User,
    Member,
    Channel,
    Role,
}

impl ResolverKind {
    pub(crate) fn name(self) -> &'static str {
        match self {
            ResolverKind::Str => "String",
            ResolverKind::Number => "Number",
            ResolverKind::Duration => "Duration",
            ResolverKind::User => "User",
            ResolverKind::Member => "Member",
            ResolverKind::Channel => "Channel",
            ResolverKind::Role => "Role",
        }
    }

    pub(crate) fn matches(self, arg: &Arg) -> bool {
        matches!(
            (self, arg),
            (ResolverKind::Str, Arg::Str(_))
                | (ResolverKind::Number, Arg::Number(_))
                | (ResolverKind::Duration, Arg::Duration(_))
                | (ResolverKind::User, Arg::User(_))
                | (ResolverKind::User, Arg::Member(_))
                | (ResolverKind::Member, Arg::Member(_))
                | (ResolverKind::Channel, Arg::Channel(_))
                | (ResolverKind::Role, Arg::Role(_))
        )
    }
}

impl FromStr for ResolverKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "String" => Ok(ResolverKind::Str),
            "Number" => Ok(ResolverKind::Number),
            "Duration" => Ok(ResolverKind::Duration),
            "User" => Ok(ResolverKind::User),
            "Member" => Ok(ResolverKind::Member),
            "Channel" => Ok(ResolverKind::Channel),
            "Role" => Ok(ResolverKind::Role),
            other => Err(Error::UnknownResolver(other.to_string())),
        }
    }
}

#[derive(Debug, Clone)]
struct SpecEntry {
    name: String,
    kind: ResolverKind,
    rest: bool,
}

fn parse_spec(spec: &str) -> Result<Vec<SpecEntry>> {
    let mut entries = Vec::new();
    for token in spec.split_whitespace() {
        let (name, kind) = token
            .split_once(':')
            .ok_or_else(|| Error::InvalidArgSpec(format!("missing `:` in `{token}`")))?;
        let (name, rest) = match name.strip_prefix("...") {
            Some(stripped) => (stripped, true),
            None => (name, false),
        };
        if name.is_empty() {
            return Err(Error::InvalidArgSpec(format!("empty name in `{token}`")));
        }
        entries.push(SpecEntry {
            name: name.to_string(),
            kind: kind.parse()?,
            rest,
        });
    }
    if entries
        .iter()
        .rev()
        .skip(1)
        .any(|entry| entry.rest)
    {
        return Err(Error::InvalidArgSpec(
            "`...` rest marker is only valid on the trailing argument".to_string(),
        ));
    }
    Ok(entries)
}

/// Parses a bare duration token like `10s`, `5m`, `2h`, `1d` or `90`
/// (seconds by default).
fn parse_duration_token(token: &str) -> Option<Duration> {
    let (digits, unit) = match token.find(|c: char| !c.is_ascii_digit()) {
        Some(pos) => token.split_at(pos),
        None => (token, ""),
    };
    let amount: u64 = digits.parse().ok()?;
    let seconds = match unit {
        "" | "s" => amount,
        "m" => amount * 60,
        "h" => amount * 3600,
        "d" => amount * 86_400,
        _ => return None,
    };
    Some(Duration::from_secs(seconds))
}

async fn resolve_token(
    cx: &MiddlewareCx,
    entry: &SpecEntry,
    token: &str,
) -> Result<Option<Arg>> {
    let resolved = match entry.kind {
        ResolverKind::Str => Some(Arg::Str(token.to_string())),
        ResolverKind::Number => token.parse::<f64>().ok().map(Arg::Number),
        ResolverKind::Duration => parse_duration_token(token).map(Arg::Duration),
        ResolverKind::User => cx.gateway.find_user(token).await?.map(Arg::User),
        ResolverKind::Member => match &cx.guild {
            Some(guild) => cx.gateway.find_member(guild, token).await?.map(Arg::Member),
            None => None,
        },
        ResolverKind::Channel => match &cx.guild {
            Some(guild) => cx.gateway.find_channel(guild, token).await?.map(Arg::Channel),
            None => None,
        },
        ResolverKind::Role => match &cx.guild {
            Some(guild) => cx.gateway.find_role(guild, token).await?.map(Arg::Role),
            None => None,
        },
    };
    Ok(resolved)
}

/// Builds the `resolve` middleware: positionally maps raw string arguments
/// to typed values.
///
/// `spec` is whitespace-separated `name:Type` entries; a trailing
/// `...name:Type` greedily consumes all remaining tokens (joined by spaces)
/// before resolution. Unknown types are rejected here, at build time.
///
/// A token that fails to resolve aborts the chain with a localized notice;
/// arguments the caller simply didn't supply are left for `expect` to
/// report.
pub fn resolve(spec: &str) -> Result<Middleware> {
    let entries = Arc::new(parse_spec(spec)?);

    Ok(middleware(move |cx, message, args| {
        let entries = entries.clone();
        async move {
            let mut out: Vec<Arg> = Vec::with_capacity(args.len());
            let mut iter = args.into_iter();

            for entry in entries.iter() {
                if entry.rest {
                    let tail: Vec<String> = iter
                        .by_ref()
                        .map(|arg| match arg {
                            Arg::Str(s) => s,
                            other => format!("{other:?}"),
                        })
                        .collect();
                    if tail.is_empty() {
                        break;
                    }
                    let token = tail.join(" ");
                    match resolve_token(&cx, entry, &token).await? {
                        Some(arg) => out.push(arg),
                        None => {
                            return Ok(Flow::Abort(cx.lang.get(
                                lang::ERR_RESOLVER_FAILED,
                                &[&entry.name, entry.kind.name()],
                            )))
                        }
                    }
                    break;
                }

                let Some(arg) = iter.next() else { break };
                // Already-typed values pass through untouched so chained
                // resolve stages compose.
                let token = match arg {
                    Arg::Str(s) => s,
                    typed => {
                        out.push(typed);
                        continue;
                    }
                };
                match resolve_token(&cx, entry, &token).await? {
                    Some(resolved) => out.push(resolved),
                    None => {
                        return Ok(Flow::Abort(cx.lang.get(
                            lang::ERR_RESOLVER_FAILED,
                            &[&entry.name, entry.kind.name()],
                        )))
                    }
                }
            }

            // Tokens beyond the spec stay raw.
            out.extend(iter);
            Ok(Flow::Continue(message, out))
        }
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests_support::{mock_cx, plain_message};

    fn raw(tokens: &[&str]) -> Vec<Arg> {
        tokens.iter().map(|t| Arg::Str(t.to_string())).collect()
    }

    #[test]
    fn unknown_type_fails_at_build_time() {
        match resolve("target:Banana") {
            Err(Error::UnknownResolver(name)) => assert_eq!(name, "Banana"),
            Err(other) => panic!("expected unknown resolver error, got {other:?}"),
            Ok(_) => panic!("unknown resolver type was accepted"),
        }
    }

    #[test]
    fn rest_marker_must_be_trailing() {
        assert!(resolve("...a:String b:Number").is_err());
        assert!(resolve("a:String ...b:String").is_ok());
    }

    #[tokio::test]
    async fn resolves_numbers_and_durations() {
        let stage = resolve("amount:Number delay:Duration").unwrap();
        let cx = mock_cx(None);

        let flow = stage(cx, plain_message("x"), raw(&["3.5", "10m"]))
            .await
            .unwrap();
        let Flow::Continue(_, args) = flow else {
            panic!("expected continue");
        };
        assert_eq!(args[0].as_number(), Some(3.5));
        assert_eq!(args[1].as_duration(), Some(Duration::from_secs(600)));
    }

    #[tokio::test]
    async fn rest_argument_consumes_remaining_tokens() {
        let stage = resolve("target:String ...reason:String").unwrap();
        let cx = mock_cx(None);

        let flow = stage(cx, plain_message("x"), raw(&["bob", "spamming", "in", "general"]))
            .await
            .unwrap();
        let Flow::Continue(_, args) = flow else {
            panic!("expected continue");
        };
        assert_eq!(args.len(), 2);
        assert_eq!(args[1].as_str(), Some("spamming in general"));
    }

    #[tokio::test]
    async fn unresolvable_token_aborts_with_notice() {
        let stage = resolve("amount:Number").unwrap();
        let cx = mock_cx(None);

        let flow = stage(cx, plain_message("x"), raw(&["plenty"])).await.unwrap();
        match flow {
            Flow::Abort(text) => {
                assert!(text.contains("amount"));
                assert!(text.contains("Number"));
            }
            other => panic!("expected abort, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn missing_tokens_are_left_for_expect() {
        let stage = resolve("a:Number b:Number").unwrap();
        let cx = mock_cx(None);

        let flow = stage(cx, plain_message("x"), raw(&["1"])).await.unwrap();
        let Flow::Continue(_, args) = flow else {
            panic!("expected continue");
        };
        assert_eq!(args.len(), 1);
    }

    #[tokio::test]
    async fn member_resolution_goes_through_the_gateway() {
        let stage = resolve("target:Member").unwrap();
        let cx = mock_cx(Some("g1".into()));

        let flow = stage(cx, plain_message("x"), raw(&["alice"])).await.unwrap();
        let Flow::Continue(_, args) = flow else {
            panic!("expected continue");
        };
        assert!(matches!(args[0], Arg::Member(_)));
    }
}
