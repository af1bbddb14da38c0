use std::sync::Arc;

use crate::error::{Error, Result};
use crate::lang;
use crate::middleware::resolve::ResolverKind;
use crate::middleware::{middleware, Arg, Flow, Middleware};

#[derive(Debug, Clone)]
enum Expectation {
    Kind(ResolverKind),
    OneOf(Vec<String>),
}

#[derive(Debug, Clone)]
struct SpecEntry {
    name: String,
    expectation: Expectation,
}

fn parse_spec(spec: &str) -> Result<Vec<SpecEntry>> {
    let mut entries = Vec::new();
    for token in spec.split_whitespace() {
        let (name, ty) = token
            .split_once(':')
            .ok_or_else(|| Error::InvalidArgSpec(format!("missing `:` in `{token}`")))?;
        if name.is_empty() {
            return Err(Error::InvalidArgSpec(format!("empty name in `{token}`")));
        }
        let expectation = match ty.strip_prefix('(').and_then(|t| t.strip_suffix(')')) {
            Some(literals) => Expectation::OneOf(
                literals
                    .split('|')
                    .map(|l| l.trim().to_lowercase())
                    .filter(|l| !l.is_empty())
                    .collect(),
            ),
            None => Expectation::Kind(ty.parse()?),
        };
        entries.push(SpecEntry {
            name: name.to_string(),
            expectation,
        });
    }
    Ok(entries)
}

impl Expectation {
    fn describe(&self) -> String {
        match self {
            Expectation::Kind(kind) => kind.name().to_string(),
            Expectation::OneOf(literals) => format!("one of `{}`", literals.join("`, `")),
        }
    }

    fn matches(&self, arg: &Arg) -> bool {
        match self {
            Expectation::Kind(kind) => kind.matches(arg),
            Expectation::OneOf(literals) => arg
                .as_str()
                .map(|s| literals.iter().any(|l| l == &s.to_lowercase()))
                .unwrap_or(false),
        }
    }
}

/// Builds the `expect` middleware: validates that arguments are present and
/// of the declared type without mutating them.
///
/// `spec` entries are `name:Type` or `name:(lit1|lit2)` for an enumerated
/// set of string literals. Run it after any `resolve` stage and before
/// `localize`. Failures are raised as caller errors with the offending
/// argument named and the spec quoted as usage.
pub fn expect(spec: &str) -> Result<Middleware> {
    let entries = Arc::new(parse_spec(spec)?);
    let usage = Arc::new(spec.trim().to_string());

    Ok(middleware(move |cx, message, args| {
        let entries = entries.clone();
        let usage = usage.clone();
        async move {
            for (i, entry) in entries.iter().enumerate() {
                let Some(arg) = args.get(i) else {
                    return Err(Error::Middleware(cx.lang.get(
                        lang::ERR_MISSING_ARG,
                        &[&entry.name, &usage],
                    )));
                };
                if !entry.expectation.matches(arg) {
                    return Err(Error::Middleware(cx.lang.get(
                        lang::ERR_EXPECTED_TYPE,
                        &[&entry.name, &entry.expectation.describe(), &usage],
                    )));
                }
            }
            Ok(Flow::Continue(message, args))
        }
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests_support::{mock_cx, plain_message};

    #[tokio::test]
    async fn passes_matching_args_through_unchanged() {
        let stage = expect("amount:Number note:String").unwrap();
        let cx = mock_cx(None);
        let args = vec![Arg::Number(2.0), Arg::Str("hi".into())];

        let flow = stage(cx, plain_message("x"), args).await.unwrap();
        let Flow::Continue(_, args) = flow else {
            panic!("expected continue");
        };
        assert_eq!(args.len(), 2);
        assert_eq!(args[0].as_number(), Some(2.0));
    }

    #[tokio::test]
    async fn missing_argument_raises_a_caller_error() {
        let stage = expect("target:String").unwrap();
        let cx = mock_cx(None);

        let err = stage(cx, plain_message("x"), vec![]).await.unwrap_err();
        match err {
            Error::Middleware(text) => {
                assert!(text.contains("target"));
                assert!(text.contains("target:String"));
            }
            other => panic!("expected middleware error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn wrong_type_names_the_offending_argument() {
        let stage = expect("amount:Number").unwrap();
        let cx = mock_cx(None);

        let err = stage(cx, plain_message("x"), vec![Arg::Str("three".into())])
            .await
            .unwrap_err();
        match err {
            Error::Middleware(text) => assert!(text.contains("amount")),
            other => panic!("expected middleware error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn literal_sets_match_case_insensitively() {
        let stage = expect("mode:(on|off)").unwrap();

        let cx = mock_cx(None);
        let ok = stage(cx.clone(), plain_message("x"), vec![Arg::Str("ON".into())])
            .await
            .unwrap();
        assert!(matches!(ok, Flow::Continue(..)));

        let err = stage(cx, plain_message("x"), vec![Arg::Str("maybe".into())])
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Middleware(_)));
    }

    #[test]
    fn build_time_validation() {
        assert!(expect("name").is_err());
        assert!(expect("name:Banana").is_err());
        assert!(expect("name:(a|b)").is_ok());
    }
}
