use crate::middleware::{middleware, Arg, Flow, Middleware};

/// Builds the `localize` middleware: prepends the invocation's language
/// accessor to the argument list so command actions receive localized
/// strings without re-deriving the locale.
///
/// Conventionally the last stage in a chain.
pub fn localize() -> Middleware {
    middleware(|cx, message, mut args| async move {
        args.insert(0, Arg::Lang(cx.lang.clone()));
        Ok(Flow::Continue(message, args))
    })
}
