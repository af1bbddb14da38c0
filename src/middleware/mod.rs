//! Composable middleware chain applied to `(message, args)` before a
//! command action runs.
//!
//! Ordering contract: client-level middleware runs before command-level
//! middleware, each in registration order. `resolve` must come before
//! `expect`, and `localize` is appended last by convention; the chain does
//! not enforce this structurally, and out-of-order stages will hand
//! downstream actions wrongly typed arguments.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use crate::error::Result;
use crate::lang::Language;
use crate::platform::{Author, ChannelId, Gateway, GuildId, Message, Role};

mod expect;
mod localize;
mod resolve;

pub use expect::expect;
pub use localize::localize;
pub use resolve::resolve;

/// A command argument as it flows through the chain.
///
/// The dispatcher seeds the chain with raw `Str` tokens; `resolve` replaces
/// them with typed values and `localize` prepends a `Lang` accessor.
#[derive(Clone)]
pub enum Arg {
    Str(String),
    Number(f64),
    Duration(Duration),
    User(Author),
    Member(Author),
    Channel(ChannelId),
    Role(Role),
    Lang(Arc<dyn Language>),
}

impl Arg {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Arg::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Arg::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_duration(&self) -> Option<Duration> {
        match self {
            Arg::Duration(d) => Some(*d),
            _ => None,
        }
    }

    pub fn as_user(&self) -> Option<&Author> {
        match self {
            Arg::User(u) | Arg::Member(u) => Some(u),
            _ => None,
        }
    }

    pub fn as_channel(&self) -> Option<&ChannelId> {
        match self {
            Arg::Channel(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_role(&self) -> Option<&Role> {
        match self {
            Arg::Role(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_lang(&self) -> Option<&Arc<dyn Language>> {
        match self {
            Arg::Lang(l) => Some(l),
            _ => None,
        }
    }
}

impl std::fmt::Debug for Arg {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Arg::Str(s) => f.debug_tuple("Str").field(s).finish(),
            Arg::Number(n) => f.debug_tuple("Number").field(n).finish(),
            Arg::Duration(d) => f.debug_tuple("Duration").field(d).finish(),
            Arg::User(u) => f.debug_tuple("User").field(&u.id).finish(),
            Arg::Member(m) => f.debug_tuple("Member").field(&m.id).finish(),
            Arg::Channel(c) => f.debug_tuple("Channel").field(c).finish(),
            Arg::Role(r) => f.debug_tuple("Role").field(&r.id).finish(),
            Arg::Lang(_) => f.write_str("Lang"),
        }
    }
}

/// Outcome of one middleware stage.
///
/// `Continue` replaces the working `(message, args)` for the next stage.
/// `Abort` stops the chain; the text is sent to the originating channel and
/// the command action is not invoked. Stages may also return `Err` with
/// [`crate::Error::Middleware`], which the dispatcher delivers privately
/// (used by `expect` for caller-actionable validation failures).
#[derive(Debug)]
pub enum Flow {
    Continue(Message, Vec<Arg>),
    Abort(String),
}

/// Shared context handed to every middleware invocation.
pub struct MiddlewareCx {
    pub gateway: Arc<dyn Gateway>,
    pub lang: Arc<dyn Language>,
    pub guild: Option<GuildId>,
}

pub type MiddlewareFuture = Pin<Box<dyn Future<Output = Result<Flow>> + Send>>;

/// A middleware stage: `(cx, message, args) -> Continue | Abort | Err`.
pub type Middleware =
    Arc<dyn Fn(Arc<MiddlewareCx>, Message, Vec<Arg>) -> MiddlewareFuture + Send + Sync>;

/// Wraps an async closure as a [`Middleware`].
pub fn middleware<F, Fut>(f: F) -> Middleware
where
    F: Fn(Arc<MiddlewareCx>, Message, Vec<Arg>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Flow>> + Send + 'static,
{
    Arc::new(move |cx, message, args| Box::pin(f(cx, message, args)))
}

/// Runs `stages` in order, threading `(message, args)` through.
pub async fn run_chain(
    cx: &Arc<MiddlewareCx>,
    stages: &[Middleware],
    mut message: Message,
    mut args: Vec<Arg>,
) -> Result<Flow> {
    for stage in stages {
        match stage(cx.clone(), message, args).await? {
            Flow::Continue(next_message, next_args) => {
                message = next_message;
                args = next_args;
            }
            abort @ Flow::Abort(_) => return Ok(abort),
        }
    }
    Ok(Flow::Continue(message, args))
}
