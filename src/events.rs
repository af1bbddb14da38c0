use std::time::Duration;

use crate::middleware::Arg;
use crate::platform::Message;

/// Fire-and-forget telemetry signals emitted by the dispatcher.
///
/// Used by operators for auditing and metrics; not required for
/// correctness. All methods default to no-ops.
pub trait EventSink: Send + Sync {
    /// A command action completed (successfully or not); `elapsed` is
    /// wall-clock time from message entry to completion.
    fn command(&self, _name: &str, _args: &[Arg], _elapsed: Duration, _message: &Message) {}

    /// A prefixed, command-like token did not resolve to any command.
    fn unknown_command(&self, _name: &str, _args: &[String], _message: &Message) {}

    /// The message carried no command at all (not even a prefix).
    fn no_command(&self, _message: &Message) {}
}

/// Sink that drops every signal.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl EventSink for NullSink {}
