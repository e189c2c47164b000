//! Traffic observation for logging collaborators.
//!
//! Every outgoing command and every line of every completed response is
//! reported to an observer. Presentation (colorized consoles, UIs) lives
//! outside this crate; the implementations here either discard the events
//! or forward them to `tracing`.

use crate::command::Tag;

/// Observer for protocol traffic on one connection.
///
/// Untagged lines are flagged distinctly so a presentation layer can render
/// them differently from tagged completion lines.
pub trait TrafficObserver: Send + Sync {
    /// Called when a command is written to the wire.
    fn command_sent(&self, tag: &Tag, command: &str) {
        let _ = (tag, command);
    }

    /// Called as soon as an untagged line arrives, before attribution.
    fn untagged(&self, line: &str) {
        let _ = line;
    }

    /// Called for each non-empty line of a completed response body.
    fn response_line(&self, tag: &Tag, line: &str, untagged: bool) {
        let _ = (tag, line, untagged);
    }
}

/// An observer that discards all traffic events.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl TrafficObserver for NoopObserver {}

/// An observer that logs traffic using `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl TrafficObserver for TracingObserver {
    fn command_sent(&self, tag: &Tag, command: &str) {
        tracing::debug!(%tag, command, "→ command");
    }

    fn untagged(&self, line: &str) {
        tracing::trace!(line, "untagged push");
    }

    fn response_line(&self, tag: &Tag, line: &str, untagged: bool) {
        if untagged {
            tracing::debug!(%tag, line = line.trim(), "← untagged");
        } else {
            tracing::debug!(%tag, line = line.trim(), "← response");
        }
    }
}
