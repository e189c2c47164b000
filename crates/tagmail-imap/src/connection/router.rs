//! Response routing for tagged and untagged lines.
//!
//! The router owns the per-connection correlation table. Lines are
//! classified by their prefix: a tagged line completes the command whose
//! tag it carries; an untagged line (leading `*`) and any continuation
//! line are attributed to the most recently issued command. The
//! attribution is a carried-over heuristic, not a protocol-correct
//! demultiplexer: with several commands in flight, untagged data may land
//! on the wrong one (last-writer-wins).

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::oneshot;

use crate::command::Tag;
use crate::observer::TrafficObserver;

/// One in-flight (or completed) command awaiting correlation.
///
/// Entries are retained after completion and live until the connection
/// closes.
struct PendingCommand {
    /// Accumulated body: every line seen for this tag, newline-terminated.
    buffer: String,
    /// One-shot completion, present until the first tagged line fires it.
    completion: Option<oneshot::Sender<String>>,
}

impl PendingCommand {
    fn empty() -> Self {
        Self {
            buffer: String::new(),
            completion: None,
        }
    }
}

/// Routes inbound lines to pending commands.
///
/// Owned exclusively by the connection task; no locking is involved.
pub(crate) struct Router {
    table: HashMap<Tag, PendingCommand>,
    /// Most recently issued tag; untagged lines are attributed here.
    current: Option<Tag>,
    observer: Arc<dyn TrafficObserver>,
}

impl Router {
    pub(crate) fn new(observer: Arc<dyn TrafficObserver>) -> Self {
        Self {
            table: HashMap::new(),
            current: None,
            observer,
        }
    }

    /// Registers a pending command under a freshly issued tag.
    pub(crate) fn register(&mut self, tag: Tag, completion: oneshot::Sender<String>) {
        self.table.insert(
            tag.clone(),
            PendingCommand {
                buffer: String::new(),
                completion: Some(completion),
            },
        );
        self.current = Some(tag);
    }

    /// Classifies one terminated line and dispatches it.
    pub(crate) fn dispatch(&mut self, line: &str) {
        if line.is_empty() {
            return;
        }

        if let Some(tag) = Tag::from_line(line) {
            // A tagged line for an id that was never issued still gets an
            // entry; its body is kept for inspection but nothing fires.
            let entry = self
                .table
                .entry(tag.clone())
                .or_insert_with(PendingCommand::empty);
            entry.buffer.push_str(line);
            entry.buffer.push('\n');

            if let Some(completion) = entry.completion.take() {
                for body_line in entry.buffer.split('\n') {
                    if !body_line.trim().is_empty() {
                        self.observer
                            .response_line(&tag, body_line, body_line.starts_with('*'));
                    }
                }
                // The receiver may already be gone; completion is best effort.
                let _ = completion.send(entry.buffer.clone());
            }
            return;
        }

        if line.starts_with('*') {
            self.observer.untagged(line);
        }

        // Untagged and continuation lines belong to the newest command,
        // whether or not it has already completed.
        if let Some(current) = &self.current {
            if let Some(entry) = self.table.get_mut(current) {
                entry.buffer.push_str(line);
                entry.buffer.push('\n');
            }
        }
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::redundant_clone,
    clippy::manual_string_new,
    clippy::needless_collect,
    clippy::unreadable_literal,
    clippy::used_underscore_items,
    clippy::similar_names
)]
mod tests {
    use super::*;

    use crate::observer::NoopObserver;

    fn tag(s: &str) -> Tag {
        Tag::from_line(&format!("{s} x")).unwrap()
    }

    fn router() -> Router {
        Router::new(Arc::new(NoopObserver))
    }

    #[test]
    fn test_tagged_line_completes_with_body() {
        let mut router = router();
        let (tx, mut rx) = oneshot::channel();
        router.register(tag("abcd1234"), tx);

        router.dispatch("abcd1234 OK done");

        assert_eq!(rx.try_recv().unwrap(), "abcd1234 OK done\n");
    }

    #[test]
    fn test_untagged_line_attributed_before_completion() {
        let mut router = router();
        let (tx, mut rx) = oneshot::channel();
        router.register(tag("abcd1234"), tx);

        router.dispatch("* 3 EXISTS");
        router.dispatch("abcd1234 OK");

        assert_eq!(rx.try_recv().unwrap(), "* 3 EXISTS\nabcd1234 OK\n");
    }

    #[test]
    fn test_completion_fires_once() {
        let mut router = router();
        let (tx, mut rx) = oneshot::channel();
        router.register(tag("abcd1234"), tx);

        router.dispatch("abcd1234 OK");
        assert!(rx.try_recv().is_ok());

        // A stray line with the same tag appends without re-firing
        router.dispatch("abcd1234 BAD again");
    }

    #[test]
    fn test_untagged_goes_to_most_recent_command() {
        let mut router = router();
        let (tx_a, mut rx_a) = oneshot::channel();
        let (tx_b, mut rx_b) = oneshot::channel();
        router.register(tag("aaaa0001"), tx_a);
        router.register(tag("bbbb0002"), tx_b);

        router.dispatch("* 7 EXISTS");
        router.dispatch("bbbb0002 OK second");
        router.dispatch("aaaa0001 OK first");

        assert_eq!(rx_b.try_recv().unwrap(), "* 7 EXISTS\nbbbb0002 OK second\n");
        assert_eq!(rx_a.try_recv().unwrap(), "aaaa0001 OK first\n");
    }

    #[test]
    fn test_untagged_sticks_to_newest_even_after_completion() {
        let mut router = router();
        let (tx, mut rx) = oneshot::channel();
        router.register(tag("abcd1234"), tx);

        router.dispatch("abcd1234 OK");
        assert!(rx.try_recv().is_ok());

        // Still attributed to the completed command; nothing panics
        router.dispatch("* 9 EXPUNGE");
    }

    #[test]
    fn test_unattributed_untagged_is_dropped() {
        let mut router = router();

        // No command issued yet; the line has nowhere to go
        router.dispatch("* OK server greeting");
    }

    #[test]
    fn test_continuation_line_appended_to_current() {
        let mut router = router();
        let (tx, mut rx) = oneshot::channel();
        router.register(tag("abcd1234"), tx);

        router.dispatch(" \"continued\" NIL NIL))");
        router.dispatch("abcd1234 OK");

        assert_eq!(
            rx.try_recv().unwrap(),
            " \"continued\" NIL NIL))\nabcd1234 OK\n"
        );
    }

    #[test]
    fn test_unknown_tag_creates_silent_entry() {
        let mut router = router();
        let (tx, mut rx) = oneshot::channel();
        router.register(tag("abcd1234"), tx);

        // Unknown id: accepted, but fires nothing
        router.dispatch("ffff9999 OK stray");
        assert!(rx.try_recv().is_err());

        router.dispatch("abcd1234 OK");
        assert_eq!(rx.try_recv().unwrap(), "abcd1234 OK\n");
    }

    #[test]
    fn test_empty_lines_skipped() {
        let mut router = router();
        let (tx, mut rx) = oneshot::channel();
        router.register(tag("abcd1234"), tx);

        router.dispatch("");
        router.dispatch("abcd1234 OK");

        assert_eq!(rx.try_recv().unwrap(), "abcd1234 OK\n");
    }

    #[test]
    fn test_dropped_receiver_does_not_panic() {
        let mut router = router();
        let (tx, rx) = oneshot::channel();
        router.register(tag("abcd1234"), tx);
        drop(rx);

        router.dispatch("abcd1234 OK");
    }
}
