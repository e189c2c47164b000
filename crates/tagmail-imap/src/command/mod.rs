//! IMAP command model and wire serialization.
//!
//! The command set is closed: these are the only commands the client can
//! issue, and each variant has exactly one wire form.

mod tag;

pub use tag::Tag;

/// Items that can be requested in a FETCH.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchItem {
    /// Message flags.
    Flags,
    /// Envelope structure.
    Envelope,
    /// Message body.
    Body,
    /// UID.
    Uid,
}

impl FetchItem {
    pub(crate) const fn as_str(self) -> &'static str {
        match self {
            Self::Flags => "FLAGS",
            Self::Envelope => "ENVELOPE",
            Self::Body => "BODY",
            Self::Uid => "UID",
        }
    }
}

/// IMAP command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// CAPABILITY command.
    Capability,
    /// NOOP command.
    Noop,
    /// LOGOUT command.
    Logout,
    /// SELECT command.
    Select {
        /// Mailbox to select.
        mailbox: String,
    },
    /// EXAMINE command (read-only SELECT).
    Examine {
        /// Mailbox to examine.
        mailbox: String,
    },
    /// AUTHENTICATE command carrying a pre-computed initial response.
    Authenticate {
        /// Authentication mechanism.
        mechanism: String,
        /// Initial response blob.
        initial_response: String,
    },
    /// FETCH command.
    Fetch {
        /// Sequence set, e.g. `1:*`, `1,2,3`, `1:10`.
        sequence: String,
        /// Items to fetch.
        items: Vec<FetchItem>,
    },
    /// STORE command. Always additive (`+FLAGS`); there is no
    /// flag-removal variant.
    Store {
        /// Sequence set.
        sequence: String,
        /// Flags to add.
        flags: Vec<String>,
    },
    /// SEARCH command.
    Search {
        /// Search criteria, joined by spaces on the wire.
        criteria: Vec<String>,
    },
    /// LIST command.
    List {
        /// Reference name.
        reference: String,
        /// Mailbox pattern.
        mailbox: String,
    },
}

impl Command {
    /// Serializes the command to its wire form, without tag or CRLF.
    ///
    /// Serialization is pure and total over the command set. Mailbox names
    /// are quoted verbatim; embedded quotes are not escaped.
    #[must_use]
    pub fn serialize(&self) -> String {
        match self {
            Self::Capability => "CAPABILITY".to_string(),
            Self::Noop => "NOOP".to_string(),
            Self::Logout => "LOGOUT".to_string(),

            Self::Select { mailbox } => format!("SELECT \"{mailbox}\""),
            Self::Examine { mailbox } => format!("EXAMINE \"{mailbox}\""),

            Self::Authenticate {
                mechanism,
                initial_response,
            } => format!("AUTHENTICATE {mechanism} {initial_response}"),

            Self::Fetch { sequence, items } => {
                let items: Vec<&str> = items.iter().map(|item| item.as_str()).collect();
                format!("FETCH {sequence} ({})", items.join(" "))
            }

            Self::Store { sequence, flags } => {
                format!("STORE {sequence} +FLAGS ({})", flags.join(" "))
            }

            Self::Search { criteria } => format!("SEARCH {}", criteria.join(" ")),

            Self::List { reference, mailbox } => format!("LIST \"{reference}\" \"{mailbox}\""),
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

    #[test]
    fn test_bare_keywords() {
        assert_eq!(Command::Capability.serialize(), "CAPABILITY");
        assert_eq!(Command::Noop.serialize(), "NOOP");
        assert_eq!(Command::Logout.serialize(), "LOGOUT");
    }

    #[test]
    fn test_select() {
        let command = Command::Select {
            mailbox: "INBOX".to_string(),
        };
        assert_eq!(command.serialize(), "SELECT \"INBOX\"");
    }

    #[test]
    fn test_examine() {
        let command = Command::Examine {
            mailbox: "Sent".to_string(),
        };
        assert_eq!(command.serialize(), "EXAMINE \"Sent\"");
    }

    #[test]
    fn test_select_quotes_verbatim() {
        // Embedded quotes are intentionally not escaped
        let command = Command::Select {
            mailbox: "odd\"name".to_string(),
        };
        assert_eq!(command.serialize(), "SELECT \"odd\"name\"");
    }

    #[test]
    fn test_authenticate() {
        let command = Command::Authenticate {
            mechanism: "XOAUTH2".to_string(),
            initial_response: "dXNlcj0=".to_string(),
        };
        assert_eq!(command.serialize(), "AUTHENTICATE XOAUTH2 dXNlcj0=");
    }

    #[test]
    fn test_fetch() {
        let command = Command::Fetch {
            sequence: "5:*".to_string(),
            items: vec![FetchItem::Flags, FetchItem::Envelope],
        };
        assert_eq!(command.serialize(), "FETCH 5:* (FLAGS ENVELOPE)");
    }

    #[test]
    fn test_fetch_all_items() {
        let command = Command::Fetch {
            sequence: "1".to_string(),
            items: vec![
                FetchItem::Flags,
                FetchItem::Envelope,
                FetchItem::Body,
                FetchItem::Uid,
            ],
        };
        assert_eq!(command.serialize(), "FETCH 1 (FLAGS ENVELOPE BODY UID)");
    }

    #[test]
    fn test_store() {
        let command = Command::Store {
            sequence: "1".to_string(),
            flags: vec!["\\Seen".to_string()],
        };
        assert_eq!(command.serialize(), "STORE 1 +FLAGS (\\Seen)");
    }

    #[test]
    fn test_search() {
        let command = Command::Search {
            criteria: vec!["UNSEEN".to_string(), "SINCE".to_string(), "1-Jan-2025".to_string()],
        };
        assert_eq!(command.serialize(), "SEARCH UNSEEN SINCE 1-Jan-2025");
    }

    #[test]
    fn test_list() {
        let command = Command::List {
            reference: String::new(),
            mailbox: "*".to_string(),
        };
        assert_eq!(command.serialize(), "LIST \"\" \"*\"");
    }
}
