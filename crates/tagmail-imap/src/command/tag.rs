//! Command correlation tags.
//!
//! Every outgoing command is prefixed with a freshly generated tag of
//! exactly eight lowercase hexadecimal characters; the server echoes the
//! tag on the completion line for that command.

use std::fmt;
use std::fmt::Write as _;

use rand::Rng;

/// Number of hex characters in a tag.
const TAG_LEN: usize = 8;

/// Correlation tag for one in-flight command.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Tag(String);

impl Tag {
    /// Generates a fresh tag from four random bytes.
    ///
    /// A tag is never reissued within a connection; the id space is large
    /// enough that collision is treated as practically impossible rather
    /// than structurally prevented.
    #[must_use]
    pub fn generate() -> Self {
        let bytes: [u8; 4] = rand::thread_rng().r#gen();
        let mut tag = String::with_capacity(TAG_LEN);
        for b in bytes {
            let _ = write!(tag, "{b:02x}");
        }
        Self(tag)
    }

    /// Extracts the tag prefix from a response line.
    ///
    /// A tagged line starts with exactly eight lowercase hex characters
    /// followed by a space; anything else is not a tagged line.
    #[must_use]
    pub fn from_line(line: &str) -> Option<Self> {
        let bytes = line.as_bytes();
        if bytes.len() <= TAG_LEN || bytes[TAG_LEN] != b' ' {
            return None;
        }
        if bytes[..TAG_LEN].iter().copied().all(is_lower_hex) {
            Some(Self(line[..TAG_LEN].to_string()))
        } else {
            None
        }
    }

    /// Returns the tag as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Returns true for the lowercase hex alphabet.
const fn is_lower_hex(b: u8) -> bool {
    matches!(b, b'0'..=b'9' | b'a'..=b'f')
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

    use proptest::prelude::*;

    #[test]
    fn test_format() {
        let tag = Tag::generate();
        assert_eq!(tag.as_str().len(), 8);
        assert!(tag.as_str().bytes().all(is_lower_hex));
    }

    #[test]
    fn test_uniqueness() {
        let mut seen = std::collections::HashSet::new();

        // Generate 1000 tags and ensure all are distinct
        for _ in 0..1000 {
            let tag = Tag::generate();
            assert!(seen.insert(tag), "duplicate tag generated");
        }
    }

    #[test]
    fn test_from_line_tagged() {
        let tag = Tag::from_line("abcd1234 OK done").unwrap();
        assert_eq!(tag.as_str(), "abcd1234");
    }

    #[test]
    fn test_from_line_rejects_non_tags() {
        assert!(Tag::from_line("* 3 EXISTS").is_none());
        assert!(Tag::from_line("ABCD1234 OK uppercase").is_none());
        assert!(Tag::from_line("abcd123 OK short").is_none());
        assert!(Tag::from_line("abcd12345 OK long").is_none());
        assert!(Tag::from_line("abcd1234no-space").is_none());
        assert!(Tag::from_line("abcd1234").is_none());
        assert!(Tag::from_line("").is_none());
    }

    #[test]
    fn test_from_line_roundtrip() {
        let tag = Tag::generate();
        let line = format!("{tag} OK completed");
        assert_eq!(Tag::from_line(&line).unwrap(), tag);
    }

    proptest! {
        #[test]
        fn prop_generated_tags_are_valid(_seed in 0u32..1000) {
            let tag = Tag::generate();
            prop_assert_eq!(tag.as_str().len(), 8);
            prop_assert!(tag.as_str().bytes().all(is_lower_hex));
        }
    }
}
