//! Encoded-word decoding for header fields.
//!
//! Header fields carry non-ASCII text as RFC 2047 style encoded words
//! (`=?charset?encoding?payload?=`). Two sub-encodings are handled:
//! quoted-printable (`?Q?`) and base64 (`?B?`). Anything else passes
//! through unchanged, as does any payload that fails to decode.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;

/// Decodes an encoded-word header string.
///
/// Strings that do not start with `=?` are returned as-is. Decoding never
/// fails: a malformed payload yields the original string.
#[must_use]
pub fn decode_imap_string(input: &str) -> String {
    if !input.starts_with("=?") {
        return input.to_string();
    }

    if input.contains("?Q?") {
        return decode_quoted_printable_word(input);
    }

    if input.contains("?B?") {
        if let Some(decoded) = decode_base64_word(input) {
            return decoded;
        }
    }

    input.to_string()
}

/// Decodes the quoted-printable (`?Q?`) variant.
///
/// Charset/encoding markers are stripped, then `=XX` hex escapes become
/// their char codes. The three-byte escapes for smart double quotes are
/// special-cased so they come out as the intended punctuation rather than
/// three mapped chars.
fn decode_quoted_printable_word(input: &str) -> String {
    let stripped = strip_markers(input);
    let mut out = String::with_capacity(stripped.len());
    let mut rest = stripped.as_str();

    while !rest.is_empty() {
        // Smart double quotes
        if let Some(tail) = rest.strip_prefix("=E2=80=9C") {
            out.push('\u{201C}');
            rest = tail;
            continue;
        }
        if let Some(tail) = rest.strip_prefix("=E2=80=9D") {
            out.push('\u{201D}');
            rest = tail;
            continue;
        }

        let bytes = rest.as_bytes();
        if bytes[0] == b'='
            && bytes.len() >= 3
            && bytes[1].is_ascii_hexdigit()
            && bytes[2].is_ascii_hexdigit()
        {
            if let Ok(code) = u8::from_str_radix(&rest[1..3], 16) {
                out.push(char::from(code));
                rest = &rest[3..];
                continue;
            }
        }

        match rest.chars().next() {
            Some(ch) => {
                out.push(ch);
                rest = &rest[ch.len_utf8()..];
            }
            None => break,
        }
    }

    out
}

/// Removes `=?UTF-8?Q?` markers (case-insensitively) and `?=` terminators.
fn strip_markers(input: &str) -> String {
    const PREFIX: &str = "=?utf-8?q?";
    const TERMINATOR: &str = "?=";

    let mut out = String::with_capacity(input.len());
    let mut rest = input;

    while !rest.is_empty() {
        if rest
            .get(..PREFIX.len())
            .is_some_and(|p| p.eq_ignore_ascii_case(PREFIX))
        {
            rest = &rest[PREFIX.len()..];
            continue;
        }
        if let Some(tail) = rest.strip_prefix(TERMINATOR) {
            rest = tail;
            continue;
        }
        match rest.chars().next() {
            Some(ch) => {
                out.push(ch);
                rest = &rest[ch.len_utf8()..];
            }
            None => break,
        }
    }

    out
}

/// Decodes the base64 (`?B?`) variant.
///
/// The payload sits between the `?B?` marker and the `?=` terminator and
/// decodes as UTF-8 text. Returns `None` when the markers are absent or
/// the payload is not valid base64/UTF-8.
fn decode_base64_word(input: &str) -> Option<String> {
    let start = input.find("?B?")? + 3;
    let end = input[start..].find("?=")? + start;
    let decoded = STANDARD.decode(&input[start..end]).ok()?;
    String::from_utf8(decoded).ok()
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
    fn test_plain_passthrough() {
        assert_eq!(decode_imap_string("Hello"), "Hello");
        assert_eq!(decode_imap_string(""), "");
        assert_eq!(decode_imap_string("no =XX escapes here"), "no =XX escapes here");
    }

    #[test]
    fn test_quoted_printable() {
        // =E9 maps to the char code, not a UTF-8 sequence
        assert_eq!(decode_imap_string("=?UTF-8?Q?Caf=E9?="), "Caf\u{e9}");
    }

    #[test]
    fn test_quoted_printable_lowercase_marker() {
        assert_eq!(decode_imap_string("=?utf-8?Q?Caf=E9?="), "Caf\u{e9}");
    }

    #[test]
    fn test_quoted_printable_lowercase_hex() {
        assert_eq!(decode_imap_string("=?UTF-8?Q?Caf=e9?="), "Caf\u{e9}");
    }

    #[test]
    fn test_smart_quotes() {
        assert_eq!(
            decode_imap_string("=?UTF-8?Q?=E2=80=9CQuoted=E2=80=9D?="),
            "\u{201C}Quoted\u{201D}"
        );
    }

    #[test]
    fn test_base64() {
        assert_eq!(decode_imap_string("=?UTF-8?B?SGVsbG8=?="), "Hello");
    }

    #[test]
    fn test_base64_multibyte() {
        // "Héllo" encoded as UTF-8 base64
        assert_eq!(decode_imap_string("=?UTF-8?B?SMOpbGxv?="), "H\u{e9}llo");
    }

    #[test]
    fn test_base64_invalid_returns_original() {
        assert_eq!(
            decode_imap_string("=?UTF-8?B?not!!base64?="),
            "=?UTF-8?B?not!!base64?="
        );
    }

    #[test]
    fn test_unknown_encoding_passthrough() {
        assert_eq!(
            decode_imap_string("=?UTF-8?X?whatever?="),
            "=?UTF-8?X?whatever?="
        );
    }

    #[test]
    fn test_incomplete_escape_kept() {
        // A bare '=' with no hex pair stays verbatim
        assert_eq!(decode_imap_string("=?UTF-8?Q?a=?="), "a=");
    }
}
