//! FETCH ENVELOPE decoding.
//!
//! The ENVELOPE payload is a nested, quoted, parenthesized micro-grammar.
//! A depth-aware tokenizer splits the balanced text into top-level elements
//! (quoted strings or parenthesized groups); fields are then extracted
//! positionally: element 0 is the date, element 1 the subject, and the
//! sender is the first doubly-nested group.

use crate::encoding::decode_imap_string;
use crate::error::{Error, Result};

/// Marker locating the envelope payload within a FETCH line.
const ENVELOPE_MARKER: &str = "ENVELOPE (";

/// Fallbacks matching the wire protocol's NIL placeholders.
const NO_DATE: &str = "No Date";
const NO_SUBJECT: &str = "No Subject";
const UNKNOWN_NAME: &str = "Unknown";
const UNKNOWN_EMAIL: &str = "unknown@email";

/// Decoded view of a message envelope.
///
/// Derived from a FETCH response body on demand; never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    /// Message date, verbatim from the envelope.
    pub date: String,
    /// Decoded subject.
    pub subject: String,
    /// Decoded sender display name.
    pub from_name: String,
    /// Sender address as `mailbox@host`.
    pub from_email: String,
}

impl Envelope {
    /// Renders the one-line human-readable summary.
    #[must_use]
    pub fn summary(&self) -> String {
        format!(
            "From: {} <{}> - Subject: {}",
            self.from_name, self.from_email, self.subject
        )
    }
}

/// Decodes every envelope in an accumulated FETCH response body into
/// summary lines, in server reply order.
///
/// A message that fails to decode contributes a literal error string
/// instead of aborting the batch.
#[must_use]
pub fn decode_envelopes(body: &str) -> Vec<String> {
    envelopes(body)
        .into_iter()
        .map(|decoded| match decoded {
            Ok(envelope) => envelope.summary(),
            Err(e) => format!("Error parsing message: {e}"),
        })
        .collect()
}

/// Decodes every envelope in an accumulated FETCH response body.
///
/// One entry per line carrying the ENVELOPE marker; an envelope whose
/// closing parentheses land on a later accumulated line is completed from
/// the following lines before decoding.
#[must_use]
pub fn envelopes(body: &str) -> Vec<Result<Envelope>> {
    let lines: Vec<&str> = body.split('\n').collect();
    let mut decoded = Vec::new();

    for (index, line) in lines.iter().enumerate() {
        if let Some(pos) = line.find(ENVELOPE_MARKER) {
            let capture = balance(&lines, index, &line[pos + ENVELOPE_MARKER.len()..]);
            decoded.push(decode_one(&capture));
        }
    }

    decoded
}

/// Extends a capture across following lines until the double close shows up.
///
/// Best effort, not a formal bracket counter: the envelope is deemed
/// complete once the first line ends with `))` or a continuation line
/// contains it.
fn balance(lines: &[&str], index: usize, first: &str) -> String {
    let mut capture = first.to_string();
    if capture.ends_with("))") {
        return capture;
    }
    for line in &lines[index + 1..] {
        capture.push_str(line);
        if line.contains("))") {
            break;
        }
    }
    capture
}

/// Decodes one balanced envelope capture.
fn decode_one(text: &str) -> Result<Envelope> {
    let elements = tokenize(text);
    if elements.is_empty() {
        return Err(Error::Decode("empty envelope".to_string()));
    }

    let date = elements
        .first()
        .map_or_else(|| NO_DATE.to_string(), |e| e.text.clone());
    let subject = decode_imap_string(
        &elements
            .get(1)
            .map_or_else(|| NO_SUBJECT.to_string(), |e| e.text.clone()),
    );

    // The sender is the first group that itself opens with a nested group.
    let sender_fields = elements
        .iter()
        .find(|e| e.group && e.text.starts_with("(("))
        .and_then(|e| sender_inner(&e.text))
        .map(tokenize_fields)
        .unwrap_or_default();

    let from_name = decode_imap_string(
        sender_fields
            .first()
            .map_or(UNKNOWN_NAME, String::as_str),
    );
    let from_email = match (address_part(&sender_fields, 2), address_part(&sender_fields, 3)) {
        (Some(mailbox), Some(host)) => format!("{mailbox}@{host}"),
        _ => UNKNOWN_EMAIL.to_string(),
    };

    Ok(Envelope {
        date,
        subject,
        from_name,
        from_email,
    })
}

/// Returns the inner text of the first doubly-nested address group.
fn sender_inner(group: &str) -> Option<&str> {
    let inner = group.strip_prefix("((")?;
    let end = inner.find("))")?;
    Some(&inner[..end])
}

/// Extracts one positional address sub-field, treating NIL as absent.
fn address_part(fields: &[String], index: usize) -> Option<&str> {
    fields
        .get(index)
        .map(String::as_str)
        .filter(|f| !f.is_empty() && !f.eq_ignore_ascii_case("NIL"))
}

/// A top-level element of balanced envelope text.
struct Element {
    /// Unquoted value for strings; raw text including parentheses for groups.
    text: String,
    /// True if the element was parenthesized.
    group: bool,
}

/// Splits balanced envelope text into top-level elements.
///
/// Elements are double-quoted strings or parenthesized groups; anything
/// between them (spaces, NIL atoms) is skipped. Groups keep their
/// parentheses so callers can detect nesting.
fn tokenize(text: &str) -> Vec<Element> {
    let bytes = text.as_bytes();
    let mut elements = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'"' => {
                let (value, next) = read_quoted(text, i);
                elements.push(Element {
                    text: value,
                    group: false,
                });
                i = next;
            }
            b'(' => {
                let (raw, next) = read_group(text, i);
                elements.push(Element {
                    text: raw,
                    group: true,
                });
                i = next;
            }
            _ => i += 1,
        }
    }

    elements
}

/// Reads a quoted string starting at the opening quote; returns the
/// unquoted value and the position past the closing quote.
fn read_quoted(text: &str, start: usize) -> (String, usize) {
    let bytes = text.as_bytes();
    let mut value = Vec::new();
    let mut i = start + 1;

    while i < bytes.len() {
        match bytes[i] {
            b'"' => return (String::from_utf8_lossy(&value).into_owned(), i + 1),
            b'\\' if i + 1 < bytes.len() => {
                value.push(bytes[i + 1]);
                i += 2;
            }
            b => {
                value.push(b);
                i += 1;
            }
        }
    }

    (String::from_utf8_lossy(&value).into_owned(), i)
}

/// Reads a parenthesized group starting at the opening paren, tracking
/// depth and quoting; returns the raw group text (parentheses included)
/// and the position past the closing paren.
fn read_group(text: &str, start: usize) -> (String, usize) {
    let bytes = text.as_bytes();
    let mut depth = 0usize;
    let mut in_quote = false;
    let mut i = start;

    while i < bytes.len() {
        match bytes[i] {
            b'\\' if in_quote && i + 1 < bytes.len() => i += 1,
            b'"' => in_quote = !in_quote,
            b'(' if !in_quote => depth += 1,
            b')' if !in_quote => {
                depth -= 1;
                if depth == 0 {
                    return (text[start..=i].to_string(), i + 1);
                }
            }
            _ => {}
        }
        i += 1;
    }

    (text[start..].to_string(), i)
}

/// Splits an address group's inner text into positional sub-fields.
///
/// Quoted sub-fields keep embedded spaces; bare atoms (NIL) stand as
/// their own sub-field.
fn tokenize_fields(text: &str) -> Vec<String> {
    let bytes = text.as_bytes();
    let mut fields = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b' ' => i += 1,
            b'"' => {
                let (value, next) = read_quoted(text, i);
                fields.push(value);
                i = next;
            }
            _ => {
                let start = i;
                while i < bytes.len() && bytes[i] != b' ' {
                    i += 1;
                }
                fields.push(text[start..i].to_string());
            }
        }
    }

    fields
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

    const FETCH_LINE: &str = "* 12 FETCH (FLAGS (\\Seen) ENVELOPE (\"Mon, 7 Jul 2025 09:15:00 +0000\" \"Weekly sync\" ((\"Alice Smith\" NIL \"alice\" \"example.com\")) NIL NIL ((\"Bob\" NIL \"bob\" \"example.org\")) NIL NIL NIL \"<id@example.com>\"))";

    #[test]
    fn test_single_line_envelope() {
        let decoded = envelopes(FETCH_LINE);
        assert_eq!(decoded.len(), 1);

        let envelope = decoded[0].as_ref().unwrap();
        assert_eq!(envelope.date, "Mon, 7 Jul 2025 09:15:00 +0000");
        assert_eq!(envelope.subject, "Weekly sync");
        assert_eq!(envelope.from_name, "Alice Smith");
        assert_eq!(envelope.from_email, "alice@example.com");
    }

    #[test]
    fn test_summary_format() {
        let envelope = envelopes(FETCH_LINE)[0].as_ref().unwrap().clone();
        assert_eq!(
            envelope.summary(),
            "From: Alice Smith <alice@example.com> - Subject: Weekly sync"
        );
    }

    #[test]
    fn test_multi_line_envelope() {
        // The closing parens arrive on a later accumulated line
        let body = "* 3 FETCH (ENVELOPE (\"Tue, 8 Jul 2025 10:00:00 +0000\" \"Split\"\n ((\"Carol\" NIL \"carol\" \"example.net\")) NIL NIL NIL NIL NIL NIL NIL))\nabcd1234 OK done\n";
        let decoded = envelopes(body);
        assert_eq!(decoded.len(), 1);

        let envelope = decoded[0].as_ref().unwrap();
        assert_eq!(envelope.subject, "Split");
        assert_eq!(envelope.from_name, "Carol");
        assert_eq!(envelope.from_email, "carol@example.net");
    }

    #[test]
    fn test_encoded_subject() {
        let body = "* 1 FETCH (ENVELOPE (\"Wed, 9 Jul 2025 11:00:00 +0000\" \"=?UTF-8?B?SGVsbG8=?=\" ((\"Dan\" NIL \"dan\" \"example.com\")) NIL NIL NIL NIL NIL NIL NIL))";
        let envelope = envelopes(body)[0].as_ref().unwrap().clone();
        assert_eq!(envelope.subject, "Hello");
    }

    #[test]
    fn test_encoded_sender_name() {
        let body = "* 1 FETCH (ENVELOPE (\"Wed, 9 Jul 2025 11:00:00 +0000\" \"Hi\" ((\"=?UTF-8?Q?Ren=E9?=\" NIL \"rene\" \"example.com\")) NIL NIL NIL NIL NIL NIL NIL))";
        let envelope = envelopes(body)[0].as_ref().unwrap().clone();
        assert_eq!(envelope.from_name, "Ren\u{e9}");
    }

    #[test]
    fn test_nil_sender_fields_fall_back() {
        let body = "* 1 FETCH (ENVELOPE (\"Thu, 10 Jul 2025 12:00:00 +0000\" \"NILs\" ((NIL NIL NIL NIL)) NIL NIL NIL NIL NIL NIL NIL))";
        let envelope = envelopes(body)[0].as_ref().unwrap().clone();
        assert_eq!(envelope.from_email, "unknown@email");
    }

    #[test]
    fn test_missing_sender_group_falls_back() {
        let body = "* 1 FETCH (ENVELOPE (\"Thu, 10 Jul 2025 12:00:00 +0000\" \"Bare\"))";
        let envelope = envelopes(body)[0].as_ref().unwrap().clone();
        assert_eq!(envelope.from_name, "Unknown");
        assert_eq!(envelope.from_email, "unknown@email");
    }

    #[test]
    fn test_decode_failure_does_not_abort_batch() {
        // The second envelope never produces any element to extract
        let body = format!("{FETCH_LINE}\n* 2 FETCH (ENVELOPE (\nabcd1234 OK done\n");
        let summaries = decode_envelopes(&body);
        assert_eq!(summaries.len(), 2);
        assert!(summaries[0].contains("Alice Smith"));
        assert!(summaries[1].starts_with("Error parsing message:"));
    }

    #[test]
    fn test_server_reply_order_preserved() {
        let body = format!("{FETCH_LINE}\n* 13 FETCH (ENVELOPE (\"Fri, 11 Jul 2025 08:00:00 +0000\" \"Second\" ((\"Eve\" NIL \"eve\" \"example.com\")) NIL NIL NIL NIL NIL NIL NIL))\n");
        let summaries = decode_envelopes(&body);
        assert_eq!(summaries.len(), 2);
        assert!(summaries[0].contains("Weekly sync"));
        assert!(summaries[1].contains("Second"));
    }

    #[test]
    fn test_quoted_parens_do_not_confuse_tokenizer() {
        let body = "* 1 FETCH (ENVELOPE (\"Sat, 12 Jul 2025 09:00:00 +0000\" \"About (that) thing\" ((\"Frank\" NIL \"frank\" \"example.com\")) NIL NIL NIL NIL NIL NIL NIL))";
        let envelope = envelopes(body)[0].as_ref().unwrap().clone();
        assert_eq!(envelope.subject, "About (that) thing");
        assert_eq!(envelope.from_email, "frank@example.com");
    }

    #[test]
    fn test_tokenize_fields_keeps_quoted_spaces() {
        let fields = tokenize_fields("\"Alice Smith\" NIL \"alice\" \"example.com\"");
        assert_eq!(fields, vec!["Alice Smith", "NIL", "alice", "example.com"]);
    }
}
