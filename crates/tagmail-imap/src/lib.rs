//! # tagmail-imap
//!
//! A minimal asynchronous client for the tag-correlated IMAP wire
//! protocol. The client opens one TLS connection per session,
//! authenticates with the XOAUTH2 bearer-token SASL mechanism, and
//! correlates server replies (tagged completions and untagged pushes)
//! back to in-flight commands. FETCH ENVELOPE payloads decode into plain
//! display fields, including RFC 2047 encoded words.
//!
//! ## Quick start
//!
//! ```ignore
//! use std::sync::Arc;
//! use tagmail_imap::{
//!     Command, Config, Connection, Credential, FetchItem, TracingObserver,
//! };
//!
//! #[tokio::main]
//! async fn main() -> tagmail_imap::Result<()> {
//!     let config = Config::new("imap.example.com");
//!     let credential = Credential::new("user@example.com", "ya29.a0...");
//!
//!     let conn = Connection::open(&config, &credential, Arc::new(TracingObserver)).await?;
//!     conn.wait_ready().await?;
//!
//!     let select = conn.send(&Command::Select { mailbox: "INBOX".into() })?;
//!     let body = select.wait().await?;
//!
//!     let fetch = conn.send(&Command::Fetch {
//!         sequence: "1:*".into(),
//!         items: vec![FetchItem::Flags, FetchItem::Envelope],
//!     })?;
//!     for line in tagmail_imap::decode_envelopes(&fetch.wait().await?) {
//!         println!("{line}");
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Connection lifecycle
//!
//! ```text
//! Connecting ──(TLS up, AUTHENTICATE written)──▶ AuthSent ──▶ Ready
//!      │                                                        │
//!      └────────────(socket error / EOF)────────▶ Closed ◀──────┘
//! ```
//!
//! Ready is signaled as soon as AUTHENTICATE is on the wire, not once the
//! server accepts it; await [`Connection::authentication`] to observe the
//! actual outcome. Closed is terminal: there is no reconnection, and
//! pending commands are abandoned.
//!
//! ## Untagged attribution
//!
//! The protocol carries no framing beyond line terminators, and untagged
//! lines name no command. This client attributes them to the most
//! recently issued command, a best-effort heuristic rather than a
//! protocol guarantee. Callers that need strict attribution must
//! serialize command issuance, sending the next command only after the
//! previous completion.
//!
//! ## Modules
//!
//! - [`command`]: command model, wire serialization, correlation tags
//! - [`connection`]: TLS transport, response routing, lifecycle
//! - [`envelope`]: FETCH ENVELOPE decoding
//! - [`encoding`]: RFC 2047 encoded-word decoding
//! - [`observer`]: traffic observation for logging collaborators
//! - [`sasl`]: XOAUTH2 credential encoding

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod command;
pub mod connection;
pub mod encoding;
pub mod envelope;
mod error;
pub mod observer;
pub mod sasl;

pub use command::{Command, FetchItem, Tag};
pub use connection::{CommandHandle, Config, Connection, ConnectionState};
pub use encoding::decode_imap_string;
pub use envelope::{Envelope, decode_envelopes, envelopes};
pub use error::{Error, Result};
pub use observer::{NoopObserver, TracingObserver, TrafficObserver};
pub use sasl::{Credential, XOAUTH2_MECHANISM, xoauth2_initial_response};
