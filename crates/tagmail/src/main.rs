//! `tagmail` - prints the newest inbox messages over IMAP.
//!
//! Credentials come from the environment (`IMAP_USERNAME`,
//! `IMAP_ACCESS_TOKEN`), produced by an external `OAuth2` flow; the access
//! token is presented via the XOAUTH2 SASL mechanism.

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

use std::env;
use std::sync::Arc;

use anyhow::Context as _;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tagmail_imap::{
    Command, Config, Connection, Credential, FetchItem, TracingObserver, decode_envelopes,
};

/// How many of the newest messages to show.
const MESSAGE_WINDOW: u32 = 4;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tagmail=info,tagmail_imap=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let host = env::var("IMAP_HOST").unwrap_or_else(|_| "imap.gmail.com".to_string());
    let port = env::var("IMAP_PORT")
        .ok()
        .map(|p| p.parse::<u16>())
        .transpose()
        .context("IMAP_PORT must be a port number")?;
    let username = env::var("IMAP_USERNAME").context("IMAP_USERNAME is not set")?;
    let access_token = env::var("IMAP_ACCESS_TOKEN").context("IMAP_ACCESS_TOKEN is not set")?;

    let mut config = Config::new(host);
    if let Some(port) = port {
        config = config.port(port);
    }
    let credential = Credential::new(username, access_token);

    let conn = Connection::open(&config, &credential, Arc::new(TracingObserver)).await?;
    conn.wait_ready().await?;
    info!(host = %config.host, "session ready");

    let select = conn.send(&Command::Select {
        mailbox: "INBOX".to_string(),
    })?;
    let body = select.wait().await?;
    let total = exists_count(&body).unwrap_or(0);
    let start = total.saturating_sub(MESSAGE_WINDOW - 1).max(1);

    let fetch = conn.send(&Command::Fetch {
        sequence: format!("{start}:*"),
        items: vec![FetchItem::Flags, FetchItem::Envelope],
    })?;
    let body = fetch.wait().await?;

    println!("\nLast messages:");
    println!("----------------");
    for line in decode_envelopes(&body) {
        println!("{line}");
    }

    let logout = conn.send(&Command::Logout)?;
    let _ = logout.wait().await;

    Ok(())
}

/// Reads the message total from a SELECT body's `* <n> EXISTS` line.
fn exists_count(body: &str) -> Option<u32> {
    body.lines().find_map(|line| {
        let rest = line.strip_prefix("* ")?;
        let count = rest.strip_suffix(" EXISTS")?;
        count.trim().parse().ok()
    })
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
    fn test_exists_count() {
        let body = "* FLAGS (\\Seen \\Answered)\n* 42 EXISTS\n* 0 RECENT\nabcd1234 OK [READ-WRITE] SELECT completed\n";
        assert_eq!(exists_count(body), Some(42));
    }

    #[test]
    fn test_exists_count_absent() {
        assert_eq!(exists_count("abcd1234 OK nothing here\n"), None);
        assert_eq!(exists_count(""), None);
    }
}
