//! Integration tests driving a full connection over an in-memory stream.
//!
//! The "server" side of a duplex pipe reads what the client writes,
//! extracts the randomly generated tag, and scripts replies with it.

#![allow(clippy::unwrap_used)]

use std::sync::Arc;
use std::sync::Mutex;

use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream};

use tagmail_imap::{
    Command, Connection, ConnectionState, Credential, FetchItem, NoopObserver, Tag,
    TrafficObserver, xoauth2_initial_response,
};

/// Reads one CRLF-terminated line from the server side of the pipe.
async fn read_line(server: &mut DuplexStream) -> String {
    let mut line = Vec::new();
    let mut byte = [0u8; 1];
    loop {
        server.read_exact(&mut byte).await.unwrap();
        line.push(byte[0]);
        if line.ends_with(b"\r\n") {
            line.truncate(line.len() - 2);
            return String::from_utf8(line).unwrap();
        }
    }
}

fn connect(server_buffer: usize) -> (Connection, DuplexStream) {
    let (client, server) = tokio::io::duplex(server_buffer);
    let credential = Credential::new("a@b.com", "tok123");
    let conn = Connection::from_stream(client, &credential, Arc::new(NoopObserver));
    (conn, server)
}

#[tokio::test]
async fn authenticate_is_sent_first_and_ready_is_not_gated() {
    let (mut conn, mut server) = connect(4096);

    // Ready arrives before the server says anything at all.
    conn.wait_ready().await.unwrap();

    let line = read_line(&mut server).await;
    let (tag, rest) = line.split_once(' ').unwrap();
    assert_eq!(tag.len(), 8);
    assert!(tag.bytes().all(|b| b.is_ascii_hexdigit() && !b.is_ascii_uppercase()));
    assert_eq!(
        rest,
        format!(
            "AUTHENTICATE XOAUTH2 {}",
            xoauth2_initial_response("a@b.com", "tok123")
        )
    );

    // The auth handle resolves from the tagged completion.
    let auth = conn.authentication().unwrap();
    server
        .write_all(format!("{tag} OK authenticated\r\n").as_bytes())
        .await
        .unwrap();
    let body = auth.wait().await.unwrap();
    assert_eq!(body, format!("{tag} OK authenticated\n"));
}

#[tokio::test]
async fn tagged_completion_carries_accumulated_untagged_lines() {
    let (conn, mut server) = connect(4096);
    let _auth_line = read_line(&mut server).await;

    let select = conn
        .send(&Command::Select {
            mailbox: "INBOX".to_string(),
        })
        .unwrap();
    let line = read_line(&mut server).await;
    let tag = select.tag().as_str().to_string();
    assert_eq!(line, format!("{tag} SELECT \"INBOX\""));

    server
        .write_all(format!("* 3 EXISTS\r\n{tag} OK\r\n").as_bytes())
        .await
        .unwrap();

    let body = select.wait().await.unwrap();
    assert_eq!(body, format!("* 3 EXISTS\n{tag} OK\n"));
}

#[tokio::test]
async fn partial_lines_span_read_boundaries() {
    let (conn, mut server) = connect(4096);
    let _auth_line = read_line(&mut server).await;

    let fetch = conn
        .send(&Command::Fetch {
            sequence: "1:*".to_string(),
            items: vec![FetchItem::Flags, FetchItem::Envelope],
        })
        .unwrap();
    let _fetch_line = read_line(&mut server).await;
    let tag = fetch.tag().as_str().to_string();

    // The line terminator arrives in a separate write.
    server.write_all(b"* 5 EXI").await.unwrap();
    server.flush().await.unwrap();
    server.write_all(b"STS\r\n").await.unwrap();
    server
        .write_all(format!("{tag} OK done\r\n").as_bytes())
        .await
        .unwrap();

    let body = fetch.wait().await.unwrap();
    assert_eq!(body, format!("* 5 EXISTS\n{tag} OK done\n"));
}

#[tokio::test]
async fn untagged_lines_go_to_the_most_recent_command() {
    let (conn, mut server) = connect(4096);
    let _auth_line = read_line(&mut server).await;

    let first = conn.send(&Command::Noop).unwrap();
    let _ = read_line(&mut server).await;
    let second = conn
        .send(&Command::Search {
            criteria: vec!["UNSEEN".to_string()],
        })
        .unwrap();
    let _ = read_line(&mut server).await;

    let first_tag = first.tag().as_str().to_string();
    let second_tag = second.tag().as_str().to_string();

    // With both in flight, the untagged push lands on the newest command.
    server
        .write_all(
            format!("* SEARCH 2 4\r\n{second_tag} OK search\r\n{first_tag} OK noop\r\n").as_bytes(),
        )
        .await
        .unwrap();

    assert_eq!(
        second.wait().await.unwrap(),
        format!("* SEARCH 2 4\n{second_tag} OK search\n")
    );
    assert_eq!(first.wait().await.unwrap(), format!("{first_tag} OK noop\n"));
}

#[tokio::test]
async fn eof_closes_the_connection_and_abandons_pending_commands() {
    let (conn, mut server) = connect(4096);
    let _auth_line = read_line(&mut server).await;

    let noop = conn.send(&Command::Noop).unwrap();
    let _ = read_line(&mut server).await;

    drop(server);
    conn.wait_closed().await;
    assert_eq!(conn.state(), ConnectionState::Closed);

    // Abandoned, never resolved with a body.
    assert!(noop.wait().await.is_err());

    // New sends fail synchronously.
    assert!(conn.send(&Command::Noop).is_err());
}

/// Observer that records events for assertion.
#[derive(Default)]
struct RecordingObserver {
    events: Mutex<Vec<String>>,
}

impl TrafficObserver for RecordingObserver {
    fn command_sent(&self, tag: &Tag, command: &str) {
        self.events
            .lock()
            .unwrap()
            .push(format!("> {tag} {command}"));
    }

    fn response_line(&self, tag: &Tag, line: &str, untagged: bool) {
        let marker = if untagged { "*" } else { "<" };
        self.events
            .lock()
            .unwrap()
            .push(format!("{marker} {tag} {line}"));
    }
}

#[tokio::test]
async fn observer_sees_commands_and_completed_response_lines() {
    let observer = Arc::new(RecordingObserver::default());
    let (client, mut server) = tokio::io::duplex(4096);
    let credential = Credential::new("a@b.com", "tok123");
    let conn = Connection::from_stream(client, &credential, observer.clone());
    let _auth_line = read_line(&mut server).await;

    let noop = conn.send(&Command::Noop).unwrap();
    let _ = read_line(&mut server).await;
    let tag = noop.tag().as_str().to_string();

    server
        .write_all(format!("* 1 RECENT\r\n{tag} OK noop\r\n").as_bytes())
        .await
        .unwrap();
    noop.wait().await.unwrap();

    let events = observer.events.lock().unwrap().clone();
    assert!(events.iter().any(|e| e.ends_with("NOOP")));
    assert!(events.contains(&format!("* {tag} * 1 RECENT")));
    assert!(events.contains(&format!("< {tag} {tag} OK noop")));
}
