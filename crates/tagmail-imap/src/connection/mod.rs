//! Connection lifecycle and command dispatch.
//!
//! One [`Connection`] drives one persistent encrypted socket. A dedicated
//! task exclusively owns the socket and the correlation table: outgoing
//! commands reach it over a channel, inbound bytes are buffered and split
//! into CRLF-terminated lines for the router, and each command's
//! completion is delivered through a one-shot channel keyed by its tag.

mod config;
mod router;
mod stream;

pub use config::Config;
pub use stream::{connect_tls, create_tls_connector};

use std::sync::Arc;

use bytes::BytesMut;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, WriteHalf};
use tokio::sync::{mpsc, oneshot, watch};

use crate::command::{Command, Tag};
use crate::error::{Error, Result};
use crate::observer::TrafficObserver;
use crate::sasl::{Credential, XOAUTH2_MECHANISM};
use router::Router;

/// Initial capacity of the receive buffer.
const RECV_BUFFER_SIZE: usize = 8192;

/// Connection lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// TCP/TLS establishment in progress.
    Connecting,
    /// AUTHENTICATE has been written to the wire.
    AuthSent,
    /// Session accepts commands.
    ///
    /// Ready is signaled immediately after AUTHENTICATE is sent, not after
    /// the server confirms it; await [`Connection::authentication`] to
    /// observe the actual outcome.
    Ready,
    /// Terminal: the socket closed or errored. There is no reconnection;
    /// pending commands are abandoned.
    Closed,
}

/// A handle resolving to one command's accumulated response body.
pub struct CommandHandle {
    tag: Tag,
    rx: oneshot::Receiver<String>,
}

impl CommandHandle {
    /// The correlation tag issued for this command.
    #[must_use]
    pub fn tag(&self) -> &Tag {
        &self.tag
    }

    /// Waits for the tagged completion line and returns the full body
    /// accumulated for this command.
    ///
    /// Resolves exactly once. There is no timeout: a command whose tagged
    /// reply never arrives waits indefinitely. If the connection closes
    /// first the command is abandoned and this returns [`Error::Closed`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::Closed`] when the connection shut down before the
    /// completion arrived.
    pub async fn wait(self) -> Result<String> {
        self.rx
            .await
            .map_err(|_| Error::Closed("command abandoned".to_string()))
    }
}

/// An outgoing send request handed to the connection task.
struct SendRequest {
    tag: Tag,
    /// Full wire line: `<tag> <command>\r\n`.
    line: String,
    /// Serialized command without the tag, for the observer.
    command: String,
    completion: oneshot::Sender<String>,
}

impl SendRequest {
    fn new(command: &Command) -> (Self, CommandHandle) {
        let tag = Tag::generate();
        let serialized = command.serialize();
        let line = format!("{tag} {serialized}\r\n");
        let (tx, rx) = oneshot::channel();

        (
            Self {
                tag: tag.clone(),
                line,
                command: serialized,
                completion: tx,
            },
            CommandHandle { tag, rx },
        )
    }
}

/// One persistent encrypted connection to one server.
///
/// Dropping the handle stops the connection task; the connection then
/// reaches the terminal [`ConnectionState::Closed`].
pub struct Connection {
    sender: mpsc::UnboundedSender<SendRequest>,
    state: watch::Receiver<ConnectionState>,
    auth: Option<CommandHandle>,
}

impl Connection {
    /// Opens a TLS connection and authenticates with the credential.
    ///
    /// # Errors
    ///
    /// Returns an error when the TCP connect or TLS handshake fails.
    pub async fn open(
        config: &Config,
        credential: &Credential,
        observer: Arc<dyn TrafficObserver>,
    ) -> Result<Self> {
        let stream = stream::connect_tls(&config.host, config.port).await?;
        Ok(Self::from_stream(stream, credential, observer))
    }

    /// Drives an already-established encrypted stream.
    ///
    /// AUTHENTICATE is sent immediately and Ready is signaled without
    /// waiting for the server's reply.
    pub fn from_stream<S>(
        stream: S,
        credential: &Credential,
        observer: Arc<dyn TrafficObserver>,
    ) -> Self
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let (sender, requests) = mpsc::unbounded_channel();
        let (state_tx, state) = watch::channel(ConnectionState::Connecting);

        let (auth_request, auth_handle) = SendRequest::new(&Command::Authenticate {
            mechanism: XOAUTH2_MECHANISM.to_string(),
            initial_response: credential.initial_response(),
        });

        tokio::spawn(run(stream, auth_request, requests, state_tx, observer));

        Self {
            sender,
            state,
            auth: Some(auth_handle),
        }
    }

    /// Sends a command, returning a handle for its completion.
    ///
    /// A fresh tag is generated, the pending entry registered, and the
    /// line queued for the wire; the call returns without waiting for any
    /// reply.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Closed`] when the connection has shut down.
    pub fn send(&self, command: &Command) -> Result<CommandHandle> {
        let (request, handle) = SendRequest::new(command);
        self.sender
            .send(request)
            .map_err(|_| Error::Closed("connection task stopped".to_string()))?;
        Ok(handle)
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Waits until the session is ready for commands.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Closed`] when the connection closes first.
    pub async fn wait_ready(&self) -> Result<()> {
        let mut state = self.state.clone();
        loop {
            match *state.borrow_and_update() {
                ConnectionState::Ready => return Ok(()),
                ConnectionState::Closed => {
                    return Err(Error::Closed("connection closed before ready".to_string()));
                }
                ConnectionState::Connecting | ConnectionState::AuthSent => {}
            }
            if state.changed().await.is_err() {
                return Err(Error::Closed("connection task stopped".to_string()));
            }
        }
    }

    /// Waits for the terminal Closed state.
    pub async fn wait_closed(&self) {
        let mut state = self.state.clone();
        loop {
            if *state.borrow_and_update() == ConnectionState::Closed {
                return;
            }
            if state.changed().await.is_err() {
                return;
            }
        }
    }

    /// Takes the AUTHENTICATE command's completion handle.
    ///
    /// Readiness is not gated on authentication success; await this handle
    /// and inspect the body to detect a rejected login. Returns `None`
    /// after the first call.
    pub fn authentication(&mut self) -> Option<CommandHandle> {
        self.auth.take()
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl std::fmt::Debug for CommandHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandHandle")
            .field("tag", &self.tag)
            .finish_non_exhaustive()
    }
}

/// The connection task: exclusive owner of the socket and the router.
async fn run<S>(
    stream: S,
    auth: SendRequest,
    mut requests: mpsc::UnboundedReceiver<SendRequest>,
    state: watch::Sender<ConnectionState>,
    observer: Arc<dyn TrafficObserver>,
) where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    let (mut reader, mut writer) = tokio::io::split(stream);
    let mut router = Router::new(observer.clone());

    // Authenticate immediately; readiness is not gated on the reply.
    if write_request(&mut writer, auth, &mut router, observer.as_ref())
        .await
        .is_err()
    {
        let _ = state.send(ConnectionState::Closed);
        return;
    }
    let _ = state.send(ConnectionState::AuthSent);
    let _ = state.send(ConnectionState::Ready);

    let mut buffer = BytesMut::with_capacity(RECV_BUFFER_SIZE);

    loop {
        tokio::select! {
            biased;

            request = requests.recv() => {
                // All handles dropped: shut the connection down.
                let Some(request) = request else { break };
                if write_request(&mut writer, request, &mut router, observer.as_ref()).await.is_err() {
                    break;
                }
            }

            read = reader.read_buf(&mut buffer) => {
                match read {
                    Ok(0) => break,
                    Ok(_) => drain_lines(&mut buffer, &mut router),
                    Err(e) => {
                        tracing::debug!(error = %e, "socket read failed");
                        break;
                    }
                }
            }
        }
    }

    // Terminal: the correlation table drops with the router and every
    // still-pending completion is abandoned.
    let _ = state.send(ConnectionState::Closed);
}

/// Registers a pending command and puts its line on the wire.
async fn write_request<S>(
    writer: &mut WriteHalf<S>,
    request: SendRequest,
    router: &mut Router,
    observer: &dyn TrafficObserver,
) -> std::io::Result<()>
where
    S: AsyncWrite,
{
    router.register(request.tag.clone(), request.completion);
    observer.command_sent(&request.tag, &request.command);

    let result = writer.write_all(request.line.as_bytes()).await;
    if let Err(e) = &result {
        tracing::debug!(error = %e, "socket write failed");
    }
    result
}

/// Splits complete CRLF-terminated lines out of the receive buffer.
///
/// A partial line spanning a read boundary stays buffered until its
/// terminator arrives.
fn drain_lines(buffer: &mut BytesMut, router: &mut Router) {
    while let Some(pos) = find_crlf(buffer) {
        let line = buffer.split_to(pos + 2);
        let line = String::from_utf8_lossy(&line[..pos]);
        router.dispatch(&line);
    }
}

/// Finds the position of CRLF in a buffer.
fn find_crlf(buffer: &[u8]) -> Option<usize> {
    buffer.windows(2).position(|w| w == b"\r\n")
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
    fn test_find_crlf() {
        assert_eq!(find_crlf(b"hello\r\n"), Some(5));
        assert_eq!(find_crlf(b"\r\n"), Some(0));
        assert_eq!(find_crlf(b"no newline"), None);
        assert_eq!(find_crlf(b"just\n"), None);
        assert_eq!(find_crlf(b"just\r"), None);
    }

    #[test]
    fn test_send_request_wire_form() {
        let (request, handle) = SendRequest::new(&Command::Noop);
        assert_eq!(request.line, format!("{} NOOP\r\n", handle.tag()));
        assert_eq!(request.command, "NOOP");
        assert_eq!(&request.tag, handle.tag());
    }
}
