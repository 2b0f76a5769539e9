// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! TLS dialing and the background I/O task. No GUI exists in this
//! workspace, so "the UI thread polls periodically" is realized here as a
//! background Tokio task owning the [`FramedConnection`] exclusively and
//! feeding decoded messages into an `mpsc` channel; the embedding
//! application drains that channel on its own loop tick and calls the
//! synchronous [`crate::ClientReplica`] methods there. This mirrors
//! `screenplay_server::session::serve_connection`'s driving loop, just
//! with one peer instead of a hub to dispatch against.

use std::net::ToSocketAddrs;
use std::sync::Arc;

use rustls::pki_types::ServerName;
use screenplay_net::{client_connector, CertPinStore, FramedConnection, NetError};
use screenplay_wire::Message;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_rustls::client::TlsStream;

use crate::error::ClientError;

/// How many decoded inbound messages may queue before the embedding
/// application's drain loop backpressures the driver task.
pub const INBOX_DEPTH: usize = 256;
/// How many outbound messages [`ClientIo::send`] may queue before it
/// backpressures the caller.
const OUTBOX_DEPTH: usize = 256;

/// Dial `host:port` over TLS, trusting-on-first-use via `store`.
///
/// # Errors
///
/// Returns [`NetError`] on any TCP, TLS, or hostname-parsing failure.
pub async fn connect<S>(host: &str, port: u16, store: Arc<S>) -> Result<TlsStream<TcpStream>, NetError>
where
    S: CertPinStore + 'static,
{
    let addr = (host, port)
        .to_socket_addrs()?
        .next()
        .ok_or_else(|| NetError::Tls(format!("could not resolve {host}:{port}")))?;
    let tcp = TcpStream::connect(addr).await?;
    let connector = client_connector(host.to_string(), store);
    let server_name = ServerName::try_from(host.to_string())
        .map_err(|err| NetError::Tls(format!("invalid server name {host}: {err}")))?;
    connector.connect(server_name, tcp).await.map_err(NetError::Io)
}

/// The client's half of the framed connection: a background task owns
/// the socket, a channel carries decoded inbound messages out, and
/// [`ClientIo::send`] queues outbound ones back in.
pub struct ClientIo {
    outbox: mpsc::Sender<Message>,
    driver: JoinHandle<()>,
}

impl ClientIo {
    /// Spawn the driver task over `stream`, delivering every decoded
    /// message to `inbox`. The task exits (closing the connection) when
    /// the transport errors, `inbox`'s receiver is dropped, or
    /// [`Self::close`] is called.
    pub fn spawn<T>(stream: T, inbox: mpsc::Sender<Message>) -> Self
    where
        T: tokio::io::AsyncRead + tokio::io::AsyncWrite + Send + Unpin + 'static,
    {
        let mut conn = FramedConnection::new(stream);
        let (outbox_tx, mut outbox_rx) = mpsc::channel::<Message>(OUTBOX_DEPTH);

        let driver = tokio::spawn(async move {
            loop {
                tokio::select! {
                    received = conn.recv() => {
                        match received {
                            Ok(message) => {
                                if inbox.send(message).await.is_err() {
                                    break;
                                }
                            }
                            Err(err) => {
                                tracing::warn!(?err, "client connection error, closing");
                                break;
                            }
                        }
                    }
                    Some(out) = outbox_rx.recv() => {
                        if conn.send(&out).await.is_err() {
                            break;
                        }
                    }
                }
            }
            conn.close();
        });

        Self { outbox: outbox_tx, driver }
    }

    /// Queue `message` for the driver task to send.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Disconnected`] if the driver task has
    /// already shut down.
    pub async fn send(&self, message: Message) -> Result<(), ClientError> {
        self.outbox.send(message).await.map_err(|_| ClientError::Disconnected)
    }

    /// Stop the driver task. Safe to call more than once.
    pub fn close(&self) {
        self.driver.abort();
    }
}

impl Drop for ClientIo {
    fn drop(&mut self) {
        self.driver.abort();
    }
}
