// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Client-side errors. Unlike [`screenplay_server::ServerError`], there is
//! no peer to report these to — a `ClientError` always means this
//! replica's own connection is unusable and the embedding application
//! should reconnect.

use thiserror::Error;

/// Failures raised by [`crate::ClientConnection`] and [`crate::ClientReplica`].
#[derive(Debug, Error)]
pub enum ClientError {
    /// The underlying framed socket failed (I/O, TLS, or protocol
    /// violation); see the wrapped [`screenplay_net::NetError`].
    #[error(transparent)]
    Net(#[from] screenplay_net::NetError),
    /// The background driver task's outbox has no receiver left, meaning
    /// the driver has already shut down.
    #[error("client connection is closed")]
    Disconnected,
    /// A server hostname couldn't be parsed as a TLS server name.
    #[error("invalid server name: {0}")]
    InvalidServerName(String),
}
