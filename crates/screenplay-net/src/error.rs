// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Errors raised by the framed endpoint socket.
//!
//! Every variant here is connection-fatal — callers should treat any
//! `Err` from [`crate::connection::FramedConnection`] as "this socket is
//! now closed". That's a narrower set than it used to be: an unknown
//! endpoint id, an oversize incoming frame, or a payload that fails to
//! decode are *not* fatal. Those are framing/codec faults a peer can
//! trigger one frame at a time without breaking the transport underneath
//! it, so [`crate::connection::FramedConnection::recv`] treats them as
//! recoverable — it logs the fault, discards the offending frame, and
//! keeps receiving. See `connection::FrameFault` for that taxonomy.
//! `OversizePayload` below is a different, local case: it's what `send`
//! returns when the caller itself tries to queue a payload over its
//! endpoint's cap, before anything reaches the wire.

use thiserror::Error;

/// Errors raised while sending or receiving framed messages.
#[derive(Debug, Error)]
pub enum NetError {
    /// The underlying transport returned an I/O error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// `send` was asked to queue a payload exceeding its endpoint's cap.
    #[error("endpoint {endpoint_id} payload {len} exceeds cap {max}")]
    OversizePayload {
        /// The endpoint the oversize payload targeted.
        endpoint_id: u32,
        /// The payload length that was rejected.
        len: u32,
        /// The endpoint's [`screenplay_wire::max_data_size`] cap.
        max: u32,
    },
    /// A send or receive was attempted after the connection was closed.
    #[error("connection closed")]
    Closed,
    /// TLS handshake or configuration failure.
    #[error("tls error: {0}")]
    Tls(String),
}
