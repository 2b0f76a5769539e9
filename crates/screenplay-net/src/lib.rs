// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! The framed, TLS-wrapped endpoint socket.
//!
//! This crate turns a raw `AsyncRead + AsyncWrite` transport into a
//! typed [`screenplay_wire::Message`] channel: [`frame`] handles the pure
//! byte-level framing, [`connection::FramedConnection`] drives it over an
//! actual transport with one writer task per connection, and [`tls`]
//! builds the `rustls` configs on both ends of the wire — a server config
//! from an on-disk cert/key pair, and a client config that trusts a host's
//! certificate on first contact and pins it thereafter.

mod connection;
mod error;
mod frame;
mod tls;

pub use connection::FramedConnection;
pub use error::NetError;
pub use frame::{encode, read_header, FrameAccumulator, Header, HEADER_LEN};
pub use tls::{client_connector, load_certs, load_key, server_acceptor, CertPinStore, TofuVerifier};
