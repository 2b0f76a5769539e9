// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! The client-side half of the screenplay sync protocol.
//!
//! [`ClientReplica`] is the pure, synchronous two-list state machine an
//! editor drives directly. [`network`] is the TLS-dialing and
//! background-task plumbing that turns a socket into a channel of
//! decoded [`screenplay_wire::Message`] values so the replica's own
//! methods never touch the network themselves. [`pin_store`] is the
//! on-disk trust-on-first-use certificate store that backs
//! [`network::connect`].

mod error;
mod network;
mod pin_store;
mod replica;

pub use error::ClientError;
pub use network::{connect, ClientIo, INBOX_DEPTH};
pub use pin_store::FileCertPinStore;
pub use replica::ClientReplica;
