// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! The server-side real-time document core.
//!
//! This crate owns everything a server process needs above the wire: the
//! per-document state machine ([`document::RealTimeDocument`]) that
//! applies and rebases patches under a single mutex per document, the
//! server-wide document/connection registry ([`hub::Hub`]), the
//! per-connection driving loop that ties a [`screenplay_net::FramedConnection`]
//! to the hub ([`session::serve_connection`]), and the liveness-probe
//! state machine ([`liveness`]) that keeps idle connections honest.
//! Account verification ([`auth::AuthProvider`]) and document persistence
//! ([`store::DocumentStore`]) are both narrow traits so an embedding
//! binary can plug in real backends without this crate needing to know
//! about either one.

pub mod auth;
pub mod document;
pub mod error;
pub mod hub;
pub mod liveness;
pub mod session;
pub mod store;

pub use auth::{AllowAllAuthProvider, AuthProvider};
pub use document::{ConnHandle, ConnId, RealTimeDocument};
pub use error::ServerError;
pub use hub::Hub;
pub use liveness::{LivenessAction, LivenessTracker, ALIVE_TIMEOUT, PROBE_INTERVAL};
pub use session::serve_connection;
pub use store::{DocumentStore, NullDocumentStore};
