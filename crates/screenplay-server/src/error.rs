// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Server-side errors. A request that fails at project/document
//! scope is reported to its originator as a typed wire message
//! (`ErrorFulfillingServerRequest`/`ErrorFulfillingProjectRequest`), never
//! as a Rust panic or an error the peer can't parse. [`ServerError`] is
//! the internal type that gets translated to one of those two messages at
//! the connection boundary.

use thiserror::Error;

/// Internal failures raised while handling a client request.
#[derive(Debug, Error)]
pub enum ServerError {
    /// The named document has no open [`crate::RealTimeDocument`].
    #[error("document not open: {0}")]
    DocumentNotOpen(String),
    /// The connection is not registered as an editor of this document.
    #[error("not an editor of this document")]
    NotAnEditor,
    /// Persisting the document to its `DocumentStore` failed.
    #[error("save failed: {0}")]
    SaveFailed(String),
    /// A request named an endpoint this core doesn't implement server
    /// logic for (project/document metadata management; see DESIGN.md).
    #[error("unimplemented request")]
    Unimplemented,
}
