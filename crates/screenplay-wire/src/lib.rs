// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Endpoint catalog and wire payload codecs for the screenplay sync
//! protocol.
//!
//! This crate owns the numeric endpoint ids, their payload size
//! caps, and the bytes↔value codec for every message that crosses the
//! framed socket. It has no notion of sockets, TLS, or dispatch —
//! that's `screenplay-net`. It depends on `screenplay-block` and
//! `screenplay-patch` only to embed their own `to_bytes`/`from_bytes` forms
//! inside the larger payloads (`SyncDoc`, `PatchScript`, …).

mod codec;
mod endpoint;
mod ids;
mod message;

pub use codec::Reader;
pub use endpoint::{
    is_known, max_data_size, ARE_U_ALIVE, CLOSE, CREATED_DOC, CREATED_FOLDER, CREATED_PROJECT,
    CREATE_DOC, CREATE_FOLDER, CREATE_PROJECT, DEFAULT_PORT, DELETED_DOC, DELETED_PROJECT,
    DELETE_DOC, DELETE_PROJECT, ERROR_FULFILLING_PROJECT_REQUEST, ERROR_FULFILLING_SERVER_REQUEST,
    I_AM_ALIVE, JOINED_DOC, JOIN_DOC, LEAVE_DOC, LEFT_DOC, LOGIN, LOGIN_RESULT, OPENED_PROJECT,
    OPEN_PROJECT, PING, PONG, RENAMED_PROJECT, RENAME_PROJECT, SCRIPT_PATCH, SCRIPT_PATCHED,
    SCRIPT_PATCH_ACK, SYNC_DOC, SYNC_PROJECT,
};
pub use ids::{FileId, HexId24, ProjectId};
pub use message::{
    AckPatch, CreateDoc, CreateFolder, CreateProject, CreatedDoc, CreatedFolder, CreatedProject,
    DeleteDoc, DeleteProject, DeletedDoc, DeletedProject, ErrorFulfillingProjectRequest,
    ErrorFulfillingServerRequest, IdAndName, IdOnly, JoinedDoc, LeftDoc, LoginErrorCode,
    LoginRequest, LoginResult, Message, OpenedProject, PatchScript, PatchedScript, SyncDoc,
    SyncProject, UserPublic,
};

use thiserror::Error;

/// Errors raised while decoding a wire payload.
#[derive(Debug, Error)]
pub enum WireError {
    /// The buffer ended before a complete payload could be read.
    #[error("truncated payload")]
    Truncated,
    /// Extra bytes remained after a payload was fully decoded.
    #[error("trailing bytes after payload")]
    TrailingBytes,
    /// A field declared ASCII-only contained non-ASCII bytes.
    #[error("expected ascii bytes")]
    NotAscii,
    /// A field declared UTF-8 was not valid UTF-8.
    #[error("invalid utf-8")]
    InvalidUtf8,
    /// A 24-hex-character id field did not contain 24 hex digits.
    #[error("invalid 24-hex id: {0}")]
    InvalidId(String),
    /// The frame's endpoint id has no registered codec.
    #[error("unknown endpoint id: {0}")]
    UnknownEndpoint(u32),
    /// A `block_type` or style tag byte did not decode.
    #[error(transparent)]
    Block(#[from] screenplay_block::BlockError),
    /// A nested `Patch`/`Change` failed to decode.
    #[error(transparent)]
    Patch(#[from] screenplay_patch::PatchError),
}
