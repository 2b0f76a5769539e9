// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! The fixed registry of message kinds, their numeric wire ids, and their
//! bounded maximum payload sizes. IDs here must match the wire exactly —
//! they are not an implementation detail, they are the protocol.

/// Default TCP port the server listens on.
pub const DEFAULT_PORT: u16 = 8684;

/// Zero-payload liveness/control probe sent by the client.
pub const PING: u32 = 1;
/// Reply to [`PING`].
pub const PONG: u32 = 2;

/// `LoginRequest`.
pub const LOGIN: u32 = 10;
/// `LoginResult`.
pub const LOGIN_RESULT: u32 = 11;

/// Server-scope request error, reported to the originator only.
pub const ERROR_FULFILLING_SERVER_REQUEST: u32 = 19;
/// `CreateProject`.
pub const CREATE_PROJECT: u32 = 20;
/// `CreatedProject`, broadcast on success.
pub const CREATED_PROJECT: u32 = 22;
/// `DeleteProject`.
pub const DELETE_PROJECT: u32 = 30;
/// `DeletedProject`, broadcast on success.
pub const DELETED_PROJECT: u32 = 32;
/// `OpenProject`.
pub const OPEN_PROJECT: u32 = 40;
/// `SyncProject`, sent to the opener under the project lock.
pub const SYNC_PROJECT: u32 = 41;
/// `OpenedProject`, broadcast to peers already in the project.
pub const OPENED_PROJECT: u32 = 42;
/// `RenameProject`.
pub const RENAME_PROJECT: u32 = 50;
/// `RenamedProject`, broadcast on success.
pub const RENAMED_PROJECT: u32 = 52;

/// Project/script-scope request error, reported to the originator only.
pub const ERROR_FULFILLING_PROJECT_REQUEST: u32 = 99;
/// `JoinDoc`.
pub const JOIN_DOC: u32 = 100;
/// `SyncDoc`, the join snapshot sent before any later broadcast.
pub const SYNC_DOC: u32 = 101;
/// `JoinedDoc`, broadcast to peers and echoed to the joiner per existing peer.
pub const JOINED_DOC: u32 = 102;
/// `LeaveDoc`.
pub const LEAVE_DOC: u32 = 110;
/// `LeftDoc`, broadcast on leave.
pub const LEFT_DOC: u32 = 112;
/// `CreateDoc` — catalog entry only; no server handler in this core
/// (document metadata storage lives outside this core's scope).
pub const CREATE_DOC: u32 = 120;
/// `CreatedDoc`.
pub const CREATED_DOC: u32 = 122;
/// `DeleteDoc` — catalog entry only, see [`CREATE_DOC`].
pub const DELETE_DOC: u32 = 130;
/// `DeletedDoc`.
pub const DELETED_DOC: u32 = 132;
/// `CreateFolder` — catalog entry only, see [`CREATE_DOC`].
pub const CREATE_FOLDER: u32 = 150;
/// `CreatedFolder`.
pub const CREATED_FOLDER: u32 = 152;

/// `PatchScript`, the client's upload.
pub const SCRIPT_PATCH: u32 = 300;
/// `AckPatch`, sent back to the uploading client.
pub const SCRIPT_PATCH_ACK: u32 = 301;
/// `PatchedScript`, broadcast to every other editing user.
pub const SCRIPT_PATCHED: u32 = 302;

/// Liveness reply from the client.
pub const I_AM_ALIVE: u32 = 900;
/// Liveness probe from the server.
pub const ARE_U_ALIVE: u32 = 901;
/// Graceful close notice, either direction.
pub const CLOSE: u32 = 1000;

/// 1 MiB: the cap for endpoints that may carry a full document snapshot or
/// an equivalently large patch.
const LARGE_PAYLOAD: u32 = 1024 * 1024;

/// The maximum payload size, in bytes, an endpoint will accept before the
/// frame is discarded unread. Endpoints with no real payload yet (the
/// project/doc-management catalog entries with no server handler) are
/// still given a generous, bounded cap rather than zero.
#[must_use]
pub fn max_data_size(id: u32) -> u32 {
    match id {
        PING | PONG | CLOSE | ARE_U_ALIVE | I_AM_ALIVE => 0,
        LOGIN => 128,
        LOGIN_RESULT => 64 * 1024,
        CREATE_PROJECT => 256,
        CREATED_PROJECT | DELETED_PROJECT | OPENED_PROJECT => 64 * 1024,
        DELETE_PROJECT | OPEN_PROJECT | JOIN_DOC | LEAVE_DOC => 24,
        RENAME_PROJECT | RENAMED_PROJECT => 256,
        ERROR_FULFILLING_SERVER_REQUEST | ERROR_FULFILLING_PROJECT_REQUEST => 256,
        SYNC_PROJECT => LARGE_PAYLOAD,
        SYNC_DOC => LARGE_PAYLOAD,
        JOINED_DOC | LEFT_DOC => 1024,
        CREATE_DOC | DELETE_DOC | CREATE_FOLDER | CREATED_DOC | DELETED_DOC | CREATED_FOLDER => 256,
        SCRIPT_PATCH | SCRIPT_PATCH_ACK | SCRIPT_PATCHED => LARGE_PAYLOAD,
        _ => 0,
    }
}

/// Whether `id` is a recognized endpoint. Unknown ids are discarded by the
/// framing layer rather than dispatched.
#[must_use]
pub fn is_known(id: u32) -> bool {
    matches!(
        id,
        PING | PONG
            | LOGIN
            | LOGIN_RESULT
            | ERROR_FULFILLING_SERVER_REQUEST
            | CREATE_PROJECT
            | CREATED_PROJECT
            | DELETE_PROJECT
            | DELETED_PROJECT
            | OPEN_PROJECT
            | SYNC_PROJECT
            | OPENED_PROJECT
            | RENAME_PROJECT
            | RENAMED_PROJECT
            | ERROR_FULFILLING_PROJECT_REQUEST
            | JOIN_DOC
            | SYNC_DOC
            | JOINED_DOC
            | LEAVE_DOC
            | LEFT_DOC
            | CREATE_DOC
            | CREATED_DOC
            | DELETE_DOC
            | DELETED_DOC
            | CREATE_FOLDER
            | CREATED_FOLDER
            | SCRIPT_PATCH
            | SCRIPT_PATCH_ACK
            | SCRIPT_PATCHED
            | I_AM_ALIVE
            | ARE_U_ALIVE
            | CLOSE
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_payload_endpoints_have_zero_cap() {
        for id in [PING, PONG, CLOSE, ARE_U_ALIVE, I_AM_ALIVE] {
            assert_eq!(max_data_size(id), 0);
        }
    }

    #[test]
    fn sync_doc_is_the_large_endpoint() {
        assert_eq!(max_data_size(SYNC_DOC), LARGE_PAYLOAD);
    }

    #[test]
    fn known_ids_match_the_wire_excerpt() {
        assert_eq!(LOGIN, 10);
        assert_eq!(JOIN_DOC, 100);
        assert_eq!(SCRIPT_PATCH, 300);
        assert_eq!(CLOSE, 1000);
    }
}
