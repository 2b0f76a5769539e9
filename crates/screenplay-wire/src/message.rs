// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Per-endpoint payload types and their bytes↔value codec.

use std::io::Cursor;

use screenplay_block::Block;
use screenplay_patch::Patch;

use crate::codec::{push_id24, push_u8_len, Reader};
use crate::endpoint;
use crate::ids::{FileId, ProjectId};
use crate::WireError;

/// `LOGIN_RESULT`'s `u8 error_code` values. `INVALID_CREDENTIALS` covers
/// both an unknown username and a correct username with the wrong
/// password, per the no-information-leakage rule on login failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoginErrorCode;

impl LoginErrorCode {
    /// Login accepted.
    pub const SUCCESSFUL: u8 = 0;
    /// Malformed request (e.g. non-ASCII username).
    pub const BAD_REQUEST: u8 = 1;
    /// Unknown user or wrong password — deliberately the same code for
    /// both so a failed login can't be used to enumerate usernames.
    pub const INVALID_CREDENTIALS: u8 = 2;
}

/// `User.public_form`: the subset of a user record ever sent to peers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserPublic {
    /// ASCII login name.
    pub username: String,
    /// UTF-8 display name.
    pub visible_name: String,
}

impl UserPublic {
    fn encode(&self, out: &mut Vec<u8>) {
        push_u8_len(out, self.username.as_bytes());
        push_u8_len(out, self.visible_name.as_bytes());
    }

    fn decode(r: &mut Reader<'_>) -> Result<Self, WireError> {
        Ok(Self {
            username: r.ascii_u8()?,
            visible_name: r.utf8_u8()?,
        })
    }
}

/// `LOGIN_REQUEST`: `u8 username_len, u8 password_len, username (ASCII),
/// password (bytes)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginRequest {
    /// ASCII login name.
    pub username: String,
    /// Password bytes, opaque to this layer (hashed/salted externally).
    pub password: Vec<u8>,
}

impl LoginRequest {
    fn encode(&self) -> Vec<u8> {
        let mut out = Vec::new();
        push_u8_len(&mut out, self.username.as_bytes());
        push_u8_len(&mut out, &self.password);
        out
    }

    fn decode(mut r: Reader<'_>) -> Result<Self, WireError> {
        let username = r.ascii_u8()?;
        let password = r.bytes(r.u8()? as usize)?.to_vec();
        Ok(Self { username, password })
    }
}

/// `LOGIN_RESULT`: `u8 error_code`; if zero, the project list and the
/// logged-in user's public form follow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginResult {
    /// Login succeeded.
    Ok {
        /// `(project_name, project_id)` pairs visible to this user.
        projects: Vec<(String, ProjectId)>,
        /// The logged-in user's public record.
        user: UserPublic,
    },
    /// Login failed with the given [`LoginErrorCode`].
    Err(u8),
}

impl LoginResult {
    fn encode(&self) -> Vec<u8> {
        let mut out = Vec::new();
        match self {
            Self::Err(code) => out.push(*code),
            Self::Ok { projects, user } => {
                out.push(LoginErrorCode::SUCCESSFUL);
                #[allow(clippy::cast_possible_truncation)]
                out.push(projects.len() as u8);
                for (name, id) in projects {
                    push_u8_len(&mut out, name.as_bytes());
                    push_id24(&mut out, id);
                }
                user.encode(&mut out);
            }
        }
        out
    }

    fn decode(mut r: Reader<'_>) -> Result<Self, WireError> {
        let error_code = r.u8()?;
        if error_code != LoginErrorCode::SUCCESSFUL {
            return Ok(Self::Err(error_code));
        }
        let count = r.u8()?;
        let mut projects = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let name = r.utf8_u8()?;
            let id = ProjectId::from_raw(r.id24()?)?;
            projects.push((name, id));
        }
        let user = UserPublic::decode(&mut r)?;
        Ok(Self::Ok { projects, user })
    }
}

/// `CREATE_PROJECT`: `u8 name_len, name (UTF-8)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateProject {
    /// Requested project name.
    pub name: String,
}

/// An identifier-only payload: `DELETE_PROJECT`, `DELETED_PROJECT`,
/// `OPEN_PROJECT`, `JOIN_DOC`, `LEAVE_DOC`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdOnly {
    /// The 24-hex id this message addresses.
    pub id: ProjectId,
}

/// `DeleteProject` alias.
pub type DeleteProject = IdOnly;
/// `DeletedProject` alias.
pub type DeletedProject = IdOnly;

/// An id-plus-name payload: `RENAME_PROJECT`, `CREATED_PROJECT`,
/// `RENAMED_PROJECT`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdAndName {
    /// The 24-hex id this message addresses.
    pub id: ProjectId,
    /// The associated name.
    pub name: String,
}

/// `CreatedProject` alias.
pub type CreatedProject = IdAndName;
/// `RenamedProject` alias.
pub type RenameProject = IdAndName;

/// `SYNC_PROJECT`: `u8 user_count, Project.bytes, user_count ×
/// User.public_form`.
///
/// `Project.bytes` is defined by the external project/document metadata
/// store, which lives outside this core's scope; it is carried
/// here as an opaque, length-prefixed blob rather than parsed, so this
/// codec still round-trips frames it cannot interpret.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncProject {
    /// Opaque project metadata blob from the external store.
    pub project_blob: Vec<u8>,
    /// Every user currently with the project open.
    pub users: Vec<UserPublic>,
}

impl SyncProject {
    fn encode(&self) -> Vec<u8> {
        let mut out = Vec::new();
        #[allow(clippy::cast_possible_truncation)]
        out.push(self.users.len() as u8);
        #[allow(clippy::cast_possible_truncation)]
        out.extend_from_slice(&(self.project_blob.len() as u32).to_be_bytes());
        out.extend_from_slice(&self.project_blob);
        for user in &self.users {
            user.encode(&mut out);
        }
        out
    }

    fn decode(mut r: Reader<'_>) -> Result<Self, WireError> {
        let user_count = r.u8()?;
        let blob_len = r.u32()? as usize;
        let project_blob = r.bytes(blob_len)?.to_vec();
        let mut users = Vec::with_capacity(user_count as usize);
        for _ in 0..user_count {
            users.push(UserPublic::decode(&mut r)?);
        }
        Ok(Self { project_blob, users })
    }
}

/// `OPENED_PROJECT`: broadcast to existing project members when a new user
/// opens the project.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenedProject {
    /// The user who just opened the project.
    pub user: UserPublic,
}

/// `JOINED_DOC` / `LEFT_DOC`: a document-scoped join/leave notice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinedDoc {
    /// The document in question.
    pub file_id: FileId,
    /// The user who joined.
    pub user: UserPublic,
}

/// `LeftDoc` alias.
pub type LeftDoc = JoinedDoc;

/// `SYNC_DOC`: the server's authoritative snapshot sent on join (S5).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncDoc {
    /// The document being joined.
    pub file_id: FileId,
    /// The authoritative block list at `document_timestamp`.
    pub blocks: Vec<Block>,
    /// The server's document timestamp at the instant this snapshot was
    /// taken.
    pub document_timestamp: u32,
}

impl SyncDoc {
    fn encode(&self) -> Vec<u8> {
        let mut out = Vec::new();
        push_id24(&mut out, &self.file_id);
        #[allow(clippy::cast_possible_truncation)]
        out.extend_from_slice(&(self.blocks.len() as u32).to_be_bytes());
        out.extend_from_slice(&self.document_timestamp.to_be_bytes());
        for block in &self.blocks {
            out.extend_from_slice(&block.to_bytes());
        }
        out
    }

    fn decode(mut r: Reader<'_>) -> Result<Self, WireError> {
        let file_id = FileId::from_raw(r.id24()?)?;
        let block_count = r.u32()?;
        let document_timestamp = r.u32()?;
        let mut blocks = Vec::with_capacity(block_count as usize);
        for _ in 0..block_count {
            let mut cursor = Cursor::new(r.rest());
            let block = Block::from_bytes(&mut cursor)?;
            let consumed = usize::try_from(cursor.position()).unwrap_or(0);
            r.advance(consumed)?;
            blocks.push(block);
        }
        Ok(Self {
            file_id,
            blocks,
            document_timestamp,
        })
    }
}

fn encode_patch_message(file_id: &FileId, extra: impl FnOnce(&mut Vec<u8>), patch: &Patch) -> Vec<u8> {
    let mut out = Vec::new();
    push_id24(&mut out, file_id);
    extra(&mut out);
    out.extend_from_slice(&patch.to_bytes());
    out
}

fn decode_nested_patch(r: &mut Reader<'_>) -> Result<Patch, WireError> {
    let mut cursor = Cursor::new(r.rest());
    let patch = Patch::from_bytes(&mut cursor)?;
    let consumed = usize::try_from(cursor.position()).unwrap_or(0);
    r.advance(consumed)?;
    Ok(patch)
}

/// `PATCH_SCRIPT`: the client's upload, carrying the branch it was produced
/// on and the client's view of the document timestamp.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchScript {
    /// The document being edited.
    pub file_id: FileId,
    /// The client branch this patch was produced on.
    pub branch_id: u32,
    /// The client's document timestamp at the moment of sending.
    pub document_timestamp: u32,
    /// The patch itself.
    pub patch: Patch,
}

impl PatchScript {
    fn encode(&self) -> Vec<u8> {
        encode_patch_message(
            &self.file_id,
            |out| {
                out.extend_from_slice(&self.branch_id.to_be_bytes());
                out.extend_from_slice(&self.document_timestamp.to_be_bytes());
            },
            &self.patch,
        )
    }

    fn decode(mut r: Reader<'_>) -> Result<Self, WireError> {
        let file_id = FileId::from_raw(r.id24()?)?;
        let branch_id = r.u32()?;
        let document_timestamp = r.u32()?;
        let patch = decode_nested_patch(&mut r)?;
        Ok(Self {
            file_id,
            branch_id,
            document_timestamp,
            patch,
        })
    }
}

/// `PATCHED_SCRIPT`: broadcast to every other editing user after the
/// server applies an uploaded patch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchedScript {
    /// The document that changed.
    pub file_id: FileId,
    /// The server's document timestamp after applying this patch.
    pub document_timestamp: u32,
    /// The server-stamped patch (see the change-id/ack split in
    /// `screenplay-server`).
    pub patch: Patch,
}

impl PatchedScript {
    fn encode(&self) -> Vec<u8> {
        encode_patch_message(
            &self.file_id,
            |out| out.extend_from_slice(&self.document_timestamp.to_be_bytes()),
            &self.patch,
        )
    }

    fn decode(mut r: Reader<'_>) -> Result<Self, WireError> {
        let file_id = FileId::from_raw(r.id24()?)?;
        let document_timestamp = r.u32()?;
        let patch = decode_nested_patch(&mut r)?;
        Ok(Self {
            file_id,
            document_timestamp,
            patch,
        })
    }
}

/// `ACK_PATCH`: sent back to the uploading client, carrying the client's
/// own original, pre-stamp change ids (see `DESIGN.md`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AckPatch {
    /// The document that changed.
    pub file_id: FileId,
    /// The (possibly rebased) patch, with the uploader's own change ids.
    pub patch: Patch,
}

impl AckPatch {
    fn encode(&self) -> Vec<u8> {
        encode_patch_message(&self.file_id, |_| {}, &self.patch)
    }

    fn decode(mut r: Reader<'_>) -> Result<Self, WireError> {
        let file_id = FileId::from_raw(r.id24()?)?;
        let patch = decode_nested_patch(&mut r)?;
        Ok(Self { file_id, patch })
    }
}

/// `ERROR_FULFILLING_SERVER_REQUEST` / `ERROR_FULFILLING_PROJECT_REQUEST`:
/// a human-readable message reported to the originator only, with no state
/// change. A `u8`-length-prefixed UTF-8 string fits within the 256-byte
/// cap assigned to these endpoints.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorFulfillingServerRequest {
    /// Human-readable explanation.
    pub message: String,
}

/// `ErrorFulfillingProjectRequest` alias.
pub type ErrorFulfillingProjectRequest = ErrorFulfillingServerRequest;

/// `CREATE_DOC` — catalog entry only, carried for wire completeness; see
/// [`endpoint::CREATE_DOC`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateDoc {
    /// Requested document name.
    pub name: String,
}

/// `CreatedDoc`.
pub type CreatedDoc = IdAndName;
/// `DeleteDoc`.
pub type DeleteDoc = IdOnly;
/// `DeletedDoc`.
pub type DeletedDoc = IdOnly;
/// `CreateFolder`.
pub type CreateFolder = CreateProject;
/// `CreatedFolder`.
pub type CreatedFolder = IdAndName;

fn encode_id_only(id: &ProjectId) -> Vec<u8> {
    let mut out = Vec::with_capacity(24);
    push_id24(&mut out, id);
    out
}

fn decode_id_only(mut r: Reader<'_>) -> Result<IdOnly, WireError> {
    Ok(IdOnly {
        id: ProjectId::from_raw(r.id24()?)?,
    })
}

fn encode_id_and_name(id: &ProjectId, name: &str) -> Vec<u8> {
    let mut out = Vec::new();
    push_id24(&mut out, id);
    push_u8_len(&mut out, name.as_bytes());
    out
}

fn decode_id_and_name(mut r: Reader<'_>) -> Result<IdAndName, WireError> {
    let id = ProjectId::from_raw(r.id24()?)?;
    let name = r.utf8_u8()?;
    Ok(IdAndName { id, name })
}

fn encode_name_only(name: &str) -> Vec<u8> {
    let mut out = Vec::new();
    push_u8_len(&mut out, name.as_bytes());
    out
}

fn decode_name_only(mut r: Reader<'_>) -> Result<String, WireError> {
    r.utf8_u8()
}

fn encode_joined_doc(m: &JoinedDoc) -> Vec<u8> {
    let mut out = Vec::new();
    push_id24(&mut out, &m.file_id);
    m.user.encode(&mut out);
    out
}

fn decode_joined_doc(mut r: Reader<'_>) -> Result<JoinedDoc, WireError> {
    let file_id = FileId::from_raw(r.id24()?)?;
    let user = UserPublic::decode(&mut r)?;
    Ok(JoinedDoc { file_id, user })
}

fn encode_error_message(message: &str) -> Vec<u8> {
    encode_name_only(message)
}

fn decode_error_message(r: Reader<'_>) -> Result<ErrorFulfillingServerRequest, WireError> {
    Ok(ErrorFulfillingServerRequest {
        message: decode_name_only(r)?,
    })
}

/// A decoded protocol message, tagged with which endpoint it arrived on.
///
/// `Message::encode` and [`decode`] are the single choke point every other
/// crate uses to turn a `(endpoint_id, payload)` frame into a typed value
/// and back — `screenplay-net`'s dispatch table is built against this enum.
#[derive(Debug, Clone, PartialEq, Eq)]
#[allow(clippy::large_enum_variant)]
pub enum Message {
    /// `PING`.
    Ping,
    /// `PONG`.
    Pong,
    /// `LOGIN`.
    Login(LoginRequest),
    /// `LOGIN_RESULT`.
    LoginResult(LoginResult),
    /// `ERROR_FULFILLING_SERVER_REQUEST`.
    ErrorFulfillingServerRequest(ErrorFulfillingServerRequest),
    /// `CREATE_PROJECT`.
    CreateProject(CreateProject),
    /// `CREATED_PROJECT`.
    CreatedProject(CreatedProject),
    /// `DELETE_PROJECT`.
    DeleteProject(DeleteProject),
    /// `DELETED_PROJECT`.
    DeletedProject(DeletedProject),
    /// `OPEN_PROJECT`.
    OpenProject(IdOnly),
    /// `SYNC_PROJECT`.
    SyncProject(SyncProject),
    /// `OPENED_PROJECT`.
    OpenedProject(OpenedProject),
    /// `RENAME_PROJECT`.
    RenameProject(IdAndName),
    /// `RENAMED_PROJECT`.
    RenamedProject(IdAndName),
    /// `ERROR_FULFILLING_PROJECT_REQUEST`.
    ErrorFulfillingProjectRequest(ErrorFulfillingProjectRequest),
    /// `JOIN_DOC`.
    JoinDoc(IdOnly),
    /// `SYNC_DOC`.
    SyncDoc(SyncDoc),
    /// `JOINED_DOC`.
    JoinedDoc(JoinedDoc),
    /// `LEAVE_DOC`.
    LeaveDoc(IdOnly),
    /// `LEFT_DOC`.
    LeftDoc(LeftDoc),
    /// `CREATE_DOC`.
    CreateDoc(CreateDoc),
    /// `CREATED_DOC`.
    CreatedDoc(CreatedDoc),
    /// `DELETE_DOC`.
    DeleteDoc(DeleteDoc),
    /// `DELETED_DOC`.
    DeletedDoc(DeletedDoc),
    /// `CREATE_FOLDER`.
    CreateFolder(CreateFolder),
    /// `CREATED_FOLDER`.
    CreatedFolder(CreatedFolder),
    /// `SCRIPT_PATCH`.
    ScriptPatch(PatchScript),
    /// `SCRIPT_PATCH_ACK`.
    ScriptPatchAck(AckPatch),
    /// `SCRIPT_PATCHED`.
    ScriptPatched(PatchedScript),
    /// `ARE_U_ALIVE`.
    AreUAlive,
    /// `I_AM_ALIVE`.
    IAmAlive,
    /// `CLOSE`.
    Close,
}

impl Message {
    /// The endpoint id this message is sent/received on.
    #[must_use]
    pub const fn endpoint_id(&self) -> u32 {
        match self {
            Self::Ping => endpoint::PING,
            Self::Pong => endpoint::PONG,
            Self::Login(_) => endpoint::LOGIN,
            Self::LoginResult(_) => endpoint::LOGIN_RESULT,
            Self::ErrorFulfillingServerRequest(_) => endpoint::ERROR_FULFILLING_SERVER_REQUEST,
            Self::CreateProject(_) => endpoint::CREATE_PROJECT,
            Self::CreatedProject(_) => endpoint::CREATED_PROJECT,
            Self::DeleteProject(_) => endpoint::DELETE_PROJECT,
            Self::DeletedProject(_) => endpoint::DELETED_PROJECT,
            Self::OpenProject(_) => endpoint::OPEN_PROJECT,
            Self::SyncProject(_) => endpoint::SYNC_PROJECT,
            Self::OpenedProject(_) => endpoint::OPENED_PROJECT,
            Self::RenameProject(_) => endpoint::RENAME_PROJECT,
            Self::RenamedProject(_) => endpoint::RENAMED_PROJECT,
            Self::ErrorFulfillingProjectRequest(_) => endpoint::ERROR_FULFILLING_PROJECT_REQUEST,
            Self::JoinDoc(_) => endpoint::JOIN_DOC,
            Self::SyncDoc(_) => endpoint::SYNC_DOC,
            Self::JoinedDoc(_) => endpoint::JOINED_DOC,
            Self::LeaveDoc(_) => endpoint::LEAVE_DOC,
            Self::LeftDoc(_) => endpoint::LEFT_DOC,
            Self::CreateDoc(_) => endpoint::CREATE_DOC,
            Self::CreatedDoc(_) => endpoint::CREATED_DOC,
            Self::DeleteDoc(_) => endpoint::DELETE_DOC,
            Self::DeletedDoc(_) => endpoint::DELETED_DOC,
            Self::CreateFolder(_) => endpoint::CREATE_FOLDER,
            Self::CreatedFolder(_) => endpoint::CREATED_FOLDER,
            Self::ScriptPatch(_) => endpoint::SCRIPT_PATCH,
            Self::ScriptPatchAck(_) => endpoint::SCRIPT_PATCH_ACK,
            Self::ScriptPatched(_) => endpoint::SCRIPT_PATCHED,
            Self::AreUAlive => endpoint::ARE_U_ALIVE,
            Self::IAmAlive => endpoint::I_AM_ALIVE,
            Self::Close => endpoint::CLOSE,
        }
    }

    /// Encode this message's payload (not including the frame header —
    /// see `screenplay-net::FrameCodec`).
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        match self {
            Self::Ping | Self::Pong | Self::AreUAlive | Self::IAmAlive | Self::Close => Vec::new(),
            Self::Login(m) => m.encode(),
            Self::LoginResult(m) => m.encode(),
            Self::ErrorFulfillingServerRequest(m) | Self::ErrorFulfillingProjectRequest(m) => {
                encode_error_message(&m.message)
            }
            Self::CreateProject(m) | Self::CreateFolder(m) => encode_name_only(&m.name),
            Self::CreatedProject(m) | Self::RenameProject(m) | Self::RenamedProject(m)
            | Self::CreatedDoc(m) | Self::CreatedFolder(m) => encode_id_and_name(&m.id, &m.name),
            Self::DeleteProject(m) | Self::DeletedProject(m) | Self::OpenProject(m)
            | Self::JoinDoc(m) | Self::LeaveDoc(m) | Self::DeleteDoc(m) | Self::DeletedDoc(m) => {
                encode_id_only(&m.id)
            }
            Self::SyncProject(m) => m.encode(),
            Self::OpenedProject(m) => {
                let mut out = Vec::new();
                m.user.encode(&mut out);
                out
            }
            Self::SyncDoc(m) => m.encode(),
            Self::JoinedDoc(m) | Self::LeftDoc(m) => encode_joined_doc(m),
            Self::CreateDoc(m) => encode_name_only(&m.name),
            Self::ScriptPatch(m) => m.encode(),
            Self::ScriptPatchAck(m) => m.encode(),
            Self::ScriptPatched(m) => m.encode(),
        }
    }
}

/// Decode a payload received on `endpoint_id` into a typed [`Message`].
/// Callers (`screenplay-net`) are responsible for the framing-level checks
/// the framing layer (unknown endpoint, oversize payload) before calling
/// this — an unrecognized id is still rejected here as a defense in depth.
pub fn decode(endpoint_id: u32, bytes: &[u8]) -> Result<Message, WireError> {
    let r = Reader::new(bytes);
    let msg = match endpoint_id {
        endpoint::PING => Message::Ping,
        endpoint::PONG => Message::Pong,
        endpoint::ARE_U_ALIVE => Message::AreUAlive,
        endpoint::I_AM_ALIVE => Message::IAmAlive,
        endpoint::CLOSE => Message::Close,
        endpoint::LOGIN => Message::Login(LoginRequest::decode(r)?),
        endpoint::LOGIN_RESULT => Message::LoginResult(LoginResult::decode(r)?),
        endpoint::ERROR_FULFILLING_SERVER_REQUEST => {
            Message::ErrorFulfillingServerRequest(decode_error_message(r)?)
        }
        endpoint::ERROR_FULFILLING_PROJECT_REQUEST => {
            Message::ErrorFulfillingProjectRequest(decode_error_message(r)?)
        }
        endpoint::CREATE_PROJECT => Message::CreateProject(CreateProject {
            name: decode_name_only(r)?,
        }),
        endpoint::CREATE_FOLDER => Message::CreateFolder(CreateFolder {
            name: decode_name_only(r)?,
        }),
        endpoint::CREATE_DOC => Message::CreateDoc(CreateDoc {
            name: decode_name_only(r)?,
        }),
        endpoint::CREATED_PROJECT => Message::CreatedProject(decode_id_and_name(r)?),
        endpoint::RENAME_PROJECT => Message::RenameProject(decode_id_and_name(r)?),
        endpoint::RENAMED_PROJECT => Message::RenamedProject(decode_id_and_name(r)?),
        endpoint::CREATED_DOC => Message::CreatedDoc(decode_id_and_name(r)?),
        endpoint::CREATED_FOLDER => Message::CreatedFolder(decode_id_and_name(r)?),
        endpoint::DELETE_PROJECT => Message::DeleteProject(decode_id_only(r)?),
        endpoint::DELETED_PROJECT => Message::DeletedProject(decode_id_only(r)?),
        endpoint::OPEN_PROJECT => Message::OpenProject(decode_id_only(r)?),
        endpoint::JOIN_DOC => Message::JoinDoc(decode_id_only(r)?),
        endpoint::LEAVE_DOC => Message::LeaveDoc(decode_id_only(r)?),
        endpoint::DELETE_DOC => Message::DeleteDoc(decode_id_only(r)?),
        endpoint::DELETED_DOC => Message::DeletedDoc(decode_id_only(r)?),
        endpoint::SYNC_PROJECT => Message::SyncProject(SyncProject::decode(r)?),
        endpoint::OPENED_PROJECT => Message::OpenedProject(OpenedProject {
            user: UserPublic::decode(&mut Reader::new(bytes))?,
        }),
        endpoint::SYNC_DOC => Message::SyncDoc(SyncDoc::decode(r)?),
        endpoint::JOINED_DOC => Message::JoinedDoc(decode_joined_doc(r)?),
        endpoint::LEFT_DOC => Message::LeftDoc(decode_joined_doc(r)?),
        endpoint::SCRIPT_PATCH => Message::ScriptPatch(PatchScript::decode(r)?),
        endpoint::SCRIPT_PATCH_ACK => Message::ScriptPatchAck(AckPatch::decode(r)?),
        endpoint::SCRIPT_PATCHED => Message::ScriptPatched(PatchedScript::decode(r)?),
        other => return Err(WireError::UnknownEndpoint(other)),
    };
    Ok(msg)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use screenplay_block::BlockType;

    fn roundtrip(msg: &Message) {
        let bytes = msg.encode();
        let decoded = decode(msg.endpoint_id(), &bytes).expect("decode");
        assert_eq!(&decoded, msg);
    }

    #[test]
    fn ping_pong_roundtrip() {
        roundtrip(&Message::Ping);
        roundtrip(&Message::Pong);
        roundtrip(&Message::AreUAlive);
        roundtrip(&Message::IAmAlive);
        roundtrip(&Message::Close);
    }

    #[test]
    fn login_request_roundtrips() {
        roundtrip(&Message::Login(LoginRequest {
            username: "jross".to_string(),
            password: vec![1, 2, 3, 4],
        }));
    }

    #[test]
    fn login_result_ok_roundtrips() {
        let id = ProjectId::from_hex("abcdefabcdefabcdefabcdef").expect("valid");
        roundtrip(&Message::LoginResult(LoginResult::Ok {
            projects: vec![("Pilot".to_string(), id)],
            user: UserPublic {
                username: "jross".to_string(),
                visible_name: "James Ross".to_string(),
            },
        }));
    }

    #[test]
    fn login_result_err_roundtrips() {
        roundtrip(&Message::LoginResult(LoginResult::Err(
            LoginErrorCode::INVALID_CREDENTIALS,
        )));
    }

    #[test]
    fn id_only_and_id_and_name_roundtrip() {
        let id = ProjectId::from_hex("000000000000000000000001").expect("valid");
        roundtrip(&Message::JoinDoc(IdOnly { id }));
        roundtrip(&Message::RenameProject(IdAndName {
            id,
            name: "Renamed".to_string(),
        }));
    }

    #[test]
    fn sync_doc_roundtrips_with_blocks() {
        let file_id = FileId::from_hex("111111111111111111111111").expect("valid");
        let block = Block::new(BlockType::Action);
        roundtrip(&Message::SyncDoc(SyncDoc {
            file_id,
            blocks: vec![block],
            document_timestamp: 42,
        }));
    }

    #[test]
    fn patch_script_roundtrips() {
        let file_id = FileId::from_hex("222222222222222222222222").expect("valid");
        let mut patch = Patch::new();
        patch.add_change(
            0,
            screenplay_patch::Change::RemoveBlock { index: 0 },
        );
        roundtrip(&Message::ScriptPatch(PatchScript {
            file_id,
            branch_id: 3,
            document_timestamp: 7,
            patch,
        }));
    }

    #[test]
    fn unknown_endpoint_errors() {
        assert!(matches!(decode(9_999_999, &[]), Err(WireError::UnknownEndpoint(9_999_999))));
    }

    proptest::proptest! {
        #[test]
        fn login_request_roundtrips_arbitrary(
            username in "[a-zA-Z0-9]{0,20}",
            password in proptest::collection::vec(any::<u8>(), 0..32),
        ) {
            let msg = Message::Login(LoginRequest { username, password });
            roundtrip(&msg);
        }
    }
}
