// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! `RealTimeDocument`: the authoritative, server-side copy of one open
//! document, and the `RealTimeUser` bookkeeping its editors carry while
//! they're joined to it.
//!
//! Every operation that touches a document's blocks or timestamp goes
//! through the single [`tokio::sync::Mutex<DocumentState>`] this type
//! wraps, which is what makes "at most one patch in flight per document"
//! and "broadcast completeness" true by construction rather than by
//! convention.

use std::collections::HashMap;
use std::sync::Arc;

use screenplay_block::Block;
use screenplay_patch::Patch;
use screenplay_wire::{FileId, JoinedDoc, Message, PatchedScript, SyncDoc, UserPublic};
use tokio::sync::mpsc;

use crate::error::ServerError;
use crate::store::DocumentStore;

/// Connection identifier, unique for the lifetime of the server process.
pub type ConnId = u64;

/// How many outgoing messages may be queued for one editor before a
/// broadcast send backpressures the document that's fanning it out.
const EDITOR_QUEUE_DEPTH: usize = 256;

/// A handle the document uses to reach one connected editor: enough to
/// address it by id, label broadcasts with its public identity, and hand
/// it outgoing messages without needing that connection's own state.
#[derive(Clone)]
pub struct ConnHandle {
    /// This connection's id.
    pub id: ConnId,
    /// The logged-in user this connection belongs to.
    pub user: UserPublic,
    /// Outgoing message queue; the connection's own task drains this and
    /// writes to the socket.
    pub tx: mpsc::Sender<Message>,
}

/// One editor's branch/freeze bookkeeping for a single document.
///
/// Lives inside [`DocumentState`] rather than on the connection itself,
/// since applying an uploaded patch, rebasing it against this bookkeeping,
/// and broadcasting the result to every *other* editor's bookkeeping all
/// have to happen atomically under the same document lock.
struct RealTimeUser {
    handler: ConnHandle,
    /// Composition of every patch this user hasn't yet rebased its own
    /// pending edits against.
    patch_from_old_to_new: Patch,
    /// The branch this user is currently producing patches on.
    current_branch: u32,
    /// `branch_id -> document_timestamp` the branch was frozen at, for
    /// branches this user has since abandoned but may still upload a
    /// straggling patch against.
    frozen_branches_timestamps: HashMap<u32, u32>,
}

impl RealTimeUser {
    fn new(handler: ConnHandle) -> Self {
        Self {
            handler,
            patch_from_old_to_new: Patch::new(),
            current_branch: 0,
            frozen_branches_timestamps: HashMap::new(),
        }
    }
}

/// The mutable state one [`RealTimeDocument`] guards behind a single
/// mutex.
struct DocumentState {
    blocks: Vec<Block>,
    document_timestamp: u32,
    editing_users: HashMap<ConnId, RealTimeUser>,
}

/// The authoritative, server-side copy of one open document.
pub struct RealTimeDocument {
    file_id: FileId,
    project_id: String,
    state: tokio::sync::Mutex<DocumentState>,
    store: Arc<dyn DocumentStore>,
}

impl RealTimeDocument {
    /// Open a document with an empty script at timestamp zero. `blocks`
    /// seeds its initial content (e.g. loaded from storage by the
    /// caller); pass an empty vec for a brand new document.
    #[must_use]
    pub fn new(
        file_id: FileId,
        project_id: String,
        blocks: Vec<Block>,
        store: Arc<dyn DocumentStore>,
    ) -> Self {
        Self {
            file_id,
            project_id,
            state: tokio::sync::Mutex::new(DocumentState {
                blocks,
                document_timestamp: 0,
                editing_users: HashMap::new(),
            }),
            store,
        }
    }

    /// The document this instance serves.
    #[must_use]
    pub const fn file_id(&self) -> &FileId {
        &self.file_id
    }

    /// The project this document belongs to, per the external
    /// project/document metadata store.
    #[must_use]
    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    /// The server's current document timestamp.
    pub async fn current_timestamp(&self) -> u32 {
        self.state.lock().await.document_timestamp
    }

    /// Whether no connection currently has this document open.
    pub async fn is_empty(&self) -> bool {
        self.state.lock().await.editing_users.is_empty()
    }

    /// Register `conn` as an editor, returning the join-time snapshot
    /// (S5) and notifying every other editor (and the joiner, once per
    /// existing peer) via `JOINED_DOC`.
    pub async fn join_client(&self, conn: ConnHandle) -> SyncDoc {
        let mut state = self.state.lock().await;
        for peer in state.editing_users.values() {
            let _ = conn
                .tx
                .send(Message::JoinedDoc(JoinedDoc {
                    file_id: self.file_id,
                    user: peer.handler.user.clone(),
                }))
                .await;
            let _ = peer
                .handler
                .tx
                .send(Message::JoinedDoc(JoinedDoc {
                    file_id: self.file_id,
                    user: conn.user.clone(),
                }))
                .await;
        }
        let snapshot = SyncDoc {
            file_id: self.file_id,
            blocks: state.blocks.clone(),
            document_timestamp: state.document_timestamp,
        };
        state
            .editing_users
            .insert(conn.id, RealTimeUser::new(conn));
        snapshot
    }

    /// Unregister `conn_id` as an editor, notifying the remaining editors
    /// via `LEFT_DOC`. Returns the departing user's public record and
    /// whether this was the last editor (the caller should [`Self::save`]
    /// and drop this document in that case).
    pub async fn leave_client(&self, conn_id: ConnId) -> Option<(UserPublic, bool)> {
        let mut state = self.state.lock().await;
        let left = state.editing_users.remove(&conn_id)?;
        for peer in state.editing_users.values() {
            let _ = peer
                .handler
                .tx
                .send(Message::LeftDoc(JoinedDoc {
                    file_id: self.file_id,
                    user: left.handler.user.clone(),
                }))
                .await;
        }
        let is_last = state.editing_users.is_empty();
        Some((left.handler.user, is_last))
    }

    /// Apply an already-server-ready `patch` (stamped with fresh change
    /// ids) and broadcast it to every editor but `source`. Shared by
    /// [`Self::upload_patch`]; also usable directly for server-originated
    /// edits.
    async fn push_patch_locked(state: &mut DocumentState, file_id: FileId, patch: Patch, source: ConnId) -> Patch {
        let ts = state.document_timestamp;
        let mut stamped = patch;
        stamped.set_change_ids(ts);
        stamped.apply_on_blocks(&mut state.blocks);
        state.document_timestamp = ts + 1;
        let new_ts = state.document_timestamp;
        for (conn_id, user) in &mut state.editing_users {
            if *conn_id == source {
                continue;
            }
            user.patch_from_old_to_new.extend(stamped.clone());
            let _ = user
                .handler
                .tx
                .send(Message::ScriptPatched(PatchedScript {
                    file_id,
                    document_timestamp: new_ts,
                    patch: stamped.clone(),
                }))
                .await;
        }
        stamped
    }

    /// Apply `patch` as if it were already accepted verbatim (no
    /// branch/freeze rebase), stamp it, and broadcast it. Returns the
    /// stamped patch.
    pub async fn push_patch(&self, patch: Patch, source: ConnId) -> Patch {
        let mut state = self.state.lock().await;
        Self::push_patch_locked(&mut state, self.file_id, patch, source).await
    }

    /// Process one client upload per the three cases: up to date,
    /// stale on the uploader's current branch (which freezes that branch
    /// and starts a new one), or a straggling upload on an already-frozen
    /// branch. Returns the patch to ack back to `source` — on the
    /// up-to-date path this is the client's own patch verbatim (Open
    /// Question 1); otherwise it's the patch after rebasing against
    /// everything `source` has missed.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::NotAnEditor`] if `source` hasn't joined
    /// this document.
    pub async fn upload_patch(
        &self,
        source: ConnId,
        mut patch: Patch,
        branch_id: u32,
        document_timestamp: u32,
    ) -> Result<Patch, ServerError> {
        let mut state = self.state.lock().await;
        let current_ts = state.document_timestamp;
        let ack_patch = {
            let user = state
                .editing_users
                .get_mut(&source)
                .ok_or(ServerError::NotAnEditor)?;
            if branch_id == user.current_branch && document_timestamp == current_ts {
                user.patch_from_old_to_new = Patch::new();
                patch.clone()
            } else {
                if branch_id == user.current_branch && document_timestamp < current_ts {
                    let freeze_ts = document_timestamp.saturating_sub(1);
                    user.frozen_branches_timestamps.insert(user.current_branch, freeze_ts);
                    user.current_branch += 1;
                }
                if let Some(&freeze_ts) = user.frozen_branches_timestamps.get(&branch_id) {
                    user.patch_from_old_to_new.drop_changes_with_id_below(freeze_ts);
                }
                user.frozen_branches_timestamps.retain(|&b, _| b >= branch_id);
                patch.rebase_to(&mut user.patch_from_old_to_new);
                patch.clone()
            }
        };
        Self::push_patch_locked(&mut state, self.file_id, patch, source).await;
        Ok(ack_patch)
    }

    /// Persist the current blocks through this document's [`DocumentStore`].
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::SaveFailed`] if the store rejects the write.
    pub async fn save(&self) -> Result<(), ServerError> {
        let state = self.state.lock().await;
        self.store
            .save(&self.file_id, &state.blocks)
            .map_err(ServerError::SaveFailed)
    }
}
