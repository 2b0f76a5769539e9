// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! The Client Replica: the two-list scheme that lets an editor
//! show speculative, locally-applied edits immediately while the
//! confirmed document state stays one round-trip behind the server.
//!
//! `blocks` is the last state this replica knows the server agrees on.
//! `blocks_advanced` is `blocks` plus every change in `advance_patch` —
//! the replica's own edits that have been applied locally but not yet
//! acknowledged. An editor UI renders `blocks_advanced`, never `blocks`
//! directly.

use screenplay_block::Block;
use screenplay_patch::{Change, ChangeId, Patch};
use screenplay_wire::{AckPatch, FileId, PatchScript, PatchedScript};

/// Client-side replica of one open document.
#[derive(Debug, Clone)]
pub struct ClientReplica {
    file_id: FileId,
    blocks: Vec<Block>,
    blocks_advanced: Vec<Block>,
    advance_patch: Patch,
    branch_id: u32,
    document_timestamp: u32,
}

impl ClientReplica {
    /// Build a replica from a freshly joined document's snapshot
    /// (`SyncDoc`'s `blocks`/`document_timestamp`). Starts with no
    /// pending local edits, on branch zero.
    #[must_use]
    pub fn new(file_id: FileId, blocks: Vec<Block>, document_timestamp: u32) -> Self {
        Self {
            file_id,
            blocks_advanced: blocks.clone(),
            blocks,
            advance_patch: Patch::new(),
            branch_id: 0,
            document_timestamp,
        }
    }

    /// The document this replica tracks.
    #[must_use]
    pub const fn file_id(&self) -> FileId {
        self.file_id
    }

    /// The last server-confirmed block list. An editor should render
    /// [`Self::blocks_advanced`] instead; this is exposed for tests and
    /// for diagnostics that need to compare the two.
    #[must_use]
    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    /// The speculative block list: confirmed state plus every locally
    /// applied, not-yet-acknowledged edit. This is what an editor renders.
    #[must_use]
    pub fn blocks_advanced(&self) -> &[Block] {
        &self.blocks_advanced
    }

    /// The replica's current branch id, incremented every time a remote
    /// change arrives while local edits are still outstanding.
    #[must_use]
    pub const fn branch_id(&self) -> u32 {
        self.branch_id
    }

    /// The replica's locally tracked document timestamp.
    #[must_use]
    pub const fn document_timestamp(&self) -> u32 {
        self.document_timestamp
    }

    /// Whether any local edits are still unacknowledged by the server.
    #[must_use]
    pub fn has_pending_changes(&self) -> bool {
        !self.advance_patch.changes.is_empty()
    }

    /// Record a freshly made local edit and build the wire message to
    /// upload it. The caller must have already applied `patch` to
    /// [`Self::blocks_advanced`] (typically via the same editor action
    /// that produced `patch` in the first place) — this only updates the
    /// bookkeeping and optimistically advances the local timestamp.
    pub fn send_change(&mut self, patch: Patch) -> PatchScript {
        let message = PatchScript {
            file_id: self.file_id,
            branch_id: self.branch_id,
            document_timestamp: self.document_timestamp,
            patch: patch.clone(),
        };
        self.advance_patch.extend(patch);
        self.document_timestamp += 1;
        message
    }

    /// Apply one locally authored change to [`Self::blocks_advanced`] and
    /// record it as a pending edit, returning the wire message to upload.
    /// A convenience wrapper around [`Self::send_change`] for callers that
    /// produce one [`Change`] at a time instead of assembling a [`Patch`]
    /// and applying it themselves first.
    pub fn type_change(&mut self, id: ChangeId, change: Change) -> PatchScript {
        change.apply(&mut self.blocks_advanced);
        let mut patch = Patch::new();
        patch.add_change(id, change);
        self.send_change(patch)
    }

    /// Apply a server acknowledgement of a previously sent patch: the
    /// confirmed list catches up, and the acknowledged changes are
    /// dropped from `advance_patch` (matched by change id, per the
    /// ack/change-id split documented in `screenplay-server`).
    pub fn ack_change(&mut self, ack: &AckPatch) {
        ack.patch.apply_on_blocks(&mut self.blocks);
        self.advance_patch.remove_changes_in(&ack.patch);
    }

    /// Apply a change broadcast by another editor. Returns `true` if the
    /// replica had to rebase its own pending edits against it (the editor
    /// should rebase any cursor/selection state it is tracking in that
    /// case), `false` if the remote change could simply be layered on top
    /// of `blocks_advanced` unchanged.
    ///
    /// The rebase trigger is `msg.document_timestamp < document_timestamp`:
    /// the remote change landed on the server before this replica's own
    /// outstanding edits were accounted for, so every pending local change
    /// has to be re-expressed against it.
    pub fn got_change(&mut self, msg: &PatchedScript) -> bool {
        msg.patch.apply_on_blocks(&mut self.blocks);

        let rebased = if msg.document_timestamp < self.document_timestamp {
            self.branch_id += 1;
            self.blocks_advanced = self.blocks.clone();
            let mut base = msg.patch.clone();
            self.advance_patch.rebase_to(&mut base);
            self.advance_patch.apply_on_blocks(&mut self.blocks_advanced);
            true
        } else {
            msg.patch.apply_on_blocks(&mut self.blocks_advanced);
            false
        };

        self.document_timestamp += 1;
        rebased
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use screenplay_block::{Block, BlockType, ContentItem};
    use screenplay_patch::Change;

    fn action_block(text: &str) -> Block {
        Block {
            block_type: BlockType::Action,
            contents: vec![ContentItem::Text(text.to_string())],
            contents_modified: false,
        }
    }

    fn file_id() -> FileId {
        FileId::from_hex("aaaaaaaaaaaaaaaaaaaaaaaa").expect("valid")
    }

    #[test]
    fn type_change_applies_locally_and_records_the_pending_edit() {
        let mut replica = ClientReplica::new(file_id(), vec![action_block("hello")], 5);

        let msg = replica.type_change(1, Change::AddBlock { index: 1, block: action_block("world") });

        assert_eq!(msg.document_timestamp, 5);
        assert_eq!(replica.blocks_advanced().len(), 2);
        assert_eq!(replica.blocks().len(), 1);
        assert!(replica.has_pending_changes());
        assert_eq!(replica.document_timestamp(), 6);
    }

    #[test]
    fn send_change_records_pending_edit_and_advances_timestamp() {
        let mut replica = ClientReplica::new(file_id(), vec![action_block("hello")], 5);
        let mut patch = Patch::new();
        patch.add_change(1, Change::AddBlock { index: 1, block: action_block("world") });
        replica.blocks_advanced.push(action_block("world"));

        let msg = replica.send_change(patch);

        assert_eq!(msg.document_timestamp, 5);
        assert_eq!(msg.branch_id, 0);
        assert_eq!(replica.document_timestamp(), 6);
        assert!(replica.has_pending_changes());
    }

    #[test]
    fn ack_change_confirms_and_clears_the_matching_entry() {
        let mut replica = ClientReplica::new(file_id(), vec![action_block("hello")], 0);
        let mut patch = Patch::new();
        patch.add_change(1, Change::AddBlock { index: 1, block: action_block("world") });
        replica.blocks_advanced.push(action_block("world"));
        let _ = replica.send_change(patch.clone());

        let mut stamped = patch;
        stamped.set_change_ids(1);
        replica.ack_change(&AckPatch { file_id: file_id(), patch: stamped });

        assert_eq!(replica.blocks().len(), 2);
        assert!(!replica.has_pending_changes());
    }

    #[test]
    fn got_change_without_pending_edits_applies_to_both_lists() {
        let mut replica = ClientReplica::new(file_id(), vec![action_block("hello")], 0);
        let mut remote = Patch::new();
        remote.add_change(10, Change::AddBlock { index: 1, block: action_block("remote") });

        let rebased = replica.got_change(&PatchedScript {
            file_id: file_id(),
            document_timestamp: 1,
            patch: remote,
        });

        assert!(!rebased);
        assert_eq!(replica.blocks().len(), 2);
        assert_eq!(replica.blocks_advanced().len(), 2);
        assert_eq!(replica.document_timestamp(), 2);
    }

    #[test]
    fn got_change_older_than_local_rebases_pending_edits() {
        let mut replica = ClientReplica::new(file_id(), vec![action_block("hello")], 11);
        let mut local = Patch::new();
        local.add_change(1, Change::AddBlock { index: 1, block: action_block("local") });
        replica.blocks_advanced.push(action_block("local"));
        let _ = replica.send_change(local);

        let mut remote = Patch::new();
        remote.add_change(10, Change::AddBlock { index: 0, block: action_block("remote") });

        let rebased = replica.got_change(&PatchedScript {
            file_id: file_id(),
            document_timestamp: 10,
            patch: remote,
        });

        assert!(rebased);
        assert_eq!(replica.branch_id(), 1);
        assert_eq!(replica.blocks().len(), 2);
        assert_eq!(replica.blocks_advanced().len(), 3);
        assert_eq!(replica.document_timestamp(), 12);
    }
}
