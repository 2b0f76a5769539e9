// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! The boundary this core keeps between itself and the Fountain
//! serializer: `RealTimeDocument::save` hands its blocks to a
//! [`DocumentStore`] rather than writing a `.fountain` file itself, since
//! turning blocks back into Fountain text is an external concern (see
//! DESIGN.md).

use screenplay_block::Block;
use screenplay_wire::FileId;

/// Persists a document's blocks under its `file_id`. Implementations own
/// the actual encoding and the `documents/<file_id>.fountain` path.
pub trait DocumentStore: Send + Sync {
    /// Persist `blocks` as the current contents of `file_id`.
    ///
    /// # Errors
    ///
    /// Returns a human-readable failure description on any I/O or
    /// encoding failure.
    fn save(&self, file_id: &FileId, blocks: &[Block]) -> Result<(), String>;
}

/// A `DocumentStore` that discards everything. The default for tests and
/// for embedding applications that haven't wired up real persistence yet.
#[derive(Debug, Default)]
pub struct NullDocumentStore;

impl DocumentStore for NullDocumentStore {
    fn save(&self, _file_id: &FileId, _blocks: &[Block]) -> Result<(), String> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use screenplay_wire::FileId;

    #[test]
    fn null_store_always_succeeds() {
        let store = NullDocumentStore;
        let id = FileId::from_hex("000000000000000000000001").expect("valid");
        assert!(store.save(&id, &[]).is_ok());
    }
}
