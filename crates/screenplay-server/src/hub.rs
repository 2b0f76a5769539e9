// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! The server-wide registry of open documents: one `Mutex`-guarded map,
//! looked up by every connection's handler, with documents created lazily
//! on first join and dropped once their last editor leaves.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use screenplay_wire::FileId;
use tokio::sync::Mutex;

use crate::auth::AuthProvider;
use crate::document::{ConnId, RealTimeDocument};
use crate::store::DocumentStore;

/// Shared server state: the open-document registry plus the pluggable
/// auth/persistence boundaries every connection's handler consults.
pub struct Hub {
    documents: Mutex<HashMap<FileId, Arc<RealTimeDocument>>>,
    next_conn_id: AtomicU64,
    store: Arc<dyn DocumentStore>,
    auth: Arc<dyn AuthProvider>,
}

impl Hub {
    /// Build an empty hub backed by `store` and `auth`.
    #[must_use]
    pub fn new(store: Arc<dyn DocumentStore>, auth: Arc<dyn AuthProvider>) -> Self {
        Self {
            documents: Mutex::new(HashMap::new()),
            next_conn_id: AtomicU64::new(0),
            store,
            auth,
        }
    }

    /// Allocate a fresh connection id, unique for this process's lifetime.
    pub fn alloc_conn_id(&self) -> ConnId {
        self.next_conn_id.fetch_add(1, Ordering::Relaxed)
    }

    /// The account-verification boundary backed by an external credential store.
    #[must_use]
    pub fn auth(&self) -> &dyn AuthProvider {
        self.auth.as_ref()
    }

    /// Look up `file_id`'s open document, creating it (empty, at
    /// timestamp zero) on first reference. `project_id` is only used the
    /// first time, when the document doesn't yet exist.
    pub async fn get_or_create_document(&self, file_id: FileId, project_id: String) -> Arc<RealTimeDocument> {
        let mut docs = self.documents.lock().await;
        docs.entry(file_id)
            .or_insert_with(|| Arc::new(RealTimeDocument::new(file_id, project_id, Vec::new(), self.store.clone())))
            .clone()
    }

    /// Drop `file_id` from the registry if it has no editors left. Safe
    /// to call even if the document is gone or still has editors.
    pub async fn remove_document_if_empty(&self, file_id: &FileId) {
        let mut docs = self.documents.lock().await;
        let Some(doc) = docs.get(file_id) else {
            return;
        };
        if doc.is_empty().await {
            docs.remove(file_id);
        }
    }

    /// How many documents are currently open. Exposed for tests.
    pub async fn open_document_count(&self) -> usize {
        self.documents.lock().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::AllowAllAuthProvider;
    use crate::store::NullDocumentStore;

    fn hub() -> Hub {
        Hub::new(Arc::new(NullDocumentStore), Arc::new(AllowAllAuthProvider))
    }

    #[tokio::test]
    async fn conn_ids_are_unique_and_increasing() {
        let h = hub();
        let a = h.alloc_conn_id();
        let b = h.alloc_conn_id();
        assert!(b > a);
    }

    #[tokio::test]
    async fn get_or_create_document_is_idempotent() {
        let h = hub();
        let id = FileId::from_hex("222222222222222222222222").expect("valid");
        let first = h.get_or_create_document(id, "proj".to_string()).await;
        let second = h.get_or_create_document(id, "proj".to_string()).await;
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(h.open_document_count().await, 1);
    }

    #[tokio::test]
    async fn removing_a_document_with_editors_is_a_no_op() {
        let h = hub();
        let id = FileId::from_hex("333333333333333333333333").expect("valid");
        let doc = h.get_or_create_document(id, "proj".to_string()).await;
        let (tx, _rx) = tokio::sync::mpsc::channel(8);
        doc.join_client(crate::document::ConnHandle {
            id: 1,
            user: screenplay_wire::UserPublic {
                username: "alice".to_string(),
                visible_name: "alice".to_string(),
            },
            tx,
        })
        .await;

        h.remove_document_if_empty(&id).await;
        assert_eq!(h.open_document_count().await, 1);
    }
}
