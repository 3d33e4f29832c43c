use std::sync::Arc;

use linktrack_core::model::{LinkId, NewLink, TypeId};
use linktrack_core::query::LinkFilter;
use linktrack_core::storage::LinkStore;

use crate::error::SyncError;
use crate::locks::KeyedLocks;

/// Find-or-create for nodes identified by a string key under a parent.
///
/// The store has no upsert, so this is a select followed by an insert.
/// Attempts for the same `(type, parent, key)` are serialized inside this
/// process; two processes racing on the same key can still both insert.
#[derive(Debug)]
pub struct NodeResolver {
    contain: TypeId,
    locks: Arc<KeyedLocks<(TypeId, LinkId, String)>>,
}

impl NodeResolver {
    /// `contain` is the edge type linking parents to their nodes.
    pub fn new(contain: TypeId) -> Self {
        Self {
            contain,
            locks: Arc::new(KeyedLocks::new()),
        }
    }

    /// A resolver serialized against this one, for a later session.
    pub fn sharing_locks(&self, contain: TypeId) -> Self {
        Self {
            contain,
            locks: Arc::clone(&self.locks),
        }
    }

    /// Nodes of `type_id` valued `key` that `parent` contains.
    pub fn existing_filter(&self, type_id: TypeId, key: &str, parent: LinkId) -> LinkFilter {
        LinkFilter::of_type(type_id)
            .value(key)
            .incoming(LinkFilter::of_type(self.contain).from_id(parent))
    }

    /// Look up the node without creating it.
    pub async fn find<S: LinkStore + ?Sized>(
        &self,
        store: &S,
        type_id: TypeId,
        key: &str,
        parent: LinkId,
    ) -> Result<Option<LinkId>, SyncError> {
        let found = store
            .select(&self.existing_filter(type_id, key, parent))
            .await?;
        if found.len() > 1 {
            tracing::warn!(key, count = found.len(), "duplicate nodes for key");
        }
        Ok(found.first().map(|link| link.id))
    }

    /// Return the node for `key` under `parent`, creating it (and its
    /// containing edge) when absent.
    pub async fn resolve_or_create<S: LinkStore + ?Sized>(
        &self,
        store: &S,
        type_id: TypeId,
        key: &str,
        parent: LinkId,
    ) -> Result<LinkId, SyncError> {
        let _guard = self.locks.lock((type_id, parent, key.to_string())).await;

        if let Some(id) = self.find(store, type_id, key, parent).await? {
            return Ok(id);
        }

        let created = store
            .insert(
                &NewLink::node(type_id)
                    .with_value(key)
                    .contained_in(self.contain, parent),
            )
            .await?;
        let id = created.first().map(|link| link.id).ok_or(SyncError::EmptyInsert)?;
        tracing::debug!(key, %id, %parent, "created node");
        Ok(id)
    }
}
