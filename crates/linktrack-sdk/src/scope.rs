use linktrack_core::model::{LinkId, TypeId};
use linktrack_core::query::LinkFilter;
use linktrack_core::storage::LinkStore;

use crate::error::SyncError;

/// Marker predicates restricted to one agent's containment subtree.
///
/// The store is shared between agents, and several of them may hold markers
/// on the same file node. Every predicate built here is anchored at
/// `agent_root`, so deleting through it cannot reach another agent's marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MarkerScope {
    pub agent_root: LinkId,
    pub tree: TypeId,
    pub contain: TypeId,
}

impl MarkerScope {
    pub fn new(agent_root: LinkId, tree: TypeId, contain: TypeId) -> Self {
        Self {
            agent_root,
            tree,
            contain,
        }
    }

    /// Everything below a `contain` edge from the agent root that holds a
    /// `marker_type` marker on `file`: the edge itself and the marker.
    ///
    /// Matching markers by type and target alone would also remove other
    /// agents' markers on the same file.
    pub fn prior_marker_filter(&self, marker_type: TypeId, file: LinkId) -> LinkFilter {
        LinkFilter::new().up(
            self.tree,
            LinkFilter::of_type(self.contain)
                .from_id(self.agent_root)
                .to_matching(LinkFilter::of_type(marker_type).to_id(file)),
        )
    }

    /// The agent's own `marker_type` markers on `file`.
    pub fn markers_filter(&self, marker_type: TypeId, file: LinkId) -> LinkFilter {
        LinkFilter::of_type(marker_type)
            .from_id(self.agent_root)
            .to_id(file)
            .incoming(LinkFilter::of_type(self.contain).from_id(self.agent_root))
    }

    /// Remove the agent's `marker_type` markers on `file` along with their
    /// containing edges. Returns the number of links deleted.
    pub async fn delete_prior_marker<S: LinkStore + ?Sized>(
        &self,
        store: &S,
        marker_type: TypeId,
        file: LinkId,
    ) -> Result<u64, SyncError> {
        let removed = store
            .delete(&self.prior_marker_filter(marker_type, file))
            .await?;
        tracing::debug!(%file, %marker_type, removed, "deleted prior marker");
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use linktrack_core::model::names::{
        CLOSED, CONTAIN, CONTAIN_TREE, CORE_PACKAGE, OPENED, PATH_FILE,
    };
    use linktrack_core::model::NewLink;
    use linktrack_core::query::TreeFilter;
    use linktrack_core::storage::MemoryStore;

    const PACKAGE: &str = "@test/tracker";

    #[test]
    fn test_prior_marker_filter_is_anchored_at_agent() {
        let scope = MarkerScope::new(LinkId(100), LinkId(30), LinkId(1));
        let filter = scope.prior_marker_filter(LinkId(7), LinkId(55));

        let expected_parent = LinkFilter {
            type_id: Some(LinkId(1)),
            from_id: Some(LinkId(100)),
            to: Some(Box::new(LinkFilter {
                type_id: Some(LinkId(7)),
                to_id: Some(LinkId(55)),
                ..Default::default()
            })),
            ..Default::default()
        };
        assert_eq!(
            filter.up.as_deref(),
            Some(&TreeFilter {
                tree_id: LinkId(30),
                parent: expected_parent,
            })
        );
        // Nothing outside the tree condition.
        assert_eq!(filter.type_id, None);
        assert_eq!(filter.to_id, None);
    }

    struct Fixture {
        store: MemoryStore,
        contain: TypeId,
        tree: TypeId,
        opened: TypeId,
        closed: TypeId,
        file: LinkId,
    }

    async fn fixture() -> Fixture {
        let store = MemoryStore::with_schema(PACKAGE);
        let contain = store.id(CORE_PACKAGE, CONTAIN).await.unwrap();
        let tree = store.id(CORE_PACKAGE, CONTAIN_TREE).await.unwrap();
        let opened = store.id(PACKAGE, OPENED).await.unwrap();
        let closed = store.id(PACKAGE, CLOSED).await.unwrap();
        let path_file = store.id(PACKAGE, PATH_FILE).await.unwrap();
        let file = store
            .insert(&NewLink::node(path_file).with_value("/ws/demo/a.ts"))
            .await
            .unwrap()[0]
            .id;
        Fixture {
            store,
            contain,
            tree,
            opened,
            closed,
            file,
        }
    }

    async fn mark(f: &Fixture, root: LinkId, marker: TypeId) {
        f.store
            .insert(&NewLink::edge(marker, root, f.file).contained_in(f.contain, root))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_delete_leaves_other_agents_alone() {
        let f = fixture().await;
        let a = f.store.add_user().link_id;
        let b = f.store.add_user().link_id;
        mark(&f, a, f.opened).await;
        mark(&f, b, f.opened).await;

        let scope_a = MarkerScope::new(a, f.tree, f.contain);
        let scope_b = MarkerScope::new(b, f.tree, f.contain);
        assert_eq!(scope_a.delete_prior_marker(&f.store, f.opened, f.file).await.unwrap(), 2);

        assert!(f.store.matching(&scope_a.markers_filter(f.opened, f.file)).is_empty());
        assert_eq!(f.store.matching(&scope_b.markers_filter(f.opened, f.file)).len(), 1);
    }

    #[tokio::test]
    async fn test_delete_only_matches_marker_type() {
        let f = fixture().await;
        let a = f.store.add_user().link_id;
        mark(&f, a, f.closed).await;

        let scope = MarkerScope::new(a, f.tree, f.contain);
        assert_eq!(scope.delete_prior_marker(&f.store, f.opened, f.file).await.unwrap(), 0);
        assert_eq!(f.store.matching(&scope.markers_filter(f.closed, f.file)).len(), 1);
    }

    #[tokio::test]
    async fn test_uncontained_marker_is_not_owned() {
        let f = fixture().await;
        let a = f.store.add_user().link_id;
        // A marker from `a` that someone else's root contains.
        let b = f.store.add_user().link_id;
        f.store
            .insert(&NewLink::edge(f.opened, a, f.file).contained_in(f.contain, b))
            .await
            .unwrap();

        let scope = MarkerScope::new(a, f.tree, f.contain);
        assert!(f.store.matching(&scope.markers_filter(f.opened, f.file)).is_empty());
        assert_eq!(scope.delete_prior_marker(&f.store, f.opened, f.file).await.unwrap(), 0);
    }
}
