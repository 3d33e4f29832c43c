use std::collections::HashMap;
use std::sync::RwLock;

use linktrack_core::error::CoreError;
use linktrack_core::model::names::{
    CLOSED, CONTAIN, CONTAIN_TREE, CORE_PACKAGE, OPENED, PATH_FILE, PROJECT_NAME,
};
use linktrack_core::model::TypeId;
use linktrack_core::storage::LinkStore;

use crate::error::SyncError;

/// Process-lifetime cache of `(namespace, name) -> type id` lookups.
/// Entries are only ever added.
#[derive(Debug, Default)]
pub struct TypeResolver {
    cache: RwLock<HashMap<(String, String), TypeId>>,
}

impl TypeResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve a type id, asking the store only on a cache miss.
    ///
    /// An unknown pair means the store was not provisioned with the package;
    /// nothing here creates type definitions.
    pub async fn resolve<S: LinkStore + ?Sized>(
        &self,
        store: &S,
        namespace: &str,
        name: &str,
    ) -> Result<TypeId, SyncError> {
        if let Some(id) = self.cached(namespace, name) {
            return Ok(id);
        }
        let id = store.id(namespace, name).await.map_err(|e| match e {
            CoreError::UnknownName { namespace, name } => {
                SyncError::UnknownType { namespace, name }
            }
            other => SyncError::Store(other),
        })?;
        tracing::debug!(namespace, name, %id, "resolved type");
        self.cache
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert((namespace.to_string(), name.to_string()), id);
        Ok(id)
    }

    pub fn cached(&self, namespace: &str, name: &str) -> Option<TypeId> {
        self.cache
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(&(namespace.to_string(), name.to_string()))
            .copied()
    }

    pub fn len(&self) -> usize {
        self.cache.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Every type id the tracker tags links with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TypeRegistry {
    pub contain: TypeId,
    pub contain_tree: TypeId,
    pub path_file: TypeId,
    pub project: TypeId,
    pub opened: TypeId,
    pub closed: TypeId,
}

impl TypeRegistry {
    /// Resolve the core types and the tracker's types from `package`.
    pub async fn resolve<S: LinkStore + ?Sized>(
        resolver: &TypeResolver,
        store: &S,
        package: &str,
    ) -> Result<Self, SyncError> {
        Ok(Self {
            contain: resolver.resolve(store, CORE_PACKAGE, CONTAIN).await?,
            contain_tree: resolver.resolve(store, CORE_PACKAGE, CONTAIN_TREE).await?,
            path_file: resolver.resolve(store, package, PATH_FILE).await?,
            project: resolver.resolve(store, package, PROJECT_NAME).await?,
            opened: resolver.resolve(store, package, OPENED).await?,
            closed: resolver.resolve(store, package, CLOSED).await?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use linktrack_core::storage::MemoryStore;

    const PACKAGE: &str = "@test/tracker";

    #[tokio::test]
    async fn test_resolution_is_cached() {
        let store = MemoryStore::with_schema(PACKAGE);
        let resolver = TypeResolver::new();

        let first = resolver.resolve(&store, PACKAGE, OPENED).await.unwrap();
        let second = resolver.resolve(&store, PACKAGE, OPENED).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(store.calls().id, 1);
        assert_eq!(resolver.cached(PACKAGE, OPENED), Some(first));
    }

    #[tokio::test]
    async fn test_registry_resolves_all_types() {
        let store = MemoryStore::with_schema(PACKAGE);
        let resolver = TypeResolver::new();
        let types = TypeRegistry::resolve(&resolver, &store, PACKAGE).await.unwrap();

        assert_eq!(resolver.len(), 6);
        assert_ne!(types.opened, types.closed);
        assert_eq!(types.contain, store.id(CORE_PACKAGE, CONTAIN).await.unwrap());
    }

    #[tokio::test]
    async fn test_unknown_package_is_configuration_error() {
        let store = MemoryStore::with_schema(PACKAGE);
        let resolver = TypeResolver::new();
        let err = TypeRegistry::resolve(&resolver, &store, "@other/package")
            .await
            .unwrap_err();
        match err {
            SyncError::UnknownType { namespace, name } => {
                assert_eq!(namespace, "@other/package");
                assert_eq!(name, PATH_FILE);
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
