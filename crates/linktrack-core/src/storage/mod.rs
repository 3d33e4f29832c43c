pub mod memory;

use async_trait::async_trait;

use crate::error::CoreError;
use crate::model::{Link, LinkId, NewLink, Session};
use crate::query::LinkFilter;

pub use memory::{CallCounts, MemoryStore, StoreOp};

/// The remote link store. Calls are independent: there is no transaction
/// spanning two of them and no uniqueness enforced on the store side.
#[async_trait]
pub trait LinkStore: Send + Sync {
    /// Resolve the link registered as `name` inside `namespace`.
    async fn id(&self, namespace: &str, name: &str) -> Result<LinkId, CoreError>;

    /// Links matching `filter`, in the store's native order.
    async fn select(&self, filter: &LinkFilter) -> Result<Vec<Link>, CoreError>;

    /// Insert a link (and its nested containing edge). Returns the top-level
    /// links created.
    async fn insert(&self, link: &NewLink) -> Result<Vec<Link>, CoreError>;

    /// Delete every link matching `filter`, returning how many were removed.
    async fn delete(&self, filter: &LinkFilter) -> Result<u64, CoreError>;
}

/// Session exchange against the store's identity service.
#[async_trait]
pub trait IdentityService: Send + Sync {
    /// Obtain an anonymous guest session.
    async fn guest(&self) -> Result<Session, CoreError>;

    /// Elevate to the identity of `link_id`. Must be called on a handle
    /// already carrying a session.
    async fn login(&self, link_id: LinkId) -> Result<Session, CoreError>;

    /// A handle for the same store that acts as `session`.
    fn with_session(&self, session: &Session) -> Self
    where
        Self: Sized;
}
