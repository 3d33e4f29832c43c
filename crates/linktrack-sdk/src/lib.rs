//! Keep a shared link store's picture of which project files are open.
//!
//! # Example
//! ```no_run
//! use linktrack_core::storage::MemoryStore;
//! use linktrack_sdk::{bootstrap, FileTracker};
//!
//! # async fn run() -> Result<(), linktrack_sdk::SyncError> {
//! let store = MemoryStore::with_schema("@l4legenda/vscode-deep-extension");
//! let authorized = bootstrap(&store).await?;
//! let tracker = FileTracker::start(
//!     authorized.store,
//!     authorized.session,
//!     "demo",
//!     "@l4legenda/vscode-deep-extension",
//! )
//! .await?;
//! tracker.on_open("/ws/demo/a.ts").await?;
//! tracker.on_close("/ws/demo/a.ts").await?;
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod identity;
pub mod locks;
pub mod nodes;
pub mod scope;
pub mod tracker;
pub mod types;

pub use error::SyncError;
pub use identity::{bootstrap, Authorized};
pub use locks::KeyedLocks;
pub use nodes::NodeResolver;
pub use scope::MarkerScope;
pub use tracker::{
    is_ignored, FileEvent, FileState, FileTracker, MarkerCount, Outcome, SyncContext, Transition,
};
pub use types::{TypeRegistry, TypeResolver};

// Re-export core types that SDK users may need
pub use linktrack_core::model::{Link, LinkId, Session, TypeId};
pub use linktrack_core::storage::{IdentityService, LinkStore};
