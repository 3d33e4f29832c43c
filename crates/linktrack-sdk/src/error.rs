use linktrack_core::error::CoreError;

#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("Bootstrap failed: {0}")]
    Bootstrap(#[source] CoreError),

    #[error("Unknown type {namespace}/{name} (is the package installed in the store?)")]
    UnknownType { namespace: String, name: String },

    #[error("Store error: {0}")]
    Store(#[from] CoreError),

    #[error("Store created no link for insert")]
    EmptyInsert,
}
