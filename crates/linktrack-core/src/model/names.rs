//! Well-known `(namespace, name)` pairs the tracker resolves at startup.

/// Namespace of the store's built-in types.
pub const CORE_PACKAGE: &str = "@deep-foundation/core";
pub const CONTAIN: &str = "Contain";
pub const CONTAIN_TREE: &str = "containTree";
pub const USER: &str = "User";

/// Principal the bootstrap logs in as.
pub const ADMIN_NAMESPACE: &str = "deep";
pub const ADMIN_NAME: &str = "admin";

pub const PATH_FILE: &str = "PathFile";
pub const PROJECT_NAME: &str = "ProjectName";
pub const OPENED: &str = "Opened";
pub const CLOSED: &str = "Closed";
